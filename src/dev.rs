//! Dev mode: debounced, coalesced rebuilds under file watch.
//!
//! A single scheduler task owns all rebuild state:
//!
//! - a debounce deadline, pushed back by every change that arrives while
//!   no rebuild is running
//! - the join handle of the in-flight rebuild, so two passes never write
//!   the output tree at the same time
//! - a follow-up flag, set by changes that arrive mid-rebuild; it causes
//!   exactly one more (debounced) pass once the current one finishes, no
//!   matter how many changes arrived
//!
//! Every pass rebuilds the whole tree, since one added or removed page can
//! reorder the entire route table.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::compile::compile_project;
use crate::config::Project;
use crate::error::Result;
use crate::hub::{DevMessage, NotificationHub};

/// Delay between `compiled` and `reload`.
pub const RELOAD_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    Compiled,
    Failed(String),
}

/// One full rebuild. Runs on the blocking pool.
pub trait Rebuild: Send + Sync + 'static {
    fn rebuild(&self) -> RebuildOutcome;
}

/// Rebuilds a project's compiled-output tree.
pub struct ProjectRebuilder {
    project: Project,
}

impl ProjectRebuilder {
    pub fn new(project: Project) -> Self {
        Self { project }
    }
}

impl Rebuild for ProjectRebuilder {
    fn rebuild(&self) -> RebuildOutcome {
        match compile_project(&self.project) {
            Ok(output) if output.has_failures() => RebuildOutcome::Failed(output.failure_summary()),
            Ok(_) => RebuildOutcome::Compiled,
            Err(e) => {
                tracing::error!("Rebuild failed: {e}");
                RebuildOutcome::Failed(e.to_string())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════════

/// Cheap handle for requesting rebuilds; clone freely.
#[derive(Clone)]
pub struct RebuildScheduler {
    tx: mpsc::UnboundedSender<()>,
    watched_extensions: Arc<[String]>,
}

impl RebuildScheduler {
    /// Start the scheduler task on the current tokio runtime.
    pub fn spawn(
        rebuilder: Arc<dyn Rebuild>,
        hub: Arc<NotificationHub>,
        debounce: Duration,
        watched_extensions: Vec<String>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_scheduler(rx, rebuilder, hub, debounce));
        let scheduler = Self {
            tx,
            watched_extensions: watched_extensions.into(),
        };
        (scheduler, task)
    }

    /// A file with `extension` changed. Ignored unless the extension is
    /// watched; returns whether a rebuild was requested.
    pub fn file_changed(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        if !self.watched_extensions.iter().any(|w| w == extension) {
            return false;
        }
        self.request()
    }

    /// Request a rebuild unconditionally. False once the scheduler stopped.
    pub fn request(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

async fn run_scheduler(
    mut rx: mpsc::UnboundedReceiver<()>,
    rebuilder: Arc<dyn Rebuild>,
    hub: Arc<NotificationHub>,
    debounce: Duration,
) {
    let mut deadline: Option<Instant> = None;
    let mut running: Option<JoinHandle<RebuildOutcome>> = None;
    let mut follow_up = false;

    loop {
        tokio::select! {
            request = rx.recv() => match request {
                Some(()) if running.is_some() => follow_up = true,
                Some(()) => deadline = Some(Instant::now() + debounce),
                None => break,
            },
            _ = sleep_until(deadline) => {
                deadline = None;
                hub.broadcast(&DevMessage::Recompiling);
                tracing::info!("Change detected, recompiling");
                let rebuilder = rebuilder.clone();
                running = Some(tokio::task::spawn_blocking(move || rebuilder.rebuild()));
            },
            outcome = wait_rebuild(&mut running) => {
                running = None;
                report(outcome, &hub);
                if follow_up {
                    follow_up = false;
                    deadline = Some(Instant::now() + debounce);
                }
            },
        }
    }

    // Senders are gone; let an in-flight pass finish writing.
    if running.is_some() {
        let outcome = wait_rebuild(&mut running).await;
        report(outcome, &hub);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_rebuild(running: &mut Option<JoinHandle<RebuildOutcome>>) -> RebuildOutcome {
    match running {
        Some(handle) => handle
            .await
            .unwrap_or_else(|e| RebuildOutcome::Failed(format!("rebuild task failed: {e}"))),
        None => std::future::pending().await,
    }
}

fn report(outcome: RebuildOutcome, hub: &Arc<NotificationHub>) {
    match outcome {
        RebuildOutcome::Compiled => {
            hub.broadcast(&DevMessage::Compiled);
            let hub = hub.clone();
            tokio::spawn(async move {
                tokio::time::sleep(RELOAD_DELAY).await;
                hub.broadcast(&DevMessage::Reload);
            });
        }
        RebuildOutcome::Failed(message) => {
            tracing::error!("Compilation failed:\n{message}");
            hub.broadcast(&DevMessage::compilation_error(message));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEV SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// A running dev session. Dropping it stops watching.
pub struct DevSession {
    pub scheduler: RebuildScheduler,
    pub hub: Arc<NotificationHub>,
    task: JoinHandle<()>,
    _watcher: RecommendedWatcher,
}

impl DevSession {
    /// Compile once, then watch the source tree and rebuild on change.
    /// Must be called from inside a tokio runtime.
    pub fn start(project: Project, hub: Arc<NotificationHub>) -> Result<Self> {
        let initial = compile_project(&project)?;
        if initial.has_failures() {
            tracing::warn!(failed = initial.failures.len(), "Initial compile had failures");
        }

        let source_root = project.source_root();
        let debounce = Duration::from_millis(project.config.debounce_ms);
        let watched = project.config.watched_extensions.clone();

        let (scheduler, task) = RebuildScheduler::spawn(
            Arc::new(ProjectRebuilder::new(project)),
            hub.clone(),
            debounce,
            watched,
        );

        let watcher = watch(&source_root, scheduler.clone())?;
        tracing::info!(dir = %source_root.display(), "Watching for changes");

        Ok(Self {
            scheduler,
            hub,
            task,
            _watcher: watcher,
        })
    }

    /// Stop watching and wait for any in-flight rebuild to finish.
    pub async fn shutdown(self) {
        let Self {
            scheduler,
            task,
            _watcher,
            ..
        } = self;
        drop(_watcher);
        drop(scheduler);
        if let Err(e) = task.await {
            tracing::warn!("Scheduler ended abnormally: {e}");
        }
    }
}

fn watch(root: &Path, scheduler: RebuildScheduler) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Watch error: {e}");
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
        ) {
            return;
        }
        for path in &event.paths {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if scheduler.file_changed(ext) {
                    tracing::debug!(file = %path.display(), "Changed");
                }
            }
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(watcher)
}
