//! Dev notification hub.
//!
//! The registry of connected dev clients is an explicit object, shared by
//! reference between the file watcher setup and the rebuild scheduler.
//! `add`, `remove` and `broadcast` are its whole public surface.
//!
//! # Message Types
//!
//! - `recompiling`: a rebuild started
//! - `compiled`: the rebuild succeeded (a `reload` follows shortly)
//! - `reload`: clients should reload the page
//! - `compilation-error`: the rebuild failed; `message` says why

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Message sent to dev clients, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DevMessage {
    Recompiling,
    Compiled,
    Reload,
    CompilationError { message: String },
}

impl DevMessage {
    pub fn compilation_error(message: impl Into<String>) -> Self {
        Self::CompilationError {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }

    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

#[derive(Debug, Error)]
#[error("client disconnected")]
pub struct ClientGone;

/// Transport to one connected client. The transport itself (WebSocket,
/// SSE, ...) belongs to the dev server.
pub trait NotificationSink: Send + Sync {
    fn send(&self, payload: &str) -> Result<(), ClientGone>;
}

impl NotificationSink for UnboundedSender<String> {
    fn send(&self, payload: &str) -> Result<(), ClientGone> {
        UnboundedSender::send(self, payload.to_string()).map_err(|_| ClientGone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

#[derive(Default)]
pub struct NotificationHub {
    clients: Mutex<HashMap<ClientId, Box<dyn NotificationSink>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, sink: impl NotificationSink + 'static) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.clients.lock().insert(id, Box::new(sink));
        tracing::debug!(client = id.0, "Dev client connected");
        id
    }

    /// Returns false if the client was already gone.
    pub fn remove(&self, id: ClientId) -> bool {
        let removed = self.clients.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(client = id.0, "Dev client disconnected");
        }
        removed
    }

    /// Send `message` to every client, dropping the ones that fail.
    /// Returns how many clients received it.
    pub fn broadcast(&self, message: &DevMessage) -> usize {
        let payload = message.to_json();
        let mut clients = self.clients.lock();
        clients.retain(|id, sink| match sink.send(&payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(client = id.0, "Dropping dev client: {e}");
                false
            }
        });
        clients.len()
    }
}
