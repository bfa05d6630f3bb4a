//! Compile Orchestrator
//!
//! One pass: `discover routes -> transpile tree -> (routes?) generate router`.
//!
//! The source tree is mirrored into the output root. Dialect files go through
//! the full [`Transpiler`]; plain `.js` takes the textual light path;
//! stylesheets are collected for the CSS collaborator and everything else
//! is skipped. Per-file work is independent and runs on rayon; results are
//! folded back in walk order so counters and logs are deterministic.
//!
//! A missing source root is fatal. A file that fails to transpile is logged,
//! left out of the output tree and recorded in [`CompileOutput::failures`];
//! the pass carries on.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::cache::IncrementalCache;
use crate::codegen::{generate_router_module_at, ROUTER_FILE};
use crate::config::{EnvValues, Project, Specifiers};
use crate::discovery::{discover_routes, is_stylesheet_extension, RouteDescriptor};
use crate::error::{Error, Result, TranspileError};
use crate::transpile::{output_path_for, Dialect, Transpiler};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Reset at the start of every pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileStats {
    pub files_compiled: usize,
    pub files_skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub output_root: PathBuf,
    pub stats: CompileStats,
    pub routes: Vec<RouteDescriptor>,
    /// Only written when at least one route exists.
    pub router_path: Option<PathBuf>,
    pub failures: Vec<TranspileError>,
    /// Stylesheets found in the source tree, in walk order.
    pub stylesheets: Vec<PathBuf>,
    pub duration_ms: u64,
}

impl CompileOutput {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One line per failed file, for dev-mode error messages.
    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Compiler {
    transpiler: Transpiler,
    /// Relative to the source root.
    pages_dir: PathBuf,
    cache_dir: Option<PathBuf>,
    clean_output: bool,
}

enum Job {
    Transpile { source: PathBuf, dialect: Dialect },
    Stylesheet(PathBuf),
    Skip(PathBuf),
}

enum FileOutcome {
    Compiled,
    Failed(TranspileError),
}

impl Compiler {
    pub fn new(transpiler: Transpiler) -> Self {
        Self {
            transpiler,
            pages_dir: PathBuf::from("pages"),
            cache_dir: None,
            clean_output: false,
        }
    }

    /// Compiler configured from `bertui.toml`: virtual specifiers, env values,
    /// pages directory and the transpile cache.
    pub fn for_project(project: &Project) -> Self {
        let config = &project.config;
        Self::new(Transpiler::new(config.specifiers(), config.env.clone()))
            .with_pages_dir(&config.pages_dir)
            .with_cache_dir(project.cache_root())
    }

    pub fn with_pages_dir(mut self, pages_dir: impl Into<PathBuf>) -> Self {
        self.pages_dir = pages_dir.into();
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    /// Delete the output root before compiling into it.
    pub fn clean_output(mut self, clean: bool) -> Self {
        self.clean_output = clean;
        self
    }

    pub fn compile(&self, source_root: &Path, output_root: &Path) -> Result<CompileOutput> {
        let started = Instant::now();

        let meta = fs::metadata(source_root).map_err(|e| Error::file_system(source_root, e))?;
        if !meta.is_dir() {
            return Err(Error::file_system(
                source_root,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        if self.clean_output && output_root.exists() {
            fs::remove_dir_all(output_root).map_err(|e| Error::io(output_root, e))?;
        }
        fs::create_dir_all(output_root).map_err(|e| Error::io(output_root, e))?;

        // DiscoverRoutes
        let pages_root = source_root.join(&self.pages_dir);
        let routes = if pages_root.is_dir() {
            discover_routes(&pages_root)?
        } else {
            tracing::debug!(dir = %pages_root.display(), "No pages directory; compiling without routes");
            Vec::new()
        };

        // TranspileTree
        let router_path = output_root.join(ROUTER_FILE);
        let jobs = self.collect_jobs(source_root, output_root)?;
        let cache = self
            .cache_dir
            .as_ref()
            .map(|dir| IncrementalCache::new(dir, &self.transpiler));

        let outcomes: Vec<Result<Option<FileOutcome>>> = jobs
            .par_iter()
            .map(|job| match job {
                Job::Transpile { source, dialect } => self
                    .compile_file(
                        source,
                        *dialect,
                        &output_path_for(source_root, output_root, source),
                        &router_path,
                        cache.as_ref(),
                    )
                    .map(Some),
                Job::Stylesheet(_) | Job::Skip(_) => Ok(None),
            })
            .collect();

        let mut stats = CompileStats::default();
        let mut failures = Vec::new();
        let mut stylesheets = Vec::new();

        for (job, outcome) in jobs.into_iter().zip(outcomes) {
            match (job, outcome?) {
                (_, Some(FileOutcome::Compiled)) => stats.files_compiled += 1,
                (_, Some(FileOutcome::Failed(err))) => {
                    tracing::error!(file = %err.file.display(), "{}", err.message);
                    failures.push(err);
                }
                (Job::Stylesheet(path), None) => {
                    stats.files_skipped += 1;
                    stylesheets.push(path);
                }
                (Job::Skip(path), None) => {
                    tracing::debug!(file = %path.display(), "Skipped");
                    stats.files_skipped += 1;
                }
                (Job::Transpile { .. }, None) => {}
            }
        }

        // GenerateRouter
        let router_path = if routes.is_empty() {
            None
        } else {
            let pages_prefix = self.pages_dir.to_string_lossy().replace('\\', "/");
            let module = generate_router_module_at(&routes, &pages_prefix);
            fs::write(&router_path, module).map_err(|e| Error::io(&router_path, e))?;
            Some(router_path)
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            compiled = stats.files_compiled,
            skipped = stats.files_skipped,
            failed = failures.len(),
            routes = routes.len(),
            duration_ms,
            "Compiled {}",
            source_root.display()
        );

        Ok(CompileOutput {
            output_root: output_root.to_path_buf(),
            stats,
            routes,
            router_path,
            failures,
            stylesheets,
            duration_ms,
        })
    }

    /// Walk the source tree in sorted order, mirroring directories into the
    /// output root and classifying every file.
    fn collect_jobs(&self, source_root: &Path, output_root: &Path) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();

        let walker = WalkDir::new(source_root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            // the output tree may live inside the source tree
            .filter_entry(|e| !e.path().starts_with(output_root));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| source_root.to_path_buf());
                Error::file_system(path, e.into())
            })?;
            let path = entry.path();

            if entry.file_type().is_dir() {
                if let Ok(relative) = path.strip_prefix(source_root) {
                    let mirrored = output_root.join(relative);
                    fs::create_dir_all(&mirrored).map_err(|e| Error::io(&mirrored, e))?;
                }
                continue;
            }

            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();

            let job = match Dialect::from_extension(ext) {
                Some(dialect) => Job::Transpile {
                    source: path.to_path_buf(),
                    dialect,
                },
                None if is_stylesheet_extension(ext) => Job::Stylesheet(path.to_path_buf()),
                None => Job::Skip(path.to_path_buf()),
            };
            jobs.push(job);
        }

        Ok(jobs)
    }

    fn compile_file(
        &self,
        source_path: &Path,
        dialect: Dialect,
        output_path: &Path,
        router_path: &Path,
        cache: Option<&IncrementalCache>,
    ) -> Result<FileOutcome> {
        let source = match fs::read_to_string(source_path) {
            Ok(s) => s,
            Err(e) => {
                return Ok(FileOutcome::Failed(TranspileError::new(
                    source_path,
                    format!("cannot read source: {e}"),
                )))
            }
        };

        let cached = cache.and_then(|c| c.get(&source, output_path, router_path));
        let code = match cached {
            Some(code) => {
                tracing::debug!(file = %source_path.display(), "Cache hit");
                code
            }
            None => match self
                .transpiler
                .transpile_file(&source, dialect, output_path, router_path)
            {
                Ok(code) => {
                    if let Some(cache) = cache {
                        cache.set(&source, output_path, router_path, &code);
                    }
                    code
                }
                Err(err) => {
                    return Ok(FileOutcome::Failed(TranspileError::new(
                        source_path,
                        err.message,
                    )))
                }
            },
        };

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(output_path, code).map_err(|e| Error::io(output_path, e))?;
        tracing::debug!(file = %source_path.display(), out = %output_path.display(), "Compiled");

        Ok(FileOutcome::Compiled)
    }
}

/// Compile `source_root` into `output_root` with the default virtual
/// specifiers and the given placeholder values.
pub fn compile(source_root: &Path, output_root: &Path, env: EnvValues) -> Result<CompileOutput> {
    Compiler::new(Transpiler::new(Specifiers::default(), env)).compile(source_root, output_root)
}

/// Compile a whole project into its configured compiled-output directory.
pub fn compile_project(project: &Project) -> Result<CompileOutput> {
    Compiler::for_project(project)
        .clean_output(true)
        .compile(&project.source_root(), &project.compiled_root())
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(project_root: String) -> napi::Result<serde_json::Value> {
    let output = Project::load(&project_root)
        .and_then(|project| compile_project(&project))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_source_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile(
            &dir.path().join("missing"),
            &dir.path().join("out"),
            EnvValues::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FileSystem { .. }));
    }

    #[test]
    fn test_transpile_failure_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write(&src, "pages/index.jsx", "export default () => <p>ok</p>;\n");
        write(&src, "pages/broken.jsx", "export default () => <p>;\n");

        let output = compile(&src, &out, EnvValues::new()).unwrap();
        assert_eq!(output.stats.files_compiled, 1);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].file, src.join("pages/broken.jsx"));
        assert!(out.join("pages/index.js").is_file());
        assert!(!out.join("pages/broken.js").exists());
        // the broken page is still a route
        assert_eq!(output.routes.len(), 2);
    }

    #[test]
    fn test_stylesheets_and_assets_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write(&src, "pages/index.jsx", "import './index.css';\nexport default () => <p/>;\n");
        write(&src, "pages/index.css", "p { color: red }");
        write(&src, "README.md", "# notes");
        write(&src, "lib/util.js", "export const x = 1;\n");

        let output = compile(&src, &out, EnvValues::new()).unwrap();
        assert_eq!(output.stats, CompileStats { files_compiled: 2, files_skipped: 2 });
        assert_eq!(output.stylesheets, vec![src.join("pages/index.css")]);
        assert!(out.join("lib/util.js").is_file());
        assert!(!out.join("pages/index.css").exists());
    }

    #[test]
    fn test_no_pages_means_no_router() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write(&src, "main.jsx", "export const App = () => <div/>;\n");

        let output = compile(&src, &out, EnvValues::new()).unwrap();
        assert!(output.routes.is_empty());
        assert_eq!(output.router_path, None);
        assert!(!out.join(ROUTER_FILE).exists());
    }

    #[test]
    fn test_cached_pass_produces_same_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write(&src, "pages/about.jsx", "export default () => <h1>About</h1>;\n");

        let compiler = Compiler::new(Transpiler::default()).with_cache_dir(dir.path().join("cache"));
        let first = compiler.compile(&src, &out).unwrap();
        let first_text = fs::read_to_string(out.join("pages/about.js")).unwrap();
        let second = compiler.compile(&src, &out).unwrap();
        let second_text = fs::read_to_string(out.join("pages/about.js")).unwrap();

        assert_eq!(first.stats, second.stats);
        assert_eq!(first_text, second_text);
    }

    #[test]
    fn test_clean_output_removes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        write(&src, "pages/index.jsx", "export default () => <p/>;\n");
        write(&out, "stale.js", "old");

        Compiler::new(Transpiler::default())
            .clean_output(true)
            .compile(&src, &out)
            .unwrap();
        assert!(!out.join("stale.js").exists());
        assert!(out.join(ROUTER_FILE).is_file());
    }
}
