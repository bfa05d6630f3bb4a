//! Route Discovery
//!
//! Walks the pages directory and turns every page source file into a
//! [`RouteDescriptor`]. The resulting list is sorted static-before-dynamic,
//! then by URL pattern, which is the order the generated router matches in.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::pattern::{display_pattern, has_params};

// ═══════════════════════════════════════════════════════════════════════════════
// EXTENSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Extensions that produce routes (and get compiled).
pub const SOURCE_EXTENSIONS: &[&str] = &["jsx", "tsx", "js", "ts"];

/// Stylesheets never become routes.
pub const STYLESHEET_EXTENSION: &str = "css";

pub fn is_source_extension(ext: &str) -> bool {
    SOURCE_EXTENSIONS.contains(&ext)
}

pub fn is_stylesheet_extension(ext: &str) -> bool {
    ext == STYLESHEET_EXTENSION
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Static routes order before dynamic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Static,
    Dynamic,
}

impl RouteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Static => "static",
            RouteKind::Dynamic => "dynamic",
        }
    }
}

/// One discovered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    /// Absolute URL path; dynamic segments keep their `[name]` brackets.
    pub url_pattern: String,
    pub kind: RouteKind,
    /// Relative to the pages root, `/`-separated.
    pub source_relative_path: String,
    pub source_absolute_path: PathBuf,
}

impl RouteDescriptor {
    /// Colon-style pattern for logs (`/blog/:slug`).
    pub fn display_pattern(&self) -> String {
        display_pattern(&self.url_pattern)
    }

    /// Pages-relative path of the compiled module (`blog/[slug].js`).
    pub fn compiled_relative_path(&self) -> String {
        match self.source_relative_path.rsplit_once('.') {
            Some((stem, _)) => format!("{}.js", stem),
            None => format!("{}.js", self.source_relative_path),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Discover all routes under `pages_root`.
///
/// Fails with [`Error::FileSystem`] when the root is missing, is not a
/// directory, or any entry below it cannot be read.
pub fn discover_routes(pages_root: &Path) -> Result<Vec<RouteDescriptor>> {
    let meta = fs::metadata(pages_root).map_err(|e| Error::file_system(pages_root, e))?;
    if !meta.is_dir() {
        return Err(Error::file_system(
            pages_root,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut routes = Vec::new();

    for entry in WalkDir::new(pages_root)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| pages_root.to_path_buf());
            Error::file_system(path, e.into())
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(pages_root) else {
            continue;
        };

        if let Some(route) = route_for_file(relative, entry.path()) {
            routes.push(route);
        }
    }

    sort_routes(&mut routes);
    warn_on_conflicts(&routes);

    tracing::debug!(count = routes.len(), root = %pages_root.display(), "Discovered routes");
    Ok(routes)
}

/// Static before dynamic, then by pattern. Source path breaks exact ties so
/// repeated runs over the same tree always agree.
pub fn sort_routes(routes: &mut [RouteDescriptor]) {
    routes.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.url_pattern.cmp(&b.url_pattern))
            .then_with(|| a.source_relative_path.cmp(&b.source_relative_path))
    });
}

/// Map one pages-relative file to its route, or `None` if it is not a page.
pub fn route_for_file(relative: &Path, absolute: &Path) -> Option<RouteDescriptor> {
    let ext = relative.extension()?.to_str()?;
    if is_stylesheet_extension(ext) || !is_source_extension(ext) {
        return None;
    }

    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let file_name = segments.pop()?;
    let stem = file_name
        .strip_suffix(ext)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(&file_name)
        .to_string();

    let source_relative_path = if segments.is_empty() {
        file_name.clone()
    } else {
        format!("{}/{}", segments.join("/"), file_name)
    };

    if stem != "index" {
        segments.push(stem);
    }

    let url_pattern = format!("/{}", segments.join("/"));
    let kind = if has_params(&url_pattern) {
        RouteKind::Dynamic
    } else {
        RouteKind::Static
    };

    Some(RouteDescriptor {
        url_pattern,
        kind,
        source_relative_path,
        source_absolute_path: absolute.to_path_buf(),
    })
}

fn warn_on_conflicts(routes: &[RouteDescriptor]) {
    for pair in routes.windows(2) {
        if pair[0].kind == pair[1].kind && pair[0].url_pattern == pair[1].url_pattern {
            tracing::warn!(
                pattern = %pair[0].url_pattern,
                first = %pair[0].source_relative_path,
                second = %pair[1].source_relative_path,
                "Two pages map to the same route; the first one wins"
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn discover_routes_native(pages_root: String) -> napi::Result<serde_json::Value> {
    let routes = discover_routes(Path::new(&pages_root))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(routes).map_err(|e| napi::Error::from_reason(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
