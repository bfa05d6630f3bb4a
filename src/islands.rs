//! Per-route Server Island analysis.
//!
//! Runs classify -> validate -> extract over every discovered route. Nothing
//! here is fatal except failing to read a page that discovery just found:
//! rule violations and extraction failures only demote a route to
//! client-only rendering, and both are logged with enough detail to fix them.

use serde::{Deserialize, Serialize};
use std::fs;

use crate::config::ProjectConfig;
use crate::discovery::RouteDescriptor;
use crate::error::{Error, Result};
use crate::extract::extract_static_html;
use crate::validate::{
    classify_with_marker, validate_with_router, IslandViolation, DEFAULT_ISLAND_MARKER,
    DEFAULT_ROUTER_MODULE,
};

/// What to look for when classifying and validating islands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandRules {
    pub marker_export: String,
    pub router_module: String,
}

impl Default for IslandRules {
    fn default() -> Self {
        Self {
            marker_export: DEFAULT_ISLAND_MARKER.to_string(),
            router_module: DEFAULT_ROUTER_MODULE.to_string(),
        }
    }
}

impl IslandRules {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            marker_export: config.island_marker_export(),
            router_module: config.router_module.clone(),
        }
    }
}

/// Outcome for one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerIslandClassification {
    pub url_pattern: String,
    pub source_relative_path: String,
    pub is_server_island: bool,
    pub violations: Vec<IslandViolation>,
    /// Human-readable form of `violations`, in the same order.
    pub validation_errors: Vec<String>,
    pub static_html: Option<String>,
}

impl ServerIslandClassification {
    /// Opted in and passed every rule.
    pub fn is_valid_island(&self) -> bool {
        self.is_server_island && self.violations.is_empty()
    }
}

/// Classify, validate and (when valid) extract one page's source.
pub fn classify_source(
    route: &RouteDescriptor,
    source: &str,
    rules: &IslandRules,
) -> ServerIslandClassification {
    let mut result = ServerIslandClassification {
        url_pattern: route.url_pattern.clone(),
        source_relative_path: route.source_relative_path.clone(),
        is_server_island: classify_with_marker(source, &rules.marker_export),
        violations: Vec::new(),
        validation_errors: Vec::new(),
        static_html: None,
    };

    if !result.is_server_island {
        return result;
    }

    result.violations = validate_with_router(source, &rules.router_module);
    result.validation_errors = result.violations.iter().map(ToString::to_string).collect();

    if result.violations.is_empty() {
        result.static_html = extract_static_html(source);
    }

    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Classification of every route, in route order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IslandReport {
    pub routes: Vec<ServerIslandClassification>,
}

impl IslandReport {
    /// Valid islands; `static_html` is `None` where extraction failed.
    pub fn server_islands(&self) -> impl Iterator<Item = &ServerIslandClassification> {
        self.routes.iter().filter(|r| r.is_valid_island())
    }

    /// Opted in but broke at least one rule.
    pub fn rejected(&self) -> impl Iterator<Item = &ServerIslandClassification> {
        self.routes
            .iter()
            .filter(|r| r.is_server_island && !r.violations.is_empty())
    }

    /// Everything rendered on the client: plain pages, rejected islands and
    /// islands whose HTML could not be extracted.
    pub fn client_only(&self) -> impl Iterator<Item = &ServerIslandClassification> {
        self.routes
            .iter()
            .filter(|r| !r.is_valid_island() || r.static_html.is_none())
    }

    /// The document handed to Build Assembly.
    pub fn manifest(&self) -> serde_json::Value {
        serde_json::json!({
            "routes": self.routes.iter().map(|r| &r.url_pattern).collect::<Vec<_>>(),
            "serverIslands": self
                .server_islands()
                .filter(|r| r.static_html.is_some())
                .map(|r| serde_json::json!({
                    "route": r.url_pattern,
                    "source": r.source_relative_path,
                    "staticHtml": r.static_html,
                }))
                .collect::<Vec<_>>(),
            "rejected": self
                .rejected()
                .map(|r| serde_json::json!({
                    "route": r.url_pattern,
                    "source": r.source_relative_path,
                    "errors": r.validation_errors,
                }))
                .collect::<Vec<_>>(),
            "clientOnly": self.client_only().map(|r| &r.url_pattern).collect::<Vec<_>>(),
        })
    }
}

/// Analyze every route. Reading a page is the only fatal step.
pub fn analyze_routes(routes: &[RouteDescriptor], rules: &IslandRules) -> Result<IslandReport> {
    let mut report = IslandReport::default();

    for route in routes {
        let source = fs::read_to_string(&route.source_absolute_path)
            .map_err(|e| Error::file_system(&route.source_absolute_path, e))?;
        let result = classify_source(route, &source, rules);
        log_classification(&result);
        report.routes.push(result);
    }

    Ok(report)
}

fn log_classification(result: &ServerIslandClassification) {
    if !result.is_server_island {
        tracing::debug!(route = %result.url_pattern, "Client-only");
        return;
    }

    if !result.violations.is_empty() {
        for message in &result.validation_errors {
            tracing::error!(
                route = %result.url_pattern,
                file = %result.source_relative_path,
                "Server island {}",
                message
            );
        }
        tracing::error!(
            route = %result.url_pattern,
            "Server islands must be pure static JSX; rendering {} on the client instead",
            result.url_pattern
        );
        return;
    }

    match &result.static_html {
        Some(html) => tracing::info!(
            route = %result.url_pattern,
            bytes = html.len(),
            "Server island extracted"
        ),
        None => tracing::warn!(
            route = %result.url_pattern,
            file = %result.source_relative_path,
            "Could not extract static HTML; falling back to client-only"
        ),
    }
}
