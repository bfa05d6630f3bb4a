//! Production build pass.
//!
//! `clean -> compile -> island analysis -> islands.json`. The result is what
//! the Build Assembly collaborator consumes: the compiled tree with its
//! router module, the route list, and the island manifest.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::compile::{CompileOutput, Compiler};
use crate::config::Project;
use crate::error::{Error, Result};
use crate::islands::{analyze_routes, IslandReport, IslandRules};

pub const ISLANDS_MANIFEST: &str = "islands.json";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub compile: CompileOutput,
    pub islands: IslandReport,
    pub manifest_path: PathBuf,
}

/// Run a full production build for `project` into its build directory.
pub fn build_project(project: &Project) -> Result<BuildOutput> {
    let build_root = project.build_root();
    tracing::info!(dir = %build_root.display(), "Building for production");

    let compile = Compiler::for_project(project)
        .clean_output(true)
        .compile(&project.source_root(), &build_root)?;

    if compile.has_failures() {
        tracing::warn!(
            failed = compile.failures.len(),
            "Some files failed to compile; the bundler will report missing modules"
        );
    }

    // Island analysis needs every page compiled and every route known.
    let islands = analyze_routes(&compile.routes, &IslandRules::from_config(&project.config))?;

    let manifest_path = build_root.join(ISLANDS_MANIFEST);
    let manifest = serde_json::to_string_pretty(&islands.manifest())?;
    fs::write(&manifest_path, manifest).map_err(|e| Error::io(&manifest_path, e))?;

    let server_islands = islands.server_islands().count();
    let client_only = islands.client_only().count();
    tracing::info!(
        routes = compile.routes.len(),
        server_islands,
        client_only,
        "Build complete"
    );
    for route in &compile.routes {
        tracing::info!(kind = route.kind.as_str(), "  {}", route.display_pattern());
    }

    Ok(BuildOutput {
        compile,
        islands,
        manifest_path,
    })
}

#[cfg(feature = "napi")]
#[napi]
pub fn build_native(project_root: String) -> napi::Result<serde_json::Value> {
    let output = Project::load(&project_root)
        .and_then(|project| build_project(&project))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}
