//! # BertUI Native Core
//!
//! Route discovery, JSX compilation and Server Island extraction for a
//! file-routed React framework.
//!
//! ## Pipeline
//!
//! 1. **Discovery**: every `.jsx/.tsx/.js/.ts` file under the pages root
//!    becomes a route. `index` collapses to its directory, `[name]` segments
//!    make a route dynamic, and the list is sorted static-first, then by
//!    pattern.
//!
//! 2. **Transpile**: each source file is rewritten (stylesheet imports
//!    dropped, env placeholders inlined, virtual router import resolved),
//!    lowered with oxc using the classic JSX runtime, and given explicit
//!    `.js` relative specifiers.
//!
//! 3. **Router**: a `router.js` module is generated from the route list. It
//!    matches static routes by equality first, then dynamic routes by their
//!    precompiled regex, in list order.
//!
//! 4. **Server Islands**: pages exporting `render = "server"` are validated
//!    (no hooks, router imports, event handlers, dynamic imports or async)
//!    and lowered to static HTML. Any failure falls back to client-only
//!    rendering, never to a failed build.
//!
//! ## Error Policy
//!
//! A missing source or pages root aborts the pass ([`Error::FileSystem`]).
//! A file that fails to transpile is logged and left out; the pass goes on.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod build;
pub mod cache;
pub mod codegen;
pub mod compile;
pub mod config;
pub mod dev;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod hub;
pub mod islands;
pub mod pattern;
pub mod transpile;
pub mod validate;

#[cfg(test)]
mod island_tests;

pub use build::{build_project, BuildOutput};
pub use codegen::generate_router_module;
pub use compile::{compile, compile_project, CompileOutput, CompileStats, Compiler};
pub use config::{Project, ProjectConfig};
pub use dev::{DevSession, RebuildScheduler};
pub use discovery::{discover_routes, RouteDescriptor, RouteKind};
pub use error::{Error, Result, TranspileError};
pub use extract::extract_static_html;
pub use hub::{DevMessage, NotificationHub};
pub use islands::{analyze_routes, IslandReport, ServerIslandClassification};
pub use pattern::{RouteMatch, RoutePattern, RouteTable};
pub use transpile::{Dialect, Transpiler};
pub use validate::{classify, validate, IslandViolation};

#[cfg(feature = "napi")]
#[napi]
pub fn native_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
