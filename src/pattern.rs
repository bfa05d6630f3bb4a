//! Bracket route patterns.
//!
//! A dynamic URL pattern such as `/user/[id]/[tab]` compiles to an anchored
//! regex with one capture group per bracketed name. Group positions and
//! parameter names come out of the same left-to-right pass over the pattern,
//! so the Nth name always belongs to the Nth group. The generated router
//! embeds these precompiled sources, and [`RouteTable`] resolves paths with
//! the same semantics on the Rust side.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::discovery::{RouteDescriptor, RouteKind};

lazy_static! {
    static ref PARAM_RE: Regex = Regex::new(r"\[([^\]/]+)\]").unwrap();
}

/// Capture group used for every bracketed segment.
pub const PARAM_GROUP: &str = "([^/]+)";

/// Extracted route parameters, name to value.
pub type Params = BTreeMap<String, String>;

/// True if the pattern contains at least one `[name]` placeholder.
pub fn has_params(pattern: &str) -> bool {
    PARAM_RE.is_match(pattern)
}

/// `/blog/[slug]` as `/blog/:slug`.
pub fn display_pattern(pattern: &str) -> String {
    PARAM_RE.replace_all(pattern, ":$1").into_owned()
}

#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    param_names: Vec<String>,
    regex: Regex,
}

impl RoutePattern {
    pub fn compile(url_pattern: &str) -> Result<Self, regex::Error> {
        let mut source = String::from("^");
        let mut param_names = Vec::new();
        let mut last = 0;

        for caps in PARAM_RE.captures_iter(url_pattern) {
            let Some(whole) = caps.get(0) else { continue };
            source.push_str(&regex::escape(&url_pattern[last..whole.start()]));
            source.push_str(PARAM_GROUP);
            param_names.push(caps[1].to_string());
            last = whole.end();
        }
        source.push_str(&regex::escape(&url_pattern[last..]));
        source.push('$');

        let regex = Regex::new(&source)?;
        Ok(Self {
            source,
            param_names,
            regex,
        })
    }

    /// Anchored regex source, valid for both Rust `regex` and JavaScript `RegExp`.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn match_path(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        Some(
            self.param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    caps.get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    Found {
        route: &'a RouteDescriptor,
        params: Params,
    },
    NotFound,
}

/// Route table with the generated router's matching rules: exact static
/// equality first, then dynamic patterns in table order, first match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<(RouteDescriptor, Option<RoutePattern>)>,
}

impl RouteTable {
    pub fn new(routes: &[RouteDescriptor]) -> Self {
        let entries = routes
            .iter()
            .map(|route| {
                let pattern = match route.kind {
                    RouteKind::Static => None,
                    RouteKind::Dynamic => match RoutePattern::compile(&route.url_pattern) {
                        Ok(p) => Some(p),
                        Err(e) => {
                            tracing::warn!(pattern = %route.url_pattern, "Unusable route pattern: {e}");
                            None
                        }
                    },
                };
                (route.clone(), pattern)
            })
            .collect();
        Self { entries }
    }

    pub fn resolve(&self, path: &str) -> RouteMatch<'_> {
        for (route, _) in &self.entries {
            if route.kind == RouteKind::Static && route.url_pattern == path {
                return RouteMatch::Found {
                    route,
                    params: Params::new(),
                };
            }
        }

        for (route, pattern) in &self.entries {
            if let Some(pattern) = pattern {
                if let Some(params) = pattern.match_path(path) {
                    return RouteMatch::Found { route, params };
                }
            }
        }

        RouteMatch::NotFound
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
