//! Router Code Generator
//!
//! Emits the client router module (`router.js`) for a discovered route list.
//! This is plain templated text behind a pure `routes -> source` function:
//! no I/O, so the output can be asserted on directly.
//!
//! Dynamic patterns are compiled here, once, by [`RoutePattern`]; the module
//! embeds each anchored regex source next to its parameter names so the
//! browser never re-derives them and positional alignment cannot drift.

use std::fmt::Write;

use crate::discovery::{RouteDescriptor, RouteKind};
use crate::pattern::RoutePattern;

/// File name of the generated module inside the compiled-output root.
pub const ROUTER_FILE: &str = "router.js";

/// Default directory (inside the compiled-output root) of compiled pages.
pub const PAGES_OUTPUT_DIR: &str = "pages";

const ROUTER_RUNTIME: &str = r#"import React, { useState, useEffect, createContext, useContext } from 'react';

const RouterContext = createContext(null);

const isBrowser = typeof window !== 'undefined';

export function useRouter() {
  const context = useContext(RouterContext);
  if (!context) throw new Error('useRouter must be used within a Router');
  return context;
}

export function matchRoute(table, pathname) {
  for (const route of table) {
    if (route.type === 'static' && route.path === pathname) {
      return { route, params: {} };
    }
  }
  for (const route of table) {
    if (route.type !== 'dynamic' || !route.pattern) continue;
    const match = pathname.match(new RegExp(route.pattern));
    if (match) {
      const params = {};
      route.params.forEach((name, i) => { params[name] = match[i + 1]; });
      return { route, params };
    }
  }
  return { route: null, params: {} };
}

export function Router({ routes: table = routes, initialPath }) {
  const [state, setState] = useState(() =>
    matchRoute(table, initialPath ?? (isBrowser ? window.location.pathname : '/'))
  );

  useEffect(() => {
    const handlePopState = () => setState(matchRoute(table, window.location.pathname));
    window.addEventListener('popstate', handlePopState);
    return () => window.removeEventListener('popstate', handlePopState);
  }, [table]);

  function navigate(path) {
    window.history.pushState({}, '', path);
    setState(matchRoute(table, path));
  }

  const Component = state.route ? state.route.component : null;
  return React.createElement(
    RouterContext.Provider,
    { value: { currentRoute: state.route, params: state.params, navigate } },
    Component ? React.createElement(Component, { params: state.params }) : React.createElement(NotFound)
  );
}

export function Link({ to, children, ...props }) {
  const context = useContext(RouterContext);
  if (!isBrowser || !context) {
    return React.createElement('a', { href: to, ...props }, children);
  }
  return React.createElement('a', {
    href: to,
    onClick: (e) => {
      if (e.metaKey || e.ctrlKey || e.shiftKey || e.button !== 0) return;
      e.preventDefault();
      context.navigate(to);
    },
    ...props
  }, children);
}

function NotFound() {
  return React.createElement('div', {
    style: { display: 'flex', flexDirection: 'column', alignItems: 'center',
             justifyContent: 'center', minHeight: '100vh', fontFamily: 'system-ui' }
  },
    React.createElement('h1', { style: { fontSize: '6rem', margin: 0 } }, '404'),
    React.createElement('p', { style: { fontSize: '1.5rem', color: '#666' } }, 'Page not found'),
    React.createElement('a', { href: '/', style: { color: '#10b981', textDecoration: 'none' } }, 'Go home')
  );
}
"#;

/// Generate the router module for `routes`, preserving their order.
///
/// Total: an empty list yields a module exporting an empty `routes` table.
pub fn generate_router_module(routes: &[RouteDescriptor]) -> String {
    generate_router_module_at(routes, PAGES_OUTPUT_DIR)
}

/// Same as [`generate_router_module`], with page imports resolved under
/// `./<pages_dir>/` instead of `./pages/`.
pub fn generate_router_module_at(routes: &[RouteDescriptor], pages_dir: &str) -> String {
    let pages_dir = pages_dir.trim_matches('/');
    let mut out = String::with_capacity(ROUTER_RUNTIME.len() + routes.len() * 160);
    out.push_str(ROUTER_RUNTIME);
    out.push('\n');

    for (i, route) in routes.iter().enumerate() {
        let _ = writeln!(
            out,
            "import Page{} from {};",
            i,
            js_string(&format!("./{}/{}", pages_dir, route.compiled_relative_path()))
        );
    }
    if !routes.is_empty() {
        out.push('\n');
    }

    out.push_str("export const routes = [\n");
    for (i, route) in routes.iter().enumerate() {
        let (pattern, params) = match route.kind {
            RouteKind::Static => ("null".to_string(), "[]".to_string()),
            RouteKind::Dynamic => dynamic_matcher(route),
        };
        let _ = writeln!(
            out,
            "  {{ path: {path}, urlPattern: {path}, component: Page{i}, type: '{kind}', kind: '{kind}', pattern: {pattern}, params: {params} }},",
            path = js_string(&route.url_pattern),
            kind = route.kind.as_str(),
        );
    }
    out.push_str("];\n");

    out
}

fn dynamic_matcher(route: &RouteDescriptor) -> (String, String) {
    match RoutePattern::compile(&route.url_pattern) {
        Ok(compiled) => {
            let names = compiled
                .param_names()
                .iter()
                .map(|n| js_string(n))
                .collect::<Vec<_>>()
                .join(", ");
            (js_string(compiled.source()), format!("[{}]", names))
        }
        Err(e) => {
            tracing::warn!(pattern = %route.url_pattern, "Route can never match: {e}");
            ("null".to_string(), "[]".to_string())
        }
    }
}

/// JSON string literals are valid JavaScript string literals.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn route(pattern: &str, kind: RouteKind, file: &str) -> RouteDescriptor {
        RouteDescriptor {
            url_pattern: pattern.to_string(),
            kind,
            source_relative_path: file.to_string(),
            source_absolute_path: PathBuf::from("/site/src/pages").join(file),
        }
    }

    #[test]
    fn test_empty_route_list() {
        let module = generate_router_module(&[]);
        assert!(module.contains("export const routes = [\n];"));
        assert!(!module.contains("import Page"));
        assert!(module.contains("export function Router"));
    }

    #[test]
    fn test_one_import_per_route_in_order() {
        let module = generate_router_module(&[
            route("/", RouteKind::Static, "index.jsx"),
            route("/about", RouteKind::Static, "about.tsx"),
            route("/blog/[slug]", RouteKind::Dynamic, "blog/[slug].ts"),
        ]);

        assert!(module.contains("import Page0 from \"./pages/index.js\";"));
        assert!(module.contains("import Page1 from \"./pages/about.js\";"));
        assert!(module.contains("import Page2 from \"./pages/blog/[slug].js\";"));

        let first = module.find("path: \"/\"").unwrap();
        let second = module.find("path: \"/about\"").unwrap();
        let third = module.find("path: \"/blog/[slug]\"").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_dynamic_entry_carries_compiled_pattern() {
        let module = generate_router_module(&[route(
            "/user/[id]/[tab]",
            RouteKind::Dynamic,
            "user/[id]/[tab].jsx",
        )]);
        assert!(module.contains(
            r#"{ path: "/user/[id]/[tab]", urlPattern: "/user/[id]/[tab]", component: Page0, type: 'dynamic', kind: 'dynamic', pattern: "^/user/([^/]+)/([^/]+)$", params: ["id", "tab"] },"#
        ));
    }

    #[test]
    fn test_static_entry_has_no_pattern() {
        let module = generate_router_module(&[route("/about", RouteKind::Static, "about.jsx")]);
        assert!(module.contains(
            r#"{ path: "/about", urlPattern: "/about", component: Page0, type: 'static', kind: 'static', pattern: null, params: [] },"#
        ));
    }

    #[test]
    fn test_custom_pages_dir() {
        let module = generate_router_module_at(&[route("/", RouteKind::Static, "index.jsx")], "views/");
        assert!(module.contains("import Page0 from \"./views/index.js\";"));
    }

    #[test]
    fn test_link_degrades_outside_browser() {
        let module = generate_router_module(&[]);
        assert!(module.contains("typeof window !== 'undefined'"));
        assert!(module.contains("window.history.pushState"));
        assert!(module.contains("popstate"));
    }
}
