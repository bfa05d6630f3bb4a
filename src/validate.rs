//! Server Island classification and validation.
//!
//! A page opts in with an exact sentinel export. Opted-in pages are then
//! checked against a fixed rule set; every violated rule is reported, so a
//! developer can fix all of them in one go. A page with violations is not
//! an error for the build: it ships as an ordinary client-rendered page.
//!
//! All checks are textual. They are deliberately the same rules the static
//! extractor relies on: anything that would need a runtime is rejected here
//! so extraction never has to guess.

#[cfg(feature = "napi")]
use napi_derive::napi;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker export with the default `server` value.
pub const DEFAULT_ISLAND_MARKER: &str = r#"export const render = "server""#;

pub const DEFAULT_ROUTER_MODULE: &str = "bertui/router";

/// Reactive state and lifecycle hooks.
pub const FORBIDDEN_HOOKS: &[&str] = &[
    "useState",
    "useEffect",
    "useContext",
    "useReducer",
    "useCallback",
    "useMemo",
    "useRef",
    "useImperativeHandle",
    "useLayoutEffect",
    "useDebugValue",
    "useId",
    "useDeferredValue",
    "useTransition",
    "useSyncExternalStore",
];

/// Inline event-handler attributes.
pub const FORBIDDEN_EVENT_HANDLERS: &[&str] = &[
    "onClick",
    "onChange",
    "onSubmit",
    "onInput",
    "onFocus",
    "onBlur",
    "onMouseEnter",
    "onMouseLeave",
    "onKeyDown",
    "onKeyUp",
    "onScroll",
];

lazy_static! {
    static ref RETURN_RE: Regex = Regex::new(r"\breturn\s*\(").unwrap();

    static ref HOOK_RES: Vec<(&'static str, Regex)> = FORBIDDEN_HOOKS
        .iter()
        .map(|hook| (*hook, Regex::new(&format!(r"\b{}\s*\(", hook)).unwrap()))
        .collect();

    // Attribute position only: `onClick=` after whitespace or `{`. Plain
    // bindings such as `const onClick = 1` are not handlers.
    static ref EVENT_RES: Vec<(&'static str, Regex)> = FORBIDDEN_EVENT_HANDLERS
        .iter()
        .map(|name| (*name, Regex::new(&format!(r"(?m)(?:^|[\s{{]){}=", name)).unwrap()))
        .collect();

    static ref IMPORT_SOURCE_RE: Regex =
        Regex::new(r#"(?:\bfrom\s*|\bimport\s+)['"](?P<spec>[^'"\n]+)['"]"#).unwrap();

    static ref DYNAMIC_IMPORT_RE: Regex = Regex::new(r"\bimport\s*\(").unwrap();

    static ref ASYNC_RE: Regex =
        Regex::new(r"\basync\s+function\b|\basync\s*\(|\basync\s+\w+\s*\(").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIOLATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// One broken Server Island rule. `Display` is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "rule", content = "name", rename_all = "kebab-case")]
pub enum IslandViolation {
    #[error("uses the {0} hook; server islands render once at build time and cannot hold state or effects")]
    Hook(String),

    #[error("imports from '{0}'; use plain <a> tags instead of Link in a server island")]
    RouterImport(String),

    #[error("uses the {0} event handler; server islands are static HTML with no interactivity")]
    EventHandler(String),

    #[error("uses a dynamic import(); server islands must be fully known at build time")]
    DynamicImport,

    #[error("uses an async function; server islands must render synchronously")]
    Async,
}

impl IslandViolation {
    pub fn rule(&self) -> &'static str {
        match self {
            IslandViolation::Hook(_) => "hook",
            IslandViolation::RouterImport(_) => "router-import",
            IslandViolation::EventHandler(_) => "event-handler",
            IslandViolation::DynamicImport => "dynamic-import",
            IslandViolation::Async => "async",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFY / VALIDATE
// ═══════════════════════════════════════════════════════════════════════════════

/// True iff `source` contains the default marker export.
pub fn classify(source: &str) -> bool {
    classify_with_marker(source, DEFAULT_ISLAND_MARKER)
}

pub fn classify_with_marker(source: &str, marker_export: &str) -> bool {
    source.contains(marker_export)
}

/// Check `source` against every rule, using the default router module.
pub fn validate(source: &str) -> Vec<IslandViolation> {
    validate_with_router(source, DEFAULT_ROUTER_MODULE)
}

/// Every rule is checked independently; the result lists all violations in
/// rule order (hooks, router import, event handlers, dynamic import, async).
pub fn validate_with_router(source: &str, router_module: &str) -> Vec<IslandViolation> {
    let mut violations = Vec::new();

    // Hooks only count before the render-returning statement.
    let before_return = match RETURN_RE.find(source) {
        Some(m) => &source[..m.start()],
        None => source,
    };
    for (hook, re) in HOOK_RES.iter() {
        if re.is_match(before_return) {
            violations.push(IslandViolation::Hook(hook.to_string()));
        }
    }

    if IMPORT_SOURCE_RE
        .captures_iter(source)
        .any(|caps| &caps["spec"] == router_module)
    {
        violations.push(IslandViolation::RouterImport(router_module.to_string()));
    }

    for (name, re) in EVENT_RES.iter() {
        if re.is_match(source) {
            violations.push(IslandViolation::EventHandler(name.to_string()));
        }
    }

    if DYNAMIC_IMPORT_RE.is_match(source) {
        violations.push(IslandViolation::DynamicImport);
    }

    if ASYNC_RE.is_match(source) {
        violations.push(IslandViolation::Async);
    }

    violations
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn validate_server_island_native(source: String) -> napi::Result<serde_json::Value> {
    let is_server_island = classify(&source);
    let errors: Vec<String> = if is_server_island {
        validate(&source).iter().map(ToString::to_string).collect()
    } else {
        Vec::new()
    };
    Ok(serde_json::json!({
        "isServerIsland": is_server_island,
        "validationErrors": errors,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_requires_exact_marker() {
        assert!(classify("export const render = \"server\";\nexport default () => null;"));
        assert!(!classify("export const render = 'server';"));
        assert!(!classify("export const render = \"client\";"));
        assert!(!classify("// render on the server"));
    }

    #[test]
    fn test_classify_custom_marker() {
        assert!(classify_with_marker(
            "export const render = \"static\"",
            "export const render = \"static\""
        ));
    }

    #[test]
    fn test_hook_before_return() {
        let src = "export default function P() {\n  const [n] = useState(0);\n  return (<p>{n}</p>);\n}";
        assert_eq!(validate(src), vec![IslandViolation::Hook("useState".into())]);
    }

    #[test]
    fn test_hook_after_return_is_ignored() {
        let src = "export default function P() {\n  return (<p>useState(0)</p>);\n}";
        assert!(validate(src).is_empty());
    }

    #[test]
    fn test_hook_name_prefix_is_not_a_hook() {
        let src = "const x = myuseState(1);\nexport default () => { return (<p/>); }";
        assert!(validate(src).is_empty());
    }

    #[test]
    fn test_router_import_either_quote() {
        let single = "import { Link } from 'bertui/router';\nexport default () => { return (<p/>); }";
        let double = "import { Link } from \"bertui/router\";\nexport default () => { return (<p/>); }";
        for src in [single, double] {
            assert_eq!(
                validate(src),
                vec![IslandViolation::RouterImport("bertui/router".into())]
            );
        }
    }

    #[test]
    fn test_event_handler() {
        let src = "export default () => { return (<button onClick={() => go()}>Go</button>); }";
        assert_eq!(
            validate(src),
            vec![IslandViolation::EventHandler("onClick".into())]
        );
    }

    #[test]
    fn test_event_name_as_plain_binding_is_allowed() {
        let src = "export const render = \"server\";\nconst onClick = 1;\nconst same = onScroll == x;\nexport default function P() {\n  return (<p>hi</p>);\n}";
        assert!(validate(src).is_empty());
    }

    #[test]
    fn test_event_handler_on_its_own_line() {
        let src = "export default () => { return (\n<input\nonChange={f}\n/>); }";
        assert_eq!(
            validate(src),
            vec![IslandViolation::EventHandler("onChange".into())]
        );
    }

    #[test]
    fn test_all_violations_reported() {
        let src = r#"
import { Link } from 'bertui/router';
export default async function P() {
  const [a] = useState(0);
  const r = useRef(null);
  const mod = import('./heavy');
  return (<div onClick={x} onScroll={y}><Link to="/">a</Link></div>);
}
"#;
        let rules: Vec<&str> = validate(src).iter().map(|v| v.rule()).collect();
        assert_eq!(
            rules,
            vec![
                "hook",
                "hook",
                "router-import",
                "event-handler",
                "event-handler",
                "dynamic-import",
                "async"
            ]
        );
    }

    #[test]
    fn test_async_forms() {
        for src in [
            "async function load() {}",
            "const f = async () => 1;",
            "const o = { async fetchAll() {} };",
        ] {
            assert_eq!(validate(src), vec![IslandViolation::Async], "{src}");
        }
    }

    #[test]
    fn test_messages_are_readable() {
        let msg = IslandViolation::Hook("useEffect".into()).to_string();
        assert!(msg.contains("useEffect"));
        let msg = IslandViolation::EventHandler("onSubmit".into()).to_string();
        assert!(msg.contains("onSubmit"));
    }
}
