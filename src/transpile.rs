//! Source Transpiler
//!
//! Turns one page or component source file into browser-ready JavaScript.
//! The pipeline is mostly textual; only the JSX/TypeScript lowering step
//! parses the file:
//!
//! 1. strip stylesheet imports (`*.css` and the virtual styles module)
//! 2. substitute `process.env.NAME` / `import.meta.env.NAME` placeholders
//! 3. point the virtual router import at the generated router module
//! 4. lower JSX (classic runtime) and strip TypeScript with oxc
//! 5. default-import the UI library when the output calls into it without one
//! 6. append `.js` to extensionless relative specifiers
//!
//! Plain `.js` files skip step 4 (see [`Transpiler::rewrite_plain_js`]).

use std::path::{Component, Path, PathBuf};

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, ImportDeclaration, ImportDeclarationSpecifier, StaticMemberExpression};
use oxc_ast_visit::Visit;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxRuntime, TransformOptions, Transformer};
use regex::{Captures, Regex};

use crate::config::{EnvValues, Specifiers};
use crate::error::TranspileError;

/// Binding name the classic JSX transform calls through.
pub const UI_BINDING: &str = "React";

lazy_static! {
    /// A whole import statement with a static specifier, wherever it starts
    /// on the line.
    static ref IMPORT_STATEMENT_RE: Regex = Regex::new(
        r#"[ \t]*\bimport\s+(?:[\w$*{}\s,]+?\s+from\s+)?['"](?P<spec>[^'"\n]+)['"][ \t]*;?[ \t]*\r?\n?"#
    )
    .unwrap();

    /// Any static or dynamic module specifier.
    static ref SPECIFIER_RE: Regex = Regex::new(
        r#"(?P<head>\bfrom\s*|\bimport\s*\(\s*|\bimport\s+)(?P<q>['"])(?P<spec>[^'"\n]+)['"]"#
    )
    .unwrap();

    static ref ENV_RE: Regex = Regex::new(
        r"\b(?:process\.env|import\.meta\.env)\.(?P<name>[A-Za-z_][A-Za-z0-9_]*)\b"
    )
    .unwrap();

    static ref DOTENV_CONFIG_RE: Regex = Regex::new(r"(?m)^[ \t]*dotenv\.config\(\s*\)\s*;?[ \t]*\r?\n?").unwrap();

    static ref HAS_EXTENSION_RE: Regex = Regex::new(r"\.\w+$").unwrap();

    static ref UI_CALL_RE: Regex = Regex::new(r"\bReact\.(?:createElement|Fragment)\b").unwrap();

    static ref UI_IMPORT_RE: Regex = Regex::new(
        r"\bimport\s+(?:React\b|\*\s+as\s+React\b|\{[^}]*\bReact\b[^}]*\})"
    )
    .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE DIALECTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Jsx,
    Tsx,
    Ts,
    /// Already JavaScript; only the textual rewrites apply.
    Js,
}

impl Dialect {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.') {
            "jsx" => Some(Dialect::Jsx),
            "tsx" => Some(Dialect::Tsx),
            "ts" => Some(Dialect::Ts),
            "js" => Some(Dialect::Js),
            _ => None,
        }
    }

    fn source_type(self) -> SourceType {
        let base = SourceType::default().with_module(true);
        match self {
            Dialect::Jsx | Dialect::Js => base.with_jsx(true),
            Dialect::Tsx => base.with_typescript(true).with_jsx(true),
            // `<T>expr` casts are only legal without JSX
            Dialect::Ts => base.with_typescript(true),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSPILER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-pass transpiler: virtual specifiers plus the env values to inline.
#[derive(Debug, Clone, Default)]
pub struct Transpiler {
    specifiers: Specifiers,
    env: EnvValues,
}

impl Transpiler {
    pub fn new(specifiers: Specifiers, env: EnvValues) -> Self {
        Self { specifiers, env }
    }

    pub fn specifiers(&self) -> &Specifiers {
        &self.specifiers
    }

    pub fn env(&self) -> &EnvValues {
        &self.env
    }

    /// Compile `source` to JavaScript destined for `output_path`.
    ///
    /// `router_path` is where the generated router module will be written
    /// during this pass; router imports are rewritten relative to it.
    pub fn transpile_file(
        &self,
        source: &str,
        dialect: Dialect,
        output_path: &Path,
        router_path: &Path,
    ) -> Result<String, TranspileError> {
        if dialect == Dialect::Js {
            return Ok(self.rewrite_plain_js(source, output_path, router_path));
        }

        let code = self.strip_stylesheet_imports(source);
        let code = self.substitute_env(&code);
        let code = self.rewrite_router_imports(&code, output_path, router_path);

        let lowered = lower(&code, dialect, output_path)?;
        let code = if lowered.needs_ui_import {
            self.prepend_ui_import(&lowered.code)
        } else {
            lowered.code
        };

        Ok(append_js_extensions(&code))
    }

    /// Light path for plain JavaScript: every textual step, no parse.
    pub fn rewrite_plain_js(&self, source: &str, output_path: &Path, router_path: &Path) -> String {
        let code = self.strip_stylesheet_imports(source);
        let code = self.substitute_env(&code);
        let code = self.rewrite_router_imports(&code, output_path, router_path);
        let code = if UI_CALL_RE.is_match(&code) && !UI_IMPORT_RE.is_match(&code) {
            self.prepend_ui_import(&code)
        } else {
            code
        };
        append_js_extensions(&code)
    }

    /// Drop stylesheet imports, the virtual styles module and `dotenv`
    /// bootstrapping; none of them exist in the browser.
    pub fn strip_stylesheet_imports(&self, source: &str) -> String {
        let stripped = IMPORT_STATEMENT_RE.replace_all(source, |caps: &Captures| {
            let spec = &caps["spec"];
            if spec.ends_with(".css") || spec == self.specifiers.styles || spec == "dotenv" {
                String::new()
            } else {
                caps[0].to_string()
            }
        });
        DOTENV_CONFIG_RE.replace_all(&stripped, "").into_owned()
    }

    /// Inline known env placeholders as string literals. Unknown names stay
    /// as written.
    pub fn substitute_env(&self, source: &str) -> String {
        if self.env.is_empty() {
            return source.to_string();
        }
        ENV_RE
            .replace_all(source, |caps: &Captures| match self.env.get(&caps["name"]) {
                Some(value) => serde_json::Value::String(value.clone()).to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Point imports of the virtual router module at the generated router.
    ///
    /// Applying this twice is a no-op: the rewritten specifier is relative
    /// and no longer names the virtual module.
    pub fn rewrite_router_imports(
        &self,
        source: &str,
        output_path: &Path,
        router_path: &Path,
    ) -> String {
        let router = &self.specifiers.router;
        if !source.contains(router.as_str()) {
            return source.to_string();
        }

        let from_dir = output_path.parent().unwrap_or(Path::new(""));
        let target = relative_import(from_dir, router_path);

        SPECIFIER_RE
            .replace_all(source, |caps: &Captures| {
                if &caps["spec"] == router {
                    format!("{}{}{}{}", &caps["head"], &caps["q"], target, &caps["q"])
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    fn prepend_ui_import(&self, code: &str) -> String {
        format!(
            "import {} from '{}';\n{}",
            UI_BINDING, self.specifiers.ui_library, code
        )
    }
}

/// Append `.js` to relative specifiers that have no extension.
pub fn append_js_extensions(source: &str) -> String {
    SPECIFIER_RE
        .replace_all(source, |caps: &Captures| {
            let spec = &caps["spec"];
            let relative = spec.starts_with("./") || spec.starts_with("../");
            if !relative || spec.ends_with('/') || HAS_EXTENSION_RE.is_match(spec) {
                return caps[0].to_string();
            }
            format!("{}{}{}.js{}", &caps["head"], &caps["q"], spec, &caps["q"])
        })
        .into_owned()
}

/// `/`-separated import path from `from_dir` to `target`, always starting
/// with `./` or `../`.
pub fn relative_import(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for c in &to[common..] {
        parts.push(c.as_os_str().to_string_lossy().into_owned());
    }

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OXC LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

struct Lowered {
    code: String,
    needs_ui_import: bool,
}

fn lower(source: &str, dialect: Dialect, path: &Path) -> Result<Lowered, TranspileError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, dialect.source_type()).parse();

    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(TranspileError::new(
            path,
            if message.is_empty() {
                "parser gave up".to_string()
            } else {
                message
            },
        ));
    }

    let mut program = ret.program;
    let scoping = SemanticBuilder::new()
        .with_excess_capacity(2.0)
        .build(&program)
        .semantic
        .into_scoping();

    let options = classic_jsx_options();
    let transformed =
        Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if !transformed.errors.is_empty() {
        let message = transformed
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(TranspileError::new(path, message));
    }

    let mut usage = UiUsage::default();
    usage.visit_program(&program);

    let code = Codegen::new().build(&program).code;
    Ok(Lowered {
        code,
        needs_ui_import: usage.calls && !usage.imported,
    })
}

fn classic_jsx_options() -> TransformOptions {
    let mut options = TransformOptions::default();
    options.jsx.runtime = JsxRuntime::Classic;
    options.jsx.pragma = Some(format!("{}.createElement", UI_BINDING));
    options.jsx.pragma_frag = Some(format!("{}.Fragment", UI_BINDING));
    options.jsx.jsx_plugin = true;
    options.jsx.development = false;
    // Imports only used by JSX must survive TS import elision.
    options.typescript.only_remove_type_imports = true;
    options
}

/// Records whether the program calls through the UI binding and whether it
/// already binds it with an import.
#[derive(Default)]
struct UiUsage {
    calls: bool,
    imported: bool,
}

impl<'a> Visit<'a> for UiUsage {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if let Expression::Identifier(object) = &it.object {
            if object.name == UI_BINDING
                && (it.property.name == "createElement" || it.property.name == "Fragment")
            {
                self.calls = true;
            }
        }
        oxc_ast_visit::walk::walk_static_member_expression(self, it);
    }

    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        if let Some(specifiers) = &it.specifiers {
            for specifier in specifiers {
                let local = match specifier {
                    ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
                };
                if local.name == UI_BINDING {
                    self.imported = true;
                }
            }
        }
    }
}

/// Output location of a source file mirrored from `source_root` into
/// `output_root`, with its extension swapped for `.js`.
pub fn output_path_for(source_root: &Path, output_root: &Path, source: &Path) -> PathBuf {
    let relative = source.strip_prefix(source_root).unwrap_or(source);
    output_root.join(relative).with_extension("js")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transpiler() -> Transpiler {
        let mut env = EnvValues::new();
        env.insert("API_URL".to_string(), "https://api.example.com".to_string());
        Transpiler::new(Specifiers::default(), env)
    }

    fn paths() -> (PathBuf, PathBuf) {
        (
            PathBuf::from("/site/.bertui/compiled/pages/blog/post.js"),
            PathBuf::from("/site/.bertui/compiled/router.js"),
        )
    }

    #[test]
    fn test_strip_stylesheet_imports() {
        let t = transpiler();
        let src = "import './index.css';\nimport styles from \"../theme.css\";\nimport 'bertui/styles';\nimport { a } from './a';\n";
        assert_eq!(t.strip_stylesheet_imports(src), "import { a } from './a';\n");
    }

    #[test]
    fn test_strip_stylesheet_import_sharing_a_line() {
        let t = transpiler();
        let src = "import React from 'react'; import './a.css';\nexport default 1;\n";
        let out = t.strip_stylesheet_imports(src);
        assert!(!out.contains("a.css"), "{out}");
        assert!(out.starts_with("import React from 'react';"), "{out}");
        assert!(out.contains("export default 1;"), "{out}");
    }

    #[test]
    fn test_substitute_env() {
        let t = transpiler();
        let out = t.substitute_env("fetch(process.env.API_URL); import.meta.env.API_URL; process.env.MISSING");
        assert_eq!(
            out,
            "fetch(\"https://api.example.com\"); \"https://api.example.com\"; process.env.MISSING"
        );
    }

    #[test]
    fn test_router_rewrite_is_idempotent() {
        let t = transpiler();
        let (out, router) = paths();
        let src = "import { Link } from 'bertui/router';\nimport x from \"bertui/router\";\n";
        let once = t.rewrite_router_imports(src, &out, &router);
        assert_eq!(
            once,
            "import { Link } from '../../router.js';\nimport x from \"../../router.js\";\n"
        );
        assert_eq!(t.rewrite_router_imports(&once, &out, &router), once);
    }

    #[test]
    fn test_relative_import() {
        assert_eq!(
            relative_import(Path::new("/a/compiled"), Path::new("/a/compiled/router.js")),
            "./router.js"
        );
        assert_eq!(
            relative_import(Path::new("/a/compiled/pages/x"), Path::new("/a/compiled/router.js")),
            "../../router.js"
        );
    }

    #[test]
    fn test_append_js_extensions() {
        let src = "import A from './A';\nimport B from '../lib/b.json';\nimport C from 'react';\nimport D from './dir/';\nconst m = import('./lazy');\n";
        assert_eq!(
            append_js_extensions(src),
            "import A from './A.js';\nimport B from '../lib/b.json';\nimport C from 'react';\nimport D from './dir/';\nconst m = import('./lazy.js');\n"
        );
    }

    #[test]
    fn test_transpile_jsx_injects_react() {
        let t = transpiler();
        let (out, router) = paths();
        let src = "import './page.css';\nimport Card from './Card';\nexport default function Page() {\n  return <div className=\"x\"><Card /></div>;\n}\n";
        let code = t.transpile_file(src, Dialect::Jsx, &out, &router).unwrap();

        assert!(code.starts_with("import React from 'react';\n"), "{code}");
        assert!(code.contains("React.createElement"));
        assert!(code.contains("./Card.js"));
        assert!(!code.contains(".css"));
        assert!(!code.contains("<div"));
    }

    #[test]
    fn test_transpile_keeps_existing_react_import() {
        let t = transpiler();
        let (out, router) = paths();
        let src = "import React from 'react';\nexport default () => <><p>hi</p></>;\n";
        let code = t.transpile_file(src, Dialect::Jsx, &out, &router).unwrap();
        assert_eq!(code.matches("import React").count(), 1, "{code}");
        assert!(code.contains("React.Fragment"));
    }

    #[test]
    fn test_transpile_tsx_strips_types() {
        let t = transpiler();
        let (out, router) = paths();
        let src = "import { Link } from 'bertui/router';\ninterface Props { title: string }\nexport default function Page({ title }: Props) {\n  return <Link to=\"/\">{title}</Link>;\n}\n";
        let code = t.transpile_file(src, Dialect::Tsx, &out, &router).unwrap();
        assert!(!code.contains("interface"));
        assert!(code.contains("../../router.js"));
        assert!(!code.contains("bertui/router"));
    }

    #[test]
    fn test_transpile_syntax_error() {
        let t = transpiler();
        let (out, router) = paths();
        let err = t
            .transpile_file("export default () => <div>", Dialect::Jsx, &out, &router)
            .unwrap_err();
        assert_eq!(err.file, out);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_plain_js_light_path() {
        let t = transpiler();
        let (out, router) = paths();
        let src = "import 'bertui/styles';\nimport { navigate } from 'bertui/router';\nimport util from './util';\nexport const el = React.createElement('p', null, process.env.API_URL);\n";
        let code = t.transpile_file(src, Dialect::Js, &out, &router).unwrap();
        assert_eq!(
            code,
            "import React from 'react';\nimport { navigate } from '../../router.js';\nimport util from './util.js';\nexport const el = React.createElement('p', null, \"https://api.example.com\");\n"
        );
    }

    #[test]
    fn test_output_path_for() {
        let out = output_path_for(
            Path::new("/site/src"),
            Path::new("/site/.bertui/compiled"),
            Path::new("/site/src/pages/blog/[slug].tsx"),
        );
        assert_eq!(out, PathBuf::from("/site/.bertui/compiled/pages/blog/[slug].js"));
    }
}
