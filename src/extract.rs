//! Static HTML extraction for Server Islands.
//!
//! Textual, best-effort JSX-to-HTML lowering of a component's first
//! `return ( ... )` expression. Only meaningful for sources that passed
//! [`crate::validate`]; anything dynamic that survives is dropped.
//!
//! Steps run in a fixed order, each assuming the previous ones ran:
//!
//! 1. isolate the first `return (` expression
//! 2. strip `{/* ... */}` comments
//! 3. `className=` becomes `class=`
//! 4. `style={{ ... }}` objects become inline CSS
//! 5. self-closing non-void elements are expanded
//! 6. literal expression containers collapse to their value; other
//!    expressions are removed
//! 7. whitespace collapses

#[cfg(feature = "napi")]
use napi_derive::napi;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// HTML elements that are legitimately self-closing.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

lazy_static! {
    static ref RETURN_RE: Regex = Regex::new(r"\breturn\s*\(").unwrap();
    static ref JSX_COMMENT_RE: Regex = Regex::new(r"(?s)\{/\*.*?\*/\}").unwrap();
    static ref CLASS_NAME_RE: Regex = Regex::new(r"\bclassName=").unwrap();
    static ref STYLE_OBJECT_RE: Regex = Regex::new(r"style=\{\{([^}]+)\}\}").unwrap();
    static ref SELF_CLOSING_RE: Regex = Regex::new(r"<(\w+)([^>]*?)\s*/>").unwrap();
    static ref CAMEL_BOUNDARY_RE: Regex = Regex::new(r"([A-Z])").unwrap();

    // Attribute position: keep the attribute, quote the literal.
    static ref ATTR_TEMPLATE_RE: Regex = Regex::new(r"=\{`([^`$]*)`\}").unwrap();
    static ref ATTR_DOUBLE_RE: Regex = Regex::new(r#"=\{"([^"]*)"\}"#).unwrap();
    static ref ATTR_SINGLE_RE: Regex = Regex::new(r"=\{'([^']*)'\}").unwrap();
    static ref ATTR_NUMBER_RE: Regex = Regex::new(r"=\{(\d+(?:\.\d+)?)\}").unwrap();

    // Text position: the literal becomes bare text.
    static ref TEXT_TEMPLATE_RE: Regex = Regex::new(r"\{`([^`$]*)`\}").unwrap();
    static ref TEXT_DOUBLE_RE: Regex = Regex::new(r#"\{"([^"]*)"\}"#).unwrap();
    static ref TEXT_SINGLE_RE: Regex = Regex::new(r"\{'([^']*)'\}").unwrap();
    static ref TEXT_NUMBER_RE: Regex = Regex::new(r"\{(\d+(?:\.\d+)?)\}").unwrap();

    static ref FRAGMENT_RE: Regex = Regex::new(r"</?>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Extract static HTML from a component source, or `None` when no
/// `return (...)` can be found or the result is empty.
pub fn extract_static_html(source: &str) -> Option<String> {
    let jsx = isolate_return_expression(source)?;

    let html = JSX_COMMENT_RE.replace_all(jsx, "");
    let html = CLASS_NAME_RE.replace_all(&html, "class=");
    let html = STYLE_OBJECT_RE.replace_all(&html, |caps: &Captures| {
        format!("style=\"{}\"", style_object_to_css(&caps[1]))
    });
    let html = expand_self_closing(&html);
    let html = collapse_literals(&html);
    let html = FRAGMENT_RE.replace_all(&html, "");
    let html = WHITESPACE_RE.replace_all(&html, " ");

    let html = html.trim();
    if html.is_empty() {
        None
    } else {
        Some(html.to_string())
    }
}

/// Body of the first `return ( ... )`, without the outer parentheses.
///
/// Parentheses are balanced outside string literals. Quotes only open a
/// string inside a tag or a `{}` expression, so apostrophes in JSX text
/// don't derail the scan. Tags are only tracked outside expressions, where
/// `a<b` is a comparison and not markup.
pub fn isolate_return_expression(source: &str) -> Option<&str> {
    let open = RETURN_RE.find(source)?;
    let start = open.end();
    let bytes = source.as_bytes();

    let mut depth = 1usize;
    let mut braces = 0usize;
    let mut in_tag = false;
    let mut quote: Option<u8> = None;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' | b'`' if in_tag || braces > 0 => quote = Some(b),
            b'{' => braces += 1,
            b'}' => braces = braces.saturating_sub(1),
            b'<' if !in_tag && braces == 0 => {
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next.is_ascii_alphabetic() || next == b'/' || next == b'>' {
                    in_tag = true;
                }
            }
            b'>' if in_tag && braces == 0 => in_tag = false,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&source[start..i]);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// `color: "red", fontSize: "12px"` as `color: red; font-size: 12px`.
///
/// Splits on commas at parenthesis depth zero so values like
/// `rgba(0, 0, 0, 0.5)` stay whole.
pub fn style_object_to_css(object: &str) -> String {
    let mut props = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for ch in object.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if ch == ',' && depth == 0 {
            props.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    props.push(current);

    props
        .iter()
        .filter_map(|prop| {
            let (key, value) = prop.split_once(':')?;
            let key = key.trim().trim_matches(|c: char| c == '"' || c == '\'');
            let value = value.trim().replace(['"', '\''], "");
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some(format!("{}: {}", kebab_case(key), value))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn kebab_case(key: &str) -> String {
    CAMEL_BOUNDARY_RE
        .replace_all(key, "-$1")
        .to_lowercase()
}

fn expand_self_closing(html: &str) -> String {
    SELF_CLOSING_RE
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[1];
            if VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
                caps[0].to_string()
            } else {
                format!("<{}{}></{}>", tag, caps[2].trim_end(), tag)
            }
        })
        .into_owned()
}

fn collapse_literals(html: &str) -> String {
    let html = ATTR_TEMPLATE_RE.replace_all(html, "=\"$1\"");
    let html = ATTR_DOUBLE_RE.replace_all(&html, "=\"$1\"");
    let html = ATTR_SINGLE_RE.replace_all(&html, "=\"$1\"");
    let html = ATTR_NUMBER_RE.replace_all(&html, "=\"$1\"");

    let html = TEXT_TEMPLATE_RE.replace_all(&html, "$1");
    let html = TEXT_DOUBLE_RE.replace_all(&html, "$1");
    let html = TEXT_SINGLE_RE.replace_all(&html, "$1");
    let html = TEXT_NUMBER_RE.replace_all(&html, "$1");
    strip_expressions(&html)
}

/// Remove every remaining `{...}` expression, nested braces and string
/// literals included. An expression in attribute position takes its
/// attribute name with it. An unbalanced `{` is left as it is.
fn strip_expressions(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let Some(end) = closing_brace(bytes, i) else {
            break;
        };
        out.push_str(&html[copied..i]);
        if out.ends_with('=') {
            out.pop();
            let name = out
                .trim_end_matches(|c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-'))
                .len();
            out.truncate(name);
            let attr_start = out.trim_end().len();
            out.truncate(attr_start);
        }
        i = end + 1;
        copied = i;
    }

    out.push_str(&html[copied..]);
    out
}

/// Index of the `}` closing the `{` at `open`. Quoted strings and template
/// literals are skipped whole.
fn closing_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn extract_static_html_native(source: String) -> Option<String> {
    extract_static_html(&source)
}
