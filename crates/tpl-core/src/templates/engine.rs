//! The single "render string against context" operation
//!
//! Template text uses a configurable delimiter pair (`{{{ }}}` by default) so
//! that generated files may themselves contain `{{ }}` verbatim. Before
//! handing the text to tera, tags written with the configured delimiters are
//! rewritten into tera's native syntax and any native delimiters appearing in
//! literal text are escaped.
//!
//! Tag forms:
//!
//! - `{{{ .name }}}` / `{{{ name | upper }}}` expressions
//! - `{{{ if .org }}} ... {{{ else }}} ... {{{ endif }}}` and other control
//!   keywords, which become tera statements
//! - `{{{/* comment */}}}`, which renders to nothing
//! - `{{{- x -}}}` trims whitespace on the marked side
//!
//! A leading `.` on a variable refers to the context root, so `.name` and
//! `name` are the same lookup.

use crate::error::{Error, Result};
use crate::templates::context::RenderContext;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use convert_case::{Case, Casing};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tera::{Tera, Value};

pub const DEFAULT_OPEN: &str = "{{{";
pub const DEFAULT_CLOSE: &str = "}}}";

const NATIVE_OPEN: &str = "{{";
const NATIVE_CLOSE: &str = "}}";

/// Name under which each one-off template is registered with tera
const TEMPLATE_NAME: &str = "__tpl__";

const STATEMENT_KEYWORDS: &[&str] = &[
    "if",
    "elif",
    "else",
    "endif",
    "for",
    "endfor",
    "set",
    "set_global",
    "filter",
    "endfilter",
    "break",
    "continue",
];

/// Open/close delimiter pair used for both path and content templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    open: String,
    close: String,
}

impl Delimiters {
    /// Validate and build a delimiter pair
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self> {
        let open = open.into();
        let close = close.into();

        if open.is_empty() || close.is_empty() {
            return Err(Error::Config("delimiters must not be empty".to_string()));
        }
        if open == close {
            return Err(Error::Config(format!(
                "open and close delimiters must differ (both '{}')",
                open
            )));
        }
        if open == NATIVE_OPEN && close == NATIVE_CLOSE {
            return Err(Error::Config(format!(
                "delimiters '{}' '{}' collide with the engine's native syntax",
                open, close
            )));
        }
        Ok(Self { open, close })
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN.to_string(),
            close: DEFAULT_CLOSE.to_string(),
        }
    }
}

/// Renders template text with the configured delimiters and helper library
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    delimiters: Delimiters,
}

impl TemplateEngine {
    pub fn new(delimiters: Delimiters) -> Self {
        Self { delimiters }
    }

    /// Render `source` against `context`; `name` labels errors
    pub fn render(&self, name: &str, source: &str, context: &RenderContext) -> Result<String> {
        self.render_with(name, source, &context.to_tera())
    }

    /// Same as [`render`](Self::render) with an already converted context,
    /// so a tree walk converts once and renders many times
    pub(crate) fn render_with(
        &self,
        name: &str,
        source: &str,
        context: &tera::Context,
    ) -> Result<String> {
        if !source.contains(self.delimiters.open()) {
            return Ok(source.to_string());
        }

        let translated = translate(source, &self.delimiters).map_err(|message| {
            Error::TemplateParse {
                path: name.to_string(),
                message,
            }
        })?;

        // Fresh instance per render: nothing leaks between templates
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        register_helpers(&mut tera);

        tera.add_raw_template(TEMPLATE_NAME, &translated)
            .map_err(|e| Error::TemplateParse {
                path: name.to_string(),
                message: describe(&e),
            })?;

        tera.render(TEMPLATE_NAME, context)
            .map_err(|e| Error::TemplateExec {
                path: name.to_string(),
                message: describe(&e),
            })
    }
}

/// Flatten a tera error and its sources into one line
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Rewrite custom-delimited source into tera syntax
fn translate(source: &str, delimiters: &Delimiters) -> std::result::Result<String, String> {
    let open = delimiters.open();
    let close = delimiters.close();
    let mut out = String::with_capacity(source.len() + 32);
    let mut rest = source;

    while let Some(start) = rest.find(open) {
        push_literal(&mut out, &rest[..start]);
        let body_start = &rest[start + open.len()..];
        let Some(end) = body_start.find(close) else {
            let offset = source.len() - rest.len() + start;
            return Err(format!("unclosed '{}' at byte {}", open, offset));
        };
        push_tag(&mut out, &body_start[..end]);
        rest = &body_start[end + close.len()..];
    }
    push_literal(&mut out, rest);

    Ok(out)
}

/// Copy literal text, escaping any `{` tera could read as a tag opener.
/// A trailing `{` is escaped too since a tag follows it.
fn push_literal(out: &mut String, text: &str) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' && matches!(chars.peek(), None | Some('{') | Some('%') | Some('#')) {
            out.push_str(r#"{{ "{" }}"#);
        } else {
            out.push(c);
        }
    }
}

fn push_tag(out: &mut String, body: &str) {
    let (trim_left, body) = strip_trim_marker(body, true);
    let (trim_right, body) = strip_trim_marker(body, false);
    let inner = body.trim();

    if inner.starts_with("/*") && inner.ends_with("*/") {
        return;
    }

    let keyword = inner.split_whitespace().next().unwrap_or_default();
    let (open, close) = if STATEMENT_KEYWORDS.contains(&keyword) {
        ("{%", "%}")
    } else {
        ("{{", "}}")
    };

    out.push_str(open);
    if trim_left {
        out.push('-');
    }
    out.push(' ');
    out.push_str(&strip_root_dots(inner));
    out.push(' ');
    if trim_right {
        out.push('-');
    }
    out.push_str(close);
}

/// `- x` on the left or `x -` on the right marks whitespace trimming
fn strip_trim_marker(body: &str, left: bool) -> (bool, &str) {
    if left {
        match body.strip_prefix('-') {
            Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest),
            _ => (false, body),
        }
    } else {
        match body.strip_suffix('-') {
            Some(rest) if rest.ends_with(char::is_whitespace) => (true, rest),
            _ => (false, body),
        }
    }
}

/// Drop the `.` in `.name`-style root lookups, leaving member access
/// (`a.b`), numbers (`1.5`) and string literals alone
fn strip_root_dots(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if matches!(c, '"' | '\'' | '`') => {
                quote = Some(c);
                out.push(c);
            }
            None => {
                let follows_value =
                    prev.is_some_and(|p| p.is_alphanumeric() || matches!(p, '_' | ')' | ']'));
                let starts_ident = chars.peek().is_some_and(|n| n.is_alphabetic() || *n == '_');
                if !(c == '.' && !follows_value && starts_ident) {
                    out.push(c);
                }
            }
        }
        prev = Some(c);
    }

    out
}

fn register_helpers(tera: &mut Tera) {
    tera.register_filter("sha256", sha256_filter);
    tera.register_filter("b64encode", b64encode_filter);
    tera.register_filter("b64decode", b64decode_filter);
    tera.register_filter("snake_case", snake_case_filter);
    tera.register_filter("kebab_case", kebab_case_filter);
    tera.register_filter("camel_case", camel_case_filter);
    tera.register_filter("pascal_case", pascal_case_filter);
    tera.register_filter("upper_snake_case", upper_snake_case_filter);
    tera.register_function("uuid", uuid_function);
}

fn string_arg<'a>(filter: &str, value: &'a Value) -> tera::Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| tera::Error::msg(format!("filter `{}` expects a string", filter)))
}

fn sha256_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let input = string_arg("sha256", value)?;
    Ok(Value::String(hex::encode(Sha256::digest(input.as_bytes()))))
}

fn b64encode_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let input = string_arg("b64encode", value)?;
    Ok(Value::String(BASE64.encode(input.as_bytes())))
}

fn b64decode_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let input = string_arg("b64decode", value)?;
    let bytes = BASE64
        .decode(input.trim())
        .map_err(|e| tera::Error::msg(format!("b64decode: {}", e)))?;
    String::from_utf8(bytes)
        .map(Value::String)
        .map_err(|e| tera::Error::msg(format!("b64decode: {}", e)))
}

fn snake_case_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(string_arg("snake_case", value)?.to_case(Case::Snake)))
}

fn kebab_case_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(string_arg("kebab_case", value)?.to_case(Case::Kebab)))
}

fn camel_case_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(string_arg("camel_case", value)?.to_case(Case::Camel)))
}

fn pascal_case_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(string_arg("pascal_case", value)?.to_case(Case::Pascal)))
}

fn upper_snake_case_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let snake = string_arg("upper_snake_case", value)?.to_case(Case::Snake);
    Ok(Value::String(snake.to_uppercase()))
}

fn uuid_function(_: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(uuid::Uuid::new_v4().to_string()))
}
