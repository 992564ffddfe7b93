//! Exposition text format (subset): parser and renderer.
//!
//! Supported grammar, strict whitespace, one record per line:
//!
//! ```text
//! # HELP <metric_name> <free text>
//! # TYPE <metric_name> <counter|gauge|histogram>
//! <metric_name>{<label>="<value>",...} <value>
//! ```
//!
//! No label-value escaping, no timestamps, no exemplars. The parser never
//! panics: a malformed line is reported as `PromFileError::Parse` by
//! [`parse::parse_line`] and skipped by [`parse::parse`].

pub mod parse;
pub mod render;

pub use parse::{parse, parse_line, Line, ParsedSample};
pub use render::{render, HelpPolicy};

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub(crate) fn is_valid_metric_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the reserved `__` prefix.
pub(crate) fn is_valid_label_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !s.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Plain decimal rendering: no exponent, no locale, integers without `.0`.
pub fn format_value(v: f64) -> String {
    if v == 0.0 {
        // avoid "-0"
        return "0".to_string();
    }
    format!("{v}")
}
