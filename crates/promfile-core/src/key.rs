//! Canonical identity keys for families and samples.
//!
//! Keys are pure functions of their inputs so that the same family or sample
//! is recognised across independent decode/encode cycles and process restarts.
//! Every component is length-prefixed, which keeps the encoding unambiguous
//! even when names contain `:`.

use std::fmt::Write;

/// Namespace prefix shared by every key.
pub const KEY_PREFIX: &str = "promfile";

/// Identity of a metric family: type, name and ordered label names.
pub fn family_key(metric_type: &str, name: &str, label_names: &[String]) -> String {
    let mut key = format!("{KEY_PREFIX}:family:");
    push_component(&mut key, metric_type);
    push_component(&mut key, name);
    push_list(&mut key, label_names);
    key
}

/// Identity of a sample within a family: sample name and ordered label values.
pub fn value_key(name: &str, label_values: &[String]) -> String {
    let mut key = format!("{KEY_PREFIX}:value:");
    push_component(&mut key, name);
    push_list(&mut key, label_values);
    key
}

fn push_component(out: &mut String, s: &str) {
    let _ = write!(out, "{}:{}:", s.len(), s);
}

fn push_list(out: &mut String, items: &[String]) {
    let _ = write!(out, "[{}]", items.len());
    for item in items {
        push_component(out, item);
    }
}
