//! Exposition text encoding; the structural inverse of [`super::parse`].

use std::fmt::Write;

use serde::Deserialize;

use crate::model::MetricFamily;

use super::format_value;

/// Whether a `# HELP` line is written for families with empty help text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpPolicy {
    /// Always write `# HELP <name>`, followed by the text when non-empty.
    #[default]
    Always,
    /// Skip the HELP line when the help text is empty.
    OmitEmpty,
}

/// Render families in input order. Every line, including the last, ends
/// with `\n`; no families render to an empty string.
pub fn render(families: &[MetricFamily], help: HelpPolicy) -> String {
    let mut out = String::new();
    for family in families {
        render_family(family, help, &mut out);
    }
    out
}

fn render_family(family: &MetricFamily, help: HelpPolicy, out: &mut String) {
    let name = family.name();

    if help == HelpPolicy::Always || !family.help().is_empty() {
        out.push_str("# HELP ");
        out.push_str(name);
        if !family.help().is_empty() {
            out.push(' ');
            out.push_str(family.help());
        }
        out.push('\n');
    }
    if let Some(ty) = family.metric_type() {
        let _ = writeln!(out, "# TYPE {} {}", name, ty.as_str());
    }

    for sample in family.samples() {
        out.push_str(&sample.name);
        let names = family.sample_label_names(sample);
        if !sample.label_values.is_empty() {
            let label_str = names
                .iter()
                .zip(&sample.label_values)
                .map(|(k, v)| format!("{k}=\"{v}\""))
                .collect::<Vec<_>>()
                .join(",");
            let _ = write!(out, "{{{label_str}}}");
        }
        let _ = writeln!(out, " {}", format_value(sample.value));
    }
}
