//! Exposition text decoding.
//!
//! Parsing rules:
//! - `parse_line` classifies one line and returns `Err` on grammar violations.
//! - `parse` drives it over a whole file and skips failed lines, so a file read
//!   mid-write still yields its well-formed content.
//! - Label order in the first sample of a family fixes the family label names;
//!   later samples with the same names in another order are re-aligned, samples
//!   with a different name set are skipped.

use std::collections::HashMap;

use crate::error::{PromFileError, Result};
use crate::model::{
    MetricFamily, MetricType, Sample, Snapshot, BUCKET_LABEL, BUCKET_SUFFIX, COUNT_SUFFIX,
    SUM_SUFFIX,
};

use super::{is_valid_label_name, is_valid_metric_name};

/// One classified exposition line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Help { name: String, text: String },
    Type { name: String, metric_type: MetricType },
    /// Any other `#` line, or an empty line.
    Comment,
    Sample(ParsedSample),
}

/// A sample line before it is attached to a family.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSample {
    pub name: String,
    /// Labels in line order.
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

/// Parse one line (without its terminator). `line_no` is 1-based and only
/// used for error reporting.
pub fn parse_line(line: &str, line_no: usize) -> Result<Line> {
    if line.is_empty() {
        return Ok(Line::Comment);
    }
    if let Some(rest) = line.strip_prefix("# HELP ") {
        let (name, text) = rest.split_once(' ').unwrap_or((rest, ""));
        check_metric_name(name, line_no)?;
        return Ok(Line::Help {
            name: name.to_string(),
            text: text.to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("# TYPE ") {
        let (name, ty) = rest
            .split_once(' ')
            .ok_or_else(|| PromFileError::parse(line_no, "TYPE line without a type"))?;
        check_metric_name(name, line_no)?;
        let metric_type = MetricType::from_exposition(ty)
            .ok_or_else(|| PromFileError::parse(line_no, format!("unsupported metric type {ty:?}")))?;
        return Ok(Line::Type {
            name: name.to_string(),
            metric_type,
        });
    }
    if line.starts_with('#') {
        return Ok(Line::Comment);
    }
    parse_sample(line, line_no).map(Line::Sample)
}

fn parse_sample(line: &str, line_no: usize) -> Result<ParsedSample> {
    let name_end = line
        .find(['{', ' '])
        .ok_or_else(|| PromFileError::parse(line_no, "sample line without a value"))?;
    let name = &line[..name_end];
    check_metric_name(name, line_no)?;

    let mut rest = &line[name_end..];
    let mut labels = Vec::new();
    if let Some(block) = rest.strip_prefix('{') {
        let (parsed, remainder) = parse_label_block(block, line_no)?;
        labels = parsed;
        rest = remainder;
    }

    let raw = rest
        .strip_prefix(' ')
        .ok_or_else(|| PromFileError::parse(line_no, "expected a single space before the value"))?;
    if raw.is_empty() || raw.contains(char::is_whitespace) {
        return Err(PromFileError::parse(line_no, format!("malformed value {raw:?}")));
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| PromFileError::parse(line_no, format!("value {raw:?} is not a number")))?;
    if !value.is_finite() {
        return Err(PromFileError::parse(line_no, format!("value {raw:?} is not finite")));
    }

    Ok(ParsedSample {
        name: name.to_string(),
        labels,
        value,
    })
}

/// Consume `label="value",...}`; returns the labels and the text after `}`.
fn parse_label_block(block: &str, line_no: usize) -> Result<(Vec<(String, String)>, &str)> {
    let mut labels: Vec<(String, String)> = Vec::new();
    let mut rest = block;

    if let Some(after) = rest.strip_prefix('}') {
        return Ok((labels, after));
    }

    loop {
        let eq = rest
            .find('=')
            .ok_or_else(|| PromFileError::parse(line_no, "label without '='"))?;
        let label = &rest[..eq];
        if !is_valid_label_name(label) {
            return Err(PromFileError::parse(line_no, format!("invalid label name {label:?}")));
        }
        if labels.iter().any(|(l, _)| l == label) {
            return Err(PromFileError::parse(line_no, format!("duplicate label {label}")));
        }

        rest = rest[eq + 1..]
            .strip_prefix('"')
            .ok_or_else(|| PromFileError::parse(line_no, format!("value of {label} is not quoted")))?;
        let close = rest
            .find('"')
            .ok_or_else(|| PromFileError::parse(line_no, format!("unterminated value of {label}")))?;
        labels.push((label.to_string(), rest[..close].to_string()));
        rest = &rest[close + 1..];

        if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        }
        rest = rest
            .strip_prefix(',')
            .ok_or_else(|| PromFileError::parse(line_no, "expected ',' or '}' after label value"))?;
        if rest.starts_with('}') {
            return Err(PromFileError::parse(line_no, "trailing ',' in label block"));
        }
    }
}

fn check_metric_name(name: &str, line_no: usize) -> Result<()> {
    if is_valid_metric_name(name) {
        Ok(())
    } else {
        Err(PromFileError::parse(line_no, format!("invalid metric name {name:?}")))
    }
}

#[derive(Default)]
struct Meta {
    help: Option<String>,
    metric_type: Option<MetricType>,
}

/// Families keyed by name while the file is being read.
#[derive(Default)]
struct Families {
    meta: HashMap<String, Meta>,
    ordered: Vec<MetricFamily>,
    by_name: HashMap<String, usize>,
}

impl Families {
    /// Base family name: histogram sample suffixes resolve to the declared base.
    fn family_name<'a>(&self, sample_name: &'a str) -> &'a str {
        for suffix in [BUCKET_SUFFIX, SUM_SUFFIX, COUNT_SUFFIX] {
            if let Some(base) = sample_name.strip_suffix(suffix) {
                let declared = self.meta.get(base).and_then(|m| m.metric_type);
                if declared == Some(MetricType::Histogram) {
                    return base;
                }
            }
        }
        sample_name
    }

    fn push(&mut self, sample: ParsedSample, line_no: usize) -> Result<()> {
        let family_name = self.family_name(&sample.name).to_string();
        let is_bucket = family_name != sample.name
            && sample.name.len() == family_name.len() + BUCKET_SUFFIX.len()
            && sample.name.ends_with(BUCKET_SUFFIX);

        let mut labels = sample.labels;
        let bound = if is_bucket {
            let pos = labels
                .iter()
                .position(|(l, _)| l == BUCKET_LABEL)
                .ok_or_else(|| PromFileError::parse(line_no, "bucket sample without le label"))?;
            Some(labels.remove(pos).1)
        } else {
            None
        };

        let idx = match self.by_name.get(&family_name).copied() {
            Some(i) => i,
            None => {
                let meta = self.meta.get(&family_name);
                let family = MetricFamily::new(
                    family_name.clone(),
                    meta.and_then(|m| m.help.clone()).unwrap_or_default(),
                    meta.and_then(|m| m.metric_type),
                    labels.iter().map(|(l, _)| l.clone()).collect(),
                );
                self.ordered.push(family);
                let i = self.ordered.len() - 1;
                self.by_name.insert(family_name.clone(), i);
                i
            }
        };
        let family = &mut self.ordered[idx];

        let mut values = align(family.label_names(), &labels).ok_or_else(|| {
            PromFileError::parse(
                line_no,
                format!("labels of {} differ from the family label names", sample.name),
            )
        })?;
        values.extend(bound);
        family.upsert(Sample::new(sample.name, values, sample.value));
        Ok(())
    }

    fn into_snapshot(self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for family in self.ordered {
            snapshot.entry(family);
        }
        snapshot
    }
}

/// Label values ordered like `names`; `None` when the name sets differ.
fn align(names: &[String], labels: &[(String, String)]) -> Option<Vec<String>> {
    if names.len() != labels.len() {
        return None;
    }
    names
        .iter()
        .map(|n| labels.iter().find(|(l, _)| l == n).map(|(_, v)| v.clone()))
        .collect()
}

/// Decode a whole exposition file into families, in order of first sample.
pub fn parse(text: &str) -> Snapshot {
    let mut families = Families::default();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let outcome = match parse_line(line, line_no) {
            Ok(Line::Help { name, text }) => {
                families.meta.entry(name).or_default().help = Some(text);
                Ok(())
            }
            Ok(Line::Type { name, metric_type }) => {
                families.meta.entry(name).or_default().metric_type = Some(metric_type);
                Ok(())
            }
            Ok(Line::Comment) => Ok(()),
            Ok(Line::Sample(sample)) => families.push(sample, line_no),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            tracing::warn!(error = %e, "skipping malformed exposition line");
        }
    }

    families.into_snapshot()
}
