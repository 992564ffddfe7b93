//! Metric families, samples and snapshots.
//!
//! Families and snapshots pair an ordered `Vec` (rendering order) with a
//! `HashMap` from identity key to position (merge lookup). Both are only
//! mutated through methods that keep the two in sync.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::key::{family_key, value_key};

/// Synthetic label carrying a histogram bucket upper bound.
pub const BUCKET_LABEL: &str = "le";
/// Bound of the implicit unbounded bucket.
pub const INF_BOUND: &str = "+Inf";

pub const BUCKET_SUFFIX: &str = "_bucket";
pub const SUM_SUFFIX: &str = "_sum";
pub const COUNT_SUFFIX: &str = "_count";

/// Metric type as written on a `# TYPE` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
        }
    }

    /// Parse the exposition spelling; unknown types yield `None`.
    pub fn from_exposition(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(MetricType::Counter),
            "gauge" => Some(MetricType::Gauge),
            "histogram" => Some(MetricType::Histogram),
            _ => None,
        }
    }
}

/// One labeled measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Family name, or family name plus `_bucket`/`_sum`/`_count`.
    pub name: String,
    /// Aligned with the family label names, plus `le` for bucket samples.
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(name: impl Into<String>, label_values: Vec<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            label_values,
            value,
        }
    }

    /// Identity of this sample within its family.
    pub fn key(&self) -> String {
        value_key(&self.name, &self.label_values)
    }
}

/// All samples sharing one name, type, help text and label-name schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    name: String,
    help: String,
    metric_type: Option<MetricType>,
    label_names: Vec<String>,
    samples: Vec<Sample>,
    index: HashMap<String, usize>,
}

impl MetricFamily {
    /// Empty family. `metric_type` is `None` when no `# TYPE` line was seen.
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        metric_type: Option<MetricType>,
        label_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            metric_type,
            label_names,
            samples: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn set_help(&mut self, help: impl Into<String>) {
        self.help = help.into();
    }

    pub fn metric_type(&self) -> Option<MetricType> {
        self.metric_type
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Type spelling used for identity; empty for untyped families.
    pub fn type_str(&self) -> &'static str {
        self.metric_type.map(MetricType::as_str).unwrap_or("")
    }

    /// Identity of this family.
    pub fn key(&self) -> String {
        family_key(self.type_str(), &self.name, &self.label_names)
    }

    /// Samples in stored (rendering) order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, value_key: &str) -> Option<&Sample> {
        self.index.get(value_key).and_then(|&i| self.samples.get(i))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Replace the sample with the same identity, or append it.
    pub fn upsert(&mut self, sample: Sample) {
        let key = sample.key();
        match self.index.get(&key).copied() {
            Some(i) => self.samples[i] = sample,
            None => {
                self.index.insert(key, self.samples.len());
                self.samples.push(sample);
            }
        }
    }

    /// True when `sample` is a bucket of this (histogram) family.
    pub fn is_bucket(&self, sample: &Sample) -> bool {
        self.metric_type == Some(MetricType::Histogram)
            && sample.name.len() == self.name.len() + BUCKET_SUFFIX.len()
            && sample.name.starts_with(&self.name)
            && sample.name.ends_with(BUCKET_SUFFIX)
    }

    /// Label names positionally matching `sample.label_values`.
    pub fn sample_label_names(&self, sample: &Sample) -> Vec<&str> {
        let mut names: Vec<&str> = self.label_names.iter().map(String::as_str).collect();
        if self.is_bucket(sample) {
            names.push(BUCKET_LABEL);
        }
        names
    }

    /// Deterministic order: family label values lexicographically, then
    /// sample kind (plain, bucket, sum, count), then bucket bound ascending.
    pub fn sort_samples(&mut self) {
        let width = self.label_names.len();
        let name = self.name.clone();
        self.samples
            .sort_by(|a, b| compare_samples(&name, width, a, b));
        self.index = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.key(), i))
            .collect();
    }
}

fn compare_samples(family: &str, width: usize, a: &Sample, b: &Sample) -> Ordering {
    let la = &a.label_values[..width.min(a.label_values.len())];
    let lb = &b.label_values[..width.min(b.label_values.len())];
    la.cmp(lb)
        .then_with(|| suffix_rank(family, &a.name).cmp(&suffix_rank(family, &b.name)))
        .then_with(|| compare_bounds(a.label_values.get(width), b.label_values.get(width)))
        .then_with(|| a.name.cmp(&b.name))
}

fn suffix_rank(family: &str, sample_name: &str) -> u8 {
    match sample_name.strip_prefix(family) {
        Some("") => 0,
        Some(BUCKET_SUFFIX) => 1,
        Some(SUM_SUFFIX) => 2,
        Some(COUNT_SUFFIX) => 3,
        _ => 4,
    }
}

fn compare_bounds(a: Option<&String>, b: Option<&String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (bound_value(a), bound_value(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => a.cmp(b),
        },
        (a, b) => a.cmp(&b),
    }
}

fn bound_value(s: &str) -> Option<f64> {
    if s == INF_BOUND {
        return Some(f64::INFINITY);
    }
    s.parse().ok()
}

/// Every persisted family, keyed by identity, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    families: Vec<MetricFamily>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    pub fn get(&self, family_key: &str) -> Option<&MetricFamily> {
        self.index.get(family_key).and_then(|&i| self.families.get(i))
    }

    /// First family carrying `name`, whatever its type or label names.
    pub fn find_by_name(&self, name: &str) -> Option<&MetricFamily> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Existing family with the same identity as `family`, or `family` itself
    /// appended at the end.
    pub fn entry(&mut self, family: MetricFamily) -> &mut MetricFamily {
        let key = family.key();
        let idx = match self.index.get(&key).copied() {
            Some(i) => i,
            None => {
                self.families.push(family);
                let i = self.families.len() - 1;
                self.index.insert(key, i);
                i
            }
        };
        &mut self.families[idx]
    }

    /// Total sample count across families.
    pub fn sample_count(&self) -> usize {
        self.families.iter().map(MetricFamily::len).sum()
    }
}
