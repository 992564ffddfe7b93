//! Update commands produced by the instrumentation layer.
//!
//! Commands are validated before any I/O happens; a command that violates its
//! contract fails fast with `PromFileError::InvalidCommand` instead of being
//! merged into stored state.

use std::collections::HashSet;

use crate::error::{PromFileError, Result};
use crate::key::{family_key, value_key};
use crate::model::{
    MetricType, BUCKET_LABEL, BUCKET_SUFFIX, COUNT_SUFFIX, INF_BOUND, SUM_SUFFIX,
};
use crate::text::{format_value, is_valid_label_name, is_valid_metric_name};

/// Target family identity fields plus help text.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyDescriptor {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub label_names: Vec<String>,
}

impl FamilyDescriptor {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        metric_type: MetricType,
        label_names: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            metric_type,
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(name, help, MetricType::Counter, label_names)
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(name, help, MetricType::Gauge, label_names)
    }

    pub fn histogram(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(name, help, MetricType::Histogram, label_names)
    }

    pub fn key(&self) -> String {
        family_key(self.metric_type.as_str(), &self.name, &self.label_names)
    }

    fn validate(&self, label_values: &[String]) -> Result<()> {
        if !is_valid_metric_name(&self.name) {
            return Err(invalid(format!("invalid metric name {:?}", self.name)));
        }
        if self.help.contains(['\n', '\r']) {
            return Err(invalid(format!("help for {} contains a line break", self.name)));
        }

        let mut seen = HashSet::new();
        for label in &self.label_names {
            if !is_valid_label_name(label) {
                return Err(invalid(format!("invalid label name {label:?} on {}", self.name)));
            }
            if !seen.insert(label.as_str()) {
                return Err(invalid(format!("duplicate label name {label} on {}", self.name)));
            }
            if self.metric_type == MetricType::Histogram && label == BUCKET_LABEL {
                return Err(invalid(format!(
                    "label name {BUCKET_LABEL} is reserved for histogram {}",
                    self.name
                )));
            }
        }

        if label_values.len() != self.label_names.len() {
            return Err(invalid(format!(
                "{}: {} label values for {} label names",
                self.name,
                label_values.len(),
                self.label_names.len()
            )));
        }
        for value in label_values {
            if value.contains(['"', '\n', '\r']) {
                return Err(invalid(format!(
                    "label value {value:?} on {} contains a quote or line break",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// How the operand combines with the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    IncrementInt,
    IncrementFloat,
    Set,
}

/// Which sample of the family a command targets.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleKind {
    /// The plain sample of a counter or gauge.
    Value,
    /// A histogram bucket; carries the rendered upper bound.
    Bucket(String),
    Sum,
    Count,
}

/// One merge request against a single sample.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    pub family: FamilyDescriptor,
    pub sample: SampleKind,
    pub label_values: Vec<String>,
    pub operation: Operation,
    pub operand: f64,
}

impl UpdateCommand {
    fn value(family: FamilyDescriptor, label_values: &[&str], operation: Operation, operand: f64) -> Self {
        Self {
            family,
            sample: SampleKind::Value,
            label_values: label_values.iter().map(|s| s.to_string()).collect(),
            operation,
            operand,
        }
    }

    pub fn increment_int(family: FamilyDescriptor, label_values: &[&str], by: i64) -> Self {
        Self::value(family, label_values, Operation::IncrementInt, by as f64)
    }

    pub fn increment(family: FamilyDescriptor, label_values: &[&str], by: f64) -> Self {
        Self::value(family, label_values, Operation::IncrementFloat, by)
    }

    pub fn set(family: FamilyDescriptor, label_values: &[&str], value: f64) -> Self {
        Self::value(family, label_values, Operation::Set, value)
    }

    /// Sample name: family name plus the suffix of the targeted sample kind.
    pub fn sample_name(&self) -> String {
        let suffix = match self.sample {
            SampleKind::Value => "",
            SampleKind::Bucket(_) => BUCKET_SUFFIX,
            SampleKind::Sum => SUM_SUFFIX,
            SampleKind::Count => COUNT_SUFFIX,
        };
        format!("{}{}", self.family.name, suffix)
    }

    /// Label values as stored on the sample (bucket bound appended).
    pub fn sample_label_values(&self) -> Vec<String> {
        let mut values = self.label_values.clone();
        if let SampleKind::Bucket(bound) = &self.sample {
            values.push(bound.clone());
        }
        values
    }

    pub fn value_key(&self) -> String {
        value_key(&self.sample_name(), &self.sample_label_values())
    }

    pub fn validate(&self) -> Result<()> {
        self.family.validate(&self.label_values)?;

        if !self.operand.is_finite() {
            return Err(invalid(format!("{}: operand must be finite", self.family.name)));
        }

        let histogram = self.family.metric_type == MetricType::Histogram;
        let histogram_sample = !matches!(self.sample, SampleKind::Value);
        if histogram != histogram_sample {
            return Err(invalid(format!(
                "{}: sample kind {:?} does not fit type {}",
                self.family.name,
                self.sample,
                self.family.metric_type.as_str()
            )));
        }

        if self.family.metric_type == MetricType::Counter {
            if self.operation == Operation::Set {
                return Err(invalid(format!("counter {} cannot be set", self.family.name)));
            }
            if self.operand < 0.0 {
                return Err(invalid(format!(
                    "counter {} cannot be decremented",
                    self.family.name
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn require_type(&self, expected: MetricType) -> Result<()> {
        require_type(&self.family, expected)
    }
}

/// One histogram observation, fanned out into per-sample commands.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramObservation {
    pub family: FamilyDescriptor,
    pub label_values: Vec<String>,
    /// Finite bucket upper bounds in strictly ascending order; `+Inf` is implicit.
    pub buckets: Vec<f64>,
    pub value: f64,
}

impl HistogramObservation {
    pub fn new(family: FamilyDescriptor, label_values: &[&str], buckets: &[f64], value: f64) -> Self {
        Self {
            family,
            label_values: label_values.iter().map(|s| s.to_string()).collect(),
            buckets: buckets.to_vec(),
            value,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_type(&self.family, MetricType::Histogram)?;
        self.family.validate(&self.label_values)?;
        if !self.value.is_finite() {
            return Err(invalid(format!("{}: observed value must be finite", self.family.name)));
        }
        if self.buckets.iter().any(|b| !b.is_finite()) {
            return Err(invalid(format!("{}: bucket bounds must be finite", self.family.name)));
        }
        if self.buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid(format!(
                "{}: bucket bounds must be strictly ascending",
                self.family.name
            )));
        }
        Ok(())
    }

    /// Cumulative fan-out: every bucket whose bound is >= the observed value
    /// (and `+Inf`) gains one, lower buckets are touched with zero so they
    /// stay materialised, `_sum` gains the value and `_count` gains one.
    pub fn commands(&self) -> Vec<UpdateCommand> {
        let bucket = |bound: String, by: i64| UpdateCommand {
            family: self.family.clone(),
            sample: SampleKind::Bucket(bound),
            label_values: self.label_values.clone(),
            operation: Operation::IncrementInt,
            operand: by as f64,
        };

        let mut out: Vec<UpdateCommand> = self
            .buckets
            .iter()
            .map(|&b| bucket(format_value(b), i64::from(b >= self.value)))
            .collect();
        out.push(bucket(INF_BOUND.to_string(), 1));
        out.push(UpdateCommand {
            family: self.family.clone(),
            sample: SampleKind::Sum,
            label_values: self.label_values.clone(),
            operation: Operation::IncrementFloat,
            operand: self.value,
        });
        out.push(UpdateCommand {
            family: self.family.clone(),
            sample: SampleKind::Count,
            label_values: self.label_values.clone(),
            operation: Operation::IncrementInt,
            operand: 1.0,
        });
        out
    }
}

fn require_type(family: &FamilyDescriptor, expected: MetricType) -> Result<()> {
    if family.metric_type != expected {
        return Err(invalid(format!(
            "{} is declared {} but was passed as {}",
            family.name,
            family.metric_type.as_str(),
            expected.as_str()
        )));
    }
    Ok(())
}

fn invalid(msg: String) -> PromFileError {
    PromFileError::InvalidCommand(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn code(r: Result<()>) -> Option<ErrorCode> {
        r.err().map(|e| e.code())
    }

    #[test]
    fn accepts_well_formed_commands() {
        let c = UpdateCommand::increment_int(
            FamilyDescriptor::counter("http_requests_total", "Requests.", &["method"]),
            &["GET"],
            1,
        );
        assert!(c.validate().is_ok());
        assert_eq!(c.sample_name(), "http_requests_total");

        let g = UpdateCommand::set(FamilyDescriptor::gauge("temp", "", &[]), &[], -3.5);
        assert!(g.validate().is_ok());
    }

    #[test]
    fn rejects_contract_violations() {
        let fam = FamilyDescriptor::counter("jobs_total", "", &["queue"]);
        let invalid = Some(ErrorCode::InvalidCommand);

        assert_eq!(code(UpdateCommand::increment_int(fam.clone(), &[], 1).validate()), invalid);
        assert_eq!(code(UpdateCommand::increment(fam.clone(), &["a\"b"], 1.0).validate()), invalid);
        assert_eq!(code(UpdateCommand::increment(fam.clone(), &["a"], f64::NAN).validate()), invalid);
        assert_eq!(code(UpdateCommand::increment(fam.clone(), &["a"], -1.0).validate()), invalid);
        assert_eq!(code(UpdateCommand::set(fam, &["a"], 3.0).validate()), invalid);

        let bad_name = FamilyDescriptor::gauge("1bad", "", &[]);
        assert_eq!(code(UpdateCommand::set(bad_name, &[], 1.0).validate()), invalid);

        let dup = FamilyDescriptor::gauge("g", "", &["a", "a"]);
        assert_eq!(code(UpdateCommand::set(dup, &["x", "y"], 1.0).validate()), invalid);

        let multiline = FamilyDescriptor::gauge("g", "two\nlines", &[]);
        assert_eq!(code(UpdateCommand::set(multiline, &[], 1.0).validate()), invalid);
    }

    #[test]
    fn histogram_observation_validation() {
        let fam = FamilyDescriptor::histogram("latency", "", &["route"]);
        let ok = HistogramObservation::new(fam.clone(), &["/"], &[1.0, 5.0, 10.0], 3.0);
        assert!(ok.validate().is_ok());

        let unsorted = HistogramObservation::new(fam.clone(), &["/"], &[5.0, 1.0], 3.0);
        assert!(unsorted.validate().is_err());

        let reserved = FamilyDescriptor::histogram("latency", "", &["le"]);
        assert!(HistogramObservation::new(reserved, &["x"], &[1.0], 0.5).validate().is_err());

        let wrong_type = FamilyDescriptor::gauge("latency", "", &["route"]);
        assert!(HistogramObservation::new(wrong_type, &["/"], &[1.0], 0.5).validate().is_err());
    }

    #[test]
    fn histogram_fan_out_is_cumulative() {
        let fam = FamilyDescriptor::histogram("latency", "", &[]);
        let cmds = HistogramObservation::new(fam, &[], &[1.0, 5.0, 10.0], 3.0).commands();

        let got: Vec<(String, Vec<String>, f64)> = cmds
            .iter()
            .map(|c| (c.sample_name(), c.sample_label_values(), c.operand))
            .collect();
        let s = |v: &str| vec![v.to_string()];
        assert_eq!(
            got,
            vec![
                ("latency_bucket".to_string(), s("1"), 0.0),
                ("latency_bucket".to_string(), s("5"), 1.0),
                ("latency_bucket".to_string(), s("10"), 1.0),
                ("latency_bucket".to_string(), s("+Inf"), 1.0),
                ("latency_sum".to_string(), vec![], 3.0),
                ("latency_count".to_string(), vec![], 1.0),
            ]
        );
        assert!(cmds.iter().all(|c| c.validate().is_ok()));
    }

    #[test]
    fn observation_on_a_bound_counts_in_that_bucket() {
        let fam = FamilyDescriptor::histogram("h", "", &[]);
        let cmds = HistogramObservation::new(fam, &[], &[0.5, 1.0], 1.0).commands();
        assert_eq!(cmds[0].operand, 0.0);
        assert_eq!(cmds[1].operand, 1.0);
    }
}
