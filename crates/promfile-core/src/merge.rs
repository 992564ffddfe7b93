//! Merge engine: applies update commands to a snapshot.
//!
//! `apply` is pure with respect to I/O; persisting the result is the store's
//! job. Families are looked up by family key, samples by value key.

use std::collections::BTreeSet;

use crate::command::{HistogramObservation, Operation, UpdateCommand};
use crate::error::{PromFileError, Result};
use crate::model::{
    MetricFamily, MetricType, Sample, Snapshot, BUCKET_SUFFIX, COUNT_SUFFIX, INF_BOUND,
    SUM_SUFFIX,
};
use crate::text::format_value;

/// Apply one command and return the next snapshot.
///
/// Increments start from 0 for a new sample; `Set` overwrites. The touched
/// family is re-sorted so unchanged families render byte-stable.
pub fn apply(mut snapshot: Snapshot, cmd: &UpdateCommand) -> Result<Snapshot> {
    cmd.validate()?;
    check_identity(&snapshot, cmd)?;

    let desc = &cmd.family;
    let family = snapshot.entry(MetricFamily::new(
        desc.name.clone(),
        desc.help.clone(),
        Some(desc.metric_type),
        desc.label_names.clone(),
    ));
    family.set_help(desc.help.clone());

    let current = family.sample(&cmd.value_key()).map(|s| s.value);
    let next = match cmd.operation {
        Operation::IncrementInt | Operation::IncrementFloat => {
            current.unwrap_or(0.0) + cmd.operand
        }
        Operation::Set => cmd.operand,
    };

    family.upsert(Sample::new(
        cmd.sample_name(),
        cmd.sample_label_values(),
        next,
    ));
    family.sort_samples();
    Ok(snapshot)
}

/// Apply every command of a histogram observation in order.
///
/// The bucket bounds must match the bounds already stored for the same label
/// values; otherwise buckets missing from one of the lists would stop being
/// cumulative.
pub fn apply_observation(snapshot: Snapshot, obs: &HistogramObservation) -> Result<Snapshot> {
    obs.validate()?;
    check_buckets(&snapshot, obs)?;
    obs.commands()
        .iter()
        .try_fold(snapshot, |snap, cmd| apply(snap, cmd))
}

/// A family name may only ever carry one identity, and must not shadow the
/// derived sample names of a histogram.
fn check_identity(snapshot: &Snapshot, cmd: &UpdateCommand) -> Result<()> {
    let desc = &cmd.family;
    if snapshot.get(&desc.key()).is_some() {
        return Ok(());
    }
    if let Some(existing) = snapshot.find_by_name(&desc.name) {
        return Err(PromFileError::InvalidCommand(format!(
            "{} already stored as {} with labels {:?}",
            desc.name,
            existing.metric_type().map(MetricType::as_str).unwrap_or("untyped"),
            existing.label_names()
        )));
    }

    let suffixes = [BUCKET_SUFFIX, SUM_SUFFIX, COUNT_SUFFIX];
    for family in snapshot.families() {
        let shadowed = family.metric_type() == Some(MetricType::Histogram)
            && suffixes
                .iter()
                .any(|s| desc.name.strip_suffix(*s) == Some(family.name()));
        let shadows = desc.metric_type == MetricType::Histogram
            && suffixes
                .iter()
                .any(|s| family.name().strip_suffix(*s) == Some(desc.name.as_str()));
        if shadowed || shadows {
            return Err(PromFileError::InvalidCommand(format!(
                "{} clashes with stored family {}",
                desc.name,
                family.name()
            )));
        }
    }
    Ok(())
}

fn check_buckets(snapshot: &Snapshot, obs: &HistogramObservation) -> Result<()> {
    let Some(family) = snapshot.get(&obs.family.key()) else {
        return Ok(());
    };
    let width = obs.label_values.len();
    let stored: BTreeSet<&str> = family
        .samples()
        .iter()
        .filter(|s| family.is_bucket(s) && s.label_values.starts_with(&obs.label_values))
        .filter_map(|s| s.label_values.get(width).map(String::as_str))
        .filter(|bound| *bound != INF_BOUND)
        .collect();
    if stored.is_empty() {
        return Ok(());
    }

    let requested: Vec<String> = obs.buckets.iter().map(|&b| format_value(b)).collect();
    let requested: BTreeSet<&str> = requested.iter().map(String::as_str).collect();
    if stored != requested {
        return Err(PromFileError::InvalidCommand(format!(
            "{}: buckets {:?} differ from stored buckets {:?}",
            obs.family.name, requested, stored
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::FamilyDescriptor;
    use crate::error::ErrorCode;

    fn values(snap: &Snapshot) -> Vec<(String, Vec<String>, f64)> {
        snap.families()
            .iter()
            .flat_map(|f| f.samples())
            .map(|s| (s.name.clone(), s.label_values.clone(), s.value))
            .collect()
    }

    #[test]
    fn counter_increments_accumulate() {
        let fam = FamilyDescriptor::counter("hits_total", "Hits.", &["path"]);
        let mut snap = Snapshot::new();
        for _ in 0..5 {
            snap = apply(snap, &UpdateCommand::increment_int(fam.clone(), &["/"], 1)).unwrap();
        }
        snap = apply(snap, &UpdateCommand::increment(fam, &["/"], 0.5)).unwrap();

        assert_eq!(values(&snap), vec![("hits_total".into(), vec!["/".into()], 5.5)]);
    }

    #[test]
    fn set_overwrites() {
        let fam = FamilyDescriptor::gauge("temp", "", &[]);
        let mut snap = apply(Snapshot::new(), &UpdateCommand::increment(fam.clone(), &[], 10.0)).unwrap();
        snap = apply(snap, &UpdateCommand::set(fam.clone(), &[], 2.0)).unwrap();
        snap = apply(snap, &UpdateCommand::set(fam, &[], 2.0)).unwrap();

        assert_eq!(values(&snap), vec![("temp".into(), vec![], 2.0)]);
    }

    #[test]
    fn samples_sorted_by_label_values() {
        let fam = FamilyDescriptor::gauge("q", "", &["name", "zone"]);
        let mut snap = Snapshot::new();
        for (name, zone) in [("b", "1"), ("a", "2"), ("a", "1")] {
            snap = apply(snap, &UpdateCommand::set(fam.clone(), &[name, zone], 1.0)).unwrap();
        }
        let order: Vec<Vec<String>> = values(&snap).into_iter().map(|(_, l, _)| l).collect();
        assert_eq!(
            order,
            vec![
                vec!["a".to_string(), "1".to_string()],
                vec!["a".to_string(), "2".to_string()],
                vec!["b".to_string(), "1".to_string()],
            ]
        );
    }

    #[test]
    fn cumulative_histogram_buckets() {
        let fam = FamilyDescriptor::histogram("lat", "", &[]);
        let buckets = [1.0, 5.0, 10.0];
        let mut snap = apply_observation(
            Snapshot::new(),
            &HistogramObservation::new(fam.clone(), &[], &buckets, 0.5),
        )
        .unwrap();
        snap = apply_observation(snap, &HistogramObservation::new(fam, &[], &buckets, 3.0)).unwrap();

        let s = |v: &str| vec![v.to_string()];
        assert_eq!(
            values(&snap),
            vec![
                ("lat_bucket".into(), s("1"), 1.0),
                ("lat_bucket".into(), s("5"), 2.0),
                ("lat_bucket".into(), s("10"), 2.0),
                ("lat_bucket".into(), s("+Inf"), 2.0),
                ("lat_sum".into(), vec![], 3.5),
                ("lat_count".into(), vec![], 2.0),
            ]
        );
    }

    #[test]
    fn rejects_inconsistent_identity() {
        let snap = apply(
            Snapshot::new(),
            &UpdateCommand::increment_int(FamilyDescriptor::counter("jobs", "", &["queue"]), &["a"], 1),
        )
        .unwrap();

        let relabeled = UpdateCommand::increment_int(
            FamilyDescriptor::counter("jobs", "", &["queue", "host"]),
            &["a", "h"],
            1,
        );
        let err = apply(snap.clone(), &relabeled).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCommand);

        let retyped = UpdateCommand::set(FamilyDescriptor::gauge("jobs", "", &["queue"]), &["a"], 1.0);
        assert!(apply(snap, &retyped).is_err());
    }

    #[test]
    fn rejects_names_shadowing_histogram_samples() {
        let fam = FamilyDescriptor::histogram("lat", "", &[]);
        let snap = apply_observation(
            Snapshot::new(),
            &HistogramObservation::new(fam, &[], &[1.0], 0.5),
        )
        .unwrap();
        let shadow = UpdateCommand::set(FamilyDescriptor::gauge("lat_count", "", &[]), &[], 1.0);
        assert!(apply(snap, &shadow).is_err());
    }

    #[test]
    fn rejects_changed_bucket_layout() {
        let fam = FamilyDescriptor::histogram("h", "", &["op"]);
        let snap = apply_observation(
            Snapshot::new(),
            &HistogramObservation::new(fam.clone(), &["read"], &[1.0, 5.0], 3.0),
        )
        .unwrap();

        let err = apply_observation(
            snap.clone(),
            &HistogramObservation::new(fam.clone(), &["read"], &[2.0], 0.5),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCommand);

        // same layout still merges; other label values may pick their own
        let snap = apply_observation(
            snap,
            &HistogramObservation::new(fam.clone(), &["read"], &[1.0, 5.0], 0.5),
        )
        .unwrap();
        let snap = apply_observation(
            snap,
            &HistogramObservation::new(fam, &["write"], &[2.0], 0.5),
        )
        .unwrap();

        let read: Vec<(Vec<String>, f64)> = values(&snap)
            .into_iter()
            .filter(|(n, l, _)| n == "h_bucket" && l[0] == "read")
            .map(|(_, l, v)| (l, v))
            .collect();
        let l = |b: &str| vec!["read".to_string(), b.to_string()];
        assert_eq!(read, vec![(l("1"), 1.0), (l("5"), 2.0), (l("+Inf"), 2.0)]);
    }

    #[test]
    fn untyped_family_blocks_typed_update() {
        let snap = crate::text::parse("hits_total 3\n");
        let err = apply(
            snap,
            &UpdateCommand::increment_int(FamilyDescriptor::counter("hits_total", "", &[]), &[], 1),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCommand);
        assert!(err.to_string().contains("already stored as untyped"));
    }

    #[test]
    fn help_follows_latest_command() {
        let snap = apply(
            Snapshot::new(),
            &UpdateCommand::set(FamilyDescriptor::gauge("g", "old", &[]), &[], 1.0),
        )
        .unwrap();
        let snap = apply(snap, &UpdateCommand::set(FamilyDescriptor::gauge("g", "new", &[]), &[], 2.0)).unwrap();
        assert_eq!(snap.families()[0].help(), "new");
    }
}
