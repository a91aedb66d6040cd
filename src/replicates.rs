//! Biological replicate sets.
//!
//! Samples of one experiment are grouped by their full attribute tuple. The
//! registry-declared sets are then narrowed to the samples that actually
//! have expression data and passed the quality filter, and each surviving
//! set becomes a rectangular gene × sample matrix.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::{BiologicalAttributes, ExperimentId, GeneId, ReplicateKey, SampleId};
use crate::error::LoadError;
use crate::matrix::ExpressionMatrix;
use crate::registry::RegistryExperiment;

pub type ReplicateSets = BTreeMap<ReplicateKey, BTreeSet<SampleId>>;

/// Group samples by exact equality of their attribute tuple.
pub fn group_by_attributes<'a, I>(experiment: &ExperimentId, samples: I) -> ReplicateSets
where
    I: IntoIterator<Item = (&'a SampleId, &'a BiologicalAttributes)>,
{
    let mut sets = ReplicateSets::new();
    for (sample, attributes) in samples {
        sets.entry(ReplicateKey::new(experiment, attributes))
            .or_default()
            .insert(sample.clone());
    }
    sets
}

/// Replicate sets declared by the registry: relevant samples outside the
/// excluded strains.
pub fn registry_replicate_sets(experiment: &RegistryExperiment) -> ReplicateSets {
    group_by_attributes(
        &experiment.id,
        experiment
            .samples
            .iter()
            .filter(|sample| sample.is_loadable())
            .map(|sample| (&sample.name, &sample.attributes)),
    )
}

/// A replicate set with at least one surviving member, ready to normalize.
#[derive(Debug, Clone)]
pub struct ReplicateGroup {
    pub key: ReplicateKey,
    pub matrix: ExpressionMatrix,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSet {
    pub key: ReplicateKey,
    pub declared: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedGroups {
    pub groups: Vec<ReplicateGroup>,
    pub skipped: Vec<SkippedSet>,
}

/// Intersect the declared sets with the surviving samples and build one raw
/// matrix per set.
///
/// Every surviving member of a set must report exactly the same genes as the
/// first surviving member; otherwise a [`LoadError::DataConsistency`] is
/// returned for the whole experiment.
pub fn resolve_groups(
    experiment: &ExperimentId,
    sets: &ReplicateSets,
    averages: &BTreeMap<SampleId, BTreeMap<GeneId, f64>>,
    passed: &BTreeSet<SampleId>,
) -> Result<ResolvedGroups, LoadError> {
    let mut resolved = ResolvedGroups::default();

    for (key, members) in sets {
        let survivors: Vec<(&SampleId, &BTreeMap<GeneId, f64>)> = members
            .iter()
            .filter(|sample| passed.contains(*sample))
            .filter_map(|sample| averages.get(sample).map(|genes| (sample, genes)))
            .collect();

        let Some(&(reference, reference_genes)) = survivors.first() else {
            resolved.skipped.push(SkippedSet {
                key: key.clone(),
                declared: members.len(),
            });
            continue;
        };

        for &(sample, genes) in &survivors[1..] {
            if !genes.keys().eq(reference_genes.keys()) {
                return Err(LoadError::DataConsistency {
                    experiment: experiment.to_string(),
                    reference: reference.to_string(),
                    conflicting: sample.to_string(),
                    expected: reference_genes.len(),
                    found: genes.len(),
                });
            }
        }

        let genes: Vec<GeneId> = reference_genes.keys().cloned().collect();
        let samples: Vec<SampleId> = survivors
            .iter()
            .map(|(sample, _)| (*sample).clone())
            .collect();
        let columns: Vec<Vec<f64>> = survivors
            .iter()
            .map(|(_, values)| values.values().copied().collect())
            .collect();

        resolved.groups.push(ReplicateGroup {
            key: key.clone(),
            matrix: ExpressionMatrix::from_columns(genes, samples, columns)?,
        });
    }

    Ok(resolved)
}
