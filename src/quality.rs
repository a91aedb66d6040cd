//! Whole-sample rejection by mean dispersion.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::{ExperimentId, SampleId, round_to};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedSample {
    pub experiment: ExperimentId,
    pub sample: SampleId,
    pub mean_dispersion: f64,
}

#[derive(Debug, Clone, Default)]
pub struct QualityOutcome {
    pub passed: BTreeSet<SampleId>,
    pub excluded: Vec<ExcludedSample>,
}

/// Mean of the per-gene dispersion ratios, rounded to 2 decimals.
pub fn mean_dispersion(ratios: &[f64]) -> f64 {
    let raw = ratios.iter().sum::<f64>() / ratios.len().max(1) as f64;
    round_to(raw, 2)
}

/// Samples with a mean dispersion strictly above `cutoff` are dropped; the
/// rest pass unchanged.
pub fn filter_samples(
    experiment: &ExperimentId,
    dispersions: &BTreeMap<SampleId, Vec<f64>>,
    cutoff: f64,
) -> QualityOutcome {
    let mut outcome = QualityOutcome::default();
    for (sample, ratios) in dispersions {
        let mean = mean_dispersion(ratios);
        if mean > cutoff {
            outcome.excluded.push(ExcludedSample {
                experiment: experiment.clone(),
                sample: sample.clone(),
                mean_dispersion: mean,
            });
        } else {
            outcome.passed.insert(sample.clone());
        }
    }
    outcome
}
