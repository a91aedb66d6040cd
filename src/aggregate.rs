//! Technical-replicate aggregation.
//!
//! Every sample may have been sequenced several times. The runs of one sample
//! are collapsed into a single average TPM per gene, and the spread between
//! runs is kept as a dispersion ratio for the sample quality filter.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ExperimentId, ExpressionRow, GeneId, SampleId, round_to};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplicateStats {
    pub mean: f64,
    pub std_dev: f64,
    pub dispersion: f64,
    pub count: usize,
}

/// Diagnostic line for one (gene, sample) pair.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicateAudit {
    pub experiment: ExperimentId,
    pub gene: GeneId,
    pub sample: SampleId,
    pub values: Vec<f64>,
    pub stats: ReplicateStats,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Average TPM per sample, per gene.
    pub averages: BTreeMap<SampleId, BTreeMap<GeneId, f64>>,
    /// Per-gene dispersion ratios per sample, in gene order.
    pub dispersions: BTreeMap<SampleId, Vec<f64>>,
    pub audit: Vec<ReplicateAudit>,
}

/// Mean and population standard deviation (both rounded to 2 decimals) and
/// the dispersion ratio derived from the rounded values.
pub fn replicate_stats(values: &[f64]) -> ReplicateStats {
    let count = values.len();
    if count == 0 {
        return ReplicateStats {
            mean: 0.0,
            std_dev: 0.0,
            dispersion: 0.0,
            count,
        };
    }
    let n = count as f64;
    let exact_mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| (value - exact_mean).powi(2))
        .sum::<f64>()
        / n;

    let mean = round_to(exact_mean, 2);
    let std_dev = round_to(variance.sqrt(), 2);
    let dispersion = if mean != 0.0 { std_dev / mean } else { 0.0 };

    ReplicateStats {
        mean,
        std_dev,
        dispersion,
        count,
    }
}

pub fn aggregate_technical_replicates(
    experiment: &ExperimentId,
    rows: &[ExpressionRow],
    keep_audit: bool,
) -> Aggregation {
    let mut grouped: BTreeMap<&SampleId, BTreeMap<&GeneId, Vec<f64>>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(&row.sample)
            .or_default()
            .entry(&row.gene)
            .or_default()
            .push(row.tpm);
    }

    let mut aggregation = Aggregation::default();
    for (sample, genes) in grouped {
        let mut averages = BTreeMap::new();
        let mut dispersions = Vec::with_capacity(genes.len());
        for (gene, values) in genes {
            let stats = replicate_stats(&values);
            averages.insert(gene.clone(), stats.mean);
            dispersions.push(stats.dispersion);
            if keep_audit {
                aggregation.audit.push(ReplicateAudit {
                    experiment: experiment.clone(),
                    gene: gene.clone(),
                    sample: sample.clone(),
                    values,
                    stats,
                });
            }
        }
        aggregation.averages.insert(sample.clone(), averages);
        aggregation.dispersions.insert(sample.clone(), dispersions);
    }
    aggregation
}
