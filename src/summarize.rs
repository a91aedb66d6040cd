use serde::Serialize;

use crate::domain::{ExpressionLevel, GeneId, ReplicateKey, SampleId, round_to};
use crate::matrix::ExpressionMatrix;

/// Averages at or above 1.0 are truncated to whole numbers; the bucket
/// thresholds above 1 are integral.
pub fn average_normalized<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    let average = round_to(sum / count.max(1) as f64, 1);
    if average >= 1.0 {
        average.trunc()
    } else {
        average
    }
}

pub fn classify(value: f64) -> ExpressionLevel {
    if value < 0.5 {
        ExpressionLevel::BelowCutoff
    } else if value <= 10.0 {
        ExpressionLevel::Low
    } else if value <= 1000.0 {
        ExpressionLevel::Medium
    } else {
        ExpressionLevel::High
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneSummary {
    pub gene: GeneId,
    pub level: ExpressionLevel,
    pub num_replicates: usize,
    pub average: f64,
    /// Raw average TPM per sample, in the set's sample order.
    pub raw: Vec<f64>,
    /// Quantile-normalized TPM per sample, in the set's sample order.
    pub normalized: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetSummary {
    pub key: ReplicateKey,
    pub samples: Vec<SampleId>,
    pub genes: Vec<GeneSummary>,
}

/// Roll a normalized replicate-set matrix up into one summary per gene.
/// `raw` and `normalized` share the same gene and sample labels.
pub fn summarize_set(
    key: &ReplicateKey,
    raw: &ExpressionMatrix,
    normalized: &ExpressionMatrix,
) -> SetSummary {
    let genes = normalized
        .genes()
        .iter()
        .enumerate()
        .map(|(index, gene)| {
            let values: Vec<f64> = normalized.row(index).collect();
            let average = average_normalized(values.iter().copied());
            GeneSummary {
                gene: gene.clone(),
                level: classify(average),
                num_replicates: values.len(),
                average,
                raw: raw.row(index).collect(),
                normalized: values,
            }
        })
        .collect();

    SetSummary {
        key: key.clone(),
        samples: normalized.samples().to_vec(),
        genes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BiologicalAttributes, ExperimentId};

    #[test]
    fn bucket_boundaries() {
        assert_eq!(classify(0.49), ExpressionLevel::BelowCutoff);
        assert_eq!(classify(0.5), ExpressionLevel::Low);
        assert_eq!(classify(10.0), ExpressionLevel::Low);
        assert_eq!(classify(11.0), ExpressionLevel::Medium);
        assert_eq!(classify(1000.0), ExpressionLevel::Medium);
        assert_eq!(classify(1001.0), ExpressionLevel::High);
    }

    #[test]
    fn averages_above_one_are_truncated() {
        assert_eq!(average_normalized([1000.01]), 1000.0);
        assert_eq!(classify(average_normalized([1000.01])), ExpressionLevel::Medium);
        assert_eq!(average_normalized([2.0, 3.0]), 2.0);
        assert_eq!(average_normalized([1000.5, 1001.7]), 1001.0);
    }

    #[test]
    fn values_between_ten_and_eleven_fall_to_low() {
        let average = average_normalized([10.74, 10.74]);
        assert_eq!(average, 10.0);
        assert_eq!(classify(average), ExpressionLevel::Low);

        let average = average_normalized([10.96]);
        assert_eq!(average, 11.0);
        assert_eq!(classify(average), ExpressionLevel::Medium);
    }

    #[test]
    fn averages_below_one_keep_one_decimal() {
        assert_eq!(average_normalized([0.44, 0.46]), 0.5);
        assert_eq!(average_normalized([0.2, 0.3]), 0.3);
        assert_eq!(average_normalized([0.96, 0.98]), 1.0);
        assert_eq!(average_normalized(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn summarize_rows_across_samples() {
        let experiment: ExperimentId = "E-MTAB-3".parse().unwrap();
        let key = ReplicateKey::new(&experiment, &BiologicalAttributes::default());
        let genes: Vec<GeneId> = vec!["G1".parse().unwrap(), "G2".parse().unwrap()];
        let samples: Vec<SampleId> = vec!["S1".parse().unwrap(), "S2".parse().unwrap()];
        let raw = ExpressionMatrix::from_columns(
            genes.clone(),
            samples.clone(),
            vec![vec![1.0, 2.0], vec![4.0, 6.0]],
        )
        .unwrap();
        let normalized = ExpressionMatrix::from_columns(
            genes,
            samples,
            vec![vec![2.5, 4.0], vec![2.5, 4.0]],
        )
        .unwrap();

        let summary = summarize_set(&key, &raw, &normalized);

        assert_eq!(summary.samples.len(), 2);
        assert_eq!(summary.genes.len(), 2);
        assert_eq!(summary.genes[0].average, 2.0);
        assert_eq!(summary.genes[0].level, ExpressionLevel::Low);
        assert_eq!(summary.genes[0].num_replicates, 2);
        assert_eq!(summary.genes[0].raw, vec![1.0, 4.0]);
        assert_eq!(summary.genes[1].normalized, vec![4.0, 4.0]);
    }
}
