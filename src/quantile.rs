//! Rank-mean quantile normalization.
//!
//! The reference distribution is built from first-occurrence ranks: the
//! k-th smallest value of every column contributes to the mean at rank k.
//! Values are then mapped back through their minimum rank, so ties inside a
//! column share one normalized value. This matches
//! `df.rank(method="first")` / `df.rank(method="min")` in pandas.

use std::cmp::Ordering;

use crate::domain::SampleId;
use crate::error::LoadError;
use crate::matrix::ExpressionMatrix;

/// Normalize the named sample columns of `matrix`. Columns that are not
/// named pass through unchanged.
pub fn quantile_normalize(
    matrix: &ExpressionMatrix,
    columns: &[SampleId],
) -> Result<ExpressionMatrix, LoadError> {
    let indices = columns
        .iter()
        .map(|sample| {
            matrix
                .column_index(sample)
                .ok_or_else(|| LoadError::UnknownColumn(sample.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut normalized = matrix.clone();
    if indices.is_empty() || matrix.n_genes() == 0 {
        return Ok(normalized);
    }

    let sorted_columns: Vec<Vec<f64>> = indices
        .iter()
        .map(|&index| sorted_copy(matrix.column(index)))
        .collect();
    let means = rank_means(&sorted_columns, matrix.n_genes());

    for (&index, sorted) in indices.iter().zip(&sorted_columns) {
        let values = matrix
            .column(index)
            .iter()
            .map(|value| means[min_rank(sorted, *value)])
            .collect();
        normalized.replace_column(index, values);
    }
    Ok(normalized)
}

fn sorted_copy(column: &[f64]) -> Vec<f64> {
    let mut sorted = column.to_vec();
    // stable, so equal values keep first-occurrence order
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn rank_means(sorted_columns: &[Vec<f64>], n_ranks: usize) -> Vec<f64> {
    let n_columns = sorted_columns.len() as f64;
    (0..n_ranks)
        .map(|rank| sorted_columns.iter().map(|column| column[rank]).sum::<f64>() / n_columns)
        .collect()
}

/// Zero-based minimum rank of `value` within an ascending column.
fn min_rank(sorted: &[f64], value: f64) -> usize {
    sorted.partition_point(|candidate| candidate.total_cmp(&value) == Ordering::Less)
}
