use crate::domain::{GeneId, SampleId};
use crate::error::LoadError;

/// Dense gene × sample table, stored column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    genes: Vec<GeneId>,
    samples: Vec<SampleId>,
    columns: Vec<Vec<f64>>,
}

impl ExpressionMatrix {
    pub fn from_columns(
        genes: Vec<GeneId>,
        samples: Vec<SampleId>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, LoadError> {
        if samples.len() != columns.len() {
            return Err(LoadError::MatrixShape(format!(
                "matrix has {} sample labels but {} columns",
                samples.len(),
                columns.len()
            )));
        }
        if let Some((sample, column)) = samples
            .iter()
            .zip(&columns)
            .find(|(_, column)| column.len() != genes.len())
        {
            return Err(LoadError::MatrixShape(format!(
                "matrix column {sample} has {} rows, expected {}",
                column.len(),
                genes.len()
            )));
        }
        Ok(Self {
            genes,
            samples,
            columns,
        })
    }

    pub fn genes(&self) -> &[GeneId] {
        &self.genes
    }

    pub fn samples(&self) -> &[SampleId] {
        &self.samples
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn column_index(&self, sample: &SampleId) -> Option<usize> {
        self.samples.iter().position(|candidate| candidate == sample)
    }

    pub fn value(&self, gene: usize, sample: usize) -> f64 {
        self.columns[sample][gene]
    }

    pub fn row(&self, gene: usize) -> impl Iterator<Item = f64> + '_ {
        self.columns.iter().map(move |column| column[gene])
    }

    pub(crate) fn replace_column(&mut self, index: usize, values: Vec<f64>) {
        self.columns[index] = values;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<T: std::str::FromStr>(values: &[&str]) -> Vec<T>
    where
        T::Err: std::fmt::Debug,
    {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn rejects_ragged_columns() {
        let result = ExpressionMatrix::from_columns(
            ids(&["G1", "G2"]),
            ids(&["S1", "S2"]),
            vec![vec![1.0, 2.0], vec![3.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn row_reads_across_columns() {
        let matrix = ExpressionMatrix::from_columns(
            ids(&["G1", "G2"]),
            ids(&["S1", "S2"]),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        assert_eq!(matrix.row(1).collect::<Vec<_>>(), vec![2.0, 4.0]);
        assert_eq!(matrix.value(0, 1), 3.0);
        assert_eq!(matrix.column_index(&"S2".parse().unwrap()), Some(1));
    }
}
