use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("invalid experiment accession: {0}")]
    InvalidExperimentId(String),

    #[error("invalid {kind} identifier: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("missing config file rnaseq-load.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dispersion cutoff must be a positive number, got {0}")]
    InvalidCutoff(f64),

    #[error("failed to load registry from {path}: {message}")]
    #[diagnostic(help("the run cannot classify samples without the registry snapshot"))]
    Registry { path: String, message: String },

    #[error("{path}:{line}: {message}")]
    MalformedInput {
        path: String,
        line: usize,
        message: String,
    },

    #[error(
        "experiment {experiment}: replicate set members disagree on genes \
         (sample {reference} has {expected} genes, sample {conflicting} has {found})"
    )]
    #[diagnostic(help("every surviving member of a replicate set must report the same genes"))]
    DataConsistency {
        experiment: String,
        reference: String,
        conflicting: String,
        expected: usize,
        found: usize,
    },

    #[error("matrix column not found: {0}")]
    UnknownColumn(String),

    #[error("matrix shape mismatch: {0}")]
    MatrixShape(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
