use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

static EXPERIMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^E-[A-Z]{4}-\d+$").expect("experiment accession pattern"));

/// ArrayExpress experiment accession, e.g. `E-MTAB-2801`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ExperimentId(String);

impl ExperimentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExperimentId {
    type Err = LoadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !EXPERIMENT_RE.is_match(&normalized) {
            return Err(LoadError::InvalidExperimentId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for ExperimentId {
    type Error = LoadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = LoadError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let trimmed = value.trim();
                if trimmed.is_empty() || trimmed.contains(['\t', '\n', '\r']) {
                    return Err(LoadError::InvalidIdentifier {
                        kind: $kind,
                        value: value.to_string(),
                    });
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = LoadError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

identifier!(
    /// Registry sample name (source name or ENA sample accession).
    SampleId,
    "sample"
);
identifier!(
    /// Sequencing run accession.
    RunId,
    "run"
);
identifier!(
    /// Stable gene accession as reported by the expression source.
    GeneId,
    "gene"
);

/// Curated biological attributes of a registry sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiologicalAttributes {
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub organism: String,
    #[serde(default)]
    pub sex: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub structure: String,
    #[serde(default)]
    pub genotype: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Identity of a biological replicate set: the experiment plus the full
/// attribute tuple. A missing note and an empty note are the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReplicateKey {
    pub experiment: ExperimentId,
    pub age: String,
    pub organism: String,
    pub sex: String,
    pub stage: String,
    pub structure: String,
    pub genotype: String,
    pub note: String,
}

impl ReplicateKey {
    pub fn new(experiment: &ExperimentId, attributes: &BiologicalAttributes) -> Self {
        Self {
            experiment: experiment.clone(),
            age: attributes.age.clone(),
            organism: attributes.organism.clone(),
            sex: attributes.sex.clone(),
            stage: attributes.stage.clone(),
            structure: attributes.structure.clone(),
            genotype: attributes.genotype.clone(),
            note: attributes.note.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpressionLevel {
    #[serde(rename = "Below Cutoff")]
    BelowCutoff,
    Low,
    Medium,
    High,
}

impl ExpressionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionLevel::BelowCutoff => "Below Cutoff",
            ExpressionLevel::Low => "Low",
            ExpressionLevel::Medium => "Medium",
            ExpressionLevel::High => "High",
        }
    }
}

impl fmt::Display for ExpressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One TPM value for a gene from a single run, already joined to its sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionRow {
    pub gene: GeneId,
    pub run: RunId,
    pub sample: SampleId,
    pub tpm: f64,
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_experiment_id_normalizes_case() {
        let id: ExperimentId = " e-mtab-2801 ".parse().unwrap();
        assert_eq!(id.as_str(), "E-MTAB-2801");
    }

    #[test]
    fn parse_experiment_id_invalid() {
        let err = "GSE102902".parse::<ExperimentId>().unwrap_err();
        assert_matches!(err, LoadError::InvalidExperimentId(_));
    }

    #[test]
    fn parse_sample_id_rejects_tabs() {
        let err = "a\tb".parse::<SampleId>().unwrap_err();
        assert_matches!(err, LoadError::InvalidIdentifier { kind: "sample", .. });
    }

    #[test]
    fn deserialize_goes_through_parsing() {
        let id: ExperimentId = serde_json::from_str(r#"" e-geod-12 ""#).unwrap();
        assert_eq!(id.as_str(), "E-GEOD-12");
        let sample: SampleId = serde_json::from_str(r#"" liver_1 ""#).unwrap();
        assert_eq!(sample.as_str(), "liver_1");
        assert!(serde_json::from_str::<GeneId>(r#""G\t1""#).is_err());
        assert!(serde_json::from_str::<ExperimentId>(r#""GSE1""#).is_err());
    }

    #[test]
    fn null_note_and_empty_note_share_key() {
        let experiment: ExperimentId = "E-MTAB-1".parse().unwrap();
        let with_empty = BiologicalAttributes {
            note: Some(String::new()),
            ..BiologicalAttributes::default()
        };
        let with_none = BiologicalAttributes::default();
        assert_eq!(
            ReplicateKey::new(&experiment, &with_empty),
            ReplicateKey::new(&experiment, &with_none)
        );
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(round_to(2.345, 1), 2.3);
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(1.0 / 3.0, 2), 0.33);
    }
}
