use std::collections::{BTreeMap, HashMap};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{BiologicalAttributes, ExperimentId, GeneId, SampleId};
use crate::error::LoadError;

/// Source of curated experiment and sample data. Loading happens once at the
/// start of a run; a failure here aborts the whole run.
pub trait RegistrySource: Send + Sync {
    fn load(&self) -> Result<RegistrySnapshot, LoadError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub experiments: Vec<RegistryExperiment>,
    /// Gene accession to canonical marker. Empty means markers are not
    /// resolved for this run.
    #[serde(default)]
    pub gene_markers: BTreeMap<GeneId, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryExperiment {
    pub id: ExperimentId,
    #[serde(default)]
    pub samples: Vec<RegistrySample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySample {
    pub name: SampleId,
    #[serde(flatten)]
    pub attributes: BiologicalAttributes,
    #[serde(default)]
    pub relevant: bool,
    #[serde(default)]
    pub strain_excluded: bool,
}

impl RegistrySample {
    /// Relevant and not in an excluded strain.
    pub fn is_loadable(&self) -> bool {
        self.relevant && !self.strain_excluded
    }
}

impl RegistrySnapshot {
    pub fn experiment(&self, id: &ExperimentId) -> Option<&RegistryExperiment> {
        self.experiments.iter().find(|experiment| &experiment.id == id)
    }

    pub fn resolves_markers(&self) -> bool {
        !self.gene_markers.is_empty()
    }

    pub fn marker(&self, gene: &GeneId) -> Option<&str> {
        self.gene_markers.get(gene).map(String::as_str)
    }
}

impl RegistryExperiment {
    pub fn sample_lookup(&self) -> HashMap<&SampleId, &RegistrySample> {
        self.samples
            .iter()
            .map(|sample| (&sample.name, sample))
            .collect()
    }
}

/// Registry snapshot exported as a JSON document.
#[derive(Debug, Clone)]
pub struct JsonRegistry {
    path: Utf8PathBuf,
}

impl JsonRegistry {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl RegistrySource for JsonRegistry {
    fn load(&self) -> Result<RegistrySnapshot, LoadError> {
        let content = fs::read_to_string(self.path.as_std_path()).map_err(|err| {
            LoadError::Registry {
                path: self.path.to_string(),
                message: err.to_string(),
            }
        })?;
        serde_json::from_str(&content).map_err(|err| LoadError::Registry {
            path: self.path.to_string(),
            message: err.to_string(),
        })
    }
}
