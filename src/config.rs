use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::ExperimentId;
use crate::error::LoadError;

pub const DEFAULT_CONFIG_FILE: &str = "rnaseq-load.json";
pub const EXPERIMENT_PLACEHOLDER: &str = "{experiment}";
pub const DEFAULT_CREATED_BY: u32 = 1613;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    pub registry: String,
    #[serde(default)]
    pub experiments: Vec<ExperimentEntry>,
    #[serde(default)]
    pub experiment_file: Option<String>,
    #[serde(default)]
    pub joined_file_template: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    pub dispersion_cutoff: f64,
    #[serde(default)]
    pub created_by: Option<u32>,
    #[serde(default)]
    pub audit_replicates: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ExperimentEntry {
    Shorthand(String),
    Detailed(ExperimentEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExperimentEntryObject {
    pub id: String,
    #[serde(default)]
    pub joined_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRequest {
    pub id: ExperimentId,
    pub joined_file: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub registry: Utf8PathBuf,
    pub experiments: Vec<ExperimentRequest>,
    pub joined_file_template: String,
    pub output_dir: Utf8PathBuf,
    pub dispersion_cutoff: f64,
    pub created_by: u32,
    pub audit_replicates: bool,
}

impl ResolvedConfig {
    pub fn experiment_ids(&self) -> Vec<ExperimentId> {
        self.experiments
            .iter()
            .map(|request| request.id.clone())
            .collect()
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path`, or `rnaseq-load.json` from the working directory.
    /// Relative paths inside the file resolve against the file's directory.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, LoadError> {
        let config_path = Utf8PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

        if path.is_none() && !config_path.as_std_path().exists() {
            return Err(LoadError::MissingConfig);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| LoadError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| LoadError::ConfigParse(err.to_string()))?;

        let base = config_path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        Self::resolve_config(config, base)
    }

    pub fn resolve_config(config: Config, base: &Utf8Path) -> Result<ResolvedConfig, LoadError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let cutoff = config.dispersion_cutoff;
        if !cutoff.is_finite() || cutoff <= 0.0 {
            return Err(LoadError::InvalidCutoff(cutoff));
        }

        let joined_file_template = config
            .joined_file_template
            .unwrap_or_else(default_joined_file_template);
        if !joined_file_template.contains(EXPERIMENT_PLACEHOLDER) {
            return Err(LoadError::InvalidConfig(format!(
                "joined_file_template must contain {EXPERIMENT_PLACEHOLDER}"
            )));
        }

        let mut experiments = config
            .experiments
            .into_iter()
            .map(|entry| match entry {
                ExperimentEntry::Shorthand(value) => {
                    let id: ExperimentId = value.parse()?;
                    let joined_file = joined_path(base, &joined_file_template, &id);
                    Ok(ExperimentRequest { id, joined_file })
                }
                ExperimentEntry::Detailed(obj) => {
                    let id: ExperimentId = obj.id.parse()?;
                    let joined_file = match obj.joined_file {
                        Some(file) => base.join(file),
                        None => joined_path(base, &joined_file_template, &id),
                    };
                    Ok(ExperimentRequest { id, joined_file })
                }
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        if let Some(file) = config.experiment_file {
            for id in read_experiment_list(&base.join(file))? {
                let joined_file = joined_path(base, &joined_file_template, &id);
                experiments.push(ExperimentRequest { id, joined_file });
            }
        }

        Ok(ResolvedConfig {
            schema_version,
            registry: base.join(config.registry),
            experiments: dedup_experiments(experiments),
            joined_file_template,
            output_dir: base.join(config.output_dir.unwrap_or_else(default_output_dir)),
            dispersion_cutoff: cutoff,
            created_by: config.created_by.unwrap_or(DEFAULT_CREATED_BY),
            audit_replicates: config.audit_replicates,
        })
    }
}

pub fn default_joined_file_template() -> String {
    format!("input/{EXPERIMENT_PLACEHOLDER}.joined.tsv")
}

pub fn default_output_dir() -> String {
    "output".to_string()
}

fn joined_path(base: &Utf8Path, template: &str, id: &ExperimentId) -> Utf8PathBuf {
    base.join(template.replace(EXPERIMENT_PLACEHOLDER, id.as_str()))
}

fn dedup_experiments(experiments: Vec<ExperimentRequest>) -> Vec<ExperimentRequest> {
    let mut seen = std::collections::HashSet::new();
    experiments
        .into_iter()
        .filter(|request| {
            let first = seen.insert(request.id.clone());
            if !first {
                warn!(experiment = %request.id, "duplicate experiment ignored");
            }
            first
        })
        .collect()
}

pub fn read_experiment_list(path: &Utf8Path) -> Result<Vec<ExperimentId>, LoadError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| LoadError::Filesystem(format!("read {path}: {err}")))?;
    parse_experiment_list(&content, path.as_str())
}

/// First whitespace-separated token of every non-blank line.
pub fn parse_experiment_list(content: &str, source: &str) -> Result<Vec<ExperimentId>, LoadError> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| line.split_whitespace().next().map(|token| (index + 1, token)))
        .map(|(line, token)| {
            token.parse::<ExperimentId>().map_err(|_| LoadError::MalformedInput {
                path: source.to_string(),
                line,
                message: format!("invalid experiment accession {token:?}"),
            })
        })
        .collect()
}
