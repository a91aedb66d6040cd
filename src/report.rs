//! Per-run curation log.
//!
//! Every expected exclusion is recorded here instead of stopping the run.
//! The report is an append-only context owned by a single run; `render`
//! produces the text log handed to curators.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::aggregate::ReplicateAudit;
use crate::domain::{ExperimentId, GeneId, RunId, SampleId};
use crate::quality::ExcludedSample;
use crate::replicates::SkippedSet;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SampleRef {
    pub experiment: ExperimentId,
    pub sample: SampleId,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RunRef {
    pub experiment: ExperimentId,
    pub run: RunId,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GeneRef {
    pub experiment: ExperimentId,
    pub gene: GeneId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyTpm {
    pub experiment: ExperimentId,
    pub gene: GeneId,
    pub run: RunId,
}

/// An experiment whose records were discarded as a whole.
#[derive(Debug, Clone, Serialize)]
pub struct AbortedExperiment {
    pub experiment: ExperimentId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub experiments_not_in_registry: Vec<ExperimentId>,
    pub runs_without_sample: BTreeSet<RunRef>,
    pub samples_not_in_registry: BTreeSet<SampleRef>,
    pub non_relevant_samples: BTreeSet<SampleRef>,
    pub strain_excluded_samples: BTreeSet<SampleRef>,
    pub genes_without_marker: BTreeSet<GeneRef>,
    pub empty_tpm: Vec<EmptyTpm>,
    pub excluded_samples: Vec<ExcludedSample>,
    pub skipped_sets: Vec<SkippedSet>,
    pub aborted_experiments: Vec<AbortedExperiment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replicate_audit: Vec<ReplicateAudit>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.experiments_not_in_registry.is_empty()
            && self.runs_without_sample.is_empty()
            && self.samples_not_in_registry.is_empty()
            && self.non_relevant_samples.is_empty()
            && self.strain_excluded_samples.is_empty()
            && self.genes_without_marker.is_empty()
            && self.empty_tpm.is_empty()
            && self.excluded_samples.is_empty()
            && self.skipped_sets.is_empty()
            && self.aborted_experiments.is_empty()
    }

    /// Absorb the entries collected while processing one experiment.
    pub fn merge(&mut self, other: RunReport) {
        self.experiments_not_in_registry
            .extend(other.experiments_not_in_registry);
        self.runs_without_sample.extend(other.runs_without_sample);
        self.samples_not_in_registry
            .extend(other.samples_not_in_registry);
        self.non_relevant_samples.extend(other.non_relevant_samples);
        self.strain_excluded_samples
            .extend(other.strain_excluded_samples);
        self.genes_without_marker.extend(other.genes_without_marker);
        self.empty_tpm.extend(other.empty_tpm);
        self.excluded_samples.extend(other.excluded_samples);
        self.skipped_sets.extend(other.skipped_sets);
        self.aborted_experiments.extend(other.aborted_experiments);
        self.replicate_audit.extend(other.replicate_audit);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        section(
            &mut out,
            "Experiments not in the registry",
            self.experiments_not_in_registry.iter().map(ToString::to_string),
        );
        section(
            &mut out,
            "Runs not in the sample file",
            self.runs_without_sample
                .iter()
                .map(|entry| format!("{}\t{}", entry.experiment, entry.run)),
        );
        section(
            &mut out,
            "Samples not in the registry",
            self.samples_not_in_registry.iter().map(sample_line),
        );
        section(
            &mut out,
            "Samples not flagged as relevant",
            self.non_relevant_samples.iter().map(sample_line),
        );
        section(
            &mut out,
            "Samples in an excluded strain",
            self.strain_excluded_samples.iter().map(sample_line),
        );
        section(
            &mut out,
            "Genes without a marker",
            self.genes_without_marker
                .iter()
                .map(|entry| format!("{}\t{}", entry.experiment, entry.gene)),
        );
        section(
            &mut out,
            "Runs with empty TPM value set to 0.0",
            self.empty_tpm
                .iter()
                .map(|entry| format!("{}\t{}\t{}", entry.experiment, entry.gene, entry.run)),
        );
        section(
            &mut out,
            "Samples excluded by mean dispersion",
            self.excluded_samples.iter().map(|entry| {
                format!(
                    "{}\t{}\t{:.2}",
                    entry.experiment, entry.sample, entry.mean_dispersion
                )
            }),
        );
        section(
            &mut out,
            "Replicate sets with no surviving samples",
            self.skipped_sets.iter().map(|entry| {
                let key = &entry.key;
                format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\tdeclared={}",
                    key.experiment,
                    key.age,
                    key.organism,
                    key.sex,
                    key.stage,
                    key.structure,
                    key.genotype,
                    key.note,
                    entry.declared
                )
            }),
        );
        section(
            &mut out,
            "Experiments aborted",
            self.aborted_experiments
                .iter()
                .map(|entry| format!("{}\t{}", entry.experiment, entry.reason)),
        );
        section(
            &mut out,
            "Technical replicate statistics",
            self.replicate_audit.iter().map(|entry| {
                let values: Vec<String> = entry.values.iter().map(f64::to_string).collect();
                format!(
                    "{}\t{}\t{}\t[{}]\tmean={}\tstd={}\tdispersion={}",
                    entry.experiment,
                    entry.gene,
                    entry.sample,
                    values.join(", "),
                    entry.stats.mean,
                    entry.stats.std_dev,
                    entry.stats.dispersion
                )
            }),
        );
        out
    }
}

fn sample_line(entry: &SampleRef) -> String {
    format!("{}\t{}", entry.experiment, entry.sample)
}

fn section<I>(out: &mut String, title: &str, lines: I)
where
    I: IntoIterator<Item = String>,
{
    let mut lines = lines.into_iter().peekable();
    if lines.peek().is_none() {
        return;
    }
    out.push_str(&format!("\n{title}\n{}\n", "-".repeat(title.len())));
    let mut total = 0usize;
    for line in lines {
        out.push_str(&line);
        out.push('\n');
        total += 1;
    }
    out.push_str(&format!("Total: {total}\n"));
}
