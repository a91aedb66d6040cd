use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate_technical_replicates;
use crate::config::{ExperimentRequest, ResolvedConfig};
use crate::domain::{ExperimentId, ExpressionRow};
use crate::emit::{RecordEmitter, emit_replicate_sets};
use crate::error::LoadError;
use crate::joined::{JoinedRow, read_joined_file};
use crate::quality::filter_samples;
use crate::quantile::quantile_normalize;
use crate::registry::{RegistryExperiment, RegistrySnapshot, RegistrySource};
use crate::replicates::{ReplicateSets, registry_replicate_sets, resolve_groups};
use crate::report::{AbortedExperiment, EmptyTpm, GeneRef, RunRef, RunReport, SampleRef};
use crate::store::{LoadStamp, RUN_SUMMARY_FILE, Store};
use crate::summarize::{SetSummary, summarize_set};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Loaded,
    NotInRegistry,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentOutcome {
    pub experiment: ExperimentId,
    pub status: ExperimentStatus,
    pub replicate_sets: usize,
    pub summary_records: usize,
    pub detail_records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub dry_run: bool,
    pub experiments: Vec<ExperimentOutcome>,
    /// Registry sets of every configured experiment found in the registry.
    pub replicate_sets: usize,
    pub summary_records: usize,
    pub detail_records: usize,
    pub written: Vec<String>,
    pub report: RunReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetsResult {
    pub experiments: usize,
    pub sets: usize,
    pub members: usize,
    pub not_in_registry: Vec<ExperimentId>,
    pub written: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub checked: usize,
    pub unknown: Vec<ExperimentId>,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.unknown.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<R: RegistrySource> {
    store: Store,
    registry: R,
}

impl<R: RegistrySource> App<R> {
    pub fn new(store: Store, registry: R) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Process every configured experiment in order and, unless this is a
    /// dry run, write the bulk-load files and the curation log.
    pub fn run(
        &self,
        config: &ResolvedConfig,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, LoadError> {
        let started = Instant::now();
        let snapshot = self.load_registry(sink)?;

        let declared: Vec<ReplicateSets> = config
            .experiments
            .iter()
            .filter_map(|request| snapshot.experiment(&request.id))
            .map(registry_replicate_sets)
            .collect();
        let sets = emit_replicate_sets(&declared);

        let mut report = RunReport::new();
        let mut emitter = RecordEmitter::with_sets(&sets);
        let mut outcomes = Vec::with_capacity(config.experiments.len());

        for request in &config.experiments {
            let id = &request.id;
            let Some(experiment) = snapshot.experiment(id) else {
                warn!(experiment = %id, "experiment not in registry, skipping");
                report.experiments_not_in_registry.push(id.clone());
                outcomes.push(ExperimentOutcome::empty(id, ExperimentStatus::NotInRegistry));
                continue;
            };

            sink.event(ProgressEvent {
                message: format!("phase=Process; experiment {id}"),
                elapsed: Some(started.elapsed()),
            });

            match process_experiment(&snapshot, experiment, request, config, &mut report) {
                Ok(summaries) => {
                    let outcome = ExperimentOutcome::loaded(id, &summaries);
                    info!(
                        experiment = %id,
                        sets = outcome.replicate_sets,
                        summaries = outcome.summary_records,
                        "experiment processed"
                    );
                    emitter.emit_experiment(id, &summaries, |gene| {
                        snapshot.marker(gene).map(str::to_string)
                    });
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(experiment = %id, error = %err, "experiment aborted");
                    report.aborted_experiments.push(AbortedExperiment {
                        experiment: id.clone(),
                        reason: err.to_string(),
                    });
                    outcomes.push(ExperimentOutcome::empty(id, ExperimentStatus::Aborted));
                }
            }
        }

        let streams = emitter.finish();
        let mut written = Vec::new();
        if !options.dry_run {
            sink.event(ProgressEvent {
                message: format!("phase=Store; writing {}", self.store.output_dir()),
                elapsed: Some(started.elapsed()),
            });
            self.store.ensure_output_dir()?;
            let stamp = LoadStamp::today(config.created_by);
            written.extend(self.store.write_records(&streams, &stamp)?);
            written.extend(self.store.write_sets(&sets, &stamp)?);
            written.push(self.store.write_report(&report)?);
        }

        let mut result = RunResult {
            dry_run: options.dry_run,
            experiments: outcomes,
            replicate_sets: sets.sets.len(),
            summary_records: streams.summaries.len(),
            detail_records: streams.details.len(),
            written: written.iter().map(ToString::to_string).collect(),
            report,
        };

        if !options.dry_run {
            let path = self.store.path(RUN_SUMMARY_FILE);
            result.written.push(path.to_string());
            Store::write_json(&path, &result)?;
        }

        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {} summary records, {} detail records",
                result.summary_records, result.detail_records
            ),
            elapsed: Some(started.elapsed()),
        });
        Ok(result)
    }

    /// Write the registry-declared replicate sets of the configured
    /// experiments.
    pub fn sets(
        &self,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<SetsResult, LoadError> {
        let snapshot = self.load_registry(sink)?;

        let mut not_in_registry = Vec::new();
        let mut declared: Vec<ReplicateSets> = Vec::new();
        for request in &config.experiments {
            match snapshot.experiment(&request.id) {
                Some(experiment) => declared.push(registry_replicate_sets(experiment)),
                None => {
                    warn!(experiment = %request.id, "experiment not in registry, skipping");
                    not_in_registry.push(request.id.clone());
                }
            }
        }

        let streams = emit_replicate_sets(&declared);
        sink.event(ProgressEvent {
            message: format!("phase=Store; {} replicate sets", streams.sets.len()),
            elapsed: None,
        });
        self.store.ensure_output_dir()?;
        let stamp = LoadStamp::today(config.created_by);
        let written = self.store.write_sets(&streams, &stamp)?;

        Ok(SetsResult {
            experiments: declared.len(),
            sets: streams.sets.len(),
            members: streams.members.len(),
            not_in_registry,
            written: written.iter().map(ToString::to_string).collect(),
        })
    }

    /// Report experiment ids that the registry does not know.
    pub fn check(
        &self,
        experiments: &[ExperimentId],
        sink: &dyn ProgressSink,
    ) -> Result<CheckResult, LoadError> {
        let snapshot = self.load_registry(sink)?;
        let unknown = experiments
            .iter()
            .filter(|id| snapshot.experiment(id).is_none())
            .cloned()
            .collect();
        Ok(CheckResult {
            checked: experiments.len(),
            unknown,
        })
    }

    fn load_registry(&self, sink: &dyn ProgressSink) -> Result<RegistrySnapshot, LoadError> {
        sink.event(ProgressEvent {
            message: "phase=Registry; loading snapshot".to_string(),
            elapsed: None,
        });
        let snapshot = self.registry.load()?;
        info!(
            experiments = snapshot.experiments.len(),
            markers = snapshot.gene_markers.len(),
            "registry loaded"
        );
        Ok(snapshot)
    }
}

impl ExperimentOutcome {
    fn empty(experiment: &ExperimentId, status: ExperimentStatus) -> Self {
        Self {
            experiment: experiment.clone(),
            status,
            replicate_sets: 0,
            summary_records: 0,
            detail_records: 0,
        }
    }

    fn loaded(experiment: &ExperimentId, summaries: &[SetSummary]) -> Self {
        Self {
            experiment: experiment.clone(),
            status: ExperimentStatus::Loaded,
            replicate_sets: summaries.len(),
            summary_records: summaries.iter().map(|set| set.genes.len()).sum(),
            detail_records: summaries
                .iter()
                .map(|set| set.genes.len() * set.samples.len())
                .sum(),
        }
    }
}

/// Run one experiment through the pipeline. Audit entries go straight into
/// `report`; an error discards the experiment's records but not its audit.
fn process_experiment(
    snapshot: &RegistrySnapshot,
    experiment: &RegistryExperiment,
    request: &ExperimentRequest,
    config: &ResolvedConfig,
    report: &mut RunReport,
) -> Result<Vec<SetSummary>, LoadError> {
    let id = &request.id;
    let joined = read_joined_file(&request.joined_file)?;
    debug!(experiment = %id, rows = joined.len(), "joined file read");

    let rows = reconcile(snapshot, experiment, joined, report);
    let aggregation = aggregate_technical_replicates(id, &rows, config.audit_replicates);
    report.replicate_audit.extend(aggregation.audit);

    let quality = filter_samples(id, &aggregation.dispersions, config.dispersion_cutoff);
    debug!(
        experiment = %id,
        passed = quality.passed.len(),
        excluded = quality.excluded.len(),
        "quality filter applied"
    );
    report.excluded_samples.extend(quality.excluded);

    let sets = registry_replicate_sets(experiment);
    let resolved = resolve_groups(id, &sets, &aggregation.averages, &quality.passed)?;
    report.skipped_sets.extend(resolved.skipped);

    resolved
        .groups
        .iter()
        .map(|group| -> Result<SetSummary, LoadError> {
            let normalized = quantile_normalize(&group.matrix, group.matrix.samples())?;
            Ok(summarize_set(&group.key, &group.matrix, &normalized))
        })
        .collect()
}

/// Match joined rows against the registry, recording every row that cannot
/// be loaded.
fn reconcile(
    snapshot: &RegistrySnapshot,
    experiment: &RegistryExperiment,
    joined: Vec<JoinedRow>,
    report: &mut RunReport,
) -> Vec<ExpressionRow> {
    let id = &experiment.id;
    let lookup = experiment.sample_lookup();
    let mut rows = Vec::with_capacity(joined.len());

    for row in joined {
        if row.tpm.is_none() {
            report.empty_tpm.push(EmptyTpm {
                experiment: id.clone(),
                gene: row.gene.clone(),
                run: row.run.clone(),
            });
        }

        let Some(sample) = row.sample else {
            report.runs_without_sample.insert(RunRef {
                experiment: id.clone(),
                run: row.run,
            });
            continue;
        };
        let sample_ref = || SampleRef {
            experiment: id.clone(),
            sample: sample.clone(),
        };
        let Some(registered) = lookup.get(&sample) else {
            report.samples_not_in_registry.insert(sample_ref());
            continue;
        };
        if !registered.relevant {
            report.non_relevant_samples.insert(sample_ref());
            continue;
        }
        if registered.strain_excluded {
            report.strain_excluded_samples.insert(sample_ref());
            continue;
        }
        if snapshot.resolves_markers() && snapshot.marker(&row.gene).is_none() {
            report.genes_without_marker.insert(GeneRef {
                experiment: id.clone(),
                gene: row.gene,
            });
            continue;
        }

        rows.push(ExpressionRow {
            gene: row.gene,
            run: row.run,
            sample,
            tpm: row.tpm.unwrap_or(0.0),
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BiologicalAttributes;
    use crate::registry::RegistrySample;

    fn registry_sample(name: &str, relevant: bool, strain_excluded: bool) -> RegistrySample {
        RegistrySample {
            name: name.parse().unwrap(),
            attributes: BiologicalAttributes::default(),
            relevant,
            strain_excluded,
        }
    }

    fn joined(gene: &str, run: &str, tpm: Option<f64>, sample: Option<&str>) -> JoinedRow {
        JoinedRow {
            line: 1,
            gene: gene.parse().unwrap(),
            run: run.parse().unwrap(),
            tpm,
            sample: sample.map(|s| s.parse().unwrap()),
        }
    }

    #[test]
    fn reconcile_records_every_skipped_row() {
        let experiment = RegistryExperiment {
            id: "E-MTAB-1".parse().unwrap(),
            samples: vec![
                registry_sample("ok", true, false),
                registry_sample("irrelevant", false, false),
                registry_sample("strain", true, true),
            ],
        };
        let mut snapshot = RegistrySnapshot::default();
        snapshot
            .gene_markers
            .insert("G1".parse().unwrap(), "MGI:1".to_string());

        let rows = vec![
            joined("G1", "R1", Some(1.0), Some("ok")),
            joined("G1", "R2", None, Some("ok")),
            joined("G2", "R1", Some(1.0), Some("ok")),
            joined("G1", "R3", Some(1.0), None),
            joined("G1", "R4", Some(1.0), Some("unknown")),
            joined("G1", "R5", Some(1.0), Some("irrelevant")),
            joined("G1", "R6", Some(1.0), Some("strain")),
        ];

        let mut report = RunReport::new();
        let kept = reconcile(&snapshot, &experiment, rows, &mut report);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].tpm, 0.0);
        assert_eq!(report.empty_tpm.len(), 1);
        assert_eq!(report.genes_without_marker.len(), 1);
        assert_eq!(report.runs_without_sample.len(), 1);
        assert_eq!(report.samples_not_in_registry.len(), 1);
        assert_eq!(report.non_relevant_samples.len(), 1);
        assert_eq!(report.strain_excluded_samples.len(), 1);
    }

    #[test]
    fn genes_are_kept_when_markers_are_not_resolved() {
        let experiment = RegistryExperiment {
            id: "E-MTAB-1".parse().unwrap(),
            samples: vec![registry_sample("ok", true, false)],
        };
        let mut report = RunReport::new();
        let kept = reconcile(
            &RegistrySnapshot::default(),
            &experiment,
            vec![joined("G9", "R1", Some(2.0), Some("ok"))],
            &mut report,
        );
        assert_eq!(kept.len(), 1);
        assert!(report.is_clean());
    }
}
