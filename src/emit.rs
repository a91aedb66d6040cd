//! Bulk-load record streams.
//!
//! Identifiers start at 1 for every stream and follow emission order:
//! experiment, replicate set, gene, then the gene's samples. Downstream
//! bulk loads key on this ordering.
//!
//! Replicate sets are numbered from the registry declaration, so a summary
//! points at the same set id whether the sets come from `run` or `sets`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ExperimentId, ExpressionLevel, GeneId, ReplicateKey, SampleId};
use crate::replicates::ReplicateSets;
use crate::summarize::SetSummary;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub id: u64,
    /// Registry set the summary was computed from. `None` only when the
    /// emitter was built without declared sets.
    pub set_id: Option<u64>,
    pub experiment: ExperimentId,
    pub gene: GeneId,
    pub marker: Option<String>,
    pub level: ExpressionLevel,
    pub num_replicates: usize,
    pub average_tpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRecord {
    pub id: u64,
    pub summary_id: u64,
    pub sample: SampleId,
    pub gene: GeneId,
    pub raw_tpm: f64,
    pub normalized_tpm: f64,
}

/// Links a summary record to the replicate set it summarizes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetAssociationRecord {
    pub id: u64,
    pub summary_id: u64,
    pub set_id: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordStreams {
    pub summaries: Vec<SummaryRecord>,
    pub details: Vec<DetailRecord>,
    pub associations: Vec<SetAssociationRecord>,
}

#[derive(Debug, Clone, Copy)]
struct IdCounter(u64);

impl Default for IdCounter {
    fn default() -> Self {
        Self(1)
    }
}

impl IdCounter {
    fn next(&mut self) -> u64 {
        let id = self.0;
        self.0 += 1;
        id
    }
}

#[derive(Debug, Default)]
pub struct RecordEmitter {
    summary_ids: IdCounter,
    detail_ids: IdCounter,
    association_ids: IdCounter,
    set_ids: BTreeMap<ReplicateKey, u64>,
    streams: RecordStreams,
}

impl RecordEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitter whose summaries reference the ids of `sets`.
    pub fn with_sets(sets: &SetStreams) -> Self {
        Self {
            set_ids: sets
                .sets
                .iter()
                .map(|record| (record.key.clone(), record.id))
                .collect(),
            ..Self::default()
        }
    }

    /// Append the records of one fully processed experiment.
    pub fn emit_experiment<F>(&mut self, experiment: &ExperimentId, sets: &[SetSummary], marker: F)
    where
        F: Fn(&GeneId) -> Option<String>,
    {
        for set in sets {
            let set_id = self.set_ids.get(&set.key).copied();
            for gene in &set.genes {
                let summary_id = self.summary_ids.next();
                self.streams.summaries.push(SummaryRecord {
                    id: summary_id,
                    set_id,
                    experiment: experiment.clone(),
                    gene: gene.gene.clone(),
                    marker: marker(&gene.gene),
                    level: gene.level,
                    num_replicates: gene.num_replicates,
                    average_tpm: gene.average,
                });
                if let Some(set_id) = set_id {
                    self.streams.associations.push(SetAssociationRecord {
                        id: self.association_ids.next(),
                        summary_id,
                        set_id,
                    });
                }
                for ((sample, raw), normalized) in
                    set.samples.iter().zip(&gene.raw).zip(&gene.normalized)
                {
                    self.streams.details.push(DetailRecord {
                        id: self.detail_ids.next(),
                        summary_id,
                        sample: sample.clone(),
                        gene: gene.gene.clone(),
                        raw_tpm: *raw,
                        normalized_tpm: *normalized,
                    });
                }
            }
        }
    }

    pub fn finish(self) -> RecordStreams {
        self.streams
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetRecord {
    pub id: u64,
    pub key: ReplicateKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetMemberRecord {
    pub id: u64,
    pub set_id: u64,
    pub sample: SampleId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SetStreams {
    pub sets: Vec<SetRecord>,
    pub members: Vec<SetMemberRecord>,
}

/// Registry-declared replicate sets and their members, numbered the same
/// way as the expression records.
pub fn emit_replicate_sets<'a, I>(experiments: I) -> SetStreams
where
    I: IntoIterator<Item = &'a ReplicateSets>,
{
    let mut set_ids = IdCounter::default();
    let mut member_ids = IdCounter::default();
    let mut streams = SetStreams::default();
    for sets in experiments {
        for (key, members) in sets {
            let set_id = set_ids.next();
            streams.sets.push(SetRecord {
                id: set_id,
                key: key.clone(),
            });
            for sample in members {
                streams.members.push(SetMemberRecord {
                    id: member_ids.next(),
                    set_id,
                    sample: sample.clone(),
                });
            }
        }
    }
    streams
}
