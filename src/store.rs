use std::fs;
use std::io::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use serde::Serialize;
use tempfile::Builder;

use crate::emit::{
    DetailRecord, RecordStreams, SetAssociationRecord, SetMemberRecord, SetRecord, SetStreams,
    SummaryRecord,
};
use crate::error::LoadError;
use crate::report::RunReport;

pub const SUMMARY_FILE: &str = "rnaseq_combined.bcp";
pub const DETAIL_FILE: &str = "rnaseq.bcp";
pub const SET_FILE: &str = "rnaseq_set.bcp";
pub const SET_MEMBER_FILE: &str = "rnaseq_set_member.bcp";
pub const SET_CACHE_FILE: &str = "rnaseq_set_cache.bcp";
pub const REPORT_FILE: &str = "rnaseq_load.curation.log";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// Audit columns appended to every bulk-load row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStamp {
    pub created_by: u32,
    pub load_date: String,
}

impl LoadStamp {
    pub fn today(created_by: u32) -> Self {
        Self::on(created_by, chrono::Local::now().date_naive())
    }

    pub fn on(created_by: u32, date: NaiveDate) -> Self {
        Self {
            created_by,
            load_date: date.format("%m/%d/%Y").to_string(),
        }
    }

    fn suffix(&self) -> String {
        format!(
            "{by}\t{by}\t{date}\t{date}",
            by = self.created_by,
            date = self.load_date
        )
    }
}

/// Output directory holding the bulk-load files and the run report.
#[derive(Debug, Clone)]
pub struct Store {
    output_dir: Utf8PathBuf,
}

impl Store {
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    pub fn path(&self, file: &str) -> Utf8PathBuf {
        self.output_dir.join(file)
    }

    pub fn ensure_output_dir(&self) -> Result<(), LoadError> {
        fs::create_dir_all(self.output_dir.as_std_path())
            .map_err(|err| LoadError::Filesystem(err.to_string()))
    }

    pub fn write_records(
        &self,
        streams: &RecordStreams,
        stamp: &LoadStamp,
    ) -> Result<Vec<Utf8PathBuf>, LoadError> {
        let summary = self.path(SUMMARY_FILE);
        let detail = self.path(DETAIL_FILE);
        let cache = self.path(SET_CACHE_FILE);
        let summaries = render_lines(&streams.summaries, stamp, summary_line);
        let details = render_lines(&streams.details, stamp, detail_line);
        let associations = render_lines(&streams.associations, stamp, association_line);
        Self::write_bytes_atomic(&summary, summaries.as_bytes())?;
        Self::write_bytes_atomic(&detail, details.as_bytes())?;
        Self::write_bytes_atomic(&cache, associations.as_bytes())?;
        Ok(vec![summary, detail, cache])
    }

    pub fn write_sets(
        &self,
        streams: &SetStreams,
        stamp: &LoadStamp,
    ) -> Result<Vec<Utf8PathBuf>, LoadError> {
        let sets = self.path(SET_FILE);
        let members = self.path(SET_MEMBER_FILE);
        let set_rows = render_lines(&streams.sets, stamp, set_line);
        let member_rows = render_lines(&streams.members, stamp, member_line);
        Self::write_bytes_atomic(&sets, set_rows.as_bytes())?;
        Self::write_bytes_atomic(&members, member_rows.as_bytes())?;
        Ok(vec![sets, members])
    }

    pub fn write_report(&self, report: &RunReport) -> Result<Utf8PathBuf, LoadError> {
        let path = self.path(REPORT_FILE);
        Self::write_bytes_atomic(&path, report.render().as_bytes())?;
        Ok(path)
    }

    pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), LoadError> {
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| LoadError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    /// Write through a temporary file in the destination directory, then
    /// rename it into place.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), LoadError> {
        let parent = path
            .parent()
            .ok_or_else(|| LoadError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| LoadError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("rnaseq-load")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| LoadError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| LoadError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| LoadError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn render_lines<T>(records: &[T], stamp: &LoadStamp, line: fn(&T) -> String) -> String {
    let suffix = stamp.suffix();
    records
        .iter()
        .map(|record| format!("{}\t{suffix}\n", line(record)))
        .collect()
}

fn summary_line(record: &SummaryRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.id,
        record.experiment,
        record.gene,
        record.marker.as_deref().unwrap_or(""),
        record.level,
        record.num_replicates,
        record.average_tpm,
        record.set_id.map(|id| id.to_string()).unwrap_or_default()
    )
}

fn detail_line(record: &DetailRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        record.id,
        record.summary_id,
        record.sample,
        record.gene,
        record.raw_tpm,
        record.normalized_tpm
    )
}

fn set_line(record: &SetRecord) -> String {
    let key = &record.key;
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.id,
        key.experiment,
        key.age,
        key.organism,
        key.sex,
        key.structure,
        key.stage,
        key.genotype,
        key.note
    )
}

fn member_line(record: &SetMemberRecord) -> String {
    format!("{}\t{}\t{}", record.id, record.set_id, record.sample)
}

fn association_line(record: &SetAssociationRecord) -> String {
    format!("{}\t{}\t{}", record.id, record.summary_id, record.set_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExpressionLevel;

    #[test]
    fn stamp_uses_month_day_year() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let stamp = LoadStamp::on(1613, date);
        assert_eq!(stamp.load_date, "03/07/2026");
        assert_eq!(stamp.suffix(), "1613\t1613\t03/07/2026\t03/07/2026");
    }

    #[test]
    fn summary_rows_leave_missing_markers_and_sets_blank() {
        let record = SummaryRecord {
            id: 1,
            set_id: None,
            experiment: "E-MTAB-1".parse().unwrap(),
            gene: "ENSMUSG01".parse().unwrap(),
            marker: None,
            level: ExpressionLevel::BelowCutoff,
            num_replicates: 2,
            average_tpm: 0.3,
        };
        assert_eq!(
            summary_line(&record),
            "1\tE-MTAB-1\tENSMUSG01\t\tBelow Cutoff\t2\t0.3\t"
        );
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("out").join("file.bcp")).unwrap();
        Store::write_bytes_atomic(&path, b"first").unwrap();
        Store::write_bytes_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(path.as_std_path()).unwrap(), "second");
    }
}
