//! Reader for the joined per-run files.
//!
//! Each experiment arrives as one tab-delimited file produced by joining the
//! expression table (gene, run, TPM) with the sample table (run, sample):
//!
//! ```text
//! ENSMUSG00000000001	ERR1234	12.5	liver_rep1
//! ENSMUSG00000000001	ERR1235		liver_rep1
//! ENSMUSG00000000001	ERR9999	3.1
//! ```
//!
//! A blank TPM is kept as `None` so callers can report it; a missing sample
//! column means the run was absent from the sample table.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use camino::Utf8Path;
use flate2::read::GzDecoder;

use crate::domain::{GeneId, RunId, SampleId};
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub line: usize,
    pub gene: GeneId,
    pub run: RunId,
    pub tpm: Option<f64>,
    pub sample: Option<SampleId>,
}

pub fn read_joined_file(path: &Utf8Path) -> Result<Vec<JoinedRow>, LoadError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| LoadError::Filesystem(format!("open {path}: {err}")))?;
    let reader: Box<dyn Read> = if path.extension() == Some("gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    parse_joined(BufReader::new(reader), path.as_str())
}

pub fn parse_joined<R: BufRead>(reader: R, source: &str) -> Result<Vec<JoinedRow>, LoadError> {
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|err| LoadError::Filesystem(format!("read {source}: {err}")))?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_line(line, line_no, source)?);
    }
    Ok(rows)
}

fn parse_line(line: &str, line_no: usize, source: &str) -> Result<JoinedRow, LoadError> {
    let malformed = |message: String| LoadError::MalformedInput {
        path: source.to_string(),
        line: line_no,
        message,
    };

    let columns: Vec<&str> = line.split('\t').map(str::trim).collect();
    if columns.len() < 3 {
        return Err(malformed(format!(
            "expected at least 3 columns, found {}",
            columns.len()
        )));
    }

    let gene = columns[0]
        .parse::<GeneId>()
        .map_err(|err| malformed(err.to_string()))?;
    let run = columns[1]
        .parse::<RunId>()
        .map_err(|err| malformed(err.to_string()))?;
    let tpm = match columns[2] {
        "" => None,
        value => Some(
            value
                .parse::<f64>()
                .ok()
                .filter(|tpm| tpm.is_finite())
                .ok_or_else(|| malformed(format!("invalid TPM value {value:?}")))?,
        ),
    };
    let sample = match columns.get(3) {
        Some(value) if !value.is_empty() => Some(
            value
                .parse::<SampleId>()
                .map_err(|err| malformed(err.to_string()))?,
        ),
        _ => None,
    };

    Ok(JoinedRow {
        line: line_no,
        gene,
        run,
        tpm,
        sample,
    })
}
