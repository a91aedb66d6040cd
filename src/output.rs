use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CheckResult, ExperimentStatus, ProgressEvent, ProgressSink, RunResult, SetsResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_sets(result: &SetsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_check(result: &CheckResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Human-readable summaries on stdout, progress on stderr.
pub struct TextOutput;

impl TextOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        let title = if result.dry_run {
            "rnaseq-load summary (dry run)"
        } else {
            "rnaseq-load summary"
        };
        writeln!(out, "{CYAN}{title}{RESET}")?;
        for outcome in &result.experiments {
            let (label, color) = match outcome.status {
                ExperimentStatus::Loaded => ("loaded", GREEN),
                ExperimentStatus::NotInRegistry => ("not in registry", YELLOW),
                ExperimentStatus::Aborted => ("aborted", RED),
            };
            writeln!(
                out,
                "{color}  {} {label}: {} sets, {} summary, {} detail{RESET}",
                outcome.experiment,
                outcome.replicate_sets,
                outcome.summary_records,
                outcome.detail_records
            )?;
        }
        writeln!(
            out,
            "{GREEN}Records: {} summary, {} detail, {} replicate sets{RESET}",
            result.summary_records, result.detail_records, result.replicate_sets
        )?;
        let excluded = result.report.excluded_samples.len();
        if excluded > 0 {
            writeln!(out, "{YELLOW}Samples excluded by dispersion: {excluded}{RESET}")?;
        }
        for path in &result.written {
            writeln!(out, "  {path}")?;
        }
        Ok(())
    }

    pub fn print_sets(result: &SetsResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "{GREEN}{} replicate sets, {} members across {} experiments{RESET}",
            result.sets, result.members, result.experiments
        )?;
        for id in &result.not_in_registry {
            writeln!(out, "{YELLOW}  {id} not in registry{RESET}")?;
        }
        for path in &result.written {
            writeln!(out, "  {path}")?;
        }
        Ok(())
    }

    pub fn print_check(result: &CheckResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if result.is_ok() {
            writeln!(out, "{GREEN}All {} experiments are registered{RESET}", result.checked)?;
            return Ok(());
        }
        writeln!(out, "{RED}Experiments not in the registry:{RESET}")?;
        for id in &result.unknown {
            writeln!(out, "{RED}  {id}{RESET}")?;
        }
        writeln!(out, "Total: {}", result.unknown.len())?;
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
