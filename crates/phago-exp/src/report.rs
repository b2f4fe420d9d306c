use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use phago_core::errors::{ErrorInfo, SweepError};
use phago_core::provenance::{RunProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::serde::{from_json_slice, to_canonical_json_bytes};

/// File name of the persisted sweep report.
pub const REPORT_FILE: &str = "sweep_report.json";
/// File name of the per-run CSV manifest.
pub const MANIFEST_FILE: &str = "runs.csv";

fn io_error(code: &str, path: &Path, err: impl ToString) -> SweepError {
    SweepError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Final state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    /// Artifact written and simulator exited with status zero.
    Succeeded,
    /// Construction, artifact write or simulator failed.
    Failed,
    /// Simulator terminated because the sweep was cancelled.
    Cancelled,
    /// Artifact written; simulator not invoked (dry run).
    Planned,
}

impl RunState {
    /// Stable label used in progress lines and the CSV manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
            RunState::Planned => "planned",
        }
    }
}

/// Record of one dispatched grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Position in enumeration order.
    pub index: usize,
    /// Rendered axis values keyed by axis name.
    pub params: IndexMap<String, String>,
    /// Parameter file path.
    pub artifact: String,
    /// Simulator output directory.
    pub output_dir: String,
    /// Seed passed to the simulator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Final state.
    pub state: RunState,
    /// Simulator exit code, when it exited on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Failure cause for failed or cancelled runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SweepError>,
}

/// How the sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepOutcome {
    /// Every grid point was visited.
    Completed,
    /// Stopped after the first failure under the abort policy.
    Aborted,
    /// Stopped because cancellation was requested.
    Cancelled,
}

/// Outcome of the post-sweep collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessReport {
    /// Command that was launched.
    pub program: String,
    /// Whether it succeeded.
    pub succeeded: bool,
    /// Exit code, when it exited on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Failure cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SweepError>,
}

/// Summary of a sweep, persisted as `sweep_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Report schema version.
    pub schema: SchemaVersion,
    /// Experiment name from the plan.
    pub name: String,
    /// How the sweep ended.
    pub outcome: SweepOutcome,
    /// Whether the simulator was skipped.
    pub dry_run: bool,
    /// Number of grid points.
    pub total: usize,
    /// Final value of the sweep counter.
    pub attempted: usize,
    /// Runs in state `succeeded` (or `planned` for dry runs).
    pub succeeded: usize,
    /// Runs in state `failed`.
    pub failed: usize,
    /// Runs in state `cancelled`.
    pub cancelled: usize,
    /// Grid points never dispatched.
    pub not_dispatched: usize,
    /// Per-run records in dispatch order.
    pub runs: Vec<RunReport>,
    /// Post-processing outcome, when it was launched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<PostProcessReport>,
    /// Provenance of the sweep inputs.
    pub provenance: RunProvenance,
}

impl SweepReport {
    pub(crate) fn new(
        name: &str,
        total: usize,
        dry_run: bool,
        plan_hash: String,
        template_hash: String,
        master_seed: Option<u64>,
    ) -> Self {
        Self {
            schema: SchemaVersion::new(1, 0, 0),
            name: name.to_string(),
            outcome: SweepOutcome::Completed,
            dry_run,
            total,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            not_dispatched: total,
            runs: Vec::with_capacity(total),
            post_process: None,
            provenance: provenance(plan_hash, template_hash, master_seed),
        }
    }

    pub(crate) fn record(&mut self, run: RunReport) -> &RunReport {
        self.attempted += 1;
        self.not_dispatched = self.total.saturating_sub(self.attempted);
        match run.state {
            RunState::Succeeded | RunState::Planned => self.succeeded += 1,
            RunState::Failed => self.failed += 1,
            RunState::Cancelled => self.cancelled += 1,
        }
        self.runs.push(run);
        &self.runs[self.runs.len() - 1]
    }

    /// Runs that did not succeed, with their causes.
    pub fn failures(&self) -> impl Iterator<Item = &RunReport> {
        self.runs
            .iter()
            .filter(|run| matches!(run.state, RunState::Failed | RunState::Cancelled))
    }

    /// Whether every grid point ran successfully and post-processing, if
    /// launched, succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == SweepOutcome::Completed
            && self.failed == 0
            && self.cancelled == 0
            && self
                .post_process
                .as_ref()
                .map_or(true, |post| post.succeeded)
    }
}

fn provenance(plan_hash: String, template_hash: String, master_seed: Option<u64>) -> RunProvenance {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        "phago-exp".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    RunProvenance {
        plan_hash,
        template_hash,
        master_seed,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        tool_versions,
    }
}

/// Writes `sweep_report.json` and `runs.csv` into `dir`.
pub fn persist_report(report: &SweepReport, dir: &Path) -> Result<PathBuf, SweepError> {
    fs::create_dir_all(dir).map_err(|err| io_error("report_dir", dir, err))?;
    let report_path = dir.join(REPORT_FILE);
    let bytes = to_canonical_json_bytes(report)?;
    fs::write(&report_path, bytes).map_err(|err| io_error("report_write", &report_path, err))?;
    write_manifest(report, &dir.join(MANIFEST_FILE))?;
    Ok(report_path)
}

/// Reads a persisted sweep report.
pub fn load_report(path: &Path) -> Result<SweepReport, SweepError> {
    let bytes = fs::read(path).map_err(|err| io_error("report_read", path, err))?;
    from_json_slice(&bytes)
}

fn write_manifest(report: &SweepReport, path: &Path) -> Result<(), SweepError> {
    let csv_error = |err: csv::Error| io_error("manifest_write", path, err);
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    let axis_names: Vec<String> = report
        .runs
        .first()
        .map(|run| run.params.keys().cloned().collect())
        .unwrap_or_default();

    let mut header = vec!["index".to_string()];
    header.extend(axis_names.iter().cloned());
    header.extend(
        ["artifact", "output_dir", "seed", "state", "error"]
            .iter()
            .map(|column| column.to_string()),
    );
    writer.write_record(&header).map_err(csv_error)?;

    for run in &report.runs {
        let mut row = vec![run.index.to_string()];
        for name in &axis_names {
            row.push(run.params.get(name).cloned().unwrap_or_default());
        }
        row.push(run.artifact.clone());
        row.push(run.output_dir.clone());
        row.push(run.seed.map(|seed| seed.to_string()).unwrap_or_default());
        row.push(run.state.as_str().to_string());
        row.push(
            run.error
                .as_ref()
                .map(|err| err.info().code.clone())
                .unwrap_or_default(),
        );
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|err| io_error("manifest_write", path, err))
}
