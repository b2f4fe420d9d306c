#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use phago_core::errors::{ErrorInfo, SweepError};
use phago_exp::{
    Axis, CancelToken, Invocation, ProgressSink, RunExit, RunReport, RunRequest, SimRunner,
    SweepPlan, SweepReport,
};

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .canonicalize()
        .expect("workspace root")
}

pub fn fixture_path(relative: &str) -> PathBuf {
    workspace_root().join(relative)
}

/// Plan over the calibration template with the end-to-end example grid,
/// rooted in `dir`.
pub fn example_plan(dir: &Path) -> SweepPlan {
    let mut plan = SweepPlan::new(
        "example",
        fixture_path("parameters/calibration-parameters.xml"),
        "results",
        Invocation::new("java"),
    )
    .with_axis(
        Axis::new("diameter", [14]).with_suffix("diam").with_tag("dia"),
        Some("Simulation/Macrophage/diameter"),
    )
    .with_axis(
        Axis::new("mac_motility", [0, 5])
            .with_suffix("ummin-1macs")
            .with_tag("macmot"),
        Some("Simulation/Macrophage/speedM_Mean"),
    )
    .with_axis(
        Axis::new("frag_motility", [1.17])
            .with_suffix("ummin-1frags")
            .with_tag("fragmot"),
        Some("Simulation/Fragment/speedM_Mean"),
    )
    .with_axis(
        Axis::new("num_frag", [10, 20])
            .with_suffix("_frags")
            .with_tag("nfrag"),
        Some("Simulation/Fragment/numFrags"),
    )
    .with_axis(Axis::new("run", ["run1", "run2"]), None)
    .with_fixed("Simulation/endTime", 150)
    .with_fixed("Simulation/Fragment/meanderMean", -3)
    .with_fixed("Simulation/Fragment/meanderStD", 1.5);
    plan.base_dir = dir.to_path_buf();
    plan
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub index: usize,
    pub artifact: PathBuf,
    pub output_dir: PathBuf,
    pub seed: Option<u64>,
    pub artifact_existed: bool,
}

/// Test double recording every request instead of launching a process.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub calls: Vec<Call>,
    pub fail_on: Vec<usize>,
    pub cancel_after: Option<(usize, CancelToken)>,
    pub cancelled_on: Vec<usize>,
}

impl RecordingRunner {
    pub fn failing_on(indices: &[usize]) -> Self {
        Self {
            fail_on: indices.to_vec(),
            ..Self::default()
        }
    }
}

impl SimRunner for RecordingRunner {
    fn run(
        &mut self,
        request: &RunRequest<'_>,
        _cancel: &CancelToken,
    ) -> Result<RunExit, SweepError> {
        self.calls.push(Call {
            index: request.index,
            artifact: request.artifact.to_path_buf(),
            output_dir: request.output_dir.to_path_buf(),
            seed: request.seed,
            artifact_existed: request.artifact.is_file(),
        });
        if let Some((after, token)) = &self.cancel_after {
            if request.index == *after {
                token.cancel();
            }
        }
        if self.cancelled_on.contains(&request.index) {
            return Err(SweepError::Cancelled(ErrorInfo::new(
                "run_terminated",
                "stub terminated",
            )));
        }
        if self.fail_on.contains(&request.index) {
            return Err(SweepError::ExternalProcess(
                ErrorInfo::new("process_exit", "stub exited with status 3")
                    .with_context("exit_code", "3"),
            ));
        }
        Ok(RunExit {
            exit_code: Some(0),
            elapsed: Duration::from_millis(1),
        })
    }
}

/// Progress sink remembering every notification.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub started: Option<(String, usize)>,
    pub counts: Vec<(usize, usize)>,
    pub finished: bool,
}

impl ProgressSink for RecordingProgress {
    fn sweep_started(&mut self, name: &str, total: usize) {
        self.started = Some((name.to_string(), total));
    }

    fn run_finished(&mut self, count: usize, total: usize, _run: &RunReport) {
        self.counts.push((count, total));
    }

    fn sweep_finished(&mut self, _report: &SweepReport) {
        self.finished = true;
    }
}
