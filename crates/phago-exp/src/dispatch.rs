use std::fs;
use std::time::Duration;

use indexmap::IndexMap;
use phago_core::errors::{ErrorInfo, SweepError};
use phago_core::seed::derive_run_seed;
use phago_template::Template;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::grid::{expand, RunPoint};
use crate::naming::{name_runs, RunNaming};
use crate::plan::{FieldBindings, PostProcess, SweepPlan};
use crate::progress::ProgressSink;
use crate::report::{
    persist_report, PostProcessReport, RunReport, RunState, SweepOutcome, SweepReport,
};
use crate::runner::{run_to_completion, ProcessLimits, RunRequest, SimRunner};

/// What the driver does after a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next grid point.
    #[default]
    Continue,
    /// Stop dispatching after the first failure.
    Abort,
}

/// Options governing sweep execution.
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Behaviour after a failed run.
    pub failure_policy: FailurePolicy,
    /// Per-run wall-clock limit for the simulator.
    pub timeout: Option<Duration>,
    /// Kill the in-flight simulator on cancellation.
    pub terminate_on_cancel: bool,
    /// Write artifacts without invoking the simulator or post-processing.
    pub dry_run: bool,
    /// Launch the plan's post-processing command after a complete sweep.
    pub post_process: bool,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Continue,
            timeout: None,
            terminate_on_cancel: false,
            dry_run: false,
            post_process: true,
        }
    }
}

impl RunOpts {
    /// Process limits derived from these options.
    pub fn limits(&self) -> ProcessLimits {
        ProcessLimits {
            timeout: self.timeout,
            terminate_on_cancel: self.terminate_on_cancel,
            ..ProcessLimits::default()
        }
    }
}

/// One grid point with its derived names and seed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRun {
    /// Grid point.
    pub point: RunPoint,
    /// Artifact and output directory.
    pub naming: RunNaming,
    /// Seed forwarded to the simulator, if any.
    pub seed: Option<u64>,
}

impl PlannedRun {
    /// Rendered axis values keyed by axis name.
    pub fn params(&self) -> IndexMap<String, String> {
        self.point
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.render()))
            .collect()
    }
}

/// Validates `plan` and enumerates its runs without touching the disk.
pub fn plan_runs(plan: &SweepPlan) -> Result<Vec<PlannedRun>, SweepError> {
    plan.validate()?;
    enumerate(plan)
}

fn enumerate(plan: &SweepPlan) -> Result<Vec<PlannedRun>, SweepError> {
    let points = expand(&plan.axes);
    let names = name_runs(
        &plan.axes,
        &points,
        &plan.artifact_prefix,
        &plan.parameters_dir_path(),
        &plan.output_root_path(),
    )?;
    let forward_seed = plan.invocation.seed_flag.is_some();
    Ok(points
        .into_iter()
        .zip(names)
        .map(|(point, naming)| {
            let seed = plan
                .seed
                .filter(|_| forward_seed)
                .map(|master| derive_run_seed(master, point.index as u64));
            PlannedRun {
                point,
                naming,
                seed,
            }
        })
        .collect())
}

/// Result of a successful [`check_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCheck {
    /// Number of grid points.
    pub runs: usize,
    /// Root element of the template.
    pub template_root: String,
    /// SHA-256 of the template bytes.
    pub template_hash: String,
    /// Number of template fields the plan writes.
    pub fields: usize,
}

/// Validates the plan, loads the template and confirms that every field the
/// plan writes resolves to a leaf.
pub fn check_plan(plan: &SweepPlan) -> Result<PlanCheck, SweepError> {
    let bindings = plan.validate()?;
    let runs = enumerate(plan)?;
    let template = Template::load(plan.template_path())?;
    let paths = bindings
        .fixed
        .iter()
        .map(|(path, _)| path)
        .chain(bindings.mapped.iter().map(|(_, path)| path));
    for path in paths {
        template.get(path)?;
    }
    Ok(PlanCheck {
        runs: runs.len(),
        template_root: template.root_name().to_string(),
        template_hash: template.source_digest().to_string(),
        fields: bindings.fixed.len() + bindings.mapped.len(),
    })
}

/// Executes every grid point of `plan` in order and writes the sweep report
/// into the plan's output root.
///
/// Plan and template problems are returned as errors before any run is
/// dispatched. Per-run failures are recorded in the report; under
/// [`FailurePolicy::Abort`] the first one ends the sweep.
pub fn run_sweep(
    plan: &SweepPlan,
    opts: &RunOpts,
    runner: &mut dyn SimRunner,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<SweepReport, SweepError> {
    let bindings = plan.validate()?;
    let runs = enumerate(plan)?;
    let template = Template::load(plan.template_path())?;
    let total = runs.len();
    let mut report = SweepReport::new(
        &plan.name,
        total,
        opts.dry_run,
        plan.plan_hash()?,
        template.source_digest().to_string(),
        plan.seed,
    );

    info!(plan = %plan.name, runs = total, dry_run = opts.dry_run, "starting sweep");
    progress.sweep_started(&plan.name, total);
    for run in &runs {
        if cancel.is_cancelled() {
            info!(plan = %plan.name, dispatched = report.attempted, "sweep cancelled");
            report.outcome = SweepOutcome::Cancelled;
            break;
        }
        let record = execute_run(&template, &bindings, run, opts, runner, cancel);
        let state = record.state;
        let count = report.attempted + 1;
        progress.run_finished(count, total, report.record(record));
        match state {
            RunState::Cancelled => {
                report.outcome = SweepOutcome::Cancelled;
                break;
            }
            RunState::Failed if opts.failure_policy == FailurePolicy::Abort => {
                warn!(run = run.point.index, "aborting sweep after failed run");
                report.outcome = SweepOutcome::Aborted;
                break;
            }
            _ => {}
        }
    }
    progress.sweep_finished(&report);

    if let Some(post) = plan.post_process.as_ref() {
        if report.outcome != SweepOutcome::Completed || opts.dry_run || !opts.post_process {
            debug!(program = %post.program, "skipping post-processing");
        } else if cancel.is_cancelled() {
            report.outcome = SweepOutcome::Cancelled;
        } else {
            report.post_process = Some(run_post_process(plan, post, opts, cancel));
        }
    }

    info!(
        plan = %plan.name,
        outcome = ?report.outcome,
        succeeded = report.succeeded,
        failed = report.failed,
        "sweep finished"
    );
    persist_report(&report, &plan.output_root_path())?;
    Ok(report)
}

fn execute_run(
    template: &Template,
    bindings: &FieldBindings,
    run: &PlannedRun,
    opts: &RunOpts,
    runner: &mut dyn SimRunner,
    cancel: &CancelToken,
) -> RunReport {
    let mut record = RunReport {
        index: run.point.index,
        params: run.params(),
        artifact: run.naming.artifact.display().to_string(),
        output_dir: run.naming.output_dir.display().to_string(),
        seed: run.seed,
        state: RunState::Failed,
        exit_code: None,
        error: None,
    };
    match dispatch_run(template, bindings, run, opts, runner, cancel) {
        Ok(exit_code) => {
            record.state = if opts.dry_run {
                RunState::Planned
            } else {
                RunState::Succeeded
            };
            record.exit_code = exit_code;
        }
        Err(err) => {
            warn!(run = run.point.index, error = %err, "run failed");
            record.state = match err {
                SweepError::Cancelled(_) => RunState::Cancelled,
                _ => RunState::Failed,
            };
            record.exit_code = err
                .info()
                .context
                .get("exit_code")
                .and_then(|code| code.parse().ok());
            record.error = Some(err);
        }
    }
    record
}

fn dispatch_run(
    template: &Template,
    bindings: &FieldBindings,
    run: &PlannedRun,
    opts: &RunOpts,
    runner: &mut dyn SimRunner,
    cancel: &CancelToken,
) -> Result<Option<i32>, SweepError> {
    let mut document = template.clone();
    for (path, value) in &bindings.fixed {
        document.set(path, value)?;
    }
    for (axis, path) in &bindings.mapped {
        let value = run.point.values.get(axis).ok_or_else(|| {
            SweepError::InvalidPlan(
                ErrorInfo::new("field_axis", "field map names an undeclared axis")
                    .with_context("axis", axis.clone()),
            )
        })?;
        document.set(path, &value.render())?;
    }
    document.write_to(&run.naming.artifact)?;
    debug!(run = run.point.index, artifact = %run.naming.artifact.display(), "artifact written");
    if opts.dry_run {
        return Ok(None);
    }

    fs::create_dir_all(&run.naming.output_dir).map_err(|err| {
        SweepError::ArtifactWrite(
            ErrorInfo::new("output_dir", err.to_string())
                .with_context("path", run.naming.output_dir.display().to_string()),
        )
    })?;
    let request = RunRequest {
        index: run.point.index,
        artifact: &run.naming.artifact,
        output_dir: &run.naming.output_dir,
        seed: run.seed,
    };
    let exit = runner.run(&request, cancel)?;
    debug!(run = run.point.index, elapsed = ?exit.elapsed, "simulator finished");
    Ok(exit.exit_code)
}

fn run_post_process(
    plan: &SweepPlan,
    post: &PostProcess,
    opts: &RunOpts,
    cancel: &CancelToken,
) -> PostProcessReport {
    let program = plan.program_path(&post.program);
    info!(program = %program.display(), "running post-processing");
    match run_to_completion(&program, &plan.workdir_path(), &opts.limits(), cancel) {
        Ok(exit) => PostProcessReport {
            program: post.program.clone(),
            succeeded: true,
            exit_code: exit.exit_code,
            error: None,
        },
        Err(err) => {
            warn!(program = %program.display(), error = %err, "post-processing failed");
            let info = err.info().clone();
            PostProcessReport {
                program: post.program.clone(),
                succeeded: false,
                exit_code: info
                    .context
                    .get("exit_code")
                    .and_then(|code| code.parse().ok()),
                error: Some(SweepError::PostProcessing(info)),
            }
        }
    }
}
