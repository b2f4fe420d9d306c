use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use phago_core::errors::{ErrorInfo, SweepError};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::plan::{Invocation, SweepPlan};

/// Inputs for one simulator invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// Position of the run in the grid.
    pub index: usize,
    /// Parameter file written for the run.
    pub artifact: &'a Path,
    /// Output directory for the simulator.
    pub output_dir: &'a Path,
    /// Seed to forward, if the plan requests one.
    pub seed: Option<u64>,
}

/// Successful completion of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunExit {
    /// Exit code reported by the process.
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Executes one run synchronously.
///
/// Implementations return `Ok` only for a clean exit. Launch failures,
/// nonzero exits and timeouts are [`SweepError::ExternalProcess`]; a run
/// stopped because of cancellation is [`SweepError::Cancelled`].
pub trait SimRunner {
    /// Runs the simulator for `request`, blocking until it finishes.
    fn run(&mut self, request: &RunRequest<'_>, cancel: &CancelToken)
        -> Result<RunExit, SweepError>;
}

/// Limits applied to a launched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    /// Kill the process after this long.
    pub timeout: Option<Duration>,
    /// Kill the in-flight process when cancellation is requested instead of
    /// waiting for it to exit.
    pub terminate_on_cancel: bool,
    /// Interval between exit checks.
    pub poll_interval: Duration,
}

impl Default for ProcessLimits {
    fn default() -> Self {
        Self {
            timeout: None,
            terminate_on_cancel: false,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Launches the simulator as a child process, inheriting stdio.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    invocation: Invocation,
    workdir: PathBuf,
    limits: ProcessLimits,
}

impl ProcessRunner {
    /// Builds a runner for the plan's invocation.
    pub fn from_plan(plan: &SweepPlan, limits: ProcessLimits) -> Self {
        Self {
            program: plan.program_path(&plan.invocation.program),
            invocation: plan.invocation.clone(),
            workdir: plan.workdir_path(),
            limits,
        }
    }

    /// Full argument list for `request`, excluding the program.
    pub fn arguments(&self, request: &RunRequest<'_>) -> Vec<String> {
        let mut args = self.invocation.args.clone();
        args.push(self.invocation.config_flag.clone());
        args.push(request.artifact.display().to_string());
        args.push(self.invocation.output_flag.clone());
        args.push(request.output_dir.display().to_string());
        if let (Some(flag), Some(seed)) = (&self.invocation.seed_flag, request.seed) {
            args.push(flag.clone());
            args.push(seed.to_string());
        }
        args
    }
}

impl SimRunner for ProcessRunner {
    fn run(
        &mut self,
        request: &RunRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<RunExit, SweepError> {
        let args = self.arguments(request);
        debug!(run = request.index, program = %self.program.display(), ?args, "launching simulator");
        let mut command = Command::new(&self.program);
        command.args(&args);
        if !self.workdir.as_os_str().is_empty() {
            command.current_dir(&self.workdir);
        }
        detach_from_terminal_signals(&mut command);
        let child = command.spawn().map_err(|err| {
            SweepError::ExternalProcess(
                ErrorInfo::new("process_spawn", err.to_string())
                    .with_context("program", self.program.display().to_string())
                    .with_context("run", request.index.to_string()),
            )
        })?;
        let (status, elapsed) =
            supervise(child, &self.program, Some(request.index), &self.limits, cancel)?;
        exit_result(&self.program, Some(request.index), status, elapsed)
    }
}

/// Runs a command to completion under `limits`, returning its status.
pub(crate) fn run_to_completion(
    program: &Path,
    workdir: &Path,
    limits: &ProcessLimits,
    cancel: &CancelToken,
) -> Result<RunExit, SweepError> {
    let mut command = Command::new(program);
    if !workdir.as_os_str().is_empty() {
        command.current_dir(workdir);
    }
    detach_from_terminal_signals(&mut command);
    let child = command.spawn().map_err(|err| {
        SweepError::ExternalProcess(
            ErrorInfo::new("process_spawn", err.to_string())
                .with_context("program", program.display().to_string()),
        )
    })?;
    let (status, elapsed) = supervise(child, program, None, limits, cancel)?;
    exit_result(program, None, status, elapsed)
}

/// Starts the child in its own process group so a terminal interrupt reaches
/// only the driver, which then decides whether to stop the child.
fn detach_from_terminal_signals(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = command;
}

fn supervise(
    mut child: Child,
    program: &Path,
    run: Option<usize>,
    limits: &ProcessLimits,
    cancel: &CancelToken,
) -> Result<(ExitStatus, Duration), SweepError> {
    let started = Instant::now();
    let wait_error = |err: std::io::Error| {
        SweepError::ExternalProcess(
            ErrorInfo::new("process_wait", err.to_string())
                .with_context("program", program.display().to_string()),
        )
    };
    loop {
        if let Some(status) = child.try_wait().map_err(wait_error)? {
            return Ok((status, started.elapsed()));
        }
        if let Some(timeout) = limits.timeout {
            if started.elapsed() >= timeout {
                warn!(?run, ?timeout, "simulator timed out, terminating");
                stop(&mut child);
                return Err(SweepError::ExternalProcess(
                    ErrorInfo::new("process_timeout", "simulator exceeded the run timeout")
                        .with_context("program", program.display().to_string())
                        .with_context("timeout_secs", timeout.as_secs_f64().to_string()),
                ));
            }
        }
        if limits.terminate_on_cancel && cancel.is_cancelled() {
            warn!(?run, "cancellation requested, terminating simulator");
            stop(&mut child);
            return Err(SweepError::Cancelled(
                ErrorInfo::new("run_terminated", "simulator terminated on cancellation")
                    .with_context("program", program.display().to_string()),
            ));
        }
        thread::sleep(limits.poll_interval);
    }
}

fn stop(child: &mut Child) {
    // the process may already have exited between the poll and the kill
    let _ = child.kill();
    let _ = child.wait();
}

fn exit_result(
    program: &Path,
    run: Option<usize>,
    status: ExitStatus,
    elapsed: Duration,
) -> Result<RunExit, SweepError> {
    if status.success() {
        return Ok(RunExit {
            exit_code: status.code(),
            elapsed,
        });
    }
    let mut info = ErrorInfo::new("process_exit", format!("simulator exited with {status}"))
        .with_context("program", program.display().to_string());
    if let Some(run) = run {
        info = info.with_context("run", run.to_string());
    }
    if let Some(code) = status.code() {
        info = info.with_context("exit_code", code.to_string());
    }
    Err(SweepError::ExternalProcess(info))
}
