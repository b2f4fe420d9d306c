use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use phago_exp::{
    load_plan, run_sweep, CancelToken, ConsoleProgress, FailurePolicy, NullProgress,
    ProcessRunner, ProgressSink, RunOpts, REPORT_FILE,
};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the sweep plan YAML file.
    #[arg(long)]
    pub plan: PathBuf,
    /// Stop after the first failed run instead of continuing.
    #[arg(long, default_value_t = false)]
    pub abort_on_failure: bool,
    /// Kill a simulator run that takes longer than this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<f64>,
    /// Write parameter files without launching the simulator.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Kill the running simulator on Ctrl-C instead of letting it finish.
    #[arg(long, default_value_t = false)]
    pub terminate_on_cancel: bool,
    /// Skip the plan's post-processing command.
    #[arg(long, default_value_t = false)]
    pub no_post_process: bool,
    /// Suppress per-run progress lines.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

impl RunArgs {
    fn opts(&self) -> Result<RunOpts, Box<dyn Error>> {
        let timeout = match self.timeout_secs {
            Some(secs) if !(secs.is_finite() && secs > 0.0) => {
                return Err(format!("--timeout-secs must be positive, got {secs}").into());
            }
            Some(secs) => Some(Duration::from_secs_f64(secs)),
            None => None,
        };
        Ok(RunOpts {
            failure_policy: if self.abort_on_failure {
                FailurePolicy::Abort
            } else {
                FailurePolicy::Continue
            },
            timeout,
            terminate_on_cancel: self.terminate_on_cancel,
            dry_run: self.dry_run,
            post_process: !self.no_post_process,
        })
    }
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let opts = args.opts()?;
    let plan = load_plan(&args.plan)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            return;
        }
        handler_token.cancel();
        warn!("interrupt received, stopping after the current run");
    })?;

    let mut runner = ProcessRunner::from_plan(&plan, opts.limits());
    let mut console = ConsoleProgress::stdout();
    let mut quiet = NullProgress;
    let progress: &mut dyn ProgressSink = if args.quiet {
        &mut quiet
    } else {
        &mut console
    };
    let report = run_sweep(&plan, &opts, &mut runner, progress, &cancel)?;
    info!(
        report = %plan.output_root_path().join(REPORT_FILE).display(),
        "report written"
    );

    for failure in report.failures() {
        if let Some(err) = &failure.error {
            warn!(run = failure.index, artifact = %failure.artifact, "{err}");
        }
    }
    if report.is_success() {
        Ok(())
    } else {
        Err(format!(
            "sweep {} ended {:?}: {} of {} run(s) failed, {} not dispatched",
            report.name,
            report.outcome,
            report.failed + report.cancelled,
            report.total,
            report.not_dispatched
        )
        .into())
    }
}
