#![deny(missing_docs)]
#![doc = "Sweep orchestration for the phagocyte/fragment motility simulator: grid expansion, run naming, plan loading and the sequential sweep driver."]

/// Cooperative cancellation shared with signal handlers.
pub mod cancel;
/// Sweep driver and run options.
pub mod dispatch;
/// Cartesian grid axes and expansion.
pub mod grid;
/// Canonical hashing helpers.
pub mod hash;
/// Artifact and output directory naming.
pub mod naming;
/// Sweep plan schema, validation and loading.
pub mod plan;
/// Progress notification sinks.
pub mod progress;
/// Sweep reports and their on-disk form.
pub mod report;
/// Simulator process runner.
pub mod runner;
/// Canonical JSON and YAML serde helpers.
pub mod serde;
/// Scalar values written into templates.
pub mod value;

pub use cancel::CancelToken;
pub use dispatch::{check_plan, plan_runs, run_sweep, FailurePolicy, PlanCheck, PlannedRun, RunOpts};
pub use grid::{cardinality, expand, Axis, RunPoint};
pub use hash::stable_hash_string;
pub use naming::{name_run, name_runs, RunNaming};
pub use plan::{load_plan, FieldBindings, Invocation, PostProcess, SweepPlan};
pub use progress::{ConsoleProgress, NullProgress, ProgressSink};
pub use report::{
    load_report, persist_report, PostProcessReport, RunReport, RunState, SweepOutcome,
    SweepReport, MANIFEST_FILE, REPORT_FILE,
};
pub use runner::{ProcessLimits, ProcessRunner, RunExit, RunRequest, SimRunner};
pub use serde::{from_json_slice, to_canonical_json_bytes};
pub use value::AxisValue;
