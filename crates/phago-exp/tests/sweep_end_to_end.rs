mod common;

use std::fs;
use std::path::Path;

use phago_core::derive_run_seed;
use phago_core::errors::SweepError;
use phago_exp::{
    load_report, run_sweep, Axis, CancelToken, FailurePolicy, RunOpts, RunState, SweepOutcome,
    MANIFEST_FILE, REPORT_FILE,
};
use phago_template::{FieldPath, Template};

use common::{example_plan, RecordingProgress, RecordingRunner};

fn field(template: &Template, path: &str) -> String {
    template
        .get(&FieldPath::parse(path).expect("parse path"))
        .expect("read field")
}

#[test]
fn example_grid_dispatches_eight_runs() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let mut runner = RecordingRunner::default();
    let mut progress = RecordingProgress::default();

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut progress,
        &CancelToken::new(),
    )
    .expect("sweep");

    assert_eq!(report.outcome, SweepOutcome::Completed);
    assert_eq!(report.total, 8);
    assert_eq!(report.attempted, 8);
    assert_eq!(report.succeeded, 8);
    assert_eq!(report.not_dispatched, 0);
    assert!(report.is_success());

    assert_eq!(progress.started, Some(("example".to_string(), 8)));
    let counts: Vec<usize> = progress.counts.iter().map(|(count, _)| *count).collect();
    assert_eq!(counts, (1..=8).collect::<Vec<_>>());
    assert!(progress.counts.iter().all(|(_, total)| *total == 8));
    assert!(progress.finished);

    assert_eq!(runner.calls.len(), 8);
    assert!(runner.calls.iter().all(|call| call.artifact_existed));
    assert!(runner.calls.iter().all(|call| call.output_dir.is_dir()));

    let artifacts: Vec<_> = fs::read_dir(temp.path().join("parameters"))
        .expect("read parameters dir")
        .collect();
    assert_eq!(artifacts.len(), 8);

    let first = &runner.calls[0];
    assert_eq!(
        first.artifact,
        temp.path()
            .join("parameters/abm_dia-14-macmot-0-fragmot-1.17-nfrag-10-run-run1.xml")
    );
    assert_eq!(
        first.output_dir,
        temp.path()
            .join("results/14diam/0ummin-1macs/1.17ummin-1frags/10_frags/run1")
    );
    let last = &runner.calls[7];
    assert_eq!(
        last.output_dir,
        temp.path()
            .join("results/14diam/5ummin-1macs/1.17ummin-1frags/20_frags/run2")
    );
}

#[test]
fn artifacts_carry_the_point_values() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let mut runner = RecordingRunner::default();
    run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    // index 6: mac_motility 5, num_frag 20, run1
    let call = &runner.calls[6];
    let artifact = Template::load(&call.artifact).expect("load artifact");
    assert_eq!(field(&artifact, "Simulation/Macrophage/speedM_Mean"), "5");
    assert_eq!(field(&artifact, "Simulation/Macrophage/diameter"), "14");
    assert_eq!(field(&artifact, "Simulation/Fragment/speedM_Mean"), "1.17");
    assert_eq!(field(&artifact, "Simulation/Fragment/numFrags"), "20");
    assert_eq!(field(&artifact, "Simulation/Fragment/meanderStD"), "1.5");
    assert_eq!(field(&artifact, "Simulation/endTime"), "150");
    assert_eq!(field(&artifact, "Simulation/Macrophage/numMacs"), "18");
}

#[test]
fn rerunning_reproduces_identical_artifacts() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());

    let mut first = RecordingRunner::default();
    run_sweep(
        &plan,
        &RunOpts::default(),
        &mut first,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("first sweep");
    let before: Vec<Vec<u8>> = first
        .calls
        .iter()
        .map(|call| fs::read(&call.artifact).expect("read artifact"))
        .collect();

    let mut second = RecordingRunner::default();
    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut second,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("second sweep");
    assert_eq!(report.attempted, 8);
    let after: Vec<Vec<u8>> = second
        .calls
        .iter()
        .map(|call| fs::read(&call.artifact).expect("read artifact"))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn missing_field_fails_each_point_once() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let mut plan = example_plan(temp.path());
    plan.fields.insert(
        "num_frag".to_string(),
        "Simulation/Fragment/numFragments".to_string(),
    );
    let mut runner = RecordingRunner::default();
    let mut progress = RecordingProgress::default();

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut progress,
        &CancelToken::new(),
    )
    .expect("sweep");

    assert!(runner.calls.is_empty());
    assert_eq!(report.attempted, 8);
    assert_eq!(report.failed, 8);
    assert_eq!(progress.counts.len(), 8);
    for run in &report.runs {
        assert_eq!(run.state, RunState::Failed);
        match run.error.as_ref().expect("error recorded") {
            SweepError::MissingField(info) => {
                assert_eq!(info.code, "field_not_found");
                assert_eq!(info.context["path"], "Simulation/Fragment/numFragments");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
    assert!(!temp.path().join("parameters").exists());
}

#[test]
fn a_failed_run_leaves_its_neighbours_alone() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let mut runner = RecordingRunner::failing_on(&[3]);

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    assert_eq!(report.outcome, SweepOutcome::Completed);
    assert_eq!(report.attempted, 8);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 7);
    assert!(!report.is_success());
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 3);
    assert_eq!(failed[0].exit_code, Some(3));
    assert_eq!(report.runs[2].state, RunState::Succeeded);
    assert_eq!(report.runs[4].state, RunState::Succeeded);
}

#[test]
fn abort_policy_stops_after_first_failure() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let mut runner = RecordingRunner::failing_on(&[1, 5]);
    let opts = RunOpts {
        failure_policy: FailurePolicy::Abort,
        ..RunOpts::default()
    };

    let report = run_sweep(
        &plan,
        &opts,
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    assert_eq!(report.outcome, SweepOutcome::Aborted);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.not_dispatched, 6);
    assert_eq!(runner.calls.len(), 2);
}

#[test]
fn cancellation_is_honoured_at_run_boundaries() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let cancel = CancelToken::new();
    let mut runner = RecordingRunner {
        cancel_after: Some((2, cancel.clone())),
        ..RecordingRunner::default()
    };

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &cancel,
    )
    .expect("sweep");

    assert_eq!(report.outcome, SweepOutcome::Cancelled);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.not_dispatched, 5);
}

#[test]
fn terminated_run_is_recorded_as_cancelled() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let mut runner = RecordingRunner {
        cancelled_on: vec![1],
        ..RecordingRunner::default()
    };

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    assert_eq!(report.outcome, SweepOutcome::Cancelled);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.runs[1].state, RunState::Cancelled);
}

#[test]
fn pre_cancelled_sweep_dispatches_nothing() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut runner = RecordingRunner::default();

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &cancel,
    )
    .expect("sweep");

    assert_eq!(report.outcome, SweepOutcome::Cancelled);
    assert_eq!(report.attempted, 0);
    assert_eq!(report.not_dispatched, 8);
    assert!(runner.calls.is_empty());
}

#[test]
fn dry_run_writes_artifacts_only() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let mut runner = RecordingRunner::default();
    let opts = RunOpts {
        dry_run: true,
        ..RunOpts::default()
    };

    let report = run_sweep(
        &plan,
        &opts,
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    assert!(runner.calls.is_empty());
    assert!(report.dry_run);
    assert_eq!(report.succeeded, 8);
    for run in &report.runs {
        assert_eq!(run.state, RunState::Planned);
        assert!(Path::new(&run.artifact).is_file());
        assert!(!Path::new(&run.output_dir).exists());
    }
}

#[test]
fn empty_axis_yields_zero_runs() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let mut plan = example_plan(temp.path());
    plan.axes[3] = Axis::new("num_frag", Vec::<i64>::new()).with_suffix("_frags");
    let mut runner = RecordingRunner::default();

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    assert_eq!(report.total, 0);
    assert_eq!(report.attempted, 0);
    assert_eq!(report.outcome, SweepOutcome::Completed);
    assert!(runner.calls.is_empty());
}

#[test]
fn unreadable_template_is_fatal() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let mut plan = example_plan(temp.path());
    plan.template = temp.path().join("missing.xml");
    let mut runner = RecordingRunner::default();

    let err = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .unwrap_err();

    assert!(matches!(err, SweepError::TemplateLoad(_)));
    assert!(runner.calls.is_empty());
}

#[test]
fn seeds_are_forwarded_when_requested() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let mut plan = example_plan(temp.path());
    plan.seed = Some(7);
    plan.invocation.seed_flag = Some("-s".to_string());
    let mut runner = RecordingRunner::default();

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    for (idx, call) in runner.calls.iter().enumerate() {
        assert_eq!(call.seed, Some(derive_run_seed(7, idx as u64)));
    }
    assert_eq!(report.provenance.master_seed, Some(7));

    plan.invocation.seed_flag = None;
    let mut unseeded = RecordingRunner::default();
    run_sweep(
        &plan,
        &RunOpts::default(),
        &mut unseeded,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");
    assert!(unseeded.calls.iter().all(|call| call.seed.is_none()));
}

#[test]
fn report_and_manifest_are_persisted() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    let mut runner = RecordingRunner::failing_on(&[0]);

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut RecordingProgress::default(),
        &CancelToken::new(),
    )
    .expect("sweep");

    let results = temp.path().join("results");
    let loaded = load_report(&results.join(REPORT_FILE)).expect("load report");
    assert_eq!(loaded.runs, report.runs);
    assert_eq!(loaded.provenance.plan_hash, plan.plan_hash().expect("plan hash"));
    assert_eq!(loaded.provenance.template_hash.len(), 64);

    let mut manifest = csv::Reader::from_path(results.join(MANIFEST_FILE)).expect("open csv");
    let header = manifest.headers().expect("header").clone();
    assert_eq!(
        header.iter().collect::<Vec<_>>(),
        vec![
            "index",
            "diameter",
            "mac_motility",
            "frag_motility",
            "num_frag",
            "run",
            "artifact",
            "output_dir",
            "seed",
            "state",
            "error"
        ]
    );
    let rows: Vec<csv::StringRecord> = manifest
        .records()
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(rows.len(), 8);
    assert_eq!(&rows[0][3], "1.17");
    assert_eq!(&rows[0][9], "failed");
    assert_eq!(&rows[0][10], "process_exit");
    assert_eq!(&rows[1][9], "succeeded");
}

#[test]
fn unwritable_parameters_dir_fails_every_run_without_launching() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = example_plan(temp.path());
    fs::write(temp.path().join("parameters"), "").expect("block parameters dir");
    let mut runner = RecordingRunner::default();
    let mut progress = RecordingProgress::default();

    let report = run_sweep(
        &plan,
        &RunOpts::default(),
        &mut runner,
        &mut progress,
        &CancelToken::new(),
    )
    .expect("sweep");

    assert_eq!(report.outcome, SweepOutcome::Completed);
    assert_eq!(report.attempted, 8);
    assert_eq!(report.failed, 8);
    assert!(!report.is_success());
    assert!(runner.calls.is_empty());
    for run in &report.runs {
        assert_eq!(run.state, RunState::Failed);
        assert!(
            matches!(run.error, Some(SweepError::ArtifactWrite(_))),
            "{:?}",
            run.error
        );
    }
    assert_eq!(progress.counts.len(), 8);
}
