use std::io::{self, Write};

use crate::report::{RunReport, RunState, SweepReport};

/// Receives progress notifications from the sweep driver.
pub trait ProgressSink {
    /// Called once before the first run with the number of grid points.
    fn sweep_started(&mut self, _name: &str, _total: usize) {}

    /// Called after each run with the dispatch count so far.
    fn run_finished(&mut self, count: usize, total: usize, run: &RunReport);

    /// Called once after the sweep, before post-processing output is logged.
    fn sweep_finished(&mut self, _report: &SweepReport) {}
}

/// Discards all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn run_finished(&mut self, _count: usize, _total: usize, _run: &RunReport) {}
}

/// Writes `N out of M` lines, plus a final tally, to a text stream.
#[derive(Debug)]
pub struct ConsoleProgress<W: Write> {
    out: W,
    show_total: bool,
}

impl ConsoleProgress<io::Stdout> {
    /// Progress on standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleProgress<W> {
    /// Progress written to `out`, including the expected total.
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_total: true,
        }
    }

    /// Toggles the `out of M` part of each line.
    pub fn with_total(mut self, show_total: bool) -> Self {
        self.show_total = show_total;
        self
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn run_finished(&mut self, count: usize, total: usize, run: &RunReport) {
        let mut line = if self.show_total {
            format!("{count} out of {total}")
        } else {
            count.to_string()
        };
        if run.state != RunState::Succeeded {
            line.push_str(&format!(" ({})", run.state.as_str()));
        }
        // best effort
        let _ = writeln!(self.out, "{line}");
    }

    fn sweep_finished(&mut self, report: &SweepReport) {
        let _ = writeln!(
            self.out,
            "{}: {} run(s), {} succeeded, {} failed",
            report.name, report.attempted, report.succeeded, report.failed
        );
        let _ = self.out.flush();
    }
}
