//! Terminal output for genprobe: spinner and coloured results.
//!
//! Uses `indicatif` for the progress spinner and `console` for colours.
//! [`BatchProgress`] follows a batch run one job attempt at a time.

use std::collections::BTreeMap;
use std::path::Path;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::BatchSummary;
use crate::orchestrator::AttemptReport;

/// Terminal progress for a batch run.
///
/// Shows a bar with one tick per job attempt, and colored lines for
/// delivered (green), failed (red) and aborted (yellow) attempts.
pub struct BatchProgress {
    // Progress bar from indicatif; hidden under `--log-json`.
    pb: ProgressBar,
    // Green style for delivered attempts.
    green: Style,
    // Red style for failed attempts.
    red: Style,
    // Yellow style for attempts whose outcome could not be logged.
    yellow: Style,
}

impl BatchProgress {
    /// Starts the spinner for a batch of `total` job attempts.
    pub fn start(total: u64) -> Self {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self::with_bar(pb)
    }

    /// Draws nothing. Used by tests and `--log-json` runs.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn attempt(&self, endpoint: &str, call: u32, calls: u32) {
        self.pb.set_message(format!("{endpoint} (call {call}/{calls})"));
    }

    pub fn finished(&self, report: &AttemptReport) {
        let record = &report.record;
        let mark = if report.termination.is_success() {
            self.green.apply_to("✓")
        } else {
            self.red.apply_to("✗")
        };
        self.pb.println(format!(
            "  {mark} #{} {} → {}",
            record.serial_number, record.endpoint, record.status
        ));
        self.pb.inc(1);
    }

    pub fn aborted(&self, endpoint: &str, reason: &str) {
        self.pb.println(format!(
            "  {} {endpoint}: {reason}",
            self.yellow.apply_to("!")
        ));
        self.pb.inc(1);
    }

    pub fn complete(&self, summary: &BatchSummary) {
        self.pb.finish_and_clear();
        println!();
        println!(
            "{} {} attempts in {}s: {} succeeded, {} failed, {} aborted",
            self.green.apply_to("Batch complete:"),
            summary.attempts,
            summary.duration_secs(),
            self.green.apply_to(summary.succeeded),
            self.red.apply_to(summary.failed),
            self.yellow.apply_to(summary.errors),
        );
    }
}

/// Prints the per-status counts of an outcome log.
pub fn print_report(path: &Path, tally: &BTreeMap<String, usize>) {
    let green = Style::new().green().bold();
    let red = Style::new().red();
    let total: usize = tally.values().sum();

    println!("{}", Style::new().bold().apply_to(format!("─── {} ───", path.display())));
    if total == 0 {
        println!("  no outcomes recorded");
        return;
    }
    for (status, count) in tally {
        let style = if status == "success" { &green } else { &red };
        println!("  {:>6}  {}", count, style.apply_to(status));
    }
    println!("  {total:>6}  total");
}
