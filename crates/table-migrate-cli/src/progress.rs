//! Terminal progress bar for interactive runs.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use table_migrate::{MigrationOutcome, ProgressReporter};

const BAR_TEMPLATE: &str =
    "{prefix:>20.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} rows ({per_sec}, eta {eta})";
const SPINNER_TEMPLATE: &str = "{prefix:>20.bold} [{elapsed_precise}] {spinner} {pos} rows ({per_sec})";

/// One bar per table, drawn on stderr. Tables run sequentially so a single
/// slot is enough.
#[derive(Default)]
pub struct BarReporter {
    current: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_bar(table: &str, total: Option<u64>) -> ProgressBar {
        let (bar, template) = match total {
            Some(total) => (ProgressBar::new(total), BAR_TEMPLATE),
            None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        // Templates are constants; a parse failure just keeps the default style.
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(table.to_string());
        if total.is_none() {
            bar.enable_steady_tick(Duration::from_millis(120));
        }
        bar
    }
}

impl ProgressReporter for BarReporter {
    fn on_table_start(&self, table: &str, total: Option<u64>) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(old) = current.replace(Self::new_bar(table, total)) {
                old.abandon();
            }
        }
    }

    fn on_chunk_progress(&self, _table: &str, rows_so_far: u64, total: Option<u64>) {
        if let Ok(current) = self.current.lock() {
            if let Some(bar) = current.as_ref() {
                // The estimate can be stale; grow the bar instead of overflowing it.
                if let Some(total) = total {
                    if rows_so_far > total {
                        bar.set_length(rows_so_far);
                    }
                }
                bar.set_position(rows_so_far);
            }
        }
    }

    fn on_table_outcome(&self, outcome: &MigrationOutcome) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        match current.take() {
            Some(bar) if outcome.is_success() => bar.finish_with_message("done"),
            Some(bar) => bar.abandon_with_message(outcome.status.to_string()),
            None => {}
        }
    }
}
