use indicatif::{ProgressBar, ProgressStyle};

/// Progress reporting for long-running loops (paging, multi-series jobs).
///
/// Implementations must be shareable across concurrent page fetches, so all
/// methods take `&self`.
pub trait Progress: Send + Sync {
    /// Called once the total number of units is known.
    fn begin(&self, _total: u64, _label: &str) {}

    /// Called when `n` more units completed.
    fn advance(&self, _n: u64) {}

    /// Called at the end, successful or not.
    fn finish(&self) {}
}

/// A no-op progress sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {}

/// Terminal progress bar on stderr.
#[derive(Debug, Clone)]
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{msg:>24} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for ConsoleProgress {
    fn begin(&self, total: u64, label: &str) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_message(label.to_string());
    }

    fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
