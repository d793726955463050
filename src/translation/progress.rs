/*!
 * Per-file progress reporting.
 *
 * Keeps a running average of cue round-trip times to estimate the remaining
 * time and renders it through an `indicatif` progress bar.
 */

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

/// Render milliseconds as `HH:MM:SS`, truncating sub-second parts
pub fn format_ms(milliseconds: u64) -> String {
    let seconds = milliseconds / 1000;
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Running average of round-trip times
#[derive(Debug, Clone, Default)]
pub struct EtaTracker {
    total_ms: u64,
    samples: u64,
}

impl EtaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the round trip of one cue (latency plus delay)
    pub fn record(&mut self, round_trip_ms: u64) {
        self.total_ms += round_trip_ms;
        self.samples += 1;
    }

    /// Average round trip, `None` before the first sample
    pub fn average_ms(&self) -> Option<u64> {
        if self.samples == 0 {
            None
        } else {
            Some(self.total_ms / self.samples)
        }
    }

    /// Estimated time for the remaining cues
    pub fn eta_ms(&self, remaining: usize) -> Option<u64> {
        self.average_ms().map(|average| average * remaining as u64)
    }

    /// ETA formatted for display, `?` before the first sample
    pub fn eta_text(&self, remaining: usize) -> String {
        self.eta_ms(remaining)
            .map(format_ms)
            .unwrap_or_else(|| "?".to_string())
    }
}

/// Progress bar for the cues of one file
pub struct FileProgress {
    bar: ProgressBar,
    total: usize,
    eta: EtaTracker,
}

impl FileProgress {
    /// Visible progress bar on stderr
    pub fn new(total: usize, file_name: &str) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("█▓▒░"));
        bar.set_message(file_name.to_string());

        Self::with_bar(bar, total)
    }

    /// Progress tracking without any terminal output
    pub fn hidden(total: usize) -> Self {
        Self::with_bar(ProgressBar::hidden(), total)
    }

    fn with_bar(bar: ProgressBar, total: usize) -> Self {
        Self {
            bar,
            total,
            eta: EtaTracker::new(),
        }
    }

    /// Report a finished cue.
    ///
    /// # Arguments
    /// * `position` - 1-based position of the cue just finished
    /// * `round_trip_ms` - Latency plus delay for that cue
    /// * `session_tokens` - Tokens used by the current session
    /// * `file_tokens` - Tokens used by the whole file so far
    pub fn cue_done(&mut self, position: usize, round_trip_ms: u64, session_tokens: u64, file_tokens: u64) {
        self.eta.record(round_trip_ms);

        let remaining = self.total.saturating_sub(position);
        let eta = self.eta.eta_text(remaining);
        let percent = if self.total == 0 { 100.0 } else { position as f64 * 100.0 / self.total as f64 };

        self.bar.set_position(position as u64);
        self.bar.set_message(format!("ETA: {} tokens: {}|{}", eta, session_tokens, file_tokens));
        debug!(
            "Cue {}/{} ({:.1}%) ETA {} tokens {}|{}",
            position, self.total, percent, eta, session_tokens, file_tokens
        );
    }

    pub fn eta(&self) -> &EtaTracker {
        &self.eta
    }

    pub fn finish(&self, file_tokens: u64) {
        let finished = chrono::Local::now().format("%Y.%m.%d %H:%M:%S");
        self.bar.finish_with_message(format!("Finished: {} tokens: {}", finished, file_tokens));
    }

    pub fn abandon(&self, reason: &str) {
        self.bar.abandon_with_message(format!("Failed: {}", reason));
    }
}
