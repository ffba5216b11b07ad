//! # Progress Reporting Module
//!
//! Questo modulo trasforma gli eventi dei job in feedback visivo da terminale.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Modalità job singolo: la barra segue la percentuale di encoding
//! - Modalità batch: la barra conta i job conclusi, il messaggio mostra il job corrente
//! - Spinner per operazioni indeterminate (probe, durata sconosciuta)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================>---------------] 3/5 (60%) 🎞️ #4 holiday.mp4: 42.0%
//! ```

use crate::job::{JobEvent, JobEventKind, JobState};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Position is the encoding percentage of one job
    SingleJob,
    /// Position is the number of finished jobs
    Batch,
}

/// Renders job events on a progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
    mode: Mode,
}

impl ProgressManager {
    /// Bar for a single job, 0-100
    pub fn for_job() -> Self {
        Self::with_template(100, Mode::SingleJob, "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
    }

    /// Bar for a batch of `total_jobs`
    pub fn for_batch(total_jobs: u64) -> Self {
        Self::with_template(
            total_jobs,
            Mode::Batch,
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
    }

    fn with_template(len: u64, mode: Mode, template: &str) -> Self {
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar, mode }
    }

    /// Update the bar from one job event
    pub fn handle_event(&self, event: &JobEvent) {
        let id = event.job_id;

        match &event.kind {
            JobEventKind::StateChanged { state, input } => {
                let name = display_name(input);
                match state {
                    JobState::Pending => {}
                    JobState::Probing => self.set_message(&format!("🔍 {} {}: probing", id, name)),
                    JobState::Encoding => self.set_message(&format!("🎞️ {} {}: encoding", id, name)),
                    JobState::Completed => self.job_finished(&format!("✅ {} {}", id, name)),
                    JobState::Failed { .. } => self.job_finished(&format!("❌ {} {}", id, name)),
                    JobState::Cancelled => self.job_finished(&format!("⏹️ {} {}", id, name)),
                }
            }
            JobEventKind::ParametersResolved { codec, preset, .. } => {
                self.set_message(&format!("⚙️ {} {} / {} (crf {})", id, codec, preset.name, preset.crf));
            }
            JobEventKind::Progress { percent, elapsed_secs } => match percent {
                Some(percent) => {
                    if self.mode == Mode::SingleJob {
                        self.bar.set_position(percent.round() as u64);
                    }
                    self.set_message(&format!("🎞️ {}: {:.1}%", id, percent));
                }
                None => self.set_message(&format!("🎞️ {}: {:.1}s encoded", id, elapsed_secs)),
            },
            JobEventKind::Probed { .. } => {}
        }
    }

    fn job_finished(&self, message: &str) {
        match self.mode {
            Mode::SingleJob => self.bar.set_position(self.bar.length().unwrap_or(100)),
            Mode::Batch => self.bar.inc(1),
        }
        self.set_message(message);
    }

    /// Set a custom message without moving the bar
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
