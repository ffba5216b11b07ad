//! # Compression Job Module
//!
//! Modello dati di un singolo job di compressione e della sua macchina a stati.
//!
//! ## Stati:
//! ```text
//! Pending → Probing → Encoding → { Completed, Failed, Cancelled }
//!    └──────────┴──────────────→ { Failed, Cancelled }
//! ```
//! Gli stati finali sono irreversibili. Il progresso è monotono e limitato
//! a 100; con durata sconosciuta resta indeterminato (`None`).
//!
//! ## Eventi:
//! Ogni transizione e ogni campione di progresso produce un `JobEvent`, così
//! un layer interattivo può mostrare l'avanzamento dal vivo.

use crate::codec::Codec;
use crate::error::{CompressError, Failure};
use crate::preset::{PresetName, PresetOverrides, QualityPreset};
use crate::probe::VideoProbeResult;
use crate::selector::{SelectionHints, SelectionRule};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Probing,
    Encoding,
    Completed,
    Failed { failure: Failure },
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. } | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: &JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, Probing) => true,
            (Probing, Encoding) => true,
            (Encoding, Completed) => true,
            (Pending | Probing | Encoding, Failed { .. }) => true,
            (Pending | Probing | Encoding, Cancelled) => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Probing => "probing",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// How codec and preset are chosen for a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncodingChoice {
    Explicit {
        codec: Codec,
        preset: PresetName,
        #[serde(default)]
        overrides: PresetOverrides,
    },
    Auto {
        #[serde(default)]
        overrides: PresetOverrides,
        #[serde(default)]
        hints: SelectionHints,
    },
}

impl Default for EncodingChoice {
    fn default() -> Self {
        Self::Auto {
            overrides: PresetOverrides::default(),
            hints: SelectionHints::default(),
        }
    }
}

impl EncodingChoice {
    pub fn explicit(codec: Codec, preset: PresetName) -> Self {
        Self::Explicit {
            codec,
            preset,
            overrides: PresetOverrides::default(),
        }
    }

    pub fn overrides(&self) -> &PresetOverrides {
        match self {
            Self::Explicit { overrides, .. } | Self::Auto { overrides, .. } => overrides,
        }
    }
}

/// A unit of work submitted to the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub choice: EncodingChoice,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, choice: EncodingChoice) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            choice,
        }
    }
}

/// Event emitted while a job runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEventKind {
    StateChanged {
        #[serde(flatten)]
        state: JobState,
        input: PathBuf,
    },
    Probed {
        probe: VideoProbeResult,
    },
    ParametersResolved {
        codec: Codec,
        preset: QualityPreset,
        rule: Option<SelectionRule>,
    },
    Progress {
        /// None while the duration is unknown
        percent: Option<f64>,
        elapsed_secs: f64,
    },
}

/// Mutable state of one compression job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionJob {
    pub id: JobId,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub choice: EncodingChoice,
    /// Set once parameters are resolved
    pub codec: Option<Codec>,
    /// Set once parameters are resolved, overrides included
    pub preset: Option<QualityPreset>,
    pub selection_rule: Option<SelectionRule>,
    pub state: JobState,
    /// None while indeterminate
    pub progress_percent: Option<f64>,
    pub encoded_secs: f64,
    pub probe: Option<VideoProbeResult>,
    /// Populated only on failure
    pub error_detail: Option<String>,
    pub output_size: Option<u64>,
    pub elapsed: Duration,
}

impl CompressionJob {
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: JobId::next(),
            input_path: request.input,
            output_path: request.output,
            choice: request.choice,
            codec: None,
            preset: None,
            selection_rule: None,
            state: JobState::Pending,
            progress_percent: None,
            encoded_secs: 0.0,
            probe: None,
            error_detail: None,
            output_size: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Move to `next`; illegal transitions are refused and logged
    pub fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(&next) {
            warn!(
                "Job {} refused transition {} -> {}",
                self.id,
                self.state.label(),
                next.label()
            );
            return false;
        }

        self.state = next;
        if next == JobState::Completed {
            self.progress_percent = Some(100.0);
        }
        true
    }

    /// Record a failure and move to `Failed`
    pub fn fail(&mut self, error: &CompressError) -> bool {
        let moved = self.transition(JobState::Failed {
            failure: error.failure(),
        });
        if moved {
            self.error_detail = Some(error.to_string());
        }
        moved
    }

    /// Apply a progress sample keeping the percentage monotonic.
    ///
    /// Returns the percentage to report, or `None` if indeterminate.
    pub fn record_progress(&mut self, elapsed: Duration) -> Option<f64> {
        let elapsed_secs = elapsed.as_secs_f64();
        self.encoded_secs = self.encoded_secs.max(elapsed_secs);

        let duration = match &self.probe {
            Some(probe) if probe.has_known_duration() => probe.duration_seconds,
            _ => return None,
        };

        let sample = (100.0 * elapsed_secs / duration).clamp(0.0, 100.0);
        let percent = self.progress_percent.map_or(sample, |last| last.max(sample));
        self.progress_percent = Some(percent);
        Some(percent)
    }

    pub fn failure(&self) -> Option<Failure> {
        match self.state {
            JobState::Failed { failure } => Some(failure),
            _ => None,
        }
    }

    /// Percentage saved relative to the probed input, once completed
    pub fn reduction_percent(&self) -> Option<f64> {
        let original = self.probe.as_ref()?.file_size_bytes;
        let compressed = self.output_size?;
        Some(crate::file_manager::FileManager::calculate_reduction(original, compressed))
    }

    pub(crate) fn event(&self, kind: JobEventKind) -> JobEvent {
        JobEvent { job_id: self.id, kind }
    }

    pub(crate) fn state_event(&self) -> JobEvent {
        self.event(JobEventKind::StateChanged {
            state: self.state,
            input: self.input_path.clone(),
        })
    }
}
