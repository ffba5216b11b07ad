//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` enum per categorizzare tutti gli errori possibili
//! - Classifica i fallimenti dei job tramite `Failure` (copiabile, serializzabile)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `UnknownPreset` / `InvalidOverride` / `UnknownCodec`: errori del chiamante, nessun retry
//! - `Probe`: input non leggibile o non analizzabile da ffprobe
//! - `EngineNotFound`: ffmpeg/ffprobe mancanti, fatale per l'intero batch
//! - `EngineExecution`: l'encoder ha rifiutato i parametri (exit code != 0)
//! - `OutputMissing`: l'encoder dichiara successo ma il file di output è vuoto o assente
//! - `InvalidRequest`: job non eseguibile così com'è (es. output uguale all'input)
//! - `Io` / `Config` / `Join`: errori di ambiente o di runtime
//!
//! ## Esempio:
//! ```rust
//! use video_compressor::error::{CompressError, Failure};
//!
//! let err = CompressError::EngineNotFound("ffmpeg".to_string());
//! assert_eq!(err.failure(), Failure::EngineNotFound);
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why the probe step rejected an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    NotFound,
    Unreadable,
    Unparseable,
    Timeout,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NotFound => "file not found",
            Self::Unreadable => "file not readable",
            Self::Unparseable => "not a parseable media container",
            Self::Timeout => "probe timed out",
        };
        f.write_str(text)
    }
}

/// Custom error types for video compression
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("Unknown quality preset '{0}' (expected one of: ultra_low, low, medium, high, lossless)")]
    UnknownPreset(String),

    #[error("Invalid preset override: {0}")]
    InvalidOverride(String),

    #[error("Unknown codec '{0}' (expected one of: h264, h265, vp9)")]
    UnknownCodec(String),

    #[error("Probe failed for {path}: {reason}{}", detail_suffix(.detail))]
    Probe {
        path: PathBuf,
        reason: ProbeFailure,
        detail: String,
    },

    #[error("Encoding engine not found: {0}")]
    EngineNotFound(String),

    #[error("Encoder exited with {}: {stderr}", exit_label(.exit_code))]
    EngineExecution {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Encoder reported success but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid job request: {0}")]
    InvalidRequest(String),

    #[error("Job task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({})", detail)
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

/// Result alias used by the library modules
pub type Result<T> = std::result::Result<T, CompressError>;

/// Failure classification recorded on a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    InvalidRequest,
    Probe { reason: ProbeFailure },
    EngineNotFound,
    EngineExecution { exit_code: Option<i32> },
    OutputMissing,
    Io,
    Internal,
}

impl CompressError {
    pub(crate) fn probe(path: impl Into<PathBuf>, reason: ProbeFailure, detail: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            reason,
            detail: detail.into(),
        }
    }

    /// Classify the error for job bookkeeping
    pub fn failure(&self) -> Failure {
        match self {
            Self::UnknownPreset(_)
            | Self::InvalidOverride(_)
            | Self::UnknownCodec(_)
            | Self::InvalidRequest(_)
            | Self::Config(_) => Failure::InvalidRequest,
            Self::Probe { reason, .. } => Failure::Probe { reason: *reason },
            Self::EngineNotFound(_) => Failure::EngineNotFound,
            Self::EngineExecution { exit_code, .. } => Failure::EngineExecution {
                exit_code: *exit_code,
            },
            Self::OutputMissing(_) => Failure::OutputMissing,
            Self::Io(_) => Failure::Io,
            Self::Join(_) => Failure::Internal,
        }
    }
}

impl Failure {
    /// Whether every following job of a run would fail the same way
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::EngineNotFound)
    }
}
