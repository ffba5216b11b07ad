//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'integrazione con
//! altri processi (GUI, script).
//!
//! ## Responsabilità:
//! - Emette una riga JSON per ogni evento dei job (stato, progresso, parametri)
//! - Riassume ogni job concluso e l'intero batch
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del run (input, cartella di output, configurazione)
//! - `job`: Evento di un job (`event` = state_changed, probed, parameters_resolved, progress)
//! - `job_complete`: Fine di un job con dimensioni e riduzione
//! - `complete`: Fine del run con i contatori finali
//! - `probe`: Risultato di `probe` con la selezione automatica
//! - `presets`: Tabella dei preset
//! - `error`: Errore fatale del run

use crate::batch::{BatchAbort, BatchRun};
use crate::codec::Codec;
use crate::config::Config;
use crate::error::Failure;
use crate::job::{CompressionJob, EncodingChoice, JobEvent};
use crate::preset::{PresetName, QualityPreset};
use crate::probe::VideoProbeResult;
use crate::selector::AutoSelection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del run
    Start {
        inputs: Vec<PathBuf>,
        output_dir: Option<PathBuf>,
        total_files: usize,
        config: JsonConfig,
    },

    /// Evento di un job
    Job(JobEvent),

    /// Fine di un job
    JobComplete {
        path: PathBuf,
        output: PathBuf,
        state: &'static str,
        failure: Option<Failure>,
        original_size: Option<u64>,
        compressed_size: Option<u64>,
        reduction_percent: Option<f64>,
        duration_seconds: f64,
        error: Option<String>,
    },

    /// Fine del run
    Complete {
        succeeded: usize,
        failed: usize,
        cancelled: usize,
        total_input_bytes: u64,
        total_output_bytes: u64,
        reduction_percent: f64,
        duration_seconds: f64,
        aborted: Option<BatchAbort>,
    },

    /// Risultato dell'analisi di un file
    Probe {
        path: PathBuf,
        probe: VideoProbeResult,
        selection: AutoSelection,
    },

    /// Tabella dei preset
    Presets { presets: Vec<QualityPreset> },

    /// Errore generale
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub mode: String,
    pub codec: Option<Codec>,
    pub preset: Option<PresetName>,
    pub audio_bitrate: String,
    pub max_parallel_jobs: usize,
}

impl JsonConfig {
    pub fn new(config: &Config, choice: &EncodingChoice) -> Self {
        let (mode, codec, preset) = match choice {
            EncodingChoice::Explicit { codec, preset, .. } => ("explicit", Some(*codec), Some(*preset)),
            EncodingChoice::Auto { .. } => ("auto", None, None),
        };

        Self {
            mode: mode.to_string(),
            codec,
            preset,
            audio_bitrate: config.audio_bitrate.clone(),
            max_parallel_jobs: config.max_parallel_jobs,
        }
    }
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di inizio
    pub fn start(inputs: Vec<PathBuf>, output_dir: Option<PathBuf>, config: JsonConfig) -> Self {
        Self::Start {
            total_files: inputs.len(),
            inputs,
            output_dir,
            config,
        }
    }

    /// Crea un messaggio di completamento job
    pub fn job_complete(job: &CompressionJob) -> Self {
        Self::JobComplete {
            path: job.input_path.clone(),
            output: job.output_path.clone(),
            state: job.state.label(),
            failure: job.failure(),
            original_size: job.probe.as_ref().map(|p| p.file_size_bytes),
            compressed_size: job.output_size,
            reduction_percent: job.reduction_percent(),
            duration_seconds: job.elapsed.as_secs_f64(),
            error: job.error_detail.clone(),
        }
    }

    /// Crea un messaggio di completamento generale
    pub fn complete(run: &BatchRun) -> Self {
        Self::Complete {
            succeeded: run.succeeded,
            failed: run.failed,
            cancelled: run.cancelled,
            total_input_bytes: run.input_bytes(),
            total_output_bytes: run.output_bytes(),
            reduction_percent: run.reduction_percent(),
            duration_seconds: run.total_elapsed.as_secs_f64(),
            aborted: run.aborted,
        }
    }

    /// Crea un messaggio di errore
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobRequest, JobState};

    #[test]
    fn test_job_event_is_flattened() {
        let job = CompressionJob::new(JobRequest::new("a.mp4", "b.mp4", EncodingChoice::default()));
        let json = serde_json::to_value(JsonMessage::Job(job.state_event())).unwrap();
        assert_eq!(json["type"], "job");
        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["state"], "pending");
    }

    #[test]
    fn test_job_complete_for_failure() {
        let mut job = CompressionJob::new(JobRequest::new("a.mp4", "b.mp4", EncodingChoice::default()));
        job.transition(JobState::Probing);
        job.fail(&crate::error::CompressError::EngineNotFound("ffmpeg".into()));

        let json = serde_json::to_value(JsonMessage::job_complete(&job)).unwrap();
        assert_eq!(json["type"], "job_complete");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["failure"]["kind"], "engine_not_found");
        assert!(json["reduction_percent"].is_null());
    }

    #[test]
    fn test_start_config() {
        let choice = EncodingChoice::explicit(Codec::H265, PresetName::Low);
        let msg = JsonMessage::start(vec!["a.mp4".into()], None, JsonConfig::new(&Config::default(), &choice));
        let json = serde_json::to_value(msg).unwrap();
        assert_eq!(json["total_files"], 1);
        assert_eq!(json["config"]["mode"], "explicit");
        assert_eq!(json["config"]["codec"], "h265");
    }
}
