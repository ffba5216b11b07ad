//! # Video Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom e classificazione dei fallimenti
//! - `preset`: Tabella dei preset di qualità e override
//! - `codec`: Codec supportati e costruzione degli argomenti ffmpeg
//! - `engine` / `command`: Risoluzione e invocazione di ffmpeg/ffprobe
//! - `probe`: Analisi dei video con ffprobe
//! - `selector`: Scelta automatica di codec e preset
//! - `job`: Modello del job e macchina a stati
//! - `executor`: Esecuzione dei job (processo, progresso, cancellazione)
//! - `batch`: Coordinamento di più job verso una cartella
//! - `cancel`: Gate di cancellazione condiviso
//! - `compressor`: Facciata per i chiamanti
//! - `file_manager`: Discovery dei video e naming dell'output
//! - `progress` / `json_output`: Feedback da terminale o JSON
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use video_compressor::{Compressor, Config};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let compressor = Compressor::new(Config::default())?;
//! let probe = compressor.probe(std::path::Path::new("clip.mp4")).await?;
//! let selection = compressor.select_auto(&probe);
//! println!("{} / {}", selection.codec, selection.preset);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cancel;
pub mod codec;
pub mod command;
pub mod compressor;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod file_manager;
pub mod job;
pub mod json_output;
pub mod preset;
pub mod probe;
pub mod progress;
pub mod selector;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::{BatchAbort, BatchCoordinator, BatchRun};
pub use cancel::CancellationGate;
pub use codec::Codec;
pub use compressor::{BatchHandle, Compressor};
pub use config::Config;
pub use error::{CompressError, Failure};
pub use executor::{JobExecutor, JobHandle};
pub use job::{CompressionJob, EncodingChoice, JobEvent, JobRequest, JobState};
pub use preset::{PresetName, PresetOverrides, QualityPreset};
pub use probe::VideoProbeResult;
pub use selector::{select_auto, AutoSelection};
