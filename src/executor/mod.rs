//! # Executor Module
//!
//! Esecuzione dei job di compressione, separata in sottomoduli:
//! - `job_executor`: macchina a stati del job, slot di concorrenza, handle
//! - `process`: processo ffmpeg, reader di stdout/stderr, terminazione
//! - `progress_parser`: parsing puro delle righe di progresso
//! - `output_guard`: rimozione dell'output parziale

pub mod job_executor;
pub mod process;
pub mod progress_parser;
mod output_guard;

pub use job_executor::{EventSink, JobExecutor, JobHandle};
pub use process::{EncoderProcess, ProcessOutcome};
pub use progress_parser::parse_elapsed;
