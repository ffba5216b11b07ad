//! # Compressor
//!
//! Facciata per i chiamanti (CLI o altri layer): tiene insieme
//! configurazione, binari, executor e gate di cancellazione.
//!
//! ## Esempio:
//! ```rust,no_run
//! use video_compressor::{Compressor, Config};
//! use video_compressor::job::{EncodingChoice, JobRequest};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let compressor = Compressor::new(Config::default())?;
//! let request = JobRequest::new("in.mp4", "in_compressed.mp4", EncodingChoice::default());
//! let job = compressor.submit_job(request).wait().await?;
//! println!("{}", job.state.label());
//! # Ok(())
//! # }
//! ```

use crate::batch::{BatchCoordinator, BatchRun};
use crate::cancel::CancellationGate;
use crate::config::Config;
use crate::engine::EngineBinaries;
use crate::error::Result;
use crate::executor::{EventSink, JobExecutor, JobHandle};
use crate::job::{EncodingChoice, JobEvent, JobRequest};
use crate::preset::{self, PresetOverrides, QualityPreset};
use crate::probe::VideoProbeResult;
use crate::selector::{AutoSelection, SelectionHints};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a running batch
pub struct BatchHandle {
    events: mpsc::UnboundedReceiver<JobEvent>,
    task: JoinHandle<Result<BatchRun>>,
}

impl BatchHandle {
    /// Events of every job in the batch, `None` once the batch is over
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    pub async fn wait(self) -> Result<BatchRun> {
        self.task.await?
    }
}

/// Entry point tying configuration, engine and executor together
pub struct Compressor {
    config: Config,
    executor: Arc<JobExecutor>,
}

impl Compressor {
    /// Validate the configuration and resolve the engine binaries
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let engine = EngineBinaries::from_config(&config);
        Self::with_engine(config, engine, CancellationGate::new())
    }

    /// Use explicit binaries and an existing gate
    pub fn with_engine(
        config: Config,
        engine: EngineBinaries,
        gate: CancellationGate,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let executor = Arc::new(JobExecutor::new(&config, engine, gate));
        Ok(Self { config, executor })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gate(&self) -> &CancellationGate {
        self.executor.gate()
    }

    pub fn engine(&self) -> &EngineBinaries {
        self.executor.engine()
    }

    /// Fail early with `EngineNotFound` when ffmpeg or ffprobe is missing
    pub fn check_engine(&self) -> Result<()> {
        self.engine().check_available()
    }

    pub fn resolve_preset(&self, name: &str, overrides: &PresetOverrides) -> Result<QualityPreset> {
        preset::resolve_with(name, overrides)
    }

    pub async fn probe(&self, path: &Path) -> Result<VideoProbeResult> {
        self.executor.prober().probe(path).await
    }

    /// Auto-selection with the configured thresholds
    pub fn select_auto(&self, probe: &VideoProbeResult) -> AutoSelection {
        self.executor.selector().select(probe)
    }

    pub fn select_auto_with(&self, probe: &VideoProbeResult, hints: &SelectionHints) -> AutoSelection {
        self.executor.selector().select_with(probe, hints)
    }

    pub fn submit_job(&self, request: JobRequest) -> JobHandle {
        self.executor.submit(request)
    }

    /// Trip the gate: running jobs stop, pending jobs never start
    pub fn cancel_all(&self) {
        self.gate().trip();
    }

    pub fn run_batch(
        &self,
        inputs: Vec<PathBuf>,
        output_folder: impl Into<PathBuf>,
        choice: EncodingChoice,
    ) -> BatchHandle {
        let coordinator = BatchCoordinator::new(Arc::clone(&self.executor));
        let output_folder = output_folder.into();
        let (events, rx) = EventSink::channel();

        let task = tokio::spawn(async move {
            coordinator.run(inputs, &output_folder, choice, &events).await
        });

        BatchHandle { events: rx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::error::CompressError;
    use crate::preset::PresetName;
    use tempfile::TempDir;

    fn compressor(dir: &Path) -> Compressor {
        let engine = EngineBinaries::new(dir.join("ffmpeg"), dir.join("ffprobe"));
        Compressor::with_engine(Config::default(), engine, CancellationGate::new()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            max_parallel_jobs: 0,
            ..Config::default()
        };
        assert!(Compressor::new(config).is_err());
    }

    #[test]
    fn test_resolve_preset() {
        let dir = TempDir::new().unwrap();
        let compressor = compressor(dir.path());

        let preset = compressor.resolve_preset("low", &PresetOverrides::default()).unwrap();
        assert_eq!(preset.name, PresetName::Low);

        let err = compressor
            .resolve_preset("extreme", &PresetOverrides::default())
            .unwrap_err();
        assert!(matches!(err, CompressError::UnknownPreset(_)));
    }

    #[test]
    fn test_select_auto_uses_configured_thresholds() {
        let dir = TempDir::new().unwrap();
        let probe = VideoProbeResult {
            duration_seconds: 60.0,
            width: 3840,
            height: 2160,
            bitrate_bps: 0,
            frame_rate: 30.0,
            source_codec: "h264".into(),
            file_size_bytes: 100_000_000,
        };
        let selection = compressor(dir.path()).select_auto(&probe);
        assert_eq!((selection.codec, selection.preset), (Codec::H265, PresetName::High));
    }

    #[test]
    fn test_check_engine_reports_missing_binaries() {
        let dir = TempDir::new().unwrap();
        let err = compressor(dir.path()).check_engine().unwrap_err();
        assert!(matches!(err, CompressError::EngineNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_batch_handle_streams_events() {
        use crate::test_support::*;

        let dir = TempDir::new().unwrap();
        let engine = EngineBinaries::new(
            fake_ffmpeg(dir.path(), FFMPEG_OK),
            fake_ffprobe(dir.path(), PROBE_SMALL_JSON),
        );
        let compressor = Compressor::with_engine(Config::default(), engine, CancellationGate::new()).unwrap();
        let inputs = vec![touch_input(dir.path(), "a.mp4"), touch_input(dir.path(), "b.mp4")];

        let mut handle = compressor.run_batch(inputs, dir.path().join("out"), EncodingChoice::default());
        let mut count = 0;
        while handle.next_event().await.is_some() {
            count += 1;
        }
        let run = handle.wait().await.unwrap();

        assert_eq!(run.succeeded, 2);
        assert!(count > 2);
    }

    #[tokio::test]
    async fn test_cancel_all_before_submit() {
        let dir = TempDir::new().unwrap();
        let compressor = compressor(dir.path());
        compressor.cancel_all();

        let request = JobRequest::new(dir.path().join("a.mp4"), dir.path().join("b.mp4"), EncodingChoice::default());
        let job = compressor.submit_job(request).wait().await.unwrap();
        assert_eq!(job.state, crate::job::JobState::Cancelled);
    }
}
