//! # Job Executor
//!
//! Porta un `CompressionJob` da `Pending` a uno stato finale.
//!
//! ## Flusso:
//! 1. Controllo del gate e acquisizione di uno slot (semaforo FIFO); un output
//!    che risolve sul file di input viene rifiutato
//! 2. `Probing`: ffprobe con timeout, interrompibile dal gate
//! 3. Risoluzione parametri (espliciti o auto-selezionati + override)
//! 4. `Encoding`: spawn di ffmpeg, progresso in streaming, gate ad ogni giro
//! 5. Verifica output: exit 0 **e** file non vuoto → `Completed`
//!
//! Ogni transizione viene notificata tramite `EventSink`. L'output parziale
//! viene rimosso su fallimento, cancellazione o drop del future.

use super::output_guard::PartialOutput;
use super::process::{EncoderProcess, ProcessOutcome};
use crate::cancel::CancellationGate;
use crate::codec::{Codec, EncodeParams};
use crate::command::EngineCommand;
use crate::config::Config;
use crate::engine::EngineBinaries;
use crate::error::{CompressError, Result};
use crate::file_manager::FileManager;
use crate::job::{CompressionJob, EncodingChoice, JobEvent, JobEventKind, JobId, JobRequest, JobState};
use crate::preset::QualityPreset;
use crate::probe::{VideoProbeResult, VideoProber};
use crate::selector::{AutoSelector, SelectionRule};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Optional destination for job events; a dropped receiver is not an error
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<mpsc::UnboundedSender<JobEvent>>);

impl EventSink {
    /// Discard every event
    pub fn none() -> Self {
        Self(None)
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(Some(tx)), rx)
    }

    pub fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Handle to a submitted job
pub struct JobHandle {
    id: JobId,
    events: mpsc::UnboundedReceiver<JobEvent>,
    task: JoinHandle<CompressionJob>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Next event, `None` once the job is over and every event was read
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Drop the running job; the encoder is killed and the partial output removed
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the job to reach a final state
    pub async fn wait(self) -> Result<CompressionJob> {
        Ok(self.task.await?)
    }
}

/// Runs compression jobs against the external engine
pub struct JobExecutor {
    engine: EngineBinaries,
    prober: VideoProber,
    selector: AutoSelector,
    gate: CancellationGate,
    slots: Semaphore,
    max_parallel: usize,
    grace_period: Duration,
    audio_bitrate: String,
    stall_warning_lines: usize,
}

impl JobExecutor {
    pub fn new(config: &Config, engine: EngineBinaries, gate: CancellationGate) -> Self {
        let max_parallel = config.max_parallel_jobs.max(1);

        Self {
            prober: VideoProber::new(&engine.ffprobe, config.probe_timeout()),
            selector: AutoSelector::new(config.thresholds.clone()),
            engine,
            gate,
            slots: Semaphore::new(max_parallel),
            max_parallel,
            grace_period: config.grace_period(),
            audio_bitrate: config.audio_bitrate.clone(),
            stall_warning_lines: config.stall_warning_lines,
        }
    }

    pub fn gate(&self) -> &CancellationGate {
        &self.gate
    }

    pub fn engine(&self) -> &EngineBinaries {
        &self.engine
    }

    pub fn prober(&self) -> &VideoProber {
        &self.prober
    }

    pub fn selector(&self) -> &AutoSelector {
        &self.selector
    }

    /// Number of encoders allowed to run at the same time
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run a job in the background and return a handle to it
    pub fn submit(self: &Arc<Self>, request: JobRequest) -> JobHandle {
        let mut job = CompressionJob::new(request);
        let id = job.id;
        let (events, rx) = EventSink::channel();
        let executor = Arc::clone(self);

        let task = tokio::spawn(async move {
            events.emit(job.state_event());
            executor.run(&mut job, &events).await;
            job
        });

        JobHandle {
            id,
            events: rx,
            task,
        }
    }

    /// Drive `job` to a final state
    pub async fn run(&self, job: &mut CompressionJob, events: &EventSink) {
        let started = Instant::now();
        self.drive(job, events).await;
        job.elapsed = started.elapsed();

        debug!(
            "Job {} finished as {} in {:.1}s",
            job.id,
            job.state.label(),
            job.elapsed.as_secs_f64()
        );
    }

    async fn drive(&self, job: &mut CompressionJob, events: &EventSink) {
        if self.gate.is_tripped() {
            self.cancel(job, events);
            return;
        }

        if let Err(e) = validate_request(job) {
            self.fail(job, &e, events);
            return;
        }

        let _permit = tokio::select! {
            biased;
            _ = self.gate.tripped() => {
                self.cancel(job, events);
                return;
            }
            permit = self.slots.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.cancel(job, events);
                    return;
                }
            },
        };

        if let Err(e) = ensure_distinct_output(job).await {
            self.fail(job, &e, events);
            return;
        }

        self.advance(job, JobState::Probing, events);

        let probed = tokio::select! {
            biased;
            _ = self.gate.tripped() => {
                self.cancel(job, events);
                return;
            }
            result = self.prober.probe(&job.input_path) => result,
        };
        let probe = match probed {
            Ok(probe) => probe,
            Err(e) => {
                self.fail(job, &e, events);
                return;
            }
        };
        events.emit(job.event(JobEventKind::Probed { probe: probe.clone() }));

        let (codec, preset, rule) = match self.resolve_parameters(&job.choice, &probe) {
            Ok(resolved) => resolved,
            Err(e) => {
                job.probe = Some(probe);
                self.fail(job, &e, events);
                return;
            }
        };

        match rule {
            Some(rule) => info!(
                "Job {}: auto-selected {} / {} ({})",
                job.id,
                codec,
                preset.name,
                rule.describe()
            ),
            None => info!("Job {}: using {} / {}", job.id, codec, preset.name),
        }

        let command = self.encode_command(job, codec, &preset, &probe);
        job.probe = Some(probe);
        job.codec = Some(codec);
        job.preset = Some(preset.clone());
        job.selection_rule = rule;
        events.emit(job.event(JobEventKind::ParametersResolved { codec, preset, rule }));

        if self.gate.is_tripped() {
            self.cancel(job, events);
            return;
        }

        if let Some(parent) = job.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                self.fail(job, &CompressError::from(e), events);
                return;
            }
        }

        // the output folder may only now resolve onto the input
        if let Err(e) = ensure_distinct_output(job).await {
            self.fail(job, &e, events);
            return;
        }

        debug!("Job {}: {}", job.id, command.display());

        let mut process = match EncoderProcess::spawn(&command, self.stall_warning_lines) {
            Ok(process) => process,
            Err(e) => {
                self.fail(job, &e, events);
                return;
            }
        };
        let partial = PartialOutput::arm(&job.output_path);

        self.advance(job, JobState::Encoding, events);

        let outcome = process
            .supervise(&self.gate, self.grace_period, |elapsed| {
                let percent = job.record_progress(elapsed);
                events.emit(job.event(JobEventKind::Progress {
                    percent,
                    elapsed_secs: job.encoded_secs,
                }));
            })
            .await;

        match outcome {
            Ok(ProcessOutcome::Exited(status)) if status.success() => {
                match FileManager::file_size(&job.output_path).await {
                    Some(size) if size > 0 => {
                        partial.keep();
                        job.output_size = Some(size);
                        self.advance(job, JobState::Completed, events);
                    }
                    _ => {
                        partial.discard();
                        let err = CompressError::OutputMissing(job.output_path.clone());
                        self.fail(job, &err, events);
                    }
                }
            }
            Ok(ProcessOutcome::Exited(status)) => {
                let stderr = process.stderr_tail().await;
                partial.discard();
                let err = CompressError::EngineExecution {
                    exit_code: status.code(),
                    stderr,
                };
                self.fail(job, &err, events);
            }
            Ok(ProcessOutcome::Cancelled { forced }) => {
                partial.discard();
                if forced {
                    warn!("Job {}: encoder had to be killed", job.id);
                }
                self.cancel(job, events);
            }
            Err(e) => {
                partial.discard();
                self.fail(job, &e, events);
            }
        }
    }

    /// Explicit choice or auto-selection, with overrides applied on top
    fn resolve_parameters(
        &self,
        choice: &EncodingChoice,
        probe: &VideoProbeResult,
    ) -> Result<(Codec, QualityPreset, Option<SelectionRule>)> {
        match choice {
            EncodingChoice::Explicit {
                codec,
                preset,
                overrides,
            } => Ok((*codec, QualityPreset::of(*preset).with_overrides(overrides)?, None)),
            EncodingChoice::Auto { overrides, hints } => {
                let selection = self.selector.select_with(probe, hints);
                let preset = QualityPreset::of(selection.preset).with_overrides(overrides)?;
                Ok((selection.codec, preset, Some(selection.rule)))
            }
        }
    }

    fn encode_command(
        &self,
        job: &CompressionJob,
        codec: Codec,
        preset: &QualityPreset,
        probe: &VideoProbeResult,
    ) -> EngineCommand {
        let params = EncodeParams {
            input: &job.input_path,
            output: &job.output_path,
            codec,
            preset,
            probe,
            audio_bitrate: &self.audio_bitrate,
        };

        let mut command = EngineCommand::new(&self.engine.ffmpeg);
        command.args(params.to_args());
        command
    }

    fn advance(&self, job: &mut CompressionJob, next: JobState, events: &EventSink) {
        if job.transition(next) {
            debug!("Job {} -> {}", job.id, next.label());
            events.emit(job.state_event());
        }
    }

    fn fail(&self, job: &mut CompressionJob, err: &CompressError, events: &EventSink) {
        if job.fail(err) {
            error!("Job {} failed ({}): {}", job.id, job.input_path.display(), err);
            events.emit(job.state_event());
        }
    }

    fn cancel(&self, job: &mut CompressionJob, events: &EventSink) {
        if job.transition(JobState::Cancelled) {
            info!("Job {} cancelled ({})", job.id, job.input_path.display());
            events.emit(job.state_event());
        }
    }
}

/// Reject requests that cannot run as given
fn validate_request(job: &CompressionJob) -> Result<()> {
    if job.input_path == job.output_path {
        return Err(same_path_error(job));
    }
    job.choice.overrides().validate()
}

/// The partial-output guard deletes the output path, so it must never be the input
async fn ensure_distinct_output(job: &CompressionJob) -> Result<()> {
    if FileManager::same_file(&job.input_path, &job.output_path).await {
        return Err(same_path_error(job));
    }
    Ok(())
}

fn same_path_error(job: &CompressionJob) -> CompressError {
    CompressError::InvalidRequest(format!(
        "output {} is the input file {}",
        job.output_path.display(),
        job.input_path.display()
    ))
}
