//! # Batch Coordinator
//!
//! Esegue una lista di video uno dopo l'altro (o fino a N in parallelo)
//! verso una cartella di output comune.
//!
//! ## Regole:
//! - L'output di ogni input è `<cartella>/<stem>_compressed.<ext>`; se due
//!   input producono lo stesso nome (o il nome di un input), il successivo
//!   diventa `<stem>_compressed_2.<ext>`, `_3`, ...
//! - Ordine di avvio e ordine del report = ordine degli input
//! - Un job fallito non ferma il batch
//! - Gate scattato: i job in corso vengono cancellati, quelli non avviati
//!   passano a `Cancelled` senza spawn
//! - `EngineNotFound`: i job non avviati falliscono con lo stesso errore e il
//!   batch registra il motivo dell'interruzione

use crate::error::{CompressError, Failure, Result};
use crate::executor::{EventSink, JobExecutor};
use crate::file_manager::FileManager;
use crate::job::{CompressionJob, EncodingChoice, JobRequest, JobState};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Why a batch stopped before running every job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAbort {
    Cancelled,
    EngineNotFound,
}

/// Final report of a batch, jobs in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchRun {
    pub jobs: Vec<CompressionJob>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_elapsed: Duration,
    pub aborted: Option<BatchAbort>,
}

impl BatchRun {
    fn new(jobs: Vec<CompressionJob>, total_elapsed: Duration, engine_missing: bool) -> Self {
        let succeeded = jobs.iter().filter(|j| j.state == JobState::Completed).count();
        let failed = jobs.iter().filter(|j| j.failure().is_some()).count();
        let cancelled = jobs.iter().filter(|j| j.state == JobState::Cancelled).count();

        let aborted = if engine_missing {
            Some(BatchAbort::EngineNotFound)
        } else if cancelled > 0 {
            Some(BatchAbort::Cancelled)
        } else {
            None
        };

        Self {
            jobs,
            succeeded,
            failed,
            cancelled,
            total_elapsed,
            aborted,
        }
    }

    /// Input bytes of the completed jobs
    pub fn input_bytes(&self) -> u64 {
        self.completed()
            .filter_map(|job| job.probe.as_ref().map(|p| p.file_size_bytes))
            .sum()
    }

    /// Output bytes of the completed jobs
    pub fn output_bytes(&self) -> u64 {
        self.completed().filter_map(|job| job.output_size).sum()
    }

    /// Overall reduction over the completed jobs
    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.input_bytes(), self.output_bytes())
    }

    fn completed(&self) -> impl Iterator<Item = &CompressionJob> {
        self.jobs.iter().filter(|job| job.state == JobState::Completed)
    }

    /// One-line summary for the terminal
    pub fn format_summary(&self) -> String {
        let mut summary = format!(
            "Batch finished in {:.1}s: {} compressed, {} failed, {} cancelled",
            self.total_elapsed.as_secs_f64(),
            self.succeeded,
            self.failed,
            self.cancelled
        );

        if self.succeeded > 0 {
            summary.push_str(&format!(
                " | {} -> {} ({:.1}% saved)",
                FileManager::format_size(self.input_bytes()),
                FileManager::format_size(self.output_bytes()),
                self.reduction_percent()
            ));
        }

        match self.aborted {
            Some(BatchAbort::EngineNotFound) => summary.push_str(" | aborted: encoding engine not found"),
            Some(BatchAbort::Cancelled) => summary.push_str(" | aborted: cancelled"),
            None => {}
        }
        summary
    }
}

/// Runs a list of videos through one executor
pub struct BatchCoordinator {
    executor: Arc<JobExecutor>,
    parallel: usize,
}

impl BatchCoordinator {
    /// Run as many jobs at once as the executor allows
    pub fn new(executor: Arc<JobExecutor>) -> Self {
        let parallel = executor.max_parallel();
        Self { executor, parallel }
    }

    pub fn with_parallelism(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    /// One pending job per input, in input order, each with its own output file
    pub fn plan(inputs: &[PathBuf], output_folder: &Path, choice: &EncodingChoice) -> Vec<CompressionJob> {
        let mut taken: HashSet<PathBuf> = inputs.iter().cloned().collect();

        inputs
            .iter()
            .map(|input| {
                let mut n = 1;
                let mut output = FileManager::compressed_output_path(input, output_folder);
                while taken.contains(&output) {
                    n += 1;
                    output = FileManager::numbered_output_path(input, output_folder, n);
                }
                taken.insert(output.clone());
                CompressionJob::new(JobRequest::new(input, output, choice.clone()))
            })
            .collect()
    }

    /// Compress every input into `output_folder`.
    ///
    /// Per-job problems end up in the report; only a failure to create the
    /// output folder is returned as an error.
    pub async fn run(
        &self,
        inputs: Vec<PathBuf>,
        output_folder: &Path,
        choice: EncodingChoice,
        events: &EventSink,
    ) -> Result<BatchRun> {
        let started = Instant::now();
        tokio::fs::create_dir_all(output_folder).await?;

        let jobs = Self::plan(&inputs, output_folder, &choice);
        info!(
            "Starting batch: {} videos -> {} ({} at a time)",
            jobs.len(),
            output_folder.display(),
            self.parallel
        );
        for job in &jobs {
            events.emit(job.state_event());
        }

        let engine_missing = Arc::new(AtomicBool::new(false));
        let finished: Vec<CompressionJob> = stream::iter(jobs)
            .map(|job| {
                start_job(
                    Arc::clone(&self.executor),
                    job,
                    Arc::clone(&engine_missing),
                    events.clone(),
                )
            })
            .buffered(self.parallel)
            .collect()
            .await;

        let run = BatchRun::new(finished, started.elapsed(), engine_missing.load(Ordering::SeqCst));
        info!("{}", run.format_summary());
        Ok(run)
    }
}

async fn start_job(
    executor: Arc<JobExecutor>,
    mut job: CompressionJob,
    engine_missing: Arc<AtomicBool>,
    events: EventSink,
) -> CompressionJob {
    if engine_missing.load(Ordering::SeqCst) && !executor.gate().is_tripped() {
        let err = CompressError::EngineNotFound(format!(
            "{} (job not started)",
            executor.engine().ffmpeg.display()
        ));
        if job.fail(&err) {
            events.emit(job.state_event());
        }
        return job;
    }

    executor.run(&mut job, &events).await;

    let fatal = job.failure().map_or(false, |f| f.is_fatal_for_run());
    if fatal && !engine_missing.swap(true, Ordering::SeqCst) {
        error!("Encoding engine not found, remaining jobs will not start");
    }

    report_job(&job);
    job
}

fn report_job(job: &CompressionJob) {
    let name = job
        .input_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| job.input_path.display().to_string());

    match job.state {
        JobState::Completed => info!(
            "Compressed {}: {} in {:.1}s ({:.1}% saved)",
            name,
            FileManager::format_size(job.output_size.unwrap_or(0)),
            job.elapsed.as_secs_f64(),
            job.reduction_percent().unwrap_or(0.0)
        ),
        JobState::Failed { .. } => error!(
            "Failed {}: {}",
            name,
            job.error_detail.as_deref().unwrap_or("failed")
        ),
        JobState::Cancelled => warn!("Cancelled {}", name),
        _ => {}
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cancel::CancellationGate;
    use crate::config::Config;
    use crate::engine::EngineBinaries;
    use crate::job::JobEventKind;
    use crate::test_support::*;
    use tempfile::TempDir;

    const FFMPEG_FAIL_ON_BAD: &str = "case \"$*\" in\n\
*\"/bad.mp4 \"*) echo 'Invalid data found when processing input' >&2; exit 1;;\n\
esac\n\
printf 'compressed' > \"$out\"\n";

    fn coordinator(dir: &Path, ffmpeg_body: &str, config: &Config) -> BatchCoordinator {
        let engine = EngineBinaries::new(
            fake_ffmpeg(dir, ffmpeg_body),
            fake_ffprobe(dir, PROBE_SMALL_JSON),
        );
        BatchCoordinator::new(Arc::new(JobExecutor::new(config, engine, CancellationGate::new())))
    }

    fn inputs(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|name| touch_input(dir, name)).collect()
    }

    #[tokio::test]
    async fn test_failed_job_does_not_halt_batch() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let batch = coordinator(dir.path(), FFMPEG_FAIL_ON_BAD, &Config::default());
        let files = inputs(dir.path(), &["a.mp4", "bad.mp4", "c.mp4"]);

        let run = batch
            .run(files.clone(), &out, EncodingChoice::default(), &EventSink::none())
            .await
            .unwrap();

        assert_eq!(run.succeeded, 2);
        assert_eq!(run.failed, 1);
        assert_eq!(run.cancelled, 0);
        assert_eq!(run.aborted, None);

        let order: Vec<_> = run.jobs.iter().map(|j| j.input_path.clone()).collect();
        assert_eq!(order, files);
        assert_eq!(
            run.jobs[1].failure(),
            Some(Failure::EngineExecution { exit_code: Some(1) })
        );
        assert_eq!(run.jobs[2].state, JobState::Completed);
        assert!(out.join("a_compressed.mp4").exists());
        assert!(!out.join("bad_compressed.mp4").exists());
        assert!(out.join("c_compressed.mp4").exists());
    }

    #[tokio::test]
    async fn test_parallel_batch_reports_in_input_order() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let config = Config {
            max_parallel_jobs: 2,
            ..Config::default()
        };
        let batch = coordinator(dir.path(), FFMPEG_OK, &config);
        assert_eq!(batch.parallel, 2);
        let files = inputs(dir.path(), &["1.mp4", "2.mkv", "3.mov", "4.webm"]);

        let run = batch
            .run(files.clone(), &out, EncodingChoice::default(), &EventSink::none())
            .await
            .unwrap();

        assert_eq!(run.succeeded, 4);
        let order: Vec<_> = run.jobs.iter().map(|j| j.input_path.clone()).collect();
        assert_eq!(order, files);
        assert!(out.join("4_compressed.webm").exists());
        assert_eq!(run.output_bytes(), 4 * "compressed-bytes".len() as u64);
    }

    #[test]
    fn test_plan_gives_every_job_its_own_output() {
        let out = Path::new("/out");
        let files = vec![
            PathBuf::from("/a/clip.mp4"),
            PathBuf::from("/b/clip.mp4"),
            PathBuf::from("/c/clip.mp4"),
            PathBuf::from("/d/clip.mkv"),
            PathBuf::from("/out/x_compressed.mp4"),
            PathBuf::from("/e/x.mp4"),
        ];

        let jobs = BatchCoordinator::plan(&files, out, &EncodingChoice::default());
        let outputs: Vec<_> = jobs.iter().map(|j| j.output_path.clone()).collect();

        assert_eq!(
            outputs,
            vec![
                out.join("clip_compressed.mp4"),
                out.join("clip_compressed_2.mp4"),
                out.join("clip_compressed_3.mp4"),
                out.join("clip_compressed.mkv"),
                out.join("x_compressed_compressed.mp4"),
                out.join("x_compressed_2.mp4"),
            ]
        );
    }

    #[tokio::test]
    async fn test_same_stem_failure_keeps_earlier_output() {
        const FFMPEG_FAIL_IN_B: &str = "case \"$*\" in\n\
*\"/b/clip.mp4 \"*) printf 'partial' > \"$out\"; exit 1;;\n\
esac\n\
printf 'compressed' > \"$out\"\n";

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        let files = vec![
            touch_input(&dir.path().join("a"), "clip.mp4"),
            touch_input(&dir.path().join("b"), "clip.mp4"),
        ];
        let batch = coordinator(dir.path(), FFMPEG_FAIL_IN_B, &Config::default());

        let run = batch
            .run(files, &out, EncodingChoice::default(), &EventSink::none())
            .await
            .unwrap();

        assert_eq!(run.succeeded, 1);
        assert_eq!(run.failed, 1);
        assert_eq!(run.jobs[0].state, JobState::Completed);
        assert_eq!(run.jobs[0].output_path, out.join("clip_compressed.mp4"));
        assert_eq!(std::fs::read(&run.jobs[0].output_path).unwrap(), b"compressed");
        assert_eq!(run.jobs[1].output_path, out.join("clip_compressed_2.mp4"));
        assert!(!run.jobs[1].output_path.exists());
    }

    #[tokio::test]
    async fn test_single_slot_runs_one_encoder_at_a_time() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("encoder.lock");
        let started = dir.path().join("started.log");
        // mkdir is atomic: a second encoder running at the same time fails
        let body = format!(
            "prev=\n\
for a; do [ \"$prev\" = \"-i\" ] && in=\"$a\"; prev=\"$a\"; done\n\
mkdir '{lock}' 2>/dev/null || {{ echo 'encoder already running' >&2; exit 1; }}\n\
basename \"$in\" >> '{log}'\n\
sleep 0.2\n\
printf 'compressed' > \"$out\"\n\
rmdir '{lock}'\n",
            lock = lock.display(),
            log = started.display()
        );
        let batch = coordinator(dir.path(), &body, &Config::default()).with_parallelism(3);
        assert_eq!(batch.executor.max_parallel(), 1);
        let files = inputs(dir.path(), &["1.mp4", "2.mp4", "3.mp4", "4.mp4"]);

        let run = batch
            .run(files, &dir.path().join("out"), EncodingChoice::default(), &EventSink::none())
            .await
            .unwrap();

        assert_eq!(run.succeeded, 4, "{}", run.format_summary());
        let order = std::fs::read_to_string(&started).unwrap();
        assert_eq!(order.lines().collect::<Vec<_>>(), vec!["1.mp4", "2.mp4", "3.mp4", "4.mp4"]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_unstarted_jobs() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let batch = coordinator(dir.path(), FFMPEG_HANG, &Config::default());
        let gate = batch.executor.gate().clone();
        let files = inputs(dir.path(), &["a.mp4", "b.mp4", "c.mp4"]);

        let (sink, mut rx) = EventSink::channel();
        let task = tokio::spawn({
            let out = out.clone();
            async move { batch.run(files, &out, EncodingChoice::default(), &sink).await }
        });

        while let Some(event) = rx.recv().await {
            if matches!(event.kind, JobEventKind::Progress { .. }) {
                break;
            }
        }
        gate.trip();

        let run = task.await.unwrap().unwrap();
        assert_eq!(run.cancelled, 3);
        assert_eq!(run.aborted, Some(BatchAbort::Cancelled));
        assert!(run.jobs[0].probe.is_some());
        assert!(run.jobs[1].probe.is_none());
        assert!(run.jobs[2].probe.is_none());
        assert!(!out.join("a_compressed.mp4").exists());
    }

    #[tokio::test]
    async fn test_missing_engine_aborts_batch() {
        let dir = TempDir::new().unwrap();
        let engine = EngineBinaries::new(
            dir.path().join("no-ffmpeg"),
            fake_ffprobe(dir.path(), PROBE_SMALL_JSON),
        );
        let executor = JobExecutor::new(&Config::default(), engine, CancellationGate::new());
        let batch = BatchCoordinator::new(Arc::new(executor));
        let files = inputs(dir.path(), &["a.mp4", "b.mp4", "c.mp4"]);

        let run = batch
            .run(files, &dir.path().join("out"), EncodingChoice::default(), &EventSink::none())
            .await
            .unwrap();

        assert_eq!(run.failed, 3);
        assert_eq!(run.aborted, Some(BatchAbort::EngineNotFound));
        assert!(run
            .jobs
            .iter()
            .all(|j| j.failure() == Some(Failure::EngineNotFound)));
        // only the first job got as far as probing
        assert!(run.jobs[0].probe.is_some());
        assert!(run.jobs[1].probe.is_none());
    }

    #[tokio::test]
    async fn test_empty_batch_creates_folder() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("out");
        let batch = coordinator(dir.path(), FFMPEG_OK, &Config::default());

        let run = batch
            .run(Vec::new(), &out, EncodingChoice::default(), &EventSink::none())
            .await
            .unwrap();

        assert!(out.is_dir());
        assert!(run.jobs.is_empty());
        assert_eq!(run.aborted, None);
        assert!(run.format_summary().contains("0 compressed"));
    }
}
