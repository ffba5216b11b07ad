//! # Encoder Process
//!
//! Possiede il processo ffmpeg di un job e i suoi due reader:
//! - stdout → righe di progresso, convertite in `Duration` e inviate su un canale
//! - stderr → coda diagnostica (ultime righe) allegata agli errori
//!
//! `supervise` fa `select!` su progresso, uscita del processo e gate di
//! cancellazione. Alla cancellazione manda SIGTERM, attende il grace period
//! e poi uccide il processo.

use super::progress_parser::parse_elapsed;
use crate::cancel::CancellationGate;
use crate::command::EngineCommand;
use crate::error::Result;
use std::collections::VecDeque;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lines of stderr kept for error reports
const STDERR_TAIL_LINES: usize = 20;

/// How long to wait for the readers once the process has exited
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How a supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited on its own
    Exited(ExitStatus),
    /// The gate tripped and the process was stopped
    Cancelled { forced: bool },
}

/// A running encoder with its reader tasks
pub struct EncoderProcess {
    child: Child,
    progress: mpsc::Receiver<Duration>,
    stdout_reader: JoinHandle<()>,
    stderr_reader: JoinHandle<String>,
}

impl EncoderProcess {
    /// Spawn the encoder and start reading its output
    pub fn spawn(command: &EngineCommand, stall_warning_lines: usize) -> Result<Self> {
        let mut child = command.spawn()?;
        let (tx, progress) = mpsc::channel(64);

        let stdout_reader = match child.stdout.take() {
            Some(stdout) => tokio::spawn(read_progress(stdout, tx, stall_warning_lines)),
            None => tokio::spawn(async {}),
        };
        let stderr_reader = match child.stderr.take() {
            Some(stderr) => tokio::spawn(read_stderr_tail(stderr)),
            None => tokio::spawn(async { String::new() }),
        };

        debug!("Spawned {} (pid {:?})", command.program_name(), child.id());

        Ok(Self {
            child,
            progress,
            stdout_reader,
            stderr_reader,
        })
    }

    /// Drive the process to its end, reporting every progress sample
    pub async fn supervise(
        &mut self,
        gate: &CancellationGate,
        grace_period: Duration,
        mut on_progress: impl FnMut(Duration),
    ) -> Result<ProcessOutcome> {
        let mut progress_open = true;

        loop {
            tokio::select! {
                biased;

                _ = gate.tripped() => {
                    let forced = self.terminate(grace_period).await?;
                    return Ok(ProcessOutcome::Cancelled { forced });
                }

                sample = self.progress.recv(), if progress_open => match sample {
                    Some(elapsed) => on_progress(elapsed),
                    None => progress_open = false,
                },

                status = self.child.wait() => {
                    let status = status?;
                    // samples written just before exit are still in the channel
                    let _ = tokio::time::timeout(READER_DRAIN_TIMEOUT, async {
                        while let Some(elapsed) = self.progress.recv().await {
                            on_progress(elapsed);
                        }
                    })
                    .await;
                    return Ok(ProcessOutcome::Exited(status));
                }
            }
        }
    }

    /// SIGTERM, then kill once the grace period is over. Returns whether
    /// the kill was needed.
    async fn terminate(&mut self, grace_period: Duration) -> Result<bool> {
        request_stop(&mut self.child);

        match tokio::time::timeout(grace_period, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!("Encoder stopped after termination request: {}", status);
                Ok(false)
            }
            Err(_) => {
                warn!(
                    "Encoder ignored termination for {:?}, killing it",
                    grace_period
                );
                self.child.kill().await?;
                Ok(true)
            }
        }
    }

    /// Last lines the encoder wrote to stderr
    pub async fn stderr_tail(&mut self) -> String {
        self.stdout_reader.abort();
        match tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut self.stderr_reader).await {
            Ok(Ok(tail)) => tail,
            _ => {
                self.stderr_reader.abort();
                String::new()
            }
        }
    }
}

impl Drop for EncoderProcess {
    fn drop(&mut self) {
        self.stdout_reader.abort();
        self.stderr_reader.abort();
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };

    // SAFETY: plain signal delivery to a child we own and have not reaped
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        debug!("SIGTERM to pid {} failed: {}", pid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Failed to stop encoder: {}", e);
    }
}

async fn read_progress(
    stdout: impl AsyncRead + Unpin,
    tx: mpsc::Sender<Duration>,
    stall_warning_lines: usize,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut without_token = 0usize;
    let mut warned = false;

    while let Ok(Some(line)) = lines.next_line().await {
        match parse_elapsed(&line) {
            Some(elapsed) => {
                without_token = 0;
                if tx.send(elapsed).await.is_err() {
                    break;
                }
            }
            None => {
                without_token += 1;
                if !warned && stall_warning_lines > 0 && without_token >= stall_warning_lines {
                    warn!(
                        "Encoder printed {} lines without progress information",
                        without_token
                    );
                    warned = true;
                }
            }
        }
    }
}

async fn read_stderr_tail(stderr: impl AsyncRead + Unpin) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    Vec::from(tail).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stderr_tail_keeps_last_lines() {
        let input: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = read_stderr_tail(input.as_bytes()).await;
        let lines: Vec<_> = tail.lines().collect();
        assert_eq!(lines.len(), STDERR_TAIL_LINES);
        assert_eq!(lines[0], "line 10");
        assert_eq!(lines[STDERR_TAIL_LINES - 1], "line 29");
    }

    #[tokio::test]
    async fn test_progress_reader_forwards_samples() {
        let input = "frame=1\nout_time=00:00:01.000000\nprogress=continue\nout_time=00:00:02.500000\n";
        let (tx, mut rx) = mpsc::channel(8);
        read_progress(input.as_bytes(), tx, 2).await;

        assert_eq!(rx.recv().await, Some(Duration::from_secs(1)));
        assert_eq!(rx.recv().await, Some(Duration::from_millis(2500)));
        assert_eq!(rx.recv().await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_supervise_reports_exit_status() {
        let mut cmd = EngineCommand::new("sh");
        cmd.args(["-c", "echo out_time=00:00:03.000000; exit 3"]);

        let mut process = EncoderProcess::spawn(&cmd, 0).unwrap();
        let mut samples = Vec::new();
        let outcome = process
            .supervise(&CancellationGate::new(), Duration::from_secs(1), |d| samples.push(d))
            .await
            .unwrap();

        match outcome {
            ProcessOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(samples, vec![Duration::from_secs(3)]);
    }
}
