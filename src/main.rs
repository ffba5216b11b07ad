//! # Video Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione (`~/.video-compressor/config.json`)
//! - Collegamento di SIGINT/SIGTERM al gate di cancellazione
//! - Rendering degli eventi (progress bar o righe JSON)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! video-compressor compress holiday.mp4 --preset low --codec h265
//! video-compressor batch ./raw --output-folder ./compressed --jobs 2
//! video-compressor --json probe holiday.mp4
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use video_compressor::batch::BatchRun;
use video_compressor::codec::Codec;
use video_compressor::file_manager::FileManager;
use video_compressor::job::{CompressionJob, EncodingChoice, JobEvent, JobRequest, JobState};
use video_compressor::json_output::{JsonConfig, JsonMessage};
use video_compressor::preset::{PresetName, PresetOverrides, QualityPreset, SpeedTier};
use video_compressor::progress::ProgressManager;
use video_compressor::selector::SelectionHints;
use video_compressor::{Compressor, Config};

#[derive(Parser)]
#[command(name = "video-compressor")]
#[command(about = "Compress videos with ffmpeg using quality presets and automatic codec selection")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print one JSON object per line instead of progress bars
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: ~/.video-compressor/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a single video
    Compress {
        input: PathBuf,

        /// Output file (default: <stem>_compressed.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        encoding: EncodingArgs,
    },

    /// Compress several videos, or every video directly inside a folder
    Batch {
        /// Video files and/or folders
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Destination folder, created if missing
        #[arg(short, long)]
        output_folder: PathBuf,

        /// Jobs running at once (0 = half the CPU cores)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        encoding: EncodingArgs,
    },

    /// Show video properties and the automatic codec/preset choice
    Probe { input: PathBuf },

    /// List the quality presets
    Presets,
}

#[derive(Args)]
struct EncodingArgs {
    /// Target codec (h264, h265, vp9); omit both codec and preset for automatic selection
    #[arg(long)]
    codec: Option<Codec>,

    /// Quality preset (ultra_low, low, medium, high, lossless)
    #[arg(short, long)]
    preset: Option<PresetName>,

    /// Override the preset CRF (0-51)
    #[arg(long)]
    crf: Option<u8>,

    /// Override the encoder speed tier (ultrafast ... veryslow)
    #[arg(long)]
    speed: Option<SpeedTier>,

    /// Override the scale factor (0 < s <= 1)
    #[arg(long)]
    scale: Option<f64>,

    /// Desired output size in MiB, used by automatic selection
    #[arg(long)]
    target_size_mb: Option<u64>,
}

impl EncodingArgs {
    fn choice(&self) -> EncodingChoice {
        let overrides = PresetOverrides {
            crf: self.crf,
            speed: self.speed,
            scale_factor: self.scale,
        };

        match (self.codec, self.preset) {
            (None, None) => EncodingChoice::Auto {
                overrides,
                hints: SelectionHints {
                    target_size_mb: self.target_size_mb,
                },
            },
            (codec, preset) => EncodingChoice::Explicit {
                codec: codec.unwrap_or(Codec::H264),
                preset: preset.unwrap_or(PresetName::Medium),
                overrides,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for JSON output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::from_file(&path).await?,
        None => Config::default(),
    };
    config.json_output = cli.json;

    match cli.command {
        Command::Presets => {
            list_presets(config.json_output);
            Ok(ExitCode::SUCCESS)
        }
        Command::Probe { input } => {
            let compressor = Compressor::new(config)?;
            probe(&compressor, &input).await
        }
        Command::Compress {
            input,
            output,
            encoding,
        } => {
            let compressor = Compressor::new(config)?;
            let output = output.unwrap_or_else(|| FileManager::default_output_path(&input));
            compress(&compressor, input, output, encoding.choice()).await
        }
        Command::Batch {
            inputs,
            output_folder,
            jobs,
            encoding,
        } => {
            if let Some(jobs) = jobs {
                config.max_parallel_jobs = if jobs == 0 {
                    Config::default_parallel_cap()
                } else {
                    jobs
                };
            }
            let compressor = Compressor::new(config)?;
            batch(&compressor, &inputs, output_folder, encoding.choice()).await
        }
    }
}

/// Fail fast with a readable message when ffmpeg/ffprobe are missing
fn preflight(compressor: &Compressor) -> Result<()> {
    if let Err(e) = compressor.check_engine() {
        if compressor.config().json_output {
            JsonMessage::error(e.to_string(), Some("install ffmpeg or set ffmpeg_path/ffprobe_path in the configuration".into())).emit();
        }
        return Err(e.into());
    }
    Ok(())
}

fn list_presets(json: bool) {
    let presets: Vec<QualityPreset> = PresetName::ALL.iter().map(|name| QualityPreset::of(*name)).collect();

    if json {
        JsonMessage::Presets { presets }.emit();
        return;
    }

    println!("{:<10} {:>4} {:<9} {:>5}  description", "preset", "crf", "speed", "scale");
    for preset in presets {
        println!(
            "{:<10} {:>4} {:<9} {:>5.2}  {}",
            preset.name.as_str(),
            preset.crf,
            preset.speed.as_str(),
            preset.scale_factor,
            preset.name.description()
        );
    }
}

async fn probe(compressor: &Compressor, input: &Path) -> Result<ExitCode> {
    preflight(compressor)?;

    let spinner = (!compressor.config().json_output)
        .then(|| ProgressManager::spinner(&format!("🔍 Probing {}", input.display())));
    let result = compressor.probe(input).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = result?;
    let selection = compressor.select_auto(&result);

    if compressor.config().json_output {
        JsonMessage::Probe {
            path: input.to_path_buf(),
            probe: result,
            selection,
        }
        .emit();
    } else {
        println!("File:       {}", input.display());
        println!("Size:       {}", FileManager::format_size(result.file_size_bytes));
        println!("Resolution: {}x{}", result.width, result.height);
        if result.has_known_duration() {
            println!("Duration:   {:.2}s", result.duration_seconds);
        } else {
            println!("Duration:   unknown");
        }
        println!("Codec:      {}", result.source_codec);
        println!("Bitrate:    {} kb/s", result.bitrate_bps / 1000);
        println!("Frame rate: {:.3}", result.frame_rate);
        println!(
            "Suggested:  {} / {} ({})",
            selection.codec,
            selection.preset,
            selection.rule.describe()
        );
    }

    Ok(ExitCode::SUCCESS)
}

async fn compress(
    compressor: &Compressor,
    input: PathBuf,
    output: PathBuf,
    choice: EncodingChoice,
) -> Result<ExitCode> {
    preflight(compressor)?;
    let json = compressor.config().json_output;
    let _signals = compressor.gate().watch_signals();

    if json {
        let config = JsonConfig::new(compressor.config(), &choice);
        JsonMessage::start(vec![input.clone()], output.parent().map(Path::to_path_buf), config).emit();
    } else {
        info!("Compressing {} -> {}", input.display(), output.display());
    }

    let progress = (!json).then(ProgressManager::for_job);
    let mut handle = compressor.submit_job(JobRequest::new(input, output, choice));
    while let Some(event) = handle.next_event().await {
        render(&event, progress.as_ref());
    }
    let job = handle.wait().await?;

    if json {
        JsonMessage::job_complete(&job).emit();
    } else if let Some(progress) = &progress {
        progress.finish(&job_summary(&job));
    }

    Ok(exit_code_for_job(&job))
}

async fn batch(
    compressor: &Compressor,
    inputs: &[PathBuf],
    output_folder: PathBuf,
    choice: EncodingChoice,
) -> Result<ExitCode> {
    let files = collect_inputs(inputs)?;
    let json = compressor.config().json_output;

    if files.is_empty() {
        if json {
            JsonMessage::complete(&BatchRun::default()).emit();
        } else {
            info!("No video files found to compress");
        }
        return Ok(ExitCode::SUCCESS);
    }

    preflight(compressor)?;
    let _signals = compressor.gate().watch_signals();

    if json {
        let config = JsonConfig::new(compressor.config(), &choice);
        JsonMessage::start(files.clone(), Some(output_folder.clone()), config).emit();
    }

    let progress = (!json).then(|| ProgressManager::for_batch(files.len() as u64));
    let mut handle = compressor.run_batch(files, output_folder, choice);
    while let Some(event) = handle.next_event().await {
        render(&event, progress.as_ref());
    }
    let run = handle.wait().await?;

    if json {
        for job in &run.jobs {
            JsonMessage::job_complete(job).emit();
        }
        JsonMessage::complete(&run).emit();
    } else if let Some(progress) = &progress {
        progress.finish(&run.format_summary());
    }

    if run.failed > 0 || run.aborted.is_some() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Expand folders into the videos they contain, keep files as given
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(FileManager::find_video_files(input)?);
        } else if FileManager::is_video(input) {
            files.push(input.clone());
        } else {
            warn!("Skipping {}: not a recognised video file", input.display());
        }
    }
    Ok(files)
}

fn render(event: &JobEvent, progress: Option<&ProgressManager>) {
    match progress {
        Some(progress) => progress.handle_event(event),
        None => JsonMessage::Job(event.clone()).emit(),
    }
}

fn job_summary(job: &CompressionJob) -> String {
    match job.state {
        JobState::Completed => format!(
            "✅ {} ({}, {:.1}% saved) in {:.1}s",
            job.output_path.display(),
            FileManager::format_size(job.output_size.unwrap_or(0)),
            job.reduction_percent().unwrap_or(0.0),
            job.elapsed.as_secs_f64()
        ),
        JobState::Cancelled => "⏹️ Cancelled".to_string(),
        _ => format!("❌ {}", job.error_detail.as_deref().unwrap_or("failed")),
    }
}

fn exit_code_for_job(job: &CompressionJob) -> ExitCode {
    match job.state {
        JobState::Completed => ExitCode::SUCCESS,
        JobState::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    }
}
