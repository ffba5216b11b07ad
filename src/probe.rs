//! # Video Probe Module
//!
//! Questo modulo analizza i file video tramite ffprobe.
//!
//! ## Responsabilità:
//! - Verifica esistenza e leggibilità dell'input prima di invocare ffprobe
//! - Esegue ffprobe in modalità metadata-only con timeout limitato
//! - Converte l'output JSON di ffprobe in `VideoProbeResult`
//!
//! ## Valori sentinella per campi mancanti:
//! - `duration_seconds`: 0.0 (durata sconosciuta, progresso indeterminato)
//! - `bitrate_bps`: 0
//! - `frame_rate`: 30.0
//! - `source_codec`: "unknown"
//! - `file_size_bytes`: dimensione letta dal filesystem
//!
//! Uno stream video assente o dimensioni non positive rendono l'input
//! non analizzabile (`ProbeFailure::Unparseable`).

use crate::command::{BoundedRun, EngineCommand};
use crate::error::{CompressError, ProbeFailure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Frame rate assumed when the container does not report one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Metadata of one probed input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProbeResult {
    /// 0.0 when unknown
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    /// 0 when unknown
    pub bitrate_bps: u64,
    pub frame_rate: f64,
    pub source_codec: String,
    pub file_size_bytes: u64,
}

impl VideoProbeResult {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn has_known_duration(&self) -> bool {
        self.duration_seconds > 0.0
    }
}

/// Runs ffprobe against input files
#[derive(Debug, Clone)]
pub struct VideoProber {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl VideoProber {
    pub fn new(ffprobe: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    /// Probe a video file
    pub async fn probe(&self, path: &Path) -> Result<VideoProbeResult> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CompressError::probe(path, ProbeFailure::NotFound, ""));
            }
            Err(e) => {
                return Err(CompressError::probe(path, ProbeFailure::Unreadable, e.to_string()));
            }
        };

        if !metadata.is_file() {
            return Err(CompressError::probe(path, ProbeFailure::Unreadable, "not a regular file"));
        }

        if let Err(e) = tokio::fs::File::open(path).await {
            return Err(CompressError::probe(path, ProbeFailure::Unreadable, e.to_string()));
        }

        let mut cmd = EngineCommand::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);

        debug!("Probing: {}", cmd.display());

        let output = match cmd.output_with_timeout(self.timeout).await? {
            BoundedRun::Finished(output) => output,
            BoundedRun::TimedOut => {
                return Err(CompressError::probe(
                    path,
                    ProbeFailure::Timeout,
                    format!("no answer within {:?}", self.timeout),
                ));
            }
        };

        if !output.status.success() {
            return Err(CompressError::probe(
                path,
                ProbeFailure::Unparseable,
                output.stderr.trim().to_string(),
            ));
        }

        let mut result = parse_probe_output(&output.stdout)
            .map_err(|detail| CompressError::probe(path, ProbeFailure::Unparseable, detail))?;

        if result.file_size_bytes == 0 {
            result.file_size_bytes = metadata.len();
        }

        debug!(
            "Probed {}: {}x{} {:.1}s {} ({} bytes)",
            path.display(),
            result.width,
            result.height,
            result.duration_seconds,
            result.source_codec,
            result.file_size_bytes
        );

        Ok(result)
    }
}

/// Parse a fraction string like "30000/1001" or a plain number
fn parse_frame_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// ffprobe reports most numbers as strings; accept both forms
fn number_field<T: std::str::FromStr>(value: &serde_json::Value) -> Option<T> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Convert ffprobe JSON output into a probe result.
///
/// The file size is taken from `format.size` and left at 0 when absent so the
/// caller can fill it from the filesystem.
pub fn parse_probe_output(json: &str) -> std::result::Result<VideoProbeResult, String> {
    let info: serde_json::Value =
        serde_json::from_str(json).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let empty = vec![];
    let streams = info["streams"].as_array().unwrap_or(&empty);
    let video = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| "no video stream".to_string())?;

    let width = video["width"].as_u64().unwrap_or(0);
    let height = video["height"].as_u64().unwrap_or(0);
    if width == 0 || height == 0 || width > u32::MAX as u64 || height > u32::MAX as u64 {
        return Err(format!("invalid frame size {}x{}", width, height));
    }

    let format = &info["format"];

    let duration_seconds = number_field::<f64>(&format["duration"])
        .or_else(|| number_field::<f64>(&video["duration"]))
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let bitrate_bps = number_field::<u64>(&format["bit_rate"])
        .or_else(|| number_field::<u64>(&video["bit_rate"]))
        .unwrap_or(0);

    let frame_rate = ["avg_frame_rate", "r_frame_rate"]
        .iter()
        .find_map(|key| video[*key].as_str().and_then(parse_frame_rate))
        .unwrap_or(DEFAULT_FRAME_RATE);

    let source_codec = video["codec_name"]
        .as_str()
        .filter(|c| !c.is_empty())
        .unwrap_or("unknown")
        .to_string();

    let file_size_bytes = number_field::<u64>(&format["size"]).unwrap_or(0);

    Ok(VideoProbeResult {
        duration_seconds,
        width: width as u32,
        height: height as u32,
        bitrate_bps,
        frame_rate,
        source_codec,
        file_size_bytes,
    })
}
