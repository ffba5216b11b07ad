//! # Codec Parameters Module
//!
//! Traduce codec + preset risolto in argomenti concreti per ffmpeg.
//!
//! ## Responsabilità:
//! - Definisce `Codec` (h264, h265, vp9) e gli encoder associati
//! - Calcola il filtro di scala con dimensioni pari
//! - Costruisce la grammatica fissa degli argomenti dell'encoder
//!
//! ## Flag per codec:
//! - **h264**: `libx264`, tune film, profile high / level 4.1, `+faststart`
//! - **h265**: `libx265`, tag `hvc1` per compatibilità player, `+faststart`
//! - **vp9**: `libvpx-vp9`, `-b:v 0` (CRF puro), deadline good + cpu-used
//!
//! L'audio viene sempre ricodificato (AAC, Opus per WebM) al bitrate
//! configurato; il numero di canali non viene toccato.

use crate::error::{CompressError, Result};
use crate::preset::QualityPreset;
use crate::probe::VideoProbeResult;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Target codec family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    H264,
    H265,
    Vp9,
}

impl Codec {
    pub const ALL: [Codec; 3] = [Codec::H264, Codec::H265, Codec::Vp9];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Vp9 => "vp9",
        }
    }

    /// ffmpeg encoder name
    pub fn encoder(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
        }
    }

    /// Whether the codec can use the `+faststart` streaming layout
    pub fn supports_faststart(&self) -> bool {
        matches!(self, Self::H264 | Self::H265)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "x264" => Ok(Self::H264),
            "h265" | "hevc" | "x265" => Ok(Self::H265),
            "vp9" => Ok(Self::Vp9),
            _ => Err(CompressError::UnknownCodec(s.to_string())),
        }
    }
}

/// Scaled frame size, each dimension truncated and rounded down to even
pub fn scaled_dimensions(width: u32, height: u32, scale_factor: f64) -> (u32, u32) {
    let even = |value: u32| {
        // absorb float error, 1920 * 0.7 is 1343.999...
        let scaled = (value as f64 * scale_factor + 1e-6).floor() as u32;
        (scaled - scaled % 2).max(2)
    };
    (even(width), even(height))
}

/// Audio encoder accepted by the output container
fn audio_encoder(output: &Path) -> &'static str {
    let is_webm = output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("webm"))
        .unwrap_or(false);

    if is_webm {
        "libopus"
    } else {
        "aac"
    }
}

fn push_args(args: &mut Vec<OsString>, items: &[&str]) {
    args.extend(items.iter().map(|item| OsString::from(*item)));
}

/// Everything needed to build one encoder invocation
#[derive(Debug, Clone)]
pub struct EncodeParams<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub codec: Codec,
    pub preset: &'a QualityPreset,
    pub probe: &'a VideoProbeResult,
    pub audio_bitrate: &'a str,
}

impl EncodeParams<'_> {
    /// Full ffmpeg argument list; progress goes to stdout as `key=value` lines
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(40);

        push_args(&mut args, &["-hide_banner", "-nostdin", "-y", "-i"]);
        args.push(self.input.as_os_str().to_os_string());

        if self.preset.scales() {
            let (width, height) =
                scaled_dimensions(self.probe.width, self.probe.height, self.preset.scale_factor);
            let filter = format!("scale={}:{}", width, height);
            push_args(&mut args, &["-vf", filter.as_str()]);
        }

        let crf = self.preset.crf.to_string();
        push_args(&mut args, &["-c:v", self.codec.encoder(), "-crf", crf.as_str()]);

        match self.codec {
            Codec::H264 => {
                push_args(&mut args, &["-preset", self.preset.speed.as_str(), "-tune", "film"]);
                // x264 refuses the high profile together with crf 0
                if !self.preset.is_lossless() {
                    push_args(&mut args, &["-profile:v", "high", "-level", "4.1"]);
                }
            }
            Codec::H265 => {
                push_args(&mut args, &["-preset", self.preset.speed.as_str(), "-tag:v", "hvc1"]);
            }
            Codec::Vp9 => {
                let cpu_used = self.preset.speed.vpx_cpu_used().to_string();
                push_args(&mut args, &["-b:v", "0", "-deadline", "good", "-cpu-used", cpu_used.as_str()]);
                if self.preset.is_lossless() {
                    push_args(&mut args, &["-lossless", "1"]);
                }
            }
        }

        if self.codec.supports_faststart() {
            push_args(&mut args, &["-movflags", "+faststart"]);
        }

        push_args(&mut args, &["-c:a", audio_encoder(self.output), "-b:a", self.audio_bitrate]);
        push_args(&mut args, &["-progress", "pipe:1", "-nostats", "-loglevel", "error"]);
        args.push(self.output.as_os_str().to_os_string());

        args
    }
}
