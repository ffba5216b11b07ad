//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione del compressore.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri operativi
//! - Fornisce validazione robusta dei parametri
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `ffmpeg_path` / `ffprobe_path`: override dei binari (default: ricerca automatica)
//! - `probe_timeout_ms`: timeout di ffprobe (default: 10000)
//! - `grace_period_ms`: attesa dopo SIGTERM prima del kill forzato (default: 5000)
//! - `audio_bitrate`: bitrate audio di destinazione (default: "128k")
//! - `max_parallel_jobs`: processi encoder simultanei (default: 1 = sequenziale)
//! - `stall_warning_lines`: righe consecutive senza progresso prima di un warning
//! - `thresholds`: soglie dell'auto-selezione codec
//! - `json_output`: eventi come JSON su stdout invece delle progress bar
//!
//! ## Esempio:
//! ```rust
//! use video_compressor::Config;
//!
//! let config = Config {
//!     max_parallel_jobs: Config::default_parallel_cap(),
//!     ..Default::default()
//! };
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cutoffs used by the automatic codec selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSelectThresholds {
    /// Sources above this size are "large" (bytes)
    pub large_file_bytes: u64,
    /// Sources above this duration are "long" (seconds)
    pub long_duration_secs: f64,
    /// Frames with at least this many pixels are "high resolution"
    pub high_res_pixels: u64,
}

impl Default for AutoSelectThresholds {
    fn default() -> Self {
        Self {
            large_file_bytes: 2 * 1024 * 1024 * 1024,
            long_duration_secs: 600.0,
            high_res_pixels: 1920 * 1080,
        }
    }
}

/// Configuration for the compressor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit ffmpeg binary (None = lookup)
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary (None = lookup)
    pub ffprobe_path: Option<PathBuf>,
    /// Upper bound for one ffprobe invocation
    pub probe_timeout_ms: u64,
    /// Time between the graceful stop request and the forced kill
    pub grace_period_ms: u64,
    /// Audio bitrate passed to the encoder
    pub audio_bitrate: String,
    /// Encoder processes allowed to run at the same time
    pub max_parallel_jobs: usize,
    /// Consecutive progress lines without a time token before warning
    pub stall_warning_lines: usize,
    /// Auto-selection cutoffs
    pub thresholds: AutoSelectThresholds,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_ms: 10_000,
            grace_period_ms: 5_000,
            audio_bitrate: "128k".to_string(),
            max_parallel_jobs: 1,
            stall_warning_lines: 500,
            thresholds: AutoSelectThresholds::default(),
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Probe timeout must be greater than 0"));
        }

        if self.max_parallel_jobs == 0 {
            return Err(anyhow::anyhow!("Number of parallel jobs must be greater than 0"));
        }

        if !is_valid_bitrate(&self.audio_bitrate) {
            return Err(anyhow::anyhow!(
                "Audio bitrate must look like 128k or 192000, got '{}'",
                self.audio_bitrate
            ));
        }

        if self.thresholds.long_duration_secs < 0.0 {
            return Err(anyhow::anyhow!("Long duration threshold cannot be negative"));
        }

        if self.thresholds.high_res_pixels == 0 {
            return Err(anyhow::anyhow!("High resolution threshold must be greater than 0"));
        }

        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Default cap for bounded concurrency: half the cores, at least one
    pub fn default_parallel_cap() -> usize {
        (num_cpus::get() / 2).max(1)
    }

    /// Default configuration file location (`~/.video-compressor/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".video-compressor").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn is_valid_bitrate(value: &str) -> bool {
    let digits = value
        .strip_suffix('k')
        .or_else(|| value.strip_suffix('K'))
        .unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.max_parallel_jobs = 0;
        assert!(config.validate().is_err());

        config.max_parallel_jobs = 2;
        config.audio_bitrate = "loud".to_string();
        assert!(config.validate().is_err());

        config.audio_bitrate = "192000".to_string();
        assert!(config.validate().is_ok());

        config.probe_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.grace_period(), Duration::from_secs(5));
        assert_eq!(config.audio_bitrate, "128k");
        assert_eq!(config.max_parallel_jobs, 1);
        assert_eq!(config.thresholds.large_file_bytes, 2_147_483_648);
        assert_eq!(config.thresholds.high_res_pixels, 2_073_600);
        assert!(Config::default_parallel_cap() >= 1);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            grace_period_ms: 1_500,
            audio_bitrate: "192k".to_string(),
            max_parallel_jobs: 3,
            thresholds: AutoSelectThresholds {
                long_duration_secs: 120.0,
                ..Default::default()
            },
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.grace_period_ms, 1_500);
        assert_eq!(loaded_config.audio_bitrate, "192k");
        assert_eq!(loaded_config.max_parallel_jobs, 3);
        assert_eq!(loaded_config.thresholds.long_duration_secs, 120.0);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{"max_parallel_jobs": 2}"#).await.unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.max_parallel_jobs, 2);
        assert_eq!(config.probe_timeout_ms, 10_000);

        let missing = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(missing.max_parallel_jobs, 1);
    }
}
