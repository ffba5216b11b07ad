//! # Engine Binary Resolution
//!
//! Questo modulo individua i binari dell'engine esterno (ffmpeg, ffprobe).
//!
//! ## Strategie di ricerca (in ordine):
//! 1. Path esplicito nella configurazione (`ffmpeg_path` / `ffprobe_path`)
//! 2. Directory indicata dalla variabile d'ambiente `TOOLS_DIR`
//! 3. `PATH` di sistema (con estensione `.exe` su Windows)
//! 4. Nome nudo: lo spawn fallirà con `EngineNotFound` se il tool manca

use crate::config::Config;
use crate::error::{CompressError, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved locations of the encoder and prober binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBinaries {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl EngineBinaries {
    /// Resolve both binaries using the configured overrides first
    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg: resolve_tool("ffmpeg", config.ffmpeg_path.as_deref()),
            ffprobe: resolve_tool("ffprobe", config.ffprobe_path.as_deref()),
        }
    }

    /// Use explicit paths without any lookup
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Fail with `EngineNotFound` unless both binaries exist
    pub fn check_available(&self) -> Result<()> {
        for tool in [&self.ffmpeg, &self.ffprobe] {
            if !is_executable_present(tool) {
                return Err(CompressError::EngineNotFound(tool.display().to_string()));
            }
        }
        Ok(())
    }
}

fn executable_name(tool_name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool_name)
    } else {
        tool_name.to_string()
    }
}

fn resolve_tool(tool_name: &str, configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        debug!("Using configured {}: {}", tool_name, path.display());
        return path.to_path_buf();
    }

    let file_name = executable_name(tool_name);

    if let Ok(tools_dir) = env::var("TOOLS_DIR") {
        let candidate = PathBuf::from(tools_dir).join(&file_name);
        if candidate.exists() {
            debug!("Found {} via TOOLS_DIR: {}", tool_name, candidate.display());
            return candidate;
        }
    }

    if let Some(found) = find_in_system_path(&file_name) {
        debug!("Found {} in PATH: {}", tool_name, found.display());
        return found;
    }

    debug!("{} not found, falling back to bare name", tool_name);
    PathBuf::from(file_name)
}

fn find_in_system_path(file_name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

fn is_executable_present(tool: &Path) -> bool {
    if tool.components().count() > 1 {
        tool.is_file()
    } else {
        tool.to_str()
            .and_then(find_in_system_path)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_configured_paths_win() {
        let config = Config {
            ffmpeg_path: Some(PathBuf::from("/opt/ff/ffmpeg")),
            ffprobe_path: Some(PathBuf::from("/opt/ff/ffprobe")),
            ..Default::default()
        };
        let engine = EngineBinaries::from_config(&config);
        assert_eq!(engine.ffmpeg, PathBuf::from("/opt/ff/ffmpeg"));
        assert_eq!(engine.ffprobe, PathBuf::from("/opt/ff/ffprobe"));
    }

    #[test]
    fn test_missing_engine_reported() {
        let engine = EngineBinaries::new("/nonexistent/ffmpeg_xyz", "/nonexistent/ffprobe_xyz");
        match engine.check_available() {
            Err(CompressError::EngineNotFound(tool)) => assert!(tool.contains("ffmpeg_xyz")),
            other => panic!("expected EngineNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_existing_files_are_available() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        let ffprobe = dir.path().join("ffprobe");
        std::fs::write(&ffmpeg, b"").unwrap();
        std::fs::write(&ffprobe, b"").unwrap();

        assert!(EngineBinaries::new(ffmpeg, ffprobe).check_available().is_ok());
    }
}
