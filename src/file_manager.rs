//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file video.
//!
//! ## Responsabilità:
//! - Discovery dei file video in una cartella (non ricorsiva, ordinata per nome)
//! - Determinazione del tipo di file tramite estensione
//! - Calcolo dei path di output (`<stem>_compressed.<ext>`, poi `_compressed_2`, ...)
//! - Riconoscimento di due path che indicano lo stesso file
//! - Utilità per dimensioni e percentuali di riduzione
//!
//! ## Formati supportati:
//! - **Video**: MP4, AVI, MOV, MKV, WMV, FLV, WebM
//!
//! ## Esempio:
//! ```rust
//! use std::path::Path;
//! use video_compressor::file_manager::FileManager;
//!
//! let out = FileManager::compressed_output_path(Path::new("/in/clip.mov"), Path::new("/out"));
//! assert_eq!(out, Path::new("/out/clip_compressed.mov"));
//! assert_eq!(FileManager::format_size(1536), "1.50 KB");
//! ```

use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions recognised as video inputs
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Suffix appended to the stem of compressed outputs
const COMPRESSED_SUFFIX: &str = "_compressed";

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find video files directly inside `dir`, sorted by file name
    pub fn find_video_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && Self::is_video(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    /// Check if file is a supported video format
    pub fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// `<folder>/<stem>_compressed.<ext>`
    pub fn compressed_output_path(input: &Path, output_folder: &Path) -> PathBuf {
        Self::numbered_output_path(input, output_folder, 1)
    }

    /// `<folder>/<stem>_compressed_<n>.<ext>`, plain `_compressed` for `n <= 1`.
    ///
    /// Stem and extension are copied as raw `OsStr`, so non UTF-8 names survive.
    pub fn numbered_output_path(input: &Path, output_folder: &Path, n: usize) -> PathBuf {
        let mut file_name = OsString::from(input.file_stem().unwrap_or_default());
        file_name.push(COMPRESSED_SUFFIX);
        if n > 1 {
            file_name.push(format!("_{}", n));
        }
        if let Some(ext) = input.extension() {
            file_name.push(".");
            file_name.push(ext);
        }
        output_folder.join(file_name)
    }

    /// Output next to the input when no destination is given
    pub fn default_output_path(input: &Path) -> PathBuf {
        let folder = input.parent().unwrap_or_else(|| Path::new(""));
        Self::compressed_output_path(input, folder)
    }

    /// Whether `output` names the same file as the existing `input`.
    ///
    /// Catches aliases (`sub/../clip.mp4`), symlinks and, on unix, hard links.
    /// An output that does not exist yet is resolved through its parent folder.
    pub async fn same_file(input: &Path, output: &Path) -> bool {
        if input == output {
            return true;
        }

        let input = match tokio::fs::canonicalize(input).await {
            Ok(input) => input,
            Err(_) => return false,
        };

        if let Ok(existing) = tokio::fs::canonicalize(output).await {
            return existing == input || Self::is_hard_link(&input, &existing).await;
        }

        let (parent, name) = match (output.parent(), output.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => return false,
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        match tokio::fs::canonicalize(parent).await {
            Ok(parent) => parent.join(name) == input,
            Err(_) => false,
        }
    }

    #[cfg(unix)]
    async fn is_hard_link(a: &Path, b: &Path) -> bool {
        use std::os::unix::fs::MetadataExt;

        match (tokio::fs::metadata(a).await, tokio::fs::metadata(b).await) {
            (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    async fn is_hard_link(_a: &Path, _b: &Path) -> bool {
        false
    }

    /// Size of a file, `None` if it does not exist
    pub async fn file_size(path: &Path) -> Option<u64> {
        tokio::fs::metadata(path).await.ok().map(|m| m.len())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
