//! # Auto-Selection Module
//!
//! Sceglie codec e preset a partire dalle caratteristiche del video.
//!
//! ## Regole (valutate in ordine, la prima che scatta vince):
//! 0. Target di dimensione esplicito sotto il 30% dell'originale → h265 / medium
//! 1. File grande (> 2 GiB) **e** lungo (> 600 s) → h265 / medium
//! 2. Risoluzione ≥ 1920×1080 → h265 / high
//! 3. Sorgente già in un codec efficiente (hevc, vp9) → h264 / medium
//! 4. Default → h264 / medium
//!
//! La funzione è pura e totale: a parità di input restituisce sempre la
//! stessa coppia. Le soglie vivono in `AutoSelectThresholds`.

use crate::codec::Codec;
use crate::config::AutoSelectThresholds;
use crate::preset::PresetName;
use crate::probe::VideoProbeResult;
use serde::{Deserialize, Serialize};

/// Target below this share of the source size forces h265
const TARGET_RATIO_FOR_H265: f64 = 0.3;

/// Codec names ffprobe reports for sources that are already efficient
const EFFICIENT_CODECS: &[&str] = &["hevc", "h265", "vp9"];

/// Which rule produced a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    SizeTarget,
    LargeAndLong,
    HighResolution,
    EfficientSource,
    Default,
}

impl SelectionRule {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::SizeTarget => "aggressive size target, maximum compression",
            Self::LargeAndLong => "large and long source, maximum compression ratio",
            Self::HighResolution => "high resolution, preserve quality",
            Self::EfficientSource => "already efficient source, normalize to h264",
            Self::Default => "default",
        }
    }
}

/// Outcome of the automatic selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSelection {
    pub codec: Codec,
    pub preset: PresetName,
    pub rule: SelectionRule,
}

/// Optional caller hints taken into account before the probe heuristics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionHints {
    /// Desired output size in MiB
    pub target_size_mb: Option<u64>,
}

/// Deterministic codec/preset chooser
#[derive(Debug, Clone, Default)]
pub struct AutoSelector {
    thresholds: AutoSelectThresholds,
}

impl AutoSelector {
    pub fn new(thresholds: AutoSelectThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AutoSelectThresholds {
        &self.thresholds
    }

    /// Pick codec and preset for a probed video
    pub fn select(&self, probe: &VideoProbeResult) -> AutoSelection {
        self.select_with(probe, &SelectionHints::default())
    }

    /// Pick codec and preset, honouring caller hints first
    pub fn select_with(&self, probe: &VideoProbeResult, hints: &SelectionHints) -> AutoSelection {
        let pick = |codec, preset, rule| AutoSelection { codec, preset, rule };

        if let Some(target_mb) = hints.target_size_mb {
            let source_mb = probe.file_size_bytes as f64 / (1024.0 * 1024.0);
            if (target_mb as f64) < source_mb * TARGET_RATIO_FOR_H265 {
                return pick(Codec::H265, PresetName::Medium, SelectionRule::SizeTarget);
            }
        }

        if probe.file_size_bytes > self.thresholds.large_file_bytes
            && probe.duration_seconds > self.thresholds.long_duration_secs
        {
            return pick(Codec::H265, PresetName::Medium, SelectionRule::LargeAndLong);
        }

        if probe.pixel_count() >= self.thresholds.high_res_pixels {
            return pick(Codec::H265, PresetName::High, SelectionRule::HighResolution);
        }

        if is_efficient_codec(&probe.source_codec) {
            return pick(Codec::H264, PresetName::Medium, SelectionRule::EfficientSource);
        }

        pick(Codec::H264, PresetName::Medium, SelectionRule::Default)
    }
}

fn is_efficient_codec(codec: &str) -> bool {
    let codec = codec.to_ascii_lowercase();
    EFFICIENT_CODECS.contains(&codec.as_str())
}

/// Select with the default thresholds
pub fn select_auto(probe: &VideoProbeResult) -> AutoSelection {
    AutoSelector::default().select(probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(width: u32, height: u32, duration: f64, size: u64, codec: &str) -> VideoProbeResult {
        VideoProbeResult {
            duration_seconds: duration,
            width,
            height,
            bitrate_bps: 0,
            frame_rate: 30.0,
            source_codec: codec.to_string(),
            file_size_bytes: size,
        }
    }

    fn pair(selection: AutoSelection) -> (Codec, PresetName) {
        (selection.codec, selection.preset)
    }

    #[test]
    fn test_high_resolution_rule() {
        let sel = select_auto(&probe(3840, 2160, 120.0, 500_000_000, "h264"));
        assert_eq!(pair(sel), (Codec::H265, PresetName::High));
        assert_eq!(sel.rule, SelectionRule::HighResolution);
    }

    #[test]
    fn test_large_file_rule_wins_over_resolution() {
        let sel = select_auto(&probe(3840, 2160, 900.0, 3_000_000_000, "h264"));
        assert_eq!(pair(sel), (Codec::H265, PresetName::Medium));
        assert_eq!(sel.rule, SelectionRule::LargeAndLong);
    }

    #[test]
    fn test_efficient_source_rule() {
        let sel = select_auto(&probe(640, 480, 30.0, 10_000_000, "vp9"));
        assert_eq!(pair(sel), (Codec::H264, PresetName::Medium));
        assert_eq!(sel.rule, SelectionRule::EfficientSource);

        let sel = select_auto(&probe(640, 480, 30.0, 10_000_000, "HEVC"));
        assert_eq!(sel.rule, SelectionRule::EfficientSource);
    }

    #[test]
    fn test_default_rule() {
        let sel = select_auto(&probe(1280, 720, 30.0, 10_000_000, "mpeg4"));
        assert_eq!(pair(sel), (Codec::H264, PresetName::Medium));
        assert_eq!(sel.rule, SelectionRule::Default);
    }

    #[test]
    fn test_large_but_short_is_not_large_rule() {
        // only one of the two conditions holds
        let sel = select_auto(&probe(1280, 720, 300.0, 3_000_000_000, "h264"));
        assert_eq!(sel.rule, SelectionRule::Default);

        let sel = select_auto(&probe(1280, 720, 900.0, 1_000_000_000, "h264"));
        assert_eq!(sel.rule, SelectionRule::Default);
    }

    #[test]
    fn test_exact_thresholds() {
        let sel = select_auto(&probe(1920, 1080, 10.0, 1_000, "h264"));
        assert_eq!(sel.rule, SelectionRule::HighResolution);

        // strictly greater than 2 GiB and 600 s
        let sel = select_auto(&probe(1280, 720, 600.0, 2 * 1024 * 1024 * 1024 + 1, "h264"));
        assert_eq!(sel.rule, SelectionRule::Default);
    }

    #[test]
    fn test_selection_is_pure() {
        let input = probe(2560, 1440, 45.0, 80_000_000, "vp9");
        assert_eq!(select_auto(&input), select_auto(&input));
    }

    #[test]
    fn test_custom_thresholds() {
        let selector = AutoSelector::new(AutoSelectThresholds {
            high_res_pixels: 1280 * 720,
            ..Default::default()
        });
        let sel = selector.select(&probe(1280, 720, 30.0, 10_000_000, "h264"));
        assert_eq!(sel.rule, SelectionRule::HighResolution);
    }

    #[test]
    fn test_size_target_hint() {
        let source = probe(640, 480, 30.0, 100 * 1024 * 1024, "h264");
        let hints = SelectionHints { target_size_mb: Some(20) };
        let sel = AutoSelector::default().select_with(&source, &hints);
        assert_eq!(pair(sel), (Codec::H265, PresetName::Medium));
        assert_eq!(sel.rule, SelectionRule::SizeTarget);

        let relaxed = SelectionHints { target_size_mb: Some(50) };
        let sel = AutoSelector::default().select_with(&source, &relaxed);
        assert_eq!(sel.rule, SelectionRule::Default);
    }
}
