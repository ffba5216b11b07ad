//! # Quality Preset Module
//!
//! Tabella statica dei preset di qualità e risoluzione degli override.
//!
//! ## Preset disponibili:
//! | nome        | CRF | speed    | scala |
//! |-------------|-----|----------|-------|
//! | `ultra_low` | 35  | fast     | 0.5   |
//! | `low`       | 28  | medium   | 0.7   |
//! | `medium`    | 23  | medium   | 1.0   |
//! | `high`      | 18  | slow     | 1.0   |
//! | `lossless`  | 0   | veryslow | 1.0   |
//!
//! Il CRF cresce e la scala diminuisce man mano che la compressione diventa
//! più aggressiva; `lossless` è l'unica eccezione (CRF 0, scala piena).
//!
//! ## Override:
//! `PresetOverrides` sostituisce un sottoinsieme di {crf, speed, scale_factor}
//! lasciando gli altri valori a quelli del preset nominato.
//!
//! ## Esempio:
//! ```rust
//! use video_compressor::preset::{resolve, resolve_with, PresetOverrides};
//!
//! let medium = resolve("medium")?;
//! assert_eq!(medium.crf, 23);
//!
//! let custom = resolve_with("medium", &PresetOverrides { crf: Some(26), ..Default::default() })?;
//! assert_eq!(custom.crf, 26);
//! # Ok::<(), video_compressor::CompressError>(())
//! ```

use crate::error::{CompressError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest CRF accepted by the x264/x265/vpx encoders
pub const MAX_CRF: u8 = 51;

/// Named quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetName {
    UltraLow,
    Low,
    Medium,
    High,
    Lossless,
}

impl PresetName {
    /// All presets, ordered from most to least aggressive compression
    pub const ALL: [PresetName; 5] = [
        PresetName::UltraLow,
        PresetName::Low,
        PresetName::Medium,
        PresetName::High,
        PresetName::Lossless,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UltraLow => "ultra_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Lossless => "lossless",
        }
    }

    /// Short human description, used by the preset listing
    pub fn description(&self) -> &'static str {
        match self {
            Self::UltraLow => "Maximum compression, minimum quality",
            Self::Low => "High compression, low quality",
            Self::Medium => "Balanced (recommended)",
            Self::High => "Low compression, high quality",
            Self::Lossless => "No quality loss",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        PresetName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CompressError::UnknownPreset(s.to_string()))
    }
}

/// Encoder speed/effort tier (x264/x265 `-preset` names)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl SpeedTier {
    const ALL: [SpeedTier; 9] = [
        SpeedTier::Ultrafast,
        SpeedTier::Superfast,
        SpeedTier::Veryfast,
        SpeedTier::Faster,
        SpeedTier::Fast,
        SpeedTier::Medium,
        SpeedTier::Slow,
        SpeedTier::Slower,
        SpeedTier::Veryslow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }

    /// libvpx `-cpu-used` value paired with this tier (0 = slowest, best)
    pub fn vpx_cpu_used(&self) -> u8 {
        match self {
            Self::Veryslow => 0,
            Self::Slower | Self::Slow => 1,
            Self::Medium => 2,
            Self::Fast | Self::Faster => 3,
            Self::Veryfast => 4,
            Self::Superfast | Self::Ultrafast => 5,
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeedTier {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        SpeedTier::ALL
            .iter()
            .copied()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| CompressError::InvalidOverride(format!("unknown speed tier '{}'", s)))
    }
}

/// Concrete encode parameters for one quality level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub name: PresetName,
    /// Constant rate factor (0-51, lower = better quality)
    pub crf: u8,
    pub speed: SpeedTier,
    /// Fraction in (0, 1] applied to each spatial dimension
    pub scale_factor: f64,
}

impl QualityPreset {
    /// Default parameters of a named preset
    pub fn of(name: PresetName) -> Self {
        let (crf, speed, scale_factor) = match name {
            PresetName::UltraLow => (35, SpeedTier::Fast, 0.5),
            PresetName::Low => (28, SpeedTier::Medium, 0.7),
            PresetName::Medium => (23, SpeedTier::Medium, 1.0),
            PresetName::High => (18, SpeedTier::Slow, 1.0),
            PresetName::Lossless => (0, SpeedTier::Veryslow, 1.0),
        };

        Self {
            name,
            crf,
            speed,
            scale_factor,
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.crf == 0
    }

    /// Whether the scale filter has to be applied
    pub fn scales(&self) -> bool {
        self.scale_factor < 1.0
    }

    /// Derive a new preset with the given overrides applied
    pub fn with_overrides(&self, overrides: &PresetOverrides) -> Result<Self> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }
        overrides.validate()?;

        Ok(Self {
            name: self.name,
            crf: overrides.crf.unwrap_or(self.crf),
            speed: overrides.speed.unwrap_or(self.speed),
            scale_factor: overrides.scale_factor.unwrap_or(self.scale_factor),
        })
    }
}

/// Per-field substitutions applied on top of a named preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetOverrides {
    /// CRF in 0..=51
    pub crf: Option<u8>,
    pub speed: Option<SpeedTier>,
    /// Scale in (0, 1]
    pub scale_factor: Option<f64>,
}

impl PresetOverrides {
    pub fn is_empty(&self) -> bool {
        self.crf.is_none() && self.speed.is_none() && self.scale_factor.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(crf) = self.crf {
            if crf > MAX_CRF {
                return Err(CompressError::InvalidOverride(format!(
                    "crf must be between 0 and {}, got {}",
                    MAX_CRF, crf
                )));
            }
        }

        if let Some(scale) = self.scale_factor {
            if !(scale > 0.0 && scale <= 1.0) {
                return Err(CompressError::InvalidOverride(format!(
                    "scale factor must be in (0, 1], got {}",
                    scale
                )));
            }
        }

        Ok(())
    }
}

/// Resolve a preset by name
pub fn resolve(name: &str) -> Result<QualityPreset> {
    Ok(QualityPreset::of(name.parse()?))
}

/// Resolve a preset by name and apply overrides
pub fn resolve_with(name: &str, overrides: &PresetOverrides) -> Result<QualityPreset> {
    resolve(name)?.with_overrides(overrides)
}
