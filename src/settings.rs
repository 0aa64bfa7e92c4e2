//! Experience settings
//!
//! Read from an inline JSON block on the page. Nothing is persisted: every
//! visit starts from the page's settings (or the defaults).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{HEART_TAP_TOTAL, MUSIC_VOLUME};
use crate::platform::PlatformError;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    /// Petal pool multiplier for this preset
    pub fn petal_scale(&self) -> f32 {
        match self {
            QualityPreset::Low => 0.5,
            QualityPreset::Medium => 1.0,
            QualityPreset::High => 1.5,
        }
    }
}

/// Experience settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset
    pub quality: QualityPreset,
    /// Petal effects (burst and ambient)
    pub petals: bool,
    /// Vibration feedback on taps
    pub haptics: bool,
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
    /// Taps needed to fill the heart
    pub heart_taps: u32,
    /// Evade button size used for relocation until the page measures it
    pub evade_footprint: Vec2,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            petals: true,
            haptics: true,
            music_volume: MUSIC_VOLUME,
            heart_taps: HEART_TAP_TOTAL,
            evade_footprint: Vec2::new(120.0, 48.0),
        }
    }
}

impl Settings {
    /// Element id of the inline settings block
    pub const ELEMENT_ID: &'static str = "petal-settings";

    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Parse settings JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, PlatformError> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.music_volume = settings.music_volume.clamp(0.0, 1.0);
        settings.heart_taps = settings.heart_taps.max(1);
        Ok(settings)
    }

    /// Effective petal pool multiplier
    pub fn petal_scale(&self) -> f32 {
        if !self.petals {
            0.0
        } else {
            self.quality.petal_scale()
        }
    }

    /// Load settings from the page (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let json = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(Self::ELEMENT_ID))
            .and_then(|el| el.text_content());

        match json.map(|j| Self::from_json(&j)) {
            Some(Ok(settings)) => {
                log::info!("Loaded settings ({} quality)", settings.quality.as_str());
                settings
            }
            Some(Err(e)) => {
                log::warn!("Ignoring settings block: {}", e);
                Self::default()
            }
            None => {
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Native stub
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }
}
