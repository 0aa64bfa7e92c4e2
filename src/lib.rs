//! Petal Post - a tap-driven valentine in five scenes
//!
//! Core modules:
//! - `sim`: Deterministic scene flow (choreography, mini-games, petal physics)
//! - `renderer`: Canvas 2D petal drawing
//! - `platform`: Browser/native platform abstraction
//! - `audio`: Background music state and playback
//! - `settings`: Inline JSON configuration

pub mod audio;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use platform::PlatformError;
pub use settings::{QualityPreset, Settings};

use glam::Vec2;

/// Timing and layout constants
pub mod consts {
    /// Fixed particle timestep (60 Hz, petal speeds are tuned per frame)
    pub const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Maximum particle substeps per host frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Outgoing scene keeps its exit class this long
    pub const EXIT_MS: f64 = 600.0;
    /// Delay before the incoming scene is activated
    pub const ENTER_DELAY_MS: f64 = 500.0;
    /// Incoming scene keeps its enter class this long
    pub const ENTER_MS: f64 = 800.0;

    /// Heart taps needed on the boot scene
    pub const HEART_TAP_TOTAL: u32 = 10;
    /// Music starts this long after the heart fills
    pub const MUSIC_DELAY_MS: f64 = 300.0;
    /// Boot hands over to the letter this long after the heart fills
    pub const BOOT_SETTLE_MS: f64 = 1200.0;

    /// Envelope hint appears
    pub const ENVELOPE_HINT_MS: f64 = 500.0;
    /// Photo frames start appearing
    pub const PHOTOS_MS: f64 = 800.0;
    /// Stagger between photo frames
    pub const PHOTO_STAGGER_MS: f64 = 300.0;
    /// Envelope flap animation before the letter expands
    pub const FLAP_MS: f64 = 800.0;
    /// Letter expansion before the first paragraph shows
    pub const EXPAND_MS: f64 = 600.0;
    /// Document-wide tap listener is attached this long after entering the letter
    pub const DOCUMENT_TAP_MS: f64 = 1500.0;
    /// Pause between the last letter tap and the transition
    pub const LETTER_EXIT_MS: f64 = 400.0;

    /// First message line appears
    pub const FIRST_LINE_MS: f64 = 600.0;
    /// Message hint appears (and taps are armed) after the first line
    pub const MESSAGE_HINT_MS: f64 = 400.0;

    /// Invitation title, accept and evade buttons appear in sequence
    pub const TITLE_MS: f64 = 400.0;
    pub const ACCEPT_MS: f64 = 600.0;
    pub const EVADE_MS: f64 = 200.0;
    /// Evade wobble animation length
    pub const ESCAPING_MS: f64 = 400.0;
    /// Accept grow pulse length
    pub const GROWING_MS: f64 = 500.0;
    /// Delay between the evade button fading and the accept button filling the screen
    pub const FULLSCREEN_MS: f64 = 300.0;

    /// Confirmation decorations
    pub const YES_STICKER_MS: f64 = 400.0;
    pub const AMBIENT_MS: f64 = 500.0;
    pub const DECOR_MS: f64 = 600.0;
    pub const DECOR_STAGGER_MS: f64 = 200.0;

    /// Petal layer fade after a bounded effect ends
    pub const PETAL_FADE_MS: f64 = 500.0;
    /// Petals respawn this far above the top edge and recycle this far below the bottom
    pub const SPAWN_MARGIN: f32 = 30.0;

    /// Default music volume
    pub const MUSIC_VOLUME: f32 = 0.3;
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.size() / 2.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(390.0, 844.0)
    }
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
