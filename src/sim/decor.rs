//! Decoration triggers: stickers and staggered reveals
//!
//! Fire-and-forget cosmetics with no state machine of their own.

use glam::Vec2;
use rand::Rng;

use super::scene::{Effect, Effects, Sticker};
use crate::Viewport;
use crate::consts::{DECOR_MS, DECOR_STAGGER_MS, PHOTO_STAGGER_MS};

/// Sticker images cycled by evade taps
pub const STICKER_IMAGES: [&str; 4] = [
    "images/tolog.png",
    "images/galet.png",
    "images/dino.png",
    "images/zombie.png",
];

/// Distance kept between stickers and the viewport edge
pub const STICKER_PADDING: f32 = 60.0;

/// Stickers placed during the invitation
#[derive(Debug, Clone, Default)]
pub struct StickerBoard {
    placed: usize,
}

impl StickerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placed(&self) -> usize {
        self.placed
    }

    /// Place the next sticker at a random spot with a slight tilt
    pub fn place<R: Rng>(&mut self, viewport: Viewport, rng: &mut R, fx: &mut Effects) -> Sticker {
        let span = viewport.size() - Vec2::splat(STICKER_PADDING * 2.0);
        let sticker = Sticker {
            image: STICKER_IMAGES[self.placed % STICKER_IMAGES.len()],
            pos: Vec2::new(
                rng.random::<f32>() * span.x + STICKER_PADDING,
                rng.random::<f32>() * span.y + STICKER_PADDING,
            ),
            rotation_deg: (rng.random::<f32>() - 0.5) * 40.0,
        };
        self.placed += 1;
        fx.push(Effect::Sticker(sticker.clone()));
        sticker
    }

    pub fn clear(&mut self, fx: &mut Effects) {
        self.placed = 0;
        fx.push(Effect::ClearStickers);
    }
}

/// Delay of photo `index` after the strip appears
pub fn photo_delay(index: usize) -> f64 {
    index as f64 * PHOTO_STAGGER_MS
}

/// Delay of confirmation decor element `index` after scene entry
pub fn decor_delay(index: usize) -> f64 {
    DECOR_MS + index as f64 * DECOR_STAGGER_MS
}

/// CSS animation delay (seconds) of corner decoration `index`
pub fn corner_delay(index: usize) -> f32 {
    0.3 + index as f32 * 0.1
}
