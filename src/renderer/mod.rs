//! Canvas 2D rendering module
//!
//! Petals are drawn as two filled ellipses each. Drawing goes through the
//! [`Surface2d`] trait so the layout math is testable without a browser.

pub mod petals;

#[cfg(target_arch = "wasm32")]
pub mod canvas;

use glam::Vec2;

use crate::platform::PlatformError;

/// Minimal immediate-mode 2D surface
pub trait Surface2d {
    /// Clear a `size` rectangle from the origin
    fn clear(&mut self, size: Vec2);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, offset: Vec2) -> Result<(), PlatformError>;
    fn rotate(&mut self, radians: f32) -> Result<(), PlatformError>;
    fn set_alpha(&mut self, alpha: f32);
    /// Fill an ellipse rotated by `rotation` radians about its center
    fn fill_ellipse(
        &mut self,
        center: Vec2,
        radii: Vec2,
        rotation: f32,
        color: &str,
    ) -> Result<(), PlatformError>;
}

pub use petals::{draw_layer, draw_petal};

#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasSurface;
