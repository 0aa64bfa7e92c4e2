//! Petal drawing

use glam::Vec2;

use super::Surface2d;
use crate::platform::PlatformError;
use crate::sim::particles::{Particle, ParticleConfig, ParticleEngine};

fn highlight_color(alpha: f32) -> String {
    format!("rgba(255, 255, 255, {})", alpha)
}

fn paint<S: Surface2d>(
    surface: &mut S,
    petal: &Particle,
    config: &ParticleConfig,
    color: &str,
) -> Result<(), PlatformError> {
    let shape = &config.shape;
    surface.translate(petal.pos)?;
    surface.rotate(petal.rotation.to_radians())?;
    surface.set_alpha(petal.opacity);
    surface.fill_ellipse(Vec2::ZERO, shape.body * petal.size, 0.0, color)?;
    surface.fill_ellipse(
        shape.highlight_offset * petal.size,
        shape.highlight_radii * petal.size,
        shape.highlight_rotation,
        &highlight_color(shape.highlight_alpha),
    )
}

/// Draw one petal: the body ellipse plus its highlight, in the petal's frame
pub fn draw_petal<S: Surface2d>(
    surface: &mut S,
    petal: &Particle,
    config: &ParticleConfig,
) -> Result<(), PlatformError> {
    let color = config
        .palette
        .get(petal.color as usize % config.palette.len().max(1))
        .map(String::as_str)
        .unwrap_or("#d4627a");

    surface.save();
    let drawn = paint(surface, petal, config, color);
    // The transform is popped even after a failed draw
    surface.restore();
    drawn
}

/// Clear the layer and draw every live petal of `engine`
pub fn draw_layer<S: Surface2d>(
    surface: &mut S,
    engine: &ParticleEngine,
) -> Result<(), PlatformError> {
    surface.clear(engine.bounds());
    for petal in engine.particles() {
        draw_petal(surface, petal, engine.config())?;
    }
    Ok(())
}
