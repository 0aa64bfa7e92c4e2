//! `CanvasRenderingContext2d` surface

use std::f64::consts::TAU;

use glam::Vec2;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement};

use super::Surface2d;
use crate::platform::PlatformError;

/// One full-screen petal canvas
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// Look up canvas `id` and grab its 2D context
    pub fn from_id(document: &Document, id: &'static str) -> Result<Self, PlatformError> {
        let canvas = document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
            .ok_or(PlatformError::MissingElement(id))?;
        let ctx = canvas
            .get_context("2d")
            .map_err(PlatformError::from_js)?
            .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or(PlatformError::Unsupported("canvas 2d"))?;
        Ok(Self { canvas, ctx })
    }

    /// Match the backing store to the viewport (CSS pixels)
    pub fn resize(&self, size: Vec2) {
        self.canvas.set_width(size.x.max(1.0) as u32);
        self.canvas.set_height(size.y.max(1.0) as u32);
    }
}

impl Surface2d for CanvasSurface {
    fn clear(&mut self, size: Vec2) {
        self.ctx.set_global_alpha(1.0);
        self.ctx.clear_rect(0.0, 0.0, size.x as f64, size.y as f64);
    }

    fn save(&mut self) {
        self.ctx.save();
    }

    fn restore(&mut self) {
        self.ctx.restore();
    }

    fn translate(&mut self, offset: Vec2) -> Result<(), PlatformError> {
        self.ctx
            .translate(offset.x as f64, offset.y as f64)
            .map_err(PlatformError::from_js)
    }

    fn rotate(&mut self, radians: f32) -> Result<(), PlatformError> {
        self.ctx
            .rotate(radians as f64)
            .map_err(PlatformError::from_js)
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.ctx.set_global_alpha(alpha as f64);
    }

    fn fill_ellipse(
        &mut self,
        center: Vec2,
        radii: Vec2,
        rotation: f32,
        color: &str,
    ) -> Result<(), PlatformError> {
        self.ctx.set_fill_style_str(color);
        self.ctx.begin_path();
        self.ctx
            .ellipse(
                center.x as f64,
                center.y as f64,
                radii.x as f64,
                radii.y as f64,
                rotation as f64,
                0.0,
                TAU,
            )
            .map_err(PlatformError::from_js)?;
        self.ctx.fill();
        Ok(())
    }
}
