//! Falling petal simulation
//!
//! A fixed pool of petals, stepped at 60 Hz. Petals that drop below the
//! visible area are recycled to a spawn line above it. A bounded effect stops
//! after its frame budget; an ambient one runs until stopped.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::{FRAME_MS, MAX_SUBSTEPS, SPAWN_MARGIN};

/// Inclusive-exclusive range sampled uniformly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: f32) -> Self {
        Self::new(value, value)
    }

    /// Uniform sample (a degenerate span always yields `min`)
    #[inline]
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        self.min + rng.random::<f32>() * (self.max - self.min)
    }
}

/// Petal outline: an elongated body plus a lighter highlight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PetalShape {
    /// Body ellipse radii, in multiples of petal size
    pub body: Vec2,
    /// Highlight center offset, in multiples of petal size
    pub highlight_offset: Vec2,
    pub highlight_radii: Vec2,
    /// Highlight rotation relative to the petal (radians)
    pub highlight_rotation: f32,
    /// White highlight alpha
    pub highlight_alpha: f32,
}

/// Where the initial pool is placed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpawnStrategy {
    /// Every petal starts on the spawn line above the top edge
    FromTop,
    /// Petals start scattered over the top `fraction` of the height
    Scattered { fraction: f32 },
}

/// Everything needed to start one petal effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleConfig {
    pub count: usize,
    pub palette: Vec<String>,
    pub size: Span,
    /// Horizontal drift per frame
    pub speed_x: Span,
    /// Fall speed per frame
    pub speed_y: Span,
    /// Degrees per frame
    pub rotation_speed: Span,
    /// Radians per frame
    pub wobble_speed: Span,
    /// Lateral sway added per frame at the wobble peak
    pub wobble_amplitude: f32,
    pub opacity: Span,
    pub shape: PetalShape,
    pub spawn: SpawnStrategy,
    /// Frames before a bounded effect ends (`None` runs until stopped)
    pub frame_budget: Option<u32>,
}

impl ParticleConfig {
    /// Celebration burst when the heart fills
    pub fn burst() -> Self {
        Self {
            count: 60,
            palette: ["#8b2942", "#c9a0a0", "#d4a5a5", "#9e3a50", "#d4627a", "#f5c6d0"]
                .map(String::from)
                .to_vec(),
            size: Span::new(6.0, 18.0),
            speed_x: Span::new(-1.0, 1.0),
            speed_y: Span::new(1.0, 3.0),
            rotation_speed: Span::new(-2.0, 2.0),
            wobble_speed: Span::new(0.02, 0.07),
            wobble_amplitude: 0.5,
            opacity: Span::fixed(0.8),
            shape: PetalShape {
                body: Vec2::new(0.5, 1.0),
                highlight_offset: Vec2::new(-0.2, -0.3),
                highlight_radii: Vec2::new(0.15, 0.3),
                highlight_rotation: 0.0,
                highlight_alpha: 0.3,
            },
            spawn: SpawnStrategy::Scattered { fraction: 0.5 },
            frame_budget: Some(180),
        }
    }

    /// Endless petal fall behind the confirmation
    pub fn ambient() -> Self {
        Self {
            count: 50,
            palette: [
                "#6b1c2a", "#8b2942", "#c9a0a0", "#d4a5a5", "#9e3a50", "#d4627a", "#f5c6d0",
            ]
            .map(String::from)
            .to_vec(),
            size: Span::new(8.0, 22.0),
            speed_x: Span::new(-0.5, 0.5),
            speed_y: Span::new(0.5, 2.0),
            rotation_speed: Span::new(-1.0, 1.0),
            wobble_speed: Span::new(0.01, 0.04),
            wobble_amplitude: 0.8,
            opacity: Span::new(0.5, 0.9),
            shape: PetalShape {
                body: Vec2::new(0.4, 1.0),
                highlight_offset: Vec2::new(-0.15, -0.4),
                highlight_radii: Vec2::new(0.12, 0.25),
                highlight_rotation: -0.3,
                highlight_alpha: 0.25,
            },
            spawn: SpawnStrategy::Scattered { fraction: 1.0 },
            frame_budget: None,
        }
    }

    /// Scale the pool size (quality presets)
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.count = (self.count as f32 * scale).round() as usize;
        self
    }
}

/// One falling petal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    /// Per-frame drift (x) and fall (y)
    pub speed: Vec2,
    /// Degrees
    pub rotation: f32,
    pub rotation_speed: f32,
    pub wobble: f32,
    pub wobble_speed: f32,
    pub size: f32,
    /// Palette index
    pub color: u8,
    pub opacity: f32,
}

impl Particle {
    /// Fresh petal on the spawn line
    pub fn spawn<R: Rng>(config: &ParticleConfig, bounds: Vec2, rng: &mut R) -> Self {
        let colors = config.palette.len().max(1);
        Self {
            pos: Vec2::new(rng.random::<f32>() * bounds.x, -SPAWN_MARGIN),
            speed: Vec2::new(config.speed_x.sample(rng), config.speed_y.sample(rng)),
            rotation: rng.random::<f32>() * 360.0,
            rotation_speed: config.rotation_speed.sample(rng),
            wobble: rng.random::<f32>() * std::f32::consts::TAU,
            wobble_speed: config.wobble_speed.sample(rng),
            size: config.size.sample(rng),
            color: rng.random_range(0..colors) as u8,
            opacity: config.opacity.sample(rng),
        }
    }
}

/// Advance one petal by one frame
#[inline]
pub fn update_particle(p: &mut Particle, amplitude: f32) {
    p.pos.y += p.speed.y;
    p.wobble += p.wobble_speed;
    p.pos.x += p.speed.x + p.wobble.sin() * amplitude;
    p.rotation += p.rotation_speed;
}

/// Whether a petal has left the visible area
#[inline]
pub fn is_below(p: &Particle, height: f32) -> bool {
    p.pos.y > height + SPAWN_MARGIN
}

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing to draw
    Idle,
    Running { frames: u32 },
    /// Bounded effect over; positions frozen while the layer fades
    Fading,
}

/// Identifies one started animation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopHandle(u32);

/// Result of advancing the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Not running, nothing moved
    Idle,
    Advanced { frames: u32 },
    /// The frame budget ran out during this advance
    BudgetExhausted,
}

/// Petal pool plus its animation loop
#[derive(Debug, Clone)]
pub struct ParticleEngine {
    config: ParticleConfig,
    bounds: Vec2,
    particles: Vec<Particle>,
    state: EngineState,
    handle: Option<LoopHandle>,
    next_handle: u32,
    accumulator: f64,
    rng: Pcg32,
}

impl ParticleEngine {
    pub fn new(config: ParticleConfig, seed: u64) -> Self {
        Self {
            config,
            bounds: Vec2::ZERO,
            particles: Vec::new(),
            state: EngineState::Idle,
            handle: None,
            next_handle: 1,
            accumulator: 0.0,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn handle(&self) -> Option<LoopHandle> {
        self.handle
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, EngineState::Running { .. })
    }

    /// Fill the pool and start the loop. A running loop is cancelled and
    /// replaced, never stacked.
    pub fn start(&mut self, bounds: Vec2) -> LoopHandle {
        if let Some(old) = self.handle.take() {
            log::debug!("Replacing petal loop {:?}", old);
        }

        self.bounds = bounds;
        self.accumulator = 0.0;
        let count = self.config.count;
        let mut particles = Vec::with_capacity(count);
        for _ in 0..count {
            let mut p = Particle::spawn(&self.config, bounds, &mut self.rng);
            if let SpawnStrategy::Scattered { fraction } = self.config.spawn {
                p.pos.y = self.rng.random::<f32>() * bounds.y * fraction;
            }
            particles.push(p);
        }
        self.particles = particles;
        self.state = EngineState::Running { frames: 0 };

        let handle = LoopHandle(self.next_handle);
        self.next_handle += 1;
        self.handle = Some(handle);
        log::info!("Petal loop {:?} started with {} petals", handle, count);
        handle
    }

    /// Cancel the loop and drop the pool
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::info!("Petal loop {:?} stopped", handle);
        }
        self.particles.clear();
        self.state = EngineState::Idle;
        self.accumulator = 0.0;
    }

    /// Track a new drawing surface size without touching the petals
    pub fn resize(&mut self, bounds: Vec2) {
        self.bounds = bounds;
    }

    /// Run one simulation frame
    pub fn step(&mut self) -> StepOutcome {
        let EngineState::Running { frames } = self.state else {
            return StepOutcome::Idle;
        };

        let amplitude = self.config.wobble_amplitude;
        for p in &mut self.particles {
            update_particle(p, amplitude);
            if is_below(p, self.bounds.y) {
                *p = Particle::spawn(&self.config, self.bounds, &mut self.rng);
            }
        }

        let frames = frames + 1;
        match self.config.frame_budget {
            Some(budget) if frames >= budget => {
                self.state = EngineState::Fading;
                self.handle = None;
                self.accumulator = 0.0;
                log::debug!("Petal budget of {} frames spent", budget);
                StepOutcome::BudgetExhausted
            }
            _ => {
                self.state = EngineState::Running { frames };
                StepOutcome::Advanced { frames }
            }
        }
    }

    /// Advance by `dt_ms` of wall time in fixed 60 Hz steps
    pub fn advance(&mut self, dt_ms: f64) -> StepOutcome {
        if !self.is_running() {
            return StepOutcome::Idle;
        }
        self.accumulator += dt_ms;

        let mut outcome = StepOutcome::Idle;
        let mut substeps = 0;
        while self.accumulator >= FRAME_MS && substeps < MAX_SUBSTEPS {
            self.accumulator -= FRAME_MS;
            substeps += 1;
            outcome = self.step();
            if outcome == StepOutcome::BudgetExhausted {
                break;
            }
        }
        // Drop backlog we refused to simulate
        if substeps == MAX_SUBSTEPS {
            self.accumulator = self.accumulator.min(FRAME_MS);
        }
        outcome
    }

    /// Fade finished: clear the pool and go idle
    pub fn finish_fade(&mut self) {
        if self.state == EngineState::Fading {
            self.particles.clear();
            self.state = EngineState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BOUNDS: Vec2 = Vec2::new(400.0, 800.0);

    #[test]
    fn test_start_fills_pool() {
        let mut engine = ParticleEngine::new(ParticleConfig::burst(), 1);
        engine.start(BOUNDS);
        assert_eq!(engine.particles().len(), 60);
        assert!(engine.is_running());
        for p in engine.particles() {
            assert!(p.pos.x >= 0.0 && p.pos.x < BOUNDS.x);
            // Burst scatters over the top half
            assert!(p.pos.y >= 0.0 && p.pos.y < BOUNDS.y * 0.5);
            assert!((6.0..18.0).contains(&p.size));
            assert_eq!(p.opacity, 0.8);
        }
    }

    #[test]
    fn test_from_top_spawns_on_line() {
        let mut config = ParticleConfig::ambient();
        config.spawn = SpawnStrategy::FromTop;
        let mut engine = ParticleEngine::new(config, 2);
        engine.start(BOUNDS);
        assert!(engine.particles().iter().all(|p| p.pos.y == -SPAWN_MARGIN));
    }

    #[test]
    fn test_update_physics() {
        let mut p = Particle {
            pos: Vec2::new(100.0, 50.0),
            speed: Vec2::new(0.5, 2.0),
            rotation: 10.0,
            rotation_speed: 1.5,
            wobble: 0.0,
            wobble_speed: 0.1,
            size: 10.0,
            color: 0,
            opacity: 1.0,
        };
        update_particle(&mut p, 0.8);
        assert_eq!(p.pos.y, 52.0);
        assert!((p.wobble - 0.1).abs() < 1e-6);
        let expected_x = 100.0 + 0.5 + 0.1f32.sin() * 0.8;
        assert!((p.pos.x - expected_x).abs() < 1e-4);
        assert_eq!(p.rotation, 11.5);
    }

    #[test]
    fn test_bounded_effect_freezes_after_budget() {
        let mut engine = ParticleEngine::new(ParticleConfig::burst(), 3);
        engine.start(BOUNDS);

        for frame in 1..180 {
            assert_eq!(engine.step(), StepOutcome::Advanced { frames: frame });
        }
        assert_eq!(engine.step(), StepOutcome::BudgetExhausted);
        assert_eq!(engine.state(), EngineState::Fading);
        assert_eq!(engine.handle(), None);

        let frozen = engine.particles().to_vec();
        for _ in 0..10 {
            assert_eq!(engine.step(), StepOutcome::Idle);
        }
        assert_eq!(engine.advance(1000.0), StepOutcome::Idle);
        assert_eq!(engine.particles(), frozen.as_slice());

        engine.finish_fade();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.particles().is_empty());
    }

    #[test]
    fn test_restart_replaces_loop() {
        let mut engine = ParticleEngine::new(ParticleConfig::ambient(), 4);
        let first = engine.start(BOUNDS);
        let second = engine.start(BOUNDS);
        assert_ne!(first, second);
        assert_eq!(engine.handle(), Some(second));
        assert_eq!(engine.particles().len(), 50);
    }

    #[test]
    fn test_stop_cancels_loop() {
        let mut engine = ParticleEngine::new(ParticleConfig::ambient(), 5);
        engine.start(BOUNDS);
        engine.stop();
        assert_eq!(engine.handle(), None);
        assert_eq!(engine.step(), StepOutcome::Idle);
        assert!(engine.particles().is_empty());
    }

    #[test]
    fn test_resize_preserves_positions() {
        let mut engine = ParticleEngine::new(ParticleConfig::ambient(), 6);
        engine.start(BOUNDS);
        engine.step();
        let before = engine.particles().to_vec();
        engine.resize(Vec2::new(1200.0, 900.0));
        assert_eq!(engine.particles(), before.as_slice());
        assert_eq!(engine.bounds(), Vec2::new(1200.0, 900.0));
        assert!(engine.is_running());
    }

    #[test]
    fn test_advance_uses_fixed_steps() {
        let mut engine = ParticleEngine::new(ParticleConfig::ambient(), 7);
        engine.start(BOUNDS);
        assert_eq!(engine.advance(FRAME_MS * 0.5), StepOutcome::Idle);
        assert_eq!(engine.advance(FRAME_MS * 0.6), StepOutcome::Advanced { frames: 1 });
        assert_eq!(engine.advance(FRAME_MS * 3.0), StepOutcome::Advanced { frames: 4 });
        // Substeps are capped
        assert_eq!(
            engine.advance(FRAME_MS * 100.0),
            StepOutcome::Advanced {
                frames: 4 + MAX_SUBSTEPS
            }
        );
    }

    #[test]
    fn test_quality_scale() {
        assert_eq!(ParticleConfig::burst().with_scale(0.5).count, 30);
        assert_eq!(ParticleConfig::ambient().with_scale(1.5).count, 75);
    }

    proptest! {
        #[test]
        fn prop_fallen_petals_recycle_to_spawn_line(seed in any::<u64>(), y in 831.0f32..2000.0) {
            let mut engine = ParticleEngine::new(ParticleConfig::ambient(), seed);
            engine.start(BOUNDS);
            engine.particles[0].pos.y = y;
            engine.step();
            let p = &engine.particles()[0];
            prop_assert_eq!(p.pos.y, -SPAWN_MARGIN);
            prop_assert!(p.pos.x >= 0.0 && p.pos.x < BOUNDS.x);
        }
    }
}
