//! Boot scene: tap the heart until it fills

use glam::Vec2;
use rand::Rng;

use super::scene::{Effect, Effects, Entity, Flag};

/// Heart game state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartState {
    Filling { taps: u32 },
    Complete,
}

/// Result of feeding one tap to the heart
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeartOutcome {
    /// Already complete, nothing happened
    Ignored,
    Filled { taps: u32, progress: f32 },
    /// This tap filled the heart
    Completed,
}

/// Repeated-tap-to-fill mini-game
#[derive(Debug, Clone)]
pub struct HeartTap {
    total: u32,
    state: HeartState,
}

impl HeartTap {
    pub fn new(total: u32) -> Self {
        Self {
            total: total.max(1),
            state: HeartState::Filling { taps: 0 },
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn taps(&self) -> u32 {
        match self.state {
            HeartState::Filling { taps } => taps,
            HeartState::Complete => self.total,
        }
    }

    /// Fill fraction, `taps / total`
    pub fn progress(&self) -> f32 {
        self.taps() as f32 / self.total as f32
    }

    pub fn state(&self) -> HeartState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == HeartState::Complete
    }

    /// Reset visuals for a fresh session
    pub fn enter(&self, fx: &mut Effects) {
        fx.push(Effect::Text {
            entity: Entity::TapTotal,
            text: self.total.to_string(),
        });
        fx.push(Effect::Text {
            entity: Entity::TapCount,
            text: "0".into(),
        });
        fx.push(Effect::HeartFill(0.0));
        for flag in [Flag::Tapped, Flag::Filling, Flag::Complete] {
            fx.flag(Entity::HeartWrapper, flag, false);
        }
        fx.flag(Entity::HeartContainer, Flag::Transitioning, false);
    }

    /// Count one tap
    pub fn tap<R: Rng>(&mut self, rng: &mut R, fx: &mut Effects) -> HeartOutcome {
        let HeartState::Filling { taps } = self.state else {
            return HeartOutcome::Ignored;
        };

        let taps = taps + 1;
        let progress = taps as f32 / self.total as f32;

        fx.vibrate(&[15]);
        fx.push(Effect::Text {
            entity: Entity::TapCount,
            text: taps.to_string(),
        });
        fx.push(Effect::HeartFill(progress));
        fx.push(Effect::Restart {
            entity: Entity::HeartPulseRing,
            flag: Flag::Pulse,
        });
        fx.push(Effect::Restart {
            entity: Entity::HeartWrapper,
            flag: Flag::Tapped,
        });
        fx.flag(Entity::HeartWrapper, Flag::Filling, true);
        fx.push(Effect::Sparkle(sparkle_point(rng)));

        if taps >= self.total {
            self.state = HeartState::Complete;
            fx.flag(Entity::HeartWrapper, Flag::Complete, true);
            log::info!("Heart filled after {} taps", taps);
            HeartOutcome::Completed
        } else {
            self.state = HeartState::Filling { taps };
            log::debug!("Heart tap {}/{}", taps, self.total);
            HeartOutcome::Filled { taps, progress }
        }
    }
}

/// Random sparkle position inside the heart's 100x100 view box
pub fn sparkle_point<R: Rng>(rng: &mut R) -> Vec2 {
    Vec2::new(
        20.0 + rng.random::<f32>() * 60.0,
        20.0 + rng.random::<f32>() * 50.0,
    )
}
