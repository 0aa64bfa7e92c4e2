//! Invitation scene: the "no" button runs away, the "yes" button grows
//!
//! Everything about the escalation is a pure function of the attempt count,
//! which only ever goes up.

use glam::Vec2;
use rand::Rng;

use super::scene::{AcceptSize, Effect, Effects, Entity, Flag};
use crate::{Viewport, lerp};

/// Escalation tuning
#[derive(Debug, Clone, Copy)]
pub struct ChaseTuning {
    /// Margin kept between the evade button and the container edge
    pub padding: f32,
    /// Samples closer than this to the container center are retried
    pub avoid_radius: f32,
    /// Samples drawn before the last one is accepted regardless
    pub max_tries: u32,
    /// Evade scale lost per attempt
    pub shrink_step: f32,
    pub min_scale: f32,
    /// Last attempt of the in-place growth phase
    pub grow_until: u32,
    /// First attempt at which the evade button gives up
    pub surrender_at: u32,
}

impl Default for ChaseTuning {
    fn default() -> Self {
        Self {
            padding: 40.0,
            avoid_radius: 180.0,
            max_tries: 20,
            shrink_step: 0.1,
            min_scale: 0.4,
            grow_until: 5,
            surrender_at: 9,
        }
    }
}

/// Discrete escalation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChasePhase {
    /// No attempts yet
    Calm,
    /// Accept grows in place
    Growing,
    /// Accept interpolates toward a viewport-relative box
    Expanding,
    /// Evade fades away, accept fills the screen
    Surrender,
}

impl ChaseTuning {
    pub fn phase(&self, attempts: u32) -> ChasePhase {
        if attempts == 0 {
            ChasePhase::Calm
        } else if attempts <= self.grow_until {
            ChasePhase::Growing
        } else if attempts < self.surrender_at {
            ChasePhase::Expanding
        } else {
            ChasePhase::Surrender
        }
    }

    /// Evade button scale after `attempts` escapes
    pub fn evade_scale(&self, attempts: u32) -> f32 {
        (1.0 - attempts as f32 * self.shrink_step).max(self.min_scale)
    }

    /// Accept button size after `attempts` escapes (`None` once it goes fullscreen)
    pub fn accept_size(&self, attempts: u32, viewport: Viewport) -> Option<AcceptSize> {
        match self.phase(attempts) {
            ChasePhase::Calm => Some(AcceptSize::Natural),
            ChasePhase::Growing => {
                let n = attempts as f32;
                Some(AcceptSize::Padded {
                    padding_rem: 1.0 + n * 0.25,
                    font_rem: 1.0 + n * 0.08,
                })
            }
            ChasePhase::Expanding => {
                let span = (self.surrender_at - self.grow_until) as f32;
                let progress = (attempts - self.grow_until) as f32 / span;
                let max_width = (viewport.width * 0.8).min(400.0);
                Some(AcceptSize::Boxed {
                    width_px: lerp(180.0, max_width, progress),
                    height_px: lerp(60.0, 100.0, progress),
                    font_rem: 1.3 + progress * 0.3,
                })
            }
            ChasePhase::Surrender => None,
        }
    }
}

/// One relocation result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relocation {
    /// Top-left corner within the container
    pub pos: Vec2,
    pub tries: u32,
    /// Retry budget ran out; the sample may sit inside the avoided zone
    pub exhausted: bool,
}

/// Random top-left position for a `footprint`-sized button inside
/// `container`, away from the container center.
///
/// Samples are retried while the button center falls within
/// `avoid_radius` of the container center. After `max_tries` the last sample
/// is taken as is (best effort), then clamped into bounds.
pub fn relocate_away_from_center<R: Rng>(
    container: Vec2,
    footprint: Vec2,
    tuning: &ChaseTuning,
    rng: &mut R,
) -> Relocation {
    let pad = tuning.padding;
    let center = container / 2.0;
    let span = container - footprint - Vec2::splat(pad * 2.0);

    let mut tries = 0;
    let (pos, exhausted) = loop {
        let pos = Vec2::new(
            rng.random::<f32>() * span.x + pad,
            rng.random::<f32>() * span.y + pad,
        );
        tries += 1;

        let dist = (pos + footprint / 2.0).distance(center);
        if dist > tuning.avoid_radius {
            break (pos, false);
        }
        if tries >= tuning.max_tries {
            break (pos, true);
        }
    };

    let max = container - footprint - Vec2::splat(pad);
    let pos = Vec2::new(pos.x.min(max.x).max(pad), pos.y.min(max.y).max(pad));

    Relocation {
        pos,
        tries,
        exhausted,
    }
}

/// Result of one chase input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChaseOutcome {
    Ignored,
    Escaped {
        attempts: u32,
        relocation: Relocation,
        surrendered: bool,
    },
    /// Accept tapped; fires once
    Accepted,
}

/// Escalating chase session
#[derive(Debug, Clone)]
pub struct Chase {
    tuning: ChaseTuning,
    attempts: u32,
    floating: bool,
    accepted: bool,
}

impl Chase {
    pub fn new(tuning: ChaseTuning) -> Self {
        Self {
            tuning,
            attempts: 0,
            floating: false,
            accepted: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn phase(&self) -> ChasePhase {
        self.tuning.phase(self.attempts)
    }

    pub fn tuning(&self) -> &ChaseTuning {
        &self.tuning
    }

    pub fn is_complete(&self) -> bool {
        self.accepted
    }

    /// Reset both buttons for a fresh session
    pub fn reset(&self, fx: &mut Effects) {
        fx.hide(Entity::InvitationTitle);
        for flag in [Flag::Visible, Flag::Growing, Flag::Fullscreen] {
            fx.flag(Entity::AcceptButton, flag, false);
        }
        fx.push(Effect::AcceptSize(AcceptSize::Natural));
        for flag in [Flag::Visible, Flag::Floating, Flag::Escaping] {
            fx.flag(Entity::EvadeButton, flag, false);
        }
        fx.push(Effect::Scale {
            entity: Entity::EvadeButton,
            scale: 1.0,
        });
        fx.push(Effect::Opacity {
            entity: Entity::EvadeButton,
            value: None,
        });
        fx.push(Effect::Interactive {
            entity: Entity::EvadeButton,
            on: true,
        });
        fx.push(Effect::Display {
            entity: Entity::EvadeButton,
            shown: true,
        });
    }

    /// Evade button tapped
    pub fn evade<R: Rng>(
        &mut self,
        viewport: Viewport,
        footprint: Vec2,
        rng: &mut R,
        fx: &mut Effects,
    ) -> ChaseOutcome {
        if self.accepted || self.phase() == ChasePhase::Surrender {
            return ChaseOutcome::Ignored;
        }

        fx.vibrate(&[15, 30, 15]);
        self.attempts += 1;
        let attempts = self.attempts;

        if !self.floating {
            self.floating = true;
            fx.flag(Entity::EvadeButton, Flag::Floating, true);
        }
        fx.flag(Entity::EvadeButton, Flag::Escaping, true);

        let relocation = relocate_away_from_center(viewport.size(), footprint, &self.tuning, rng);
        if relocation.exhausted {
            log::debug!("Evade relocation exhausted {} tries", relocation.tries);
        }
        fx.push(Effect::Place {
            entity: Entity::EvadeButton,
            pos: relocation.pos,
        });
        fx.push(Effect::Scale {
            entity: Entity::EvadeButton,
            scale: self.tuning.evade_scale(attempts),
        });
        fx.flag(Entity::AcceptButton, Flag::Growing, true);

        let surrendered = match self.tuning.accept_size(attempts, viewport) {
            Some(size) => {
                fx.push(Effect::AcceptSize(size));
                false
            }
            None => {
                fx.push(Effect::Opacity {
                    entity: Entity::EvadeButton,
                    value: Some(0.0),
                });
                fx.push(Effect::Interactive {
                    entity: Entity::EvadeButton,
                    on: false,
                });
                log::info!("Evade button gave up after {} attempts", attempts);
                true
            }
        };

        ChaseOutcome::Escaped {
            attempts,
            relocation,
            surrendered,
        }
    }

    /// Accept button tapped; never blocked by the chase
    pub fn accept(&mut self, fx: &mut Effects) -> ChaseOutcome {
        if self.accepted {
            return ChaseOutcome::Ignored;
        }
        self.accepted = true;
        fx.vibrate(&[20, 50, 20, 50, 20]);
        log::info!("Accepted after {} escape attempts", self.attempts);
        ChaseOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const FOOTPRINT: Vec2 = Vec2::new(120.0, 48.0);

    #[test]
    fn test_phase_thresholds() {
        let t = ChaseTuning::default();
        assert_eq!(t.phase(0), ChasePhase::Calm);
        assert_eq!(t.phase(1), ChasePhase::Growing);
        assert_eq!(t.phase(5), ChasePhase::Growing);
        assert_eq!(t.phase(6), ChasePhase::Expanding);
        assert_eq!(t.phase(8), ChasePhase::Expanding);
        assert_eq!(t.phase(9), ChasePhase::Surrender);
        assert_eq!(t.phase(40), ChasePhase::Surrender);
    }

    #[test]
    fn test_evade_scale_floor() {
        let t = ChaseTuning::default();
        assert!((t.evade_scale(1) - 0.9).abs() < 1e-6);
        assert!((t.evade_scale(6) - 0.4).abs() < 1e-6);
        assert_eq!(t.evade_scale(8), 0.4);
    }

    #[test]
    fn test_accept_size_phases() {
        let t = ChaseTuning::default();
        let vp = Viewport::new(390.0, 844.0);

        match t.accept_size(2, vp) {
            Some(AcceptSize::Padded {
                padding_rem,
                font_rem,
            }) => {
                assert!((padding_rem - 1.5).abs() < 1e-5);
                assert!((font_rem - 1.16).abs() < 1e-5);
            }
            other => panic!("expected padded size, got {:?}", other),
        }

        // 0.8 * 390 = 312 caps below 400
        match t.accept_size(7, vp) {
            Some(AcceptSize::Boxed {
                width_px,
                height_px,
                ..
            }) => {
                assert!((width_px - (180.0 + 132.0 * 0.5)).abs() < 1e-3);
                assert!((height_px - 80.0).abs() < 1e-3);
            }
            other => panic!("expected boxed size, got {:?}", other),
        }
        assert_eq!(t.accept_size(9, vp), None);
    }

    #[test]
    fn test_accept_at_any_attempt_count_once() {
        let mut rng = Pcg32::seed_from_u64(9);
        let vp = Viewport::default();
        for presses in 0..12 {
            let mut fx = Effects::new(true);
            let mut chase = Chase::new(ChaseTuning::default());
            for _ in 0..presses {
                chase.evade(vp, FOOTPRINT, &mut rng, &mut fx);
            }
            assert_eq!(chase.accept(&mut fx), ChaseOutcome::Accepted);
            assert_eq!(chase.accept(&mut fx), ChaseOutcome::Ignored);
        }
    }

    #[test]
    fn test_surrender_stops_escapes() {
        let mut rng = Pcg32::seed_from_u64(11);
        let mut fx = Effects::new(true);
        let mut chase = Chase::new(ChaseTuning::default());
        let vp = Viewport::default();

        let mut surrendered_at = None;
        for _ in 0..9 {
            if let ChaseOutcome::Escaped {
                attempts,
                surrendered: true,
                ..
            } = chase.evade(vp, FOOTPRINT, &mut rng, &mut fx)
            {
                surrendered_at = Some(attempts);
            }
        }
        assert_eq!(surrendered_at, Some(9));
        assert_eq!(chase.evade(vp, FOOTPRINT, &mut rng, &mut fx), ChaseOutcome::Ignored);
        assert_eq!(chase.attempts(), 9);
    }

    #[test]
    fn test_floating_flag_set_once() {
        let mut rng = Pcg32::seed_from_u64(12);
        let mut fx = Effects::new(false);
        let mut chase = Chase::new(ChaseTuning::default());
        chase.evade(Viewport::default(), FOOTPRINT, &mut rng, &mut fx);
        chase.evade(Viewport::default(), FOOTPRINT, &mut rng, &mut fx);
        let floating = fx
            .drain()
            .into_iter()
            .filter(|e| *e == Effect::flag(Entity::EvadeButton, Flag::Floating, true))
            .count();
        assert_eq!(floating, 1);
    }

    #[test]
    fn test_tiny_container_exhausts_and_clamps() {
        let mut rng = Pcg32::seed_from_u64(13);
        let tuning = ChaseTuning::default();
        // Nothing in a 300x300 box is more than 180px from its center
        let r = relocate_away_from_center(Vec2::new(300.0, 300.0), FOOTPRINT, &tuning, &mut rng);
        assert!(r.exhausted);
        assert_eq!(r.tries, tuning.max_tries);
        assert!(r.pos.x >= tuning.padding && r.pos.y >= tuning.padding);
    }

    proptest! {
        #[test]
        fn prop_accepted_samples_avoid_center(
            seed in any::<u64>(),
            w in 400.0f32..1600.0,
            h in 400.0f32..1600.0,
        ) {
            let tuning = ChaseTuning::default();
            let mut rng = Pcg32::seed_from_u64(seed);
            let container = Vec2::new(w, h);
            let r = relocate_away_from_center(container, FOOTPRINT, &tuning, &mut rng);
            if !r.exhausted {
                let dist = (r.pos + FOOTPRINT / 2.0).distance(container / 2.0);
                prop_assert!(dist > tuning.avoid_radius);
            }
            prop_assert!(r.pos.x >= tuning.padding);
            prop_assert!(r.pos.x <= w - FOOTPRINT.x - tuning.padding + 1e-3);
        }

        #[test]
        fn prop_attempts_never_decrease(taps in prop::collection::vec(any::<bool>(), 0..30), seed in any::<u64>()) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut fx = Effects::new(false);
            let mut chase = Chase::new(ChaseTuning::default());
            let mut last = 0;
            let mut last_phase = ChasePhase::Calm;
            for evade in taps {
                if evade {
                    chase.evade(Viewport::default(), FOOTPRINT, &mut rng, &mut fx);
                } else {
                    chase.accept(&mut fx);
                }
                prop_assert!(chase.attempts() >= last);
                prop_assert!(chase.phase() >= last_phase);
                last = chase.attempts();
                last_phase = chase.phase();
            }
        }
    }
}
