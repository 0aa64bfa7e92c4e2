//! Deterministic scene simulation
//!
//! All interaction logic lives here. This module must be pure and deterministic:
//! - Time only arrives through `update(now)` and tap timestamps
//! - Seeded RNG only
//! - Output is a queue of [`Effect`]s, never direct DOM access
//! - No rendering or platform dependencies

pub mod chase;
pub mod decor;
pub mod flow;
pub mod heart;
pub mod input;
pub mod particles;
pub mod reveal;
pub mod scene;
pub mod schedule;

pub use chase::{Chase, ChaseOutcome, ChasePhase, ChaseTuning, relocate_away_from_center};
pub use decor::StickerBoard;
pub use flow::{FlowController, FlowPhase, SceneContent, Session};
pub use heart::{HeartOutcome, HeartTap};
pub use input::{Listeners, Tap, TapGate, TapSource};
pub use particles::{EngineState, Particle, ParticleConfig, ParticleEngine, StepOutcome};
pub use reveal::{Advance, Letter, Reveal};
pub use scene::{AcceptSize, Effect, Effects, Entity, Flag, Scene, Sticker, Target, TransitionStyle};
pub use schedule::{Choreography, Owner};
