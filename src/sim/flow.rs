//! Scene flow controller
//!
//! Owns the active scene and the per-scene session, runs transitions, and
//! turns taps and elapsed time into [`Effect`]s for the host to apply.
//!
//! Leaving a scene always happens in the same order: its listeners are
//! disarmed, its pending choreography is cancelled, and only then does the
//! exit animation start. Anything a scene armed can therefore never fire
//! into the next one.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::chase::{Chase, ChaseOutcome, ChaseTuning};
use super::decor::{StickerBoard, corner_delay, decor_delay, photo_delay};
use super::heart::{HeartOutcome, HeartTap};
use super::input::{Listeners, Tap, TapGate};
use super::particles::{ParticleConfig, ParticleEngine, StepOutcome};
use super::reveal::{Advance, Letter, Reveal};
use super::scene::{Effect, Effects, Entity, Flag, Scene, Target, TransitionStyle};
use super::schedule::{Choreography, Owner, StepId};
use crate::Viewport;
use crate::audio::MusicState;
use crate::consts::*;
use crate::settings::Settings;

/// Largest frame gap fed to the petal engines
const MAX_FRAME_GAP_MS: f64 = 100.0;

/// How many of each revealable element the page carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneContent {
    pub paragraphs: usize,
    pub lines: usize,
    pub photos: usize,
    pub decor: usize,
    pub corners: usize,
}

impl Default for SceneContent {
    fn default() -> Self {
        Self {
            paragraphs: 3,
            lines: 4,
            photos: 6,
            decor: 4,
            corners: 4,
        }
    }
}

/// Deferred choreography steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FinishExit { scene: Scene, style: TransitionStyle },
    Enter { scene: Scene, style: TransitionStyle },
    SettleEnter { scene: Scene, style: TransitionStyle },
    StartMusic,
    LeaveBoot,
    EnvelopeHint,
    ShowPhotos,
    RevealPhoto(usize),
    ExpandLetter,
    FirstParagraph,
    ArmDocument,
    LeaveLetter,
    FirstLine,
    MessageReady,
    ShowTitle,
    ShowAccept,
    ShowEvade,
    EndEscaping,
    EndGrowing,
    Fullscreen,
    ShowYesSticker,
    StartAmbient,
    RevealDecor(usize),
    ClearBurst,
}

/// Interaction state of the active scene
#[derive(Debug, Clone)]
pub enum Session {
    Empty,
    Boot(HeartTap),
    LoveLetter(Letter),
    Message(Reveal),
    Invitation(Chase),
    Confirmation,
}

/// Where the flow is between scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    NotStarted,
    Showing(Scene),
    /// Exit running; `to` activates once the enter delay passes
    Leaving {
        from: Option<Scene>,
        to: Scene,
        style: TransitionStyle,
    },
}

/// The scene sequence state machine
pub struct FlowController {
    settings: Settings,
    content: SceneContent,
    viewport: Viewport,
    evade_footprint: Vec2,
    now: f64,
    last_update: Option<f64>,
    phase: FlowPhase,
    session: Session,
    choreography: Choreography<Step>,
    listeners: Listeners,
    gate: TapGate,
    /// The toggle floats above every scene, so its echoes are tracked apart
    toggle_gate: TapGate,
    fx: Effects,
    music: MusicState,
    stickers: StickerBoard,
    burst: ParticleEngine,
    ambient: ParticleEngine,
    burst_clear: Option<StepId>,
    rng: Pcg32,
    history: Vec<Scene>,
    transitions: u32,
}

impl FlowController {
    pub fn new(settings: Settings, content: SceneContent, viewport: Viewport, seed: u64) -> Self {
        let scale = settings.petal_scale();
        let burst = ParticleEngine::new(ParticleConfig::burst().with_scale(scale), seed ^ 0xb0b5);
        let ambient =
            ParticleEngine::new(ParticleConfig::ambient().with_scale(scale), seed ^ 0xa3b1);

        Self {
            evade_footprint: settings.evade_footprint,
            fx: Effects::new(settings.haptics),
            music: MusicState::new(settings.music_volume),
            settings,
            content,
            viewport,
            now: 0.0,
            last_update: None,
            phase: FlowPhase::NotStarted,
            session: Session::Empty,
            choreography: Choreography::new(),
            listeners: Listeners::new(),
            gate: TapGate::new(),
            toggle_gate: TapGate::new(),
            stickers: StickerBoard::new(),
            burst,
            ambient,
            burst_clear: None,
            rng: Pcg32::seed_from_u64(seed),
            history: Vec::new(),
            transitions: 0,
        }
    }

    /// Show the boot scene and arm the global music toggle
    pub fn start(&mut self, now: f64) {
        if self.phase != FlowPhase::NotStarted {
            log::warn!("Flow already started");
            return;
        }
        self.now = now;
        log::info!("Flow starting at {:.0}ms", now);
        self.listeners
            .arm(Target::MusicToggle, Owner::Flow, &mut self.fx);
        self.activate(Scene::Boot, None);
    }

    // ---- accessors ----

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    /// Active scene, `None` while a transition is in flight
    pub fn active_scene(&self) -> Option<Scene> {
        match self.phase {
            FlowPhase::Showing(scene) => Some(scene),
            _ => None,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, FlowPhase::Leaving { .. })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn music(&self) -> &MusicState {
        &self.music
    }

    pub fn burst(&self) -> &ParticleEngine {
        &self.burst
    }

    pub fn ambient(&self) -> &ParticleEngine {
        &self.ambient
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Scenes in the order they were entered
    pub fn history(&self) -> &[Scene] {
        &self.history
    }

    /// Transitions accepted so far
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// Choreography steps still pending
    pub fn pending_steps(&self) -> usize {
        self.choreography.len()
    }

    /// True while anything needs another animation frame
    pub fn needs_frame(&self) -> bool {
        !self.choreography.is_empty() || self.burst.is_running() || self.ambient.is_running()
    }

    /// Hand queued effects to the host
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        self.fx.drain()
    }

    // ---- host inputs ----

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.burst.resize(viewport.size());
        self.ambient.resize(viewport.size());
    }

    /// Measured evade button size
    pub fn set_evade_footprint(&mut self, footprint: Vec2) {
        self.evade_footprint = footprint;
    }

    /// Outcome of the host's `play()` call for a `StartMusic` effect
    pub fn music_result(&mut self, started: bool) {
        if started {
            self.music.on_started();
            self.fx.push(Effect::Volume(self.music.effective_volume()));
            self.fx.show(Entity::MusicToggle);
            log::info!("Music playing");
        } else {
            self.music.on_failed();
            log::warn!("Music blocked; continuing without it");
        }
    }

    /// Advance time: run due choreography and step the petal engines
    pub fn update(&mut self, now: f64) {
        let dt = match self.last_update {
            Some(last) => (now - last).clamp(0.0, MAX_FRAME_GAP_MS),
            None => 0.0,
        };
        self.last_update = Some(now);
        self.now = self.now.max(now);

        while let Some((_, step)) = self.choreography.pop_due(self.now) {
            self.run_step(step);
        }

        if self.burst.advance(dt) == StepOutcome::BudgetExhausted {
            self.fx.flag(Entity::PetalCanvas, Flag::Fading, true);
            self.burst_clear = Some(self.choreography.after(
                self.now,
                PETAL_FADE_MS,
                Owner::Effects,
                Step::ClearBurst,
            ));
        }
        self.ambient.advance(dt);
    }

    /// Route one tap to the armed target's handler
    pub fn tap(&mut self, tap: Tap) {
        if !self.listeners.is_armed(tap.target) {
            log::debug!("Tap on unarmed {:?} ignored", tap.target);
            return;
        }
        let gate = if tap.target == Target::MusicToggle {
            &mut self.toggle_gate
        } else {
            &mut self.gate
        };
        if !gate.admit(&tap) {
            log::debug!("Duplicate {:?} tap on {:?} dropped", tap.source, tap.target);
            return;
        }
        self.now = self.now.max(tap.at);

        match tap.target {
            Target::MusicToggle => self.toggle_music(),
            Target::HeartWrapper => self.tap_heart(),
            Target::Envelope => self.open_envelope(),
            Target::LetterPaper | Target::Document => self.advance_letter(),
            Target::MessageContainer => self.advance_message(),
            Target::AcceptButton => self.accept(),
            Target::EvadeButton => self.evade(),
        }
    }

    // ---- transitions ----

    /// Leave the active scene for `target`. Returns false for the no-op
    /// cases: a transition already in flight or `target` already showing.
    pub fn transition_to(&mut self, target: Scene, style: TransitionStyle) -> bool {
        let from = match self.phase {
            FlowPhase::Leaving { to, .. } => {
                log::debug!("Transition to {:?} ignored, already leaving for {:?}", target, to);
                return false;
            }
            FlowPhase::Showing(current) if current == target => {
                log::debug!("Transition to {:?} ignored, already showing", target);
                return false;
            }
            FlowPhase::Showing(current) => Some(current),
            FlowPhase::NotStarted => None,
        };

        if let Some(from) = from {
            self.teardown(from);
            let screen = Entity::Screen(from);
            self.fx.flag(screen, Flag::TransitionOut(style), true);
            self.fx.flag(screen, Flag::Active, false);
            self.choreography.after(
                self.now,
                EXIT_MS,
                Owner::Flow,
                Step::FinishExit { scene: from, style },
            );
        }

        log::info!("Transition {:?} -> {:?} ({})", from, target, style.as_str());
        self.transitions += 1;
        self.phase = FlowPhase::Leaving {
            from,
            to: target,
            style,
        };
        self.choreography.after(
            self.now,
            ENTER_DELAY_MS,
            Owner::Flow,
            Step::Enter {
                scene: target,
                style,
            },
        );
        true
    }

    /// Hand off from a finished scene to the one after it
    fn advance_from(&mut self, finished: Scene, style: TransitionStyle) -> bool {
        match finished.next() {
            Some(next) => self.transition_to(next, style),
            None => false,
        }
    }

    /// Rebuild the active scene's session from scratch
    pub fn reinitialize(&mut self) -> bool {
        let FlowPhase::Showing(scene) = self.phase else {
            return false;
        };
        log::info!("Reinitializing {:?}", scene);
        self.init_scene(scene);
        true
    }

    /// Drop everything the scene owns
    fn teardown(&mut self, scene: Scene) {
        let owner = Owner::Scene(scene);
        self.listeners.disarm_owner(owner, &mut self.fx);
        let cancelled = self.choreography.cancel_owner(owner);
        if cancelled > 0 {
            log::debug!("Cancelled {} pending steps of {:?}", cancelled, scene);
        }
        self.session = Session::Empty;
        if scene == Scene::Confirmation && self.ambient.is_running() {
            self.ambient.stop();
            self.fx.hide(Entity::ConfettiCanvas);
        }
    }

    fn activate(&mut self, scene: Scene, style: Option<TransitionStyle>) {
        self.phase = FlowPhase::Showing(scene);
        self.history.push(scene);
        let screen = Entity::Screen(scene);
        self.fx.flag(screen, Flag::Active, true);
        if let Some(style) = style {
            self.fx.flag(screen, Flag::TransitionIn(style), true);
            self.choreography.after(
                self.now,
                ENTER_MS,
                Owner::Flow,
                Step::SettleEnter { scene, style },
            );
        }
        self.init_scene(scene);
    }

    fn init_scene(&mut self, scene: Scene) {
        self.teardown(scene);
        match scene {
            Scene::Boot => self.init_boot(),
            Scene::LoveLetter => self.init_letter(),
            Scene::Message => self.init_message(),
            Scene::Invitation => self.init_invitation(),
            Scene::Confirmation => self.init_confirmation(),
        }
    }

    fn init_boot(&mut self) {
        let heart = HeartTap::new(self.settings.heart_taps);
        heart.enter(&mut self.fx);
        self.session = Session::Boot(heart);
        self.listeners
            .arm(Target::HeartWrapper, Owner::Scene(Scene::Boot), &mut self.fx);
    }

    fn init_letter(&mut self) {
        let owner = Owner::Scene(Scene::LoveLetter);
        self.fx.flag(Entity::Envelope, Flag::Opened, false);
        self.fx.flag(Entity::EnvelopeHint, Flag::Hidden, false);
        self.fx.hide(Entity::EnvelopeHint);
        self.fx.flag(Entity::LetterPaper, Flag::Expanded, false);
        self.fx.hide(Entity::LetterHint);
        self.hide_photos();

        let letter = Letter::new(self.content.paragraphs);
        letter.reset(&mut self.fx);
        self.session = Session::LoveLetter(letter);

        self.listeners.arm(Target::Envelope, owner, &mut self.fx);
        self.listeners.arm(Target::LetterPaper, owner, &mut self.fx);
        self.choreography
            .after(self.now, ENVELOPE_HINT_MS, owner, Step::EnvelopeHint);
        self.choreography
            .after(self.now, PHOTOS_MS, owner, Step::ShowPhotos);
        // Whole-screen taps only after the entry animation settles
        self.choreography
            .after(self.now, DOCUMENT_TAP_MS, owner, Step::ArmDocument);
    }

    fn init_message(&mut self) {
        let reveal = Reveal::new(self.content.lines, Entity::MessageLine);
        reveal.reset(&mut self.fx);
        self.fx.hide(Entity::MessageHint);
        self.fx.flag(Entity::MessageHint, Flag::Hidden, false);
        self.session = Session::Message(reveal);
        self.choreography.sequence(
            self.now,
            Owner::Scene(Scene::Message),
            [
                (FIRST_LINE_MS, Step::FirstLine),
                (MESSAGE_HINT_MS, Step::MessageReady),
            ],
        );
    }

    fn init_invitation(&mut self) {
        let owner = Owner::Scene(Scene::Invitation);
        self.stickers.clear(&mut self.fx);
        let chase = Chase::new(ChaseTuning::default());
        chase.reset(&mut self.fx);
        self.session = Session::Invitation(chase);

        // Accept works the moment the scene is up, even before it fades in
        self.listeners
            .arm(Target::AcceptButton, owner, &mut self.fx);
        self.choreography.sequence(
            self.now,
            owner,
            [
                (TITLE_MS, Step::ShowTitle),
                (ACCEPT_MS, Step::ShowAccept),
                (EVADE_MS, Step::ShowEvade),
            ],
        );
    }

    fn init_confirmation(&mut self) {
        let owner = Owner::Scene(Scene::Confirmation);
        self.stickers.clear(&mut self.fx);
        self.session = Session::Confirmation;
        self.fx.hide(Entity::YesSticker);

        for i in 0..self.content.decor {
            self.fx.push(Effect::Opacity {
                entity: Entity::DecorElement(i),
                value: Some(0.0),
            });
            self.choreography
                .after(self.now, decor_delay(i), owner, Step::RevealDecor(i));
        }
        for i in 0..self.content.corners {
            self.fx.push(Effect::AnimationDelay {
                entity: Entity::CornerDecor(i),
                seconds: corner_delay(i),
            });
        }
        self.choreography
            .after(self.now, YES_STICKER_MS, owner, Step::ShowYesSticker);
        self.choreography
            .after(self.now, AMBIENT_MS, owner, Step::StartAmbient);
    }

    // ---- choreography ----

    fn run_step(&mut self, step: Step) {
        match step {
            Step::FinishExit { scene, style } => {
                self.fx
                    .flag(Entity::Screen(scene), Flag::TransitionOut(style), false);
            }
            Step::Enter { scene, style } => self.activate(scene, Some(style)),
            Step::SettleEnter { scene, style } => {
                self.fx
                    .flag(Entity::Screen(scene), Flag::TransitionIn(style), false);
            }
            Step::StartMusic => {
                if self.music.request() {
                    self.fx.push(Effect::StartMusic);
                }
            }
            Step::LeaveBoot => {
                self.advance_from(Scene::Boot, TransitionStyle::Fade);
            }
            Step::EnvelopeHint => self.fx.show(Entity::EnvelopeHint),
            Step::ShowPhotos => {
                self.fx.show(Entity::PhotoStrip);
                for i in 0..self.content.photos {
                    self.choreography.after(
                        self.now,
                        photo_delay(i),
                        Owner::Scene(Scene::LoveLetter),
                        Step::RevealPhoto(i),
                    );
                }
            }
            Step::RevealPhoto(i) => self.fx.show(Entity::Photo(i)),
            Step::ExpandLetter => {
                if let Session::LoveLetter(letter) = &mut self.session {
                    letter.expand();
                    self.fx.flag(Entity::LetterPaper, Flag::Expanded, true);
                }
            }
            Step::FirstParagraph => {
                if let Session::LoveLetter(letter) = &mut self.session {
                    letter.start_reading();
                    self.fx.show(Entity::LetterHint);
                }
            }
            Step::ArmDocument => {
                self.listeners.arm(
                    Target::Document,
                    Owner::Scene(Scene::LoveLetter),
                    &mut self.fx,
                );
            }
            Step::LeaveLetter => {
                self.advance_from(Scene::LoveLetter, TransitionStyle::Fade);
            }
            Step::FirstLine => {
                if let Session::Message(reveal) = &mut self.session {
                    reveal.start(&mut self.fx);
                }
            }
            Step::MessageReady => {
                self.fx.show(Entity::MessageHint);
                self.listeners.arm(
                    Target::MessageContainer,
                    Owner::Scene(Scene::Message),
                    &mut self.fx,
                );
            }
            Step::ShowTitle => self.fx.show(Entity::InvitationTitle),
            Step::ShowAccept => self.fx.show(Entity::AcceptButton),
            Step::ShowEvade => {
                self.fx.show(Entity::EvadeButton);
                self.listeners.arm(
                    Target::EvadeButton,
                    Owner::Scene(Scene::Invitation),
                    &mut self.fx,
                );
            }
            Step::EndEscaping => self.fx.flag(Entity::EvadeButton, Flag::Escaping, false),
            Step::EndGrowing => self.fx.flag(Entity::AcceptButton, Flag::Growing, false),
            Step::Fullscreen => {
                self.fx.flag(Entity::AcceptButton, Flag::Fullscreen, true);
                self.fx.push(Effect::Display {
                    entity: Entity::EvadeButton,
                    shown: false,
                });
            }
            Step::ShowYesSticker => self.fx.show(Entity::YesSticker),
            Step::StartAmbient => {
                if self.ambient.config().count > 0 {
                    self.ambient.start(self.viewport.size());
                    self.fx.show(Entity::ConfettiCanvas);
                }
            }
            Step::RevealDecor(i) => self.fx.push(Effect::Opacity {
                entity: Entity::DecorElement(i),
                value: None,
            }),
            Step::ClearBurst => {
                self.burst_clear = None;
                self.burst.finish_fade();
                self.fx.hide(Entity::PetalCanvas);
                self.fx.flag(Entity::PetalCanvas, Flag::Fading, false);
            }
        }
    }

    // ---- handlers ----

    fn toggle_music(&mut self) {
        self.fx.vibrate(&[5]);
        let muted = self.music.toggle_mute();
        self.fx.push(Effect::Volume(self.music.effective_volume()));
        self.fx.flag(Entity::MusicToggle, Flag::Muted, muted);
    }

    fn tap_heart(&mut self) {
        let Session::Boot(heart) = &mut self.session else {
            return;
        };
        if heart.tap(&mut self.rng, &mut self.fx) != HeartOutcome::Completed {
            return;
        }

        let owner = Owner::Scene(Scene::Boot);
        self.listeners.disarm_owner(owner, &mut self.fx);
        self.start_burst();
        self.fx
            .flag(Entity::HeartContainer, Flag::Transitioning, true);
        self.choreography
            .after(self.now, MUSIC_DELAY_MS, owner, Step::StartMusic);
        self.choreography
            .after(self.now, BOOT_SETTLE_MS, owner, Step::LeaveBoot);
    }

    fn start_burst(&mut self) {
        if self.burst.config().count == 0 {
            return;
        }
        // A pending clear belongs to the previous burst
        if let Some(id) = self.burst_clear.take() {
            self.choreography.cancel(id);
        }
        self.burst.start(self.viewport.size());
        self.fx.flag(Entity::PetalCanvas, Flag::Fading, false);
        self.fx.show(Entity::PetalCanvas);
    }

    fn open_envelope(&mut self) {
        let Session::LoveLetter(letter) = &mut self.session else {
            return;
        };
        if !letter.open() {
            return;
        }

        self.fx.vibrate(&[20]);
        self.fx.flag(Entity::Envelope, Flag::Opened, true);
        self.fx.flag(Entity::EnvelopeHint, Flag::Hidden, true);
        self.choreography.sequence(
            self.now,
            Owner::Scene(Scene::LoveLetter),
            [
                (FLAP_MS, Step::ExpandLetter),
                (EXPAND_MS, Step::FirstParagraph),
            ],
        );
    }

    fn advance_letter(&mut self) {
        let Session::LoveLetter(letter) = &mut self.session else {
            return;
        };
        if letter.advance(&mut self.fx) != Advance::Finished {
            return;
        }

        let owner = Owner::Scene(Scene::LoveLetter);
        self.listeners.disarm_owner(owner, &mut self.fx);
        // Late photo reveals or the document listener must not outlive the letter
        self.choreography.cancel_owner(owner);
        self.fx.hide(Entity::LetterHint);
        self.hide_photos();
        self.choreography
            .after(self.now, LETTER_EXIT_MS, owner, Step::LeaveLetter);
    }

    fn hide_photos(&mut self) {
        self.fx.hide(Entity::PhotoStrip);
        for i in 0..self.content.photos {
            self.fx.hide(Entity::Photo(i));
        }
    }

    fn advance_message(&mut self) {
        let Session::Message(reveal) = &mut self.session else {
            return;
        };
        if reveal.advance(&mut self.fx) != Advance::Finished {
            return;
        }

        self.listeners
            .disarm_owner(Owner::Scene(Scene::Message), &mut self.fx);
        self.fx.flag(Entity::MessageHint, Flag::Hidden, true);
        self.advance_from(Scene::Message, TransitionStyle::Scale);
    }

    fn accept(&mut self) {
        let Session::Invitation(chase) = &mut self.session else {
            return;
        };
        if chase.accept(&mut self.fx) != ChaseOutcome::Accepted {
            return;
        }

        self.listeners
            .disarm_owner(Owner::Scene(Scene::Invitation), &mut self.fx);
        self.advance_from(Scene::Invitation, TransitionStyle::Scale);
    }

    fn evade(&mut self) {
        let viewport = self.viewport;
        let footprint = self.evade_footprint;
        let Session::Invitation(chase) = &mut self.session else {
            return;
        };
        let ChaseOutcome::Escaped { surrendered, .. } =
            chase.evade(viewport, footprint, &mut self.rng, &mut self.fx)
        else {
            return;
        };

        let owner = Owner::Scene(Scene::Invitation);
        self.stickers.place(viewport, &mut self.rng, &mut self.fx);
        self.choreography
            .after(self.now, ESCAPING_MS, owner, Step::EndEscaping);
        self.choreography
            .after(self.now, GROWING_MS, owner, Step::EndGrowing);
        if surrendered {
            self.listeners.disarm(Target::EvadeButton, &mut self.fx);
            self.choreography
                .after(self.now, FULLSCREEN_MS, owner, Step::Fullscreen);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::input::TapSource;
    use crate::sim::particles::EngineState;
    use proptest::prelude::*;

    fn flow() -> FlowController {
        let mut flow = FlowController::new(
            Settings::default(),
            SceneContent::default(),
            Viewport::default(),
            7,
        );
        flow.start(0.0);
        flow
    }

    /// Run frames at 60 Hz for `ms`
    fn run(flow: &mut FlowController, ms: f64) {
        let end = flow.now() + ms;
        let mut t = flow.now();
        while t < end {
            t = (t + FRAME_MS).min(end);
            flow.update(t);
        }
    }

    fn tap(flow: &mut FlowController, target: Target) {
        let at = flow.now() + 50.0;
        flow.update(at);
        flow.tap(Tap::touch(target, at));
    }

    fn listen_balance(effects: &[Effect], target: Target) -> i32 {
        effects
            .iter()
            .map(|e| match e {
                Effect::Listen { target: t, on: true } if *t == target => 1,
                Effect::Listen { target: t, on: false } if *t == target => -1,
                _ => 0,
            })
            .sum()
    }

    fn to_letter(flow: &mut FlowController) {
        for _ in 0..HEART_TAP_TOTAL {
            tap(flow, Target::HeartWrapper);
        }
        run(flow, BOOT_SETTLE_MS + ENTER_DELAY_MS + 20.0);
        assert_eq!(flow.active_scene(), Some(Scene::LoveLetter));
    }

    fn to_message(flow: &mut FlowController) {
        to_letter(flow);
        tap(flow, Target::Envelope);
        run(flow, FLAP_MS + EXPAND_MS + 20.0);
        for _ in 0..=SceneContent::default().paragraphs {
            tap(flow, Target::LetterPaper);
        }
        run(flow, LETTER_EXIT_MS + ENTER_DELAY_MS + 20.0);
        assert_eq!(flow.active_scene(), Some(Scene::Message));
    }

    fn to_invitation(flow: &mut FlowController) {
        to_message(flow);
        run(flow, FIRST_LINE_MS + MESSAGE_HINT_MS + 20.0);
        for _ in 0..SceneContent::default().lines {
            tap(flow, Target::MessageContainer);
        }
        run(flow, ENTER_DELAY_MS + 20.0);
        assert_eq!(flow.active_scene(), Some(Scene::Invitation));
    }

    #[test]
    fn test_start_shows_boot() {
        let mut flow = flow();
        assert_eq!(flow.active_scene(), Some(Scene::Boot));
        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::flag(Entity::Screen(Scene::Boot), Flag::Active, true)));
        assert!(flow.listeners().is_armed(Target::HeartWrapper));
        assert!(flow.listeners().is_armed(Target::MusicToggle));
    }

    #[test]
    fn test_full_walkthrough() {
        let mut flow = flow();
        to_invitation(&mut flow);
        run(&mut flow, TITLE_MS + ACCEPT_MS + EVADE_MS + 20.0);
        assert!(flow.listeners().is_armed(Target::EvadeButton));

        tap(&mut flow, Target::AcceptButton);
        run(&mut flow, ENTER_DELAY_MS + 20.0);
        assert_eq!(flow.active_scene(), Some(Scene::Confirmation));
        assert_eq!(flow.history(), &Scene::ALL);
        assert_eq!(flow.transitions(), 4);
    }

    #[test]
    fn test_transition_phases() {
        let mut flow = flow();
        assert!(flow.transition_to(Scene::Message, TransitionStyle::Fade));
        assert!(flow.is_transitioning());
        assert_eq!(flow.active_scene(), None);
        // Second request while leaving is a no-op
        assert!(!flow.transition_to(Scene::Invitation, TransitionStyle::Fade));

        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::flag(
            Entity::Screen(Scene::Boot),
            Flag::TransitionOut(TransitionStyle::Fade),
            true
        )));

        run(&mut flow, ENTER_DELAY_MS);
        assert_eq!(flow.active_scene(), Some(Scene::Message));
        assert!(!flow.transition_to(Scene::Message, TransitionStyle::Fade));

        run(&mut flow, ENTER_MS);
        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::flag(
            Entity::Screen(Scene::Boot),
            Flag::TransitionOut(TransitionStyle::Fade),
            false
        )));
        assert!(effects.contains(&Effect::flag(
            Entity::Screen(Scene::Message),
            Flag::TransitionIn(TransitionStyle::Fade),
            false
        )));
        assert_eq!(flow.transitions(), 1);
    }

    #[test]
    fn test_heart_completion_transitions_once() {
        let mut flow = flow();
        for _ in 0..HEART_TAP_TOTAL * 3 {
            tap(&mut flow, Target::HeartWrapper);
        }
        assert!(!flow.listeners().is_armed(Target::HeartWrapper));
        run(&mut flow, 3000.0);
        assert_eq!(flow.transitions(), 1);
        assert_eq!(flow.active_scene(), Some(Scene::LoveLetter));
    }

    #[test]
    fn test_click_after_touchend_is_one_tap() {
        let mut flow = flow();
        flow.tap(Tap::touch(Target::HeartWrapper, 100.0));
        flow.tap(Tap::pointer(Target::HeartWrapper, 130.0));
        match flow.session() {
            Session::Boot(heart) => assert_eq!(heart.taps(), 1),
            other => panic!("unexpected session {:?}", other),
        }
    }

    #[test]
    fn test_burst_runs_then_clears() {
        let mut flow = flow();
        for _ in 0..HEART_TAP_TOTAL {
            tap(&mut flow, Target::HeartWrapper);
        }
        assert!(flow.burst().is_running());
        run(&mut flow, 3000.0 + 100.0);
        assert_eq!(flow.burst().state(), EngineState::Fading);
        run(&mut flow, PETAL_FADE_MS + 20.0);
        assert_eq!(flow.burst().state(), EngineState::Idle);
        assert!(flow.burst().particles().is_empty());
        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::hide(Entity::PetalCanvas)));
    }

    #[test]
    fn test_petals_disabled_skips_burst() {
        let settings = Settings {
            petals: false,
            ..Settings::default()
        };
        let mut flow =
            FlowController::new(settings, SceneContent::default(), Viewport::default(), 1);
        flow.start(0.0);
        for _ in 0..HEART_TAP_TOTAL {
            tap(&mut flow, Target::HeartWrapper);
        }
        assert!(!flow.burst().is_running());
    }

    #[test]
    fn test_music_requested_once() {
        let mut flow = flow();
        for _ in 0..HEART_TAP_TOTAL {
            tap(&mut flow, Target::HeartWrapper);
        }
        run(&mut flow, MUSIC_DELAY_MS + 20.0);
        let effects = flow.drain_effects();
        assert_eq!(effects.iter().filter(|e| **e == Effect::StartMusic).count(), 1);

        flow.music_result(true);
        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::show(Entity::MusicToggle)));

        tap(&mut flow, Target::MusicToggle);
        assert!(flow.music().is_muted());
        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::Volume(0.0)));
    }

    #[test]
    fn test_letter_needs_envelope_first() {
        let mut flow = flow();
        to_letter(&mut flow);
        tap(&mut flow, Target::LetterPaper);
        match flow.session() {
            Session::LoveLetter(letter) => assert_eq!(letter.reveal().cursor(), 0),
            other => panic!("unexpected session {:?}", other),
        }
    }

    #[test]
    fn test_document_tap_armed_late_and_cleared() {
        let mut flow = flow();
        to_letter(&mut flow);
        assert!(!flow.listeners().is_armed(Target::Document));
        run(&mut flow, DOCUMENT_TAP_MS);
        assert!(flow.listeners().is_armed(Target::Document));

        tap(&mut flow, Target::Envelope);
        run(&mut flow, FLAP_MS + EXPAND_MS + 20.0);
        for _ in 0..=SceneContent::default().paragraphs {
            tap(&mut flow, Target::Document);
        }
        assert!(!flow.listeners().is_armed(Target::Document));
        assert!(!flow.listeners().is_armed(Target::LetterPaper));
        run(&mut flow, LETTER_EXIT_MS + ENTER_DELAY_MS + 20.0);
        assert_eq!(flow.active_scene(), Some(Scene::Message));
    }

    #[test]
    fn test_letter_completion_transitions_once() {
        let mut flow = flow();
        to_letter(&mut flow);
        let before = flow.transitions();
        tap(&mut flow, Target::Envelope);
        run(&mut flow, FLAP_MS + EXPAND_MS + 20.0);
        for _ in 0..SceneContent::default().paragraphs + 5 {
            tap(&mut flow, Target::LetterPaper);
        }
        run(&mut flow, LETTER_EXIT_MS + ENTER_DELAY_MS + 20.0);
        assert_eq!(flow.transitions(), before + 1);
        assert_eq!(flow.active_scene(), Some(Scene::Message));
    }

    #[test]
    fn test_message_completion_transitions_once() {
        let mut flow = flow();
        to_message(&mut flow);
        let before = flow.transitions();
        run(&mut flow, FIRST_LINE_MS + MESSAGE_HINT_MS + 20.0);
        for _ in 0..SceneContent::default().lines + 5 {
            tap(&mut flow, Target::MessageContainer);
        }
        run(&mut flow, ENTER_DELAY_MS + 20.0);
        assert_eq!(flow.transitions(), before + 1);
        assert_eq!(flow.active_scene(), Some(Scene::Invitation));
    }

    #[test]
    fn test_toggle_tap_while_reading_only_mutes() {
        let mut flow = flow();
        to_letter(&mut flow);
        tap(&mut flow, Target::Envelope);
        run(&mut flow, FLAP_MS + EXPAND_MS + 20.0);

        let at = flow.now();
        flow.tap(Tap::touch(Target::LetterPaper, at + 1.0));
        // touchend on the toggle plus its synthesized click
        flow.tap(Tap::touch(Target::MusicToggle, at + 6.0));
        flow.tap(Tap::pointer(Target::MusicToggle, at + 30.0));
        assert!(flow.music().is_muted());

        // A mouse click on the toggle right after a letter touch still counts
        flow.tap(Tap::touch(Target::LetterPaper, at + 500.0));
        flow.tap(Tap::pointer(Target::MusicToggle, at + 505.0));
        assert!(!flow.music().is_muted());

        match flow.session() {
            Session::LoveLetter(letter) => assert_eq!(letter.reveal().cursor(), 2),
            other => panic!("unexpected session {:?}", other),
        }
    }

    #[test]
    fn test_fast_letter_exit_never_arms_document() {
        let content = SceneContent {
            paragraphs: 1,
            ..SceneContent::default()
        };
        let mut flow = FlowController::new(Settings::default(), content, Viewport::default(), 7);
        flow.start(0.0);
        to_letter(&mut flow);

        // Finish the letter before the document listener is due
        flow.tap(Tap::touch(Target::Envelope, flow.now() + 1.0));
        run(&mut flow, FLAP_MS + EXPAND_MS);
        let at = flow.now();
        flow.tap(Tap::touch(Target::LetterPaper, at + 1.0));
        flow.tap(Tap::touch(Target::LetterPaper, at + 2.0));
        flow.drain_effects();

        run(&mut flow, DOCUMENT_TAP_MS);
        let effects = flow.drain_effects();
        assert!(!effects.contains(&Effect::Listen {
            target: Target::Document,
            on: true
        }));
        assert_eq!(flow.active_scene(), Some(Scene::Message));
    }

    #[test]
    fn test_message_reinitialize_keeps_one_listener() {
        let mut flow = flow();
        to_message(&mut flow);
        flow.drain_effects();

        assert!(flow.reinitialize());
        run(&mut flow, FIRST_LINE_MS + MESSAGE_HINT_MS + 20.0);
        let effects = flow.drain_effects();
        assert_eq!(listen_balance(&effects, Target::MessageContainer), 1);

        tap(&mut flow, Target::MessageContainer);
        match flow.session() {
            // First line is automatic; one tap adds the second
            Session::Message(reveal) => assert_eq!(reveal.cursor(), 2),
            other => panic!("unexpected session {:?}", other),
        }
    }

    #[test]
    fn test_reinitialize_mid_choreography_restarts_it() {
        let mut flow = flow();
        to_message(&mut flow);
        run(&mut flow, 100.0);
        flow.reinitialize();
        run(&mut flow, FIRST_LINE_MS + MESSAGE_HINT_MS + 20.0);
        let effects = flow.drain_effects();
        assert_eq!(listen_balance(&effects, Target::MessageContainer), 1);
        assert_eq!(
            effects
                .iter()
                .filter(|e| **e == Effect::show(Entity::MessageLine(0)))
                .count(),
            1
        );
    }

    #[test]
    fn test_early_accept_cancels_evade_arming() {
        let mut flow = flow();
        to_invitation(&mut flow);
        assert!(flow.listeners().is_armed(Target::AcceptButton));
        tap(&mut flow, Target::AcceptButton);
        run(&mut flow, 2000.0);
        assert_eq!(flow.active_scene(), Some(Scene::Confirmation));
        assert!(!flow.listeners().is_armed(Target::EvadeButton));
    }

    #[test]
    fn test_chase_until_surrender() {
        let mut flow = flow();
        to_invitation(&mut flow);
        run(&mut flow, TITLE_MS + ACCEPT_MS + EVADE_MS + 20.0);
        for _ in 0..20 {
            tap(&mut flow, Target::EvadeButton);
        }
        match flow.session() {
            Session::Invitation(chase) => assert_eq!(chase.attempts(), 9),
            other => panic!("unexpected session {:?}", other),
        }
        assert!(!flow.listeners().is_armed(Target::EvadeButton));
        run(&mut flow, FULLSCREEN_MS + 20.0);
        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::flag(Entity::AcceptButton, Flag::Fullscreen, true)));
        assert_eq!(
            effects
                .iter()
                .filter(|e| matches!(e, Effect::Sticker(_)))
                .count(),
            9
        );

        tap(&mut flow, Target::AcceptButton);
        tap(&mut flow, Target::AcceptButton);
        run(&mut flow, 2000.0);
        assert_eq!(flow.active_scene(), Some(Scene::Confirmation));
        assert_eq!(flow.transitions(), 4);
    }

    #[test]
    fn test_confirmation_starts_ambient_and_leaving_stops_it() {
        let mut flow = flow();
        to_invitation(&mut flow);
        tap(&mut flow, Target::AcceptButton);
        run(&mut flow, ENTER_DELAY_MS + AMBIENT_MS + 40.0);
        assert!(flow.ambient().is_running());
        let handle = flow.ambient().handle();

        flow.resize(Viewport::new(800.0, 600.0));
        assert_eq!(flow.ambient().handle(), handle);
        assert_eq!(flow.ambient().bounds(), Vec2::new(800.0, 600.0));

        flow.transition_to(Scene::Boot, TransitionStyle::SlideUp);
        assert!(!flow.ambient().is_running());
    }

    #[test]
    fn test_decor_reveals_staggered() {
        let mut flow = flow();
        to_invitation(&mut flow);
        tap(&mut flow, Target::AcceptButton);
        run(&mut flow, ENTER_DELAY_MS + 10.0);
        flow.drain_effects();
        run(&mut flow, DECOR_MS + 10.0);
        let effects = flow.drain_effects();
        assert!(effects.contains(&Effect::Opacity {
            entity: Entity::DecorElement(0),
            value: None
        }));
        assert!(!effects.contains(&Effect::Opacity {
            entity: Entity::DecorElement(1),
            value: None
        }));
    }

    #[test]
    fn test_unarmed_taps_ignored() {
        let mut flow = flow();
        flow.tap(Tap::new(Target::AcceptButton, TapSource::Pointer, 10.0));
        flow.tap(Tap::new(Target::Envelope, TapSource::Touch, 20.0));
        assert_eq!(flow.active_scene(), Some(Scene::Boot));
        assert_eq!(flow.transitions(), 0);
    }

    #[test]
    fn test_needs_frame_settles() {
        let mut flow = flow();
        assert!(!flow.needs_frame());
        tap(&mut flow, Target::HeartWrapper);
        assert!(!flow.needs_frame());
        for _ in 1..HEART_TAP_TOTAL {
            tap(&mut flow, Target::HeartWrapper);
        }
        assert!(flow.needs_frame());
        run(&mut flow, 5000.0);
        assert!(!flow.needs_frame());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_transitions_bounded_by_taps(
            targets in proptest::collection::vec(0usize..8, 0..200),
            gaps in proptest::collection::vec(1.0f64..700.0, 200),
        ) {
            let all = [
                Target::HeartWrapper, Target::Envelope, Target::LetterPaper, Target::Document,
                Target::MessageContainer, Target::AcceptButton, Target::EvadeButton,
                Target::MusicToggle,
            ];
            let mut flow = flow();
            for (i, &t) in targets.iter().enumerate() {
                run(&mut flow, gaps[i]);
                flow.tap(Tap::touch(all[t], flow.now()));
                prop_assert!(flow.transitions() <= 4);
                prop_assert!(flow.history().len() <= 5);
            }
            // History is always a prefix of the scene order
            prop_assert_eq!(flow.history(), &Scene::ALL[..flow.history().len()]);
        }
    }
}
