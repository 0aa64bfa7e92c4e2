//! Scene registry and the output vocabulary of the simulation
//!
//! The core never touches the page. Everything it wants shown is expressed
//! as an [`Effect`] on an [`Entity`], drained and applied by the host.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// The fixed, ordered set of full-screen scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scene {
    /// Tap the heart until it fills
    Boot,
    /// Open the envelope and read the letter
    LoveLetter,
    /// Line-by-line message
    Message,
    /// The question, with a runaway "no"
    Invitation,
    /// Celebration
    Confirmation,
}

impl Scene {
    pub const ALL: [Scene; 5] = [
        Scene::Boot,
        Scene::LoveLetter,
        Scene::Message,
        Scene::Invitation,
        Scene::Confirmation,
    ];

    /// Element id of the scene's screen
    pub fn dom_id(&self) -> &'static str {
        match self {
            Scene::Boot => "screenBoot",
            Scene::LoveLetter => "screenLoveLetter",
            Scene::Message => "screenMessage",
            Scene::Invitation => "screenInvitation",
            Scene::Confirmation => "screenConfirmation",
        }
    }

    /// The scene that follows this one, if any
    pub fn next(&self) -> Option<Scene> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }
}

/// Visual style of a scene hand-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransitionStyle {
    #[default]
    SlideUp,
    Fade,
    Scale,
}

impl TransitionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionStyle::SlideUp => "slide-up",
            TransitionStyle::Fade => "fade",
            TransitionStyle::Scale => "scale",
        }
    }
}

/// Listener attachment points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    HeartWrapper,
    Envelope,
    LetterPaper,
    /// Document-wide fallback while the letter is being read
    Document,
    MessageContainer,
    AcceptButton,
    EvadeButton,
    MusicToggle,
}

impl Target {
    /// CSS selector of the listening element (`None` for the document itself)
    pub fn selector(&self) -> Option<&'static str> {
        match self {
            Target::HeartWrapper => Some("#heartTapWrapper"),
            Target::Envelope => Some("#envelope"),
            Target::LetterPaper => Some("#letterPaper"),
            Target::Document => None,
            Target::MessageContainer => Some("#screenMessage .message-container"),
            Target::AcceptButton => Some("#btnYes"),
            Target::EvadeButton => Some("#btnNo"),
            Target::MusicToggle => Some("#musicToggle"),
        }
    }
}

/// Every visual element the simulation can address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Screen(Scene),
    HeartWrapper,
    HeartContainer,
    HeartPulseRing,
    TapCount,
    TapTotal,
    Envelope,
    EnvelopeHint,
    LetterPaper,
    LetterHint,
    LetterParagraph(usize),
    PhotoStrip,
    Photo(usize),
    MessageLine(usize),
    MessageHint,
    InvitationTitle,
    AcceptButton,
    EvadeButton,
    YesSticker,
    DecorElement(usize),
    CornerDecor(usize),
    MusicToggle,
    PetalCanvas,
    ConfettiCanvas,
}

/// Visual state flags (rendered as CSS classes by the host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Active,
    Visible,
    Hidden,
    Opened,
    Expanded,
    Pulse,
    Tapped,
    Filling,
    Complete,
    Transitioning,
    Floating,
    Escaping,
    Growing,
    Fullscreen,
    Muted,
    Fading,
    TransitionOut(TransitionStyle),
    TransitionIn(TransitionStyle),
}

impl Flag {
    pub fn class_name(&self) -> String {
        match self {
            Flag::Active => "active".into(),
            Flag::Visible => "visible".into(),
            Flag::Hidden => "hidden".into(),
            Flag::Opened => "opened".into(),
            Flag::Expanded => "expanded".into(),
            Flag::Pulse => "pulse".into(),
            Flag::Tapped => "tapped".into(),
            Flag::Filling => "filling".into(),
            Flag::Complete => "complete".into(),
            Flag::Transitioning => "transitioning".into(),
            Flag::Floating => "floating".into(),
            Flag::Escaping => "escaping".into(),
            Flag::Growing => "growing".into(),
            Flag::Fullscreen => "fullscreen".into(),
            Flag::Muted => "muted".into(),
            Flag::Fading => "fading".into(),
            Flag::TransitionOut(style) => format!("transition-{}-out", style.as_str()),
            Flag::TransitionIn(style) => format!("transition-{}-in", style.as_str()),
        }
    }
}

/// Accept button sizing, one variant per growth regime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptSize {
    /// Back to the stylesheet's size
    Natural,
    /// Grows in place (padding is vertical; horizontal is 1.8x)
    Padded { padding_rem: f32, font_rem: f32 },
    /// Explicit box interpolated toward a viewport-relative maximum
    Boxed { width_px: f32, height_px: f32, font_rem: f32 },
}

/// A placed sticker
#[derive(Debug, Clone, PartialEq)]
pub struct Sticker {
    pub image: &'static str,
    pub pos: Vec2,
    pub rotation_deg: f32,
}

/// One instruction for the host
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Add or remove a visual flag
    Flag { entity: Entity, flag: Flag, on: bool },
    /// Remove and re-add a flag so its animation replays
    Restart { entity: Entity, flag: Flag },
    Text { entity: Entity, text: String },
    /// Heart fill fraction in [0, 1]
    HeartFill(f32),
    /// Absolute position within the screen
    Place { entity: Entity, pos: Vec2 },
    Scale { entity: Entity, scale: f32 },
    /// Inline opacity (`None` clears it back to the stylesheet)
    Opacity { entity: Entity, value: Option<f32> },
    Interactive { entity: Entity, on: bool },
    Display { entity: Entity, shown: bool },
    AcceptSize(AcceptSize),
    AnimationDelay { entity: Entity, seconds: f32 },
    /// Attach or detach the tap listeners of a target
    Listen { target: Target, on: bool },
    Vibrate(Vec<u32>),
    StartMusic,
    Volume(f32),
    /// Short-lived sparkle inside the heart's 100x100 box
    Sparkle(Vec2),
    Sticker(Sticker),
    ClearStickers,
}

impl Effect {
    pub fn flag(entity: Entity, flag: Flag, on: bool) -> Self {
        Effect::Flag { entity, flag, on }
    }

    pub fn show(entity: Entity) -> Self {
        Effect::flag(entity, Flag::Visible, true)
    }

    pub fn hide(entity: Entity) -> Self {
        Effect::flag(entity, Flag::Visible, false)
    }
}

/// Buffer of effects produced during one call into the simulation
#[derive(Debug, Default)]
pub struct Effects {
    queue: Vec<Effect>,
    haptics: bool,
}

impl Effects {
    pub fn new(haptics: bool) -> Self {
        Self {
            queue: Vec::new(),
            haptics,
        }
    }

    pub fn push(&mut self, effect: Effect) {
        self.queue.push(effect);
    }

    pub fn flag(&mut self, entity: Entity, flag: Flag, on: bool) {
        self.push(Effect::flag(entity, flag, on));
    }

    pub fn show(&mut self, entity: Entity) {
        self.push(Effect::show(entity));
    }

    pub fn hide(&mut self, entity: Entity) {
        self.push(Effect::hide(entity));
    }

    /// Queue a vibration (dropped when haptics are disabled)
    pub fn vibrate(&mut self, pattern: &[u32]) {
        if self.haptics {
            self.push(Effect::Vibrate(pattern.to_vec()));
        }
    }

    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.queue)
    }

    pub fn as_slice(&self) -> &[Effect] {
        &self.queue
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
