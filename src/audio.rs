//! Background music
//!
//! [`MusicState`] is the pure side: whether playback has been requested, is
//! running, or was rejected, plus mute. The wasm-only [`MusicPlayer`] drives
//! the page's `<audio>` element and reports back whether `play()` resolved.

use crate::consts::MUSIC_VOLUME;

/// Playback lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Never started, or the last attempt was rejected
    Stopped,
    /// `play()` issued, waiting on the browser
    Requested,
    Playing,
}

/// Music state owned by the scene flow
#[derive(Debug, Clone)]
pub struct MusicState {
    playback: Playback,
    muted: bool,
    volume: f32,
}

impl Default for MusicState {
    fn default() -> Self {
        Self::new(MUSIC_VOLUME)
    }
}

impl MusicState {
    pub fn new(volume: f32) -> Self {
        Self {
            playback: Playback::Stopped,
            muted: false,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Volume to apply to the element
    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    /// Ask for playback. Returns true if the host should call `play()`.
    pub fn request(&mut self) -> bool {
        if self.playback != Playback::Stopped {
            return false;
        }
        self.playback = Playback::Requested;
        true
    }

    pub fn on_started(&mut self) {
        self.playback = Playback::Playing;
    }

    /// Rejected playback leaves the music retryable
    pub fn on_failed(&mut self) {
        self.playback = Playback::Stopped;
    }

    /// Flip mute, returning the new muted state
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }
}

#[cfg(target_arch = "wasm32")]
pub use player::MusicPlayer;

#[cfg(target_arch = "wasm32")]
mod player {
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Document, HtmlAudioElement};

    use crate::platform::PlatformError;

    /// Wrapper around the page's `<audio>` element
    #[derive(Clone)]
    pub struct MusicPlayer {
        element: Option<HtmlAudioElement>,
    }

    impl MusicPlayer {
        pub const ELEMENT_ID: &'static str = "bgMusic";

        pub fn from_document(document: &Document) -> Self {
            let element = document
                .get_element_by_id(Self::ELEMENT_ID)
                .and_then(|el| el.dyn_into::<HtmlAudioElement>().ok());
            if element.is_none() {
                log::warn!("No <audio id=\"{}\"> - music disabled", Self::ELEMENT_ID);
            }
            Self { element }
        }

        /// Start buffering silently and log readiness/errors
        pub fn preload(&self) {
            let Some(el) = &self.element else { return };
            el.load();
            el.set_volume(0.0);

            let ready = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                log::info!("Audio ready to play");
            });
            let _ = el
                .add_event_listener_with_callback("canplaythrough", ready.as_ref().unchecked_ref());
            ready.forget();

            let el_clone = el.clone();
            let failed = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let message = el_clone
                    .error()
                    .map(|e| e.message())
                    .unwrap_or_else(|| "Unknown error".into());
                log::warn!("Audio error: {}", message);
            });
            let _ = el.add_event_listener_with_callback("error", failed.as_ref().unchecked_ref());
            failed.forget();
        }

        /// Load and play; resolves once the browser accepted playback
        pub async fn play(&self, volume: f32) -> Result<(), PlatformError> {
            let el = self
                .element
                .as_ref()
                .ok_or(PlatformError::MissingElement(Self::ELEMENT_ID))?;
            el.load();
            let promise = el.play().map_err(PlatformError::from_js)?;
            JsFuture::from(promise)
                .await
                .map_err(PlatformError::from_js)?;
            el.set_volume(volume as f64);
            Ok(())
        }

        pub fn set_volume(&self, volume: f32) {
            if let Some(el) = &self.element {
                el.set_volume(volume as f64);
            }
        }
    }
}
