//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Time and viewport size
//! - Haptic feedback (capability-checked)
//! - Installable-app (service worker) registration
//!
//! Every collaborator here is optional. Failures are reported as
//! [`PlatformError`] and logged by the caller; none of them stop the scenes.

use thiserror::Error;

use crate::Viewport;

/// Failures of browser collaborators
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("missing element {0}")]
    MissingElement(&'static str),
    #[error("{0} is not supported here")]
    Unsupported(&'static str),
    #[error("javascript error: {0}")]
    Js(String),
    #[error("invalid settings: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(target_arch = "wasm32")]
impl PlatformError {
    /// Wrap a rejected promise / thrown value
    pub fn from_js(value: wasm_bindgen::JsValue) -> Self {
        let message = value
            .as_string()
            .or_else(|| {
                js_sys::Reflect::get(&value, &"message".into())
                    .ok()
                    .and_then(|m| m.as_string())
            })
            .unwrap_or_else(|| format!("{:?}", value));
        PlatformError::Js(message)
    }
}

/// Service worker script registered at load
pub const SERVICE_WORKER_SCRIPT: &str = "sw.js";

#[cfg(target_arch = "wasm32")]
mod web {
    use js_sys::Reflect;
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;

    use super::PlatformError;
    use crate::Viewport;

    fn has_property(target: &JsValue, name: &str) -> bool {
        Reflect::has(target, &JsValue::from_str(name)).unwrap_or(false)
    }

    /// Milliseconds on the same clock as event and frame timestamps
    pub fn now() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    pub fn viewport() -> Viewport {
        let Some(window) = web_sys::window() else {
            return Viewport::default();
        };
        let width = window.inner_width().ok().and_then(|v| v.as_f64());
        let height = window.inner_height().ok().and_then(|v| v.as_f64());
        match (width, height) {
            (Some(w), Some(h)) => Viewport::new(w as f32, h as f32),
            _ => Viewport::default(),
        }
    }

    pub fn vibrate(pattern: &[u32]) -> Result<(), PlatformError> {
        let navigator = web_sys::window()
            .ok_or(PlatformError::Unsupported("window"))?
            .navigator();
        if !has_property(&navigator, "vibrate") {
            return Err(PlatformError::Unsupported("vibrate"));
        }
        let pattern: js_sys::Array = pattern.iter().map(|&ms| JsValue::from(ms)).collect();
        navigator.vibrate_with_pattern(&pattern);
        Ok(())
    }

    pub fn register_service_worker(script: &'static str) {
        let Some(window) = web_sys::window() else { return };
        let navigator = window.navigator();
        if !has_property(&navigator, "serviceWorker") {
            log::info!("Service workers unsupported - skipping offline install");
            return;
        }
        let promise = navigator.service_worker().register(script);
        wasm_bindgen_futures::spawn_local(async move {
            match JsFuture::from(promise).await {
                Ok(reg) => {
                    let reg: web_sys::ServiceWorkerRegistration = reg.unchecked_into();
                    log::info!("SW registered: {}", reg.scope());
                }
                Err(e) => log::warn!("SW registration failed: {}", PlatformError::from_js(e)),
            }
        });
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::{now, register_service_worker, vibrate, viewport};

/// Native stubs
#[cfg(not(target_arch = "wasm32"))]
pub fn now() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn viewport() -> Viewport {
    Viewport::default()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn vibrate(_pattern: &[u32]) -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported("vibrate"))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn register_service_worker(_script: &'static str) {
    // No-op for native
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_vibrate_is_unsupported() {
        assert!(matches!(vibrate(&[10]), Err(PlatformError::Unsupported("vibrate"))));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PlatformError::MissingElement("#btnYes").to_string(),
            "missing element #btnYes"
        );
    }
}
