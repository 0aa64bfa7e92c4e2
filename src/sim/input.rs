//! Tap input: de-duplication and listener bookkeeping
//!
//! A single physical tap can reach us more than once (touch-end followed by
//! the synthesized click, or one event seen by two listeners). The [`TapGate`]
//! collapses those into one logical tap before any mini-game sees it.

use std::collections::BTreeMap;

use super::scene::{Effect, Effects, Target};
use super::schedule::Owner;

/// Window in which a tap from a different source kind counts as the same tap
pub const DUPLICATE_WINDOW_MS: f64 = 400.0;

/// Kind of DOM event a tap came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapSource {
    /// click / mouse press
    Pointer,
    /// touchstart / touchend
    Touch,
}

/// One qualifying tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    pub target: Target,
    pub source: TapSource,
    /// Event timestamp (ms)
    pub at: f64,
}

impl Tap {
    pub fn new(target: Target, source: TapSource, at: f64) -> Self {
        Self { target, source, at }
    }

    pub fn pointer(target: Target, at: f64) -> Self {
        Self::new(target, TapSource::Pointer, at)
    }

    pub fn touch(target: Target, at: f64) -> Self {
        Self::new(target, TapSource::Touch, at)
    }
}

/// Drops taps that are echoes of the previously accepted one
#[derive(Debug, Clone, Default)]
pub struct TapGate {
    last: Option<(TapSource, f64)>,
}

impl TapGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the tap should be processed
    pub fn admit(&mut self, tap: &Tap) -> bool {
        if let Some((source, at)) = self.last {
            // Same event delivered to two listeners
            if tap.at == at {
                return false;
            }
            // touchend + synthesized click for one finger lift
            if tap.source != source && (tap.at - at).abs() < DUPLICATE_WINDOW_MS {
                return false;
            }
        }
        self.last = Some((tap.source, tap.at));
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Registry of armed targets; emits attach/detach effects on change
#[derive(Debug, Clone, Default)]
pub struct Listeners {
    armed: BTreeMap<Target, Owner>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `target` for `owner`. Re-arming an armed target is a no-op, so a
    /// target never ends up with two live listener sets.
    pub fn arm(&mut self, target: Target, owner: Owner, fx: &mut Effects) {
        if self.armed.insert(target, owner).is_none() {
            fx.push(Effect::Listen { target, on: true });
        }
    }

    /// Detach `target`. Safe to call when it was never armed.
    pub fn disarm(&mut self, target: Target, fx: &mut Effects) {
        if self.armed.remove(&target).is_some() {
            fx.push(Effect::Listen { target, on: false });
        }
    }

    /// Detach everything `owner` holds
    pub fn disarm_owner(&mut self, owner: Owner, fx: &mut Effects) {
        let targets: Vec<Target> = self
            .armed
            .iter()
            .filter(|(_, o)| **o == owner)
            .map(|(t, _)| *t)
            .collect();
        for target in targets {
            self.disarm(target, fx);
        }
    }

    pub fn is_armed(&self, target: Target) -> bool {
        self.armed.contains_key(&target)
    }

    pub fn armed(&self) -> impl Iterator<Item = Target> + '_ {
        self.armed.keys().copied()
    }
}
