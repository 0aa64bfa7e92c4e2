//! Choreography: delayed, owned, cancellable steps
//!
//! Staged reveals are written as a list of `(delay, step)` pairs instead of
//! nested timers. Every step carries an [`Owner`]; leaving a scene cancels all
//! of that scene's pending steps at once, so nothing stale can fire into a
//! torn-down scene.

use super::scene::Scene;

/// Who a pending step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Scene hand-off bookkeeping (survives scene teardown)
    Flow,
    /// Cosmetic effects that outlive their scene (petal fade-out)
    Effects,
    /// Scene-local choreography
    Scene(Scene),
}

/// Handle to a single pending step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u64);

#[derive(Debug, Clone)]
struct Pending<S> {
    id: StepId,
    due: f64,
    owner: Owner,
    step: S,
}

/// Ordered set of pending steps, keyed by due time then insertion order
#[derive(Debug, Clone)]
pub struct Choreography<S> {
    pending: Vec<Pending<S>>,
    next_id: u64,
}

impl<S> Default for Choreography<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Choreography<S> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedule `step` to run `delay_ms` after `now`
    pub fn after(&mut self, now: f64, delay_ms: f64, owner: Owner, step: S) -> StepId {
        let id = StepId(self.next_id);
        self.next_id += 1;
        self.pending.push(Pending {
            id,
            due: now + delay_ms.max(0.0),
            owner,
            step,
        });
        id
    }

    /// Schedule a chain where each delay is measured from the previous step
    /// (`delay a; step; delay b; step; ...`). Returns the total duration.
    pub fn sequence<I>(&mut self, now: f64, owner: Owner, steps: I) -> f64
    where
        I: IntoIterator<Item = (f64, S)>,
    {
        let mut offset = 0.0;
        for (delay_ms, step) in steps {
            offset += delay_ms.max(0.0);
            self.after(now, offset, owner, step);
        }
        offset
    }

    /// Cancel one pending step. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, id: StepId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    /// Cancel every pending step of `owner`, returning how many were dropped
    pub fn cancel_owner(&mut self, owner: Owner) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.owner != owner);
        before - self.pending.len()
    }

    /// Remove and return the earliest step due at or before `now`
    pub fn pop_due(&mut self, now: f64) -> Option<(Owner, S)> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= now)
            .min_by(|(_, a), (_, b)| {
                a.due
                    .partial_cmp(&b.due)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.0.cmp(&b.id.0))
            })
            .map(|(i, _)| i)?;
        let p = self.pending.remove(idx);
        Some((p.owner, p.step))
    }

    /// Due time of the next pending step
    pub fn next_due(&self) -> Option<f64> {
        self.pending
            .iter()
            .map(|p| p.due)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn pending_for(&self, owner: Owner) -> usize {
        self.pending.iter().filter(|p| p.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
