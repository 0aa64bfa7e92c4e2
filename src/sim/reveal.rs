//! Progressive reveal: the letter and the message
//!
//! Both scenes show an ordered list of units one tap at a time and leave on
//! the tap after the last one. The letter additionally has to be opened first.

use super::scene::{Effects, Entity};

/// Reveal cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    /// Not tappable yet (choreography still running)
    Pending,
    /// `cursor` units are visible
    Revealing { cursor: usize },
    Complete,
}

/// Result of one logical "advance" action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Ignored,
    /// Unit at this index was just shown
    Revealed(usize),
    /// Tap after the last unit; fires exactly once
    Finished,
}

/// Ordered sequence of reveal units behind a cursor
#[derive(Debug, Clone)]
pub struct Reveal {
    len: usize,
    unit: fn(usize) -> Entity,
    state: RevealState,
}

impl Reveal {
    pub fn new(len: usize, unit: fn(usize) -> Entity) -> Self {
        Self {
            len,
            unit,
            state: RevealState::Pending,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        match self.state {
            RevealState::Pending => 0,
            RevealState::Revealing { cursor } => cursor,
            RevealState::Complete => self.len,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == RevealState::Complete
    }

    /// Hide every unit (fresh session)
    pub fn reset(&self, fx: &mut Effects) {
        for i in 0..self.len {
            fx.hide((self.unit)(i));
        }
    }

    /// Make the reveal tappable with nothing shown yet
    pub fn unlock(&mut self) {
        if self.state == RevealState::Pending {
            self.state = RevealState::Revealing { cursor: 0 };
        }
    }

    /// Make the reveal tappable, showing the first unit
    pub fn start(&mut self, fx: &mut Effects) {
        if self.state != RevealState::Pending {
            return;
        }
        if self.len > 0 {
            fx.show((self.unit)(0));
            self.state = RevealState::Revealing { cursor: 1 };
        } else {
            self.state = RevealState::Revealing { cursor: 0 };
        }
    }

    /// Show the next unit, or finish when all are visible
    pub fn advance(&mut self, fx: &mut Effects) -> Advance {
        let RevealState::Revealing { cursor } = self.state else {
            return Advance::Ignored;
        };

        fx.vibrate(&[8]);
        if cursor < self.len {
            fx.show((self.unit)(cursor));
            self.state = RevealState::Revealing { cursor: cursor + 1 };
            Advance::Revealed(cursor)
        } else {
            self.state = RevealState::Complete;
            Advance::Finished
        }
    }
}

/// Envelope stage of the letter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Sealed,
    /// Flap animation running
    Opening,
    /// Letter paper is out
    Expanded,
}

/// LoveLetter session: open the envelope, then read
#[derive(Debug, Clone)]
pub struct Letter {
    envelope: EnvelopeState,
    reveal: Reveal,
}

impl Letter {
    pub fn new(paragraphs: usize) -> Self {
        Self {
            envelope: EnvelopeState::Sealed,
            reveal: Reveal::new(paragraphs, Entity::LetterParagraph),
        }
    }

    pub fn envelope(&self) -> EnvelopeState {
        self.envelope
    }

    pub fn reveal(&self) -> &Reveal {
        &self.reveal
    }

    pub fn is_complete(&self) -> bool {
        self.reveal.is_complete()
    }

    /// First envelope tap opens it; returns false for every later tap
    pub fn open(&mut self) -> bool {
        if self.envelope != EnvelopeState::Sealed {
            return false;
        }
        self.envelope = EnvelopeState::Opening;
        true
    }

    pub fn expand(&mut self) {
        if self.envelope == EnvelopeState::Opening {
            self.envelope = EnvelopeState::Expanded;
        }
    }

    /// Paper is settled; the next tap shows the first paragraph
    pub fn start_reading(&mut self) {
        if self.envelope == EnvelopeState::Expanded {
            self.reveal.unlock();
        }
    }

    pub fn advance(&mut self, fx: &mut Effects) -> Advance {
        if self.envelope != EnvelopeState::Expanded {
            return Advance::Ignored;
        }
        self.reveal.advance(fx)
    }

    pub fn reset(&self, fx: &mut Effects) {
        self.reveal.reset(fx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scene::Effect;

    #[test]
    fn test_pending_reveal_ignores_taps() {
        let mut fx = Effects::new(true);
        let mut reveal = Reveal::new(3, Entity::MessageLine);
        assert_eq!(reveal.advance(&mut fx), Advance::Ignored);
        assert!(fx.is_empty());
    }

    #[test]
    fn test_reveal_then_finish_once() {
        let mut fx = Effects::new(true);
        let mut reveal = Reveal::new(3, Entity::MessageLine);
        reveal.start(&mut fx);
        assert_eq!(reveal.cursor(), 1);

        assert_eq!(reveal.advance(&mut fx), Advance::Revealed(1));
        assert_eq!(reveal.advance(&mut fx), Advance::Revealed(2));
        assert_eq!(reveal.advance(&mut fx), Advance::Finished);
        for _ in 0..4 {
            assert_eq!(reveal.advance(&mut fx), Advance::Ignored);
        }
        assert!(reveal.is_complete());
    }

    #[test]
    fn test_start_twice_does_not_skip() {
        let mut fx = Effects::new(true);
        let mut reveal = Reveal::new(2, Entity::MessageLine);
        reveal.start(&mut fx);
        reveal.start(&mut fx);
        assert_eq!(reveal.cursor(), 1);
    }

    #[test]
    fn test_unlock_reveals_from_zero() {
        let mut fx = Effects::new(true);
        let mut reveal = Reveal::new(2, Entity::LetterParagraph);
        reveal.unlock();
        assert_eq!(reveal.cursor(), 0);
        assert_eq!(reveal.advance(&mut fx), Advance::Revealed(0));
        reveal.unlock();
        assert_eq!(reveal.cursor(), 1);
    }

    #[test]
    fn test_empty_reveal_finishes_on_first_tap() {
        let mut fx = Effects::new(true);
        let mut reveal = Reveal::new(0, Entity::MessageLine);
        reveal.start(&mut fx);
        assert_eq!(reveal.advance(&mut fx), Advance::Finished);
    }

    #[test]
    fn test_reveal_shows_the_right_unit() {
        let mut fx = Effects::new(false);
        let mut reveal = Reveal::new(2, Entity::LetterParagraph);
        reveal.start(&mut fx);
        reveal.advance(&mut fx);
        assert_eq!(
            fx.drain(),
            vec![
                Effect::show(Entity::LetterParagraph(0)),
                Effect::show(Entity::LetterParagraph(1))
            ]
        );
    }

    #[test]
    fn test_letter_gated_by_envelope() {
        let mut fx = Effects::new(true);
        let mut letter = Letter::new(2);

        assert_eq!(letter.advance(&mut fx), Advance::Ignored);
        assert!(letter.open());
        assert!(!letter.open());
        assert_eq!(letter.advance(&mut fx), Advance::Ignored);

        letter.expand();
        // Expanded but the first paragraph is not out yet
        assert_eq!(letter.advance(&mut fx), Advance::Ignored);

        letter.start_reading();
        assert_eq!(letter.advance(&mut fx), Advance::Revealed(0));
        assert_eq!(letter.advance(&mut fx), Advance::Revealed(1));
        assert_eq!(letter.advance(&mut fx), Advance::Finished);
        assert!(letter.is_complete());
    }
}
