//! Presentation State Machine
//!
//! Tracks which slide is on screen. The only transitions are `start` and
//! `advance`; there is deliberately no way to jump to an arbitrary slide.

use crate::deck::{Slide, SlideDeck};
use serde::Serialize;
use tokio::time::Instant;

/// Where the presentation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "slide", rename_all = "snake_case")]
pub enum Position {
    NotStarted,
    OnSlide(u32),
    Concluded,
}

/// Illegal transitions. These are reported back to the model, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PresentationError {
    #[error("There are no slides to present.")]
    EmptyDeck,
    #[error("The presentation has already concluded.")]
    AlreadyConcluded,
    #[error("The presentation has not started yet.")]
    NotStarted,
    #[error("The presentation is already under way.")]
    AlreadyStarted,
}

/// Result of an accepted `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advanced {
    /// A new slide is now on screen.
    Slide(Slide),
    /// The last slide was passed.
    Concluded,
}

#[derive(Debug)]
pub struct PresentationState {
    deck: SlideDeck,
    position: Position,
    last_transition_at: Option<Instant>,
}

impl PresentationState {
    pub fn new(deck: SlideDeck) -> Self {
        Self {
            deck,
            position: Position::NotStarted,
            last_transition_at: None,
        }
    }

    /// `NotStarted -> OnSlide(1)`.
    pub fn start(&mut self) -> Result<&Slide, PresentationError> {
        if self.position != Position::NotStarted {
            return Err(PresentationError::AlreadyStarted);
        }
        let first = self.deck.get(1).ok_or(PresentationError::EmptyDeck)?;
        self.position = Position::OnSlide(1);
        self.last_transition_at = Some(Instant::now());
        Ok(first)
    }

    /// `OnSlide(n) -> OnSlide(n + 1)`, or `OnSlide(N) -> Concluded`.
    pub fn advance(&mut self) -> Result<Advanced, PresentationError> {
        let next = match self.position {
            Position::NotStarted => return Err(PresentationError::NotStarted),
            Position::Concluded => return Err(PresentationError::AlreadyConcluded),
            Position::OnSlide(n) => n + 1,
        };

        let outcome = match self.deck.get(next) {
            Some(slide) => {
                self.position = Position::OnSlide(next);
                Advanced::Slide(slide.clone())
            }
            None => {
                self.position = Position::Concluded;
                Advanced::Concluded
            }
        };
        self.last_transition_at = Some(Instant::now());
        Ok(outcome)
    }

    /// Current index (0 before the start) and the slide on screen, if any.
    ///
    /// Once concluded the index stays at the deck length and no slide is returned.
    pub fn current(&self) -> (u32, Option<&Slide>) {
        match self.position {
            Position::NotStarted => (0, None),
            Position::OnSlide(n) => (n, self.deck.get(n)),
            Position::Concluded => (self.deck.len(), None),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn slide_count(&self) -> u32 {
        self.deck.len()
    }

    pub fn last_transition_at(&self) -> Option<Instant> {
        self.last_transition_at
    }
}
