//! Slide Deck Model
//!
//! A deck is produced once by the slide-conversion job as a JSON list of
//! `{slide_number, image_url, content}` records. The orchestrator only ever
//! reads that output; a deck never changes for the lifetime of a session.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Failures while reading the conversion job's output.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("Failed to read deck metadata from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Deck metadata is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Slide numbers must run from 1 without gaps; expected {expected}, found {found}")]
    NonContiguous { expected: u32, found: u32 },
}

/// A single record as written by the conversion job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlideRecord {
    pub slide_number: u32,
    pub image_url: String,
    #[serde(default)]
    pub content: String,
}

/// One slide of the deck. `index` is 1-based.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Slide {
    pub index: u32,
    pub image_reference: String,
    pub text: String,
}

impl From<SlideRecord> for Slide {
    fn from(record: SlideRecord) -> Self {
        Self {
            index: record.slide_number,
            image_reference: record.image_url,
            text: record.content,
        }
    }
}

/// An ordered, contiguous, 1-based sequence of slides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideDeck {
    slides: Vec<Slide>,
}

impl SlideDeck {
    /// Builds a deck, checking that indices run `1..=N` in order.
    pub fn new(slides: Vec<Slide>) -> Result<Self, DeckError> {
        for (position, slide) in slides.iter().enumerate() {
            let expected = position as u32 + 1;
            if slide.index != expected {
                return Err(DeckError::NonContiguous {
                    expected,
                    found: slide.index,
                });
            }
        }
        Ok(Self { slides })
    }

    /// A deck with no slides.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a deck from conversion records, which may arrive in any order.
    pub fn from_records(mut records: Vec<SlideRecord>) -> Result<Self, DeckError> {
        records.sort_by_key(|r| r.slide_number);
        Self::new(records.into_iter().map(Slide::from).collect())
    }

    /// Parses the conversion job's JSON output. Blank input is an empty deck.
    pub fn from_json(json: &str) -> Result<Self, DeckError> {
        if json.trim().is_empty() {
            return Ok(Self::empty());
        }
        let records: Vec<SlideRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Reads and parses the deck metadata file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DeckError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DeckError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_json(&json)
    }

    /// Reads the deck, degrading to an empty deck when the file is absent or corrupt.
    pub async fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path).await {
            Ok(deck) => {
                info!(path = %path.display(), slide_count = deck.len(), "Loaded slide deck");
                deck
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Deck metadata unavailable; continuing with an empty deck");
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> u32 {
        self.slides.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Returns the slide with the given 1-based index.
    pub fn get(&self, index: u32) -> Option<&Slide> {
        index
            .checked_sub(1)
            .and_then(|i| self.slides.get(i as usize))
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }
}
