//! API Models
//!
//! Response bodies of the HTTP API, documented for OpenAPI with `utoipa`.

use presenter_core::deck::SlideDeck;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Everything a display surface needs to join a room.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    #[schema(example = "ws://localhost:8000")]
    pub server_url: String,
    #[schema(example = "room_4821")]
    pub room_name: String,
    #[schema(example = "eyJhbGciOiJIUzI1NiJ9...")]
    pub participant_token: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SlideSummary {
    #[schema(example = 1)]
    pub slide_number: u32,
    #[schema(example = "/slides/Slide1.jpg")]
    pub image_url: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct DeckSummary {
    pub slide_count: u32,
    pub slides: Vec<SlideSummary>,
}

impl From<&SlideDeck> for DeckSummary {
    fn from(deck: &SlideDeck) -> Self {
        Self {
            slide_count: deck.len(),
            slides: deck
                .slides()
                .iter()
                .map(|s| SlideSummary {
                    slide_number: s.index,
                    image_url: s.image_reference.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
