//! Behavioural instructions and the opening greeting.
//!
//! The deck's text is baked into the instructions once at session start; tool
//! handlers never read it again.

use crate::deck::SlideDeck;
use std::fmt::Write;
use std::str::FromStr;

/// How slide navigation is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationPolicy {
    /// Ask the user before every `advance_slide`.
    #[default]
    ConfirmEachSlide,
    /// The model moves on when it has finished explaining a slide.
    ModelPaced,
}

impl FromStr for NavigationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirm" | "confirm_each_slide" => Ok(Self::ConfirmEachSlide),
            "autonomous" | "model_paced" => Ok(Self::ModelPaced),
            other => Err(format!(
                "'{other}' is not a navigation policy (expected 'confirm' or 'autonomous')"
            )),
        }
    }
}

/// Builds the model's system instructions for `deck`.
pub fn build_instructions(persona_name: &str, deck: &SlideDeck, policy: NavigationPolicy) -> String {
    let mut out = format!(
        "You are {persona_name}, a friendly presentation assistant. \
         You can see the user's shared screen and hear them speak.\n\n"
    );

    if deck.is_empty() {
        out.push_str(
            "No presentation is loaded for this session. Do not call advance_slide. \
             Explain that the slides are unavailable and offer to help in other ways.\n\n",
        );
    } else {
        let _ = writeln!(out, "THE PRESENTATION HAS {} SLIDES:", deck.len());
        for slide in deck.slides() {
            let text = if slide.text.trim().is_empty() {
                "(no text on this slide)"
            } else {
                slide.text.trim()
            };
            let _ = writeln!(out, "Slide {}: {}", slide.index, text);
        }
        out.push('\n');

        match policy {
            NavigationPolicy::ConfirmEachSlide => out.push_str(
                "Present one slide at a time. NEVER change slides without the user's confirmation: \
                 after explaining a slide, ask whether they are ready to continue and call \
                 advance_slide only once they say yes. Call it exactly once per confirmation.\n",
            ),
            NavigationPolicy::ModelPaced => out.push_str(
                "Present one slide at a time. When you have finished explaining a slide, call \
                 advance_slide exactly once to move on. Do not call it again until you have \
                 spoken about the new slide.\n",
            ),
        }
        out.push_str(
            "The first call to advance_slide shows slide 1. After the last slide, advance_slide \
             reports that the presentation is concluded; then summarise and take questions.\n\n",
        );
    }

    out.push_str(
        "Tools:\n\
         - advance_slide() - show the next slide\n\
         - fill_form_field(field_identifier, value) - fill a field on the user's page\n\
         - click_element(element_description) - click a button or link on the user's page\n",
    );
    out
}

/// The explicit opening turn, so the user always hears something first.
pub fn greeting_prompt(persona_name: &str, deck: &SlideDeck) -> String {
    if deck.is_empty() {
        format!(
            "Greet the user as {persona_name}. Apologise that their presentation could not be \
             loaded, and ask them to upload it again or tell you how else you can help."
        )
    } else {
        format!(
            "Greet the user as {persona_name}. Tell them you will walk through their {}-slide \
             presentation and ask whether they are ready to begin.",
            deck.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::SlideRecord;

    fn sample_deck() -> SlideDeck {
        SlideDeck::from_records(vec![
            SlideRecord {
                slide_number: 1,
                image_url: "/slides/Slide1.jpg".into(),
                content: "Title: Quarterly Review".into(),
            },
            SlideRecord {
                slide_number: 2,
                image_url: "/slides/Slide2.jpg".into(),
                content: "".into(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_instructions_embed_deck_text_and_count() {
        let text = build_instructions("Maya", &sample_deck(), NavigationPolicy::ConfirmEachSlide);
        assert!(text.contains("You are Maya"));
        assert!(text.contains("THE PRESENTATION HAS 2 SLIDES"));
        assert!(text.contains("Slide 1: Title: Quarterly Review"));
        assert!(text.contains("Slide 2: (no text on this slide)"));
        assert!(text.contains("NEVER change slides without the user's confirmation"));
    }

    #[test]
    fn test_model_paced_policy_changes_wording() {
        let text = build_instructions("Maya", &sample_deck(), NavigationPolicy::ModelPaced);
        assert!(!text.contains("NEVER change slides"));
        assert!(text.contains("When you have finished explaining a slide"));
    }

    #[test]
    fn test_empty_deck_instructions_and_greeting() {
        let deck = SlideDeck::empty();
        let text = build_instructions("Maya", &deck, NavigationPolicy::ConfirmEachSlide);
        assert!(text.contains("No presentation is loaded"));
        assert!(greeting_prompt("Maya", &deck).contains("Apologise"));
    }

    #[test]
    fn test_greeting_names_slide_count() {
        assert!(greeting_prompt("Maya", &sample_deck()).contains("2-slide presentation"));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("confirm".parse(), Ok(NavigationPolicy::ConfirmEachSlide));
        assert_eq!("Autonomous".parse(), Ok(NavigationPolicy::ModelPaced));
        assert!("sometimes".parse::<NavigationPolicy>().is_err());
    }
}
