use std::ops::Range;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::entity_parser::{assign_token_entities, EntityExtractors};
use crate::errors::*;
use crate::models::{EntityDefinition, EntityMatch, IntentDefinition};
use crate::slot_filler::feature_processor::taggable_indexes;
use crate::tokenization::{tokenize_text, LanguageService, Token};
use crate::utils::{lowercase_chars, ranges_overlap, IntentName, SlotName};

pub const BEGINNING_PREFIX: &str = "B-";
pub const INSIDE_PREFIX: &str = "I-";
pub const OUTSIDE: &str = "O";

lazy_static! {
    static ref SLOT_MARKUP: Regex = Regex::new(r"\[([^\[\]]+)\]\(([^()\s]+)\)").unwrap();
}

/// Utterance with its slot annotations resolved into character ranges
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedUtterance {
    pub text: String,
    pub slots: Vec<(SlotName, Range<usize>)>,
}

pub fn parse_utterance(utterance: &str) -> AnnotatedUtterance {
    let mut text = String::new();
    let mut slots = vec![];
    let mut cursor = 0;
    for captures in SLOT_MARKUP.captures_iter(utterance) {
        let (whole, value, slot_name) = match (captures.get(0), captures.get(1), captures.get(2))
        {
            (Some(whole), Some(value), Some(slot_name)) => (whole, value, slot_name),
            _ => continue,
        };
        text.push_str(&utterance[cursor..whole.start()]);
        let start = text.chars().count();
        text.push_str(value.as_str());
        slots.push((
            slot_name.as_str().to_string(),
            start..start + value.as_str().chars().count(),
        ));
        cursor = whole.end();
    }
    text.push_str(&utterance[cursor..]);
    AnnotatedUtterance { text, slots }
}

/// Training utterance in tagged form. `tags` holds one label per non whitespace token.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub intent: IntentName,
    pub text: String,
    pub tokens: Vec<Token>,
    pub tags: Vec<String>,
    pub entities: Vec<EntityMatch>,
}

pub fn bio_tags(tokens: &[Token], slots: &[(SlotName, Range<usize>)]) -> Vec<String> {
    let mut previous_slot: Option<&str> = None;
    taggable_indexes(tokens)
        .into_iter()
        .map(|index| {
            let token = &tokens[index];
            let slot = slots
                .iter()
                .find(|(_, range)| ranges_overlap(range, &token.range))
                .map(|(name, _)| &**name);
            let tag = match slot {
                None => OUTSIDE.to_string(),
                Some(name) if previous_slot == Some(name) => format!("{}{}", INSIDE_PREFIX, name),
                Some(name) => format!("{}{}", BEGINNING_PREFIX, name),
            };
            previous_slot = slot;
            tag
        })
        .collect()
}

/// Builds the sequences of the intents with at least `min_utterances` utterances in
/// `language`
pub fn generate_sequences(
    intents: &[IntentDefinition],
    custom_entities: &[EntityDefinition],
    language: &str,
    min_utterances: usize,
    language_service: &dyn LanguageService,
    entity_extractors: &EntityExtractors,
) -> Result<Vec<Sequence>> {
    let mut sequences = vec![];
    for intent in intents {
        let utterances = intent.utterances_for(language);
        if utterances.len() < min_utterances {
            debug!(
                "Skipping sequences of intent '{}' ({} utterances in '{}')",
                intent.name,
                utterances.len(),
                language
            );
            continue;
        }
        for utterance in utterances {
            let annotated = parse_utterance(utterance);
            let text = lowercase_chars(&annotated.text);
            let mut tokens = tokenize_text(language_service, &text, language)?;
            let entities =
                entity_extractors.extract_all(&text, &tokens, custom_entities, language)?;
            assign_token_entities(&mut tokens, &entities);
            let tags = bio_tags(&tokens, &annotated.slots);
            sequences.push(Sequence {
                intent: intent.name.clone(),
                text,
                tokens,
                tags,
                entities,
            });
        }
    }
    Ok(sequences)
}
