use std::collections::BTreeSet;

use log::debug;

use crate::errors::*;
use crate::models::intent::{DEFAULT_CONTEXT, NONE_INTENT};
use crate::models::IntentDefinition;
use crate::slot_filler::sequence::parse_utterance;
use crate::tokenization::{sanitize_token, LanguageService};
use crate::utils::lowercase_chars;

const NONE_WORDS_PER_UTTERANCE: usize = 3;
const NONE_MAX_UTTERANCES: usize = 100;

/// Builds the `none` intent the classifier learns to fall back on: junk utterances made
/// of words resembling the training vocabulary, in every context of `intents`
pub fn synthesize_none_intent(
    intents: &[IntentDefinition],
    language: &str,
    language_service: &dyn LanguageService,
) -> Result<IntentDefinition> {
    let texts: Vec<String> = intents
        .iter()
        .flat_map(|intent| intent.utterances_for(language).iter())
        .map(|utterance| lowercase_chars(&parse_utterance(utterance).text))
        .collect();
    let text_refs: Vec<&str> = texts.iter().map(|t| &**t).collect();
    let vocabulary: BTreeSet<String> = if text_refs.is_empty() {
        BTreeSet::new()
    } else {
        language_service
            .tokenize(&text_refs, language)?
            .into_iter()
            .flatten()
            .map(|token| sanitize_token(&token))
            .filter(|token| !token.is_empty() && token.chars().all(char::is_alphanumeric))
            .collect()
    };
    let vocabulary: Vec<&str> = vocabulary.iter().map(|w| &**w).collect();
    let junk_words = if vocabulary.is_empty() {
        vec![]
    } else {
        language_service.generate_similar_junk_words(&vocabulary, language)?
    };
    let utterances: Vec<String> = junk_words
        .chunks(NONE_WORDS_PER_UTTERANCE)
        .map(|words| words.join(" "))
        .take(NONE_MAX_UTTERANCES)
        .collect();

    let mut contexts: Vec<String> = intents
        .iter()
        .flat_map(|intent| intent.contexts.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if contexts.is_empty() {
        contexts.push(DEFAULT_CONTEXT.to_string());
    }
    debug!(
        "Synthesized {} '{}' utterances from {} words for language '{}'",
        utterances.len(),
        NONE_INTENT,
        vocabulary.len(),
        language
    );

    let mut none_intent = IntentDefinition {
        name: NONE_INTENT.to_string(),
        contexts,
        utterances: Default::default(),
        slots: vec![],
    };
    none_intent
        .utterances
        .insert(language.to_string(), utterances);
    Ok(none_intent)
}
