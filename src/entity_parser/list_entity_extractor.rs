use regex::RegexBuilder;

use crate::errors::*;
use crate::models::{EntityDefinition, EntityDefinitionKind, EntityKind, EntityMatch};
use crate::tokenization::Token;
use crate::utils::{convert_to_char_range, substring_with_char_range};

const FUZZY_MIN_LENGTH: usize = 4;
const FUZZY_CONFIDENCE: f32 = 0.8;

pub trait ListEntityExtractor: Send + Sync {
    fn extract_lists(
        &self,
        text: &str,
        tokens: &[Token],
        definitions: &[EntityDefinition],
    ) -> Result<Vec<EntityMatch>>;
}

/// Finds list values and their synonyms on word boundaries. Fuzzy lists also accept
/// single words one edit away from a value.
#[derive(Debug, Default)]
pub struct ExactListExtractor;

impl ListEntityExtractor for ExactListExtractor {
    fn extract_lists(
        &self,
        text: &str,
        tokens: &[Token],
        definitions: &[EntityDefinition],
    ) -> Result<Vec<EntityMatch>> {
        let mut entities = vec![];
        for definition in definitions {
            let (occurrences, fuzzy) = match &definition.kind {
                EntityDefinitionKind::List { occurrences, fuzzy } => (occurrences, *fuzzy),
                _ => continue,
            };
            for occurrence in occurrences {
                let candidates =
                    std::iter::once(&occurrence.name).chain(occurrence.synonyms.iter());
                for candidate in candidates.filter(|c| !c.trim().is_empty()) {
                    let pattern = format!(r"\b{}\b", regex::escape(candidate.trim()));
                    let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
                    entities.extend(regex.find_iter(text).map(|m| {
                        entity_match(definition, &occurrence.name, text, m.start()..m.end())
                    }));
                    if fuzzy && !candidate.contains(char::is_whitespace) {
                        entities.extend(fuzzy_matches(
                            definition,
                            &occurrence.name,
                            candidate,
                            text,
                            tokens,
                        ));
                    }
                }
            }
        }
        Ok(entities)
    }
}

fn entity_match(
    definition: &EntityDefinition,
    value: &str,
    text: &str,
    byte_range: std::ops::Range<usize>,
) -> EntityMatch {
    let range = convert_to_char_range(text, &byte_range);
    EntityMatch {
        name: definition.name.clone(),
        kind: EntityKind::List,
        source: text[byte_range].to_string(),
        value: serde_json::Value::String(value.to_string()),
        confidence: 1.0,
        range,
    }
}

fn fuzzy_matches(
    definition: &EntityDefinition,
    value: &str,
    candidate: &str,
    text: &str,
    tokens: &[Token],
) -> Vec<EntityMatch> {
    let candidate = candidate.to_lowercase();
    if candidate.chars().count() < FUZZY_MIN_LENGTH {
        return vec![];
    }
    tokens
        .iter()
        .filter(|token| token.is_word)
        .filter(|token| {
            let word = token.value.to_lowercase();
            word != candidate && strsim::levenshtein(&word, &candidate) == 1
        })
        .map(|token| EntityMatch {
            name: definition.name.clone(),
            kind: EntityKind::List,
            source: substring_with_char_range(text, &token.range),
            value: serde_json::Value::String(value.to_string()),
            confidence: FUZZY_CONFIDENCE,
            range: token.range.clone(),
        })
        .collect()
}
