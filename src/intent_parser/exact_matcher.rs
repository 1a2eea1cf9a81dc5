use std::collections::HashMap;

use log::debug;

use crate::models::intent::DEFAULT_CONTEXT;
use crate::models::{IntentDefinition, IntentPrediction};
use crate::slot_filler::sequence::parse_utterance;
use crate::utils::{sanitize_text, substring_with_char_range, IntentName};

#[derive(Debug, Clone, PartialEq)]
struct IndexedIntent {
    intent: IntentName,
    contexts: Vec<String>,
}

/// Map based intent lookup. The key of a training utterance is its sanitized form with
/// the slot values stripped, which is what the sanitized text of a request looks like
/// once its entities are stripped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExactMatcher {
    map: HashMap<String, Vec<IndexedIntent>>,
}

impl ExactMatcher {
    pub fn build(intents: &[IntentDefinition], language: &str) -> Self {
        let mut sorted_intents: Vec<&IntentDefinition> = intents.iter().collect();
        sorted_intents.sort_by(|a, b| a.name.cmp(&b.name));

        let mut map: HashMap<String, Vec<IndexedIntent>> = HashMap::new();
        for intent in sorted_intents {
            for utterance in intent.utterances_for(language) {
                let key = utterance_key(utterance);
                if key.is_empty() {
                    continue;
                }
                let entries = map.entry(key).or_insert_with(Vec::new);
                if entries.iter().all(|e| e.intent != intent.name) {
                    entries.push(IndexedIntent {
                        intent: intent.name.clone(),
                        contexts: intent.contexts.clone(),
                    });
                }
            }
        }
        debug!(
            "Exact matcher of language '{}' indexed {} utterances",
            language,
            map.len()
        );
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up an already sanitized text. Only intents of `contexts` qualify, any
    /// intent does when `contexts` is empty.
    pub fn find(&self, sanitized_text: &str, contexts: &[String]) -> Option<IntentPrediction> {
        self.map
            .get(sanitized_text)?
            .iter()
            .find_map(|entry| {
                let context = if contexts.is_empty() {
                    entry.contexts.first()
                } else {
                    entry.contexts.iter().find(|c| contexts.contains(c))
                };
                let context = match (context, contexts.is_empty()) {
                    (Some(context), _) => Some(context.clone()),
                    (None, true) => Some(DEFAULT_CONTEXT.to_string()),
                    (None, false) => None,
                };
                context.map(|context| IntentPrediction {
                    name: entry.intent.clone(),
                    context,
                    confidence: 1.0,
                })
            })
    }
}

fn utterance_key(utterance: &str) -> String {
    let annotated = parse_utterance(utterance);
    let mut stripped = String::new();
    let mut cursor = 0;
    for (_, range) in &annotated.slots {
        stripped.push_str(&substring_with_char_range(
            &annotated.text,
            &(cursor..range.start),
        ));
        stripped.push(' ');
        cursor = range.end;
    }
    stripped.push_str(&substring_with_char_range(
        &annotated.text,
        &(cursor..annotated.text.chars().count()),
    ));
    sanitize_text(&stripped)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use maplit::hashmap;

    use super::*;

    fn intent(name: &str, contexts: &[&str], utterances: &[&str]) -> IntentDefinition {
        IntentDefinition {
            name: name.to_string(),
            contexts: contexts.iter().map(|c| c.to_string()).collect(),
            utterances: hashmap! {
                "en".to_string() => utterances.iter().map(|u| u.to_string()).collect()
            },
            slots: vec![],
        }
    }

    #[test]
    fn test_utterance_key_strips_slot_values() {
        assert_eq!(
            "send to please",
            utterance_key("Send [10 dollars](amount) to [Bob](recipient)  please")
        );
    }

    #[test]
    fn test_find_respects_contexts() {
        // Given
        let matcher = ExactMatcher::build(
            &[
                intent("greet", &["global"], &["Hello there", "hi"]),
                intent("start_over", &["support"], &["hi"]),
            ],
            "en",
        );

        // When
        let any_context = matcher.find("hello there", &[]);
        let support = matcher.find("hi", &["support".to_string()]);
        let other = matcher.find("hello there", &["support".to_string()]);

        // Then
        assert_eq!(
            Some(IntentPrediction {
                name: "greet".to_string(),
                context: "global".to_string(),
                confidence: 1.0,
            }),
            any_context
        );
        assert_eq!(Some("start_over".to_string()), support.map(|p| p.name));
        assert_eq!(None, other);
        assert_eq!(2, matcher.len());
    }

    #[test]
    fn test_empty_matcher() {
        // Given
        let mut utterances = HashMap::new();
        utterances.insert("fr".to_string(), vec!["bonjour".to_string()]);
        let french_only = IntentDefinition {
            name: "greet".to_string(),
            contexts: vec![],
            utterances,
            slots: vec![],
        };

        // When
        let matcher = ExactMatcher::build(&[french_only], "en");

        // Then
        assert!(matcher.is_empty());
        assert_eq!(None, matcher.find("bonjour", &[]));
    }
}
