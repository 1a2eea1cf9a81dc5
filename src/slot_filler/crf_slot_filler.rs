use std::collections::{HashMap, HashSet};

use failure::{format_err, ResultExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::models::{EntityMatch, IntentDefinition, Slot};
use crate::slot_filler::crf_utils::tags_to_slots;
use crate::slot_filler::feature_processor::{taggable_indexes, SequenceFeatureProcessor};
use crate::slot_filler::features::{FeatureMode, IntentTerms};
use crate::slot_filler::sequence::Sequence;
use crate::slot_filler::{CrfTagger, TaggedFeatures};
use crate::tokenization::Token;
use crate::utils::IntentName;

/// Serialized companion of the tagger model: per intent term weights, normalized to
/// `[0, 1]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotLanguageModel {
    pub term_weights: HashMap<IntentName, HashMap<String, f32>>,
}

impl SlotLanguageModel {
    /// TF-IDF of the words of each intent, an intent being a document
    pub fn from_sequences(sequences: &[Sequence]) -> Self {
        let mut counts: HashMap<&str, HashMap<String, usize>> = HashMap::new();
        for sequence in sequences {
            let intent_counts = counts.entry(&*sequence.intent).or_insert_with(HashMap::new);
            for token in sequence.tokens.iter().filter(|t| t.is_word) {
                *intent_counts.entry(token.value.to_lowercase()).or_insert(0) += 1;
            }
        }
        let documents = counts.len() as f32;
        let mut document_frequencies: HashMap<&str, usize> = HashMap::new();
        for intent_counts in counts.values() {
            for term in intent_counts.keys() {
                *document_frequencies.entry(&**term).or_insert(0) += 1;
            }
        }

        let term_weights = counts
            .iter()
            .map(|(intent, intent_counts)| {
                let total = intent_counts.values().sum::<usize>() as f32;
                let scores: HashMap<String, f32> = intent_counts
                    .iter()
                    .map(|(term, count)| {
                        let df = document_frequencies.get(&**term).cloned().unwrap_or(0) as f32;
                        let idf = ((1.0 + documents) / (1.0 + df)).ln() + 1.0;
                        (term.clone(), *count as f32 / total * idf)
                    })
                    .collect();
                let max = scores.values().cloned().fold(0.0, f32::max);
                let normalized = scores
                    .into_iter()
                    .map(|(term, score)| (term, if max > 0.0 { score / max } else { 0.0 }))
                    .collect();
                (intent.to_string(), normalized)
            })
            .collect();
        Self { term_weights }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotFillerPayloads {
    pub language: Vec<u8>,
    pub crf: Vec<u8>,
}

/// Slot tagger of one language: feature engineering around an opaque sequence learner
pub struct CrfSlotFiller {
    tagger: Box<dyn CrfTagger>,
    feature_processor: SequenceFeatureProcessor,
    terms: HashMap<IntentName, IntentTerms>,
}

impl CrfSlotFiller {
    pub fn train(
        tagger: &mut dyn CrfTagger,
        feature_processor: &SequenceFeatureProcessor,
        sequences: &[Sequence],
        intents: &[IntentDefinition],
    ) -> Result<SlotFillerPayloads> {
        let language_model = SlotLanguageModel::from_sequences(sequences);
        let terms = build_terms(&language_model, sequences);
        let empty_terms = IntentTerms::default();
        let training_data: Vec<TaggedFeatures> = sequences
            .iter()
            .filter_map(|sequence| {
                let intent = intents.iter().find(|i| i.name == sequence.intent)?;
                let features = feature_processor.compute_attributes(
                    &sequence.tokens,
                    intent,
                    terms.get(&sequence.intent).unwrap_or(&empty_terms),
                    FeatureMode::Train,
                );
                Some(TaggedFeatures {
                    features,
                    labels: sequence.tags.clone(),
                })
            })
            .collect();
        info!("Training slot tagger on {} sequences", training_data.len());
        let crf = tagger.train(&training_data)?;
        let language = serde_json::to_vec(&language_model)?;
        Ok(SlotFillerPayloads { language, crf })
    }

    pub fn load(
        mut tagger: Box<dyn CrfTagger>,
        feature_processor: SequenceFeatureProcessor,
        sequences: &[Sequence],
        language_payload: &[u8],
        crf_payload: &[u8],
    ) -> Result<Self> {
        let language_model: SlotLanguageModel = serde_json::from_slice(language_payload)
            .with_context(|_| "Cannot deserialize slot language model")?;
        tagger.load(crf_payload)?;
        Ok(Self {
            tagger,
            feature_processor,
            terms: build_terms(&language_model, sequences),
        })
    }

    /// Tags `tokens` (the tokenization of `text`) as slots of `intent`
    pub fn extract(
        &self,
        text: &str,
        intent: &IntentDefinition,
        entities: &[EntityMatch],
        tokens: &[Token],
    ) -> Result<Vec<Slot>> {
        if intent.slots.is_empty() {
            return Ok(vec![]);
        }
        let taggable: Vec<&Token> = taggable_indexes(tokens)
            .into_iter()
            .map(|index| &tokens[index])
            .collect();
        if taggable.is_empty() {
            return Ok(vec![]);
        }
        let empty_terms = IntentTerms::default();
        let features = self.feature_processor.compute_attributes(
            tokens,
            intent,
            self.terms.get(&intent.name).unwrap_or(&empty_terms),
            FeatureMode::Predict,
        );
        let tags = self.tagger.tag(&features)?;
        if tags.len() != taggable.len() {
            return Err(format_err!(
                "Tagger returned {} tags for {} tokens",
                tags.len(),
                taggable.len()
            ));
        }
        let slots = tags_to_slots(text, &taggable, &tags, intent, entities);
        debug!("Extracted {} slots for intent '{}'", slots.len(), intent.name);
        Ok(slots)
    }
}

fn build_terms(
    language_model: &SlotLanguageModel,
    sequences: &[Sequence],
) -> HashMap<IntentName, IntentTerms> {
    let mut vocabularies: HashMap<&str, HashSet<String>> = HashMap::new();
    for sequence in sequences {
        vocabularies
            .entry(&*sequence.intent)
            .or_insert_with(HashSet::new)
            .extend(
                sequence
                    .tokens
                    .iter()
                    .filter(|t| t.is_word)
                    .map(|t| t.value.to_lowercase()),
            );
    }
    let intents: HashSet<&str> = vocabularies
        .keys()
        .cloned()
        .chain(language_model.term_weights.keys().map(|k| &**k))
        .collect();
    intents
        .into_iter()
        .map(|intent| {
            let terms = IntentTerms {
                weights: language_model
                    .term_weights
                    .get(intent)
                    .cloned()
                    .unwrap_or_default(),
                vocabulary: vocabularies.remove(intent).unwrap_or_default(),
            };
            (intent.to_string(), terms)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::iter::FromIterator;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use maplit::hashmap;

    use super::*;
    use crate::entity_parser::EntityExtractors;
    use crate::models::SlotDefinition;
    use crate::slot_filler::sequence::generate_sequences;
    use crate::testutils::{MockedCrfTagger, MockedSystemEntityExtractor};
    use crate::tokenization::{tokenize_text, UnicodeTokenizer};

    fn intents() -> Vec<IntentDefinition> {
        vec![
            IntentDefinition {
                name: "book_flight".to_string(),
                contexts: vec!["global".to_string()],
                utterances: hashmap! {
                    "en".to_string() => vec![
                        "fly to [paris](destination)".to_string(),
                        "book a flight to [rome](destination)".to_string(),
                    ]
                },
                slots: vec![SlotDefinition {
                    name: "destination".to_string(),
                    entities: vec!["any".to_string()],
                }],
            },
            IntentDefinition {
                name: "greet".to_string(),
                contexts: vec!["global".to_string()],
                utterances: hashmap! {
                    "en".to_string() => vec!["hello".to_string(), "hi there".to_string()]
                },
                slots: vec![],
            },
        ]
    }

    fn sequences() -> Vec<Sequence> {
        let extractors = EntityExtractors::new(Arc::new(MockedSystemEntityExtractor::from_iter(
            vec![],
        )));
        generate_sequences(&intents(), &[], "en", 1, &UnicodeTokenizer, &extractors).unwrap()
    }

    #[test]
    fn test_language_model_weights_are_normalized() {
        // When
        let model = SlotLanguageModel::from_sequences(&sequences());

        // Then
        let flight_weights = &model.term_weights["book_flight"];
        assert_eq!(
            1.0,
            flight_weights.values().cloned().fold(0.0, f32::max)
        );
        assert!(flight_weights.values().all(|w| *w > 0.0 && *w <= 1.0));
        assert!(flight_weights["to"] > flight_weights["paris"]);
        assert!(model.term_weights["greet"].contains_key("hello"));
    }

    #[test]
    fn test_train_then_load_then_extract() {
        // Given
        let sequences = sequences();
        let processor = SequenceFeatureProcessor::default();
        let mut trainer = MockedCrfTagger::default();

        // When
        let payloads =
            CrfSlotFiller::train(&mut trainer, &processor, &sequences, &intents()).unwrap();
        let tagger = MockedCrfTagger::from_iter(vec![(
            "paris".to_string(),
            ("B-destination".to_string(), 0.9),
        )]);
        let calls = tagger.calls.clone();
        let filler = CrfSlotFiller::load(
            Box::new(tagger),
            processor,
            &sequences,
            &payloads.language,
            &payloads.crf,
        )
        .unwrap();
        let text = "fly to paris";
        let tokens = tokenize_text(&UnicodeTokenizer, text, "en").unwrap();
        let slots = filler.extract(text, &intents()[0], &[], &tokens).unwrap();
        let greet_slots = filler.extract("hello", &intents()[1], &[], &tokens).unwrap();

        // Then
        assert_eq!(4, trainer.trained_sequences());
        assert_eq!(1, slots.len());
        assert_eq!("destination", slots[0].name);
        assert_eq!(serde_json::json!("paris"), slots[0].value);
        assert_eq!(7..12, slots[0].range);
        assert!(greet_slots.is_empty());
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }
}
