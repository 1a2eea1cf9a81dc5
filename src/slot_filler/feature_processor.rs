use crate::models::IntentDefinition;
use crate::slot_filler::features::*;
use crate::tokenization::Token;

/// Features paired across adjacent tokens
const COMBINED_FEATURES: &[&str] = &["word", "entity", "cluster", "weight"];

/// Turns the tokens of an utterance into per-token feature sets. Whitespace tokens are
/// not tagged, they only show through the space features of their neighbours.
#[derive(Debug, Clone, Default)]
pub struct SequenceFeatureProcessor {
    weight_range: WeightRange,
}

impl SequenceFeatureProcessor {
    pub fn new(weight_range: WeightRange) -> Self {
        Self { weight_range }
    }

    pub fn compute_features(
        &self,
        tokens: &[Token],
        intent: &IntentDefinition,
        terms: &IntentTerms,
        mode: FeatureMode,
    ) -> Vec<Vec<Feature>> {
        let allowed_entities = intent.allowed_entities();
        let indexes = taggable_indexes(tokens);
        let base: Vec<Vec<Feature>> = indexes
            .iter()
            .enumerate()
            .map(|(position, &index)| {
                let token = &tokens[index];
                let mut features = vec![
                    get_weight_feature(
                        terms.weight(&token.value.to_lowercase()),
                        self.weight_range,
                    ),
                    get_in_vocab_feature(token, &terms.vocabulary),
                    get_intent_feature(&intent.name),
                    get_position_feature(position, indexes.len()),
                ];
                features.extend(get_cluster_feature(token));
                features.extend(get_word_feature(token, mode));
                features.extend(get_entity_features(token, &allowed_entities, mode));
                features.extend(get_space_features(tokens, index));
                features.extend(get_char_features(token));
                features
            })
            .collect();

        (0..base.len())
            .map(|i| {
                let mut features = base[i].clone();
                if i > 0 {
                    let previous = combine_features(&base[i - 1], &base[i], COMBINED_FEATURES);
                    features.extend(offset(previous, -1));
                }
                if i + 1 < base.len() {
                    let next = combine_features(&base[i], &base[i + 1], COMBINED_FEATURES);
                    features.extend(offset(next, 1));
                }
                features
            })
            .collect()
    }

    pub fn compute_attributes(
        &self,
        tokens: &[Token],
        intent: &IntentDefinition,
        terms: &IntentTerms,
        mode: FeatureMode,
    ) -> Vec<Vec<(String, f32)>> {
        self.compute_features(tokens, intent, terms, mode)
            .iter()
            .map(|features| features.iter().map(Feature::to_attribute).collect())
            .collect()
    }
}

/// Indexes of the tokens receiving a tag
pub fn taggable_indexes(tokens: &[Token]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| !token.is_space)
        .map(|(index, _)| index)
        .collect()
}

fn offset(features: Vec<Feature>, offset: i32) -> Vec<Feature> {
    features
        .into_iter()
        .map(|mut feature| {
            feature.name = format!("{}[{:+}]", feature.name, offset);
            feature
        })
        .collect()
}
