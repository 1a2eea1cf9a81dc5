use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tokenization::Token;

pub const WORD_PREDICT_BOOST: f32 = 3.0;
pub const ENTITY_PREDICT_BOOST: f32 = 3.0;
pub const INTENT_BOOST: f32 = 100.0;
/// Entity feature value of a token overlapped by no allowed entity
pub const NO_ENTITY: &str = "none";
/// Value standing for the missing side of a combined feature
pub const NULL_VALUE: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    Train,
    Predict,
}

impl FeatureMode {
    fn boost(self, predict_boost: f32) -> f32 {
        match self {
            FeatureMode::Train => 1.0,
            FeatureMode::Predict => predict_boost,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Text(String),
    Number(f32),
    Bool(bool),
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeatureValue::Text(text) => write!(f, "{}", text),
            FeatureValue::Number(number) => write!(f, "{}", number),
            FeatureValue::Bool(flag) => write!(f, "{}", flag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    pub value: FeatureValue,
    pub boost: f32,
}

impl Feature {
    pub fn new<S: Into<String>>(name: S, value: FeatureValue) -> Self {
        Self {
            name: name.into(),
            value,
            boost: 1.0,
        }
    }

    pub fn boosted(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Attribute handed to the sequence tagger: `name=value` weighted by the boost
    pub fn to_attribute(&self) -> (String, f32) {
        (format!("{}={}", self.name, self.value), self.boost)
    }
}

/// Normalization range of the term weight buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightRange {
    pub min: f32,
    pub max: f32,
}

impl Default for WeightRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Term weights and vocabulary of one intent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentTerms {
    pub weights: HashMap<String, f32>,
    pub vocabulary: HashSet<String>,
}

impl IntentTerms {
    pub fn weight(&self, token: &str) -> f32 {
        self.weights.get(token).cloned().unwrap_or(0.0)
    }
}

const WEIGHT_BUCKETS: [&str; 3] = ["low", "medium", "high"];

pub fn weight_bucket(score: f32, range: WeightRange) -> &'static str {
    if range.max <= range.min {
        return WEIGHT_BUCKETS[0];
    }
    let ratio = (score - range.min) / (range.max - range.min);
    let index = (ratio * WEIGHT_BUCKETS.len() as f32).floor();
    let index = index.max(0.0).min((WEIGHT_BUCKETS.len() - 1) as f32) as usize;
    WEIGHT_BUCKETS[index]
}

pub fn get_weight_feature(score: f32, range: WeightRange) -> Feature {
    Feature::new(
        "weight",
        FeatureValue::Text(weight_bucket(score, range).to_string()),
    )
}

pub fn get_cluster_feature(token: &Token) -> Option<Feature> {
    token
        .cluster
        .as_ref()
        .map(|cluster| Feature::new("cluster", FeatureValue::Text(cluster.clone())))
}

pub fn get_word_feature(token: &Token, mode: FeatureMode) -> Option<Feature> {
    if !token.is_word || token.has_entities() {
        return None;
    }
    Some(
        Feature::new("word", FeatureValue::Text(token.value.to_lowercase()))
            .boosted(mode.boost(WORD_PREDICT_BOOST)),
    )
}

pub fn get_in_vocab_feature(token: &Token, vocabulary: &HashSet<String>) -> Feature {
    Feature::new(
        "in_vocab",
        FeatureValue::Bool(vocabulary.contains(&token.value.to_lowercase())),
    )
}

/// One feature per allowed entity overlapping the token, `none` if there is no such entity
pub fn get_entity_features(
    token: &Token,
    allowed_entities: &[&str],
    mode: FeatureMode,
) -> Vec<Feature> {
    let boost = mode.boost(ENTITY_PREDICT_BOOST);
    let mut features: Vec<Feature> = token
        .entities
        .iter()
        .filter(|entity| allowed_entities.contains(&&***entity))
        .map(|entity| Feature::new("entity", FeatureValue::Text(entity.clone())).boosted(boost))
        .collect();
    if features.is_empty() {
        features.push(
            Feature::new("entity", FeatureValue::Text(NO_ENTITY.to_string())).boosted(boost),
        );
    }
    features
}

/// Whitespace flags of the raw neighbours of `tokens[index]`, when they exist
pub fn get_space_features(tokens: &[Token], index: usize) -> Vec<Feature> {
    let mut features = vec![];
    if let Some(previous) = index.checked_sub(1).and_then(|i| tokens.get(i)) {
        features.push(Feature::new(
            "space_before",
            FeatureValue::Bool(previous.is_space),
        ));
    }
    if let Some(next) = tokens.get(index + 1) {
        features.push(Feature::new("space_after", FeatureValue::Bool(next.is_space)));
    }
    features
}

pub fn get_char_features(token: &Token) -> Vec<Feature> {
    let (num, alpha, special) =
        token
            .value
            .chars()
            .fold((0, 0, 0), |(num, alpha, special), c| {
                if c.is_numeric() {
                    (num + 1, alpha, special)
                } else if c.is_alphabetic() {
                    (num, alpha + 1, special)
                } else {
                    (num, alpha, special + 1)
                }
            });
    vec![
        Feature::new("num", FeatureValue::Number(num as f32)),
        Feature::new("alpha", FeatureValue::Number(alpha as f32)),
        Feature::new("special", FeatureValue::Number(special as f32)),
    ]
}

pub fn get_intent_feature(intent_name: &str) -> Feature {
    let sanitized: String = intent_name.chars().filter(|c| !c.is_whitespace()).collect();
    Feature::new("intent", FeatureValue::Text(sanitized)).boosted(INTENT_BOOST)
}

/// Quartile (0 to 3) of the token position in a sequence of `count` tokens
pub fn get_position_feature(position: usize, count: usize) -> Feature {
    let quartile = if count == 0 {
        0
    } else {
        (position * 4 / count).min(3)
    };
    Feature::new("position", FeatureValue::Number(quartile as f32))
}

/// Pairs the features named in `names` across two feature sets. The value is
/// `left|right`, an absent side being `null`, and the boost is the highest of both.
pub fn combine_features(left: &[Feature], right: &[Feature], names: &[&str]) -> Vec<Feature> {
    names
        .iter()
        .filter_map(|name| {
            let left_side = side_of(left, name);
            let right_side = side_of(right, name);
            if left_side.is_none() && right_side.is_none() {
                return None;
            }
            let (left_value, left_boost) =
                left_side.unwrap_or_else(|| (NULL_VALUE.to_string(), 0.0));
            let (right_value, right_boost) =
                right_side.unwrap_or_else(|| (NULL_VALUE.to_string(), 0.0));
            Some(
                Feature::new(
                    *name,
                    FeatureValue::Text(format!("{}|{}", left_value, right_value)),
                )
                .boosted(left_boost.max(right_boost)),
            )
        })
        .collect()
}

// Features sharing a name (several entities on a token) are merged into one value
fn side_of(features: &[Feature], name: &str) -> Option<(String, f32)> {
    let matching: Vec<&Feature> = features.iter().filter(|f| f.name == name).collect();
    if matching.is_empty() {
        return None;
    }
    let value = matching
        .iter()
        .map(|f| f.value.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let boost = matching.iter().map(|f| f.boost).fold(0.0, f32::max);
    Some((value, boost))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str, index: usize) -> Token {
        Token::new(value.to_string(), index, 0..value.chars().count())
    }

    #[test]
    fn test_weight_bucket_bounds() {
        // Given
        let range = WeightRange { min: 0.2, max: 0.8 };

        // Then
        assert_eq!("low", weight_bucket(0.2, range));
        assert_eq!("medium", weight_bucket(0.5, range));
        assert_eq!("high", weight_bucket(0.8, range));
        assert_eq!("low", weight_bucket(-3.0, range));
        assert_eq!("high", weight_bucket(7.0, range));
    }

    #[test]
    fn test_word_feature_is_boosted_at_prediction() {
        // Given
        let word = token("Paris", 0);
        let mut entity_word = token("two", 1);
        entity_word.entities = vec!["number".to_string()];

        // When
        let train = get_word_feature(&word, FeatureMode::Train).unwrap();
        let predict = get_word_feature(&word, FeatureMode::Predict).unwrap();

        // Then
        assert_eq!(FeatureValue::Text("paris".to_string()), train.value);
        assert_eq!(1.0, train.boost);
        assert_eq!(WORD_PREDICT_BOOST, predict.boost);
        assert_eq!(None, get_word_feature(&entity_word, FeatureMode::Predict));
        assert_eq!(None, get_word_feature(&token("!", 2), FeatureMode::Train));
    }

    #[test]
    fn test_entity_features_only_keep_allowed_entities() {
        // Given
        let mut two = token("two", 0);
        two.entities = vec!["number".to_string(), "ordinal".to_string()];

        // When
        let features = get_entity_features(&two, &["number", "city"], FeatureMode::Predict);
        let none = get_entity_features(&two, &["city"], FeatureMode::Train);

        // Then
        assert_eq!(
            vec![Feature::new("entity", FeatureValue::Text("number".to_string()))
                .boosted(ENTITY_PREDICT_BOOST)],
            features
        );
        assert_eq!(
            vec![Feature::new("entity", FeatureValue::Text(NO_ENTITY.to_string()))],
            none
        );
    }

    #[test]
    fn test_char_and_intent_features() {
        // When
        let chars = get_char_features(&token("a1-b2c", 0));
        let intent = get_intent_feature("Book Flight");

        // Then
        let attributes: Vec<(String, f32)> = chars.iter().map(|f| f.to_attribute()).collect();
        assert_eq!(
            vec![
                ("num=2".to_string(), 1.0),
                ("alpha=3".to_string(), 1.0),
                ("special=1".to_string(), 1.0),
            ],
            attributes
        );
        assert_eq!(("intent=BookFlight".to_string(), INTENT_BOOST), intent.to_attribute());
    }

    #[test]
    fn test_intents_differing_by_case_get_distinct_features() {
        // When
        let upper = get_intent_feature("Order Coffee");
        let lower = get_intent_feature("order coffee");

        // Then
        assert_ne!(upper.to_attribute(), lower.to_attribute());
    }

    #[test]
    fn test_position_quartiles() {
        let quartiles: Vec<String> = (0..8)
            .map(|p| get_position_feature(p, 8).value.to_string())
            .collect();
        assert_eq!(vec!["0", "0", "1", "1", "2", "2", "3", "3"], quartiles);
    }

    #[test]
    fn test_space_features_look_at_raw_neighbours() {
        // Given
        let tokens = vec![token("hello", 0), token(" ", 1), token("world", 2), token("!", 3)];

        // When
        let features = get_space_features(&tokens, 2);

        // Then
        assert_eq!(
            vec![
                Feature::new("space_before", FeatureValue::Bool(true)),
                Feature::new("space_after", FeatureValue::Bool(false)),
            ],
            features
        );
        assert_eq!(1, get_space_features(&tokens, 0).len());
    }

    #[test]
    fn test_combine_features() {
        // Given
        let left = vec![
            Feature::new("word", FeatureValue::Text("fly".to_string())),
            Feature::new("entity", FeatureValue::Text("none".to_string())).boosted(3.0),
        ];
        let right = vec![
            Feature::new("word", FeatureValue::Text("to".to_string())).boosted(2.0),
            Feature::new("cluster", FeatureValue::Text("00af".to_string())),
        ];

        // When
        let combined = combine_features(&left, &right, &["word", "entity", "cluster", "space"]);

        // Then
        assert_eq!(
            vec![
                Feature::new("word", FeatureValue::Text("fly|to".to_string())).boosted(2.0),
                Feature::new("entity", FeatureValue::Text("none|null".to_string())).boosted(3.0),
                Feature::new("cluster", FeatureValue::Text("null|00af".to_string())),
            ],
            combined
        );
    }
}
