mod none_intent;

pub use self::none_intent::synthesize_none_intent;

use crate::errors::*;
use crate::models::{IntentDefinition, IntentPrediction};
use crate::tokenization::Token;

/// Model of one context, as produced by an intent classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ContextModel {
    pub context: String,
    pub payload: Vec<u8>,
}

/// Raw statistical intent learner (SVM-like), one instance per language
pub trait IntentClassifier: Send + Sync {
    /// Trains one model per context found in `intents`
    fn train(&mut self, intents: &[IntentDefinition], language: &str)
        -> Result<Vec<ContextModel>>;

    fn load(&mut self, models: &[ContextModel]) -> Result<()>;

    /// Ranks the intents of `contexts` (all contexts when empty) for an utterance, best
    /// first
    fn predict(
        &self,
        text: &str,
        tokens: &[Token],
        contexts: &[String],
    ) -> Result<Vec<IntentPrediction>>;
}
