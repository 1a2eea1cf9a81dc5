pub mod configuration;
pub mod entity_parser;
pub mod errors;
mod intent_classifier;
mod intent_parser;
mod language;
pub mod model_store;
pub mod models;
mod nlu_engine;
pub mod pipeline;
pub mod slot_filler;
#[cfg(test)]
mod testutils;
pub mod tokenization;
pub mod training;
mod utils;

/// Version of the model format, part of the content hash of every model
pub const MODEL_VERSION: &str = "1.0.0";

pub use crate::configuration::{NluEngineConfig, RetryConfig};
pub use crate::errors::*;
pub use crate::intent_classifier::{ContextModel, IntentClassifier};
pub use crate::intent_parser::{elect_intent, rank_predictions, Election, ExactMatcher};
pub use crate::language::{LanguageIdentifier, Languages};
pub use crate::model_store::{FileModelStore, InMemoryModelStore, ModelStore};
pub use crate::models::*;
pub use crate::nlu_engine::{Collaborators, NluEngine};
pub use crate::pipeline::{ExtractionContext, ExtractionResult, RetryPolicy, Stage};
pub use crate::slot_filler::{CrfSlotFiller, CrfTagger, TaggedFeatures};
pub use crate::tokenization::{LanguageService, Token, UnicodeTokenizer};
pub use crate::training::{IntentDefinitionSource, LearnerFactory};
pub use crate::utils::{EntityName, IntentName, LanguageCode, SlotName};
