mod auto_train;
pub mod model_hash;
mod orchestrator;
mod registry;

pub use self::auto_train::AutoTrainer;
pub use self::model_hash::compute_model_hash;
pub use self::orchestrator::Orchestrator;
pub use self::registry::{LanguageModels, LoadedModels, ModelRegistry};

use crate::errors::*;
use crate::intent_classifier::IntentClassifier;
use crate::models::{EntityDefinition, IntentDefinition};
use crate::slot_filler::CrfTagger;

/// Source of truth of the training data
pub trait IntentDefinitionSource: Send + Sync {
    fn get_intents(&self) -> Result<Vec<IntentDefinition>>;

    fn get_intent(&self, name: &str) -> Result<IntentDefinition> {
        self.get_intents()?
            .into_iter()
            .find(|intent| intent.name == name)
            .ok_or_else(|| NluEngineError::UnknownIntent(name.to_string()).into())
    }

    fn get_custom_entities(&self) -> Result<Vec<EntityDefinition>>;
}

/// Builds fresh learners, each trained or loaded model gets its own instance
pub trait LearnerFactory: Send + Sync {
    fn intent_classifier(&self, language: &str) -> Result<Box<dyn IntentClassifier>>;

    fn crf_tagger(&self, language: &str) -> Result<Box<dyn CrfTagger>>;
}
