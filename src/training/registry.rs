use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::intent_classifier::IntentClassifier;
use crate::intent_parser::ExactMatcher;
use crate::models::{EntityDefinition, IntentDefinition};
use crate::slot_filler::CrfSlotFiller;
use crate::utils::LanguageCode;

pub struct LanguageModels {
    pub exact_matcher: ExactMatcher,
    pub classifier: Box<dyn IntentClassifier>,
    pub slot_filler: CrfSlotFiller,
}

/// Immutable generation of models, shared by the requests running on it
pub struct LoadedModels {
    pub hash: String,
    pub intents: Vec<IntentDefinition>,
    pub custom_entities: Vec<EntityDefinition>,
    pub languages: HashMap<LanguageCode, Arc<LanguageModels>>,
}

impl LoadedModels {
    pub fn intent(&self, name: &str) -> Option<&IntentDefinition> {
        self.intents.iter().find(|intent| intent.name == name)
    }

    pub fn language(&self, language: &str) -> Option<&Arc<LanguageModels>> {
        self.languages.get(language)
    }
}

/// Holds the current generation. Swapping never disturbs requests holding the previous
/// one.
#[derive(Default)]
pub struct ModelRegistry {
    current: RwLock<Option<Arc<LoadedModels>>>,
}

impl ModelRegistry {
    pub fn snapshot(&self) -> Option<Arc<LoadedModels>> {
        self.current.read().clone()
    }

    pub fn swap(&self, models: LoadedModels) {
        *self.current.write() = Some(Arc::new(models));
    }
}
