use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::configuration::NluEngineConfig;
use crate::entity_parser::{
    CachingSystemEntityExtractor, EntityExtractors, SystemEntityExtractor,
};
use crate::errors::*;
use crate::language::{LanguageIdentifier, Languages};
use crate::model_store::ModelStore;
use crate::pipeline::{run_pipeline, ExtractionResult, RetryPolicy, StageEnvironment};
use crate::tokenization::LanguageService;
use crate::training::{IntentDefinitionSource, LearnerFactory, ModelRegistry, Orchestrator};

/// External services an engine relies on
pub struct Collaborators {
    pub definitions: Arc<dyn IntentDefinitionSource>,
    pub store: Arc<dyn ModelStore>,
    pub learners: Arc<dyn LearnerFactory>,
    pub language_service: Arc<dyn LanguageService>,
    pub language_identifier: Arc<dyn LanguageIdentifier>,
    pub system_entities: Arc<dyn SystemEntityExtractor>,
}

/// NLU engine of a single bot: keeps its models in sync with the training data and
/// extracts language, intent, entities and slots from user text
pub struct NluEngine {
    config: NluEngineConfig,
    languages: Languages,
    retry_policy: RetryPolicy,
    language_identifier: Arc<dyn LanguageIdentifier>,
    language_service: Arc<dyn LanguageService>,
    entity_extractors: EntityExtractors,
    registry: Arc<ModelRegistry>,
    orchestrator: Arc<Orchestrator>,
}

impl NluEngine {
    pub fn from_path<P: AsRef<Path>>(
        config_path: P,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let config = NluEngineConfig::from_path(config_path)?;
        Self::new(config, collaborators)
    }

    pub fn new(config: NluEngineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let languages = config.languages()?;
        let system_entities = CachingSystemEntityExtractor::new(
            collaborators.system_entities,
            config.system_entity_cache_capacity,
        );
        let entity_extractors = EntityExtractors::new(Arc::new(system_entities));
        let registry = Arc::new(ModelRegistry::default());
        let orchestrator = Orchestrator::new(
            &config,
            collaborators.definitions,
            collaborators.store,
            collaborators.learners,
            collaborators.language_service.clone(),
            entity_extractors.clone(),
            registry.clone(),
        )?;
        info!(
            "NLU engine of '{}' serving languages {:?}",
            config.scope,
            languages.supported()
        );
        Ok(Self {
            retry_policy: RetryPolicy::from(&config.retry),
            config,
            languages,
            language_identifier: collaborators.language_identifier,
            language_service: collaborators.language_service,
            entity_extractors,
            registry,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// Loads or trains the models of the current training data, returning their hash
    pub fn ensure_models_ready(&self, force_retrain: bool) -> Result<String> {
        self.orchestrator.ensure_models_ready(force_retrain)
    }

    pub fn is_sync_needed(&self) -> Result<bool> {
        self.orchestrator.is_sync_needed()
    }

    pub fn is_primed(&self) -> bool {
        self.orchestrator.is_primed()
    }

    pub fn current_hash(&self) -> Option<String> {
        self.orchestrator.current_hash()
    }

    /// Starts the staleness timer when the configuration enables it, returns whether it
    /// runs
    pub fn start_auto_train(&self) -> Result<bool> {
        match self.config.auto_train_interval() {
            Some(interval) => {
                self.orchestrator.start_auto_train(interval)?;
                Ok(true)
            }
            None => {
                info!("Auto-train disabled");
                Ok(false)
            }
        }
    }

    pub fn stop_auto_train(&self) {
        self.orchestrator.stop_auto_train()
    }

    /// Runs the extraction pipeline on `text`. Failures are reported through the
    /// `errored` flag of the result, which then holds what was extracted so far.
    pub fn extract(&self, text: &str, included_contexts: &[String]) -> ExtractionResult {
        let models = self.registry.snapshot();
        let environment = StageEnvironment {
            languages: &self.languages,
            language_identifier: &*self.language_identifier,
            language_service: &*self.language_service,
            entity_extractors: &self.entity_extractors,
            models: models.as_ref().map(|models| &**models),
            confidence_threshold: self.config.confidence_threshold,
        };
        run_pipeline(text, included_contexts, &environment, &self.retry_policy)
    }
}
