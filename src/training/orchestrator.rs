use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use failure::format_err;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use super::auto_train::AutoTrainer;
use super::model_hash::compute_model_hash;
use super::registry::{LanguageModels, LoadedModels, ModelRegistry};
use super::{IntentDefinitionSource, LearnerFactory};
use crate::configuration::NluEngineConfig;
use crate::entity_parser::EntityExtractors;
use crate::errors::*;
use crate::intent_classifier::{synthesize_none_intent, ContextModel};
use crate::intent_parser::ExactMatcher;
use crate::language::Languages;
use crate::model_store::ModelStore;
use crate::models::intent::DEFAULT_CONTEXT;
use crate::models::{ArtifactKind, EntityDefinition, IntentDefinition, ModelArtifact};
use crate::slot_filler::sequence::generate_sequences;
use crate::slot_filler::{CrfSlotFiller, SequenceFeatureProcessor};
use crate::tokenization::LanguageService;

#[derive(Debug, Default)]
struct SyncState {
    in_flight: bool,
    rerun_requested: bool,
}

/// Resets the sync state when a sync unwinds before clearing its in-flight flag
struct InFlightGuard<'a> {
    state: &'a Mutex<SyncState>,
    armed: bool,
}

impl<'a> Drop for InFlightGuard<'a> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Sync aborted, clearing in-flight state");
            *self.state.lock() = SyncState::default();
        }
    }
}

struct TrainingSet {
    hash: String,
    intents: Vec<IntentDefinition>,
    custom_entities: Vec<EntityDefinition>,
}

/// Decides, per content hash of the training data, whether models are loaded from the
/// store or retrained, and publishes them in the registry.
///
/// Concurrent syncs are coalesced: a sync requested while another one runs returns
/// immediately and the running one performs exactly one more cycle once done.
pub struct Orchestrator {
    languages: Languages,
    scope: String,
    min_utterances: usize,
    definitions: Arc<dyn IntentDefinitionSource>,
    store: Arc<dyn ModelStore>,
    learners: Arc<dyn LearnerFactory>,
    language_service: Arc<dyn LanguageService>,
    entity_extractors: EntityExtractors,
    feature_processor: SequenceFeatureProcessor,
    registry: Arc<ModelRegistry>,
    state: Mutex<SyncState>,
    current_hash: RwLock<Option<String>>,
    primed: AtomicBool,
    completed_syncs: AtomicUsize,
    auto_trainer: Mutex<Option<AutoTrainer>>,
}

impl Orchestrator {
    pub fn new(
        config: &NluEngineConfig,
        definitions: Arc<dyn IntentDefinitionSource>,
        store: Arc<dyn ModelStore>,
        learners: Arc<dyn LearnerFactory>,
        language_service: Arc<dyn LanguageService>,
        entity_extractors: EntityExtractors,
        registry: Arc<ModelRegistry>,
    ) -> Result<Self> {
        Ok(Self {
            languages: config.languages()?,
            scope: config.scope.clone(),
            min_utterances: config.min_utterances_per_intent,
            definitions,
            store,
            learners,
            language_service,
            entity_extractors,
            feature_processor: SequenceFeatureProcessor::new(config.feature_weight_range),
            registry,
            state: Mutex::new(SyncState::default()),
            current_hash: RwLock::new(None),
            primed: AtomicBool::new(false),
            completed_syncs: AtomicUsize::new(0),
            auto_trainer: Mutex::new(None),
        })
    }

    /// Makes the models of the current training data available, returning their hash
    pub fn ensure_models_ready(&self, force_retrain: bool) -> Result<String> {
        let training_set = self.read_training_set()?;
        {
            let mut state = self.state.lock();
            if state.in_flight {
                debug!("Sync in flight, scheduling a follow-up sync");
                state.rerun_requested = true;
                return Ok(training_set.hash);
            }
            state.in_flight = true;
        }
        let mut guard = InFlightGuard {
            state: &self.state,
            armed: true,
        };

        let mut outcome = self.run_cycle(training_set, force_retrain);
        loop {
            {
                let mut state = self.state.lock();
                if !state.rerun_requested {
                    state.in_flight = false;
                    guard.armed = false;
                    break;
                }
                state.rerun_requested = false;
            }
            info!("Running coalesced sync");
            outcome = self
                .read_training_set()
                .and_then(|training_set| self.run_cycle(training_set, false));
        }
        outcome
    }

    pub fn is_sync_needed(&self) -> Result<bool> {
        let live_hash = self.read_training_set()?.hash;
        Ok(self.current_hash.read().as_ref() != Some(&live_hash))
    }

    pub fn is_sync_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn is_primed(&self) -> bool {
        self.primed.load(Ordering::SeqCst)
    }

    pub fn current_hash(&self) -> Option<String> {
        self.current_hash.read().clone()
    }

    /// Number of sync cycles run so far, coalesced follow-ups included
    pub fn completed_syncs(&self) -> usize {
        self.completed_syncs.load(Ordering::SeqCst)
    }

    /// One step of the staleness timer, returns whether a sync was triggered
    pub fn auto_train_tick(&self) -> Result<bool> {
        if !self.is_primed() || self.is_sync_in_flight() || !self.is_sync_needed()? {
            return Ok(false);
        }
        info!("Training data changed, syncing models");
        self.ensure_models_ready(false)?;
        Ok(true)
    }

    /// Starts the staleness timer, replacing any running one
    pub fn start_auto_train(self: &Arc<Self>, interval: Duration) -> Result<()> {
        let mut auto_trainer = self.auto_trainer.lock();
        if let Some(mut previous) = auto_trainer.take() {
            previous.stop();
        }
        *auto_trainer = Some(AutoTrainer::start(Arc::downgrade(self), interval)?);
        Ok(())
    }

    pub fn stop_auto_train(&self) {
        if let Some(mut auto_trainer) = self.auto_trainer.lock().take() {
            auto_trainer.stop();
        }
    }

    fn read_training_set(&self) -> Result<TrainingSet> {
        let intents = self.definitions.get_intents()?;
        let custom_entities = self.definitions.get_custom_entities()?;
        let hash = compute_model_hash(&intents, &custom_entities)?;
        Ok(TrainingSet {
            hash,
            intents,
            custom_entities,
        })
    }

    fn run_cycle(&self, training_set: TrainingSet, force_retrain: bool) -> Result<String> {
        let start = Instant::now();
        let outcome = self.sync(&training_set, force_retrain);
        self.completed_syncs.fetch_add(1, Ordering::SeqCst);
        info!(
            "Sync of models '{}' done in {} ms",
            training_set.hash,
            start.elapsed().as_millis()
        );
        outcome.map(|_| training_set.hash)
    }

    fn sync(&self, training_set: &TrainingSet, force_retrain: bool) -> Result<()> {
        if !force_retrain && self.models_exist(&training_set.hash)? {
            match self.load_all(training_set, true) {
                Ok(_) => {
                    info!("Loaded cached models '{}'", training_set.hash);
                    self.record(&training_set.hash, true);
                    return Ok(());
                }
                Err(e) => warn!("Cannot load cached models, retraining: {}", e),
            }
        }

        for language in self.languages.supported() {
            if let Err(e) = self.train_language(training_set, language) {
                let failure = NluEngineError::TrainingFailed {
                    language: language.to_string(),
                    reason: e.to_string(),
                };
                error!("{}", failure);
            }
        }
        let all_loaded = self.load_all(training_set, false)?;
        self.record(&training_set.hash, all_loaded);
        Ok(())
    }

    fn record(&self, hash: &str, all_loaded: bool) {
        if all_loaded {
            *self.current_hash.write() = Some(hash.to_string());
        } else {
            warn!("Some languages did not load, models '{}' are not current", hash);
        }
        self.primed.store(true, Ordering::SeqCst);
    }

    fn models_exist(&self, hash: &str) -> Result<bool> {
        for language in self.languages.supported() {
            if !self.store.model_exists(hash, language)? {
                debug!("No models '{}' for language '{}'", hash, language);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn eligible_intents(
        &self,
        intents: &[IntentDefinition],
        language: &str,
    ) -> Vec<IntentDefinition> {
        intents
            .iter()
            .filter(|intent| intent.utterances_for(language).len() >= self.min_utterances)
            .cloned()
            .collect()
    }

    fn train_language(&self, training_set: &TrainingSet, language: &str) -> Result<()> {
        let start = Instant::now();
        let hash = &training_set.hash;
        let intents = self.eligible_intents(&training_set.intents, language);
        info!(
            "Training models '{}' for language '{}' ({} intents)",
            hash,
            language,
            intents.len()
        );

        let mut classifier_intents = intents.clone();
        classifier_intents.push(synthesize_none_intent(
            &intents,
            language,
            &*self.language_service,
        )?);
        let mut classifier = self.learners.intent_classifier(language)?;
        let context_models = classifier.train(&classifier_intents, language)?;
        if context_models.is_empty() {
            return Err(format_err!("Intent classifier produced no model"));
        }
        let mut artifacts: Vec<ModelArtifact> = context_models
            .into_iter()
            .map(|model| {
                ModelArtifact::new(
                    ArtifactKind::Intent,
                    hash,
                    language,
                    &model.context,
                    &self.scope,
                    model.payload,
                )
            })
            .collect();

        let sequences = generate_sequences(
            &intents,
            &training_set.custom_entities,
            language,
            self.min_utterances,
            &*self.language_service,
            &self.entity_extractors,
        )?;
        let mut tagger = self.learners.crf_tagger(language)?;
        let payloads =
            CrfSlotFiller::train(&mut *tagger, &self.feature_processor, &sequences, &intents)?;
        artifacts.push(ModelArtifact::new(
            ArtifactKind::SlotLanguage,
            hash,
            language,
            DEFAULT_CONTEXT,
            &self.scope,
            payloads.language,
        ));
        artifacts.push(ModelArtifact::new(
            ArtifactKind::SlotCrf,
            hash,
            language,
            DEFAULT_CONTEXT,
            &self.scope,
            payloads.crf,
        ));

        self.store.persist_models(&artifacts, language)?;
        info!(
            "Trained {} artifacts for language '{}' in {} ms",
            artifacts.len(),
            language,
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// Loads every language and publishes the new generation. In strict mode the first
    /// failure aborts, otherwise failed languages keep their previous models. Returns
    /// whether every language loaded.
    fn load_all(&self, training_set: &TrainingSet, strict: bool) -> Result<bool> {
        let previous = self.registry.snapshot();
        let mut languages = HashMap::new();
        let mut all_loaded = true;
        for language in self.languages.supported() {
            match self.load_language(training_set, language) {
                Ok(models) => {
                    languages.insert(language.to_string(), Arc::new(models));
                }
                Err(e) if strict => return Err(e),
                Err(e) => {
                    error!("Cannot load models of language '{}': {}", language, e);
                    all_loaded = false;
                    if let Some(models) = previous.as_ref().and_then(|p| p.language(language)) {
                        warn!("Language '{}' keeps serving its previous models", language);
                        languages.insert(language.to_string(), models.clone());
                    }
                }
            }
        }
        self.registry.swap(LoadedModels {
            hash: training_set.hash.clone(),
            intents: training_set.intents.clone(),
            custom_entities: training_set.custom_entities.clone(),
            languages,
        });
        Ok(all_loaded)
    }

    fn load_language(
        &self,
        training_set: &TrainingSet,
        language: &str,
    ) -> Result<LanguageModels> {
        let hash = &training_set.hash;
        let artifacts = self.store.get_models_from_hash(hash, language)?;
        let of_kind = |kind: ArtifactKind| -> Result<Vec<&ModelArtifact>> {
            let selected: Vec<&ModelArtifact> =
                artifacts.iter().filter(|a| a.meta.kind == kind).collect();
            if selected.is_empty() {
                return Err(NluEngineError::ModelArtifactMissing {
                    hash: hash.to_string(),
                    language: language.to_string(),
                    kind,
                }
                .into());
            }
            Ok(selected)
        };
        let intent_models: Vec<ContextModel> = of_kind(ArtifactKind::Intent)?
            .into_iter()
            .map(|artifact| ContextModel {
                context: artifact.meta.context.clone(),
                payload: artifact.payload.clone(),
            })
            .collect();
        let language_artifact = of_kind(ArtifactKind::SlotLanguage)?[0];
        let crf_artifact = of_kind(ArtifactKind::SlotCrf)?[0];

        let mut classifier = self.learners.intent_classifier(language)?;
        classifier.load(&intent_models)?;
        let sequences = generate_sequences(
            &training_set.intents,
            &training_set.custom_entities,
            language,
            self.min_utterances,
            &*self.language_service,
            &self.entity_extractors,
        )?;
        let slot_filler = CrfSlotFiller::load(
            self.learners.crf_tagger(language)?,
            self.feature_processor.clone(),
            &sequences,
            &language_artifact.payload,
            &crf_artifact.payload,
        )?;
        debug!(
            "Loaded {} intent models and the slot tagger of language '{}'",
            intent_models.len(),
            language
        );
        Ok(LanguageModels {
            exact_matcher: ExactMatcher::build(&training_set.intents, language),
            classifier,
            slot_filler,
        })
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop_auto_train();
    }
}
