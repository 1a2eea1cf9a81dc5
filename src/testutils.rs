use std::collections::{BTreeSet, HashMap};
use std::iter::FromIterator;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use failure::format_err;
use maplit::hashmap;
use parking_lot::RwLock;

use crate::configuration::NluEngineConfig;
use crate::entity_parser::{EntityExtractors, SystemEntityExtractor};
use crate::errors::*;
use crate::intent_classifier::{ContextModel, IntentClassifier};
use crate::language::LanguageIdentifier;
use crate::model_store::{InMemoryModelStore, ModelStore};
use crate::models::{
    EntityDefinition, EntityMatch, IntentDefinition, IntentPrediction, ModelArtifact,
    SlotDefinition,
};
use crate::slot_filler::{CrfTagger, TaggedFeatures};
use crate::tokenization::{Token, UnicodeTokenizer};
use crate::training::{IntentDefinitionSource, LearnerFactory, ModelRegistry, Orchestrator};
use crate::utils::LanguageCode;

pub fn travel_intents() -> Vec<IntentDefinition> {
    vec![
        IntentDefinition {
            name: "book_flight".to_string(),
            contexts: vec!["travel".to_string()],
            utterances: hashmap! {
                "en".to_string() => vec![
                    "book a flight to [paris](destination)".to_string(),
                    "fly to [rome](destination)".to_string(),
                ],
                "fr".to_string() => vec![
                    "réserver un vol pour [paris](destination)".to_string(),
                ],
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
                "en".to_string() => vec!["hello".to_string(), "good morning".to_string()],
                "fr".to_string() => vec!["bonjour".to_string()],
            },
            slots: vec![],
        },
    ]
}

/// Orchestrator serving english only, backed by an in-memory store
pub fn orchestrator_with(
    definitions: Arc<MockedDefinitionSource>,
) -> (Orchestrator, Arc<MockedLearnerFactory>) {
    let learners = Arc::new(MockedLearnerFactory::default());
    let orchestrator = Orchestrator::new(
        &NluEngineConfig::default(),
        definitions,
        Arc::new(InMemoryModelStore::default()),
        learners.clone(),
        Arc::new(UnicodeTokenizer),
        EntityExtractors::new(Arc::new(MockedSystemEntityExtractor::default())),
        Arc::new(ModelRegistry::default()),
    )
    .unwrap();
    (orchestrator, learners)
}

#[derive(Default)]
pub struct MockedSystemEntityExtractor {
    pub mocked_outputs: HashMap<String, Vec<EntityMatch>>,
    pub calls: AtomicUsize,
    failures: AtomicUsize,
}

impl MockedSystemEntityExtractor {
    /// Makes the next `failures` calls fail
    pub fn fail_next(&self, failures: usize) {
        self.failures.store(failures, Ordering::SeqCst);
    }
}

impl SystemEntityExtractor for MockedSystemEntityExtractor {
    fn extract(&self, text: &str, _language: &str) -> Result<Vec<EntityMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining_failures = self.failures.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.failures.store(remaining_failures - 1, Ordering::SeqCst);
            return Err(format_err!("entity service unavailable"));
        }
        Ok(self.mocked_outputs.get(text).cloned().unwrap_or_default())
    }
}

impl FromIterator<(String, Vec<EntityMatch>)> for MockedSystemEntityExtractor {
    fn from_iter<T: IntoIterator<Item = (String, Vec<EntityMatch>)>>(iter: T) -> Self {
        Self {
            mocked_outputs: HashMap::from_iter(iter),
            ..Self::default()
        }
    }
}

pub struct MockedLanguageIdentifier {
    pub detected: Option<LanguageCode>,
}

impl MockedLanguageIdentifier {
    pub fn new(detected: Option<&str>) -> Self {
        Self {
            detected: detected.map(|language| language.to_string()),
        }
    }
}

impl LanguageIdentifier for MockedLanguageIdentifier {
    fn identify(&self, _text: &str) -> Result<Option<LanguageCode>> {
        Ok(self.detected.clone())
    }
}

/// Tags tokens found in `mocked_tags` through their `word` attribute, `O` otherwise
#[derive(Default)]
pub struct MockedCrfTagger {
    pub mocked_tags: HashMap<String, (String, f32)>,
    pub calls: Arc<AtomicUsize>,
    trainings: Arc<AtomicUsize>,
    trained_sequences: usize,
    model: Vec<u8>,
}

impl MockedCrfTagger {
    pub fn trained_sequences(&self) -> usize {
        self.trained_sequences
    }
}

impl CrfTagger for MockedCrfTagger {
    fn train(&mut self, sequences: &[TaggedFeatures]) -> Result<Vec<u8>> {
        self.trainings.fetch_add(1, Ordering::SeqCst);
        self.trained_sequences = sequences.len();
        let labels: BTreeSet<&str> = sequences
            .iter()
            .flat_map(|sequence| sequence.labels.iter().map(|label| &**label))
            .collect();
        Ok(serde_json::to_vec(&labels)?)
    }

    fn load(&mut self, model: &[u8]) -> Result<()> {
        self.model = model.to_vec();
        Ok(())
    }

    fn tag(&self, features: &[Vec<(String, f32)>]) -> Result<Vec<(String, f32)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(features
            .iter()
            .map(|attributes| {
                attributes
                    .iter()
                    .filter_map(|(attribute, _)| attribute.strip_prefix("word="))
                    .find_map(|value| self.mocked_tags.get(value).cloned())
                    .unwrap_or_else(|| ("O".to_string(), 1.0))
            })
            .collect())
    }
}

impl FromIterator<(String, (String, f32))> for MockedCrfTagger {
    fn from_iter<T: IntoIterator<Item = (String, (String, f32))>>(iter: T) -> Self {
        Self {
            mocked_tags: HashMap::from_iter(iter),
            ..Self::default()
        }
    }
}

/// Trains one model per context listing its intents, predicts from `mocked_outputs`
#[derive(Default)]
pub struct MockedIntentClassifier {
    pub mocked_outputs: Arc<HashMap<String, Vec<IntentPrediction>>>,
    predict_calls: Arc<AtomicUsize>,
    trainings: Arc<AtomicUsize>,
    models: Vec<ContextModel>,
}

impl IntentClassifier for MockedIntentClassifier {
    fn train(
        &mut self,
        intents: &[IntentDefinition],
        _language: &str,
    ) -> Result<Vec<ContextModel>> {
        self.trainings.fetch_add(1, Ordering::SeqCst);
        let contexts: BTreeSet<&str> = intents
            .iter()
            .flat_map(|intent| intent.contexts.iter().map(|context| &**context))
            .collect();
        contexts
            .into_iter()
            .map(|context| -> Result<ContextModel> {
                let names: Vec<&str> = intents
                    .iter()
                    .filter(|intent| intent.contexts.iter().any(|c| c == context))
                    .map(|intent| &*intent.name)
                    .collect();
                Ok(ContextModel {
                    context: context.to_string(),
                    payload: serde_json::to_vec(&names)?,
                })
            })
            .collect()
    }

    fn load(&mut self, models: &[ContextModel]) -> Result<()> {
        for model in models {
            serde_json::from_slice::<Vec<String>>(&model.payload)?;
        }
        self.models = models.to_vec();
        Ok(())
    }

    fn predict(
        &self,
        text: &str,
        _tokens: &[Token],
        _contexts: &[String],
    ) -> Result<Vec<IntentPrediction>> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.mocked_outputs.get(text).cloned().unwrap_or_default())
    }
}

/// Builds mocked learners sharing call counters
#[derive(Default)]
pub struct MockedLearnerFactory {
    predictions: Arc<HashMap<String, Vec<IntentPrediction>>>,
    tags: HashMap<String, (String, f32)>,
    failing_language: Option<LanguageCode>,
    classifier_trainings: Arc<AtomicUsize>,
    tagger_trainings: Arc<AtomicUsize>,
    predict_calls: Arc<AtomicUsize>,
    tag_calls: Arc<AtomicUsize>,
}

impl MockedLearnerFactory {
    /// Learners of `language` cannot be built
    pub fn failing_language(language: &str) -> Self {
        Self {
            failing_language: Some(language.to_string()),
            ..Self::default()
        }
    }

    pub fn with_predictions<I>(mut self, predictions: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<IntentPrediction>)>,
    {
        self.predictions = Arc::new(HashMap::from_iter(predictions));
        self
    }

    pub fn with_tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (String, (String, f32))>,
    {
        self.tags = HashMap::from_iter(tags);
        self
    }

    pub fn classifier_trainings(&self) -> usize {
        self.classifier_trainings.load(Ordering::SeqCst)
    }

    pub fn tagger_trainings(&self) -> usize {
        self.tagger_trainings.load(Ordering::SeqCst)
    }

    pub fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    fn check_language(&self, language: &str) -> Result<()> {
        if self.failing_language.as_ref().map(|l| &**l) == Some(language) {
            return Err(format_err!("No learner available for '{}'", language));
        }
        Ok(())
    }
}

impl LearnerFactory for MockedLearnerFactory {
    fn intent_classifier(&self, language: &str) -> Result<Box<dyn IntentClassifier>> {
        self.check_language(language)?;
        Ok(Box::new(MockedIntentClassifier {
            mocked_outputs: self.predictions.clone(),
            predict_calls: self.predict_calls.clone(),
            trainings: self.classifier_trainings.clone(),
            models: vec![],
        }))
    }

    fn crf_tagger(&self, language: &str) -> Result<Box<dyn CrfTagger>> {
        self.check_language(language)?;
        Ok(Box::new(MockedCrfTagger {
            mocked_tags: self.tags.clone(),
            calls: self.tag_calls.clone(),
            trainings: self.tagger_trainings.clone(),
            trained_sequences: 0,
            model: vec![],
        }))
    }
}

pub struct MockedDefinitionSource {
    intents: RwLock<Vec<IntentDefinition>>,
    custom_entities: RwLock<Vec<EntityDefinition>>,
}

impl MockedDefinitionSource {
    pub fn new(intents: Vec<IntentDefinition>) -> Self {
        Self {
            intents: RwLock::new(intents),
            custom_entities: RwLock::new(vec![]),
        }
    }

    pub fn set_intents(&self, intents: Vec<IntentDefinition>) {
        *self.intents.write() = intents;
    }

    pub fn set_custom_entities(&self, custom_entities: Vec<EntityDefinition>) {
        *self.custom_entities.write() = custom_entities;
    }
}

impl IntentDefinitionSource for MockedDefinitionSource {
    fn get_intents(&self) -> Result<Vec<IntentDefinition>> {
        Ok(self.intents.read().clone())
    }

    fn get_custom_entities(&self) -> Result<Vec<EntityDefinition>> {
        Ok(self.custom_entities.read().clone())
    }
}

/// In-memory store whose first existence check signals `entered` and then waits for
/// `release`
pub struct BlockingModelStore {
    inner: InMemoryModelStore,
    entered: Sender<()>,
    release: Receiver<()>,
    blocked: AtomicBool,
}

impl BlockingModelStore {
    pub fn new(entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            inner: InMemoryModelStore::default(),
            entered,
            release,
            blocked: AtomicBool::new(false),
        }
    }
}

impl ModelStore for BlockingModelStore {
    fn model_exists(&self, hash: &str, language: &str) -> Result<bool> {
        if !self.blocked.swap(true, Ordering::SeqCst) {
            self.entered.send(())?;
            self.release.recv()?;
        }
        self.inner.model_exists(hash, language)
    }

    fn get_models_from_hash(&self, hash: &str, language: &str) -> Result<Vec<ModelArtifact>> {
        self.inner.get_models_from_hash(hash, language)
    }

    fn persist_models(&self, artifacts: &[ModelArtifact], language: &str) -> Result<()> {
        self.inner.persist_models(artifacts, language)
    }
}

/// Store panicking on its first `model_exists` calls
pub struct PanickingModelStore {
    inner: InMemoryModelStore,
    panics_left: AtomicUsize,
}

impl PanickingModelStore {
    pub fn new(panics: usize) -> Self {
        Self {
            inner: InMemoryModelStore::default(),
            panics_left: AtomicUsize::new(panics),
        }
    }
}

impl ModelStore for PanickingModelStore {
    fn model_exists(&self, hash: &str, language: &str) -> Result<bool> {
        let panics_left = self.panics_left.load(Ordering::SeqCst);
        if panics_left > 0 {
            self.panics_left.store(panics_left - 1, Ordering::SeqCst);
            panic!("model store crashed");
        }
        self.inner.model_exists(hash, language)
    }

    fn get_models_from_hash(&self, hash: &str, language: &str) -> Result<Vec<ModelArtifact>> {
        self.inner.get_models_from_hash(hash, language)
    }

    fn persist_models(&self, artifacts: &[ModelArtifact], language: &str) -> Result<()> {
        self.inner.persist_models(artifacts, language)
    }
}
