use std::collections::BTreeSet;

use log::debug;

use super::{ExtractionContext, Stage};
use crate::entity_parser::{assign_token_entities, EntityExtractors};
use crate::errors::*;
use crate::intent_parser::{elect_intent, rank_predictions};
use crate::language::{LanguageIdentifier, Languages};
use crate::models::IntentPrediction;
use crate::tokenization::{tokenize_text, LanguageService};
use crate::training::{LanguageModels, LoadedModels};
use crate::utils::{lowercase_chars, replace_entities, sanitize_text};

/// Collaborators and models a pipeline run reads from
pub struct StageEnvironment<'a> {
    pub languages: &'a Languages,
    pub language_identifier: &'a dyn LanguageIdentifier,
    pub language_service: &'a dyn LanguageService,
    pub entity_extractors: &'a EntityExtractors,
    /// Models generation the run is pinned to
    pub models: Option<&'a LoadedModels>,
    pub confidence_threshold: f32,
}

impl<'a> StageEnvironment<'a> {
    fn language_models(&self, language: &str) -> Result<&'a LanguageModels> {
        self.models
            .and_then(|models| models.language(language))
            .map(|models| &**models)
            .ok_or_else(|| NluEngineError::ModelsNotReady(language.to_string()).into())
    }
}

/// Runs a single stage. Collaborator failures surface as `ExtractionStageFailed`,
/// engine errors are kept as they are.
pub fn run_stage(
    stage: Stage,
    context: ExtractionContext,
    environment: &StageEnvironment,
) -> Result<ExtractionContext> {
    let outcome = match stage {
        Stage::DetectLanguage => detect_language(context, environment),
        Stage::Tokenize => tokenize(context, environment),
        Stage::ExtractEntities => extract_entities(context, environment),
        Stage::SanitizeText => sanitize(context),
        Stage::ClassifyIntent => classify_intent(context, environment),
        Stage::ExtractSlots => extract_slots(context, environment),
    };
    outcome.map_err(|error| match error.downcast::<NluEngineError>() {
        Ok(engine_error) => engine_error.into(),
        Err(other) => NluEngineError::ExtractionStageFailed {
            stage,
            reason: other.to_string(),
        }
        .into(),
    })
}

fn detect_language(
    mut context: ExtractionContext,
    environment: &StageEnvironment,
) -> Result<ExtractionContext> {
    let detected = environment.language_identifier.identify(&context.text)?;
    context.language = environment.languages.resolve(detected.as_ref().map(|l| &**l));
    debug!("Extracting in language '{}'", context.language);
    Ok(context)
}

fn tokenize(
    mut context: ExtractionContext,
    environment: &StageEnvironment,
) -> Result<ExtractionContext> {
    context.lower_text = lowercase_chars(&context.text);
    context.tokens = tokenize_text(
        environment.language_service,
        &context.lower_text,
        &context.language,
    )?;
    Ok(context)
}

fn extract_entities(
    mut context: ExtractionContext,
    environment: &StageEnvironment,
) -> Result<ExtractionContext> {
    let custom_entities = environment
        .models
        .map(|models| models.custom_entities.as_slice())
        .unwrap_or(&[]);
    context.entities = environment.entity_extractors.extract_all(
        &context.lower_text,
        &context.tokens,
        custom_entities,
        &context.language,
    )?;
    assign_token_entities(&mut context.tokens, &context.entities);
    debug!("Found {} entities", context.entities.len());
    Ok(context)
}

fn sanitize(mut context: ExtractionContext) -> Result<ExtractionContext> {
    let stripped = replace_entities(&context.text, context.entities.clone(), |_| String::new());
    context.sanitized_text = sanitize_text(&stripped);
    Ok(context)
}

fn classify_intent(
    mut context: ExtractionContext,
    environment: &StageEnvironment,
) -> Result<ExtractionContext> {
    let models = environment.language_models(&context.language)?;

    if let Some(exact) = models
        .exact_matcher
        .find(&context.sanitized_text, &context.included_contexts)
    {
        debug!("Exact match of intent '{}'", exact.name);
        context.intents = vec![exact.clone()];
        context.intent = Some(exact);
        context.ambiguous = false;
        return Ok(context);
    }

    let predictions = models.classifier.predict(
        &context.sanitized_text,
        &context.tokens,
        &context.included_contexts,
    )?;
    if context.included_contexts.is_empty() {
        context.included_contexts = observed_contexts(&predictions);
    }
    let ranked = rank_predictions(predictions, &context.included_contexts);
    let election = elect_intent(&ranked, environment.confidence_threshold);
    debug!(
        "Elected intent '{}' among {} candidates",
        election.intent.name,
        ranked.len()
    );
    context.intents = ranked;
    context.intent = Some(election.intent);
    context.ambiguous = election.ambiguous;
    Ok(context)
}

fn observed_contexts(predictions: &[IntentPrediction]) -> Vec<String> {
    predictions
        .iter()
        .map(|prediction| prediction.context.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn extract_slots(
    mut context: ExtractionContext,
    environment: &StageEnvironment,
) -> Result<ExtractionContext> {
    context.slots = vec![];
    let intent_name = match context.intent.as_ref() {
        Some(intent) if !intent.is_none() => intent.name.clone(),
        _ => return Ok(context),
    };
    let definition = match environment.models.and_then(|models| models.intent(&intent_name)) {
        Some(definition) if !definition.slots.is_empty() => definition,
        _ => return Ok(context),
    };
    let models = environment.language_models(&context.language)?;
    context.slots = models.slot_filler.extract(
        &context.text,
        definition,
        &context.entities,
        &context.tokens,
    )?;
    Ok(context)
}
