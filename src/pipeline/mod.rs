mod retry;
mod stages;

use std::fmt;
use std::time::Instant;

use log::{debug, warn};
use serde::Serialize;

pub use self::retry::{is_transient, RetryPolicy};
pub use self::stages::{run_stage, StageEnvironment};

use crate::models::{EntityMatch, IntentPrediction, Slot};
use crate::tokenization::Token;
use crate::utils::LanguageCode;

/// Extraction stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DetectLanguage,
    Tokenize,
    ExtractEntities,
    SanitizeText,
    ClassifyIntent,
    ExtractSlots,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::DetectLanguage,
        Stage::Tokenize,
        Stage::ExtractEntities,
        Stage::SanitizeText,
        Stage::ClassifyIntent,
        Stage::ExtractSlots,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::DetectLanguage => "detect_language",
            Stage::Tokenize => "tokenize",
            Stage::ExtractEntities => "extract_entities",
            Stage::SanitizeText => "sanitize_text",
            Stage::ClassifyIntent => "classify_intent",
            Stage::ExtractSlots => "extract_slots",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State threaded through the stages. Each stage fills its own fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionContext {
    pub text: String,
    pub included_contexts: Vec<String>,
    pub language: LanguageCode,
    pub lower_text: String,
    pub tokens: Vec<Token>,
    pub entities: Vec<EntityMatch>,
    pub sanitized_text: String,
    pub intents: Vec<IntentPrediction>,
    pub intent: Option<IntentPrediction>,
    pub ambiguous: bool,
    pub slots: Vec<Slot>,
}

impl ExtractionContext {
    pub fn new(text: &str, included_contexts: &[String], default_language: &str) -> Self {
        Self {
            text: text.to_string(),
            included_contexts: included_contexts.to_vec(),
            language: default_language.to_string(),
            lower_text: String::new(),
            tokens: vec![],
            entities: vec![],
            sanitized_text: String::new(),
            intents: vec![],
            intent: None,
            ambiguous: false,
            slots: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub language: LanguageCode,
    /// Elected intent, absent when extraction failed before classification
    pub intent: Option<IntentPrediction>,
    /// Ranked predictions which took part in the election
    pub intents: Vec<IntentPrediction>,
    pub entities: Vec<EntityMatch>,
    pub slots: Vec<Slot>,
    pub included_contexts: Vec<String>,
    pub ambiguous: bool,
    pub errored: bool,
    /// Wall-clock duration of the extraction, retries included
    pub ms: u64,
}

impl ExtractionResult {
    fn from_context(context: ExtractionContext, errored: bool, ms: u64) -> Self {
        Self {
            language: context.language,
            intent: context.intent,
            intents: context.intents,
            entities: context.entities,
            slots: context.slots,
            included_contexts: context.included_contexts,
            ambiguous: context.ambiguous,
            errored,
            ms,
        }
    }
}

/// Runs every stage on `text` under the retry policy. A failed attempt resumes from the
/// stage which failed, earlier stages are not replayed.
pub fn run_pipeline(
    text: &str,
    included_contexts: &[String],
    environment: &StageEnvironment,
    policy: &RetryPolicy,
) -> ExtractionResult {
    let start = Instant::now();
    let mut context =
        ExtractionContext::new(text, included_contexts, environment.languages.default_language());
    let mut next_stage = 0;

    let outcome = policy.execute(|attempt| {
        if attempt > 1 {
            debug!(
                "Extraction attempt {} resumes at stage '{}'",
                attempt,
                Stage::ALL[next_stage]
            );
        }
        while next_stage < Stage::ALL.len() {
            let stage = Stage::ALL[next_stage];
            context = run_stage(stage, context.clone(), environment)?;
            next_stage += 1;
        }
        Ok(())
    });

    let errored = match outcome {
        Ok(()) => false,
        Err(e) => {
            warn!("Extraction of '{}' failed: {}", text, e);
            true
        }
    };
    let ms = start.elapsed().as_millis() as u64;
    ExtractionResult::from_context(context, errored, ms)
}
