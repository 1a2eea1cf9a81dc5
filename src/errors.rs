use failure::Fail;

use crate::models::ArtifactKind;
use crate::pipeline::Stage;

#[derive(Debug, Fail)]
pub enum NluEngineError {
    #[fail(
        display = "Missing {} model for hash '{}' and language '{}'",
        kind, hash, language
    )]
    ModelArtifactMissing {
        hash: String,
        language: String,
        kind: ArtifactKind,
    },
    #[fail(display = "Training failed for language '{}': {}", language, reason)]
    TrainingFailed { language: String, reason: String },
    #[fail(display = "Extraction stage '{}' failed: {}", stage, reason)]
    ExtractionStageFailed { stage: Stage, reason: String },
    #[fail(display = "Unsupported language: '{}'", _0)]
    UnsupportedLanguage(String),
    #[fail(display = "No model loaded for language '{}'", _0)]
    ModelsNotReady(String),
    #[fail(display = "Unknown intent: '{}'", _0)]
    UnknownIntent(String),
    #[fail(display = "Invalid configuration: {}", _0)]
    InvalidConfiguration(String),
}

impl NluEngineError {
    /// Collaborator failures may go away on their own, everything else is deterministic
    pub fn is_transient(&self) -> bool {
        match self {
            NluEngineError::ExtractionStageFailed { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = ::std::result::Result<T, ::failure::Error>;
