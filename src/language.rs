use log::debug;

use crate::errors::*;
use crate::utils::LanguageCode;

/// Language identification service, typically backed by a FastText-like model
pub trait LanguageIdentifier: Send + Sync {
    fn identify(&self, text: &str) -> Result<Option<LanguageCode>>;
}

/// The validated set of languages an engine serves
#[derive(Debug, Clone, PartialEq)]
pub struct Languages {
    supported: Vec<LanguageCode>,
    default: LanguageCode,
}

impl Languages {
    pub fn new(supported: Vec<LanguageCode>, default: LanguageCode) -> Result<Self> {
        if !supported.contains(&default) {
            return Err(NluEngineError::UnsupportedLanguage(default).into());
        }
        Ok(Self { supported, default })
    }

    pub fn supported(&self) -> &[LanguageCode] {
        &self.supported
    }

    pub fn default_language(&self) -> &str {
        &self.default
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.supported.iter().any(|l| l == language)
    }

    /// Maps a detection outcome onto a served language
    pub fn resolve(&self, detected: Option<&str>) -> LanguageCode {
        match detected {
            Some(language) if self.is_supported(language) => language.to_string(),
            other => {
                debug!(
                    "Detected language {:?} is not served, falling back to '{}'",
                    other, self.default
                );
                self.default.clone()
            }
        }
    }
}
