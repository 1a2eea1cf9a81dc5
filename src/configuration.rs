use std::fs::File;
use std::path::Path;
use std::time::Duration;

use failure::ResultExt;
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::language::Languages;
use crate::slot_filler::features::WeightRange;
use crate::utils::LanguageCode;

/// Shortest accepted auto-train interval, shorter ones disable the timer
pub const MIN_AUTO_TRAIN_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NluEngineConfig {
    pub languages: Vec<LanguageCode>,
    pub default_language: LanguageCode,
    /// Scope stamped on persisted artifacts, usually the bot id
    pub scope: String,
    pub confidence_threshold: f32,
    pub min_utterances_per_intent: usize,
    pub auto_train: bool,
    pub auto_train_interval_secs: u64,
    pub retry: RetryConfig,
    pub feature_weight_range: WeightRange,
    pub system_entity_cache_capacity: usize,
}

impl Default for NluEngineConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            default_language: "en".to_string(),
            scope: "bot".to_string(),
            confidence_threshold: 0.7,
            min_utterances_per_intent: 1,
            auto_train: true,
            auto_train_interval_secs: 30,
            retry: RetryConfig::default(),
            feature_weight_range: WeightRange::default(),
            system_entity_cache_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_attempts: usize,
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            max_attempts: 3,
            timeout_ms: 5000,
        }
    }
}

impl NluEngineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_file = File::open(path.as_ref()).with_context(|_| {
            format!("Cannot open engine configuration '{:?}'", path.as_ref())
        })?;
        let config: Self = serde_json::from_reader(config_file)
            .with_context(|_| "Cannot deserialize engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| -> Result<()> {
            Err(NluEngineError::InvalidConfiguration(reason.to_string()).into())
        };
        if self.languages.is_empty() {
            return invalid("at least one language is required");
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return invalid("confidence threshold must lie in [0, 1]");
        }
        if self.feature_weight_range.min >= self.feature_weight_range.max {
            return invalid("feature weight range is empty");
        }
        if self.retry.max_attempts == 0 {
            return invalid("at least one extraction attempt is required");
        }
        if self.system_entity_cache_capacity == 0 {
            return invalid("system entity cache capacity must be positive");
        }
        self.languages().map(|_| ())
    }

    pub fn languages(&self) -> Result<Languages> {
        Languages::new(self.languages.clone(), self.default_language.clone())
    }

    /// Interval of the staleness timer, `None` when auto-training is off or the interval
    /// is too short
    pub fn auto_train_interval(&self) -> Option<Duration> {
        let interval = Duration::from_secs(self.auto_train_interval_secs);
        if self.auto_train && interval >= MIN_AUTO_TRAIN_INTERVAL {
            Some(interval)
        } else {
            None
        }
    }
}
