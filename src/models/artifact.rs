use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::utils::LanguageCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Intent,
    SlotLanguage,
    SlotCrf,
}

impl ArtifactKind {
    pub fn identifier(&self) -> &'static str {
        match self {
            ArtifactKind::Intent => "INTENT",
            ArtifactKind::SlotLanguage => "SLOT_LANGUAGE",
            ArtifactKind::SlotCrf => "SLOT_CRF",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub context: String,
    pub created_on: DateTime<Utc>,
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub scope: String,
    pub language: LanguageCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub meta: ArtifactMeta,
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
}

impl ModelArtifact {
    pub fn new(
        kind: ArtifactKind,
        hash: &str,
        language: &str,
        context: &str,
        scope: &str,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            meta: ArtifactMeta {
                context: context.to_string(),
                created_on: Utc::now(),
                hash: hash.to_string(),
                kind,
                scope: scope.to_string(),
                language: language.to_string(),
            },
            payload,
        }
    }
}

/// Keeps the artifacts of `hash`, one per (type, context), the most recent winning.
/// The output is ordered by type then context.
pub fn select_artifacts(artifacts: Vec<ModelArtifact>, hash: &str) -> Vec<ModelArtifact> {
    artifacts
        .into_iter()
        .filter(|artifact| artifact.meta.hash == hash)
        .sorted_by(|a, b| b.meta.created_on.cmp(&a.meta.created_on))
        .unique_by(|artifact| (artifact.meta.kind, artifact.meta.context.clone()))
        .sorted_by(|a, b| {
            (a.meta.kind, &a.meta.context).cmp(&(b.meta.kind, &b.meta.context))
        })
        .collect()
}

// Payloads are opaque learner bytes, kept ascii in json form
mod base64_payload {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::decode(&encoded).map_err(de::Error::custom)
    }
}
