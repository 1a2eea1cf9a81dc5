use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::models::intent::NONE_INTENT;
use crate::utils::{EntityName, IntentName, SlotName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    System,
    Pattern,
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub name: EntityName,
    pub kind: EntityKind,
    /// Matched text, as found in the input
    pub source: String,
    pub value: serde_json::Value,
    pub confidence: f32,
    /// Character range (not bytes) in the input
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPrediction {
    pub name: IntentName,
    pub context: String,
    pub confidence: f32,
}

impl IntentPrediction {
    pub fn none(context: &str) -> Self {
        Self {
            name: NONE_INTENT.to_string(),
            context: context.to_string(),
            confidence: 1.0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.name == NONE_INTENT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: SlotName,
    pub source: String,
    pub value: serde_json::Value,
    pub entity: Option<EntityMatch>,
    pub confidence: f32,
    pub range: Range<usize>,
}
