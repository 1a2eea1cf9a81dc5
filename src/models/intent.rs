use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::{EntityName, IntentName, LanguageCode, SlotName};

/// Reserved name of the intent elected when nothing else qualifies
pub const NONE_INTENT: &str = "none";

/// Context of the intents which do not declare any
pub const DEFAULT_CONTEXT: &str = "global";

/// Slot entity accepting any value, even when no entity overlaps the tagged tokens
pub const ANY_ENTITY: &str = "any";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub name: IntentName,
    #[serde(default = "default_contexts")]
    pub contexts: Vec<String>,
    /// Example utterances per language, slot values annotated as `[value](slot_name)`
    #[serde(default)]
    pub utterances: HashMap<LanguageCode, Vec<String>>,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
}

impl IntentDefinition {
    pub fn utterances_for(&self, language: &str) -> &[String] {
        self.utterances
            .get(language)
            .map(|utterances| utterances.as_slice())
            .unwrap_or(&[])
    }

    pub fn slot(&self, slot_name: &str) -> Option<&SlotDefinition> {
        self.slots.iter().find(|slot| slot.name == slot_name)
    }

    /// Entity types which may legitimately fill one of the intent slots
    pub fn allowed_entities(&self) -> Vec<&str> {
        let mut entities: Vec<&str> = self
            .slots
            .iter()
            .flat_map(|slot| slot.entities.iter().map(|e| &**e))
            .collect();
        entities.sort();
        entities.dedup();
        entities
    }
}

fn default_contexts() -> Vec<String> {
    vec![DEFAULT_CONTEXT.to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub name: SlotName,
    #[serde(default)]
    pub entities: Vec<EntityName>,
}

impl SlotDefinition {
    pub fn accepts_any_value(&self) -> bool {
        self.entities.is_empty() || self.entities.iter().any(|e| e == ANY_ENTITY)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: EntityName,
    #[serde(flatten)]
    pub kind: EntityDefinitionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum EntityDefinitionKind {
    Pattern {
        pattern: String,
        #[serde(default)]
        match_case: bool,
    },
    List {
        occurrences: Vec<ListOccurrence>,
        #[serde(default)]
        fuzzy: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListOccurrence {
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}
