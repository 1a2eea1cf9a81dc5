use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::*;
use crate::models::{EntityDefinition, EntityDefinitionKind, IntentDefinition};
use crate::MODEL_VERSION;

/// Digest identifying a model generation: SHA-256 over a canonical json rendering of the
/// training data and the model version. Ordering of intents, contexts, utterances,
/// slots and entities does not matter.
pub fn compute_model_hash(
    intents: &[IntentDefinition],
    custom_entities: &[EntityDefinition],
) -> Result<String> {
    #[derive(Serialize)]
    struct Canonical<'a> {
        version: &'a str,
        intents: Vec<IntentDefinition>,
        entities: Vec<EntityDefinition>,
    }

    let mut intents: Vec<IntentDefinition> = intents.iter().map(canonical_intent).collect();
    intents.sort_by(|a, b| a.name.cmp(&b.name));
    let mut entities: Vec<EntityDefinition> =
        custom_entities.iter().map(canonical_entity).collect();
    entities.sort_by(|a, b| a.name.cmp(&b.name));

    // Going through `Value` sorts object keys, hash maps included
    let canonical = serde_json::to_value(Canonical {
        version: MODEL_VERSION,
        intents,
        entities,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&canonical)?);
    Ok(format!("{:x}", hasher.finalize()))
}

fn canonical_intent(intent: &IntentDefinition) -> IntentDefinition {
    let mut intent = intent.clone();
    intent.contexts.sort();
    intent.contexts.dedup();
    for utterances in intent.utterances.values_mut() {
        utterances.sort();
    }
    for slot in intent.slots.iter_mut() {
        slot.entities.sort();
    }
    intent.slots.sort_by(|a, b| a.name.cmp(&b.name));
    intent
}

fn canonical_entity(entity: &EntityDefinition) -> EntityDefinition {
    let mut entity = entity.clone();
    if let EntityDefinitionKind::List { occurrences, .. } = &mut entity.kind {
        for occurrence in occurrences.iter_mut() {
            occurrence.synonyms.sort();
        }
        occurrences.sort_by(|a, b| a.name.cmp(&b.name));
    }
    entity
}
