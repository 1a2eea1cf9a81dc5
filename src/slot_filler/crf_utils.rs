use std::ops::Range;

use crate::models::{EntityMatch, IntentDefinition, Slot};
use crate::slot_filler::sequence::{BEGINNING_PREFIX, INSIDE_PREFIX};
use crate::tokenization::Token;
use crate::utils::{ranges_overlap, substring_with_char_range};

#[derive(Debug, Clone, PartialEq)]
struct TaggedSpan {
    slot_name: String,
    range: Range<usize>,
    probabilities: Vec<f32>,
}

fn slot_name_of(tag: &str) -> Option<(&str, bool)> {
    if tag.starts_with(BEGINNING_PREFIX) {
        Some((&tag[BEGINNING_PREFIX.len()..], true))
    } else if tag.starts_with(INSIDE_PREFIX) {
        Some((&tag[INSIDE_PREFIX.len()..], false))
    } else {
        None
    }
}

/// Groups consecutive tags of a slot into spans. An inside tag following another slot
/// starts a new span.
fn tags_to_spans(tokens: &[&Token], tags: &[(String, f32)]) -> Vec<TaggedSpan> {
    let mut spans: Vec<TaggedSpan> = vec![];
    let mut open = false;
    for (token, (tag, probability)) in tokens.iter().zip(tags.iter()) {
        match slot_name_of(tag) {
            Some((slot_name, is_beginning)) => {
                let continues = !is_beginning
                    && open
                    && spans.last().map(|s| s.slot_name == slot_name) == Some(true);
                if continues {
                    if let Some(span) = spans.last_mut() {
                        span.range.end = token.range.end;
                        span.probabilities.push(*probability);
                    }
                } else {
                    spans.push(TaggedSpan {
                        slot_name: slot_name.to_string(),
                        range: token.range.clone(),
                        probabilities: vec![*probability],
                    });
                }
                open = true;
            }
            None => open = false,
        }
    }
    spans
}

/// Converts tagger output into slots of `intent`. A slot takes the value of the longest
/// allowed entity overlapping it. Slots restricted to entities are dropped when none
/// overlaps.
pub fn tags_to_slots(
    text: &str,
    tokens: &[&Token],
    tags: &[(String, f32)],
    intent: &IntentDefinition,
    entities: &[EntityMatch],
) -> Vec<Slot> {
    tags_to_spans(tokens, tags)
        .into_iter()
        .filter_map(|span| {
            let definition = intent.slot(&span.slot_name)?;
            let entity = entities
                .iter()
                .filter(|entity| definition.entities.contains(&entity.name))
                .filter(|entity| ranges_overlap(&entity.range, &span.range))
                .max_by_key(|entity| entity.range.len())
                .cloned();
            if entity.is_none() && !definition.accepts_any_value() {
                return None;
            }
            let source = substring_with_char_range(text, &span.range);
            let confidence =
                span.probabilities.iter().sum::<f32>() / span.probabilities.len() as f32;
            Some(Slot {
                name: span.slot_name,
                value: entity
                    .as_ref()
                    .map(|e| e.value.clone())
                    .unwrap_or_else(|| serde_json::Value::String(source.clone())),
                source,
                entity,
                confidence,
                range: span.range,
            })
        })
        .collect()
}
