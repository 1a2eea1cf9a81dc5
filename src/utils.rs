use std::ops::Range;

use crate::models::EntityMatch;

pub type IntentName = String;
pub type SlotName = String;
pub type EntityName = String;
pub type LanguageCode = String;

pub fn ranges_overlap(lhs: &Range<usize>, rhs: &Range<usize>) -> bool {
    lhs.start < rhs.end && rhs.start < lhs.end
}

pub fn substring_with_char_range(text: &str, range: &Range<usize>) -> String {
    text.chars()
        .skip(range.start)
        .take(range.end.saturating_sub(range.start))
        .collect()
}

pub fn suffix_from_char_index(text: &str, index: usize) -> String {
    text.chars().skip(index).collect()
}

/// Converts a byte range of `text` into a character range
pub fn convert_to_char_range(text: &str, byte_range: &Range<usize>) -> Range<usize> {
    let start = text[..byte_range.start].chars().count();
    let len = text[byte_range.start..byte_range.end].chars().count();
    start..start + len
}

/// Lower-cases `text` one char at a time so that char ranges of the result also hold
/// for `text`
pub fn lowercase_chars(text: &str) -> String {
    text.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Replaces tabs and line breaks with spaces, collapses repeated spaces and lower-cases
pub fn sanitize_text(text: &str) -> String {
    lowercase_chars(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn deduplicate_overlapping_items<I, O, S, K>(
    items: Vec<I>,
    overlap: O,
    sort_key_fn: S,
) -> Vec<I>
where
    I: Clone,
    O: Fn(&I, &I) -> bool,
    S: FnMut(&I) -> K,
    K: Ord,
{
    let mut sorted_items = items.clone();
    sorted_items.sort_by_key(sort_key_fn);
    let mut deduplicated_items: Vec<I> = Vec::with_capacity(items.len());
    for item in sorted_items {
        if !deduplicated_items
            .iter()
            .any(|dedup_item| overlap(dedup_item, &item))
        {
            deduplicated_items.push(item);
        }
    }
    deduplicated_items
}

pub fn deduplicate_overlapping_entities(entities: Vec<EntityMatch>) -> Vec<EntityMatch> {
    let entities_overlap = |lhs_entity: &EntityMatch, rhs_entity: &EntityMatch| {
        ranges_overlap(&lhs_entity.range, &rhs_entity.range)
    };
    let entity_sort_key = |entity: &EntityMatch| -(entity.range.clone().count() as i32);
    let mut deduped = deduplicate_overlapping_items(entities, entities_overlap, entity_sort_key);
    deduped.sort_by_key(|entity| entity.range.start);
    deduped
}

pub fn replace_entities<F>(
    text: &str,
    matched_entities: Vec<EntityMatch>,
    placeholder_fn: F,
) -> String
where
    F: Fn(&EntityMatch) -> String,
{
    if matched_entities.is_empty() {
        return text.to_string();
    }

    let mut processed_text = String::new();
    let mut current_ix = 0;
    for matched_entity in deduplicate_overlapping_entities(matched_entities) {
        let prefix_text =
            substring_with_char_range(text, &(current_ix..matched_entity.range.start));
        processed_text.push_str(&prefix_text);
        processed_text.push_str(&placeholder_fn(&matched_entity));
        current_ix = matched_entity.range.end;
    }
    processed_text.push_str(&suffix_from_char_index(text, current_ix));
    processed_text
}
