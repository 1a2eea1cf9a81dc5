pub mod list_entity_extractor;
pub mod pattern_entity_extractor;
pub mod system_entity_extractor;
mod utils;

use std::sync::Arc;

pub use self::list_entity_extractor::{ExactListExtractor, ListEntityExtractor};
pub use self::pattern_entity_extractor::{PatternEntityExtractor, RegexPatternExtractor};
pub use self::system_entity_extractor::{CachingSystemEntityExtractor, SystemEntityExtractor};

use crate::errors::*;
use crate::models::{EntityDefinition, EntityMatch};
use crate::tokenization::Token;
use crate::utils::ranges_overlap;

/// The three entity sources of an engine, queried together
#[derive(Clone)]
pub struct EntityExtractors {
    pub system: Arc<dyn SystemEntityExtractor>,
    pub pattern: Arc<dyn PatternEntityExtractor>,
    pub list: Arc<dyn ListEntityExtractor>,
}

impl EntityExtractors {
    pub fn new(system: Arc<dyn SystemEntityExtractor>) -> Self {
        Self {
            system,
            pattern: Arc::new(RegexPatternExtractor),
            list: Arc::new(ExactListExtractor),
        }
    }

    /// Union of pattern, list and system entities found in `text`, ordered by start
    pub fn extract_all(
        &self,
        text: &str,
        tokens: &[Token],
        custom_entities: &[EntityDefinition],
        language: &str,
    ) -> Result<Vec<EntityMatch>> {
        let mut entities = self.pattern.extract_patterns(text, custom_entities)?;
        entities.extend(self.list.extract_lists(text, tokens, custom_entities)?);
        entities.extend(self.system.extract(text, language)?);
        entities.sort_by_key(|entity| (entity.range.start, entity.range.end));
        Ok(entities)
    }
}

/// Records on each token the names of the entities overlapping it
pub fn assign_token_entities(tokens: &mut [Token], entities: &[EntityMatch]) {
    for token in tokens.iter_mut() {
        token.entities = entities
            .iter()
            .filter(|entity| ranges_overlap(&entity.range, &token.range))
            .map(|entity| entity.name.clone())
            .collect();
        token.entities.sort();
        token.entities.dedup();
    }
}
