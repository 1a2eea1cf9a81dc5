use log::warn;
use regex::RegexBuilder;

use crate::errors::*;
use crate::models::{EntityDefinition, EntityDefinitionKind, EntityKind, EntityMatch};
use crate::utils::convert_to_char_range;

pub trait PatternEntityExtractor: Send + Sync {
    fn extract_patterns(
        &self,
        text: &str,
        definitions: &[EntityDefinition],
    ) -> Result<Vec<EntityMatch>>;
}

/// Matches pattern entities with the `regex` crate, case-insensitively unless the
/// definition asks otherwise
#[derive(Debug, Default)]
pub struct RegexPatternExtractor;

impl PatternEntityExtractor for RegexPatternExtractor {
    fn extract_patterns(
        &self,
        text: &str,
        definitions: &[EntityDefinition],
    ) -> Result<Vec<EntityMatch>> {
        let mut entities = vec![];
        for definition in definitions {
            let (pattern, match_case) = match &definition.kind {
                EntityDefinitionKind::Pattern {
                    pattern,
                    match_case,
                } => (pattern, *match_case),
                _ => continue,
            };
            let regex = match RegexBuilder::new(pattern)
                .case_insensitive(!match_case)
                .build()
            {
                Ok(regex) => regex,
                Err(e) => {
                    warn!("Skipping invalid pattern of entity '{}': {}", definition.name, e);
                    continue;
                }
            };
            entities.extend(
                regex
                    .find_iter(text)
                    .filter(|m| !m.as_str().is_empty())
                    .map(|m| EntityMatch {
                        name: definition.name.clone(),
                        kind: EntityKind::Pattern,
                        source: m.as_str().to_string(),
                        value: serde_json::Value::String(m.as_str().to_string()),
                        confidence: 1.0,
                        range: convert_to_char_range(text, &(m.start()..m.end())),
                    }),
            );
        }
        Ok(entities)
    }
}
