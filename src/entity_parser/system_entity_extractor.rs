use std::sync::Arc;

use log::info;
use parking_lot::Mutex;

use super::utils::Cache;
use crate::errors::*;
use crate::models::EntityMatch;
use crate::utils::LanguageCode;

/// Numeric, date, amount... extraction service (duckling-like)
pub trait SystemEntityExtractor: Send + Sync {
    fn extract(&self, text: &str, language: &str) -> Result<Vec<EntityMatch>>;
}

/// Memoizes the system extractor, which usually sits behind a network call
pub struct CachingSystemEntityExtractor {
    extractor: Arc<dyn SystemEntityExtractor>,
    cache: Mutex<Cache<CacheKey, Vec<EntityMatch>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    input: String,
    language: LanguageCode,
}

impl CachingSystemEntityExtractor {
    pub fn new(extractor: Arc<dyn SystemEntityExtractor>, cache_capacity: usize) -> Self {
        info!(
            "System entity extractor cache enabled (capacity: {})",
            cache_capacity
        );
        Self {
            extractor,
            cache: Mutex::new(Cache::new(cache_capacity)),
        }
    }
}

impl SystemEntityExtractor for CachingSystemEntityExtractor {
    fn extract(&self, text: &str, language: &str) -> Result<Vec<EntityMatch>> {
        let cache_key = CacheKey {
            input: text.to_string(),
            language: language.to_string(),
        };
        if let Some(cached) = self.cache.lock().get(&cache_key) {
            return Ok(cached);
        }
        // Extraction runs outside the lock
        let entities = self.extractor.extract(text, language)?;
        self.cache.lock().try_cache(&cache_key, |_| Ok(entities))
    }
}

#[cfg(test)]
mod tests {
    use std::iter::FromIterator;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::models::EntityKind;
    use crate::testutils::MockedSystemEntityExtractor;

    #[test]
    fn test_extraction_is_cached_per_text_and_language() {
        // Given
        let entity = EntityMatch {
            name: "number".to_string(),
            kind: EntityKind::System,
            source: "two".to_string(),
            value: serde_json::json!(2),
            confidence: 1.0,
            range: 5..8,
        };
        let mocked = Arc::new(MockedSystemEntityExtractor::from_iter(vec![(
            "make two coffees".to_string(),
            vec![entity.clone()],
        )]));
        let extractor = CachingSystemEntityExtractor::new(mocked.clone(), 10);

        // When
        let first = extractor.extract("make two coffees", "en").unwrap();
        let second = extractor.extract("make two coffees", "en").unwrap();
        let other_language = extractor.extract("make two coffees", "fr").unwrap();

        // Then
        assert_eq!(vec![entity.clone()], first);
        assert_eq!(first, second);
        assert_eq!(vec![entity], other_language);
        assert_eq!(2, mocked.calls.load(Ordering::SeqCst));
    }
}
