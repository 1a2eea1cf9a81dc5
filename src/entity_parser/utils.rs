use std::hash::Hash;

use lru_cache::LruCache;

use crate::errors::*;

pub struct Cache<K, V>(LruCache<K, V>)
where
    K: Eq + Hash + Clone,
    V: Clone;

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Cache(LruCache::new(capacity))
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.0.get_mut(key).cloned()
    }

    /// Failed productions are not cached, so a transient failure is retried on next call
    pub fn try_cache<F: FnOnce(&K) -> Result<V>>(&mut self, key: &K, producer: F) -> Result<V> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = producer(key)?;
        self.0.insert(key.clone(), value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failure::format_err;

    #[test]
    fn test_try_cache_does_not_keep_failures() {
        // Given
        let mut cache: Cache<String, usize> = Cache::new(2);
        let key = "hello".to_string();

        // When
        let failed = cache.try_cache(&key, |_| Err(format_err!("unavailable")));
        let produced = cache.try_cache(&key, |k| Ok(k.len()));
        let cached = cache.try_cache(&key, |_| Ok(0));

        // Then
        assert!(failed.is_err());
        assert_eq!(5, produced.unwrap());
        assert_eq!(5, cached.unwrap());
    }
}
