//! Woven-module cache keyed by source content and registration fingerprint.

use crate::ast::Module;
use crate::weave::{WeaveError, WeaveReport};
use std::collections::HashMap;
use std::rc::Rc;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// A woven tree and what weaving did to it.
#[derive(Debug, Clone)]
pub struct Woven {
    pub module: Module,
    pub report: WeaveReport,
}

/// Key changes whenever the source text or the registration set changes.
pub fn cache_key(source: &str, fingerprint: u64) -> u64 {
    xxh3_64_with_seed(source.as_bytes(), fingerprint)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct WovenCache {
    entries: HashMap<(String, u64), Rc<Woven>>,
    hits: u64,
    misses: u64,
}

impl WovenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tree for `(module, key)`, weaving on a miss. Failed weaves are
    /// not cached.
    pub fn get_or_weave(
        &mut self,
        module: &str,
        key: u64,
        weave: impl FnOnce() -> Result<Woven, WeaveError>,
    ) -> Result<Rc<Woven>, WeaveError> {
        let slot = (module.to_string(), key);
        if let Some(woven) = self.entries.get(&slot) {
            self.hits += 1;
            return Ok(Rc::clone(woven));
        }
        self.misses += 1;
        let woven = Rc::new(weave()?);
        self.entries.insert(slot, Rc::clone(&woven));
        Ok(woven)
    }

    /// Drop every entry of `module`.
    pub fn invalidate(&mut self, module: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(name, _), _| name != module);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn woven(name: &str) -> Result<Woven, WeaveError> {
        Ok(Woven {
            module: crate::ts::parse_module("x = 1\n").unwrap(),
            report: WeaveReport {
                module: name.to_string(),
                ..WeaveReport::default()
            },
        })
    }

    #[test]
    fn key_tracks_source_and_fingerprint() {
        let base = cache_key("x = 1\n", 7);
        assert_eq!(base, cache_key("x = 1\n", 7));
        assert_ne!(base, cache_key("x = 2\n", 7));
        assert_ne!(base, cache_key("x = 1\n", 8));
    }

    #[test]
    fn hits_skip_weaving() {
        let mut cache = WovenCache::new();
        let key = cache_key("x = 1\n", 0);
        cache.get_or_weave("m", key, || woven("m")).unwrap();
        cache
            .get_or_weave("m", key, || panic!("cached entry should be reused"))
            .unwrap();
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
        cache.get_or_weave("n", key, || woven("n")).unwrap();
        assert_eq!(cache.invalidate("m"), 1);
        assert_eq!(cache.stats().entries, 1);
    }
}
