//! Thread-local compilation cache for `MATCH` condition patterns.
//!
//! Conditions are evaluated on every dispatch, so a hot injection point with a
//! regex condition would otherwise recompile the same pattern per call.
//! Cache is capped at 256 entries; when full it is cleared and rebuilt on demand.

use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static PATTERN_CACHE: RefCell<HashMap<String, Regex>> =
        RefCell::new(HashMap::new());
}

/// Get a compiled regex from cache, or compile and cache it.
///
/// Invalid patterns are not cached; the compile error is returned every time.
pub fn get_or_compile_regex(pattern: &str) -> Result<Regex, regex::Error> {
    PATTERN_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = Regex::new(pattern)?;
        cache.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    })
}

/// Clear the pattern cache (mainly for testing).
pub fn clear_cache() {
    PATTERN_CACHE.with(|cache| {
        cache.borrow_mut().clear();
    });
}

/// Number of cached patterns on this thread.
pub fn cache_size() -> usize {
    PATTERN_CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_valid_patterns_only() {
        clear_cache();
        assert!(get_or_compile_regex("^ab+$").unwrap().is_match("abbb"));
        assert!(get_or_compile_regex("^ab+$").is_ok());
        assert_eq!(cache_size(), 1);

        assert!(get_or_compile_regex("(unclosed").is_err());
        assert_eq!(cache_size(), 1);
    }

    #[test]
    fn evicts_when_full() {
        clear_cache();
        for i in 0..MAX_CACHE_ENTRIES {
            get_or_compile_regex(&format!("p{i}")).unwrap();
        }
        assert_eq!(cache_size(), MAX_CACHE_ENTRIES);
        get_or_compile_regex("overflow").unwrap();
        assert_eq!(cache_size(), 1);
    }
}
