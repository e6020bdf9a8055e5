use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use super::TextTranslator;

pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Memo of source text to translated text, shared across pages and jobs.
///
/// Once `capacity` entries are stored new results are no longer recorded;
/// existing entries are never evicted.
#[derive(Debug)]
pub struct TranslationCache {
    map: Mutex<HashMap<String, String>>,
    capacity: usize,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, text: &str) -> Option<String> {
        self.lock().get(text).cloned()
    }

    /// Stores a translation; returns false when the cache is full.
    pub fn insert(&self, text: &str, translated: &str) -> bool {
        let mut map = self.lock();
        if map.len() >= self.capacity && !map.contains_key(text) {
            return false;
        }
        map.insert(text.to_string(), translated.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counters describing how translations were resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterStats {
    pub cache_hits: usize,
    pub backend_calls: usize,
    pub backend_failures: usize,
    pub passthroughs: usize,
}

#[derive(Debug, Default)]
struct StatCounters {
    cache_hits: AtomicUsize,
    backend_calls: AtomicUsize,
    backend_failures: AtomicUsize,
    passthroughs: AtomicUsize,
}

/// Wraps a [`TextTranslator`] so the rewriter never sees a failure.
///
/// Numeric text and whitespace are passed through untouched, results are
/// memoized in a [`TranslationCache`], and any backend error degrades to
/// returning the input.
pub struct TranslationAdapter {
    backend: Arc<dyn TextTranslator>,
    cache: Arc<TranslationCache>,
    stats: StatCounters,
}

impl TranslationAdapter {
    pub fn new(backend: Arc<dyn TextTranslator>, cache: Arc<TranslationCache>) -> Self {
        Self {
            backend,
            cache,
            stats: StatCounters::default(),
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn stats(&self) -> AdapterStats {
        AdapterStats {
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            backend_calls: self.stats.backend_calls.load(Ordering::Relaxed),
            backend_failures: self.stats.backend_failures.load(Ordering::Relaxed),
            passthroughs: self.stats.passthroughs.load(Ordering::Relaxed),
        }
    }

    pub fn translate(&self, text: &str) -> String {
        let Some((start, end)) = split_text_bounds(text) else {
            return text.to_string();
        };
        let core = &text[start..end];
        if is_numeric_passthrough(core) {
            self.stats.passthroughs.fetch_add(1, Ordering::Relaxed);
            return text.to_string();
        }

        let translated = match self.cache.get(core) {
            Some(hit) => {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                hit
            }
            None => match self.call_backend(core) {
                Some(result) => {
                    if !self.cache.insert(core, &result) {
                        debug!("translation cache full; not storing result");
                    }
                    result
                }
                None => return text.to_string(),
            },
        };

        let leading = if start > 0 { " " } else { "" };
        let trailing = if end < text.len() { " " } else { "" };
        format!("{leading}{}{trailing}", translated.trim())
    }

    fn call_backend(&self, core: &str) -> Option<String> {
        self.stats.backend_calls.fetch_add(1, Ordering::Relaxed);
        match self.backend.translate(core) {
            Ok(result) if !result.trim().is_empty() => Some(result),
            Ok(_) => {
                self.stats.backend_failures.fetch_add(1, Ordering::Relaxed);
                warn!(text = %core, "backend returned an empty translation; keeping source text");
                None
            }
            Err(err) => {
                self.stats.backend_failures.fetch_add(1, Ordering::Relaxed);
                warn!(text = %core, "translation failed; keeping source text: {}", err);
                None
            }
        }
    }
}

/// True for text made only of ASCII digits, dots and whitespace.
pub fn is_numeric_passthrough(value: &str) -> bool {
    !value.trim().is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch == '.' || ch.is_whitespace())
}

pub(crate) fn split_text_bounds(text: &str) -> Option<(usize, usize)> {
    let start = text
        .char_indices()
        .find(|(_, ch)| !ch.is_whitespace())
        .map(|(idx, _)| idx)?;
    let end = text
        .char_indices()
        .rev()
        .find(|(_, ch)| !ch.is_whitespace())
        .map(|(idx, ch)| idx + ch.len_utf8())?;
    (start < end).then_some((start, end))
}
