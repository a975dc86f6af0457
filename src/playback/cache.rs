//! Per-session cache of synthesised audio.
//!
//! Keys are a [`TextVariant`] plus, for the translated variant only, the
//! translation language.  Re-translating therefore changes only the
//! translated key; the old entry is orphaned and never looked up again,
//! while the original and simplified entries stay valid.
//!
//! The cache lives in memory for one reading session and is cleared when the
//! user captures a new image.  There is no size bound: a session holds at
//! most three variants times the translation languages visited.

use std::collections::HashMap;
use std::sync::Arc;

use crate::audio::DecodedAudio;

use super::state::TextVariant;

// ---------------------------------------------------------------------------
// CacheKey
// ---------------------------------------------------------------------------

/// Identity of one cached utterance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    variant: TextVariant,
    language: Option<String>,
}

impl CacheKey {
    /// Key for `variant`.  `translation_language` only takes part in the key
    /// of [`TextVariant::Translated`].
    pub fn new(variant: TextVariant, translation_language: &str) -> Self {
        let language = match variant {
            TextVariant::Translated => Some(translation_language.to_string()),
            TextVariant::Original | TextVariant::Simplified => None,
        };
        Self { variant, language }
    }

    pub fn variant(&self) -> TextVariant {
        self.variant
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

// ---------------------------------------------------------------------------
// AudioCache
// ---------------------------------------------------------------------------

/// Map from [`CacheKey`] to decoded audio.  Entries are shared as
/// `Arc<DecodedAudio>`, so a hit never copies samples.
#[derive(Debug, Default)]
pub struct AudioCache {
    entries: HashMap<CacheKey, Arc<DecodedAudio>>,
}

impl AudioCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<DecodedAudio>> {
        self.entries.get(key).cloned()
    }

    /// Insert or replace the entry for `key`.
    pub fn put(&mut self, key: CacheKey, audio: Arc<DecodedAudio>) {
        self.entries.insert(key, audio);
    }

    pub fn invalidate(&mut self, key: &CacheKey) {
        self.entries.remove(key);
    }

    /// Drop every entry (new reading session).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(frames: usize) -> Arc<DecodedAudio> {
        Arc::new(DecodedAudio::silence(frames, 24_000, 1).unwrap())
    }

    #[test]
    fn language_only_keys_translated_variant() {
        assert_eq!(
            CacheKey::new(TextVariant::Original, "Spanish"),
            CacheKey::new(TextVariant::Original, "French")
        );
        assert_eq!(
            CacheKey::new(TextVariant::Simplified, "Spanish"),
            CacheKey::new(TextVariant::Simplified, "French")
        );
        assert_ne!(
            CacheKey::new(TextVariant::Translated, "Spanish"),
            CacheKey::new(TextVariant::Translated, "French")
        );
        assert_eq!(CacheKey::new(TextVariant::Original, "x").language(), None);
        assert_eq!(
            CacheKey::new(TextVariant::Translated, "Thai").language(),
            Some("Thai")
        );
    }

    #[test]
    fn hit_returns_same_buffer() {
        let mut cache = AudioCache::new();
        let key = CacheKey::new(TextVariant::Original, "English");
        let stored = audio(10);

        cache.put(key.clone(), Arc::clone(&stored));

        let hit = cache.get(&key).expect("cached");
        assert!(Arc::ptr_eq(&hit, &stored));
    }

    #[test]
    fn miss_on_empty_cache() {
        let cache = AudioCache::new();
        assert!(cache.get(&CacheKey::new(TextVariant::Simplified, "English")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn language_change_orphans_only_translated() {
        let mut cache = AudioCache::new();
        for v in TextVariant::ALL {
            cache.put(CacheKey::new(v, "Spanish"), audio(1));
        }

        assert!(cache.get(&CacheKey::new(TextVariant::Translated, "French")).is_none());
        assert!(cache.get(&CacheKey::new(TextVariant::Original, "French")).is_some());
        assert!(cache.get(&CacheKey::new(TextVariant::Simplified, "French")).is_some());
    }

    #[test]
    fn invalidate_removes_one_entry() {
        let mut cache = AudioCache::new();
        let original = CacheKey::new(TextVariant::Original, "English");
        let translated = CacheKey::new(TextVariant::Translated, "English");
        cache.put(original.clone(), audio(1));
        cache.put(translated.clone(), audio(1));

        cache.invalidate(&translated);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&original).is_some());
        assert!(cache.get(&translated).is_none());
    }

    #[test]
    fn invalidate_missing_key_is_noop() {
        let mut cache = AudioCache::new();
        cache.invalidate(&CacheKey::new(TextVariant::Original, "English"));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = AudioCache::new();
        cache.put(CacheKey::new(TextVariant::Original, "English"), audio(1));
        cache.put(CacheKey::new(TextVariant::Translated, "Thai"), audio(1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
