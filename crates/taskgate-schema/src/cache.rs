//! # Descriptor Cache
//!
//! Building a descriptor walks the whole schema. Task schemas never change
//! after registration, so the gateway builds each distinct schema once and
//! shares the result.
//!
//! Entries are keyed by the SHA-256 of the serialized schema. Each entry is
//! a `OnceLock`: the first caller builds, concurrent callers for the same
//! schema block on that build, and later callers read the stored result.
//! Build errors are stored as well.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde_json::Value;

use taskgate_core::{digest_json, ContentDigest};

use crate::descriptor::TypeDescriptor;
use crate::error::SchemaError;
use crate::synthesizer::{build_type_with, BuildOptions};

type Slot = Arc<OnceLock<Result<Arc<TypeDescriptor>, SchemaError>>>;

/// Thread-safe, read-through cache of built descriptors.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    options: BuildOptions,
    slots: Mutex<HashMap<ContentDigest, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DescriptorCache {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Return the descriptor for `schema`, building it on first use.
    pub fn get_or_build(&self, schema: &Value) -> Result<Arc<TypeDescriptor>, SchemaError> {
        let digest = match digest_json(schema) {
            Ok(digest) => digest,
            Err(e) => {
                tracing::debug!(error = %e, "schema digest failed, building uncached");
                return build_type_with(schema, &self.options).map(Arc::new);
            }
        };

        // The map lock is held only long enough to find or insert the slot.
        let slot = Arc::clone(self.slots.lock().entry(digest).or_default());

        let mut built_here = false;
        let result = slot.get_or_init(|| {
            built_here = true;
            build_type_with(schema, &self.options).map(Arc::new)
        });

        if built_here {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(schema = %digest, ok = result.is_ok(), "descriptor cache miss");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(schema = %digest, "descriptor cache hit");
        }
        result.clone()
    }

    /// Number of distinct schemas seen.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = DescriptorCache::default();
        let schema = json!({"properties": {"a": {"type": "string"}}});
        let first = cache.get_or_build(&schema).unwrap();
        let second = cache.get_or_build(&schema).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_schemas_get_distinct_entries() {
        let cache = DescriptorCache::default();
        cache.get_or_build(&json!({"type": "string"})).unwrap();
        cache.get_or_build(&json!({"type": "integer"})).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats(), (0, 2));
    }

    #[test]
    fn errors_are_cached() {
        let cache = DescriptorCache::default();
        let schema = json!({"properties": {"x": {"$ref": "#/$defs/Missing"}}});
        let a = cache.get_or_build(&schema).unwrap_err();
        let b = cache.get_or_build(&schema).unwrap_err();
        assert_eq!(a, b);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn options_apply() {
        let cache = DescriptorCache::new(BuildOptions { max_depth: 2 });
        let err = cache
            .get_or_build(&json!({"properties": {"a": {"type": "array", "items": {"type": "string"}}}}))
            .unwrap_err();
        assert_eq!(err, SchemaError::DepthLimitExceeded { limit: 2 });
    }

    #[test]
    fn concurrent_builders_share_one_build() {
        let cache = Arc::new(DescriptorCache::default());
        let schema = json!({
            "$defs": {"Addr": {"properties": {"city": {"type": "string"}}}},
            "properties": {"home": {"$ref": "#/$defs/Addr"}},
        });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let schema = schema.clone();
                thread::spawn(move || cache.get_or_build(&schema).unwrap())
            })
            .collect();
        let built: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(built.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        let (hits, misses) = cache.stats();
        assert_eq!(misses, 1);
        assert_eq!(hits, 7);
    }
}
