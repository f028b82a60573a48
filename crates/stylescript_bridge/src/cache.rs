//! Bounded property lookup cache for the active feature.
//!
//! The cache remembers where a key lives in the active feature's property
//! map. Entries are
//! only meaningful for the feature that was active when they were filled:
//! [`PropertyCache::reset`] rewinds the fill pointer, which makes every
//! older entry unreachable without touching it.
//!
//! Eviction is cyclic, not least-recently-used. When all
//! [`CACHE_CAPACITY`] slots are filled the next miss restarts at slot 0.

use std::rc::Rc;

use stylescript_foundation::{PropValue, Properties};
use tracing::trace;

/// Number of cache slots.
pub const CACHE_CAPACITY: usize = 16;

static ABSENT: PropValue = PropValue::None;

/// One cached property lookup.
#[derive(Clone, Debug)]
pub(crate) struct CacheEntry {
    key: Rc<str>,
    /// Position of the key in the feature's property map.
    slot: Option<usize>,
}

impl CacheEntry {
    /// Returns the cached property value.
    pub(crate) fn value<'p>(&self, props: &'p Properties) -> &'p PropValue {
        match self.slot {
            Some(slot) => props.value_at(slot),
            None => &ABSENT,
        }
    }
}

/// Lookup counters, reported when a context is released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of lookups.
    pub gets: u64,
    /// Lookups answered by an existing entry.
    pub reused: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reuse_percent(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.reused as f64 / self.gets as f64 * 100.0
        }
    }
}

/// Fixed-capacity, cyclically overwritten cache of property lookups.
#[derive(Debug, Default)]
pub struct PropertyCache {
    entries: Vec<CacheEntry>,
    /// Number of valid entries; the next miss is stored here.
    fill: usize,
    stats: CacheStats,
}

impl PropertyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(CACHE_CAPACITY),
            fill: 0,
            stats: CacheStats::default(),
        }
    }

    /// Invalidates every entry.
    pub fn reset(&mut self) {
        self.fill = 0;
    }

    /// Returns the number of entries valid for the active feature.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fill
    }

    /// Returns true if no entry is valid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    /// Returns the lookup counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Looks `key` up in `props`, going through the cache.
    #[must_use]
    pub fn lookup<'p>(&mut self, props: &'p Properties, key: &str) -> &'p PropValue {
        self.resolve(props, key).value(props)
    }

    /// Returns the entry for `key`, filling a slot on a miss.
    fn resolve(&mut self, props: &Properties, key: &str) -> &CacheEntry {
        self.stats.gets += 1;
        if let Some(pos) = self.entries[..self.fill]
            .iter()
            .position(|entry| &*entry.key == key)
        {
            self.stats.reused += 1;
            return &self.entries[pos];
        }

        if self.fill == CACHE_CAPACITY {
            trace!(capacity = CACHE_CAPACITY, "overflowing cache");
            self.fill = 0;
        }
        let entry = CacheEntry {
            key: Rc::from(key),
            slot: props.index_of(key),
        };
        let pos = self.fill;
        if pos < self.entries.len() {
            self.entries[pos] = entry;
        } else {
            self.entries.push(entry);
        }
        self.fill += 1;
        &self.entries[pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(n: usize) -> Properties {
        (0..n)
            .map(|i| (format!("k{i}"), PropValue::Number(i as f64)))
            .collect()
    }

    #[test]
    fn hit_reuses_entry() {
        let props = props(4);
        let mut cache = PropertyCache::new();
        assert_eq!(cache.lookup(&props, "k1").as_number(), Some(1.0));
        assert_eq!(cache.lookup(&props, "k1").as_number(), Some(1.0));
        assert_eq!(cache.stats(), CacheStats { gets: 2, reused: 1 });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn absent_keys_are_cached_as_none() {
        let props = props(1);
        let mut cache = PropertyCache::new();
        assert!(cache.lookup(&props, "missing").is_none());
        assert!(cache.lookup(&props, "missing").is_none());
        assert_eq!(cache.stats().reused, 1);
    }

    #[test]
    fn overflow_restarts_at_slot_zero() {
        let props = props(CACHE_CAPACITY + 4);
        let mut cache = PropertyCache::new();
        for i in 0..CACHE_CAPACITY {
            let _ = cache.lookup(&props, &format!("k{i}"));
        }
        assert_eq!(cache.len(), CACHE_CAPACITY);

        let extra = format!("k{CACHE_CAPACITY}");
        assert_eq!(
            cache.lookup(&props, &extra).as_number(),
            Some(CACHE_CAPACITY as f64)
        );
        assert_eq!(cache.len(), 1);

        // Older entries are no longer reachable, so this is a miss.
        let before = cache.stats().reused;
        assert_eq!(cache.lookup(&props, "k3").as_number(), Some(3.0));
        assert_eq!(cache.stats().reused, before);
    }

    #[test]
    fn reset_hides_previous_entries() {
        let first: Properties = [("name", "park")].into_iter().collect();
        let second: Properties = [("name", "road"), ("kind", "x")].into_iter().collect();
        let mut cache = PropertyCache::new();
        assert_eq!(cache.lookup(&first, "name").as_str(), Some("park"));
        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.lookup(&second, "name").as_str(), Some("road"));
    }

    #[test]
    fn reuse_percent_handles_no_gets() {
        assert!(CacheStats::default().reuse_percent().abs() < f64::EPSILON);
        let stats = CacheStats { gets: 4, reused: 1 };
        assert!((stats.reuse_percent() - 25.0).abs() < f64::EPSILON);
    }
}
