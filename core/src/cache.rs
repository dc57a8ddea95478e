//! Snapshot cache for computed source items.
//!
//! Each [`ValueSource`](crate::ValueSource) owns one [`SourceCache`]. Entries
//! are keyed by [`CacheScope`] and published by swapping in a whole new
//! immutable snapshot, so a reader either sees the previous map or the next
//! one, never a partial update. The lock only guards the pointer clone and
//! the pointer swap.
//!
//! The cache assumes a single writer (the engine worker). The generation
//! counter lets a writer detect that another refresh was published between
//! the moment it started computing and the moment it wants to publish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::source::SourceItem;

/// Key of a cache entry within one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Shared by every working directory.
    Global,
    /// Valid only for the given working directory.
    Directory(String),
}

/// Last computed items of a source for one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Items in source order.
    pub items: Vec<SourceItem>,
    /// When the items were computed, from the bound clock.
    pub computed_at: DateTime<Utc>,
    /// Generation of the snapshot that introduced this entry.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct CacheSnapshot {
    generation: u64,
    entries: HashMap<CacheScope, Arc<CacheEntry>>,
}

/// Single-writer, multi-reader cache of computed items.
///
/// # Examples
///
/// ```
/// use command_suggest_core::{CacheScope, SourceCache, SourceItem};
///
/// let cache = SourceCache::new();
/// assert!(cache.get(&CacheScope::Global).is_none());
///
/// let generation = cache.generation();
/// cache.publish_if_current(
///     generation,
///     CacheScope::Global,
///     vec![SourceItem::from_name("main")],
///     chrono::Utc::now(),
/// );
/// assert_eq!(cache.get(&CacheScope::Global).unwrap().items.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SourceCache {
    snapshot: RwLock<Arc<CacheSnapshot>>,
    refresh_queued: AtomicBool,
}

impl SourceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the entry for `scope`, if one was ever published.
    pub fn get(&self, scope: &CacheScope) -> Option<Arc<CacheEntry>> {
        self.load().entries.get(scope).cloned()
    }

    /// Generation of the current snapshot; starts at zero.
    pub fn generation(&self) -> u64 {
        self.load().generation
    }

    /// Number of scopes with an entry.
    pub fn len(&self) -> usize {
        self.load().entries.len()
    }

    /// Returns `true` when nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.load().entries.is_empty()
    }

    /// Publishes `items` for `scope` unless another publish happened since
    /// `expected_generation` was read.
    ///
    /// Returns the new generation, or `None` when the result was superseded
    /// and dropped.
    pub fn publish_if_current(
        &self,
        expected_generation: u64,
        scope: CacheScope,
        items: Vec<SourceItem>,
        computed_at: DateTime<Utc>,
    ) -> Option<u64> {
        let current = self.load();
        if current.generation != expected_generation {
            return None;
        }

        let generation = expected_generation + 1;
        let mut entries = current.entries.clone();
        entries.insert(
            scope,
            Arc::new(CacheEntry {
                items,
                computed_at,
                generation,
            }),
        );
        let next = Arc::new(CacheSnapshot {
            generation,
            entries,
        });

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if guard.generation != expected_generation {
            return None;
        }
        *guard = next;
        Some(generation)
    }

    /// Drops every entry, keeping the generation monotonic.
    pub fn clear(&self) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(CacheSnapshot {
            generation: guard.generation + 1,
            entries: HashMap::new(),
        });
    }

    /// Marks a refresh as queued. Returns `false` if one already was.
    pub fn try_mark_refresh_queued(&self) -> bool {
        self.refresh_queued
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clears the queued-refresh mark; called when the refresh starts.
    pub fn clear_refresh_queued(&self) {
        self.refresh_queued.store(false, Ordering::Release);
    }

    /// Whether a refresh is waiting in the engine queue.
    pub fn is_refresh_queued(&self) -> bool {
        self.refresh_queued.load(Ordering::Acquire)
    }
}
