//! Value sources: where candidate values for a value parameter come from.
//!
//! A [`ValueSource`] is either a fixed list of items ([`SourceKind::Static`])
//! or a command run by the host ([`SourceKind::Dynamic`]). Dynamic results
//! are stored in the source's [`SourceCache`] by
//! [`refresh_cache`](ValueSource::refresh_cache), which only the engine
//! worker calls. The suggestion path reads them through
//! [`try_get_cached`](ValueSource::try_get_cached) and never triggers a
//! computation.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheEntry, CacheScope, SourceCache};
use crate::context::ExecutionContext;

/// Failure to compute a dynamic source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source was refreshed before its dictionary was initialized.
    #[error("value source `{0}` is not bound to an execution context")]
    NotInitialized(String),
    /// The underlying command could not be run or failed.
    #[error("command `{command}` failed: {message}")]
    Execution {
        /// The command descriptor that was executed.
        command: String,
        /// What went wrong.
        message: String,
    },
}

/// One candidate value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    /// The literal inserted into the command line.
    pub name: String,
    /// Human readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl SourceItem {
    /// Creates an item without a description.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }
}

/// When computed items are considered fresh.
///
/// With neither field set the source is not cached: every refresh request
/// recomputes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Time to live, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_time_secs: Option<u64>,
    /// Scope entries by the caller's working directory.
    #[serde(default)]
    pub by_current_working_directory: bool,
}

impl CachePolicy {
    /// Time to live, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.by_time_secs.map(Duration::from_secs)
    }

    /// Whether any caching rule is configured.
    pub fn is_enabled(&self) -> bool {
        self.by_time_secs.is_some() || self.by_current_working_directory
    }

    /// Cache key for a working directory. Directory-scoped policies have no
    /// key without a directory.
    pub fn scope(&self, working_directory: Option<&str>) -> Option<CacheScope> {
        if self.by_current_working_directory {
            working_directory.map(|wd| CacheScope::Directory(wd.to_string()))
        } else {
            Some(CacheScope::Global)
        }
    }
}

/// Whether the read path hides entries whose TTL has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Expired entries are still served; expiry only tells the scheduler to
    /// enqueue a refresh.
    #[default]
    Advisory,
    /// Expired entries contribute no candidates until refreshed.
    RejectExpired,
}

/// Static or dynamic item provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    /// Fixed, ordered list.
    Static {
        /// Items in declared order.
        #[serde(default)]
        items: Vec<SourceItem>,
    },
    /// Command run through the execution context.
    Dynamic {
        /// Opaque command descriptor handed to
        /// [`ExecutionContext::execute`].
        command: String,
    },
}

/// Provider of candidate values, with its cache policy and cache.
///
/// Clones share the same cache, so a clone handed to the engine refreshes
/// the entries the dictionary's own copy reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSource {
    /// Display name.
    pub name: String,
    /// Static items or dynamic command.
    #[serde(flatten)]
    pub kind: SourceKind,
    /// Caching rules.
    #[serde(default)]
    pub cache: CachePolicy,
    #[serde(skip)]
    store: Arc<SourceCache>,
    #[serde(skip)]
    context: OnceLock<Arc<dyn ExecutionContext>>,
}

impl ValueSource {
    fn with_kind(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            cache: CachePolicy::default(),
            store: Arc::default(),
            context: OnceLock::new(),
        }
    }

    /// Creates a static source.
    pub fn new_static(name: &str, items: Vec<SourceItem>) -> Self {
        Self::with_kind(name, SourceKind::Static { items })
    }

    /// Creates a dynamic source running `command`.
    pub fn new_dynamic(name: &str, command: &str) -> Self {
        Self::with_kind(
            name,
            SourceKind::Dynamic {
                command: command.to_string(),
            },
        )
    }

    /// Replaces the cache policy.
    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = policy;
        self
    }

    /// Whether items come from a command.
    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, SourceKind::Dynamic { .. })
    }

    /// Whether an execution context has been bound.
    pub fn is_bound(&self) -> bool {
        self.context.get().is_some()
    }

    /// The source's cache.
    pub fn store(&self) -> &SourceCache {
        &self.store
    }

    pub(crate) fn bind(&self, context: &Arc<dyn ExecutionContext>) {
        // first binding wins
        let _ = self.context.set(Arc::clone(context));
    }

    /// Recomputes the items for `working_directory` and publishes them.
    ///
    /// Static sources return immediately. A directory-scoped source
    /// refreshed without a directory has nowhere to store its result and is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotInitialized`] if the source was never bound,
    /// or the execution error reported by the context.
    pub fn refresh_cache(&self, working_directory: Option<&str>) -> Result<(), SourceError> {
        let SourceKind::Dynamic { command } = &self.kind else {
            return Ok(());
        };
        let context = self
            .context
            .get()
            .ok_or_else(|| SourceError::NotInitialized(self.name.clone()))?;
        let Some(scope) = self.cache.scope(working_directory) else {
            debug!(source = %self.name, "skipping directory-scoped refresh without a directory");
            return Ok(());
        };

        let generation = self.store.generation();
        let items = context.execute(command, working_directory)?;
        let count = items.len();
        match self
            .store
            .publish_if_current(generation, scope, items, context.now())
        {
            Some(published) => {
                debug!(source = %self.name, items = count, generation = published, "Refreshed source cache")
            }
            None => debug!(source = %self.name, "Discarding superseded refresh result"),
        }
        Ok(())
    }

    /// Returns the cached entry for `working_directory` without computing.
    pub fn try_get_cached(&self, working_directory: Option<&str>) -> Option<Arc<CacheEntry>> {
        let scope = self.cache.scope(working_directory)?;
        self.store.get(&scope)
    }

    /// Whether `entry` has outlived the TTL, according to the bound clock.
    ///
    /// Unbound sources and sources without a TTL never expire.
    pub fn is_expired(&self, entry: &CacheEntry) -> bool {
        let (Some(ttl), Some(context)) = (self.cache.ttl(), self.context.get()) else {
            return false;
        };
        let age = context.now().signed_duration_since(entry.computed_at);
        age.to_std().is_ok_and(|age| age >= ttl)
    }

    /// Scheduler advice: whether a refresh for `working_directory` should be
    /// enqueued.
    pub fn needs_refresh(&self, working_directory: Option<&str>) -> bool {
        if !self.is_dynamic() || self.cache.scope(working_directory).is_none() {
            return false;
        }
        match self.try_get_cached(working_directory) {
            None => true,
            Some(_) if !self.cache.is_enabled() => true,
            Some(entry) => self.is_expired(&entry),
        }
    }

    /// Items currently available for `working_directory`.
    pub fn items(
        &self,
        working_directory: Option<&str>,
        staleness: StalenessPolicy,
    ) -> SourceItems<'_> {
        match &self.kind {
            SourceKind::Static { items } => SourceItems::Static(items),
            SourceKind::Dynamic { .. } => match self.try_get_cached(working_directory) {
                Some(entry)
                    if staleness == StalenessPolicy::RejectExpired && self.is_expired(&entry) =>
                {
                    SourceItems::Empty
                }
                Some(entry) => SourceItems::Cached(entry),
                None => SourceItems::Empty,
            },
        }
    }
}

/// Items of a source as seen by one read.
#[derive(Debug, Clone)]
pub enum SourceItems<'a> {
    /// Nothing cached yet.
    Empty,
    /// Items of a static source.
    Static(&'a [SourceItem]),
    /// Snapshot of a dynamic source's cache entry.
    Cached(Arc<CacheEntry>),
}

impl SourceItems<'_> {
    /// The items as a slice.
    pub fn as_slice(&self) -> &[SourceItem] {
        match self {
            Self::Empty => &[],
            Self::Static(items) => items,
            Self::Cached(entry) => &entry.items,
        }
    }

    /// Whether there are no items.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}
