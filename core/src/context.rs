//! Capabilities supplied by the host environment.
//!
//! Value sources never reach outside the process on their own: the clock
//! used to stamp cache entries and the mechanism that runs a dynamic
//! source's command both come from an [`ExecutionContext`] bound during
//! [`Dictionary::initialize`](crate::Dictionary::initialize).

use std::fmt;

use chrono::{DateTime, Utc};

use crate::source::{SourceError, SourceItem};

/// Time source for cache timestamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Host environment as seen by value sources.
pub trait ExecutionContext: Clock + fmt::Debug {
    /// Runs a dynamic source's command and returns its items in order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Execution`] when the command cannot be run or
    /// reports failure.
    fn execute(
        &self,
        command: &str,
        working_directory: Option<&str>,
    ) -> Result<Vec<SourceItem>, SourceError>;

    /// Working directory used when the caller does not supply one.
    fn current_dir(&self) -> Option<String> {
        std::env::current_dir()
            .ok()
            .map(|path| path.to_string_lossy().into_owned())
    }
}
