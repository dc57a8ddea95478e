//! Error types for the execution engine.

use command_suggest_core::{ConfigurationError, SourceError};
use command_suggest_db::DatabaseError;
use thiserror::Error;

/// Errors raised by [`ExecutionEngine`](crate::ExecutionEngine) and its
/// worker.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `start` was called while the worker is alive.
    #[error("execution engine is already started")]
    AlreadyStarted,

    /// `stop` or `sync` was called without a running worker.
    #[error("execution engine is not started")]
    NotStarted,

    /// A dictionary failed validation or initialization.
    #[error("invalid dictionary: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Dictionary files could not be loaded.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A dynamic value source failed.
    #[error("value source refresh failed: {0}")]
    Source(#[from] SourceError),

    /// A command panicked on the worker thread.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// The worker could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// `sync` gave up before the worker caught up.
    #[error("timed out waiting for queued commands")]
    SyncTimeout,

    /// The worker exited before reaching a `sync` barrier.
    #[error("worker exited before processing queued commands")]
    WorkerExited,
}

/// Convenience alias for results with [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
