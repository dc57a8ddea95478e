//! Background execution for command suggestions.
//!
//! [`ExecutionEngine`] owns a single worker thread that drains a
//! [`TaskQueue`] of administrative commands (load dictionaries, refresh
//! dynamic value sources) so that suggestion requests on the interactive
//! thread never block on I/O. Worker failures are recorded and reported
//! through [`ExecutionEngine::health`].
//!
//! [`ProcessContext`] is the default
//! [`ExecutionContext`](command_suggest_core::ExecutionContext): it runs
//! dynamic source commands through the platform shell.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use command_suggest_core::{ParsingContext, split_line, tokenize};
//! use command_suggest_db::SuggestConfig;
//! use command_suggest_engine::ExecutionEngine;
//!
//! let config = SuggestConfig::load("suggest.yml").unwrap();
//! let mut engine = ExecutionEngine::from_config(&config);
//! engine.start().unwrap();
//! engine.sync(Duration::from_secs(5)).unwrap();
//!
//! let (words, trailing) = split_line("git checkout ");
//! let request = ParsingContext::new(tokenize(words, trailing)).with_working_directory("/repo");
//! let first = engine.suggest(&request);
//!
//! // dynamic sources were scheduled by the first request
//! engine.sync(Duration::from_secs(5)).unwrap();
//! let second = engine.suggest(&request);
//! assert!(second.len() >= first.len());
//! ```

mod engine;
mod error;
mod process;
mod queue;

pub use engine::{ExecutionEngine, Health, WorkerState};
pub use error::{EngineError, Result};
pub use process::ProcessContext;
pub use queue::TaskQueue;
