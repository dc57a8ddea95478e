//! Dictionary loading and engine configuration for command suggestions.
//!
//! This crate loads command dictionaries from JSON and YAML files and
//! directories, and reads the YAML configuration of the suggestion engine.
//!
//! # Quick start
//!
//! ```no_run
//! use command_suggest_db::{DictionaryDatabase, SuggestConfig};
//!
//! // Load dictionaries from a directory
//! let db = DictionaryDatabase::from_dir("dictionaries/").unwrap();
//! if let Some(git) = db.get("git") {
//!     println!("git has {} top-level parameters", git.parameters.len());
//! }
//!
//! // Use the builder for fallback chains
//! let db = DictionaryDatabase::builder()
//!     .from_dir("dictionaries/")
//!     .from_file("git.json")
//!     .build()
//!     .unwrap();
//!
//! // Engine settings
//! let config = SuggestConfig::load("suggest.yml").unwrap();
//! let options = config.suggest_options();
//! ```

mod config;
mod error;
mod loader;

pub use config::{ExecutionConfig, MatchingConfig, SuggestConfig};
pub use error::{DatabaseError, Result};
pub use loader::{
    DatabaseBuilder, DatabaseSource, DictionaryDatabase, is_dictionary_file, load_dictionary,
};
