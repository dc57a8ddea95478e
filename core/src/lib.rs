//! Core dictionary types and the suggestion algorithm.
//!
//! This crate models the grammar of a command-line tool and completes
//! partially typed command lines against it:
//!
//! - [`Dictionary`]: grammar of one top-level command, a tree of
//!   [`Parameter`] nodes (sub-commands, flags, and value slots).
//! - [`ValueSource`]: static or dynamic provider of candidate values, with
//!   its [`CachePolicy`] and snapshot [`SourceCache`].
//! - [`ExecutionContext`]: host capabilities (clock, command runner) bound
//!   to a dictionary by [`Dictionary::initialize`].
//! - [`DictionarySuggestor`]: turns a [`ParsingContext`] into lazy
//!   [`Suggestion`]s.
//!
//! Validation ([`validate_dictionary`]) rejects dictionaries with missing
//! fields, unnamed or keyless parameters, and ambiguous sibling keys.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use command_suggest_core::*;
//!
//! let git = Dictionary::new("git")
//!     .with_parameter(
//!         Parameter::command("commit")
//!             .with_parameter(Parameter::flag(&["--verbose", "-v"], "Verbose"))
//!             .with_parameter(Parameter::value(&["--cleanup"], "Cleanup").with_source(
//!                 ValueSource::new_static(
//!                     "Cleanup mode",
//!                     vec![SourceItem::from_name("strip"), SourceItem::from_name("default")],
//!                 ),
//!             )),
//!     )
//!     .with_parameter(Parameter::flag(&["--help", "-h"], "Help").mark_recursive());
//! assert!(validate_dictionary(&git).is_ok());
//!
//! let suggestor = DictionarySuggestor::new(Arc::new(git));
//! let context = ParsingContext::new(tokenize(["git", "commit", "--cleanup", "s"], false));
//! let texts: Vec<String> = suggestor.get_predictions(&context).map(|s| s.text).collect();
//! assert_eq!(texts, vec!["git commit --cleanup strip"]);
//! ```

mod cache;
mod context;
mod source;
mod suggest;
mod tokenize;
mod types;
mod validate;

pub use cache::{CacheEntry, CacheScope, SourceCache};
pub use context::{Clock, ExecutionContext, SystemClock};
pub use source::{
    CachePolicy, SourceError, SourceItem, SourceItems, SourceKind, StalenessPolicy, ValueSource,
};
pub use suggest::{
    DictionarySuggestor, MatchMode, ParsingContext, Predictions, SuggestOptions, Suggestion,
    SuggestionKind,
};
pub use tokenize::{Assignment, QuoteKind, Token, TokenStream, quote_literal, split_line, tokenize};
pub use types::*;
pub use validate::{ConfigurationError, validate_dictionary};
