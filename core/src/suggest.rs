//! Dictionary-driven suggestions.
//!
//! [`DictionarySuggestor::get_predictions`] walks the completed tokens of a
//! command line through the dictionary tree, then produces candidates for
//! the token under the cursor. The walk is a small state machine:
//!
//! - the innermost scope holds the parameters of the last selected command;
//!   selecting a non-recursive parameter consumes it within that scope
//! - recursive parameters stay available at every depth below their owner
//! - a keyed value parameter selected without `=value` waits for the next
//!   token to bind its value
//!
//! Suggestions are produced lazily. Dynamic values come only from what is
//! already cached; this module never runs a command.

use std::fmt;
use std::sync::Arc;
use std::vec;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::source::{SourceItems, StalenessPolicy};
use crate::tokenize::{QuoteKind, Token, TokenStream, quote_literal};
use crate::types::{Dictionary, Parameter, ParameterKind};

/// How typed text is compared with candidates. Both modes ignore ASCII case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Candidate starts with the typed text.
    #[default]
    Prefix,
    /// Candidate contains the typed text anywhere.
    Contains,
}

impl MatchMode {
    /// Whether `candidate` matches `typed`. Empty text matches everything.
    pub fn matches(self, candidate: &str, typed: &str) -> bool {
        if typed.is_empty() {
            return true;
        }
        let candidate = candidate.to_lowercase();
        let typed = typed.to_lowercase();
        match self {
            Self::Prefix => candidate.starts_with(&typed),
            Self::Contains => candidate.contains(&typed),
        }
    }
}

/// Matching options shared by every suggestor of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestOptions {
    /// Text comparison.
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Treatment of expired cache entries.
    #[serde(default)]
    pub staleness: StalenessPolicy,
}

/// One suggestion request.
#[derive(Debug, Clone)]
pub struct ParsingContext {
    /// The first word of the line.
    pub command: String,
    /// Every token of the line, command word included.
    pub tokens: TokenStream,
    /// Directory used to look up directory-scoped cache entries.
    pub working_directory: Option<String>,
}

impl ParsingContext {
    /// Builds a context from a token stream. The command is the first token.
    pub fn new(tokens: TokenStream) -> Self {
        let command = tokens
            .tokens()
            .first()
            .map(|t| t.text().to_string())
            .unwrap_or_default();
        Self {
            command,
            tokens,
            working_directory: None,
        }
    }

    /// Sets the working directory.
    pub fn with_working_directory(mut self, working_directory: impl Into<String>) -> Self {
        self.working_directory = Some(working_directory.into());
        self
    }
}

/// What a suggestion inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    /// A sub-command key.
    Command,
    /// A flag or value key.
    Flag,
    /// A value from a source.
    Value,
}

/// A full replacement line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// The whole command line with the completion applied.
    pub text: String,
    /// Description of the parameter or item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Kind of the completed element.
    pub kind: SuggestionKind,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Produces suggestions for one dictionary.
#[derive(Debug, Clone)]
pub struct DictionarySuggestor {
    dictionary: Arc<Dictionary>,
    options: SuggestOptions,
}

impl DictionarySuggestor {
    /// Creates a suggestor with default options.
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self {
            dictionary,
            options: SuggestOptions::default(),
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: SuggestOptions) -> Self {
        self.options = options;
        self
    }

    /// The dictionary.
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// The matching options.
    pub fn options(&self) -> SuggestOptions {
        self.options
    }

    /// Whether this suggestor handles `command`.
    pub fn matches_command(&self, command: &str) -> bool {
        self.dictionary.matches_key(command)
    }

    /// Suggestions for the last token of `context`, in dictionary order.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_suggest_core::*;
    ///
    /// let git = Dictionary::new("git")
    ///     .with_parameter(Parameter::command("commit"))
    ///     .with_parameter(Parameter::command("checkout"))
    ///     .with_parameter(Parameter::command("push"));
    /// let suggestor = DictionarySuggestor::new(Arc::new(git));
    ///
    /// let context = ParsingContext::new(tokenize(["git", "c"], false));
    /// let texts: Vec<String> = suggestor
    ///     .get_predictions(&context)
    ///     .map(|s| s.text)
    ///     .collect();
    /// assert_eq!(texts, vec!["git commit", "git checkout"]);
    /// ```
    pub fn get_predictions(&self, context: &ParsingContext) -> Predictions<'_> {
        let Some((command, rest)) = context.tokens.tokens().split_first() else {
            return Predictions::empty(self.options.match_mode);
        };
        if !self.matches_command(command.text()) {
            return Predictions::empty(self.options.match_mode);
        }

        let working_directory = context.working_directory.as_deref();
        let mut walk = Walk::new(&self.dictionary.parameters);
        let mut typed_words = vec![command.raw()];

        let (completed, current) = match rest.split_last() {
            Some((last, completed)) if !context.tokens.has_trailing_space() => {
                (completed, Some(last))
            }
            _ => (rest, None),
        };
        for token in completed {
            walk.consume(token);
            typed_words.push(token.raw());
        }

        let mut typed = Typed::default();
        let mut candidates = None;
        if let Some(token) = current {
            match walk.complete(token) {
                Completion::Consumed => typed_words.push(token.raw()),
                Completion::Filter(filter) => typed = filter,
                Completion::Values {
                    parameter,
                    assignment_key,
                    filter,
                } => {
                    typed = filter;
                    candidates = Some(vec![Candidate::Values {
                        items: self.items_of(parameter, working_directory),
                        assignment_key,
                    }]);
                }
            }
        }

        let candidates = candidates.unwrap_or_else(|| {
            walk.enumerate(typed.flags_only, |p| self.items_of(p, working_directory))
        });

        trace!(
            dictionary = %self.dictionary.name,
            candidates = candidates.len(),
            "Collected candidates"
        );

        Predictions {
            prefix: typed_words.join(" "),
            typed,
            match_mode: self.options.match_mode,
            candidates: candidates.into_iter(),
            buffered: Vec::new().into_iter(),
        }
    }

    fn items_of<'a>(
        &'a self,
        parameter: &'a Parameter,
        working_directory: Option<&str>,
    ) -> SourceItems<'a> {
        parameter
            .source()
            .map_or(SourceItems::Empty, |source| {
                source.items(working_directory, self.options.staleness)
            })
    }
}

/// Text under the cursor.
#[derive(Debug, Clone, Default)]
struct Typed {
    text: String,
    quote: QuoteKind,
    flags_only: bool,
}

impl Typed {
    fn from_token(token: &Token) -> Self {
        Self {
            text: token.text().to_string(),
            quote: token.quote(),
            flags_only: token.is_flag_like(),
        }
    }

    fn value(token: &Token) -> Self {
        Self {
            text: token.text().to_string(),
            quote: token.quote(),
            flags_only: false,
        }
    }
}

#[derive(Debug)]
enum Candidate<'a> {
    Key(&'a Parameter),
    Values {
        items: SourceItems<'a>,
        assignment_key: Option<String>,
    },
}

enum Completion<'a> {
    /// The token completed a parameter; enumerate what follows it.
    Consumed,
    /// Enumerate the current scope, filtered by the token.
    Filter(Typed),
    /// Complete a value of `parameter`.
    Values {
        parameter: &'a Parameter,
        assignment_key: Option<String>,
        filter: Typed,
    },
}

#[derive(Debug)]
struct Scope<'a> {
    parameters: &'a [Parameter],
    consumed: Vec<bool>,
}

impl<'a> Scope<'a> {
    fn new(parameters: &'a [Parameter]) -> Self {
        Self {
            parameters,
            consumed: vec![false; parameters.len()],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    depth: usize,
    index: usize,
}

#[derive(Debug)]
struct Walk<'a> {
    scopes: Vec<Scope<'a>>,
    pending: Option<&'a Parameter>,
}

impl<'a> Walk<'a> {
    fn new(parameters: &'a [Parameter]) -> Self {
        Self {
            scopes: vec![Scope::new(parameters)],
            pending: None,
        }
    }

    fn innermost(&self) -> usize {
        self.scopes.len() - 1
    }

    fn parameter(&self, hit: Hit) -> &'a Parameter {
        let parameters: &'a [Parameter] = self.scopes[hit.depth].parameters;
        &parameters[hit.index]
    }

    // Innermost scope first; ancestors only contribute recursive parameters.
    fn find_keyed(&self, literal: &str) -> Option<Hit> {
        let innermost = self.innermost();
        self.scopes.iter().enumerate().rev().find_map(|(depth, scope)| {
            scope
                .parameters
                .iter()
                .enumerate()
                .position(|(index, p)| {
                    p.matches_key(literal)
                        && (p.recursive || (depth == innermost && !scope.consumed[index]))
                })
                .map(|index| Hit { depth, index })
        })
    }

    fn find_positional(&self) -> Option<Hit> {
        let depth = self.innermost();
        let scope = &self.scopes[depth];
        scope
            .parameters
            .iter()
            .enumerate()
            .position(|(index, p)| p.is_positional() && !scope.consumed[index])
            .map(|index| Hit { depth, index })
    }

    fn assignment_hit(&self, token: &Token) -> Option<Hit> {
        let assignment = token.assignment()?;
        self.find_keyed(&assignment.key).filter(|hit| {
            matches!(
                &self.parameter(*hit).kind,
                ParameterKind::Value { separator, .. } if separator.accepts_equals()
            )
        })
    }

    fn select(&mut self, hit: Hit, value_bound: bool) {
        let parameter = self.parameter(hit);
        if !parameter.recursive {
            self.scopes[hit.depth].consumed[hit.index] = true;
        }
        if let ParameterKind::Value { separator, .. } = &parameter.kind {
            if !value_bound && !parameter.keys.is_empty() && separator.accepts_whitespace() {
                self.pending = Some(parameter);
                return;
            }
        }
        self.enter(parameter);
    }

    fn enter(&mut self, parameter: &'a Parameter) {
        if matches!(parameter.kind, ParameterKind::Command) || !parameter.parameters.is_empty() {
            self.scopes.push(Scope::new(&parameter.parameters));
        }
    }

    fn bind_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(parameter) => {
                self.enter(parameter);
                true
            }
            None => false,
        }
    }

    fn consume(&mut self, token: &Token) {
        if self.bind_pending() {
            return;
        }
        if let Some(hit) = self.assignment_hit(token) {
            self.select(hit, true);
        } else if let Some(hit) = self.find_keyed(token.text()) {
            self.select(hit, false);
        } else if let Some(hit) = self.find_positional().filter(|_| !token.is_flag_like()) {
            self.select(hit, true);
        } else {
            trace!(token = token.raw(), "Token matches no parameter");
        }
    }

    fn complete(&mut self, token: &Token) -> Completion<'a> {
        let closed_quote = token.is_quoted() && token.is_closed();

        if let Some(parameter) = self.pending {
            if closed_quote {
                self.bind_pending();
                return Completion::Consumed;
            }
            return Completion::Values {
                parameter,
                assignment_key: None,
                filter: Typed::value(token),
            };
        }

        if let (Some(hit), Some(assignment)) = (self.assignment_hit(token), token.assignment()) {
            if assignment.value.is_quoted() && assignment.value.is_closed() {
                self.select(hit, true);
                return Completion::Consumed;
            }
            return Completion::Values {
                parameter: self.parameter(hit),
                assignment_key: Some(assignment.key.clone()),
                filter: Typed::value(&assignment.value),
            };
        }

        if token.is_closed() {
            if let Some(hit) = self.find_keyed(token.text()) {
                self.select(hit, false);
                return Completion::Consumed;
            }
            if closed_quote {
                if let Some(hit) = self.find_positional() {
                    self.select(hit, true);
                    return Completion::Consumed;
                }
            }
        }

        Completion::Filter(Typed::from_token(token))
    }

    // Authored order: current scope's free parameters, then its recursive
    // ones, then recursive parameters of ancestors, innermost first.
    fn enumerate<F>(&self, flags_only: bool, items_of: F) -> Vec<Candidate<'a>>
    where
        F: Fn(&'a Parameter) -> SourceItems<'a>,
    {
        if let Some(parameter) = self.pending {
            return vec![Candidate::Values {
                items: items_of(parameter),
                assignment_key: None,
            }];
        }

        let innermost = self.innermost();
        let scope = &self.scopes[innermost];
        let mut candidates = Vec::new();

        for (index, parameter) in scope.parameters.iter().enumerate() {
            if parameter.recursive || scope.consumed[index] {
                continue;
            }
            if parameter.is_positional() {
                if !flags_only {
                    candidates.push(Candidate::Values {
                        items: items_of(parameter),
                        assignment_key: None,
                    });
                }
            } else {
                candidates.push(Candidate::Key(parameter));
            }
        }

        for scope in self.scopes.iter().rev() {
            candidates.extend(
                scope
                    .parameters
                    .iter()
                    .filter(|p| p.recursive && !p.keys.is_empty())
                    .map(Candidate::Key),
            );
        }

        candidates
    }
}

/// Lazy sequence of suggestions returned by
/// [`DictionarySuggestor::get_predictions`].
#[derive(Debug)]
pub struct Predictions<'a> {
    prefix: String,
    typed: Typed,
    match_mode: MatchMode,
    candidates: vec::IntoIter<Candidate<'a>>,
    buffered: vec::IntoIter<Suggestion>,
}

impl Predictions<'_> {
    fn empty(match_mode: MatchMode) -> Self {
        Self {
            prefix: String::new(),
            typed: Typed::default(),
            match_mode,
            candidates: Vec::new().into_iter(),
            buffered: Vec::new().into_iter(),
        }
    }

    fn key_suggestion(&self, parameter: &Parameter) -> Option<Suggestion> {
        let key = parameter.keys.iter().find(|key| {
            (!self.typed.flags_only || key.starts_with('-'))
                && self.match_mode.matches(key, &self.typed.text)
        })?;
        let kind = match parameter.kind {
            ParameterKind::Command => SuggestionKind::Command,
            _ => SuggestionKind::Flag,
        };
        Some(Suggestion {
            text: format!("{} {}", self.prefix, quote_literal(key, self.typed.quote)),
            description: non_empty(&parameter.description),
            kind,
        })
    }

    fn value_suggestions(
        &self,
        items: &SourceItems<'_>,
        assignment_key: Option<&str>,
    ) -> Vec<Suggestion> {
        items
            .as_slice()
            .iter()
            .filter(|item| self.match_mode.matches(&item.name, &self.typed.text))
            .map(|item| {
                let value = quote_literal(&item.name, self.typed.quote);
                let text = match assignment_key {
                    Some(key) => format!("{} {key}={value}", self.prefix),
                    None => format!("{} {value}", self.prefix),
                };
                Suggestion {
                    text,
                    description: non_empty(&item.description),
                    kind: SuggestionKind::Value,
                }
            })
            .collect()
    }
}

impl Iterator for Predictions<'_> {
    type Item = Suggestion;

    fn next(&mut self) -> Option<Suggestion> {
        loop {
            if let Some(suggestion) = self.buffered.next() {
                return Some(suggestion);
            }
            match self.candidates.next()? {
                Candidate::Key(parameter) => {
                    if let Some(suggestion) = self.key_suggestion(parameter) {
                        return Some(suggestion);
                    }
                }
                Candidate::Values {
                    items,
                    assignment_key,
                } => {
                    self.buffered = self
                        .value_suggestions(&items, assignment_key.as_deref())
                        .into_iter();
                }
            }
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
