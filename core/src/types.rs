//! Grammar type definitions for command dictionaries.
//!
//! A [`Dictionary`] describes one top-level command as a tree of
//! [`Parameter`] nodes. Every node is one of three kinds ([`ParameterKind`]):
//! a sub-command, a flag, or a value slot. Any node may carry child
//! parameters, which makes it command-like for matching purposes.
//!
//! The types deserialize from JSON/YAML dictionary files. Runtime state that
//! is attached during [`Dictionary::initialize`] (the bound execution context
//! and the value-source caches) is never serialized.

use std::ops::BitOr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::source::ValueSource;
use crate::validate::{ConfigurationError, validate_dictionary};

/// Set of host platforms a dictionary applies to.
///
/// Serialized as a list of platform names (`windows`, `linux`, `macos`, or
/// `all`).
///
/// # Examples
///
/// ```
/// use command_suggest_core::Platforms;
///
/// let unix = Platforms::LINUX | Platforms::MACOS;
/// assert!(unix.contains(Platforms::LINUX));
/// assert!(!unix.contains(Platforms::WINDOWS));
/// assert!(Platforms::default().is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PlatformName>", into = "Vec<PlatformName>")]
pub struct Platforms(u8);

impl Platforms {
    /// No platform; fails validation.
    pub const NONE: Self = Self(0);
    /// Microsoft Windows.
    pub const WINDOWS: Self = Self(1);
    /// Linux.
    pub const LINUX: Self = Self(1 << 1);
    /// macOS.
    pub const MACOS: Self = Self(1 << 2);
    /// Every supported platform.
    pub const ALL: Self = Self(0b111);

    /// Returns the raw bit representation.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when no platform bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Returns `true` when `self` and `other` share at least one platform.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::WINDOWS
        } else if cfg!(target_os = "macos") {
            Self::MACOS
        } else {
            Self::LINUX
        }
    }
}

impl BitOr for Platforms {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PlatformName {
    Windows,
    Linux,
    Macos,
    All,
}

impl From<Vec<PlatformName>> for Platforms {
    fn from(names: Vec<PlatformName>) -> Self {
        names.into_iter().fold(Platforms::NONE, |acc, name| {
            acc | match name {
                PlatformName::Windows => Platforms::WINDOWS,
                PlatformName::Linux => Platforms::LINUX,
                PlatformName::Macos => Platforms::MACOS,
                PlatformName::All => Platforms::ALL,
            }
        })
    }
}

impl From<Platforms> for Vec<PlatformName> {
    fn from(platforms: Platforms) -> Self {
        if platforms == Platforms::ALL {
            return vec![PlatformName::All];
        }
        [
            (Platforms::WINDOWS, PlatformName::Windows),
            (Platforms::LINUX, PlatformName::Linux),
            (Platforms::MACOS, PlatformName::Macos),
        ]
        .into_iter()
        .filter(|(bit, _)| platforms.contains(*bit))
        .map(|(_, name)| name)
        .collect()
    }
}

/// How a value parameter accepts its value.
///
/// The dictionary decides whether `--key=value`, `--key value`, or both are
/// legal for a given parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSeparator {
    /// Both `key=value` and `key value` (the default).
    #[default]
    Both,
    /// Only `key=value`.
    Equals,
    /// Only `key value`.
    Whitespace,
}

impl ValueSeparator {
    /// Whether `key=value` is accepted.
    pub fn accepts_equals(self) -> bool {
        matches!(self, Self::Both | Self::Equals)
    }

    /// Whether `key value` is accepted.
    pub fn accepts_whitespace(self) -> bool {
        matches!(self, Self::Both | Self::Whitespace)
    }
}

/// The variant of a grammar node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterKind {
    /// A sub-command; selecting it moves matching into its parameters.
    Command,
    /// A flag without a value.
    Flag,
    /// A value slot, either keyed (`--message <value>`) or positional.
    Value {
        /// Where candidate values come from.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<ValueSource>,
        /// Which key/value forms are accepted.
        #[serde(default)]
        separator: ValueSeparator,
    },
}

/// A grammar node: sub-command, flag, or value slot.
///
/// # Examples
///
/// ```
/// use command_suggest_core::{Parameter, SourceItem, ValueSource};
///
/// let commit = Parameter::command("commit")
///     .with_parameter(Parameter::value(&["--message", "-m"], "Message"))
///     .with_parameter(Parameter::flag(&["--verbose", "-v"], "Verbose"));
///
/// assert_eq!(commit.parameters.len(), 2);
/// assert!(commit.parameters[0].matches_key("-M"));
///
/// let cleanup = Parameter::value(&["--cleanup"], "Cleanup").with_source(
///     ValueSource::new_static("Cleanup mode", vec![SourceItem::from_name("strip")]),
/// );
/// assert!(cleanup.source().is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Literal strings selecting this node (e.g. `["--message", "-m"]`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Display identifier.
    #[serde(default)]
    pub name: String,
    /// Human readable description, forwarded to suggestions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Offered at every matching depth below its owner.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recursive: bool,
    /// Node variant.
    #[serde(flatten)]
    pub kind: ParameterKind,
    /// Child parameters, in authored order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

impl Parameter {
    fn with_kind(keys: &[&str], name: &str, kind: ParameterKind) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            name: name.to_string(),
            description: String::new(),
            recursive: false,
            kind,
            parameters: Vec::new(),
        }
    }

    /// Creates a sub-command selected by its own name.
    pub fn command(name: &str) -> Self {
        Self::with_kind(&[name], name, ParameterKind::Command)
    }

    /// Creates a flag selected by any of `keys`.
    pub fn flag(keys: &[&str], name: &str) -> Self {
        Self::with_kind(keys, name, ParameterKind::Flag)
    }

    /// Creates a keyed value parameter with no value source.
    pub fn value(keys: &[&str], name: &str) -> Self {
        Self::with_kind(
            keys,
            name,
            ParameterKind::Value {
                source: None,
                separator: ValueSeparator::default(),
            },
        )
    }

    /// Creates a positional value parameter (no keys).
    pub fn positional(name: &str) -> Self {
        Self::value(&[], name)
    }

    /// Adds a key.
    pub fn with_key(mut self, key: &str) -> Self {
        self.keys.push(key.to_string());
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Marks the parameter as available at every depth below its owner.
    pub fn mark_recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Adds a child parameter.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Attaches a value source. Ignored for non-value parameters.
    pub fn with_source(mut self, value_source: ValueSource) -> Self {
        if let ParameterKind::Value { source, .. } = &mut self.kind {
            *source = Some(value_source);
        }
        self
    }

    /// Restricts the accepted key/value forms. Ignored for non-value
    /// parameters.
    pub fn with_separator(mut self, value_separator: ValueSeparator) -> Self {
        if let ParameterKind::Value { separator, .. } = &mut self.kind {
            *separator = value_separator;
        }
        self
    }

    /// Returns the value source of a value parameter.
    pub fn source(&self) -> Option<&ValueSource> {
        match &self.kind {
            ParameterKind::Value { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` for value parameters.
    pub fn is_value(&self) -> bool {
        matches!(self.kind, ParameterKind::Value { .. })
    }

    /// Returns `true` for value parameters without keys.
    pub fn is_positional(&self) -> bool {
        self.is_value() && self.keys.is_empty()
    }

    /// Case-insensitive key comparison.
    pub fn matches_key(&self, literal: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(literal))
    }

    fn collect_sources<'a>(&'a self, out: &mut Vec<&'a ValueSource>) {
        if let Some(source) = self.source() {
            out.push(source);
        }
        for child in &self.parameters {
            child.collect_sources(out);
        }
    }

    fn initialize(&self, context: &Arc<dyn ExecutionContext>) {
        if let Some(source) = self.source() {
            source.bind(context);
        }
        for child in &self.parameters {
            child.initialize(context);
        }
    }
}

/// Grammar of one top-level command.
///
/// # Examples
///
/// ```
/// use command_suggest_core::{Dictionary, Parameter};
///
/// let git = Dictionary::new("git")
///     .with_parameter(Parameter::command("commit"))
///     .with_parameter(Parameter::flag(&["--help", "-h"], "Help").mark_recursive());
///
/// assert!(git.validate().is_ok());
/// assert!(git.matches_key("GIT"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    /// Command words selecting this dictionary (e.g. `["git"]`).
    #[serde(default)]
    pub keys: Vec<String>,
    /// Platforms the dictionary applies to.
    #[serde(default)]
    pub platforms: Platforms,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Human readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Top-level parameters, in authored order.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Dictionary {
    /// Creates a dictionary keyed and named by `command`, applicable to all
    /// platforms. Parameters still need to be added before it validates.
    pub fn new(command: &str) -> Self {
        Self {
            keys: vec![command.to_string()],
            platforms: Platforms::ALL,
            name: command.to_string(),
            description: String::new(),
            parameters: Vec::new(),
        }
    }

    /// Adds a top-level parameter.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds an alternative command key.
    pub fn with_key(mut self, key: &str) -> Self {
        self.keys.push(key.to_string());
        self
    }

    /// Replaces the platform set.
    pub fn with_platforms(mut self, platforms: Platforms) -> Self {
        self.platforms = platforms;
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Checks the structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_dictionary(self)
    }

    /// Validates the dictionary and binds every value source to `context`.
    ///
    /// Binding happens once; a second call keeps the first context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingExecutionContext`] when `context`
    /// is `None`, or the validation error of an invalid dictionary.
    pub fn initialize(
        &self,
        context: Option<Arc<dyn ExecutionContext>>,
    ) -> Result<(), ConfigurationError> {
        let context =
            context.ok_or_else(|| ConfigurationError::MissingExecutionContext(self.name.clone()))?;
        self.validate()?;
        for parameter in &self.parameters {
            parameter.initialize(&context);
        }
        Ok(())
    }

    /// Case-insensitive command key comparison.
    pub fn matches_key(&self, command: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(command))
    }

    /// Returns `true` when the dictionary applies to `platform`.
    pub fn supports(&self, platform: Platforms) -> bool {
        self.platforms.intersects(platform)
    }

    /// All value sources in declaration order.
    pub fn sources(&self) -> Vec<&ValueSource> {
        let mut out = Vec::new();
        for parameter in &self.parameters {
            parameter.collect_sources(&mut out);
        }
        out
    }
}
