//! Dictionary validation.
//!
//! Checks the structural invariants of a [`Dictionary`] before it is used for
//! matching: required root fields, named and keyed parameters, and keys that
//! are unambiguous among siblings.
//!
//! # Examples
//!
//! ```
//! use command_suggest_core::*;
//!
//! let git = Dictionary::new("git").with_parameter(Parameter::command("commit"));
//! assert!(validate_dictionary(&git).is_ok());
//!
//! // Invalid: no top-level parameters
//! let empty = Dictionary::new("git");
//! assert_eq!(
//!     validate_dictionary(&empty),
//!     Err(ConfigurationError::MissingField("parameters")),
//! );
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{Dictionary, Parameter};

/// Malformed or incomplete dictionary.
///
/// Fatal to the dictionary it was raised for; never repaired silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A required root field (`keys`, `platforms`, `name`, `parameters`) is
    /// absent or empty.
    #[error("dictionary field `{0}` is missing or empty")]
    MissingField(&'static str),
    /// `initialize` was called without an execution context.
    #[error("dictionary `{0}` cannot be initialized without an execution context")]
    MissingExecutionContext(String),
    /// A parameter has an empty name.
    #[error("parameter in scope `{scope}` has an empty name")]
    MissingParameterName {
        /// Space separated path of the enclosing scope.
        scope: String,
    },
    /// A command or flag parameter defines no keys.
    #[error("parameter `{parameter}` must define at least one key")]
    MissingKeys {
        /// Name of the offending parameter.
        parameter: String,
    },
    /// Two sibling parameters share a key.
    #[error("duplicate key `{key}` in scope `{scope}`")]
    DuplicateKey {
        /// Space separated path of the enclosing scope.
        scope: String,
        /// The ambiguous key.
        key: String,
    },
}

/// Validates a dictionary, stopping at the first problem.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] describing the first invariant violated.
pub fn validate_dictionary(dictionary: &Dictionary) -> Result<(), ConfigurationError> {
    if dictionary.keys.iter().all(|k| k.trim().is_empty()) {
        return Err(ConfigurationError::MissingField("keys"));
    }
    if dictionary.platforms.is_empty() {
        return Err(ConfigurationError::MissingField("platforms"));
    }
    if dictionary.name.trim().is_empty() {
        return Err(ConfigurationError::MissingField("name"));
    }
    if dictionary.parameters.is_empty() {
        return Err(ConfigurationError::MissingField("parameters"));
    }

    let mut path = vec![dictionary.name.clone()];
    validate_parameters(&dictionary.parameters, &mut path)
}

fn validate_parameters(
    parameters: &[Parameter],
    path: &mut Vec<String>,
) -> Result<(), ConfigurationError> {
    let mut seen: HashSet<String> = HashSet::new();

    for parameter in parameters {
        if parameter.name.trim().is_empty() {
            return Err(ConfigurationError::MissingParameterName {
                scope: path.join(" "),
            });
        }

        if parameter.keys.is_empty() && !parameter.is_value() {
            return Err(ConfigurationError::MissingKeys {
                parameter: parameter.name.clone(),
            });
        }

        for key in &parameter.keys {
            if key.trim().is_empty() {
                return Err(ConfigurationError::MissingKeys {
                    parameter: parameter.name.clone(),
                });
            }
            if !seen.insert(key.to_lowercase()) {
                return Err(ConfigurationError::DuplicateKey {
                    scope: path.join(" "),
                    key: key.clone(),
                });
            }
        }

        if !parameter.parameters.is_empty() {
            path.push(parameter.name.clone());
            let result = validate_parameters(&parameter.parameters, path);
            path.pop();
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{Clock, ExecutionContext, Platforms, SystemClock};

    fn valid() -> Dictionary {
        Dictionary::new("git")
            .with_parameter(Parameter::command("commit").with_parameter(Parameter::flag(
                &["--verbose", "-v"],
                "Verbose",
            )))
            .with_parameter(Parameter::positional("Path"))
    }

    #[test]
    fn test_validate_accepts_valid_dictionary() {
        assert_eq!(validate_dictionary(&valid()), Ok(()));
    }

    #[test]
    fn test_validate_names_missing_root_fields() {
        let mut no_keys = valid();
        no_keys.keys.clear();
        assert_eq!(
            validate_dictionary(&no_keys),
            Err(ConfigurationError::MissingField("keys"))
        );

        let no_platforms = valid().with_platforms(Platforms::NONE);
        assert_eq!(
            validate_dictionary(&no_platforms),
            Err(ConfigurationError::MissingField("platforms"))
        );

        let mut no_name = valid();
        no_name.name = "  ".to_string();
        assert_eq!(
            validate_dictionary(&no_name),
            Err(ConfigurationError::MissingField("name"))
        );

        let mut no_parameters = valid();
        no_parameters.parameters.clear();
        assert_eq!(
            validate_dictionary(&no_parameters),
            Err(ConfigurationError::MissingField("parameters"))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_sibling_keys() {
        let dictionary = Dictionary::new("git").with_parameter(
            Parameter::command("commit")
                .with_parameter(Parameter::flag(&["--verbose", "-v"], "Verbose"))
                .with_parameter(Parameter::value(&["-V"], "Version")),
        );

        assert_eq!(
            validate_dictionary(&dictionary),
            Err(ConfigurationError::DuplicateKey {
                scope: "git commit".to_string(),
                key: "-V".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_allows_same_key_in_different_scopes() {
        let dictionary = Dictionary::new("git")
            .with_parameter(
                Parameter::command("commit").with_parameter(Parameter::flag(&["-q"], "Quiet")),
            )
            .with_parameter(
                Parameter::command("checkout").with_parameter(Parameter::flag(&["-q"], "Quiet")),
            );
        assert_eq!(validate_dictionary(&dictionary), Ok(()));
    }

    #[test]
    fn test_validate_rejects_keyless_flag() {
        let dictionary = Dictionary::new("git").with_parameter(Parameter::flag(&[], "Orphan"));
        assert_eq!(
            validate_dictionary(&dictionary),
            Err(ConfigurationError::MissingKeys {
                parameter: "Orphan".to_string()
            })
        );
    }

    #[test]
    fn test_initialize_requires_context() {
        let dictionary = valid();
        assert_eq!(
            dictionary.initialize(None),
            Err(ConfigurationError::MissingExecutionContext("git".to_string()))
        );
    }

    #[derive(Debug)]
    struct NoopContext;

    impl Clock for NoopContext {
        fn now(&self) -> chrono::DateTime<chrono::Utc> {
            SystemClock.now()
        }
    }

    impl ExecutionContext for NoopContext {
        fn execute(
            &self,
            _command: &str,
            _working_directory: Option<&str>,
        ) -> Result<Vec<crate::SourceItem>, crate::SourceError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_valid_dictionary_always_initializes() {
        let context: Arc<dyn ExecutionContext> = Arc::new(NoopContext);
        let dictionary = valid();
        assert!(dictionary.validate().is_ok());
        assert_eq!(dictionary.initialize(Some(Arc::clone(&context))), Ok(()));
        // second call is harmless
        assert_eq!(dictionary.initialize(Some(context)), Ok(()));
    }
}
