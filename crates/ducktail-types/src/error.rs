//! Configuration error model.
//!
//! Every variant here is raised before the engine is touched and is never
//! retried automatically.

/// A pipeline specification or option failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// An identifier was empty.
    #[error("identifier must not be empty")]
    EmptyIdentifier,

    /// An identifier contained a character outside the allowed set.
    #[error("invalid identifier {value:?}: character {invalid:?} is not allowed")]
    InvalidIdentifier { value: String, invalid: char },

    /// A field required by the declared type is absent.
    #[error("{owner} type '{type_tag}' requires '{field}'")]
    MissingField {
        owner: &'static str,
        type_tag: String,
        field: &'static str,
    },

    /// Fields that must not be combined were both set.
    #[error("{owner} type '{type_tag}': {message}")]
    Conflict {
        owner: &'static str,
        type_tag: String,
        message: String,
    },

    /// `mode: upsert` without a `unique_key`.
    #[error("upsert mode requires 'unique_key'")]
    MissingUniqueKey,

    /// The requested combination is not supported by the backend family.
    #[error("{owner} type '{type_tag}' does not support {what}")]
    Unsupported {
        owner: &'static str,
        type_tag: String,
        what: String,
    },

    /// A runtime option is out of range or malformed.
    #[error("invalid option '{option}': {message}")]
    InvalidOption {
        option: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::MissingField`].
    #[must_use]
    pub fn missing(owner: &'static str, type_tag: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            owner,
            type_tag: type_tag.into(),
            field,
        }
    }

    /// Shorthand for [`ConfigError::InvalidOption`].
    #[must_use]
    pub fn option(option: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_owner_and_field() {
        let err = ConfigError::missing("source", "csv", "path");
        assert_eq!(err.to_string(), "source type 'csv' requires 'path'");
    }

    #[test]
    fn invalid_identifier_shows_offending_char() {
        let err = ConfigError::InvalidIdentifier {
            value: "a;b".into(),
            invalid: ';',
        };
        let msg = err.to_string();
        assert!(msg.contains("\"a;b\""), "got: {msg}");
        assert!(msg.contains("';'"), "got: {msg}");
    }

    #[test]
    fn option_error_displays() {
        let err = ConfigError::option("threads", "must be between 1 and 64");
        assert_eq!(
            err.to_string(),
            "invalid option 'threads': must be between 1 and 64"
        );
    }
}
