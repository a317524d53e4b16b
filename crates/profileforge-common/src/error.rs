//! Common error types used throughout profileforge.
//!
//! Only malformed input (rule files, templates, paths) surfaces as an [`Error`]
//! from the public conversion API. Failures while applying a single rule are
//! recorded in the conversion report instead.

/// Common error type for profileforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A rule definition could not be parsed.
    #[error("Invalid rule #{index} ({path}): {message}")]
    InvalidRule {
        index: usize,
        path: String,
        message: String,
    },

    /// The rule document itself is malformed.
    #[error("Invalid rule document: {0}")]
    RuleDocument(String),

    /// The template tree cannot be used as a starting target.
    #[error("Invalid template: {0}")]
    Template(String),

    /// A document path could not be parsed.
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// A custom transform failed while producing a value.
    #[error("Transform '{name}' failed: {message}")]
    Transform { name: String, message: String },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new InvalidRule error.
    pub fn invalid_rule<P: Into<String>, S: Into<String>>(index: usize, path: P, msg: S) -> Self {
        Self::InvalidRule {
            index,
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a new RuleDocument error.
    pub fn rule_document<S: Into<String>>(msg: S) -> Self {
        Self::RuleDocument(msg.into())
    }

    /// Create a new Template error.
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create a new InvalidPath error.
    pub fn invalid_path<P: Into<String>, S: Into<String>>(path: P, msg: S) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a new Transform error.
    pub fn transform<N: Into<String>, S: Into<String>>(name: N, msg: S) -> Self {
        Self::Transform {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_rule(3, "bitrate", "missing target");
        assert_eq!(err.to_string(), "Invalid rule #3 (bitrate): missing target");

        let err = Error::template("root is not an object");
        assert_eq!(err.to_string(), "Invalid template: root is not an object");

        let err = Error::invalid_path("a[x]", "bad index");
        assert_eq!(err.to_string(), "Invalid path 'a[x]': bad index");

        let err = Error::transform("custom", "boom");
        assert_eq!(err.to_string(), "Transform 'custom' failed: boom");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(
            Error::rule_document("no rules"),
            Error::RuleDocument(_)
        ));
        assert!(matches!(
            Error::invalid_input("bad data"),
            Error::InvalidInput(_)
        ));
    }
}
