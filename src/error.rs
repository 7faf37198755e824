//! Error types for the openapi-tree crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// One of the three fixed levels of the command hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Module,
    Resource,
    Action,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Module => "module",
            Self::Resource => "resource",
            Self::Action => "action",
        })
    }
}

/// Errors produced while discovering, building, resolving and running commands.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A positional name did not match anything registered at its level.
    #[error("Invalid or missing {level} name!")]
    Unresolved { level: Level, name: Option<String> },

    /// `Grouper::child_by_name` ran a full traversal without a match.
    #[error("no child named `{name}` under `{parent}`")]
    ChildNotFound { parent: String, name: String },

    #[error("failed to read API descriptions from {}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build API description {}", path.display())]
    Build {
        path: PathBuf,
        #[source]
        source: BuildError,
    },

    #[error("invalid value for `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("{0}")]
    InvalidArguments(clap::Error),

    #[error("invalid JSON in --json argument")]
    InvalidJsonBody(#[source] serde_json::Error),

    #[error("invalid --field format: {field} (expected key=value)")]
    InvalidFieldFormat { field: String },

    #[error("failed to read JSON from file: {path}")]
    JsonFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read JSON from stdin")]
    JsonStdinRead(#[source] std::io::Error),

    /// A destructive action was executed without going through confirmation.
    #[error("`{action}` needs confirmation; run it through a prompter")]
    ConfirmationRequired { action: String },

    #[error("no base URL configured (set base_url or declare a server in the API description)")]
    MissingBaseUrl,

    #[error(transparent)]
    Execution(#[from] DispatchError),

    #[error("configuration error")]
    Config(#[from] config::ConfigError),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl Error {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(level: Level, name: Option<&str>) -> Self {
        Self::Unresolved {
            level,
            name: name.map(str::to_owned),
        }
    }

    /// Whether this is a name-resolution failure, which callers recover from
    /// by rendering help instead of aborting.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Unresolved { .. } | Self::ChildNotFound { .. })
    }
}

/// Reasons a single API description document could not be turned into a tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error("failed to read file")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON document")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML document")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to resolve references: {0}")]
    Reference(String),
}

/// Errors that can occur during API dispatch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("unsupported HTTP method: {method}")]
    UnsupportedMethod { method: String },

    #[error("HTTP request failed")]
    RequestFailed(#[source] reqwest::Error),

    #[error("failed to read response body")]
    ResponseRead(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpError {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_message_names_the_level() {
        let err = Error::unresolved(Level::Resource, Some("nope"));
        assert_eq!(err.to_string(), "Invalid or missing resource name!");
        assert!(err.is_resolution());
    }

    #[test]
    fn validation_is_not_a_resolution_error() {
        let err = Error::validation("id", "required field is missing");
        assert_eq!(
            err.to_string(),
            "invalid value for `id`: required field is missing"
        );
        assert!(!err.is_resolution());
    }
}
