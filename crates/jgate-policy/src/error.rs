//! Policy loading and validation errors.

use std::path::PathBuf;
use thiserror::Error;

/// Policy error type.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Failed to read policy file.
    #[error("failed to read policy file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML.
    #[error("failed to parse policy file '{path}': {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to serialize policy.
    #[error("failed to serialize policy: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// Failed to write policy file.
    #[error("failed to write policy file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create policy directory.
    #[error("failed to create policy directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document parsed but contains invalid entries.
    #[error("invalid policy document: {}", join_errors(.0))]
    Invalid(Vec<PolicyValidationError>),

    /// Invalid environment variable value.
    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },
}

impl PolicyError {
    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse YAML error.
    pub fn parse_yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::ParseYaml {
            path: path.into(),
            source,
        }
    }

    /// Creates a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a create dir error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid env var error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A single problem found while validating a [`PolicyDocument`].
///
/// `scope` names where the offending entry lives: `defaults` or
/// `organizations.<alias>`.
///
/// [`PolicyDocument`]: crate::PolicyDocument
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyValidationError {
    /// A project entry has an empty key.
    #[error("{scope}: empty project key")]
    EmptyProjectKey { scope: String },

    /// A project key contains characters a tracker key cannot have.
    #[error("{scope}: invalid project key '{key}'")]
    InvalidProjectKey { scope: String, key: String },

    /// A command pattern is empty, has an empty segment, or contains
    /// characters outside `[a-z0-9_-]`.
    #[error("{scope}: invalid command pattern '{command}'")]
    InvalidCommand { scope: String, command: String },

    /// A space entry is empty.
    #[error("{scope}: empty space key")]
    EmptySpace { scope: String },

    /// A scoped rule uses `all` as its key. Only the bare string is the
    /// wildcard; as a scoped key it would match no project.
    #[error("{scope}: 'all' is only a wildcard as a bare entry, not as a scoped rule key")]
    ScopedWildcard { scope: String },

    /// A project rule declares a `jql` filter that is blank.
    #[error("{scope}: project '{key}' has an empty jql filter")]
    EmptySubFilter { scope: String, key: String },
}

fn join_errors(errors: &[PolicyValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_error_display() {
        let err = PolicyError::invalid_env_var("JGATE_POLICY", "empty path");
        assert!(err.to_string().contains("JGATE_POLICY"));
        assert!(err.to_string().contains("empty path"));
    }

    #[test]
    fn invalid_joins_all_errors() {
        let err = PolicyError::Invalid(vec![
            PolicyValidationError::EmptyProjectKey {
                scope: "defaults".into(),
            },
            PolicyValidationError::InvalidCommand {
                scope: "organizations.acme".into(),
                command: "issue..add".into(),
            },
        ]);

        assert_eq!(
            err.to_string(),
            "invalid policy document: defaults: empty project key; \
             organizations.acme: invalid command pattern 'issue..add'"
        );
    }
}
