//! Structural validation of parsed policy documents.
//!
//! Parsing already enforces the shape; this pass rejects values that
//! would silently never match (empty keys, malformed command paths).

use crate::{
    CommandPattern, OrgPolicy, PolicyDocument, PolicyError, PolicyValidationError, ProjectRule, ALL,
};

impl PolicyDocument {
    /// Validates every policy in the document.
    ///
    /// Returns all validation errors (not just the first one).
    #[must_use]
    pub fn validate_all(&self) -> Vec<PolicyValidationError> {
        let mut errors = Vec::new();
        if let Some(defaults) = &self.defaults {
            validate_org("defaults", defaults, &mut errors);
        }
        for (alias, policy) in &self.organizations {
            validate_org(&format!("organizations.{alias}"), policy, &mut errors);
        }
        errors
    }

    /// Validates the document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Invalid`] carrying every problem found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let errors = self.validate_all();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Invalid(errors))
        }
    }
}

fn validate_org(scope: &str, policy: &OrgPolicy, errors: &mut Vec<PolicyValidationError>) {
    for rule in &policy.allowed_projects {
        let Some(key) = rule.project_key() else {
            continue;
        };
        if key == ALL && matches!(rule, ProjectRule::Scoped { .. }) {
            errors.push(PolicyValidationError::ScopedWildcard {
                scope: scope.to_string(),
            });
        } else if key.is_empty() {
            errors.push(PolicyValidationError::EmptyProjectKey {
                scope: scope.to_string(),
            });
        } else if !is_valid_project_key(key) {
            errors.push(PolicyValidationError::InvalidProjectKey {
                scope: scope.to_string(),
                key: key.to_string(),
            });
        }

        for command in rule.commands().unwrap_or_default() {
            check_command(scope, command, errors);
        }

        if let Some(filters) = rule.filters() {
            if filters.jql.is_some() && filters.sub_jql().is_none() {
                errors.push(PolicyValidationError::EmptySubFilter {
                    scope: scope.to_string(),
                    key: key.to_string(),
                });
            }
        }
    }

    for command in &policy.allowed_commands {
        check_command(scope, command, errors);
    }

    if policy.allowed_spaces.iter().any(|s| s.trim().is_empty()) {
        errors.push(PolicyValidationError::EmptySpace {
            scope: scope.to_string(),
        });
    }
}

fn check_command(scope: &str, command: &CommandPattern, errors: &mut Vec<PolicyValidationError>) {
    if !is_valid_command(command) {
        errors.push(PolicyValidationError::InvalidCommand {
            scope: scope.to_string(),
            command: command.to_string(),
        });
    }
}

/// Project keys are alphanumeric plus `_` (the tracker's own key alphabet).
fn is_valid_project_key(key: &str) -> bool {
    key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `"all"`, a dotted path, or a legacy flat name: segments are non-empty and
/// made of `[a-z0-9_-]`.
fn is_valid_command(command: &CommandPattern) -> bool {
    command.is_all()
        || command.as_str().split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        })
}
