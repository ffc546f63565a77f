//! Subcommand handlers.
//!
//! Each handler returns an [`Outcome`]; `main` turns it into output and an
//! exit status. Operational failures are `anyhow` errors.

use crate::{Args, CheckTarget, Command, PolicyAction};
use anyhow::{bail, Context, Result};
use jgate_auth::{
    normalize, AccessDenied, IssueRecord, ParticipationValidator, PermissionResolver,
    QueryFilterComposer,
};
use jgate_policy::{save_policy, PolicyLoader, PolicyStore};
use std::path::Path;
use std::sync::Arc;

/// Result of a successfully executed subcommand.
#[derive(Debug)]
pub enum Outcome {
    /// Allowed, or nothing to decide.
    Done,
    /// The gate refused.
    Denied(AccessDenied),
}

/// Prints `allowed` for a passing decision; denials are printed by `main`.
fn verdict(decision: Result<(), AccessDenied>) -> Outcome {
    match decision {
        Ok(()) => {
            println!("allowed");
            Outcome::Done
        }
        Err(reason) => Outcome::Denied(reason),
    }
}

pub fn run(args: &Args) -> Result<Outcome> {
    let loader = args.loader();

    match &args.command {
        Command::Normalize { command } => {
            println!("{}", normalize(command.trim()));
            Ok(Outcome::Done)
        }
        Command::Policy { action } => policy(&loader, action),
        Command::Check { target } => {
            let resolver = PermissionResolver::new(open_store(&loader)?);
            Ok(check(&resolver, target))
        }
        Command::Jql { query } => {
            let composer = QueryFilterComposer::new(open_store(&loader)?);
            println!("{}", composer.rewrite(query, None));
            Ok(Outcome::Done)
        }
        Command::Participation { record, user } => {
            let record = read_record(record)?;
            let validator = ParticipationValidator::new(open_store(&loader)?);
            Ok(verdict(validator.ensure_allowed(&record, user, None)))
        }
    }
}

/// Loads the policy now so a broken file is reported instead of
/// silently denying.
fn open_store(loader: &PolicyLoader) -> Result<Arc<PolicyStore>> {
    let store = loader.clone().into_store();
    store.reload().context("Failed to load policy")?;
    if let Some(org) = store.current_org() {
        tracing::info!(org, "using organization");
    }
    Ok(Arc::new(store))
}

fn check(resolver: &PermissionResolver, target: &CheckTarget) -> Outcome {
    verdict(match target {
        CheckTarget::Project { key } => resolver.ensure_project(key, None),
        CheckTarget::Command { command, project } => {
            resolver.ensure_command(command.trim(), project.as_deref(), None)
        }
        CheckTarget::Space { space } => resolver.ensure_space(space, None),
    })
}

fn read_record(path: &Path) -> Result<IssueRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    IssueRecord::from_json(&value)
        .with_context(|| format!("Record {} has no string 'key'", path.display()))
}

fn policy(loader: &PolicyLoader, action: &PolicyAction) -> Result<Outcome> {
    match action {
        PolicyAction::Show { all } => {
            let store = open_store(loader)?;
            if *all {
                let Some(doc) = store.get() else {
                    return Ok(no_policy(&store));
                };
                print!("{}", doc.to_yaml()?);
                return Ok(Outcome::Done);
            }
            let Some(policy) = store.effective_policy(None) else {
                return Ok(no_policy(&store));
            };
            print!("{}", serde_yaml::to_string(&policy)?);
            Ok(Outcome::Done)
        }
        PolicyAction::Migrate { output } => {
            let source = loader.resolved_path()?;
            let Some(doc) = loader.load()? else {
                bail!("No policy file at {}", source.display());
            };
            let target = output.as_deref().unwrap_or(source.as_path());
            save_policy(target, &doc)?;
            tracing::info!(from = %source.display(), to = %target.display(), "policy migrated");
            println!("{}", target.display());
            Ok(Outcome::Done)
        }
    }
}

fn no_policy(store: &PolicyStore) -> Outcome {
    Outcome::Denied(AccessDenied::NoPolicy {
        org: store.current_org().unwrap_or("default").to_string(),
    })
}
