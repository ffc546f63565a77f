//! jgate - access policy gate for tracker and wiki operations
//!
//! Inspects a policy file and answers the questions the gate asks at
//! runtime: is this project, command, or space allowed; how is a search
//! rewritten; may this fetched issue be shown.
//!
//! # Configuration
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`JGATE_POLICY`, `JGATE_ORG`)
//! 3. Default policy file `~/.jgate/policy.yaml`
//!
//! # Exit Status
//!
//! - `0`: allowed, or the command completed
//! - `1`: denied (reason on stderr)
//! - `2`: operational error (unreadable policy, bad record JSON)

mod commands;

use clap::{Parser, Subcommand};
use commands::Outcome;
use jgate_policy::PolicyLoader;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// jgate - access policy gate for tracker and wiki operations
#[derive(Parser, Debug)]
#[command(name = "jgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Policy file (also: JGATE_POLICY, default: ~/.jgate/policy.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    policy: Option<PathBuf>,

    /// Organization alias (also: JGATE_ORG)
    #[arg(short, long, global = true, value_name = "ALIAS")]
    org: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a project, command, or space is allowed
    Check {
        #[command(subcommand)]
        target: CheckTarget,
    },

    /// Rewrite a search query so it stays inside the allowed projects
    Jql {
        /// The query to rewrite
        query: String,
    },

    /// Check a fetched issue against participation rules
    Participation {
        /// Issue JSON as returned by the tracker's REST API
        #[arg(long, value_name = "FILE")]
        record: PathBuf,

        /// Account id of the current user
        #[arg(long, value_name = "ID")]
        user: String,
    },

    /// Print the hierarchical path for a command name
    Normalize {
        /// Command name, legacy or hierarchical
        command: String,
    },

    /// Inspect or rewrite the policy file
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(Subcommand, Debug)]
enum CheckTarget {
    /// Is the project allowed at all
    Project {
        /// Project key
        key: String,
    },

    /// Is the command allowed, optionally for one project
    Command {
        /// Command name, legacy or hierarchical
        command: String,

        /// Project the command targets
        #[arg(long, value_name = "KEY")]
        project: Option<String>,
    },

    /// Is the wiki space allowed
    Space {
        /// Space key
        space: String,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyAction {
    /// Print the effective policy as YAML
    Show {
        /// Print the whole document instead of the effective policy
        #[arg(long)]
        all: bool,
    },

    /// Rewrite the policy file in the current schema
    Migrate {
        /// Write here instead of in place
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

impl Args {
    /// Builds the policy loader, with CLI arguments over env vars.
    fn loader(&self) -> PolicyLoader {
        let mut loader = PolicyLoader::new();
        if let Some(ref path) = self.policy {
            loader = loader.with_path(path);
        }
        if let Some(ref org) = self.org {
            loader = loader.with_org(org);
        }
        loader
    }
}

/// Terminal filter: --debug > --verbose > RUST_LOG env > default "warn".
fn init_tracing(debug: bool, verbose: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout carries command output; logs go to stderr.
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug, args.verbose);

    match commands::run(&args) {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Denied(reason)) => {
            println!("denied");
            eprintln!("jgate: {reason}");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("arguments should parse")
    }

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = parse(&["jgate", "check", "project", "BP", "--org", "acme", "-d"]);
        assert_eq!(args.org.as_deref(), Some("acme"));
        assert!(args.debug);
        assert!(matches!(
            args.command,
            Command::Check {
                target: CheckTarget::Project { ref key }
            } if key == "BP"
        ));
    }

    #[test]
    fn check_command_with_project() {
        let args = parse(&["jgate", "check", "command", "issue.get", "--project", "PM"]);
        match args.command {
            Command::Check {
                target: CheckTarget::Command { command, project },
            } => {
                assert_eq!(command, "issue.get");
                assert_eq!(project.as_deref(), Some("PM"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn loader_prefers_cli_arguments() {
        let args = parse(&["jgate", "--policy", "/tmp/p.yaml", "-o", "acme", "policy", "show"]);
        let loader = args.loader().skip_env_vars();
        assert_eq!(
            loader.resolved_path().expect("path should resolve"),
            PathBuf::from("/tmp/p.yaml")
        );
        assert_eq!(loader.resolved_org().as_deref(), Some("acme"));
    }

    #[test]
    fn participation_requires_record_and_user() {
        assert!(Args::try_parse_from(["jgate", "participation", "--user", "u1"]).is_err());
        let args = parse(&["jgate", "participation", "--record", "r.json", "--user", "u1"]);
        assert!(matches!(args.command, Command::Participation { .. }));
    }
}
