//! Command line and environment configuration

use crate::error::ReconcileError;
use crate::query::{ListFilter, Lookup};
use clap::{Args, Parser, Subcommand};
use ipam_declarations::{DesiredState, ResourceKind};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Declarative reconciler for an IPAM service
#[derive(Parser)]
#[command(name = "ipam-reconciler")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the IPAM service
    #[arg(long, env = "IPAM_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Bearer token for the IPAM service
    #[arg(long, env = "IPAM_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Recorded state file
    #[arg(long, env = "IPAM_STATE_FILE", default_value = "ipam.state.json", global = true)]
    pub state: PathBuf,

    /// Per-request timeout
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Show what apply would change, without calling the service
    Plan {
        /// Desired-state document
        #[arg(default_value = "ipam.yaml")]
        document: PathBuf,
    },
    /// Fetch one entity and print it as JSON
    Get(GetArgs),
    /// List entities and print them as JSON
    List(ListArgs),
    #[command(flatten)]
    Change(ChangeCommand),
}

/// Commands that change the service or recorded state
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ChangeCommand {
    /// Create, update, replace and delete until the service matches the document
    Apply {
        /// Desired-state document
        #[arg(default_value = "ipam.yaml")]
        document: PathBuf,
    },
    /// Read every tracked entity and record drift
    Refresh,
    /// Start tracking an existing entity under a label
    Import {
        kind: ResourceKind,
        label: String,
        id: String,
    },
    /// Delete every tracked entity
    Destroy,
}

impl Command {
    /// True for commands that talk to the service
    pub fn is_remote(&self) -> bool {
        !matches!(self, Command::Plan { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct GetArgs {
    pub kind: ResourceKind,

    #[arg(long)]
    pub id: Option<String>,

    /// Allocation name, together with --block-name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub block_name: Option<String>,
}

impl GetArgs {
    pub fn lookup(&self) -> Lookup {
        Lookup {
            id: self.id.clone(),
            name: self.name.clone(),
            block_name: self.block_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ListArgs {
    pub kind: ResourceKind,

    /// Substring match on name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub environment_id: Option<String>,

    #[arg(long)]
    pub block_name: Option<String>,

    /// Blocks without an environment
    #[arg(long)]
    pub orphaned_only: bool,
}

impl ListArgs {
    pub fn filter(&self) -> ListFilter {
        ListFilter {
            name: self.name.clone(),
            environment_id: self.environment_id.clone(),
            block_name: self.block_name.clone(),
            orphaned_only: self.orphaned_only,
        }
    }
}

/// Where and how to reach the service
#[derive(Clone)]
pub struct Connection {
    pub endpoint: String,
    pub token: String,
    pub timeout: Duration,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Cli {
    /// Endpoint and token, both required and non-empty
    pub fn connection(&self) -> Result<Connection, ReconcileError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ReconcileError::InvalidConfig("IPAM_ENDPOINT (or --endpoint) is required".to_string())
            })?;
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ReconcileError::InvalidConfig("IPAM_TOKEN (or --token) is required".to_string()))?;
        if self.timeout_secs == 0 {
            return Err(ReconcileError::InvalidConfig("--timeout-secs must be positive".to_string()));
        }

        Ok(Connection {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

/// Read and check a desired-state document
pub async fn load_document(path: &Path) -> Result<DesiredState, ReconcileError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ReconcileError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(DesiredState::from_yaml(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ipam-reconciler").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_endpoint_is_trimmed() {
        let cli = parse(&["--endpoint", "https://ipam.example.com/", "--token", "secret", "refresh"]);
        let connection = cli.connection().unwrap();
        assert_eq!(connection.endpoint, "https://ipam.example.com");
        assert_eq!(connection.timeout, Duration::from_secs(30));
        assert!(!format!("{connection:?}").contains("secret"));
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let cli = parse(&["--endpoint", "https://ipam.example.com", "--token", "  ", "apply"]);
        assert!(matches!(cli.connection(), Err(ReconcileError::InvalidConfig(_))));
    }

    #[test]
    fn test_import_arguments() {
        let cli = parse(&["import", "reserved-block", "legacy", "r-1"]);
        assert_eq!(
            cli.command,
            Command::Change(ChangeCommand::Import {
                kind: ResourceKind::ReservedBlock,
                label: "legacy".to_string(),
                id: "r-1".to_string(),
            })
        );
        assert!(cli.command.is_remote());
    }

    #[test]
    fn test_plan_defaults() {
        let cli = parse(&["--state", "/tmp/s.json", "plan"]);
        assert_eq!(cli.state, PathBuf::from("/tmp/s.json"));
        assert_eq!(
            cli.command,
            Command::Plan {
                document: PathBuf::from("ipam.yaml")
            }
        );
        assert!(!cli.command.is_remote());
    }

    #[test]
    fn test_get_and_list_arguments() {
        let cli = parse(&["get", "allocation", "--name", "web", "--block-name", "edge"]);
        let Command::Get(args) = &cli.command else {
            panic!("expected get, got {:?}", cli.command);
        };
        assert_eq!(
            args.lookup(),
            Lookup {
                id: None,
                name: Some("web".to_string()),
                block_name: Some("edge".to_string()),
            }
        );
        assert!(cli.command.is_remote());

        let cli = parse(&["list", "block", "--orphaned-only"]);
        let Command::List(args) = &cli.command else {
            panic!("expected list, got {:?}", cli.command);
        };
        assert_eq!(args.kind, ResourceKind::Block);
        assert!(args.filter().orphaned_only);
        assert_eq!(args.filter().name, None);
    }

    #[tokio::test]
    async fn test_missing_document_is_a_config_error() {
        let err = load_document(Path::new("/nonexistent/ipam.yaml")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfig(_)));
    }
}
