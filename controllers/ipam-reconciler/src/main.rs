//! IPAM Reconciler
//!
//! Reconciles an IPAM service against a desired-state document, and looks
//! up entities on it. Recorded state is loaded before a state-changing
//! command runs and saved after it, including when the run is interrupted.

use anyhow::Context;
use clap::Parser;
use ipam_client::IpamClient;
use ipam_reconciler::config::{ChangeCommand, Cli, Command, load_document};
use ipam_reconciler::planner::Planner;
use ipam_reconciler::query;
use ipam_reconciler::{Controller, Report, StateSnapshot};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("Starting IPAM Reconciler");

    match cli.command.clone() {
        Command::Plan { document } => {
            let state = load_state(&cli).await?;
            let desired = load_document(&document).await?;
            let report = Planner::new(&state).plan(&desired);
            println!("{report}");
            Ok(exit_code(&report))
        }
        Command::Get(args) => {
            let client = connect(&cli).await?;
            let found = query::get(&client, args.kind, &args.lookup()).await?;
            println!("{}", serde_json::to_string_pretty(&found)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::List(args) => {
            let client = connect(&cli).await?;
            let listed = query::list(&client, args.kind, &args.filter()).await?;
            info!("{} {} entities", listed.len(), args.kind);
            println!("{}", serde_json::to_string_pretty(&listed)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Change(command) => change(&cli, command).await,
    }
}

async fn load_state(cli: &Cli) -> anyhow::Result<StateSnapshot> {
    StateSnapshot::load(&cli.state)
        .await
        .with_context(|| format!("loading state from {}", cli.state.display()))
}

/// Build the client and check the token before anything else is sent
async fn connect(cli: &Cli) -> anyhow::Result<IpamClient> {
    let connection = cli.connection()?;
    info!("Configuration:");
    info!("  IPAM endpoint: {}", connection.endpoint);
    info!("  State file: {}", cli.state.display());
    info!("  Request timeout: {:?}", connection.timeout);

    let client = IpamClient::with_timeout(connection.endpoint.clone(), connection.token, connection.timeout)?;

    info!("Validating IPAM token and connectivity...");
    client.validate_token().await.map_err(|e| {
        error!("Failed to validate IPAM token: {}", e);
        error!("Please ensure:");
        error!("  1. IPAM_TOKEN is set to a valid token");
        error!("  2. The IPAM service is reachable at {}", connection.endpoint);
        e
    })?;
    info!("IPAM token validated");
    Ok(client)
}

/// Run a state-changing command. Recorded state is saved afterwards, also
/// when the run failed or was interrupted.
async fn change(cli: &Cli, command: ChangeCommand) -> anyhow::Result<ExitCode> {
    let state = load_state(cli).await?;
    let client = connect(cli).await?;
    let mut controller = Controller::new(Arc::new(client), state);

    let cancel = controller.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing calls in flight");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let outcome: anyhow::Result<Report> = match command {
        ChangeCommand::Apply { document } => match load_document(&document).await {
            Ok(desired) => Ok(controller.apply(&desired).await),
            Err(e) => Err(e.into()),
        },
        ChangeCommand::Refresh => Ok(controller.refresh().await),
        ChangeCommand::Destroy => Ok(controller.destroy().await),
        ChangeCommand::Import { kind, label, id } => match controller.import(kind, &label, &id).await {
            Ok(yaml) => {
                println!("# add to the desired-state document:\n{yaml}");
                Ok(Report::default())
            }
            Err(e) => Err(e.into()),
        },
    };

    // Whatever happened, record what is now known
    controller
        .into_state()
        .save(&cli.state)
        .await
        .with_context(|| format!("saving state to {}", cli.state.display()))?;

    let report = outcome?;
    if !report.entries.is_empty() || report.cancelled {
        println!("{report}");
    }
    Ok(exit_code(&report))
}

fn exit_code(report: &Report) -> ExitCode {
    if report.has_failures() || report.cancelled {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
