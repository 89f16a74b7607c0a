// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Account Link Node
//!
//! Entry point for the `account-link-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and either serves the verification API
//! or runs a one-shot command.
//!
//! - `serve`   : run the HTTP verification service
//! - `validate`: validate a proof file
//! - `migrate` : print the v2 encoding of a proof
//! - `message` : print the consent message for a DID
//! - `version` : print build version information
//!
//! The service registers the Ethereum adapter only. The other chains need
//! signature verifiers that are supplied by the embedding application.

mod api;
mod cli;
mod logging;
mod metrics;
mod rpc;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;

use account_link::chains::EthereumAdapter;
use account_link::config::PROOF_VERSION_CURRENT;
use account_link::{migrate, ConsentMessage, ErrorClass, LinkDispatcher, LinkProof};

use cli::{Commands, LinkNodeCli, NetworkArgs};
use metrics::NodeMetrics;
use rpc::RpcEndpoints;

const DEFAULT_LOG_FILTER: &str = "account_link_node=info,account_link=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = LinkNodeCli::parse();
    logging::init_logging(DEFAULT_LOG_FILTER, cli.log_format);

    match cli.command {
        Commands::Serve(args) => serve(args).await.map(|()| ExitCode::SUCCESS),
        Commands::Validate(args) => Ok(validate_proof(args).await),
        Commands::Migrate(args) => migrate_proof(&args.input).map(|()| ExitCode::SUCCESS),
        Commands::Message(args) => {
            print_message(args);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            print_version();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Dispatcher with the Ethereum adapter, verifying contract wallets through
/// the configured endpoints.
fn build_dispatcher(networks: &NetworkArgs) -> Result<LinkDispatcher> {
    let client = reqwest::Client::builder()
        .timeout(rpc::RPC_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let endpoints = RpcEndpoints::new(&client, &networks.endpoints);
    tracing::info!(chains = ?endpoints.references(), "contract-wallet verification endpoints");

    Ok(LinkDispatcher::builder()
        .register(Arc::new(EthereumAdapter::with_networks(Arc::new(endpoints))))
        .build())
}

/// Runs the verification API and the metrics endpoint until shutdown.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        "starting account-link-node"
    );

    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    let app_state = api::AppState {
        version: format!(
            "{} (proof v{})",
            env!("CARGO_PKG_VERSION"),
            PROOF_VERSION_CURRENT
        ),
        dispatcher: build_dispatcher(&args.networks)?,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("account-link-node stopped");
    Ok(())
}

/// Reads `path`, or stdin when `path` is `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read proof from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read proof from {}", path.display()))
}

/// Exit status: 0 verified, 1 not verified, 2 bad input, 3 upstream failure.
async fn validate_proof(args: cli::ValidateArgs) -> ExitCode {
    let input = match read_input(&args.input) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };
    let dispatcher = match build_dispatcher(&args.networks) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(3);
        }
    };

    match dispatcher.validate_json(&input).await {
        Ok(Some(proof)) => match serde_json::to_string_pretty(&LinkProof::V2(proof)) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(3)
            }
        },
        Ok(None) => {
            println!("not verified");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("error: {e}");
            match e.class() {
                ErrorClass::BadRequest => ExitCode::from(2),
                ErrorClass::Upstream => ExitCode::from(3),
            }
        }
    }
}

fn migrate_proof(input: &Path) -> Result<()> {
    let proof = LinkProof::from_json(&read_input(input)?)?;
    let current = migrate(proof).context("proof cannot be migrated")?;
    println!("{}", serde_json::to_string_pretty(&LinkProof::V2(current))?);
    Ok(())
}

fn print_message(args: cli::MessageArgs) {
    let consent = if args.now {
        ConsentMessage::build(&args.did, true)
    } else {
        ConsentMessage::with_timestamp(&args.did, args.timestamp)
    };
    println!("{}", consent.message);
}

/// Prints version information to stdout.
fn print_version() {
    println!("account-link-node {}", env!("CARGO_PKG_VERSION"));
    println!("proof version     {}", PROOF_VERSION_CURRENT);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
