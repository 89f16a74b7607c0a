//! # CLI Interface
//!
//! Defines the command-line argument structure for `account-link-node` using
//! `clap` derive. Subcommands: `serve`, `validate`, `migrate`, `message`
//! and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;
use crate::rpc::RpcEndpoint;

/// Account-link proof verification service.
///
/// Validates proofs that bind blockchain accounts to decentralized
/// identifiers, serves the verification HTTP API, and exposes Prometheus
/// metrics.
#[derive(Parser, Debug)]
#[command(
    name = "account-link-node",
    about = "Account-link proof verification service",
    version,
    propagate_version = true
)]
pub struct LinkNodeCli {
    /// Log output format.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "LINK_LOG_FORMAT",
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP verification service.
    Serve(ServeArgs),
    /// Validate a proof and print it with its DID.
    ///
    /// Exit status: 0 verified, 1 not verified, 2 bad input, 3 upstream failure.
    Validate(ValidateArgs),
    /// Print the current (version 2) encoding of a proof.
    Migrate(MigrateArgs),
    /// Print the consent message an account signs for a DID.
    Message(MessageArgs),
    /// Print version information and exit.
    Version,
}

/// Read-only Ethereum connections for contract-wallet proofs.
#[derive(Args, Debug, Clone, Default)]
pub struct NetworkArgs {
    /// `<chain reference>=<url>`, e.g. `1=https://rpc.example.org`. Repeatable.
    #[arg(long = "rpc", env = "LINK_RPC_ENDPOINTS", value_delimiter = ',')]
    pub endpoints: Vec<RpcEndpoint>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the verification API.
    #[arg(long, env = "LINK_PORT", default_value_t = 9750)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "LINK_METRICS_PORT", default_value_t = 9751)]
    pub metrics_port: u16,

    #[command(flatten)]
    pub networks: NetworkArgs,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Proof JSON file, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: PathBuf,

    #[command(flatten)]
    pub networks: NetworkArgs,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Proof JSON file, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct MessageArgs {
    /// The DID to link to.
    #[arg(long)]
    pub did: String,

    /// Unix timestamp (seconds) to embed.
    #[arg(long, conflicts_with = "now")]
    pub timestamp: Option<u64>,

    /// Embed the current time.
    #[arg(long)]
    pub now: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        LinkNodeCli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = LinkNodeCli::try_parse_from(["account-link-node", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 9750);
        assert_eq!(args.metrics_port, 9751);
        assert!(args.networks.endpoints.is_empty());
    }

    #[test]
    fn repeated_and_delimited_rpc_endpoints() {
        let cli = LinkNodeCli::try_parse_from([
            "account-link-node",
            "validate",
            "proof.json",
            "--rpc",
            "1=https://a.example,137=https://b.example",
            "--rpc",
            "10=http://c.example",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        let references: Vec<&str> = args
            .networks
            .endpoints
            .iter()
            .map(|e| e.reference.as_str())
            .collect();
        assert_eq!(references, vec!["1", "137", "10"]);
    }

    #[test]
    fn malformed_rpc_endpoint_is_rejected() {
        let result =
            LinkNodeCli::try_parse_from(["account-link-node", "serve", "--rpc", "mainnet"]);
        assert!(result.is_err());
    }

    #[test]
    fn timestamp_conflicts_with_now() {
        let result = LinkNodeCli::try_parse_from([
            "account-link-node",
            "message",
            "--did",
            "did:3:abc",
            "--timestamp",
            "5",
            "--now",
        ]);
        assert!(result.is_err());
    }
}
