/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

pub mod commands;

use clap::{Parser, Subcommand};
use keel_models::models::clusters::Server;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
/// Keel Operator CLI
///
/// Serves the operator API, or checks the agents of a set of servers directly.
pub struct Cli {
    /// Path to a configuration file layered over the defaults
    #[arg(long, global = true, env = "KEEL_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the operator API server
    Serve,

    /// Query the agents of the given servers and print their status
    AgentStatus {
        /// Server to query, as `hostname=address`. Repeatable.
        #[arg(long = "server", value_parser = parse_server, required = true)]
        servers: Vec<Server>,
        /// Port the agents listen on, overriding the configured one
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Parses a `hostname=address` pair.
pub fn parse_server(value: &str) -> Result<Server, String> {
    let (hostname, address) = value
        .split_once('=')
        .ok_or_else(|| format!("expected hostname=address, got '{}'", value))?;
    let (hostname, address) = (hostname.trim(), address.trim());
    if hostname.is_empty() || address.is_empty() {
        return Err(format!("expected hostname=address, got '{}'", value));
    }
    Ok(Server::new(hostname, address))
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
