/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Keel Operator CLI application

use keel_operator::cli::{self, commands, Commands};
use keel_utils::config::Settings;
use keel_utils::logging::prelude::*;
use keel_utils::{logging, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli::parse_cli();

    // Load configuration
    let settings = Settings::new(cli.config.clone())?;

    // Tracing bridges `log` records itself, so only one of the two is installed
    let telemetry_config = settings.telemetry.resolve();
    if telemetry_config.enabled {
        telemetry::init(
            &telemetry_config,
            &settings.log.level,
            &settings.log.format,
        )?;
    } else {
        logging::init_with_format(&settings.log.level, &settings.log.format)?;
    }

    let result = match cli.command {
        Commands::Serve => commands::serve(&settings).await,
        Commands::AgentStatus { servers, port } => {
            match commands::agent_status(&settings, servers, port).await {
                Ok(true) => Ok(()),
                Ok(false) => {
                    warn!("Not all agents are active");
                    if telemetry_config.enabled {
                        telemetry::shutdown();
                    }
                    std::process::exit(1);
                }
                Err(e) => Err(e),
            }
        }
    };

    if telemetry_config.enabled {
        telemetry::shutdown();
    }
    result
}
