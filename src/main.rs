use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use qcommerce_reality_check::build_service;
use qcommerce_reality_check::config::Config;
use qcommerce_reality_check::error::RealityCheckError;
use qcommerce_reality_check::geo::{Coordinates, LocationQuery};
use qcommerce_reality_check::{interactive, server};

#[derive(Parser)]
#[command(
    name = "qcommerce-check",
    version,
    about = "Is that 10-minute grocery delivery promise realistic where you live?"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a typed location (locality, landmark or address)
    Check {
        #[arg(required = true, num_args = 1..)]
        location: Vec<String>,
    },
    /// Check from a position given as coordinates
    Locate {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lng: Option<f64>,
    },
    /// Prompt for locations until you quit (default)
    Interactive,
    /// Serve the browser front end and JSON API
    Serve {
        /// host:port, overrides QC_HTTP_BIND
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with rendered output on stdout
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load();
    let service = build_service(&config)?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Check { location } => {
            let text = location.join(" ");
            let query = LocationQuery::manual(&text).ok_or_else(|| {
                RealityCheckError::InvalidLocation("location cannot be blank".to_string())
            })?;
            interactive::check_once(&service, Ok(query)).await
        }
        Commands::Locate { lat, lng } => {
            let position = match (lat, lng) {
                (Some(lat), Some(lng)) => Coordinates::new(lat, lng).map(LocationQuery::Device),
                _ => Err(RealityCheckError::InvalidLocation(
                    "both --lat and --lng are required".to_string(),
                )),
            };
            interactive::check_once(&service, position).await
        }
        Commands::Interactive => interactive::repl(service).await,
        Commands::Serve { bind } => {
            let bind: SocketAddr = bind.unwrap_or(config.server.bind).parse().map_err(|e| {
                RealityCheckError::Config(format!("Invalid bind address (expected host:port): {e}"))
            })?;
            server::serve(service, bind, config.server.bearer_token).await
        }
    }
}
