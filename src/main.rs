use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use allot::api::{AppState, run_http_server};
use allot::config::AppConfig;
use allot::core::{TopLevelAllocation, catalog, risk_summary};
use allot::store::{JsonFileStore, KeyValueStore, MemoryStore};

#[derive(Parser, Debug)]
#[command(
    name = "allot",
    version,
    about = "Portfolio onboarding allocation engine: sizing, strategy and risk score"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the wizard HTTP API
    Serve {
        #[arg(long, help = "TOML config file; flags below override its values")]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, help = "JSON file holding the wizard session")]
        state_file: Option<PathBuf>,
    },
    /// Score a top-level split
    Risk {
        #[arg(long, default_value_t = 0.0, help = "Equities in percent")]
        equities: f64,
        #[arg(long, default_value_t = 0.0, help = "Bonds in percent")]
        bonds: f64,
        #[arg(long, default_value_t = 0.0, help = "Cash in percent")]
        cash: f64,
        #[arg(long, default_value_t = 0.0, help = "Alternatives in percent")]
        alternatives: f64,
    },
    /// Print the strategy catalog as JSON
    Strategies,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve {
            config,
            host,
            port,
            state_file,
        } => serve(config, host, port, state_file).await,
        Command::Risk {
            equities,
            bonds,
            cash,
            alternatives,
        } => {
            init_tracing(&AppConfig::default().log_filter);
            print_risk(TopLevelAllocation::new(equities, bonds, cash, alternatives))
        }
        Command::Strategies => print_json(&catalog()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    state_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if state_file.is_some() {
        config.state_file = state_file;
    }

    init_tracing(&config.log_filter);
    info!("allot v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!(path = %path.display(), "loaded configuration");
    }

    let store: Box<dyn KeyValueStore> = match &config.state_file {
        Some(path) => {
            info!(path = %path.display(), "persisting session to file");
            Box::new(JsonFileStore::open(path)?)
        }
        None => {
            warn!("no state file configured, session is kept in memory only");
            Box::new(MemoryStore::new())
        }
    };
    let state = AppState::load(store)?;
    run_http_server(config.socket_addr()?, state).await?;
    Ok(())
}

fn init_tracing(fallback_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_risk(allocation: TopLevelAllocation) -> Result<(), Box<dyn std::error::Error>> {
    if !allocation.is_complete() {
        warn!(
            total = allocation.total(),
            "split does not total 100%, score is indicative only"
        );
    }
    print_json(&risk_summary(&allocation))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
