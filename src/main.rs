use clap::{Parser, Subcommand};
use tokio::io::BufReader;

mod alert;
mod app;
mod config;
mod emulator;
mod screen;
mod state;
mod store;
mod users;

use crate::config::{AppConfig, StoreBackend};
use crate::state::AppState;
use crate::users::UserDirectory;

/// Single-screen user directory over a remote document store
#[derive(Parser)]
#[command(name = "user-directory")]
#[command(version)]
struct Cli {
    /// Store backend override (overrides STORE_BACKEND, or EMULATOR_BACKEND for serve-store)
    #[arg(short, long, value_enum)]
    backend: Option<StoreBackend>,

    /// Port override for the store emulator (overrides APP_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the user management screen on the terminal (default)
    Screen,
    /// Serve the document store REST surface locally
    ServeStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "user_directory=debug,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    // stdout belongs to the screen
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(port) = cli.port {
        config.emulator.port = port;
    }

    match cli.command.unwrap_or(Commands::Screen) {
        Commands::Screen => {
            if let Some(backend) = cli.backend {
                config.store.backend = backend;
            }
            let store = store::connect(&config.store).await?;
            let dir = UserDirectory::new(store.clone(), config.store.collection.clone());
            let result = screen::run(dir, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await;
            store.close().await;
            result
        }
        Commands::ServeStore => {
            if let Some(backend) = cli.backend {
                config.emulator.backend = backend;
            }
            let emulator = config.emulator.clone();
            let state = AppState::init(config).await?;
            let store = state.store.clone();
            let result = app::serve(app::build_app(state), &emulator).await;
            store.close().await;
            result
        }
    }
}
