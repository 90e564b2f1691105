use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spotter::config::ServerConfig;
use spotter::engine::Engine;
use spotter::server::{AppState, create_router};
use spotter::store::{SqliteStore, Store};

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "spotter")]
#[command(about = "A gym session booking server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, default policies and the first admin)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Display name of the first admin
        #[arg(long, default_value = "Admin")]
        name: String,

        /// Email of the first admin
        #[arg(long)]
        email: String,
    },
}

fn open_engine(config: &ServerConfig) -> anyhow::Result<Arc<Engine>> {
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    Ok(Arc::new(Engine::new(Arc::new(store), Arc::new(DefaultClock))))
}

fn run_init(data_dir: PathBuf, name: &str, email: &str) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let token_file = config.admin_token_path();
    if token_file.exists() {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let engine = open_engine(&config)?;
    let issued = engine.bootstrap_admin(name, email)?;

    fs::write(&token_file, &issued.token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin token for {} (save this, it won't be shown again):", issued.user.email);
    println!();
    println!("  {}", issued.token);
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("spotter=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                name,
                email,
            } => {
                run_init(data_dir, &name, &email)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir,
            };

            if !config.db_path().exists() {
                bail!("Server not initialized. Run 'spotter admin init' first to create the database and admin token.");
            }

            let engine = open_engine(&config)?;
            let seeded = engine.seed_default_policies()?;
            if seeded > 0 {
                info!("Seeded {seeded} default policies");
            }

            let app = create_router(Arc::new(AppState::new(engine)));
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
