//! PocketBook - command-line user management.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use common::AppResult;
use pocketbook_lib::commands::{self, UserCommand};
use pocketbook_lib::config::PocketBookConfig;

#[derive(Parser)]
#[command(name = "pocketbook")]
#[command(about = "User records with a unit-of-work data layer")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema if it does not exist
    Init,
    /// User management commands
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List every user
    List,
    /// Show a user by id
    Get { id: Uuid },
    /// Show a user by email address
    ByEmail { email: String },
    /// Add a user
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "POCKETBOOK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Delete a user by id
    Delete { id: Uuid },
}

impl From<UserCommands> for UserCommand {
    fn from(action: UserCommands) -> Self {
        match action {
            UserCommands::List => UserCommand::List,
            UserCommands::Get { id } => UserCommand::Get { id },
            UserCommands::ByEmail { email } => UserCommand::ByEmail { email },
            UserCommands::Add {
                first_name,
                last_name,
                email,
                password,
            } => UserCommand::Add {
                first_name,
                last_name,
                email,
                password,
            },
            UserCommands::Delete { id } => UserCommand::Delete { id },
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = PocketBookConfig::from_env();

    init_tracing(cli.verbose, &config.service.log_level);
    tracing::debug!(?config, "Configuration loaded");

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!(code = e.code(), "Command failed: {}", e);
        eprintln!("error: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &PocketBookConfig) -> AppResult<()> {
    let database = pocketbook_lib::open(config).await?;

    match command {
        Commands::Init => {
            database.ping().await?;
            println!("Schema ready");
        }
        Commands::Users { action } => {
            let uow = database.unit_of_work();
            let result = commands::execute(action.into(), &uow).await;
            uow.dispose().await?;
            println!("{}", result?);
        }
    }

    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool, log_level: &str) {
    let filter = if verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string())
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
