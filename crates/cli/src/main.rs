//! GameLink CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! gl-cli migrate
//!
//! # Load catalog items and vouchers from YAML
//! gl-cli seed catalog.yaml
//!
//! # Credit currency to a user
//! gl-cli balance credit --user 1b4e28ba-2fa1-11d2-883f-0016d3cca427 --amount 500
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Insert or update catalog items and vouchers
//! - `balance credit` - Add currency to a user's balance

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "gl-cli")]
#[command(author, version, about = "GameLink CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert or update catalog items and vouchers from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
    /// Manage user balances
    Balance {
        #[command(subcommand)]
        action: BalanceAction,
    },
}

#[derive(Subcommand)]
enum BalanceAction {
    /// Add currency to a user's balance
    Credit {
        /// User ID
        #[arg(short, long)]
        user: Uuid,

        /// Amount to add
        #[arg(short, long)]
        amount: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::Balance { action } => match action {
            BalanceAction::Credit { user, amount } => {
                commands::balance::credit(user, amount).await?;
            }
        },
    }
    Ok(())
}
