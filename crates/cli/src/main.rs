//! Stockline CLI - Database migrations and API token management.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the pos schema
//! stockline-cli migrate
//!
//! # Issue a POS API token for user 42
//! stockline-cli token issue --user-id 42 --label "front till"
//!
//! # Revoke every active token of user 42
//! stockline-cli token revoke --user-id 42
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stockline-cli")]
#[command(author, version, about = "Stockline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage POS API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a new API token for a shop owner
    Issue {
        /// Owner's user ID
        #[arg(short, long)]
        user_id: i32,

        /// Free-form label, e.g. the till the token is installed on
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Revoke all active API tokens of a user
    Revoke {
        /// Owner's user ID
        #[arg(short, long)]
        user_id: i32,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Token { action } => match action {
            TokenAction::Issue { user_id, label } => {
                commands::token::issue(user_id, label.as_deref()).await?;
            }
            TokenAction::Revoke { user_id } => {
                commands::token::revoke(user_id).await?;
            }
        },
    }
    Ok(())
}
