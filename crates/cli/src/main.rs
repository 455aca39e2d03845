//! Stockroom CLI - Database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! stockroom migrate
//!
//! # Create an administrator (password from STOCKROOM_PASSWORD)
//! stockroom user create -u alice --admin
//!
//! # Clear a login lockout
//! stockroom user reset-login-attempts -u alice
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create users
//! - `user list` - List users
//! - `user reset-login-attempts` - Clear failed login attempts

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(author, version, about = "Stockroom CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Password (at least 8 characters)
        #[arg(short, long, env = "STOCKROOM_PASSWORD", hide_env_values = true)]
        password: String,

        /// Grant administrator rights
        #[arg(long)]
        admin: bool,
    },
    /// List all users
    List,
    /// Clear failed login attempts
    ResetLoginAttempts {
        /// Only clear attempts for this username
        #[arg(short, long)]
        username: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

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
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                password,
                admin,
            } => {
                commands::user::create(&username, &SecretString::from(password), admin).await?;
            }
            UserAction::List => commands::user::list().await?,
            UserAction::ResetLoginAttempts { username } => {
                commands::user::reset_login_attempts(username.as_deref()).await?;
            }
        },
    }
    Ok(())
}
