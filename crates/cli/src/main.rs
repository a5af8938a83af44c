//! Watch Shop CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run PostgreSQL migrations
//! ws-cli migrate
//!
//! # Create admin user
//! ws-cli admin create -e admin@example.com -n "Admin Name" -p 'long-password'
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` - Create admin users

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ws-cli")]
#[command(author, version, about = "Watch Shop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Admin password (at least 6 characters)
        #[arg(short, long)]
        password: String,

        /// Contact phone number
        #[arg(long, default_value = "")]
        phone: String,
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
        Commands::Migrate => {
            commands::migrate::run().await?;
        }
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
                phone,
            } => {
                let admin = commands::admin::NewAdmin {
                    email: &email,
                    name: &name,
                    password: &password,
                    phone: &phone,
                };
                commands::admin::create_user(&admin).await?;
            }
        },
    }
    Ok(())
}
