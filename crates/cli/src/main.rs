//! Shopfront CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! shopfront-cli migrate
//!
//! # Create a buyer, or an admin with --admin
//! shopfront-cli user create --username ada --email ada@example.com --admin
//!
//! # Load products from a YAML catalog
//! shopfront-cli seed catalog seed/catalog.yaml
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`), loading
//! `.env` if present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
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
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// Grant access to the admin routes
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Add products from a YAML file, skipping names already present
    Catalog {
        /// Path to the catalog YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                admin,
            } => {
                commands::user::create(&pool, &username, &email, admin).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => {
                commands::seed::catalog(&pool, &file).await?;
            }
        },
    }
    Ok(())
}
