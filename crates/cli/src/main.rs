//! BuildMart CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Apply shop schema and session table migrations
//! bm-cli migrate
//!
//! # Create a staff or admin account
//! bm-cli create-staff -e ops@buildmart.example -n "Ops Desk" -p 'S3cure!pass' -r admin
//!
//! # Load categories, product types, and products from YAML
//! bm-cli seed demos/seed.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use buildmart_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "bm-cli")]
#[command(author, version, about = "BuildMart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create a staff or admin account
    CreateStaff {
        /// Email address used to sign in
        #[arg(short, long)]
        email: String,

        /// Display name shown to customers in support chat
        #[arg(short, long)]
        name: String,

        /// Initial password
        #[arg(short, long)]
        password: String,

        /// Role (`staff` or `admin`)
        #[arg(short, long, default_value = "staff")]
        role: UserRole,
    },
    /// Seed the catalog from a YAML file
    Seed {
        /// Path to the seed file
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
        Commands::CreateStaff {
            email,
            name,
            password,
            role,
        } => {
            commands::staff::create(&pool, &email, &name, &password, role).await?;
        }
        Commands::Seed { file } => {
            commands::seed::run(&pool, &file).await?;
        }
    }
    Ok(())
}
