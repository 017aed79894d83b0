//! Pete's Pets CLI - Database migrations and seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! pets-cli migrate
//!
//! # Insert the pets listed in a YAML file
//! pets-cli seed crates/cli/seeds/pets.yaml
//! ```
//!
//! Both commands read `DATABASE_URL` (a `.env` file is honored).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pets-cli")]
#[command(author, version, about = "Pete's Pets CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert pets from a YAML file
    Seed {
        /// Path to the YAML file
        file: PathBuf,

        /// Stop at the first invalid entry instead of skipping it
        #[arg(long)]
        strict: bool,
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
        Commands::Seed { file, strict } => commands::seed::pets(&file, strict).await?,
    }
    Ok(())
}
