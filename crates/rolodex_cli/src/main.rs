//! Rolodex CLI
//!
//! Command-line client for the local contact store and its sync engine.
//!
//! # Commands
//!
//! - `add` - Add a contact
//! - `list` - List live contacts and groups
//! - `delete` - Tombstone a contact
//! - `sync` - Run one push-then-pull cycle against a server
//! - `log` - Show recent sync cycle outcomes

mod commands;
mod http_client;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offline-first contacts with background sync.
#[derive(Parser)]
#[command(name = "rolodex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local database file
    #[arg(global = true, long, default_value = "rolodex.db")]
    db: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a contact
    Add {
        /// Given name
        given_name: String,

        /// Family name
        #[arg(default_value = "")]
        family_name: String,

        /// Email addresses
        #[arg(short, long)]
        email: Vec<String>,

        /// Phone numbers
        #[arg(short, long)]
        phone: Vec<String>,

        /// Free-form note
        #[arg(short, long)]
        note: Option<String>,

        /// Owning account id
        #[arg(long, default_value = "local")]
        owner: String,
    },

    /// List live contacts and groups
    List {
        /// Also list groups
        #[arg(short, long)]
        groups: bool,
    },

    /// Tombstone a contact; the deletion propagates on the next sync
    Delete {
        /// Contact id
        id: String,
    },

    /// Run one push-then-pull sync cycle
    Sync {
        /// Server base URL
        #[arg(short, long, env = "ROLODEX_SERVER")]
        server: String,

        /// Bearer token (prefer the environment variable)
        #[arg(long, env = "ROLODEX_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Push batch size
        #[arg(long, default_value = "20")]
        batch_size: usize,
    },

    /// Show recent sync cycle outcomes
    Log {
        /// Maximum number of entries
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Only show failed cycles
        #[arg(short, long)]
        failures: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Add {
            given_name,
            family_name,
            email,
            phone,
            note,
            owner,
        } => commands::add::run(&cli.db, &owner, &given_name, &family_name, email, phone, note),
        Commands::List { groups } => commands::list::run(&cli.db, groups),
        Commands::Delete { id } => commands::delete::run(&cli.db, &id),
        Commands::Sync {
            server,
            token,
            batch_size,
        } => commands::sync::run(&cli.db, &server, token, batch_size),
        Commands::Log { limit, failures } => commands::log::run(&cli.db, limit, failures),
    }
}
