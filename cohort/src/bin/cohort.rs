//! Cohort CLI - group membership and capacity assignment
//!
//! # Usage
//!
//! ```bash
//! # Rosters live in <data_dir>/rosters.json
//! cohort roster set course-1 ana ben cai dee eli
//! cohort roster enroll course-1 fay
//!
//! # Categories
//! cohort category create course-1 "Project teams" --policy random --capacity 2
//! cohort category show <category-id>
//! cohort category capacity <category-id> 3
//! cohort category unassigned course-1 <category-id>
//!
//! # Groups
//! cohort group create <category-id> --name "Night Owls"
//! cohort group join <group-id> ana
//! ```

use clap::{Parser, Subcommand};
use cohort::cli::commands::{
    category::CategoryCommand, group::GroupCommand, roster::RosterCommand,
};
use cohort::cli::{commands, CliContext, OutputFormat, OutputFormatter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cohort")]
#[command(version)]
#[command(about = "Cohort - group membership and capacity assignment", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", env = "COHORT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (table, json, plain)
    #[arg(short, long, global = true, default_value = "table")]
    output_format: String,

    /// Suppress status messages
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Course rosters
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },

    /// Grouping categories
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },

    /// Groups and membership
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },
}

/// `RUST_LOG` wins; otherwise `cohort=info`, or `cohort=debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "cohort=debug" } else { "cohort=info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Parse output format
    let output_format: OutputFormat = cli.output_format.parse().unwrap_or_else(|e| {
        eprintln!("Warning: {}. Using table format.", e);
        OutputFormat::Table
    });

    let formatter = OutputFormatter::new(output_format);

    // Create CLI context
    let mut ctx = match cli.config {
        Some(path) => match CliContext::new(path) {
            Ok(ctx) => ctx,
            Err(e) => {
                formatter.error(&format!("Error loading configuration: {}", e));
                std::process::exit(1);
            }
        },
        None => match CliContext::with_defaults() {
            Ok(ctx) => ctx,
            Err(e) => {
                formatter.error(&format!("Error initializing context: {}", e));
                std::process::exit(1);
            }
        },
    };

    ctx.output_format = output_format;
    ctx.quiet = cli.quiet;
    ctx.verbose = cli.verbose;
    ctx.debug(&format!("Using configuration {:?}", ctx.config_path));

    // Execute command
    let result = match cli.command {
        Commands::Roster { command } => commands::roster::execute(&mut ctx, command).await,
        Commands::Category { command } => commands::category::execute(&mut ctx, command).await,
        Commands::Group { command } => commands::group::execute(&mut ctx, command).await,
    };

    if let Err(e) = result {
        formatter.error(&e.to_string());
        std::process::exit(1);
    }
}
