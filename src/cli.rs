//! CLI command definitions for the ledgerdesk binary.
//!
//! This module defines the CLI structure using clap's derive macros.

use clap::{Parser, Subcommand};

/// Obligation scheduling and workflow gating for a bookkeeping practice
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Materialize due tasks from active recurring rules
    Run {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },

    /// Create onboarding tasks for clients that are missing them
    BackfillOnboarding {
        /// Restrict to a single client id
        #[arg(long)]
        client: Option<i64>,

        /// Acting user id recorded as creator
        #[arg(long)]
        created_by: Option<i64>,
    },

    /// Insert or update onboarding templates from a YAML file
    SeedTemplates {
        /// Path to the YAML template list
        #[arg(short, long)]
        file: String,
    },
}
