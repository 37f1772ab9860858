//! ledgerdesk
//!
//! Practice-management engine for a bookkeeping firm: recurring obligation
//! scheduling, onboarding workflow gating, and intercompany task sign-off.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use ledgerdesk::cli::{Cli, Command};
use ledgerdesk::config::Config;
use ledgerdesk::db::Database;
use ledgerdesk::db::templates::TemplateSeed;
use ledgerdesk::{onboarding, scheduler};
use std::fs::OpenOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new().create(true).append(true).open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(database) = cli.database {
        config.database = database;
    }

    let db = Database::open(&config.database)?;

    match cli.command {
        Command::Run { today } => {
            let today = today
                .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                .transpose()?;
            let summary = scheduler::run_once(&db, &config, today)?;
            println!("{}", serde_json::to_string(&summary)?);
        }

        Command::BackfillOnboarding { client, created_by } => {
            let clients = match client {
                Some(id) => vec![
                    db.get_client(id)?
                        .ok_or_else(|| anyhow::anyhow!("client not found: {}", id))?,
                ],
                None => db.list_clients()?,
            };
            info!(clients = clients.len(), "backfilling onboarding tasks");
            let mut total = 0usize;
            for client in clients {
                let created =
                    onboarding::materialize_for_client(&db, client.id, created_by, &config)?;
                println!(
                    "client {} ({}): created {} onboarding task(s)",
                    client.id,
                    client.legal_name,
                    created.len()
                );
                total += created.len();
            }
            println!("done; {} task(s) created", total);
        }

        Command::SeedTemplates { file } => {
            let content = std::fs::read_to_string(&file)?;
            let seeds: Vec<TemplateSeed> = serde_yaml::from_str(&content)?;
            let mut inserted = 0usize;
            let mut updated = 0usize;
            for seed in &seeds {
                let (template, was_inserted) = db.upsert_template_by_name(seed)?;
                if was_inserted {
                    inserted += 1;
                    println!("inserted template: {}", template.name);
                } else {
                    updated += 1;
                    println!("updated template: {}", template.name);
                }
            }
            println!("done seeding templates; {} inserted, {} updated", inserted, updated);
        }
    }

    Ok(())
}
