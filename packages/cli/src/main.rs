//! `eloura` — command-line tools for the Eloura planner.
//!
//! - `eloura dashboard --snapshot day.json [--date 2026-10-15] [--json]` renders
//!   one day of the dashboard from a JSON snapshot.
//! - `eloura classify "<raw error>" [--signup]` shows what a user would see
//!   for a raw auth backend error.
//! - `eloura settings` prints the effective configuration as TOML.

use std::fmt;
use std::path::PathBuf;

use anyhow::Context;
use api::auth::{classify_message, AuthMode};
use api::{DailyAggregator, DailyView, DashboardConfig, Settings, Snapshot};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use store::{MemoryStore, PlanningItem};

#[derive(Parser)]
#[command(name = "eloura")]
#[command(about = "Eloura household planner tools")]
struct Cli {
    /// Settings file (optional; environment variables override it)
    #[arg(long, env = "ELOURA_SETTINGS", default_value = api::settings::DEFAULT_SETTINGS_FILE)]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one day of the dashboard from a JSON snapshot
    Dashboard {
        /// Snapshot with `tasks`, `events` and `reminders`
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Day to render (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// dashboard.toml overrides (defaults to the configured path)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the user-facing message for a raw auth error
    Classify {
        raw: String,

        /// Classify as a sign-up failure instead of sign-in
        #[arg(long)]
        signup: bool,
    },

    /// Print the effective settings
    Settings,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eloura=info".parse()?)
                .add_directive("api=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load_from(&cli.settings)
        .with_context(|| format!("loading settings from {}", cli.settings))?;

    match cli.command {
        Command::Dashboard {
            snapshot,
            date,
            config,
            json,
        } => {
            let config_path =
                config.unwrap_or_else(|| PathBuf::from(&settings.dashboard.config_path));
            let config = DashboardConfig::load_or_default(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let records = Snapshot::load(&snapshot)
                .with_context(|| format!("reading snapshot {}", snapshot.display()))?;
            let day = date.unwrap_or_else(|| Local::now().date_naive());
            tracing::info!(%day, snapshot = %snapshot.display(), "rendering dashboard");

            let source = MemoryStore::with_snapshot(records);
            let view = DailyAggregator::new(&config).load(&source, day).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", DayText(&view));
            }
        }
        Command::Classify { raw, signup } => {
            let mode = if signup {
                AuthMode::SignUp
            } else {
                AuthMode::SignIn
            };
            let classified = classify_message(&raw, mode);
            println!("{:?}: {}", classified.kind, classified.message);
        }
        Command::Settings => {
            print!("{}", toml::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}

fn checkbox(item: &PlanningItem) -> &'static str {
    if item.is_pending() {
        "[ ]"
    } else {
        "[x]"
    }
}

/// Plain-text rendering of a day.
struct DayText<'a>(&'a DailyView);

impl fmt::Display for DayText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.0;
        writeln!(f, "{}", view.date.format("%A, %B %-d, %Y"))?;

        writeln!(f, "\nMust do ({} pending)", view.must_do.pending_count)?;
        if view.must_do.is_empty() {
            writeln!(f, "  nothing urgent")?;
        }
        for item in &view.must_do.items {
            writeln!(f, "  {} {}", checkbox(item), item.title())?;
        }

        writeln!(f, "\nToday")?;
        if view.schedule.is_empty() {
            writeln!(f, "  nothing scheduled")?;
        }
        for entry in &view.schedule {
            write!(f, "  {:>8}  {}", entry.time, entry.label)?;
            if let Some(location) = &entry.location {
                write!(f, " @ {location}")?;
            }
            if let Some(category) = &entry.category {
                write!(f, " ({category})")?;
            }
            writeln!(f)?;
        }

        for bucket in view.buckets.iter() {
            writeln!(
                f,
                "\n{} [{}] ({} pending)",
                bucket.title, bucket.color, bucket.pending_count
            )?;
            for item in &bucket.items {
                writeln!(f, "  {} {}", checkbox(item), item.title())?;
            }
        }
        Ok(())
    }
}
