mod categorize;
mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::categorize::CategorizeClient;
use crate::commands::{
    cmd_alarm_cancel, cmd_alarm_set, cmd_alarm_show, cmd_history, cmd_mark, cmd_mark_all,
    cmd_notify_fire, cmd_notify_list, cmd_supplement_add, cmd_supplement_clear,
    cmd_supplement_list, cmd_supplement_remove, cmd_supplement_suggest, cmd_take, cmd_today,
};
use crate::config::Config;
use vitacheck_core::db::Database;
use vitacheck_core::gateway::LocalNotificationQueue;
use vitacheck_core::service::{CategorizationProvider, VitaService};

#[derive(Parser)]
#[command(
    name = "vitacheck",
    version,
    about = "Track daily supplements and get reminded to take them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage your supplements
    Supplement {
        #[command(subcommand)]
        command: SupplementCommands,
    },
    /// Show today's supplements grouped by time of day
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a supplement between taken and not taken for today
    Take {
        /// Supplement ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark one or more supplements as taken for today
    Mark {
        /// Supplement IDs
        #[arg(required = true)]
        ids: Vec<String>,
        /// Mark them as not taken instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark every supplement of a period; unmarks them if all are already taken
    MarkAll {
        /// Period: morning, noon, evening
        period: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show intake history
    History {
        /// Number of most recent days to show (default: all)
        #[arg(short, long)]
        days: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage daily reminders
    Alarm {
        #[command(subcommand)]
        command: AlarmCommands,
    },
    /// Inspect and deliver local notifications
    Notify {
        #[command(subcommand)]
        command: NotifyCommands,
    },
}

#[derive(Subcommand)]
enum SupplementCommands {
    /// Add a supplement
    Add {
        /// Supplement name
        name: String,
        /// Dosage (e.g. "2000 IU", "1 capsule")
        #[arg(short, long)]
        dosage: String,
        /// When to take it relative to food: before, with, after (default: before)
        #[arg(short, long)]
        relation: Option<String>,
        /// Period: morning, noon, evening (default: morning)
        #[arg(short, long)]
        period: Option<String>,
        /// Ask the categorization service for relation and period
        #[arg(long)]
        ai: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all supplements
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a supplement by ID
    Remove {
        /// Supplement ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every supplement
    Clear {
        /// Confirm removal
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest common supplements matching a name
    Suggest {
        /// Part of a supplement name
        input: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AlarmCommands {
    /// Set the daily reminder for a period
    Set {
        /// Period: morning, noon, evening
        period: String,
        /// Time of day (HH:MM, 24-hour)
        time: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cancel the reminder for a period
    Cancel {
        /// Period: morning, noon, evening
        period: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configured reminders
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum NotifyCommands {
    /// List scheduled notifications
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Deliver notifications that are due now
    Fire {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("VITACHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "using data directory");
    let svc = VitaService::from_database(Database::open(&config.db_path)?, config.capability);
    let gateway = LocalNotificationQueue::new(svc.database(), config.notifications, svc.now());

    match cli.command {
        Commands::Supplement { command } => match command {
            SupplementCommands::Add {
                name,
                dosage,
                relation,
                period,
                ai,
                json,
            } => {
                let client = if ai {
                    Some(CategorizeClient::new(&config.categorize_url)?)
                } else {
                    None
                };
                let provider = client.as_ref().map(|c| c as &dyn CategorizationProvider);
                // The provider blocks on the runtime, so leave the async context first
                tokio::task::block_in_place(|| {
                    cmd_supplement_add(
                        &svc,
                        provider,
                        &name,
                        &dosage,
                        relation.as_deref(),
                        period.as_deref(),
                        json,
                    )
                })
            }
            SupplementCommands::List { json } => cmd_supplement_list(&svc, json),
            SupplementCommands::Remove { id, json } => cmd_supplement_remove(&svc, &id, json),
            SupplementCommands::Clear { yes, json } => cmd_supplement_clear(&svc, yes, json),
            SupplementCommands::Suggest { input, json } => cmd_supplement_suggest(&input, json),
        },
        Commands::Today { json } => cmd_today(&svc, json),
        Commands::Take { id, json } => cmd_take(&svc, &id, json),
        Commands::Mark { ids, undo, json } => cmd_mark(&svc, &ids, undo, json),
        Commands::MarkAll { period, json } => cmd_mark_all(&svc, &period, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Alarm { command } => match command {
            AlarmCommands::Set { period, time, json } => {
                cmd_alarm_set(&svc, &gateway, &period, &time, json)
            }
            AlarmCommands::Cancel { period, json } => {
                cmd_alarm_cancel(&svc, &gateway, &period, json)
            }
            AlarmCommands::Show { json } => cmd_alarm_show(&svc, &gateway, json),
        },
        Commands::Notify { command } => match command {
            NotifyCommands::List { json } => cmd_notify_list(&svc, &gateway, json),
            NotifyCommands::Fire { json } => cmd_notify_fire(&svc, &gateway, json),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_alarm_set() {
        let cli = Cli::try_parse_from(["vitacheck", "alarm", "set", "morning", "08:00"]).unwrap();
        match cli.command {
            Commands::Alarm {
                command: AlarmCommands::Set { period, time, json },
            } => {
                assert_eq!(period, "morning");
                assert_eq!(time, "08:00");
                assert!(!json);
            }
            _ => panic!("expected alarm set"),
        }
    }

    #[test]
    fn test_mark_requires_ids() {
        assert!(Cli::try_parse_from(["vitacheck", "mark"]).is_err());
        assert!(Cli::try_parse_from(["vitacheck", "mark", "a", "b", "--undo"]).is_ok());
    }

    #[test]
    fn test_supplement_add_requires_dosage() {
        assert!(Cli::try_parse_from(["vitacheck", "supplement", "add", "Zinc"]).is_err());
        assert!(
            Cli::try_parse_from(["vitacheck", "supplement", "add", "Zinc", "-d", "25 mg", "--ai"])
                .is_ok()
        );
    }
}
