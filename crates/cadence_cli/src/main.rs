//! Command-line front end for the scheduling engine.
//!
//! # Responsibility
//! - Verify `cadence_core` linkage independently of the mobile host.
//! - Inspect and mutate a snapshot database from a terminal.

use cadence_core::db::open_db;
use cadence_core::{
    CompletionLedger, CoreConfig, Recurrence, RecurrenceFrequency, SqliteSnapshotRepository,
    Task, TaskId, TaskService,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Recurring task scheduling engine", long_about = None)]
struct Cli {
    /// Snapshot database path
    #[arg(long, env = "CADENCE_DB_PATH", default_value = "cadence.sqlite3")]
    db: PathBuf,
    /// Engine config as a JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the engine health check and version
    Ping,
    /// Add a task
    Add {
        title: String,
        /// Target day in YYYY-MM-DD
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Start time in HH:MM
        #[arg(short, long)]
        at: Option<String>,
        /// Recurrence (daily, weekly, biweekly, monthly, yearly)
        #[arg(short, long)]
        recur: Option<String>,
    },
    /// Toggle completion of a task on a day (today by default)
    Toggle {
        id: TaskId,
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// List the tasks occurring today, or on another day
    Today {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Show missed occurrences for the week containing a day
    Week {
        date: Option<NaiveDate>,
    },
    /// Show completion statistics for a month
    Month { year: i32, month: u32 },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Commands::Ping = cli.command {
        println!("cadence_core ping={}", cadence_core::ping());
        println!("cadence_core version={}", cadence_core::core_version());
        return ExitCode::SUCCESS;
    }
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
            CoreConfig::from_json(&raw).map_err(|err| err.to_string())?
        }
        None => CoreConfig::default(),
    };
    let conn = open_db(&cli.db).map_err(|err| err.to_string())?;
    let mut service = TaskService::open(SqliteSnapshotRepository::new(&conn), config)
        .map_err(|err| err.to_string())?;

    match cli.command {
        Commands::Ping => {}
        Commands::Add {
            title,
            date,
            at,
            recur,
        } => {
            let mut task = Task::new(title, Utc::now());
            let day = date.unwrap_or_else(|| service.today());
            task = task.on(day);
            if let Some(raw) = at {
                let time = NaiveTime::parse_from_str(&raw, "%H:%M")
                    .map_err(|err| format!("invalid time `{raw}`: {err}"))?;
                task.scheduled_time = Some(service.calendar().at(day, time));
            }
            if let Some(raw) = recur {
                let frequency = RecurrenceFrequency::parse(&raw)
                    .ok_or_else(|| format!("unsupported recurrence `{raw}`"))?;
                task.recurrence = Some(Recurrence::new(frequency));
            }
            let task = service.add_task(task).map_err(|err| err.to_string())?;
            println!("{}", task.id);
        }
        Commands::Toggle { id, date } => {
            let day = date.unwrap_or_else(|| service.today());
            let completed = service
                .toggle_completion(id, day)
                .map_err(|err| err.to_string())?;
            println!("{id} {day} completed={completed}");
        }
        Commands::Today { date } => {
            let day = date.unwrap_or_else(|| service.today());
            for task in service.tasks_for_date(day) {
                let mark = if CompletionLedger::is_completed_on(task, day) {
                    'x'
                } else {
                    ' '
                };
                let time = task
                    .scheduled_time
                    .map(|instant| {
                        service
                            .calendar()
                            .time_of_day(instant)
                            .format("%H:%M")
                            .to_string()
                    })
                    .unwrap_or_else(|| "--:--".to_string());
                println!("[{mark}] {time} {} {}", task.title, task.id);
            }
        }
        Commands::Week { date } => {
            let day = date.unwrap_or_else(|| service.today());
            let start = service.calendar().start_of_week(day);
            for report in service.missed_for_week(start) {
                println!(
                    "{} missed {}/{}",
                    report.title, report.missed_count, report.expected_count
                );
            }
        }
        Commands::Month { year, month } => {
            let breakdown = service.monthly_breakdown(year, month);
            let summary = service.monthly_summary(year, month);
            println!(
                "occurrences={} completed={} incomplete={}",
                breakdown.total, breakdown.completed, breakdown.incomplete
            );
            println!(
                "recurring={} one_off={}",
                summary.recurring_completed, summary.one_off_completed
            );
            for (rank, activity) in summary.top_activities.iter().enumerate() {
                println!("{}. {} ({})", rank + 1, activity.title, activity.count);
            }
        }
    }
    Ok(())
}
