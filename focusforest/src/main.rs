//! focusforest - grow a forest one focus session at a time
//!
//! Start a session, complete it, and a tree is planted. Stats, streaks and
//! week/month reports are derived from the completed sessions.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use focusforest_core::analytics::{next_unlock, BucketLabel};
use focusforest_core::{
    Config, Database, FocusSession, FocusTracker, PeriodReport, ReportPeriod, SessionFilter,
    SessionPage, User, UserStatsSnapshot,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "focusforest")]
#[command(about = "Focus session tracker - plant a tree for every completed session")]
#[command(version)]
struct Args {
    /// Username to act as
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Database file (default: $XDG_DATA_HOME/focusforest/data.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Start a focus session
    Start {
        /// Planned length in minutes
        #[arg(short, long, default_value_t = 25)]
        minutes: u32,
        /// Tree to plant (name or ID)
        #[arg(short, long)]
        tree: Option<String>,
    },
    /// Complete a pending session (ID or unique prefix)
    Complete {
        id: String,
        /// Notes to attach to the session
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Delete a session (ID or unique prefix)
    Delete { id: String },
    /// List sessions, newest first
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
    /// Show lifetime stats and streaks
    Stats {
        /// Recompute from the session history before printing
        #[arg(long)]
        refresh: bool,
    },
    /// Show a week or month report
    Report {
        #[arg(value_enum)]
        period: PeriodArg,
        /// Last day of the report (default: today, YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Show the tree catalog
    Trees,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Create a user
    Add { name: String },
    /// List users
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PeriodArg {
    Week,
    Month,
}

impl From<PeriodArg> for ReportPeriod {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::Week => ReportPeriod::Week,
            PeriodArg::Month => ReportPeriod::Month,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        focusforest_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = args.db.clone().unwrap_or_else(Config::database_path);
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    let schema_version = db.schema_version().context("failed to read schema version")?;
    tracing::info!(db_path = %db_path.display(), schema_version, "Database ready");

    let tracker = FocusTracker::new(db, config);
    tracing::info!(command = ?args.command, user = ?args.user, "Running command");
    match run(&tracker, &args) {
        Ok(()) => {
            tracing::info!("Command finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Command failed");
            Err(e)
        }
    }
}

fn run(tracker: &FocusTracker, args: &Args) -> Result<()> {
    match &args.command {
        Command::User { action } => match action {
            UserAction::Add { name } => {
                let user = tracker
                    .create_user(name, Utc::now())
                    .with_context(|| format!("failed to create user '{}'", name))?;
                emit(args.json, &user, || {
                    println!("Created user {} ({})", user.username, user.id)
                })
            }
            UserAction::List => {
                let users = tracker.database().list_users()?;
                emit(args.json, &users, || {
                    if users.is_empty() {
                        println!("No users yet. Create one with 'focusforest user add <name>'.");
                    }
                    for user in &users {
                        println!("{}  {}", short_id(&user.id), user.username);
                    }
                })
            }
        },
        Command::Start { minutes, tree } => {
            let user = current_user(tracker, args)?;
            let session = tracker
                .start_session(&user.id, *minutes, tree.as_deref(), Utc::now())
                .context("failed to start session")?;
            emit(args.json, &session, || {
                println!(
                    "Started {} minute session {}",
                    session.duration_minutes, session.id
                )
            })
        }
        Command::Complete { id, notes } => {
            let user = current_user(tracker, args)?;
            let session_id = resolve_session_id(tracker, &user, id)?;
            let done = tracker
                .complete_session(&user.id, &session_id, notes.clone(), Utc::now())
                .context("failed to complete session")?;
            emit(args.json, &done, || {
                println!(
                    "Planted a tree! {} minutes focused.",
                    done.session.duration_minutes
                );
                print_stats(tracker, &done.stats);
            })
        }
        Command::Delete { id } => {
            let user = current_user(tracker, args)?;
            let session_id = resolve_session_id(tracker, &user, id)?;
            let stats = tracker
                .delete_session(&user.id, &session_id, Utc::now())
                .context("failed to delete session")?;
            emit(args.json, &stats, || {
                println!("Deleted session {}", session_id);
                print_stats(tracker, &stats);
            })
        }
        Command::List { limit, offset } => {
            let user = current_user(tracker, args)?;
            let page = tracker.list_sessions(&user.id, *limit, *offset)?;
            emit(args.json, &page, || print_sessions(&page))
        }
        Command::Stats { refresh } => {
            let user = current_user(tracker, args)?;
            let stats = if *refresh {
                tracker.refresh_stats(&user.id, Utc::now())?
            } else {
                tracker.stats(&user.id)?
            };
            emit(args.json, &stats, || print_stats(tracker, &stats))
        }
        Command::Report { period, today } => {
            let user = current_user(tracker, args)?;
            let today = today.unwrap_or_else(|| Utc::now().date_naive());
            let report = tracker
                .report(&user.id, (*period).into(), today)
                .context("failed to build report")?;
            emit(args.json, &report, || print_report(&report))
        }
        Command::Trees => {
            let trees = tracker.database().list_tree_types()?;
            let unlocked = match &args.user {
                Some(_) => Some(tracker.stats(&current_user(tracker, args)?.id)?.unlocked_trees),
                None => None,
            };
            emit(args.json, &trees, || {
                for tree in &trees {
                    let marker = match &unlocked {
                        Some(names) if names.contains(&tree.name) => "[x] ",
                        Some(_) => "[ ] ",
                        None => "",
                    };
                    println!(
                        "{}{:<16} {:<10} {:>4} trees  {}",
                        marker,
                        tree.display_name,
                        tree.rarity.as_str(),
                        tree.unlock_requirement,
                        tree.description.as_deref().unwrap_or("")
                    );
                }
            })
        }
    }
}

/// Print `value` as JSON, or run the text renderer.
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
        println!("{}", rendered);
    } else {
        text();
    }
    Ok(())
}

fn current_user(tracker: &FocusTracker, args: &Args) -> Result<User> {
    let Some(name) = args.user.as_deref() else {
        anyhow::bail!("no user selected; pass --user <name>");
    };
    tracker
        .find_user(name)
        .with_context(|| format!("unknown user '{}'", name))
}

/// Accept a full session ID or a unique prefix of one.
fn resolve_session_id(tracker: &FocusTracker, user: &User, id: &str) -> Result<String> {
    if let Some(session) = tracker.database().get_session(id)? {
        if session.owner_id == user.id {
            return Ok(session.id);
        }
    }

    let matches: Vec<FocusSession> = tracker
        .database()
        .list_sessions(&SessionFilter::for_user(&user.id))?
        .into_iter()
        .filter(|s| s.id.starts_with(id))
        .collect();

    match matches.as_slice() {
        [] => anyhow::bail!("No session found matching '{}'", id),
        [session] => Ok(session.id.clone()),
        _ => anyhow::bail!(
            "'{}' matches {} sessions; use a longer prefix",
            id,
            matches.len()
        ),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn print_stats(tracker: &FocusTracker, stats: &UserStatsSnapshot) {
    println!();
    println!("  Trees planted:   {}", stats.trees_planted);
    println!(
        "  Focus time:      {} ({} session{})",
        stats.duration_display(),
        stats.total_sessions,
        plural(stats.total_sessions)
    );
    println!(
        "  Current streak:  {} day{}",
        stats.current_streak,
        plural(stats.current_streak)
    );
    println!(
        "  Longest streak:  {} day{}",
        stats.longest_streak,
        plural(stats.longest_streak)
    );
    if let Some(day) = stats.last_session_date {
        println!("  Last session:    {}", day);
    }
    println!("  Unlocked trees:  {}", stats.unlocked_trees.join(", "));

    if let Ok(catalog) = tracker.database().list_tree_types() {
        if let Some((tree, remaining)) =
            next_unlock(&stats.unlocked_trees, stats.trees_planted, &catalog)
        {
            println!(
                "  Next unlock:     {} in {} tree{}",
                tree.display_name,
                remaining,
                plural(remaining)
            );
        }
    }
}

fn print_sessions(page: &SessionPage) {
    let sessions = &page.sessions;
    if sessions.is_empty() {
        println!("No sessions found ({} total).", page.total);
        return;
    }
    println!(
        "{:<10} {:<17} {:>7}  {:<10} NOTES",
        "ID", "STARTED", "MINUTES", "STATUS"
    );
    for session in sessions {
        let started = session
            .started_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let status = if session.completed {
            "planted"
        } else {
            "growing"
        };
        println!(
            "{:<10} {:<17} {:>7}  {:<10} {}",
            short_id(&session.id),
            started,
            session.duration_minutes,
            status,
            session.notes.as_deref().unwrap_or("")
        );
    }
    println!();
    println!(
        "Showing {}-{} of {} session{}",
        page.offset + 1,
        page.offset + sessions.len(),
        page.total,
        plural(page.total)
    );
}

fn print_report(report: &PeriodReport) {
    println!(
        "{} report {} .. {}",
        report.period.as_str(),
        report.window_start,
        report.window_end
    );
    println!();

    let widest = report
        .buckets
        .iter()
        .map(|b| b.minutes)
        .max()
        .unwrap_or(0)
        .max(1);

    for bucket in &report.buckets {
        let label = match &bucket.label {
            BucketLabel::Day { date } => date.format("%a %m-%d").to_string(),
            BucketLabel::Week {
                week,
                start_date,
                end_date,
            } => format!(
                "W{} {}..{}",
                week,
                start_date.format("%m-%d"),
                end_date.format("%m-%d")
            ),
        };
        let bar_len = (bucket.minutes * 30 / widest) as usize;
        println!(
            "  {:<18} {:>5}m {:>3}x  {}",
            label,
            bucket.minutes,
            bucket.sessions,
            "#".repeat(bar_len)
        );
    }

    println!();
    println!(
        "  Total: {} minutes in {} session{}",
        report.total.minutes,
        report.total.sessions,
        plural(report.total.sessions)
    );
}
