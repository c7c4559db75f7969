//! Booker - spaced repetition for language study sessions.
//!
//! Runs the terminal UI by default; subcommands cover quick scripting use.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use booker::config::Config;
use booker::daily::{daily_stats, group_by_effective_date};
use booker::models::{duration_label, Category, ItemCollection, Language};
use booker::notify::{DailyReminder, QueueNotifier, ReminderOutcome};
use booker::schedule::{log_item, project_schedule, time_split, EntryKind};
use booker::storage::BookerStorage;
use booker::ui::App;
use booker::SimClock;

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "booker")]
#[command(author, version, about = "Spaced repetition scheduler for language study sessions", long_about = None)]
struct Args {
    /// Directory holding items.json and booker.db
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Pretend today is this many days after the real date
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset: i64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log a study session and schedule its first review for tomorrow
    Add {
        topic: String,

        #[arg(short = 'n', long)]
        description: Option<String>,

        /// English, Spanish, German, French, Italian or Other
        #[arg(short, long)]
        language: Option<Language>,

        /// Grammar, Lexis or NonVerbal
        #[arg(short, long)]
        category: Option<Category>,

        /// Study time in minutes
        #[arg(short, long)]
        minutes: Option<i64>,
    },
    /// Show today's reviews and what comes next
    Today,
    /// Mark a due review as done
    Done { id: String },
    /// Show the review timeline of an item
    Plan { id: String },
    /// Delete an item for good
    Delete { id: String },
    /// Write every item to a JSON file
    Export { path: Option<PathBuf> },
    /// Replace every item with the contents of a JSON export
    Import { path: PathBuf },
    /// Run the once-a-day reminder check
    Remind,
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().unwrap_or_default();

    // Determine data directory
    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(BookerStorage::default_path);

    // Initialize storage
    let storage = BookerStorage::open(data_dir)?;
    let clock = SimClock::with_offset(args.offset);

    match args.command {
        // The TUI owns the terminal, so logs go to a file.
        None => {
            init_file_logging(&storage)?;
            run_tui(storage, config, clock)
        }
        Some(command) => {
            init_stderr_logging();
            run_command(command, &storage, &config, clock)
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("BOOKER_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter())
        .init();
}

fn init_file_logging(storage: &BookerStorage) -> Result<()> {
    let path = storage.log_path();
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {:?}", path))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(env_filter())
        .init();
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════
// Subcommands
// ══════════════════════════════════════════════════════════════════════════

fn run_command(command: Command, storage: &BookerStorage, config: &Config, clock: SimClock) -> Result<()> {
    let today = clock.today();
    let mut items = storage.load()?;

    if clock.is_simulated() {
        eprintln!("Simulating {} (+{} days)", today, clock.offset());
    }

    match command {
        Command::Add {
            topic,
            description,
            language,
            category,
            minutes,
        } => {
            let item = log_item(
                &topic,
                description.as_deref(),
                language.unwrap_or(config.default_language),
                category.unwrap_or(config.default_category),
                minutes.unwrap_or(i64::from(config.default_duration)),
                today,
            )?;
            println!(
                "✓ Logged '{}' ({}), first review {}",
                item.topic,
                short_id(&item.id),
                item.next_due_date.relative_label(today)
            );
            items.add(item);
            storage.save(&items)?;
        }

        Command::Today => print_schedule(&items, today),

        Command::Done { id } => {
            let id = resolve_id(&items, &id)?;
            let due = items.get(&id).map(|item| item.is_due_on(today)).unwrap_or(false);
            if !due {
                bail!("That review is not due yet");
            }
            let item = items.complete(&id, today)?;
            if item.is_archived {
                println!("✓ '{}' finished its last review and moved to the archive", item.topic);
            } else {
                println!(
                    "✓ '{}' is now at {}, next review {}",
                    item.topic,
                    item.stage_label(),
                    item.next_due_date.relative_label(today)
                );
            }
            storage.save(&items)?;
        }

        Command::Plan { id } => {
            let id = resolve_id(&items, &id)?;
            if let Some(item) = items.get(&id) {
                println!("{} [{} · {}]", item.topic, item.language.name(), item.category.name());
                for entry in project_schedule(item) {
                    let marker = match entry.kind {
                        EntryKind::Actual => "●",
                        EntryKind::Projected => "◌",
                    };
                    println!(
                        "  {} {:<24} {}",
                        marker,
                        entry.date.relative_label(today),
                        booker::models::stage_label(entry.stage)
                    );
                }
            }
        }

        Command::Delete { id } => {
            let id = resolve_id(&items, &id)?;
            let item = items.remove(&id)?;
            storage.save(&items)?;
            println!("Deleted '{}'", item.topic);
        }

        Command::Export { path } => {
            let path = path.unwrap_or_else(BookerStorage::default_export_path);
            let count = storage.export_to(&path, &items)?;
            println!("✓ Exported {} items to {}", count, path.display());
        }

        Command::Import { path } => {
            let count = storage.import_from(&path, &mut items)?;
            storage.save(&items)?;
            println!("✓ Imported {} items", count);
        }

        Command::Remind => {
            let mut notifier = QueueNotifier::from_enabled(config.notifications);
            let mut reminder = DailyReminder::new(storage.last_reminder()?);
            match reminder.check(items.items(), today, &mut notifier) {
                ReminderOutcome::Sent(_) => storage.set_last_reminder(today)?,
                ReminderOutcome::AlreadySent => println!("Already reminded today"),
                ReminderOutcome::NothingDue | ReminderOutcome::NoItems => println!("Nothing due today"),
                ReminderOutcome::NotPermitted => {
                    println!("Notifications are off; set `notifications = true` in the config")
                }
            }
            for notice in notifier.drain() {
                println!("🔔 {}\n{}", notice.title, notice.body);
            }
        }
    }

    Ok(())
}

fn print_schedule(items: &ItemCollection, today: booker::Day) {
    let stats = daily_stats(items.items(), today);
    if stats.has_tasks {
        println!("Today: {} reviews, about {}", stats.count, stats.time_string);
    } else {
        println!("Today: free day");
    }

    for (bucket, group) in group_by_effective_date(items.items(), today) {
        println!();
        println!("{}", bucket.relative_label(today));
        for item in group {
            let split = time_split(item.original_duration, item.category);
            let time = if split.has_split {
                format!("{} + {} min fluency", split.main, split.secondary)
            } else {
                duration_label(item.original_duration)
            };
            let overdue = if item.is_overdue_on(today) { " (overdue)" } else { "" };
            println!(
                "  {}  {} {} [{}] {}, {}{}",
                short_id(&item.id),
                item.language.code(),
                item.topic,
                item.category.name(),
                item.stage_label(),
                time,
                overdue
            );
            if let Some(ref description) = item.description {
                for line in textwrap::wrap(description, 68) {
                    println!("            {}", line);
                }
            }
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Accept a full id or any unambiguous prefix of one.
fn resolve_id(items: &ItemCollection, needle: &str) -> Result<String> {
    let matches: Vec<&str> = items
        .items()
        .iter()
        .map(|item| item.id.as_str())
        .filter(|id| id.starts_with(needle))
        .collect();

    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => bail!("No item with id {}", needle),
        _ => bail!("Id prefix {} matches {} items", needle, matches.len()),
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Terminal UI
// ══════════════════════════════════════════════════════════════════════════

fn run_tui(storage: BookerStorage, config: Config, clock: SimClock) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app
    let mut app = App::new(storage, config, clock);

    // Run main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    // Handle any errors
    if let Err(err) = result {
        eprintln!("Error: {}", err);
        return Err(err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while app.running {
        terminal.draw(|frame| app.render(frame))?;
        app.handle_events()?;
    }
    Ok(())
}
