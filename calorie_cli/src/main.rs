use calorie_core::tracker::lock as lock_tracker;
use calorie_core::*;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "caltrack")]
#[command(about = "Daily calorie ledger with monthly history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a food item against today
    Add {
        /// Food name
        name: String,

        /// Calories in the item
        #[arg(allow_hyphen_values = true)]
        calories: String,
    },

    /// Show today's total, goal and food log (default)
    Status,

    /// Show or set the daily calorie goal
    Goal {
        #[arg(allow_hyphen_values = true)]
        calories: Option<String>,
    },

    /// Show or set the weight goal in kilograms
    WeightGoal {
        #[arg(allow_hyphen_values = true)]
        kg: Option<String>,
    },

    /// Print the monthly calorie records
    History,

    /// Write the records file now
    Export,

    /// Clear today's food log and total
    Clear,

    /// Close today and start the next day
    Rollover,

    /// Interactive session with automatic day rollover
    Run {
        /// Simulate a new day every N seconds instead of following the calendar
        #[arg(long)]
        simulate_secs: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    calorie_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    let mut tracker = open_tracker(data_dir, &config);

    match cli.command {
        Some(Commands::Add { name, calories }) => cmd_add(&mut tracker, &name, &calories),
        Some(Commands::Status) | None => {
            print_status(&tracker);
            Ok(())
        }
        Some(Commands::Goal { calories }) => cmd_goal(&mut tracker, calories.as_deref()),
        Some(Commands::WeightGoal { kg }) => cmd_weight_goal(&mut tracker, kg.as_deref()),
        Some(Commands::History) => {
            print_history(&tracker);
            Ok(())
        }
        Some(Commands::Export) => cmd_export(&tracker),
        Some(Commands::Clear) => cmd_clear(&mut tracker),
        Some(Commands::Rollover) => cmd_rollover(&mut tracker),
        Some(Commands::Run { simulate_secs }) => cmd_run(tracker, &config, simulate_secs),
    }
}

/// Load the tracker and roll over any days that passed since the last run
fn open_tracker(data_dir: PathBuf, config: &Config) -> Tracker {
    let today = SystemClock.today();
    let mut tracker = Tracker::open(TrackerPaths::in_dir(&data_dir), config, today);

    if let Err(e) = tracker.catch_up(today) {
        eprintln!("⚠ Could not save records: {}", e);
        eprintln!("  Continuing without saving; changes are kept in memory.");
    }

    tracker
}

fn parse_calories(text: &str) -> Result<u32> {
    text.trim().parse::<u32>().map_err(|_| {
        Error::InvalidInput(format!(
            "Please enter a valid number for calories (got {:?})",
            text
        ))
    })
}

fn cmd_add(tracker: &mut Tracker, name: &str, calories: &str) -> Result<()> {
    if name.trim().is_empty() || calories.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Please enter both food name and calories.".into(),
        ));
    }
    let calories = parse_calories(calories)?;

    let logged = tracker.add_to_today(name, calories)?;
    print_logged(tracker, &logged);
    tracker.save_state()?;
    Ok(())
}

fn print_logged(tracker: &Tracker, logged: &Logged) {
    if let Some(entry) = tracker.food_log().last() {
        println!("✓ Logged {}", entry);
    }
    println!("{}", today_line(tracker));
    if let Some(e) = &logged.flush_error {
        eprintln!("⚠ Logged, but not saved: {}", e);
    }
}

fn cmd_goal(tracker: &mut Tracker, calories: Option<&str>) -> Result<()> {
    if let Some(text) = calories {
        let goal = text.trim().parse::<f64>().map_err(|_| {
            Error::InvalidInput(format!("Please enter a valid calorie goal (got {:?})", text))
        })?;
        tracker.set_goal(goal)?;
        tracker.save_state()?;
        println!("✓ Daily calorie goal set");
    }
    println!("Calorie goal: {} kcal", tracker.goal() as i64);
    Ok(())
}

fn cmd_weight_goal(tracker: &mut Tracker, kg: Option<&str>) -> Result<()> {
    if let Some(text) = kg {
        let kg = text.trim().parse::<u8>().map_err(|_| {
            Error::InvalidInput(format!("Please enter a valid weight goal (got {:?})", text))
        })?;
        tracker.set_weight_goal(kg)?;
        tracker.save_state()?;
        println!("✓ Your weight goal of {} kg has been saved!", kg);
    }
    println!("Weight goal: {} kg", tracker.weight_goal());
    Ok(())
}

fn cmd_export(tracker: &Tracker) -> Result<()> {
    match tracker.export_now() {
        Ok(()) => {
            println!("✓ Exported {} records", tracker.ledger().len());
            println!("  CSV: {}", tracker.paths().ledger.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Error exporting records: {}", e);
            Err(e)
        }
    }
}

fn cmd_clear(tracker: &mut Tracker) -> Result<()> {
    tracker.clear_today();
    tracker.save_state()?;
    println!("✓ Food log cleared");
    println!("{}", today_line(tracker));
    Ok(())
}

fn cmd_rollover(tracker: &mut Tracker) -> Result<()> {
    let event = tracker.rollover()?;
    print_rollover(&event);
    Ok(())
}

fn cmd_run(tracker: Tracker, config: &Config, simulate_secs: Option<u64>) -> Result<()> {
    let trigger = match simulate_secs {
        Some(secs) => RolloverTrigger::Interval {
            every: Duration::from_secs(secs.max(1)),
        },
        None => config.rollover_trigger(),
    };

    let shared = tracker.into_shared();
    let mut scheduler = Scheduler::new(shared.clone(), trigger, SystemClock);
    let events = scheduler.subscribe();
    let handle = scheduler.spawn()?;

    // Print notifications as they arrive; ends when the scheduler stops
    let notifier = std::thread::spawn(move || {
        for event in events {
            match event {
                SchedulerEvent::RolledOver(event) => print_rollover(&event),
                SchedulerEvent::RolloverFailed { day, error } => {
                    eprintln!("✗ Could not close {}: {}", day, error);
                    eprintln!("  Today's total is kept; will retry.");
                }
            }
        }
    });

    {
        let guard = lock_tracker(&shared);
        print_status(&guard);
    }
    print_help();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        let mut guard = lock_tracker(&shared);
        match run_line(&mut guard, line.trim()) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("✗ {}", e),
        }
    }

    handle.stop();
    let _ = notifier.join();

    let guard = lock_tracker(&shared);
    if let Err(e) = guard.save_state() {
        eprintln!("⚠ Could not save session: {}", e);
    }
    Ok(())
}

/// Execute one interactive command; returns false to quit
fn run_line(tracker: &mut Tracker, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };
    let rest: Vec<&str> = words.collect();

    match command {
        "add" => match rest.split_last() {
            Some((calories, name)) if !name.is_empty() => {
                let calories = parse_calories(calories)?;
                let logged = tracker.add_to_today(&name.join(" "), calories)?;
                print_logged(tracker, &logged);
            }
            _ => {
                return Err(Error::InvalidInput(
                    "Please enter both food name and calories.".into(),
                ))
            }
        },
        "status" => print_status(tracker),
        "goal" => cmd_goal(tracker, rest.first().copied())?,
        "weight-goal" => cmd_weight_goal(tracker, rest.first().copied())?,
        "history" => print_history(tracker),
        "export" => cmd_export(tracker)?,
        "clear" => {
            tracker.clear_today();
            println!("✓ Food log cleared");
        }
        "rollover" => cmd_rollover(tracker)?,
        "help" => print_help(),
        "quit" | "exit" => return Ok(false),
        other => eprintln!("Unknown command: {}. Type 'help' for commands.", other),
    }
    Ok(true)
}

fn today_line(tracker: &Tracker) -> String {
    format!(
        "Today: {} / {} kcal",
        tracker.today_total(),
        tracker.goal() as i64
    )
}

fn print_status(tracker: &Tracker) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", tracker.active_day());
    println!("╰─────────────────────────────────────────╯");
    println!("  {}", today_line(tracker));
    println!("  Weight goal: {} kg", tracker.weight_goal());
    println!();

    if tracker.food_log().is_empty() {
        println!("  No food logged yet.");
    } else {
        for entry in tracker.food_log() {
            println!("  → {}", entry);
        }
    }
    println!();
}

fn print_history(tracker: &Tracker) {
    let goal = tracker.goal() as i64;
    println!("Day, Total Calories, Goal");
    for record in tracker.history() {
        println!("{}, {}, {}", record.date, record.total_calories, goal);
    }
}

fn print_rollover(event: &RolloverEvent) {
    println!(
        "\n✓ Closed {} with {} kcal. New day: {}",
        event.closed_day, event.closed_total, event.next_day
    );
    if let Some(evicted) = event.evicted {
        println!("  Dropped oldest record {}", evicted.date);
    }
}

fn print_help() {
    println!("─────────────────────────────────────────");
    println!("Commands:");
    println!("  add <food name> <kcal>");
    println!("  status | history | export | clear | rollover");
    println!("  goal [kcal] | weight-goal [kg]");
    println!("  quit");
}
