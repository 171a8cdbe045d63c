use clap::Args;
use serde::Serialize;
use stride_core::{Clock, Config, Database, DayKey, SystemClock};

use super::open_tracker;

#[derive(Args)]
pub struct LogArgs {
    /// Activity count (steps)
    count: u64,
    /// Day to log as YYYY-MM-DD (default: today)
    #[arg(long)]
    day: Option<DayKey>,
    /// Add to the day's total instead of replacing it
    #[arg(long)]
    add: bool,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Number of days to show, ending today
    #[arg(long, default_value_t = 7)]
    days: u32,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct HistoryRow {
    day: DayKey,
    count: Option<u64>,
    goal_met: bool,
    bridged: bool,
}

pub fn log(args: LogArgs) -> Result<(), Box<dyn std::error::Error>> {
    let today = SystemClock.today();
    let day = args.day.unwrap_or(today);
    if day > today {
        return Err(format!("cannot log activity for future day {day}").into());
    }

    let db = Database::open()?;
    let total = if args.add {
        db.add_activity(day, args.count)?
    } else {
        db.record_activity(day, args.count)?;
        args.count
    };

    let goal = Config::load_or_default().goal.daily_steps;
    println!("{day}: {total} / {goal}");
    Ok(())
}

pub fn history(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.days == 0 {
        return Err("--days must be at least 1".into());
    }
    let config = Config::load_or_default();
    let (db, mut tracker) = open_tracker(&config)?;
    let goal = config.goal.daily_steps;

    let today = SystemClock.today();
    let from = today.add_days(-(i64::from(args.days) - 1));
    let logged = db.activity_between(from, today)?;

    let rows: Vec<HistoryRow> = (0..i64::from(args.days))
        .map(|offset| {
            let day = from.add_days(offset);
            let count = logged.iter().find(|e| e.day == day).map(|e| e.count);
            HistoryRow {
                day,
                count,
                goal_met: count.is_some_and(|c| c >= goal),
                bridged: tracker.passes().was_pass_used(day),
            }
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in rows {
            let count = row
                .count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into());
            let mark = if row.goal_met {
                "met"
            } else if row.bridged {
                "bridged"
            } else {
                "missed"
            };
            println!("{}  {:>8}  {}", row.day, count, mark);
        }
    }
    tracker.flush()?;
    Ok(())
}
