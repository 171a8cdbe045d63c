use serde::Serialize;
use stride_core::{Clock, Config, DayKey, PassSummary, SystemClock};

use super::open_tracker;

#[derive(Serialize)]
struct Status {
    streak: u32,
    last_extension_day: Option<DayKey>,
    today_count: Option<u64>,
    goal: u64,
    passes: PassSummary,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let (_db, mut tracker) = open_tracker(&config)?;

    let today_count = match tracker.record_for(SystemClock.today()) {
        Ok(record) => Some(record.activity_count),
        Err(e) => {
            tracing::warn!("today's activity unavailable: {}", e);
            None
        }
    };

    let status = Status {
        streak: tracker.current_streak(),
        last_extension_day: tracker.streak().last_extension_day(),
        today_count,
        goal: config.goal.daily_steps,
        passes: tracker.pass_summary(),
    };
    println!("{}", serde_json::to_string_pretty(&status)?);
    tracker.flush()?;
    Ok(())
}
