use serde::Serialize;
use stride_core::{AffirmationDeck, Config, DailyReport, Database};
use std::sync::Arc;

use super::open_tracker;

#[derive(Serialize)]
struct CheckOutput {
    #[serde(flatten)]
    report: DailyReport,
    milestone_title: Option<&'static str>,
    affirmation: Option<String>,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let (db, mut tracker) = open_tracker(&config)?;

    let report = tracker.run_daily_check();
    let affirmation = if config.celebrations.affirmations {
        next_affirmation(db)?
    } else {
        None
    };

    let output = CheckOutput {
        milestone_title: report.milestone.map(|m| m.title()),
        report,
        affirmation,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    tracker.flush()?;
    Ok(())
}

pub fn affirm() -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);
    match next_affirmation(db)? {
        Some(message) => println!("{message}"),
        None => println!("no affirmations available"),
    }
    Ok(())
}

fn next_affirmation(db: Arc<Database>) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut deck = AffirmationDeck::load(db, None)?;
    let message = deck.draw().map(str::to_string);
    deck.flush()?;
    Ok(message)
}
