//! # Stride Core Library
//!
//! Turns daily progress toward an activity goal into three signals: a
//! consecutive-day streak, a scarce pass economy that can bridge a single
//! missed day, and one-shot milestones deduplicated per calendar day.
//!
//! ## Architecture
//!
//! - **Record accessor**: per-day read-through cache over an external
//!   [`ActivitySource`]
//! - **Pass ledger**: spend, earn and monthly refill of forgiveness passes
//! - **Streak engine**: once-per-day state machine crediting yesterday
//! - **Milestone detector**: prioritized thresholds with per-day dedup
//! - **Storage**: SQLite key-value state and activity log, TOML configuration
//!
//! Every component receives its store and clock explicitly; there is no global
//! state. [`Tracker`] wires them together and runs one evaluation pass.

pub mod affirmation;
pub mod day;
pub mod error;
pub mod milestone;
pub mod passes;
pub mod record;
pub mod storage;
pub mod streak;
pub mod tracker;

pub use affirmation::AffirmationDeck;
pub use day::{Clock, DayKey, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, Result};
pub use milestone::{Milestone, MilestoneDetector};
pub use passes::{PassLedger, PassSummary, EARN_RATIO, MAX_PASSES};
pub use record::{ActivitySource, DailyRecord, RecordAccessor};
pub use storage::{Config, Database, KvStore, MemoryStore, StateStore};
pub use streak::{StreakEngine, StreakOutcome, StreakState};
pub use tracker::{DailyReport, Tracker};
