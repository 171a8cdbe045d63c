//! Daily record accessor.
//!
//! Reads the activity total for a calendar day from an [`ActivitySource`]
//! through a per-day cache. A count fetched after its day ended can no longer
//! change and is kept for the process lifetime; a count fetched while its day
//! was still running is refetched on [`RecordAccessor::refresh`] or once that
//! day is over.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::day::{Clock, DayKey};
use crate::error::Result;

/// External supplier of daily activity totals.
///
/// Implementations own their own timeout and retry policy. An unreachable
/// source must fail with `CoreError::DataUnavailable`, never report zero.
pub trait ActivitySource: Send + Sync {
    fn fetch_count(&self, day: DayKey) -> Result<u64>;
}

/// Activity for one day measured against the goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub day: DayKey,
    pub activity_count: u64,
    pub goal: u64,
}

impl DailyRecord {
    pub fn goal_met(&self) -> bool {
        self.activity_count >= self.goal
    }

    /// Activity divided by goal, 0.0 for a zero goal.
    pub fn progress_ratio(&self) -> f64 {
        if self.goal == 0 {
            return 0.0;
        }
        self.activity_count as f64 / self.goal as f64
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    count: u64,
    fetched_on: DayKey,
}

impl CachedCount {
    /// Fetched after its day ended.
    fn is_settled(&self, day: DayKey) -> bool {
        self.fetched_on > day
    }
}

pub struct RecordAccessor {
    source: Arc<dyn ActivitySource>,
    clock: Arc<dyn Clock>,
    goal: u64,
    cache: HashMap<DayKey, CachedCount>,
}

impl RecordAccessor {
    pub fn new(source: Arc<dyn ActivitySource>, clock: Arc<dyn Clock>, goal: u64) -> Self {
        Self {
            source,
            clock,
            goal,
            cache: HashMap::new(),
        }
    }

    pub fn goal(&self) -> u64 {
        self.goal
    }

    /// Change the goal. Cached counts stay valid.
    pub fn set_goal(&mut self, goal: u64) {
        self.goal = goal;
    }

    /// Record for `day`, from cache when still valid.
    ///
    /// # Errors
    /// Propagates `DataUnavailable` from the source; nothing is cached then.
    pub fn record_for(&mut self, day: DayKey) -> Result<DailyRecord> {
        let today = self.clock.today();
        if let Some(cached) = self.cache.get(&day) {
            if cached.is_settled(day) || cached.fetched_on == today {
                return Ok(self.build(day, cached.count));
            }
        }

        let count = self.source.fetch_count(day)?;
        self.cache.insert(
            day,
            CachedCount {
                count,
                fetched_on: today,
            },
        );
        tracing::debug!(day = %day, count, "fetched activity");
        Ok(self.build(day, count))
    }

    /// Drop every entry that may still change.
    pub fn refresh(&mut self) {
        self.cache.retain(|day, cached| cached.is_settled(*day));
    }

    fn build(&self, day: DayKey, activity_count: u64) -> DailyRecord {
        DailyRecord {
            day,
            activity_count,
            goal: self.goal,
        }
    }
}
