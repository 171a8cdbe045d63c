//! One evaluation pass over all components.
//!
//! Order matters: each stage reads state the previous one may have changed.
//! Records are read first, then the pass ledger is refilled and credited,
//! then the streak is decided (possibly spending a pass), and finally
//! milestones are checked against the resulting streak.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::day::{Clock, DayKey};
use crate::error::{ConfigError, Result};
use crate::milestone::{Milestone, MilestoneDetector};
use crate::passes::{PassLedger, PassSummary};
use crate::record::{ActivitySource, DailyRecord, RecordAccessor};
use crate::storage::{Config, KvStore};
use crate::streak::{StreakEngine, StreakOutcome};

/// Read-only snapshot for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub today: DayKey,
    pub outcome: StreakOutcome,
    pub streak: u32,
    pub projected_streak: u32,
    pub balance: u8,
    pub earned_pass: bool,
    pub goal: u64,
    /// `None` when today's data could not be read.
    pub today_count: Option<u64>,
    pub progress_ratio: Option<f64>,
    pub milestone: Option<Milestone>,
}

pub struct Tracker {
    clock: Arc<dyn Clock>,
    records: RecordAccessor,
    passes: PassLedger,
    streak: StreakEngine,
    milestones: MilestoneDetector,
    celebrations: bool,
}

impl Tracker {
    /// Wire every component to the same store and clock.
    ///
    /// # Errors
    /// Returns an error if `goal` is zero or persisted state cannot be read
    /// from the store.
    pub fn new(
        store: Arc<dyn KvStore>,
        source: Arc<dyn ActivitySource>,
        clock: Arc<dyn Clock>,
        goal: u64,
    ) -> Result<Self> {
        check_goal(goal)?;
        let records = RecordAccessor::new(source, clock.clone(), goal);
        let passes = PassLedger::load(store.clone(), clock.clone())?;
        let streak = StreakEngine::load(store.clone(), clock.clone())?;
        let milestones = MilestoneDetector::load(store)?;
        Ok(Self {
            clock,
            records,
            passes,
            streak,
            milestones,
            celebrations: true,
        })
    }

    pub fn from_config(
        store: Arc<dyn KvStore>,
        source: Arc<dyn ActivitySource>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Result<Self> {
        let mut tracker = Self::new(store, source, clock, config.goal.daily_steps)?;
        tracker.celebrations = config.celebrations.enabled;
        Ok(tracker)
    }

    /// Run one evaluation pass. Never fails; problems degrade to no change.
    pub fn run_daily_check(&mut self) -> DailyReport {
        if let Err(e) = self.flush() {
            tracing::warn!("earlier writes still pending: {}", e);
        }

        let today = self.clock.today();
        self.records.refresh();
        let today_record = match self.records.record_for(today) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(day = %today, "today's progress unknown: {}", e);
                None
            }
        };

        self.passes.current_balance();
        let earned_pass = today_record
            .map(|r| self.passes.try_earn_pass(r.progress_ratio()))
            .unwrap_or(false);

        let outcome = self.streak.evaluate(&mut self.records, &mut self.passes);
        let streak = self.streak.current_streak();

        let milestone = match today_record {
            Some(r) if self.celebrations => {
                self.milestones.detect(streak, r.progress_ratio(), today)
            }
            _ => None,
        };

        let report = DailyReport {
            today,
            outcome,
            streak,
            projected_streak: self
                .streak
                .projected_streak(today_record.is_some_and(|r| r.goal_met())),
            balance: self.passes.current_balance(),
            earned_pass,
            goal: self.records.goal(),
            today_count: today_record.map(|r| r.activity_count),
            progress_ratio: today_record.map(|r| r.progress_ratio()),
            milestone,
        };
        tracing::debug!(?report, "daily check complete");
        report
    }

    /// Record for any day through the shared cache.
    pub fn record_for(&mut self, day: DayKey) -> Result<DailyRecord> {
        self.records.record_for(day)
    }

    /// Invalidate cached counts that may still change.
    pub fn refresh(&mut self) {
        self.records.refresh();
    }

    /// # Errors
    /// Rejects a zero goal and keeps the current one.
    pub fn set_goal(&mut self, goal: u64) -> Result<(), ConfigError> {
        check_goal(goal)?;
        self.records.set_goal(goal);
        Ok(())
    }

    pub fn current_streak(&self) -> u32 {
        self.streak.current_streak()
    }

    pub fn current_balance(&mut self) -> u8 {
        self.passes.current_balance()
    }

    pub fn pass_summary(&mut self) -> PassSummary {
        self.passes.summary()
    }

    pub fn streak(&self) -> &StreakEngine {
        &self.streak
    }

    pub fn passes(&self) -> &PassLedger {
        &self.passes
    }

    pub fn passes_mut(&mut self) -> &mut PassLedger {
        &mut self.passes
    }

    pub fn milestones(&self) -> &MilestoneDetector {
        &self.milestones
    }

    /// Retry every deferred write. Returns the first failure, if any.
    pub fn flush(&mut self) -> Result<()> {
        let passes = self.passes.flush();
        let streak = self.streak.flush();
        let milestones = self.milestones.flush();
        passes.and(streak).and(milestones)
    }

    pub fn has_pending_writes(&self) -> bool {
        self.passes.has_pending_writes()
            || self.streak.has_pending_writes()
            || self.milestones.has_pending_writes()
    }
}

fn check_goal(goal: u64) -> Result<(), ConfigError> {
    if goal == 0 {
        return Err(ConfigError::InvalidValue {
            key: "goal.daily_steps".into(),
            message: "goal must be at least 1".into(),
        });
    }
    Ok(())
}
