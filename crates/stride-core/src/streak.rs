//! Consecutive-day streak engine.
//!
//! The streak is evaluated once per day boundary and always credits
//! *yesterday*: yesterday's total is final, so a late-running check still
//! credits the right day. A single missed day directly after the chain can be
//! bridged with a pass; anything longer breaks the streak.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::day::{Clock, DayKey};
use crate::error::Result;
use crate::passes::PassLedger;
use crate::record::RecordAccessor;
use crate::storage::{KvStore, StateStore};

pub(crate) mod keys {
    pub const COUNT: &str = "streak.count";
    pub const LAST_EXTENSION: &str = "streak.lastExtensionDay";
    pub const LAST_EVALUATED: &str = "streak.lastEvaluatedDay";
}

/// Persisted streak. `current_streak == 0` iff `last_extension_day` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub last_extension_day: Option<DayKey>,
}

impl StreakState {
    pub fn is_active(&self) -> bool {
        self.current_streak > 0
    }
}

/// What one evaluation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreakOutcome {
    /// Today was already decided; nothing changed.
    AlreadyEvaluated,
    /// Yesterday's data could not be read; nothing changed.
    Indeterminate,
    /// A new streak of one began with yesterday.
    Started,
    /// The chain continued through yesterday, possibly on a pass.
    Extended { streak: u32, bridged: bool },
    /// The chain broke.
    Reset { previous: u32 },
}

pub struct StreakEngine {
    store: StateStore,
    clock: Arc<dyn Clock>,
    state: StreakState,
    last_evaluated: Option<DayKey>,
}

impl StreakEngine {
    /// Load persisted streak state, repairing an inconsistent pair to broken.
    ///
    /// # Errors
    /// Returns an error only if the store cannot be read.
    pub fn load(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = StateStore::new(store);

        let count: Option<i64> = store.read_or_recover(keys::COUNT)?;
        let last_extension: Option<Option<DayKey>> =
            store.read_or_recover(keys::LAST_EXTENSION)?;
        let last_evaluated: Option<Option<DayKey>> =
            store.read_or_recover(keys::LAST_EVALUATED)?;

        let (state, repaired) = validate(count.unwrap_or(0), last_extension.flatten());

        let mut engine = Self {
            store,
            clock,
            state,
            last_evaluated: last_evaluated.flatten(),
        };
        if repaired {
            engine.persist();
        }
        Ok(engine)
    }

    pub fn current_streak(&self) -> u32 {
        self.state.current_streak
    }

    pub fn last_extension_day(&self) -> Option<DayKey> {
        self.state.last_extension_day
    }

    pub fn state(&self) -> StreakState {
        self.state
    }

    /// Streak to display if today ends up credited.
    pub fn projected_streak(&self, today_goal_met: bool) -> u32 {
        let yesterday = self.clock.today().pred();
        match self.state.last_extension_day {
            Some(last) if today_goal_met && last == yesterday => {
                self.state.current_streak.saturating_add(1)
            }
            None if today_goal_met => 1,
            _ => self.state.current_streak,
        }
    }

    /// Decide yesterday. Safe to call any number of times per day.
    pub fn evaluate(
        &mut self,
        records: &mut RecordAccessor,
        passes: &mut PassLedger,
    ) -> StreakOutcome {
        let today = self.clock.today();
        let yesterday = today.pred();

        let already_credited = self
            .state
            .last_extension_day
            .is_some_and(|last| last >= yesterday);
        if already_credited || self.last_evaluated == Some(today) {
            return StreakOutcome::AlreadyEvaluated;
        }

        let record = match records.record_for(yesterday) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(day = %yesterday, "streak left unchanged: {}", e);
                return StreakOutcome::Indeterminate;
            }
        };

        let connected = self.state.last_extension_day == Some(yesterday.pred());
        let outcome = if record.goal_met() {
            self.extend(yesterday, connected, false)
        } else if connected && (passes.spend_pass_for(yesterday) || passes.was_pass_used(yesterday))
        {
            self.extend(yesterday, true, true)
        } else {
            let previous = self.state.current_streak;
            self.state = StreakState::default();
            if previous > 0 {
                tracing::info!(day = %yesterday, previous, "streak reset");
            }
            StreakOutcome::Reset { previous }
        };

        self.last_evaluated = Some(today);
        self.persist();
        outcome
    }

    /// Retry writes that did not land earlier.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    pub fn has_pending_writes(&self) -> bool {
        self.store.has_pending_writes()
    }

    fn extend(&mut self, day: DayKey, connected: bool, bridged: bool) -> StreakOutcome {
        if connected {
            self.state.current_streak = self.state.current_streak.saturating_add(1);
            self.state.last_extension_day = Some(day);
            tracing::info!(day = %day, streak = self.state.current_streak, bridged, "streak extended");
            StreakOutcome::Extended {
                streak: self.state.current_streak,
                bridged,
            }
        } else {
            if self.state.is_active() {
                tracing::info!(
                    day = %day,
                    previous = self.state.current_streak,
                    "streak restarted after unbridged gap"
                );
            }
            self.state = StreakState {
                current_streak: 1,
                last_extension_day: Some(day),
            };
            StreakOutcome::Started
        }
    }

    /// The three keys commit as one batch, so a reload never sees a new
    /// extension day paired with an old count.
    fn persist(&mut self) {
        let staged = self
            .store
            .stage(keys::COUNT, &self.state.current_streak)
            .and_then(|()| {
                self.store
                    .stage(keys::LAST_EXTENSION, &self.state.last_extension_day)
            })
            .and_then(|()| self.store.stage(keys::LAST_EVALUATED, &self.last_evaluated));
        if let Err(e) = staged {
            tracing::warn!("streak state not staged: {}", e);
            return;
        }
        self.store.commit_or_defer();
    }
}

/// Restore the count/day invariant. Returns the state and whether it changed.
fn validate(count: i64, last_extension: Option<DayKey>) -> (StreakState, bool) {
    match (count, last_extension) {
        (0, None) => (StreakState::default(), false),
        (n, Some(day)) if n > 0 && n <= i64::from(u32::MAX) => (
            StreakState {
                current_streak: n as u32,
                last_extension_day: Some(day),
            },
            false,
        ),
        (n, day) => {
            tracing::warn!(
                key = keys::COUNT,
                "inconsistent streak state (count {}, last extension {:?}), resetting",
                n,
                day.map(|d| d.to_string())
            );
            (StreakState::default(), true)
        }
    }
}
