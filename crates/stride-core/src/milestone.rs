//! Milestone detection with per-day dedup.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::day::DayKey;
use crate::error::Result;
use crate::storage::{KvStore, StateStore};

pub(crate) mod keys {
    pub const LAST_FIRED: &str = "milestones.lastFired";
}

/// A celebration-worthy threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    #[serde(rename = "streak_3")]
    ThreeDayStreak,
    #[serde(rename = "streak_7")]
    SevenDayStreak,
    #[serde(rename = "progress_200")]
    DoubleGoal,
    #[serde(rename = "progress_150")]
    OneAndAHalfGoal,
    #[serde(rename = "progress_125")]
    QuarterPastGoal,
}

impl Milestone {
    /// Evaluation order; the first qualifying entry not yet fired today wins.
    pub const PRIORITY: [Milestone; 5] = [
        Milestone::ThreeDayStreak,
        Milestone::SevenDayStreak,
        Milestone::DoubleGoal,
        Milestone::OneAndAHalfGoal,
        Milestone::QuarterPastGoal,
    ];

    /// Stable identifier used as the dedup key.
    pub fn id(&self) -> &'static str {
        match self {
            Milestone::ThreeDayStreak => "streak_3",
            Milestone::SevenDayStreak => "streak_7",
            Milestone::DoubleGoal => "progress_200",
            Milestone::OneAndAHalfGoal => "progress_150",
            Milestone::QuarterPastGoal => "progress_125",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Milestone::ThreeDayStreak => "3-day streak",
            Milestone::SevenDayStreak => "7-day streak",
            Milestone::DoubleGoal => "Double your goal",
            Milestone::OneAndAHalfGoal => "150% of your goal",
            Milestone::QuarterPastGoal => "125% of your goal",
        }
    }

    pub fn qualifies(&self, streak: u32, progress_ratio: f64) -> bool {
        match self {
            Milestone::ThreeDayStreak => streak == 3,
            Milestone::SevenDayStreak => streak == 7,
            Milestone::DoubleGoal => progress_ratio >= 2.0,
            Milestone::OneAndAHalfGoal => progress_ratio >= 1.5,
            Milestone::QuarterPastGoal => progress_ratio >= 1.25,
        }
    }
}

pub struct MilestoneDetector {
    store: StateStore,
    last_fired: BTreeMap<String, DayKey>,
}

impl MilestoneDetector {
    pub fn load(store: Arc<dyn KvStore>) -> Result<Self> {
        let store = StateStore::new(store);
        let last_fired: BTreeMap<String, DayKey> = store
            .read_or_recover(keys::LAST_FIRED)?
            .unwrap_or_default();
        Ok(Self { store, last_fired })
    }

    /// Return the highest-priority milestone that qualifies and has not fired
    /// on `today`, marking it fired.
    pub fn detect(&mut self, streak: u32, progress_ratio: f64, today: DayKey) -> Option<Milestone> {
        let milestone = Milestone::PRIORITY.into_iter().find(|m| {
            m.qualifies(streak, progress_ratio) && self.last_fired(*m) != Some(today)
        })?;

        self.last_fired.insert(milestone.id().to_string(), today);
        self.store.write_or_defer(keys::LAST_FIRED, &self.last_fired);
        tracing::info!(milestone = milestone.id(), streak, "milestone reached");
        Some(milestone)
    }

    pub fn last_fired(&self, milestone: Milestone) -> Option<DayKey> {
        self.last_fired.get(milestone.id()).copied()
    }

    /// Retry writes that did not land earlier.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    pub fn has_pending_writes(&self) -> bool {
        self.store.has_pending_writes()
    }
}
