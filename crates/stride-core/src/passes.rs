//! Forgiveness-pass ledger.
//!
//! Passes are a scarce grace resource: at most [`MAX_PASSES`] are held, one is
//! spent to bridge a single missed day, one can be earned per day by clearly
//! overperforming, and one is replenished per calendar month.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::day::{Clock, DayKey};
use crate::error::Result;
use crate::storage::{KvStore, StateStore};

/// Upper bound on the pass balance.
pub const MAX_PASSES: u8 = 3;

/// Progress ratio at or above which a pass is earned.
pub const EARN_RATIO: f64 = 1.5;

pub(crate) mod keys {
    pub const BALANCE: &str = "passes.balance";
    pub const USED_DATES: &str = "passes.usedDates";
    pub const LAST_REFILL_CHECK: &str = "passes.lastMonthlyRefillCheck";
    pub const LAST_EARNED: &str = "passes.lastEarnedDate";
}

/// Snapshot of the ledger for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub balance: u8,
    pub used_dates: Vec<DayKey>,
    pub last_monthly_refill_check: DayKey,
    pub last_earned_date: Option<DayKey>,
}

pub struct PassLedger {
    store: StateStore,
    clock: Arc<dyn Clock>,
    balance: u8,
    used_dates: BTreeSet<DayKey>,
    last_refill_check: DayKey,
    last_earned: Option<DayKey>,
}

impl PassLedger {
    /// Load the ledger, creating it with a full balance on first use.
    ///
    /// Persisted values that break an invariant are clamped and rewritten.
    ///
    /// # Errors
    /// Returns an error only if the store cannot be read.
    pub fn load(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = StateStore::new(store);
        let today = clock.today();

        let stored_balance: Option<i64> = store.read_or_recover(keys::BALANCE)?;
        let used: Option<Vec<DayKey>> = store.read_or_recover(keys::USED_DATES)?;
        let refill: Option<DayKey> = store.read_or_recover(keys::LAST_REFILL_CHECK)?;
        let earned: Option<Option<DayKey>> = store.read_or_recover(keys::LAST_EARNED)?;

        let first_use = stored_balance.is_none() && refill.is_none();
        let mut repaired = false;

        let balance = match stored_balance {
            None => {
                if !first_use {
                    tracing::warn!(key = keys::BALANCE, "balance missing, restoring full balance");
                    repaired = true;
                }
                MAX_PASSES
            }
            Some(b) if (0..=i64::from(MAX_PASSES)).contains(&b) => b as u8,
            Some(b) => {
                let clamped = b.clamp(0, i64::from(MAX_PASSES)) as u8;
                tracing::warn!(
                    key = keys::BALANCE,
                    "balance {} outside [0, {}], clamped to {}",
                    b,
                    MAX_PASSES,
                    clamped
                );
                repaired = true;
                clamped
            }
        };

        let used_list = used.unwrap_or_default();
        let used_dates: BTreeSet<DayKey> = used_list.iter().copied().collect();
        if used_dates.len() != used_list.len() {
            tracing::warn!(key = keys::USED_DATES, "duplicate bridged dates collapsed");
            repaired = true;
        }

        let last_refill_check = refill.unwrap_or_else(|| {
            if !first_use {
                tracing::warn!(key = keys::LAST_REFILL_CHECK, "refill stamp missing, using today");
                repaired = true;
            }
            today
        });

        let mut ledger = Self {
            store,
            clock,
            balance,
            used_dates,
            last_refill_check,
            last_earned: earned.flatten(),
        };

        if first_use {
            tracing::info!(balance = MAX_PASSES, "created pass ledger");
        }
        if first_use || repaired {
            ledger.persist_all();
        }
        Ok(ledger)
    }

    /// Balance after applying the monthly refill rule.
    pub fn current_balance(&mut self) -> u8 {
        self.apply_monthly_refill(self.clock.today());
        self.balance
    }

    /// Spend a pass to bridge `day`.
    ///
    /// Returns `false` without mutation when no pass is left or `day` was
    /// already bridged; use [`was_pass_used`](Self::was_pass_used) to tell
    /// those apart.
    pub fn spend_pass_for(&mut self, day: DayKey) -> bool {
        if self.balance == 0 || self.used_dates.contains(&day) {
            return false;
        }
        self.used_dates.insert(day);
        self.balance -= 1;
        // The bridged date goes first so a torn write never charges twice.
        self.commit(&[Field::UsedDates, Field::Balance]);
        tracing::info!(day = %day, balance = self.balance, "spent pass");
        true
    }

    /// Earn a pass for overperforming today. At most once per calendar day.
    pub fn try_earn_pass(&mut self, progress_ratio: f64) -> bool {
        let today = self.clock.today();
        if progress_ratio.is_nan()
            || progress_ratio < EARN_RATIO
            || self.balance >= MAX_PASSES
            || self.last_earned == Some(today)
        {
            return false;
        }
        self.balance += 1;
        self.last_earned = Some(today);
        self.commit(&[Field::LastEarned, Field::Balance]);
        tracing::info!(ratio = progress_ratio, balance = self.balance, "earned pass");
        true
    }

    pub fn was_pass_used(&self, day: DayKey) -> bool {
        self.used_dates.contains(&day)
    }

    /// Bridged days, oldest first.
    pub fn used_dates(&self) -> impl Iterator<Item = DayKey> + '_ {
        self.used_dates.iter().copied()
    }

    pub fn last_earned_date(&self) -> Option<DayKey> {
        self.last_earned
    }

    pub fn summary(&mut self) -> PassSummary {
        let balance = self.current_balance();
        PassSummary {
            balance,
            used_dates: self.used_dates().collect(),
            last_monthly_refill_check: self.last_refill_check,
            last_earned_date: self.last_earned,
        }
    }

    /// Retry writes that did not land earlier.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    pub fn has_pending_writes(&self) -> bool {
        self.store.has_pending_writes()
    }

    /// One refill per month transition. The stamp moves even at a full
    /// balance, so a full ledger forfeits that month's refill.
    fn apply_monthly_refill(&mut self, today: DayKey) {
        if today <= self.last_refill_check || today.same_month(self.last_refill_check) {
            return;
        }
        if self.balance < MAX_PASSES {
            self.balance += 1;
            tracing::info!(balance = self.balance, "monthly pass refill");
        }
        self.last_refill_check = today;
        self.commit(&[Field::Balance, Field::LastRefillCheck]);
    }

    fn persist_all(&mut self) {
        self.commit(&[
            Field::UsedDates,
            Field::Balance,
            Field::LastRefillCheck,
            Field::LastEarned,
        ]);
    }

    /// Stage `fields` in order and write them as one batch.
    fn commit(&mut self, fields: &[Field]) {
        for field in fields {
            let staged = match field {
                Field::Balance => self.store.stage(keys::BALANCE, &self.balance),
                Field::UsedDates => self.store.stage(keys::USED_DATES, &self.used_dates),
                Field::LastRefillCheck => self
                    .store
                    .stage(keys::LAST_REFILL_CHECK, &self.last_refill_check),
                Field::LastEarned => self.store.stage(keys::LAST_EARNED, &self.last_earned),
            };
            if let Err(e) = staged {
                tracing::warn!(field = ?field, "pass ledger value not staged: {}", e);
            }
        }
        self.store.commit_or_defer();
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Balance,
    UsedDates,
    LastRefillCheck,
    LastEarned,
}
