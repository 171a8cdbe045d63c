//! Property tests for the streak, pass and milestone invariants.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use stride_core::{
    Clock, Database, DayKey, ManualClock, MemoryStore, MilestoneDetector, PassLedger, Tracker,
    MAX_PASSES,
};

const GOAL: u64 = 1_000;

fn install_day() -> DayKey {
    DayKey::parse("2024-01-15").unwrap()
}

/// One simulated day: the activity logged and whether the app ran a check.
fn day_strategy() -> impl Strategy<Value = (u64, bool)> {
    (prop_oneof![Just(0u64), 0u64..3_000], any::<bool>())
}

proptest! {
    #[test]
    fn streak_never_outgrows_calendar(days in prop::collection::vec(day_strategy(), 1..90)) {
        let store = Arc::new(MemoryStore::new());
        let activity = Arc::new(Database::open_memory().unwrap());
        let clock = Arc::new(ManualClock::new(install_day()));
        let mut tracker = Tracker::new(store, activity.clone(), clock.clone(), GOAL).unwrap();

        for (count, checks) in days {
            activity.record_activity(clock.today(), count).unwrap();
            if checks {
                let report = tracker.run_daily_check();
                let elapsed = clock.today().days_since(install_day());
                prop_assert!(i64::from(report.streak) <= elapsed);
                prop_assert!(report.balance <= MAX_PASSES);

                let state = tracker.streak().state();
                prop_assert_eq!(state.current_streak == 0, state.last_extension_day.is_none());
            }
            clock.advance_days(1);
        }
    }

    #[test]
    fn second_check_same_day_changes_nothing(days in prop::collection::vec(day_strategy(), 1..40)) {
        let store = Arc::new(MemoryStore::new());
        let activity = Arc::new(Database::open_memory().unwrap());
        let clock = Arc::new(ManualClock::new(install_day()));
        let mut tracker = Tracker::new(store, activity.clone(), clock.clone(), GOAL).unwrap();

        for (count, _) in days {
            activity.record_activity(clock.today(), count).unwrap();
            clock.advance_days(1);
            tracker.run_daily_check();
            let state = tracker.streak().state();
            let summary = tracker.pass_summary();

            tracker.run_daily_check();
            prop_assert_eq!(tracker.streak().state(), state);
            prop_assert_eq!(tracker.pass_summary(), summary);
        }
    }

    #[test]
    fn spending_charges_each_day_once(offsets in prop::collection::vec(0i64..6, 0..20)) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(install_day()));
        let mut ledger = PassLedger::load(store, clock).unwrap();

        let mut distinct = HashSet::new();
        for offset in offsets {
            let day = install_day().add_days(-offset);
            let spent = ledger.spend_pass_for(day);
            let fresh = distinct.len() < usize::from(MAX_PASSES) && !distinct.contains(&day);
            prop_assert_eq!(spent, fresh);
            if spent {
                distinct.insert(day);
            }
        }
        prop_assert_eq!(
            usize::from(ledger.current_balance()),
            usize::from(MAX_PASSES) - distinct.len()
        );
    }

    #[test]
    fn refill_once_per_month_and_capped(
        steps in prop::collection::vec((0i64..20, 1usize..4, any::<bool>()), 1..60)
    ) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(install_day()));
        let mut ledger = PassLedger::load(store, clock.clone()).unwrap();

        let mut previous = ledger.current_balance();
        let mut spend_cursor = 0i64;
        let mut last_refill_month = install_day();
        for (advance, polls, spend) in steps {
            clock.advance_days(advance);
            let today = clock.today();
            let month_changed = !today.same_month(last_refill_month);

            let mut balances = Vec::new();
            for _ in 0..polls {
                balances.push(ledger.current_balance());
            }
            prop_assert!(balances.iter().all(|b| *b == balances[0]));
            let now = balances[0];
            prop_assert!(now <= MAX_PASSES);
            if month_changed {
                prop_assert!(now <= previous + 1);
                last_refill_month = today;
            } else {
                prop_assert_eq!(now, previous);
            }

            previous = now;
            if spend {
                spend_cursor += 1;
                if ledger.spend_pass_for(install_day().add_days(-spend_cursor)) {
                    previous -= 1;
                }
            }
        }
    }

    #[test]
    fn milestone_fires_at_most_once_per_day(
        streak in 0u32..10,
        ratio in 0.0f64..3.0,
        calls in 1usize..12,
    ) {
        let store = Arc::new(MemoryStore::new());
        let mut detector = MilestoneDetector::load(store).unwrap();
        let today = install_day();

        let fired: Vec<_> = (0..calls)
            .filter_map(|_| detector.detect(streak, ratio, today))
            .collect();
        let unique: HashSet<_> = fired.iter().collect();
        prop_assert_eq!(unique.len(), fired.len());
        prop_assert!(fired.len() <= 5);
    }
}
