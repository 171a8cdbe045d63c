//! Rotating affirmation deck.
//!
//! Messages are drawn from a shuffled index list with a cursor. Every message
//! is shown once before any repeats; the deck reshuffles when the cursor runs
//! off the end or the catalogue changes size. Order and cursor are persisted
//! so the rotation continues across launches.

use std::sync::Arc;

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;

use crate::error::Result;
use crate::storage::{KvStore, StateStore};

pub(crate) mod keys {
    pub const ORDER: &str = "affirmations.order";
    pub const CURSOR: &str = "affirmations.cursor";
}

pub const DEFAULT_AFFIRMATIONS: &[&str] = &[
    "Every step counts, including today's.",
    "Consistency beats intensity.",
    "You showed up. That's the hard part.",
    "Small walks add up to long distances.",
    "Rest is part of the streak too.",
    "Yesterday's effort is today's momentum.",
    "Move a little more than you planned.",
    "Progress, not perfection.",
];

pub struct AffirmationDeck {
    store: StateStore,
    messages: Vec<String>,
    order: Vec<usize>,
    cursor: usize,
    rng: Mcg128Xsl64,
}

impl AffirmationDeck {
    /// Deck over [`DEFAULT_AFFIRMATIONS`].
    pub fn load(store: Arc<dyn KvStore>, seed: Option<u64>) -> Result<Self> {
        let messages = DEFAULT_AFFIRMATIONS.iter().map(|s| s.to_string()).collect();
        Self::with_messages(store, messages, seed)
    }

    /// Deck over a custom catalogue. `seed = None` shuffles from entropy.
    pub fn with_messages(
        store: Arc<dyn KvStore>,
        messages: Vec<String>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let store = StateStore::new(store);
        let order: Vec<usize> = store.read_or_recover(keys::ORDER)?.unwrap_or_default();
        let cursor: usize = store.read_or_recover(keys::CURSOR)?.unwrap_or(0);
        let rng = match seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Ok(Self {
            store,
            messages,
            order,
            cursor,
            rng,
        })
    }

    /// Next message, or `None` for an empty catalogue.
    pub fn draw(&mut self) -> Option<&str> {
        if self.messages.is_empty() {
            return None;
        }
        if self.needs_reshuffle() {
            self.reshuffle();
        }

        let index = self.order[self.cursor];
        self.cursor += 1;
        self.store.write_or_defer(keys::CURSOR, &self.cursor);
        Some(self.messages[index].as_str())
    }

    /// Retry writes that did not land earlier.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    /// Messages left before the next reshuffle.
    pub fn remaining(&self) -> usize {
        if self.needs_reshuffle() {
            self.messages.len()
        } else {
            self.order.len() - self.cursor
        }
    }

    fn needs_reshuffle(&self) -> bool {
        self.order.len() != self.messages.len()
            || self.cursor >= self.order.len()
            || !is_permutation(&self.order)
    }

    fn reshuffle(&mut self) {
        let last_shown = self
            .cursor
            .checked_sub(1)
            .and_then(|i| self.order.get(i).copied());

        let mut order: Vec<usize> = (0..self.messages.len()).collect();
        order.shuffle(&mut self.rng);
        // Avoid showing the same message twice in a row across the boundary.
        if order.len() > 1 && order.first().copied() == last_shown {
            let last = order.len() - 1;
            order.swap(0, last);
        }

        self.order = order;
        self.cursor = 0;
        let staged = self
            .store
            .stage(keys::ORDER, &self.order)
            .and_then(|()| self.store.stage(keys::CURSOR, &self.cursor));
        match staged {
            Ok(()) => {
                self.store.commit_or_defer();
            }
            Err(e) => tracing::warn!("affirmation order not staged: {}", e),
        }
        tracing::debug!(size = self.order.len(), "affirmation deck reshuffled");
    }
}

fn is_permutation(order: &[usize]) -> bool {
    let mut seen = vec![false; order.len()];
    for &i in order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
