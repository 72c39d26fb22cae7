//! Reaction ledger - who reacted to a message with which symbol

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// Per-message mapping from reaction symbol to reacting users
///
/// Stored as `symbol -> user -> true` so that every (symbol, user) pair is an
/// independent cell; concurrent toggles by different users never touch the
/// same cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionLedger(BTreeMap<String, BTreeMap<UserId, bool>>);

impl ReactionLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if `user` reacted with `symbol`
    pub fn contains(&self, symbol: &str, user: &UserId) -> bool {
        self.0
            .get(symbol)
            .and_then(|users| users.get(user))
            .copied()
            .unwrap_or(false)
    }

    /// Toggle one cell; returns whether the reaction is now present
    pub fn toggle(&mut self, symbol: &str, user: &UserId) -> bool {
        if self.contains(symbol, user) {
            if let Some(users) = self.0.get_mut(symbol) {
                users.remove(user);
                if users.is_empty() {
                    self.0.remove(symbol);
                }
            }
            false
        } else {
            self.0
                .entry(symbol.to_string())
                .or_default()
                .insert(user.clone(), true);
            true
        }
    }

    /// Number of users who reacted with `symbol`
    pub fn count(&self, symbol: &str) -> usize {
        self.0
            .get(symbol)
            .map_or(0, |users| users.values().filter(|&&present| present).count())
    }

    /// Users who reacted with `symbol`
    pub fn reactors<'a>(&'a self, symbol: &str) -> impl Iterator<Item = &'a UserId> + 'a {
        self.0
            .get(symbol)
            .into_iter()
            .flat_map(|users| users.iter().filter(|(_, present)| **present).map(|(u, _)| u))
    }

    /// Total reactions across all symbols
    pub fn total(&self) -> usize {
        self.0.keys().map(|symbol| self.count(symbol)).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Aggregate for display: up to `top_n` most used symbols plus the total
    ///
    /// Symbols with equal counts keep symbol order.
    pub fn summary(&self, top_n: usize, viewer: Option<&UserId>) -> ReactionSummary {
        let mut counts: Vec<ReactionCount> = self
            .0
            .keys()
            .map(|symbol| ReactionCount {
                symbol: symbol.clone(),
                count: self.count(symbol),
                me: viewer.is_some_and(|user| self.contains(symbol, user)),
            })
            .filter(|rc| rc.count > 0)
            .collect();

        let total = counts.iter().map(|rc| rc.count).sum();
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(top_n);

        ReactionSummary { top: counts, total }
    }
}

/// Aggregated reaction count for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCount {
    pub symbol: String,
    pub count: usize,
    pub me: bool,
}

/// Presentation aggregate of a ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSummary {
    pub top: Vec<ReactionCount>,
    pub total: usize,
}
