//! Rebalance schedule: dated target symbol sets.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::error::NavtraderError;

/// Scheduled rebalance events grouped by date, ascending.
///
/// Each date maps to its target symbols in first-seen order with
/// duplicates dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalancePlan {
    events: BTreeMap<NaiveDate, Vec<String>>,
}

impl RebalancePlan {
    /// Groups `(date, symbol)` rows into events. Rows need not be sorted.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, NavtraderError>
    where
        I: IntoIterator<Item = (NaiveDate, S)>,
        S: Into<String>,
    {
        let mut events: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
        for (date, symbol) in entries {
            let symbol = symbol.into();
            let symbols = events.entry(date).or_default();
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }

        if events.is_empty() {
            return Err(NavtraderError::EmptyPlan);
        }
        Ok(Self { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.events.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.events.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[String])> {
        self.events.iter().map(|(d, s)| (*d, s.as_slice()))
    }

    pub fn targets(&self, date: NaiveDate) -> Option<&[String]> {
        self.events.get(&date).map(Vec::as_slice)
    }

    /// Every symbol named anywhere in the plan, sorted.
    pub fn all_symbols(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.events.values().flatten().collect();
        set.into_iter().cloned().collect()
    }
}
