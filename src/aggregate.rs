//! Per-author accumulation of commit stats
//!
//! The table lives in a `DashMap`, so `record` may be called from any number
//! of worker threads; each author's entry is updated under its shard lock.
//! Accumulation is plain addition, so the result does not depend on the
//! order in which commits complete.

use crate::models::{AuthorKey, AuthorRef, CommitStats, Metric};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Metric name to accumulated value for one author
pub type MetricTotals = BTreeMap<Metric, u64>;

/// Accumulates commit stats per author. Values only ever grow.
///
/// Does not deduplicate: folding the same commit twice counts it twice.
#[derive(Debug, Default)]
pub struct Aggregator {
    table: DashMap<AuthorKey, MetricTotals>,
    logins: DashMap<AuthorKey, String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one commit's stats into its author's totals
    pub fn record(&self, author: &AuthorRef, stats: &CommitStats) {
        let key = author.key();
        if !author.login.is_empty() {
            self.logins
                .entry(key.clone())
                .or_insert_with(|| author.login.clone());
        }

        let mut totals = self.table.entry(key).or_default();
        *totals.entry(Metric::Additions).or_insert(0) += stats.additions;
        *totals.entry(Metric::Deletions).or_insert(0) += stats.deletions;
        *totals.entry(Metric::Total).or_insert(0) += stats.total;
        *totals.entry(Metric::Commits).or_insert(0) += 1;
    }

    /// Copy of the current table
    pub fn snapshot(&self) -> AggregationTable {
        AggregationTable {
            entries: self
                .table
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    /// First login seen for each author key
    pub fn logins(&self) -> HashMap<AuthorKey, String> {
        self.logins
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Author key to accumulated metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregationTable {
    entries: HashMap<AuthorKey, MetricTotals>,
}

impl AggregationTable {
    pub fn get(&self, key: &AuthorKey) -> Option<&MetricTotals> {
        self.entries.get(key)
    }

    /// Accumulated value, zero when the author or metric is absent
    pub fn metric(&self, key: &AuthorKey, metric: Metric) -> u64 {
        self.entries
            .get(key)
            .and_then(|totals| totals.get(&metric))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AuthorKey, &MetricTotals)> {
        self.entries.iter()
    }

    /// Sum of one metric over every author
    pub fn sum(&self, metric: Metric) -> u64 {
        self.entries
            .values()
            .filter_map(|totals| totals.get(&metric))
            .sum()
    }

    /// Authors ordered by total lines changed (descending), then key
    pub fn ranked(&self) -> Vec<(&AuthorKey, &MetricTotals)> {
        let mut rows: Vec<_> = self.entries.iter().collect();
        rows.sort_by(|(ka, a), (kb, b)| {
            let ta = a.get(&Metric::Total).copied().unwrap_or(0);
            let tb = b.get(&Metric::Total).copied().unwrap_or(0);
            tb.cmp(&ta).then_with(|| ka.cmp(kb))
        });
        rows
    }
}
