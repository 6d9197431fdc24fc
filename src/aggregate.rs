//! Group Aggregator
//!
//! Computes `count`, `mean` and sample `stddev` of a numeric field per group. Every
//! "by client", "by operation", "by operator" or "by hour" view is one call to
//! [`aggregate`] with a different key function and value field.

use crate::models::{Shift, TicketEvent};
use crate::stats::{mean, sample_stddev};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key a record was grouped under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum GroupKey {
    Label(String),
    Hour(u32),
    Shift(Shift),
    Date(NaiveDate),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Label(label) => write!(f, "{}", label),
            GroupKey::Hour(hour) => write!(f, "{:02}h", hour),
            GroupKey::Shift(shift) => write!(f, "Shift {}", shift),
            GroupKey::Date(date) => write!(f, "{}", date),
        }
    }
}

/// Common grouping dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Client,
    Operation,
    Operator,
    Hour,
    Shift,
    Date,
}

impl GroupBy {
    pub fn key(&self, event: &TicketEvent) -> GroupKey {
        match self {
            GroupBy::Client => GroupKey::Label(event.client.clone()),
            GroupBy::Operation => GroupKey::Label(event.operation.clone()),
            GroupBy::Operator => GroupKey::Label(event.operator.clone()),
            GroupBy::Hour => GroupKey::Hour(event.pickup_hour()),
            GroupBy::Shift => GroupKey::Shift(event.shift),
            GroupBy::Date => GroupKey::Date(event.pickup_date()),
        }
    }
}

impl FromStr for GroupBy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(GroupBy::Client),
            "operation" => Ok(GroupBy::Operation),
            "operator" => Ok(GroupBy::Operator),
            "hour" => Ok(GroupBy::Hour),
            "shift" => Ok(GroupBy::Shift),
            "date" => Ok(GroupBy::Date),
            _ => anyhow::bail!("Unknown grouping: {}", s),
        }
    }
}

/// Duration fields a group can be summarized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ServiceSeconds,
    WaitSeconds,
    TotalSeconds,
}

impl Metric {
    pub fn value(&self, event: &TicketEvent) -> Option<f64> {
        let seconds = match self {
            Metric::ServiceSeconds => event.service_seconds,
            Metric::WaitSeconds => event.wait_seconds,
            Metric::TotalSeconds => event.total_seconds,
        };
        Some(seconds as f64)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::ServiceSeconds => "service",
            Metric::WaitSeconds => "wait",
            Metric::TotalSeconds => "total",
        }
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "service" | "service_seconds" => Ok(Metric::ServiceSeconds),
            "wait" | "wait_seconds" => Ok(Metric::WaitSeconds),
            "total" | "total_seconds" => Ok(Metric::TotalSeconds),
            _ => anyhow::bail!("Unknown metric: {}", s),
        }
    }
}

/// Summary of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStats {
    /// Records in the group, whether or not they carried a value.
    pub count: usize,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
}

pub type Aggregate<K = GroupKey> = BTreeMap<K, GroupStats>;

pub fn aggregate<K, F, V>(records: &[&TicketEvent], key_fn: F, value_fn: V) -> Aggregate<K>
where
    K: Ord,
    F: Fn(&TicketEvent) -> K,
    V: Fn(&TicketEvent) -> Option<f64>,
{
    let mut groups: BTreeMap<K, (usize, Vec<f64>)> = BTreeMap::new();

    for &record in records {
        let (count, values) = groups.entry(key_fn(record)).or_default();
        *count += 1;
        if let Some(value) = value_fn(record) {
            values.push(value);
        }
    }

    groups
        .into_iter()
        .map(|(key, (count, values))| {
            (
                key,
                GroupStats {
                    count,
                    mean: mean(&values),
                    stddev: sample_stddev(&values),
                },
            )
        })
        .collect()
}

pub fn aggregate_by(records: &[&TicketEvent], group_by: GroupBy, metric: Metric) -> Aggregate {
    aggregate(records, |r| group_by.key(r), |r| metric.value(r))
}

/// Count-only grouping.
pub fn count_by<K, F>(records: &[&TicketEvent], key_fn: F) -> BTreeMap<K, usize>
where
    K: Ord,
    F: Fn(&TicketEvent) -> K,
{
    aggregate(records, key_fn, |_| None)
        .into_iter()
        .map(|(key, stats)| (key, stats.count))
        .collect()
}
