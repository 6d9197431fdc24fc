//! Idle-Time Detector
//!
//! Estimates, per operator, the average unproductive gap between consecutive
//! services on the same calendar day.
//!
//! Records are grouped by the date of `service_end_at` and ordered by
//! `service_end_at`. For each consecutive pair the gap is
//! `next.service_start_at - current.service_end_at`. Only gaps in `(0, 7200]`
//! seconds count as idle time: non-positive gaps are overlapping or out-of-order
//! records, and gaps above two hours are off-shift time.
//!
//! An operator with no surviving gap has an undefined idle time and is left out of
//! the ranking; reporting 0 would claim perfect utilization.

use crate::models::TicketEvent;
use crate::stats::mean;
use chrono::NaiveDate;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Longest gap still counted as idle time.
pub const MAX_IDLE_GAP_SECONDS: i64 = 7200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyIdle {
    pub date: NaiveDate,
    pub services: usize,
    pub gaps: Vec<i64>,
    pub mean_idle_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorIdle {
    pub operator: String,
    pub services: usize,
    pub gap_count: usize,
    /// Mean over every surviving gap of every day, `None` when there are none.
    pub mean_idle_seconds: Option<f64>,
    pub daily: Vec<DailyIdle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdleReport {
    /// Operators with a defined idle time (lowest first), then the rest by name.
    pub operators: Vec<OperatorIdle>,
}

impl IdleReport {
    /// Operators with a defined idle time, lowest first.
    pub fn ranking(&self) -> Vec<&OperatorIdle> {
        self.operators
            .iter()
            .filter(|o| o.mean_idle_seconds.is_some())
            .collect()
    }

    pub fn undefined(&self) -> Vec<&OperatorIdle> {
        self.operators
            .iter()
            .filter(|o| o.mean_idle_seconds.is_none())
            .collect()
    }

    pub fn get(&self, operator: &str) -> Option<&OperatorIdle> {
        self.operators.iter().find(|o| o.operator == operator)
    }
}

fn is_idle_gap(gap: i64) -> bool {
    gap > 0 && gap <= MAX_IDLE_GAP_SECONDS
}

/// Surviving idle gaps, in seconds, between the services of a single day.
pub fn day_gaps(day: &[&TicketEvent]) -> Vec<i64> {
    let mut ordered: Vec<&TicketEvent> = day.to_vec();
    ordered.sort_by_key(|r| r.service_end_at);

    ordered
        .windows(2)
        .map(|pair| (pair[1].service_start_at - pair[0].service_end_at).num_seconds())
        .filter(|&gap| is_idle_gap(gap))
        .collect()
}

/// Idle time of one operator. `records` must already be restricted to that operator.
pub fn operator_idle(operator: &str, records: &[&TicketEvent]) -> OperatorIdle {
    let mut by_day: BTreeMap<NaiveDate, Vec<&TicketEvent>> = BTreeMap::new();
    for &record in records {
        by_day.entry(record.service_end_date()).or_default().push(record);
    }

    let daily: Vec<DailyIdle> = by_day
        .into_iter()
        .map(|(date, day)| {
            let gaps = day_gaps(&day);
            let as_f64: Vec<f64> = gaps.iter().map(|&g| g as f64).collect();
            DailyIdle {
                date,
                services: day.len(),
                mean_idle_seconds: mean(&as_f64),
                gaps,
            }
        })
        .collect();

    let all_gaps: Vec<f64> = daily
        .iter()
        .flat_map(|d| d.gaps.iter().map(|&g| g as f64))
        .collect();

    OperatorIdle {
        operator: operator.to_string(),
        services: records.len(),
        gap_count: all_gaps.len(),
        mean_idle_seconds: mean(&all_gaps),
        daily,
    }
}

/// Idle time of every operator present in `records`.
pub fn detect_idle(records: &[&TicketEvent]) -> IdleReport {
    let mut by_operator: BTreeMap<&str, Vec<&TicketEvent>> = BTreeMap::new();
    for &record in records {
        by_operator
            .entry(record.operator.as_str())
            .or_default()
            .push(record);
    }
    let groups: Vec<(&str, Vec<&TicketEvent>)> = by_operator.into_iter().collect();

    #[cfg(feature = "parallel")]
    let mut operators: Vec<OperatorIdle> = groups
        .par_iter()
        .map(|(operator, recs)| operator_idle(operator, recs))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let mut operators: Vec<OperatorIdle> = groups
        .iter()
        .map(|(operator, recs)| operator_idle(operator, recs))
        .collect();

    operators.sort_by(|a, b| match (a.mean_idle_seconds, b.mean_idle_seconds) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.operator.cmp(&b.operator)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.operator.cmp(&b.operator),
    });

    tracing::debug!(
        operators = operators.len(),
        ranked = operators.iter().filter(|o| o.mean_idle_seconds.is_some()).count(),
        "Idle time computed"
    );

    IdleReport { operators }
}

/// Idle time of a single operator picked out of a wider slice.
pub fn detect_idle_for(records: &[&TicketEvent], operator: &str) -> OperatorIdle {
    let own: Vec<&TicketEvent> = records
        .iter()
        .copied()
        .filter(|r| r.operator == operator)
        .collect();
    operator_idle(operator, &own)
}
