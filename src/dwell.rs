//! Dwell-time target compliance.
//!
//! Share of tickets whose full stay (`wait + service`) stays within a target, broken
//! down by any [`GroupBy`] dimension and for the slice as a whole.

use crate::aggregate::{GroupBy, GroupKey};
use crate::models::TicketEvent;
use crate::stats::mean;
use serde::Serialize;
use std::collections::BTreeMap;

pub(crate) fn mean_seconds<F: Fn(&TicketEvent) -> i64>(records: &[&TicketEvent], field: F) -> Option<f64> {
    let values: Vec<f64> = records.iter().map(|&r| field(r) as f64).collect();
    mean(&values)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellStats {
    pub records: usize,
    pub within_target: usize,
    /// Percentage in `[0, 100]`, `None` for an empty group.
    pub compliance_percent: Option<f64>,
    pub mean_wait_seconds: Option<f64>,
    pub mean_service_seconds: Option<f64>,
    pub mean_total_seconds: Option<f64>,
}

impl DwellStats {
    pub fn of(records: &[&TicketEvent], target_seconds: i64) -> Self {
        let within_target = records
            .iter()
            .filter(|r| r.total_seconds <= target_seconds)
            .count();

        Self {
            records: records.len(),
            within_target,
            compliance_percent: if records.is_empty() {
                None
            } else {
                Some(within_target as f64 * 100.0 / records.len() as f64)
            },
            mean_wait_seconds: mean_seconds(records, |r| r.wait_seconds),
            mean_service_seconds: mean_seconds(records, |r| r.service_seconds),
            mean_total_seconds: mean_seconds(records, |r| r.total_seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellReport {
    pub target_seconds: i64,
    pub group_by: GroupBy,
    pub overall: DwellStats,
    pub groups: BTreeMap<GroupKey, DwellStats>,
}

pub fn dwell_compliance(records: &[&TicketEvent], group_by: GroupBy, target_seconds: i64) -> DwellReport {
    let mut grouped: BTreeMap<GroupKey, Vec<&TicketEvent>> = BTreeMap::new();
    for &record in records {
        grouped.entry(group_by.key(record)).or_default().push(record);
    }

    let groups = grouped
        .into_iter()
        .map(|(key, members)| (key, DwellStats::of(&members, target_seconds)))
        .collect();

    DwellReport {
        target_seconds,
        group_by,
        overall: DwellStats::of(records, target_seconds),
        groups,
    }
}
