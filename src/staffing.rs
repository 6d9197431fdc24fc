//! Staffing views: active gates per hour and operator polyvalence.

use crate::aggregate::count_by;
use crate::heatmap::HOURS_PER_DAY;
use crate::models::{Shift, TicketEvent};
use crate::stats::mean;
use chrono::Timelike;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyGates {
    pub hour: u32,
    /// Distinct operators that started at least one service in this hour.
    pub active_gates: usize,
    pub services: usize,
    pub services_per_gate: Option<f64>,
}

/// Gate activity for every hour of the day, keyed by the hour of `service_start_at`.
/// Hours without activity are present with zero gates.
pub fn gates_per_hour(records: &[&TicketEvent]) -> Vec<HourlyGates> {
    let mut operators: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); HOURS_PER_DAY];
    let mut services = [0usize; HOURS_PER_DAY];

    for &record in records {
        let hour = record.service_start_at.hour() as usize;
        if let Some(set) = operators.get_mut(hour) {
            set.insert(record.operator.as_str());
            services[hour] += 1;
        }
    }

    operators
        .iter()
        .zip(services.iter())
        .enumerate()
        .map(|(hour, (gates, &services))| HourlyGates {
            hour: hour as u32,
            active_gates: gates.len(),
            services,
            services_per_gate: if gates.is_empty() {
                None
            } else {
                Some(services as f64 / gates.len() as f64)
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorProfile {
    pub operator: String,
    pub services: usize,
    pub distinct_operations: usize,
    pub distinct_clients: usize,
    pub mean_service_seconds: Option<f64>,
    pub predominant_shift: Option<Shift>,
    pub services_by_operation: BTreeMap<String, usize>,
}

/// The shift with the most services; ties go to the earlier band.
fn predominant_shift(records: &[&TicketEvent]) -> Option<Shift> {
    let per_shift = count_by(records, |r| r.shift);
    Shift::ALL
        .iter()
        .filter_map(|shift| per_shift.get(shift).map(|&count| (*shift, count)))
        .fold(None, |best: Option<(Shift, usize)>, (shift, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((shift, count)),
        })
        .map(|(shift, _)| shift)
}

pub fn operator_profile(operator: &str, records: &[&TicketEvent]) -> OperatorProfile {
    let services_by_operation = count_by(records, |r| r.operation.clone());
    let clients: BTreeSet<&str> = records.iter().map(|r| r.client.as_str()).collect();
    let service_values: Vec<f64> = records.iter().map(|r| r.service_seconds as f64).collect();

    OperatorProfile {
        operator: operator.to_string(),
        services: records.len(),
        distinct_operations: services_by_operation.len(),
        distinct_clients: clients.len(),
        mean_service_seconds: mean(&service_values),
        predominant_shift: predominant_shift(records),
        services_by_operation,
    }
}

/// Polyvalence of every operator, most versatile first (then by name).
pub fn polyvalence(records: &[&TicketEvent]) -> Vec<OperatorProfile> {
    let mut by_operator: BTreeMap<&str, Vec<&TicketEvent>> = BTreeMap::new();
    for &record in records {
        by_operator
            .entry(record.operator.as_str())
            .or_default()
            .push(record);
    }
    let groups: Vec<(&str, Vec<&TicketEvent>)> = by_operator.into_iter().collect();

    #[cfg(feature = "parallel")]
    let mut profiles: Vec<OperatorProfile> = groups
        .par_iter()
        .map(|(operator, recs)| operator_profile(operator, recs))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let mut profiles: Vec<OperatorProfile> = groups
        .iter()
        .map(|(operator, recs)| operator_profile(operator, recs))
        .collect();

    profiles.sort_by(|a, b| {
        b.distinct_operations
            .cmp(&a.distinct_operations)
            .then_with(|| b.services.cmp(&a.services))
            .then_with(|| a.operator.cmp(&b.operator))
    });
    profiles
}
