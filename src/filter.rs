//! Period Filter
//!
//! Selects the records whose pickup date falls inside an [`AnalysisWindow`] and that
//! match a [`FilterSet`]. Records in scope that break the validity rules are not
//! returned; they are counted in an [`ExclusionTally`] so callers can report how much
//! data was dropped.

use crate::models::{AnalysisWindow, ExclusionReason, FilterSet, TicketEvent, ValidityBounds};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-reason count of records left out of the statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionTally {
    pub by_reason: BTreeMap<ExclusionReason, usize>,
}

impl ExclusionTally {
    pub fn record(&mut self, reason: ExclusionReason) {
        *self.by_reason.entry(reason).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.by_reason.values().sum()
    }

    pub fn count(&self, reason: ExclusionReason) -> usize {
        self.by_reason.get(&reason).copied().unwrap_or(0)
    }
}

/// Borrowed view of the records that passed the filter.
#[derive(Debug, Clone)]
pub struct FilteredSlice<'a> {
    pub records: Vec<&'a TicketEvent>,
    pub excluded: ExclusionTally,
}

impl<'a> FilteredSlice<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodFilter {
    bounds: ValidityBounds,
}

impl PeriodFilter {
    pub fn new(bounds: ValidityBounds) -> Self {
        Self { bounds }
    }

    /// Window and entity filters are applied first; validity is checked only on
    /// records that are in scope, so the tally describes this selection alone.
    pub fn filter<'a>(
        &self,
        records: &'a [TicketEvent],
        window: &AnalysisWindow,
        filters: &FilterSet,
    ) -> FilteredSlice<'a> {
        let mut selected = Vec::new();
        let mut excluded = ExclusionTally::default();

        for record in records {
            if !window.contains(record.pickup_date()) || !filters.matches(record) {
                continue;
            }
            match record.exclusion_reason(&self.bounds) {
                Some(reason) => excluded.record(reason),
                None => selected.push(record),
            }
        }

        tracing::debug!(
            window = %window,
            selected = selected.len(),
            excluded = excluded.total(),
            "Period filter applied"
        );

        FilteredSlice {
            records: selected,
            excluded,
        }
    }
}
