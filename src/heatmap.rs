//! Heatmap Builder
//!
//! Pickup counts as a dense `date x hour` matrix. Columns are always the 24 hours of
//! the day, zero-filled; rows are the calendar dates present in the slice, ascending.
//! When a row cap is given and exceeded, only the most recent dates are kept and the
//! heatmap is marked as truncated.

use crate::aggregate::count_by;
use crate::models::TicketEvent;
use chrono::NaiveDate;
use serde::Serialize;

pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapRow {
    pub date: NaiveDate,
    pub hours: [usize; HOURS_PER_DAY],
}

impl HeatmapRow {
    pub fn total(&self) -> usize {
        self.hours.iter().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub rows: Vec<HeatmapRow>,
    /// Dates present before the row cap was applied.
    pub available_dates: usize,
    pub truncated: bool,
}

impl Heatmap {
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn total(&self) -> usize {
        self.rows.iter().map(HeatmapRow::total).sum()
    }

    /// Column sums, one per hour of day.
    pub fn hour_totals(&self) -> [usize; HOURS_PER_DAY] {
        let mut totals = [0; HOURS_PER_DAY];
        for row in &self.rows {
            for (total, count) in totals.iter_mut().zip(row.hours.iter()) {
                *total += count;
            }
        }
        totals
    }

    pub fn max_cell(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.hours.iter().copied())
            .max()
            .unwrap_or(0)
    }

    pub fn get(&self, date: NaiveDate, hour: u32) -> usize {
        self.rows
            .iter()
            .find(|r| r.date == date)
            .and_then(|r| r.hours.get(hour as usize).copied())
            .unwrap_or(0)
    }
}

pub fn build_heatmap(records: &[&TicketEvent], max_days: Option<usize>) -> Heatmap {
    let cells = count_by(records, |r| (r.pickup_date(), r.pickup_hour()));

    let mut rows: Vec<HeatmapRow> = Vec::new();
    for ((date, hour), count) in cells {
        if rows.last().map(|r| r.date) != Some(date) {
            rows.push(HeatmapRow {
                date,
                hours: [0; HOURS_PER_DAY],
            });
        }
        if let Some(slot) = rows
            .last_mut()
            .and_then(|row| row.hours.get_mut(hour as usize))
        {
            *slot = count;
        }
    }

    let available_dates = rows.len();
    let truncated = match max_days {
        Some(cap) if rows.len() > cap => {
            rows.drain(..rows.len() - cap);
            true
        }
        _ => false,
    };

    if truncated {
        tracing::warn!(
            available_dates,
            kept = rows.len(),
            "Heatmap truncated to the most recent dates"
        );
    }

    Heatmap {
        rows,
        available_dates,
        truncated,
    }
}
