//! Core Data Models
//!
//! This module defines the record model every analysis runs on, together with the
//! parameter types that select which records take part in a run.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`RawTicket`] - one ticket as handed over by the ingestion layer
//! 2. **Typed Record**: [`TicketEvent`] - the same ticket with its derived fields
//!    (`service_seconds`, `wait_seconds`, `total_seconds`, `shift`) computed once
//! 3. **Selection**: [`AnalysisWindow`] and [`FilterSet`] - which records a run looks at
//!
//! ## Validity
//!
//! A record only takes part in statistics when its status is served or transferred,
//! its service lasted between 60 and 1800 seconds and its wait between 0 and 14400
//! seconds (see [`ValidityBounds`]). Records failing these checks are not errors:
//! they are tallied by [`ExclusionReason`] and otherwise ignored.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Outcome recorded for a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TicketStatus {
    Served,
    Transferred,
    Other(String),
}

impl TicketStatus {
    /// Only served and transferred tickets describe a completed service.
    pub fn is_analyzable(&self) -> bool {
        matches!(self, TicketStatus::Served | TicketStatus::Transferred)
    }
}

impl From<String> for TicketStatus {
    fn from(value: String) -> Self {
        match value.trim().to_uppercase().as_str() {
            "SERVED" | "ATENDIDO" => TicketStatus::Served,
            "TRANSFERRED" | "TRANSFERIDA" | "TRANSFERIDO" => TicketStatus::Transferred,
            _ => TicketStatus::Other(value),
        }
    }
}

impl From<&str> for TicketStatus {
    fn from(value: &str) -> Self {
        TicketStatus::from(value.to_string())
    }
}

impl From<TicketStatus> for String {
    fn from(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Served => "SERVED".to_string(),
            TicketStatus::Transferred => "TRANSFERRED".to_string(),
            TicketStatus::Other(raw) => raw,
        }
    }
}

/// Fixed hour band a ticket was pulled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Shift {
    A,
    B,
    C,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::A, Shift::B, Shift::C];

    pub fn label(&self) -> &'static str {
        match self {
            Shift::A => "A",
            Shift::B => "B",
            Shift::C => "C",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Shift {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase();
        let band = normalized
            .strip_prefix("TURNO")
            .or_else(|| normalized.strip_prefix("SHIFT"))
            .unwrap_or(&normalized)
            .trim();
        match band {
            "A" => Ok(Shift::A),
            "B" => Ok(Shift::B),
            "C" => Ok(Shift::C),
            _ => anyhow::bail!("Unknown shift: {}", s),
        }
    }
}

/// Start hours of the three shift bands. C wraps around midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftBands {
    pub a_start_hour: u32,
    pub b_start_hour: u32,
    pub c_start_hour: u32,
}

impl Default for ShiftBands {
    fn default() -> Self {
        Self {
            a_start_hour: 7,
            b_start_hour: 15,
            c_start_hour: 23,
        }
    }
}

impl ShiftBands {
    pub fn shift_for_hour(&self, hour: u32) -> Shift {
        if hour >= self.a_start_hour && hour < self.b_start_hour {
            Shift::A
        } else if hour >= self.b_start_hour && hour < self.c_start_hour {
            Shift::B
        } else {
            Shift::C
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.a_start_hour < self.b_start_hour
            && self.b_start_hour < self.c_start_hour
            && self.c_start_hour < 24)
        {
            anyhow::bail!(
                "Shift bands must satisfy a < b < c < 24, got a={} b={} c={}",
                self.a_start_hour,
                self.b_start_hour,
                self.c_start_hour
            );
        }
        Ok(())
    }
}

/// Duration bounds a record must respect to be analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityBounds {
    pub min_service_seconds: i64,
    pub max_service_seconds: i64,
    pub max_wait_seconds: i64,
}

impl Default for ValidityBounds {
    fn default() -> Self {
        Self {
            min_service_seconds: 60,
            max_service_seconds: 1800,
            max_wait_seconds: 14400,
        }
    }
}

/// Why a record was left out of the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    InvalidStatus,
    ServiceOutOfBounds,
    WaitOutOfBounds,
}

/// A ticket as supplied by the ingestion layer, before derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTicket {
    pub id: String,
    pub client: String,
    pub operation: String,
    pub operator: String,
    pub pickup_at: NaiveDateTime,
    pub service_start_at: NaiveDateTime,
    pub service_end_at: NaiveDateTime,
    pub status: TicketStatus,
}

impl RawTicket {
    pub fn into_event(self, bands: &ShiftBands) -> TicketEvent {
        TicketEvent::derive(self, bands)
    }
}

/// One queue transaction with its derived durations.
///
/// Derived fields are computed by [`TicketEvent::derive`] and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketEvent {
    pub id: String,
    pub client: String,
    pub operation: String,
    pub operator: String,
    pub pickup_at: NaiveDateTime,
    pub service_start_at: NaiveDateTime,
    pub service_end_at: NaiveDateTime,
    pub status: TicketStatus,
    pub service_seconds: i64,
    pub wait_seconds: i64,
    pub total_seconds: i64,
    pub shift: Shift,
}

impl TicketEvent {
    pub fn derive(raw: RawTicket, bands: &ShiftBands) -> Self {
        let service_seconds = (raw.service_end_at - raw.service_start_at).num_seconds();
        let wait_seconds = (raw.service_start_at - raw.pickup_at).num_seconds();
        let shift = bands.shift_for_hour(raw.pickup_at.hour());

        Self {
            id: raw.id,
            client: raw.client,
            operation: raw.operation,
            operator: raw.operator,
            pickup_at: raw.pickup_at,
            service_start_at: raw.service_start_at,
            service_end_at: raw.service_end_at,
            status: raw.status,
            service_seconds,
            wait_seconds,
            total_seconds: wait_seconds + service_seconds,
            shift,
        }
    }

    /// Returns the first validity rule this record breaks, if any.
    pub fn exclusion_reason(&self, bounds: &ValidityBounds) -> Option<ExclusionReason> {
        if !self.status.is_analyzable() {
            return Some(ExclusionReason::InvalidStatus);
        }
        if self.service_seconds < bounds.min_service_seconds
            || self.service_seconds > bounds.max_service_seconds
        {
            return Some(ExclusionReason::ServiceOutOfBounds);
        }
        if self.wait_seconds < 0 || self.wait_seconds > bounds.max_wait_seconds {
            return Some(ExclusionReason::WaitOutOfBounds);
        }
        None
    }

    pub fn is_valid(&self, bounds: &ValidityBounds) -> bool {
        self.exclusion_reason(bounds).is_none()
    }

    pub fn pickup_date(&self) -> NaiveDate {
        self.pickup_at.date()
    }

    pub fn pickup_hour(&self) -> u32 {
        self.pickup_at.hour()
    }

    pub fn service_end_date(&self) -> NaiveDate {
        self.service_end_at.date()
    }
}

/// Inclusive calendar-date range applied to `pickup_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AnalysisWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if start_date > end_date {
            anyhow::bail!(
                "Window start {} is after window end {}",
                start_date,
                end_date
            );
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Same as [`AnalysisWindow::new`] but rejects ranges longer than `max_days`.
    pub fn with_cap(start_date: NaiveDate, end_date: NaiveDate, max_days: i64) -> Result<Self> {
        let window = Self::new(start_date, end_date)?;
        if window.days() > max_days {
            anyhow::bail!(
                "Window {} spans {} days, limit is {}",
                window,
                window.days(),
                max_days
            );
        }
        Ok(window)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

impl fmt::Display for AnalysisWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_date, self.end_date)
    }
}

/// Either every value, or a non-empty explicit set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Selection<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: Ord> Selection<T> {
    /// An empty selection maps to [`Selection::All`], never to "match nothing".
    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Self {
        let set: BTreeSet<T> = values.into_iter().collect();
        if set.is_empty() {
            Selection::All
        } else {
            Selection::Only(set)
        }
    }

    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.contains(value),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

/// Entity restrictions applied on top of a window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    pub clients: Selection<String>,
    pub operations: Selection<String>,
    pub shifts: Selection<Shift>,
}

impl FilterSet {
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter set from user-facing labels. A list that is empty or that
    /// contains the `ALL` token selects everything.
    pub fn from_labels(clients: &[String], operations: &[String], shifts: &[String]) -> Result<Self> {
        let shifts = if has_all_token(shifts) {
            Selection::All
        } else {
            Selection::from_values(
                shifts
                    .iter()
                    .map(|s| s.parse::<Shift>())
                    .collect::<Result<Vec<_>>>()?,
            )
        };

        Ok(Self {
            clients: labels_to_selection(clients),
            operations: labels_to_selection(operations),
            shifts,
        })
    }

    pub fn with_clients<I: IntoIterator<Item = S>, S: Into<String>>(mut self, clients: I) -> Self {
        self.clients = Selection::from_values(clients.into_iter().map(Into::into));
        self
    }

    pub fn with_operations<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        operations: I,
    ) -> Self {
        self.operations = Selection::from_values(operations.into_iter().map(Into::into));
        self
    }

    pub fn with_shifts<I: IntoIterator<Item = Shift>>(mut self, shifts: I) -> Self {
        self.shifts = Selection::from_values(shifts);
        self
    }

    pub fn matches(&self, event: &TicketEvent) -> bool {
        self.clients.matches(&event.client)
            && self.operations.matches(&event.operation)
            && self.shifts.matches(&event.shift)
    }
}

fn has_all_token(labels: &[String]) -> bool {
    labels.iter().any(|l| {
        let l = l.trim();
        l.eq_ignore_ascii_case("ALL") || l.eq_ignore_ascii_case("TODOS") || l.eq_ignore_ascii_case("TODAS")
    })
}

fn labels_to_selection(labels: &[String]) -> Selection<String> {
    if has_all_token(labels) {
        Selection::All
    } else {
        Selection::from_values(labels.iter().map(|l| l.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn raw(pickup: &str, start: &str, end: &str, status: &str) -> RawTicket {
        RawTicket {
            id: "t1".to_string(),
            client: "ACME".to_string(),
            operation: "LOAD".to_string(),
            operator: "op1".to_string(),
            pickup_at: ts(pickup),
            service_start_at: ts(start),
            service_end_at: ts(end),
            status: TicketStatus::from(status),
        }
    }

    #[test]
    fn test_derived_fields() {
        let event = raw(
            "2024-03-01 08:00:00",
            "2024-03-01 08:10:00",
            "2024-03-01 08:15:00",
            "SERVED",
        )
        .into_event(&ShiftBands::default());

        assert_eq!(event.wait_seconds, 600);
        assert_eq!(event.service_seconds, 300);
        assert_eq!(event.total_seconds, 900);
        assert_eq!(event.shift, Shift::A);
        assert!(event.is_valid(&ValidityBounds::default()));
    }

    #[test]
    fn test_status_aliases() {
        assert_eq!(TicketStatus::from("atendido"), TicketStatus::Served);
        assert_eq!(TicketStatus::from("TRANSFERIDA"), TicketStatus::Transferred);
        assert_eq!(
            TicketStatus::from("CANCELADA"),
            TicketStatus::Other("CANCELADA".to_string())
        );
    }

    #[test]
    fn test_exclusion_reasons() {
        let bounds = ValidityBounds::default();
        let bands = ShiftBands::default();

        let cancelled = raw(
            "2024-03-01 08:00:00",
            "2024-03-01 08:10:00",
            "2024-03-01 08:15:00",
            "CANCELLED",
        )
        .into_event(&bands);
        assert_eq!(
            cancelled.exclusion_reason(&bounds),
            Some(ExclusionReason::InvalidStatus)
        );

        let too_short = raw(
            "2024-03-01 08:00:00",
            "2024-03-01 08:10:00",
            "2024-03-01 08:10:59",
            "SERVED",
        )
        .into_event(&bands);
        assert_eq!(
            too_short.exclusion_reason(&bounds),
            Some(ExclusionReason::ServiceOutOfBounds)
        );

        let waited_too_long = raw(
            "2024-03-01 02:00:00",
            "2024-03-01 06:00:01",
            "2024-03-01 06:05:00",
            "SERVED",
        )
        .into_event(&bands);
        assert_eq!(
            waited_too_long.exclusion_reason(&bounds),
            Some(ExclusionReason::WaitOutOfBounds)
        );

        let negative_wait = raw(
            "2024-03-01 08:10:00",
            "2024-03-01 08:00:00",
            "2024-03-01 08:05:00",
            "SERVED",
        )
        .into_event(&bands);
        assert_eq!(
            negative_wait.exclusion_reason(&bounds),
            Some(ExclusionReason::WaitOutOfBounds)
        );
    }

    #[test]
    fn test_shift_bands_wrap_midnight() {
        let bands = ShiftBands::default();
        assert_eq!(bands.shift_for_hour(6), Shift::C);
        assert_eq!(bands.shift_for_hour(7), Shift::A);
        assert_eq!(bands.shift_for_hour(14), Shift::A);
        assert_eq!(bands.shift_for_hour(15), Shift::B);
        assert_eq!(bands.shift_for_hour(22), Shift::B);
        assert_eq!(bands.shift_for_hour(23), Shift::C);
        assert_eq!(bands.shift_for_hour(0), Shift::C);
    }

    #[test]
    fn test_shift_bands_validation() {
        assert!(ShiftBands::default().validate().is_ok());
        let bad = ShiftBands {
            a_start_hour: 15,
            b_start_hour: 7,
            c_start_hour: 23,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_shift_parsing() {
        assert_eq!("TURNO A".parse::<Shift>().unwrap(), Shift::A);
        assert_eq!("b".parse::<Shift>().unwrap(), Shift::B);
        assert!("D".parse::<Shift>().is_err());
    }

    #[test]
    fn test_window_bounds() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let window = AnalysisWindow::new(d("2024-03-01"), d("2024-03-31")).unwrap();
        assert_eq!(window.days(), 31);
        assert!(window.contains(d("2024-03-01")));
        assert!(window.contains(d("2024-03-31")));
        assert!(!window.contains(d("2024-04-01")));

        assert!(AnalysisWindow::new(d("2024-03-02"), d("2024-03-01")).is_err());
        assert!(AnalysisWindow::with_cap(d("2024-01-01"), d("2024-12-31"), 30).is_err());
    }

    #[test]
    fn test_empty_selection_means_all() {
        let selection: Selection<String> = Selection::from_values(Vec::new());
        assert!(selection.is_all());
        assert!(selection.matches(&"anything".to_string()));

        let filters = FilterSet::from_labels(&[], &["ALL".to_string()], &[]).unwrap();
        assert_eq!(filters, FilterSet::all());
    }
}
