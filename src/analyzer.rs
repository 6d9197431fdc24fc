//! Ticket Analysis Engine
//!
//! This module provides the façade that ties the analysis components together for one
//! loaded data set. It owns the records and the run parameters; every query selects
//! a slice with the [`PeriodFilter`] and hands it to one component.
//!
//! ## Core Functionality
//!
//! - **compare**: two-period comparison of any [`GroupBy`] dimension and [`Metric`]
//! - **idle**: per-operator idle time between consecutive services
//! - **convoy**: pickup bursts, critical hours, the weekday profile and the hourly backlog
//! - **heatmap**: pickups per date and hour of day
//! - **dwell**: share of tickets within the dwell-time target
//! - **gates** / **polyvalence**: staffing views
//! - **overview**: headline figures and the daily volume series of one window
//!
//! ## Usage Example
//!
//! ```rust
//! use ticket_analytics::{FilterSet, TicketAnalyzer};
//! use ticket_analytics::aggregate::{GroupBy, Metric};
//! use ticket_analytics::compare::CompareOrder;
//!
//! # fn example(events: Vec<ticket_analytics::TicketEvent>) -> anyhow::Result<()> {
//! let analyzer = TicketAnalyzer::new(events);
//! let jan = analyzer.window_from_str("2024-01-01", "2024-01-31")?;
//! let feb = analyzer.window_from_str("2024-02-01", "2024-02-29")?;
//!
//! let report = analyzer.compare(
//!     &jan,
//!     &feb,
//!     &FilterSet::all(),
//!     GroupBy::Client,
//!     Metric::ServiceSeconds,
//!     CompareOrder::CombinedVolume,
//! );
//! println!("{} groups compared", report.rows.len());
//! # Ok(())
//! # }
//! ```

use crate::aggregate::{aggregate_by, count_by, GroupBy, GroupKey, Metric};
use crate::burst::{detect_convoys, hourly_backlog, ConvoyReport, ConvoySettings, HourlyBacklog};
use crate::compare::{
    compare_ordered, top_improvements, top_regressions, CompareField, CompareOrder, CompareRow,
};
use crate::config::{Config, LimitsConfig};
use crate::dwell::{dwell_compliance, mean_seconds, DwellReport};
use crate::filter::{ExclusionTally, FilteredSlice, PeriodFilter};
use crate::heatmap::{build_heatmap, Heatmap};
use crate::idle::{detect_idle, IdleReport};
use crate::models::{AnalysisWindow, FilterSet, TicketEvent};
use crate::staffing::{gates_per_hour, polyvalence, HourlyGates, OperatorProfile};
use crate::timestamp_parser::TimestampParser;
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Rows listed in each of the improvement and regression rankings.
pub const DEFAULT_TOP_CHANGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub period_1: AnalysisWindow,
    pub period_2: AnalysisWindow,
    pub group_by: GroupBy,
    pub metric: Metric,
    pub rows: Vec<CompareRow<GroupKey>>,
    /// Ranked on the metric mean, using its natural polarity.
    pub top_improvements: Vec<CompareRow<GroupKey>>,
    pub top_regressions: Vec<CompareRow<GroupKey>>,
    pub excluded_period_1: ExclusionTally,
    pub excluded_period_2: ExclusionTally,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub pickups: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodOverview {
    pub window: AnalysisWindow,
    pub valid_records: usize,
    pub excluded: ExclusionTally,
    pub distinct_clients: usize,
    pub distinct_operations: usize,
    pub distinct_operators: usize,
    pub mean_wait_seconds: Option<f64>,
    pub mean_service_seconds: Option<f64>,
    pub mean_total_seconds: Option<f64>,
    /// Chronological; dates without pickups are absent.
    pub daily_volume: Vec<DailyVolume>,
}

/// Pickups per calendar date, oldest first.
pub fn daily_volume(records: &[&TicketEvent]) -> Vec<DailyVolume> {
    count_by(records, |r| r.pickup_date())
        .into_iter()
        .map(|(date, pickups)| DailyVolume { date, pickups })
        .collect()
}

fn distinct_count<F>(records: &[&TicketEvent], field: F) -> usize
where
    F: Fn(&TicketEvent) -> &str,
{
    records.iter().map(|&r| field(r)).collect::<BTreeSet<&str>>().len()
}

pub struct TicketAnalyzer {
    events: Vec<TicketEvent>,
    filter: PeriodFilter,
    convoy: ConvoySettings,
    limits: LimitsConfig,
    dwell_target_seconds: i64,
}

impl TicketAnalyzer {
    /// Analyzer with default parameters.
    pub fn new(events: Vec<TicketEvent>) -> Self {
        Self::from_config(events, &Config::default())
    }

    pub fn from_config(events: Vec<TicketEvent>, config: &Config) -> Self {
        Self {
            events,
            filter: PeriodFilter::new(config.validity),
            convoy: config.convoy,
            limits: config.limits,
            dwell_target_seconds: config.dwell.target_seconds(),
        }
    }

    pub fn events(&self) -> &[TicketEvent] {
        &self.events
    }

    /// A window checked against the configured maximum span.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Result<AnalysisWindow> {
        AnalysisWindow::with_cap(start, end, self.limits.max_window_days)
    }

    pub fn window_from_str(&self, start: &str, end: &str) -> Result<AnalysisWindow> {
        self.window(
            TimestampParser::parse_date(start)?,
            TimestampParser::parse_date(end)?,
        )
    }

    /// Pickup date range of the loaded data, if any.
    pub fn data_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.events.iter().map(|e| e.pickup_date()).min()?;
        let last = self.events.iter().map(|e| e.pickup_date()).max()?;
        Some((first, last))
    }

    pub fn select(&self, window: &AnalysisWindow, filters: &FilterSet) -> FilteredSlice<'_> {
        self.filter.filter(&self.events, window, filters)
    }

    pub fn compare(
        &self,
        period_1: &AnalysisWindow,
        period_2: &AnalysisWindow,
        filters: &FilterSet,
        group_by: GroupBy,
        metric: Metric,
        order: CompareOrder,
    ) -> ComparisonReport {
        let p1 = self.select(period_1, filters);
        let p2 = self.select(period_2, filters);

        let rows = compare_ordered(
            &aggregate_by(&p1.records, group_by, metric),
            &aggregate_by(&p2.records, group_by, metric),
            order,
        );

        let polarity = CompareField::Mean.default_polarity();
        let improvements = top_improvements(&rows, CompareField::Mean, polarity, DEFAULT_TOP_CHANGES)
            .into_iter()
            .cloned()
            .collect();
        let regressions = top_regressions(&rows, CompareField::Mean, polarity, DEFAULT_TOP_CHANGES)
            .into_iter()
            .cloned()
            .collect();

        debug!(
            period_1 = %period_1,
            period_2 = %period_2,
            groups = rows.len(),
            "Periods compared"
        );

        ComparisonReport {
            period_1: *period_1,
            period_2: *period_2,
            group_by,
            metric,
            rows,
            top_improvements: improvements,
            top_regressions: regressions,
            excluded_period_1: p1.excluded,
            excluded_period_2: p2.excluded,
        }
    }

    pub fn idle(&self, window: &AnalysisWindow, filters: &FilterSet) -> IdleReport {
        detect_idle(&self.select(window, filters).records)
    }

    pub fn convoy(&self, window: &AnalysisWindow, filters: &FilterSet) -> ConvoyReport {
        detect_convoys(&self.select(window, filters).records, &self.convoy)
    }

    /// Per-hour pickups, services started and carried-over backlog.
    pub fn backlog(&self, window: &AnalysisWindow, filters: &FilterSet) -> Vec<HourlyBacklog> {
        hourly_backlog(
            &self.select(window, filters).records,
            self.convoy.service_minutes,
        )
    }

    pub fn heatmap(&self, window: &AnalysisWindow, filters: &FilterSet) -> Heatmap {
        build_heatmap(
            &self.select(window, filters).records,
            Some(self.limits.max_heatmap_days),
        )
    }

    pub fn dwell(&self, window: &AnalysisWindow, filters: &FilterSet, group_by: GroupBy) -> DwellReport {
        dwell_compliance(
            &self.select(window, filters).records,
            group_by,
            self.dwell_target_seconds,
        )
    }

    pub fn gates(&self, window: &AnalysisWindow, filters: &FilterSet) -> Vec<HourlyGates> {
        gates_per_hour(&self.select(window, filters).records)
    }

    pub fn polyvalence(&self, window: &AnalysisWindow, filters: &FilterSet) -> Vec<OperatorProfile> {
        polyvalence(&self.select(window, filters).records)
    }

    pub fn overview(&self, window: &AnalysisWindow, filters: &FilterSet) -> PeriodOverview {
        let slice = self.select(window, filters);
        let records = &slice.records;

        PeriodOverview {
            window: *window,
            valid_records: records.len(),
            distinct_clients: distinct_count(records, |r| r.client.as_str()),
            distinct_operations: distinct_count(records, |r| r.operation.as_str()),
            distinct_operators: distinct_count(records, |r| r.operator.as_str()),
            mean_wait_seconds: mean_seconds(records, |r| r.wait_seconds),
            mean_service_seconds: mean_seconds(records, |r| r.service_seconds),
            mean_total_seconds: mean_seconds(records, |r| r.total_seconds),
            daily_volume: daily_volume(records),
            excluded: slice.excluded.clone(),
        }
    }
}
