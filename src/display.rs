//! Output Formatting and Display Management
//!
//! Renders analysis results either as colored terminal reports or as pretty JSON for
//! programmatic consumption.
//!
//! ## Conventions
//!
//! - Undefined statistics print as `-` and serialize as `null`
//! - Variations print with a sign; `new`, `gone` and `n/a` stand for the sentinel cases
//! - Improvements are green and regressions red, according to the metric's polarity
//!
//! ## Usage Example
//!
//! ```rust
//! use ticket_analytics::display::ReportDisplayManager;
//! use ticket_analytics::TicketAnalyzer;
//! use ticket_analytics::FilterSet;
//!
//! # fn example(analyzer: &TicketAnalyzer) -> anyhow::Result<()> {
//! let window = analyzer.window_from_str("2024-03-01", "2024-03-31")?;
//! let display = ReportDisplayManager::new(false);
//! display.display_overview(&analyzer.overview(&window, &FilterSet::all()));
//! # Ok(())
//! # }
//! ```

use crate::analyzer::{ComparisonReport, PeriodOverview};
use crate::burst::ConvoyReport;
use crate::compare::{CompareField, CompareRow, Polarity, Variation};
use crate::dwell::{DwellReport, DwellStats};
use crate::filter::ExclusionTally;
use crate::heatmap::{Heatmap, HOURS_PER_DAY};
use crate::idle::IdleReport;
use crate::staffing::{HourlyGates, OperatorProfile};
use colored::{ColoredString, Colorize};
use serde::Serialize;

const SHADES: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// `1h 02m 05s`, `12m 05s` or `45s`; `-` when undefined.
pub fn format_seconds(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "-".to_string();
    };
    let total = seconds.round() as i64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v))
        .unwrap_or_else(|| "-".to_string())
}

pub fn variation_label(variation: &Variation) -> String {
    match variation {
        Variation::Change(pct) => format!("{:+.1}%", pct),
        Variation::New => "new".to_string(),
        Variation::Discontinued => "gone".to_string(),
        Variation::Undefined => "n/a".to_string(),
    }
}

fn colored_variation(variation: &Variation, polarity: Polarity) -> ColoredString {
    let label = variation_label(variation);
    match (variation.percent(), polarity) {
        (Some(p), Polarity::HigherIsBetter) if p > 0.0 => label.bright_green(),
        (Some(p), Polarity::HigherIsBetter) if p < 0.0 => label.bright_red(),
        (Some(p), Polarity::LowerIsBetter) if p < 0.0 => label.bright_green(),
        (Some(p), Polarity::LowerIsBetter) if p > 0.0 => label.bright_red(),
        (Some(_), _) => label.bright_white(),
        (None, _) => label.bright_yellow(),
    }
}

/// Intensity glyph for a heatmap cell.
pub fn shade(count: usize, max: usize) -> char {
    if count == 0 || max == 0 {
        return SHADES[0];
    }
    let steps = SHADES.len() - 1;
    let index = ((count * steps) + max - 1) / max;
    SHADES[index.clamp(1, steps)]
}

pub struct ReportDisplayManager {
    json_output: bool,
}

impl ReportDisplayManager {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Prints `value` wrapped under `key` when JSON output is on. Returns whether it did.
    fn emit_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        if !self.json_output {
            return false;
        }
        let output = serde_json::to_value(value).map(|v| {
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(key.to_string(), v);
            serde_json::Value::Object(wrapper)
        });
        match output.and_then(|o| serde_json::to_string_pretty(&o)) {
            Ok(json_str) => println!("{}", json_str),
            Err(e) => eprintln!("Error serializing {} to JSON: {}", key, e),
        }
        true
    }

    fn header(&self, title: &str) {
        println!("\n{}", "=".repeat(80).bright_cyan());
        println!("{}", title.bright_white().bold());
        println!("{}", "=".repeat(80).bright_cyan());
    }

    fn exclusions(&self, label: &str, tally: &ExclusionTally) {
        if tally.total() == 0 {
            return;
        }
        let detail: Vec<String> = tally
            .by_reason
            .iter()
            .map(|(reason, count)| format!("{:?}: {}", reason, count))
            .collect();
        println!(
            "   {} {} records excluded ({})",
            label.bright_yellow(),
            tally.total().to_string().bright_white(),
            detail.join(", ")
        );
    }

    pub fn display_comparison(&self, report: &ComparisonReport) {
        if self.emit_json("comparison", report) {
            return;
        }

        self.header(&format!(
            "Period Comparison by {:?} - {} (P1 {} vs P2 {})",
            report.group_by,
            report.metric.label(),
            report.period_1,
            report.period_2
        ));
        self.exclusions("P1", &report.excluded_period_1);
        self.exclusions("P2", &report.excluded_period_2);
        println!();

        println!(
            "{:<28} {:>7} {:>7} {:>9} {:>14} {:>14} {:>9}",
            "Group", "P1", "P2", "Δ count", "Mean P1", "Mean P2", "Δ mean"
        );
        let mean_polarity = CompareField::Mean.default_polarity();
        let count_polarity = CompareField::Count.default_polarity();
        for row in &report.rows {
            println!(
                "{:<28} {:>7} {:>7} {:>9} {:>14} {:>14} {:>9}",
                row.key.to_string().bright_cyan(),
                row.count_p1,
                row.count_p2,
                colored_variation(&row.count_variation, count_polarity),
                format_seconds(row.mean_p1),
                format_seconds(row.mean_p2),
                colored_variation(&row.mean_variation, mean_polarity),
            );
        }

        self.ranking("Top improvements", &report.top_improvements, mean_polarity);
        self.ranking("Top regressions", &report.top_regressions, mean_polarity);
    }

    fn ranking<K: std::fmt::Display>(&self, title: &str, rows: &[CompareRow<K>], polarity: Polarity) {
        if rows.is_empty() {
            return;
        }
        println!("\n{} {}:", "📈".bright_yellow(), title.bright_white().bold());
        for row in rows {
            println!(
                "   {}: {} → {} ({})",
                row.key.to_string().bright_cyan(),
                format_seconds(row.mean_p1),
                format_seconds(row.mean_p2),
                colored_variation(&row.mean_variation, polarity)
            );
        }
    }

    pub fn display_idle(&self, report: &IdleReport) {
        if self.emit_json("idle", report) {
            return;
        }

        self.header("Operator Idle Time");
        let ranking = report.ranking();
        if ranking.is_empty() {
            println!("No operator has measurable idle time in this selection.");
        }
        for (position, operator) in ranking.iter().enumerate() {
            println!(
                "{:>3}. {:<30} {:>12} ({} gaps over {} services, {} days)",
                position + 1,
                operator.operator.bright_cyan(),
                format_seconds(operator.mean_idle_seconds).bright_white().bold(),
                operator.gap_count,
                operator.services,
                operator.daily.len()
            );
        }

        let undefined = report.undefined();
        if !undefined.is_empty() {
            let names: Vec<&str> = undefined.iter().map(|o| o.operator.as_str()).collect();
            println!(
                "\n{} No measurable gaps: {}",
                "ℹ".bright_blue(),
                names.join(", ")
            );
        }
    }

    pub fn display_convoy(&self, report: &ConvoyReport) {
        if self.emit_json("convoy", report) {
            return;
        }

        self.header(&format!(
            "Pickup Bursts ({}-minute buckets)",
            report.bucket_minutes
        ));
        println!(
            "\n{} {} buckets • mean {} • threshold {} • {} bursts",
            "📊".bright_yellow(),
            report.buckets.to_string().bright_white().bold(),
            report
                .bucket_summary
                .mean
                .map(|m| format!("{:.2}", m))
                .unwrap_or_else(|| "-".to_string()),
            report
                .threshold
                .map(|t| format!("{:.2}", t))
                .unwrap_or_else(|| "-".to_string())
                .bright_yellow(),
            report.total_bursts.to_string().bright_red().bold()
        );

        for burst in &report.bursts {
            println!(
                "   {} {} {} pickups{}",
                burst.date.to_string().bright_white().bold(),
                burst.start.format("%H:%M").to_string().bright_cyan(),
                burst.pickups.to_string().bright_red().bold(),
                burst
                    .sigma_above_mean
                    .map(|s| format!(" (+{:.1}σ)", s))
                    .unwrap_or_default()
            );
        }

        if !report.critical_hours.is_empty() {
            println!("\n{} Critical hours:", "⏰".bright_yellow());
            for hour in &report.critical_hours {
                println!(
                    "   {:02}:00 - {} pickups",
                    hour.hour,
                    hour.pickups.to_string().bright_red()
                );
            }
        }

        println!("\n{} Weekday profile (mean pickups per day):", "📅".bright_blue());
        for day in &report.weekday_profile {
            println!(
                "   {:<4} {:>8} ({} days)",
                day.weekday.to_string(),
                day.mean_pickups
                    .map(|m| format!("{:.1}", m))
                    .unwrap_or_else(|| "-".to_string()),
                day.days_observed
            );
        }

        if report.backlog.iter().any(|h| h.pickups > 0 || h.served > 0) {
            println!("\n{} Hourly backlog:", "📥".bright_blue());
            println!("   hour   pulled  served pending    late");
            for hour in report
                .backlog
                .iter()
                .filter(|h| h.pickups > 0 || h.served > 0 || h.pending > 0)
            {
                let pending = format!("{:>7}", hour.pending);
                println!(
                    "   {:02}:00 {:>7} {:>7} {} {:>7}",
                    hour.hour,
                    hour.pickups,
                    hour.served,
                    if hour.pending > 0 {
                        pending.bright_red()
                    } else {
                        pending.normal()
                    },
                    hour.unviable_pickups
                );
            }
        }
    }

    pub fn display_heatmap(&self, heatmap: &Heatmap) {
        if self.emit_json("heatmap", heatmap) {
            return;
        }

        self.header("Pickups by Date and Hour");
        if heatmap.truncated {
            println!(
                "{} Showing the latest {} of {} dates",
                "⚠".bright_yellow(),
                heatmap.rows.len(),
                heatmap.available_dates
            );
        }

        let hours: String = (0..HOURS_PER_DAY).map(|h| format!("{:>3}", h)).collect();
        println!("{:<11}{} {:>7}", "", hours.bright_cyan(), "Total");

        let max = heatmap.max_cell();
        for row in &heatmap.rows {
            let cells: String = row
                .hours
                .iter()
                .map(|&c| format!("{:>3}", shade(c, max)))
                .collect();
            println!("{:<11}{} {:>7}", row.date.to_string(), cells, row.total());
        }

        println!(
            "\n{} {} pickups, busiest cell {}",
            "📊".bright_yellow(),
            heatmap.total().to_string().bright_white().bold(),
            max
        );
    }

    pub fn display_dwell(&self, report: &DwellReport) {
        if self.emit_json("dwell", report) {
            return;
        }

        self.header(&format!(
            "Dwell Time Compliance (target {})",
            format_seconds(Some(report.target_seconds as f64))
        ));
        let line = |label: String, stats: &DwellStats| {
            println!(
                "{:<28} {:>7} {:>8} {:>12} {:>12} {:>12}",
                label,
                stats.records,
                format_percent(stats.compliance_percent),
                format_seconds(stats.mean_wait_seconds),
                format_seconds(stats.mean_service_seconds),
                format_seconds(stats.mean_total_seconds)
            );
        };

        println!(
            "{:<28} {:>7} {:>8} {:>12} {:>12} {:>12}",
            "Group", "Tickets", "Within", "Wait", "Service", "Total"
        );
        for (key, stats) in &report.groups {
            line(key.to_string(), stats);
        }
        println!("{}", "-".repeat(84).bright_cyan());
        line("All".to_string(), &report.overall);
    }

    pub fn display_gates(&self, gates: &[HourlyGates]) {
        if self.emit_json("gates", &gates) {
            return;
        }

        self.header("Active Gates per Hour");
        println!("{:<6} {:>6} {:>9} {:>14}", "Hour", "Gates", "Services", "Per gate");
        for hour in gates {
            println!(
                "{:<6} {:>6} {:>9} {:>14}",
                format!("{:02}h", hour.hour),
                hour.active_gates,
                hour.services,
                hour.services_per_gate
                    .map(|v| format!("{:.1}", v))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }

    pub fn display_polyvalence(&self, profiles: &[OperatorProfile]) {
        if self.emit_json("polyvalence", &profiles) {
            return;
        }

        self.header("Operator Polyvalence");
        for profile in profiles {
            println!(
                "{}: {} operations, {} clients, {} services, mean {}, mostly shift {}",
                profile.operator.bright_cyan().bold(),
                profile.distinct_operations.to_string().bright_white().bold(),
                profile.distinct_clients,
                profile.services,
                format_seconds(profile.mean_service_seconds),
                profile
                    .predominant_shift
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            for (operation, count) in &profile.services_by_operation {
                println!("   {}: {}", operation, count);
            }
        }
    }

    pub fn display_overview(&self, overview: &PeriodOverview) {
        if self.emit_json("overview", overview) {
            return;
        }

        self.header(&format!("Period Overview {}", overview.window));
        println!(
            "\n{} {} valid tickets • {} clients • {} operations • {} operators",
            "📊".bright_yellow(),
            overview.valid_records.to_string().bright_white().bold(),
            overview.distinct_clients,
            overview.distinct_operations,
            overview.distinct_operators
        );
        self.exclusions("", &overview.excluded);
        println!(
            "   Mean wait {} • service {} • total {}",
            format_seconds(overview.mean_wait_seconds).bright_green(),
            format_seconds(overview.mean_service_seconds).bright_green(),
            format_seconds(overview.mean_total_seconds).bright_green()
        );

        println!("\n{} Daily volume:", "📅".bright_blue());
        for day in &overview.daily_volume {
            println!(
                "   {}: {}",
                day.date.to_string().bright_white().bold(),
                day.pickups
            );
        }
    }
}
