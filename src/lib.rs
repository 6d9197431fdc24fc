//! Ticket Analytics Library
//!
//! An analytics engine for service-queue ticket logs. Each ticket records when it was
//! pulled, when service started and ended, who served it and for which client and
//! operation. The library turns a set of such records into comparative and
//! operational insight.
//!
//! ## Core Features
//!
//! - **Period comparison**: full outer join of two period aggregates with explicit
//!   variation sentinels instead of `NaN` or infinities
//! - **Idle time**: per-operator gaps between consecutive services
//! - **Burst detection**: self-calibrating `mean + stddev` threshold over time buckets
//! - **Heatmaps**: dense date by hour matrices of pickups
//! - **Staffing views**: dwell-time compliance, gates per hour, operator polyvalence
//!
//! ## Architecture Overview
//!
//! - [`models`] - Ticket records, derived durations, shifts, windows and filters
//! - [`filter`] - Period filter with validity rules and exclusion tallies
//! - [`aggregate`] - Count, mean and stddev per group
//! - [`compare`] - Two-period comparison and top-N rankings
//! - [`idle`] - Idle-time detector
//! - [`burst`] - Burst (convoy) detector, critical hours, weekday profile
//! - [`heatmap`] - Date by hour pickup matrix
//! - [`dwell`] / [`staffing`] - Compliance and staffing views
//! - [`analyzer`] - [`TicketAnalyzer`] façade over all of the above
//! - [`parser`] - JSON-lines ingestion
//! - [`display`] - Terminal and JSON reports
//! - [`config`] / [`logging`] - Configuration and structured logging
//!
//! ## Main Entry Point
//!
//! ```rust
//! use ticket_analytics::{FilterSet, TicketAnalyzer};
//! use ticket_analytics::parser::TicketFileParser;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let parsed = TicketFileParser::default().load_events(Path::new("tickets.jsonl"))?;
//! let analyzer = TicketAnalyzer::new(parsed.output);
//! let window = analyzer.window_from_str("2024-03-01", "2024-03-31")?;
//!
//! let convoys = analyzer.convoy(&window, &FilterSet::all());
//! println!("{} bursts", convoys.total_bursts);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod analyzer;
pub mod burst;
pub mod compare;
pub mod config;
pub mod display;
pub mod dwell;
pub mod filter;
pub mod heatmap;
pub mod idle;
pub mod logging;
pub mod models;
pub mod parser;
pub mod staffing;
pub mod stats;
pub mod timestamp_parser;

pub use analyzer::TicketAnalyzer;
pub use models::*;
