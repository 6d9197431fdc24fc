//! Burst (Convoy) Detector
//!
//! Flags time windows where ticket pickups concentrate abnormally.
//!
//! Pickups are counted per fixed bucket (15 minutes by default) keyed by calendar
//! date and bucket start time. A bucket is a burst when its count is strictly
//! greater than `mean + sample stddev` of all non-empty bucket counts of the
//! analyzed slice. The same rule, applied independently to pickup totals per hour
//! of day, marks critical hours. The threshold is always recomputed from the slice
//! it is given.
//!
//! [`hourly_backlog`] is the companion view: per hour of day, pickups against
//! services started, with the unserved remainder carried into the next hour.

use crate::aggregate::count_by;
use crate::models::TicketEvent;
use crate::stats::{exceeds_mean_plus_stddev, mean, Summary};
use anyhow::Result;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvoySettings {
    pub bucket_minutes: u32,
    pub top_k: usize,
    /// Expected service length; pickups later in the hour than this cannot be
    /// served within it.
    pub service_minutes: u32,
}

impl Default for ConvoySettings {
    fn default() -> Self {
        Self {
            bucket_minutes: 15,
            top_k: 10,
            service_minutes: 8,
        }
    }
}

impl ConvoySettings {
    pub fn validate(&self) -> Result<()> {
        if self.bucket_minutes == 0 || 60 % self.bucket_minutes != 0 {
            anyhow::bail!(
                "Bucket size must divide an hour evenly, got {} minutes",
                self.bucket_minutes
            );
        }
        if self.service_minutes > 60 {
            anyhow::bail!(
                "Service length must fit in an hour, got {} minutes",
                self.service_minutes
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BucketKey {
    pub date: NaiveDate,
    pub start: NaiveTime,
}

impl BucketKey {
    pub fn of(at: NaiveDateTime, bucket_minutes: u32) -> Self {
        let floored = at.minute() - at.minute() % bucket_minutes.max(1);
        Self {
            date: at.date(),
            start: NaiveTime::from_hms_opt(at.hour(), floored, 0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstBucket {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub pickups: usize,
    pub sigma_above_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalHour {
    pub hour: u32,
    pub pickups: usize,
    pub sigma_above_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayDemand {
    pub weekday: Weekday,
    pub days_observed: usize,
    /// Mean pickups per observed day of this weekday.
    pub mean_pickups: Option<f64>,
}

/// One hour of the backlog view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyBacklog {
    pub hour: u32,
    /// Tickets pulled in this hour.
    pub pickups: usize,
    /// Services started in this hour.
    pub served: usize,
    /// Tickets still waiting when the hour ends, carried over from earlier hours.
    pub pending: usize,
    /// Pickups early enough in the hour to be served before it ends.
    pub viable_pickups: usize,
    pub unviable_pickups: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvoyReport {
    pub bucket_minutes: u32,
    pub buckets: usize,
    pub bucket_summary: Summary,
    pub threshold: Option<f64>,
    pub total_bursts: usize,
    /// Bursts with the most pickups first, truncated to `top_k`.
    pub bursts: Vec<BurstBucket>,
    pub hourly_threshold: Option<f64>,
    pub critical_hours: Vec<CriticalHour>,
    /// Monday first.
    pub weekday_profile: Vec<WeekdayDemand>,
    /// Hours 0 to 23.
    pub backlog: Vec<HourlyBacklog>,
}

/// Marks the counts that are strictly above `mean + sample stddev` of the series.
pub fn flag_bursts(counts: &[u64]) -> Vec<bool> {
    let n = counts.len() as u64;
    let sum: u64 = counts.iter().sum();
    let sum_sq: u64 = counts.iter().map(|c| c * c).sum();
    counts
        .iter()
        .map(|&c| exceeds_mean_plus_stddev(c, n, sum, sum_sq))
        .collect()
}

fn summarize(counts: &[u64]) -> Summary {
    let as_f64: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    Summary::of(&as_f64)
}

pub fn weekdays_from_monday() -> [Weekday; 7] {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}

/// Mean pickups per weekday over the dates present in `records`.
pub fn weekday_profile(records: &[&TicketEvent]) -> Vec<WeekdayDemand> {
    let per_date = count_by(records, |r| r.pickup_date());
    let mut per_weekday: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (date, count) in per_date {
        per_weekday
            .entry(date.weekday().num_days_from_monday())
            .or_default()
            .push(count as f64);
    }

    weekdays_from_monday()
        .into_iter()
        .map(|weekday| {
            let days = per_weekday
                .get(&weekday.num_days_from_monday())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            WeekdayDemand {
                weekday,
                days_observed: days.len(),
                mean_pickups: mean(days),
            }
        })
        .collect()
}

/// Dense per-hour backlog. `pending` starts at zero at hour 0 and never goes
/// negative: `pending = max(0, pending_prev + pickups - served)`.
pub fn hourly_backlog(records: &[&TicketEvent], service_minutes: u32) -> Vec<HourlyBacklog> {
    let latest_viable_minute = 60u32.saturating_sub(service_minutes);
    let pickups = count_by(records, |r| r.pickup_hour());
    let served = count_by(records, |r| r.service_start_at.hour());
    let viable = count_by(
        &records
            .iter()
            .copied()
            .filter(|r| r.pickup_at.minute() <= latest_viable_minute)
            .collect::<Vec<_>>(),
        |r| r.pickup_hour(),
    );

    let mut pending = 0usize;
    (0..24u32)
        .map(|hour| {
            let pickups = pickups.get(&hour).copied().unwrap_or(0);
            let served = served.get(&hour).copied().unwrap_or(0);
            let viable_pickups = viable.get(&hour).copied().unwrap_or(0);
            pending = (pending + pickups).saturating_sub(served);
            HourlyBacklog {
                hour,
                pickups,
                served,
                pending,
                viable_pickups,
                unviable_pickups: pickups - viable_pickups,
            }
        })
        .collect()
}

pub fn detect_convoys(records: &[&TicketEvent], settings: &ConvoySettings) -> ConvoyReport {
    let per_bucket = count_by(records, |r| BucketKey::of(r.pickup_at, settings.bucket_minutes));
    let bucket_counts: Vec<u64> = per_bucket.values().map(|&c| c as u64).collect();
    let bucket_summary = summarize(&bucket_counts);

    let mut bursts: Vec<BurstBucket> = per_bucket
        .iter()
        .zip(flag_bursts(&bucket_counts))
        .filter(|(_, flagged)| *flagged)
        .map(|((key, &count), _)| BurstBucket {
            date: key.date,
            start: key.start,
            pickups: count,
            sigma_above_mean: bucket_summary.sigma_above_mean(count as f64),
        })
        .collect();
    bursts.sort_by(|a, b| {
        b.pickups
            .cmp(&a.pickups)
            .then_with(|| (a.date, a.start).cmp(&(b.date, b.start)))
    });
    let total_bursts = bursts.len();
    bursts.truncate(settings.top_k);

    let per_hour = count_by(records, |r| r.pickup_hour());
    let hour_counts: Vec<u64> = per_hour.values().map(|&c| c as u64).collect();
    let hour_summary = summarize(&hour_counts);
    let critical_hours: Vec<CriticalHour> = per_hour
        .iter()
        .zip(flag_bursts(&hour_counts))
        .filter(|(_, flagged)| *flagged)
        .map(|((&hour, &count), _)| CriticalHour {
            hour,
            pickups: count,
            sigma_above_mean: hour_summary.sigma_above_mean(count as f64),
        })
        .collect();

    tracing::debug!(
        buckets = bucket_counts.len(),
        bursts = total_bursts,
        critical_hours = critical_hours.len(),
        "Convoy detection finished"
    );

    ConvoyReport {
        bucket_minutes: settings.bucket_minutes,
        buckets: bucket_counts.len(),
        threshold: bucket_summary.upper_threshold(),
        bucket_summary,
        total_bursts,
        bursts,
        hourly_threshold: hour_summary.upper_threshold(),
        critical_hours,
        weekday_profile: weekday_profile(records),
        backlog: hourly_backlog(records, settings.service_minutes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawTicket, ShiftBands, TicketStatus};

    fn pickup(at: &str) -> TicketEvent {
        let pickup_at = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").unwrap();
        RawTicket {
            id: at.to_string(),
            client: "ACME".to_string(),
            operation: "LOAD".to_string(),
            operator: "op1".to_string(),
            pickup_at,
            service_start_at: pickup_at + chrono::Duration::minutes(2),
            service_end_at: pickup_at + chrono::Duration::minutes(10),
            status: TicketStatus::Served,
        }
        .into_event(&ShiftBands::default())
    }

    #[test]
    fn test_bucket_key_floors_to_interval() {
        let at = NaiveDateTime::parse_from_str("2024-03-05 08:29:59", "%Y-%m-%d %H:%M:%S").unwrap();
        let key = BucketKey::of(at, 15);
        assert_eq!(key.start, NaiveTime::from_hms_opt(8, 15, 0).unwrap());
        assert_eq!(key.date, at.date());
    }

    #[test]
    fn test_flag_bursts() {
        assert_eq!(flag_bursts(&[1, 1, 1, 1, 8]), vec![false, false, false, false, true]);
        assert_eq!(flag_bursts(&[3, 3, 3]), vec![false, false, false]);
        assert_eq!(flag_bursts(&[7]), vec![false]);
        assert!(flag_bursts(&[]).is_empty());
    }

    #[test]
    fn test_detects_convoy_bucket() {
        let mut records = vec![
            pickup("2024-03-04 08:01:00"),
            pickup("2024-03-04 09:01:00"),
            pickup("2024-03-04 10:01:00"),
            pickup("2024-03-04 11:01:00"),
        ];
        for minute in 0..6 {
            records.push(pickup(&format!("2024-03-04 14:{:02}:00", 30 + minute)));
        }
        let refs: Vec<&TicketEvent> = records.iter().collect();
        let report = detect_convoys(&refs, &ConvoySettings::default());

        assert_eq!(report.buckets, 5);
        assert_eq!(report.total_bursts, 1);
        assert_eq!(report.bursts[0].pickups, 6);
        assert_eq!(report.bursts[0].start, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert!(report.bursts[0].sigma_above_mean.unwrap() > 1.0);

        assert_eq!(report.critical_hours.len(), 1);
        assert_eq!(report.critical_hours[0].hour, 14);
    }

    #[test]
    fn test_top_k_truncates_but_keeps_total() {
        let mut records = Vec::new();
        for day in 4..=8 {
            records.push(pickup(&format!("2024-03-{:02} 07:00:00", day)));
            records.push(pickup(&format!("2024-03-{:02} 09:00:00", day)));
            records.push(pickup(&format!("2024-03-{:02} 11:00:00", day)));
        }
        for day in [4, 5, 6] {
            for i in 0..5 {
                records.push(pickup(&format!("2024-03-{:02} 16:0{}:00", day, i)));
            }
        }
        let refs: Vec<&TicketEvent> = records.iter().collect();
        let settings = ConvoySettings {
            top_k: 2,
            ..Default::default()
        };
        let report = detect_convoys(&refs, &settings);
        assert_eq!(report.total_bursts, 3);
        assert_eq!(report.bursts.len(), 2);
        assert_eq!(report.bursts[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn test_weekday_profile_starts_monday() {
        let records = vec![
            // Monday twice (two dates), Wednesday once
            pickup("2024-03-04 08:00:00"),
            pickup("2024-03-04 09:00:00"),
            pickup("2024-03-11 08:00:00"),
            pickup("2024-03-06 08:00:00"),
        ];
        let refs: Vec<&TicketEvent> = records.iter().collect();
        let profile = weekday_profile(&refs);

        assert_eq!(profile.len(), 7);
        assert_eq!(profile[0].weekday, Weekday::Mon);
        assert_eq!(profile[0].days_observed, 2);
        assert_eq!(profile[0].mean_pickups, Some(1.5));
        assert_eq!(profile[2].weekday, Weekday::Wed);
        assert_eq!(profile[2].mean_pickups, Some(1.0));
        assert_eq!(profile[6].weekday, Weekday::Sun);
        assert_eq!(profile[6].mean_pickups, None);
    }

    #[test]
    fn test_empty_slice() {
        let report = detect_convoys(&[], &ConvoySettings::default());
        assert_eq!(report.buckets, 0);
        assert_eq!(report.threshold, None);
        assert!(report.bursts.is_empty());
        assert!(report.critical_hours.is_empty());
        assert!(report.weekday_profile.iter().all(|d| d.mean_pickups.is_none()));
        assert_eq!(report.backlog.len(), 24);
    }

    #[test]
    fn test_settings_validation() {
        assert!(ConvoySettings::default().validate().is_ok());
        let bad = ConvoySettings {
            bucket_minutes: 7,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = ConvoySettings {
            service_minutes: 61,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    fn served_at(at: &str, start: &str) -> TicketEvent {
        let mut event = pickup(at);
        event.service_start_at = NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S").unwrap();
        event
    }

    #[test]
    fn test_backlog_carries_over_between_hours() {
        // Three pulled at 08h, one served at 08h, two at 09h, one more pulled at 09h.
        let records = vec![
            served_at("2024-03-04 08:05:00", "2024-03-04 08:10:00"),
            served_at("2024-03-04 08:20:00", "2024-03-04 09:05:00"),
            served_at("2024-03-04 08:40:00", "2024-03-04 09:30:00"),
            served_at("2024-03-04 09:10:00", "2024-03-04 10:00:00"),
        ];
        let refs: Vec<&TicketEvent> = records.iter().collect();
        let backlog = hourly_backlog(&refs, 8);

        assert_eq!(backlog.len(), 24);
        assert_eq!((backlog[8].pickups, backlog[8].served, backlog[8].pending), (3, 1, 2));
        assert_eq!((backlog[9].pickups, backlog[9].served, backlog[9].pending), (1, 2, 1));
        assert_eq!((backlog[10].pickups, backlog[10].served, backlog[10].pending), (0, 1, 0));
        assert_eq!(backlog[23].pending, 0);
    }

    #[test]
    fn test_backlog_floors_at_zero() {
        // More services than waiting tickets at 07h.
        let records = vec![
            served_at("2024-03-04 10:05:00", "2024-03-04 07:10:00"),
            served_at("2024-03-04 10:06:00", "2024-03-04 07:20:00"),
            served_at("2024-03-04 07:30:00", "2024-03-04 07:35:00"),
        ];
        let refs: Vec<&TicketEvent> = records.iter().collect();
        let backlog = hourly_backlog(&refs, 8);

        assert_eq!((backlog[7].pickups, backlog[7].served, backlog[7].pending), (1, 3, 0));
        assert_eq!(backlog[10].pending, 2);
        assert_eq!(backlog[11].pending, 2);
    }

    #[test]
    fn test_backlog_viability_cutoff() {
        let records = vec![
            pickup("2024-03-04 08:00:00"),
            pickup("2024-03-04 08:52:00"),
            pickup("2024-03-04 08:53:00"),
            pickup("2024-03-04 08:59:59"),
        ];
        let refs: Vec<&TicketEvent> = records.iter().collect();
        let backlog = hourly_backlog(&refs, 8);

        assert_eq!(backlog[8].viable_pickups, 2);
        assert_eq!(backlog[8].unviable_pickups, 2);
    }

    #[test]
    fn test_backlog_of_empty_slice() {
        let backlog = hourly_backlog(&[], 8);
        assert_eq!(backlog.len(), 24);
        assert!(backlog
            .iter()
            .enumerate()
            .all(|(h, b)| b.hour == h as u32 && b.pickups == 0 && b.served == 0 && b.pending == 0));
    }
}
