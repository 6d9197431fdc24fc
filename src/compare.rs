//! Comparative Engine
//!
//! Joins two period aggregates on their group key and reports how each group's
//! volume and mean changed. The join is a full outer join: a group seen in only one
//! period still gets a row, with the missing side's count treated as 0 and its mean
//! as undefined.
//!
//! ## Variation policy
//!
//! | period 1      | period 2      | result                    |
//! |---------------|---------------|---------------------------|
//! | `v1 > 0`      | `v2`          | `Change((v2 - v1) / v1 * 100)` |
//! | `0`           | `0`           | `Change(0.0)`             |
//! | `0` or absent | `> 0`         | `New`                     |
//! | present       | absent        | `Discontinued`            |
//! | absent        | absent        | `Undefined`               |
//!
//! Counts are never absent (a missing group counts 0), so a group that disappears
//! reports a count variation of exactly `-100%` and a mean variation of
//! `Discontinued`.

use crate::aggregate::{Aggregate, GroupStats};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Percentage change between two periods, or the reason it has no finite value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum Variation {
    Change(f64),
    /// Nothing to compare against in period 1.
    New,
    /// Present in period 1, absent in period 2.
    Discontinued,
    Undefined,
}

impl Variation {
    pub fn between(before: Option<f64>, after: Option<f64>) -> Self {
        match (before, after) {
            (Some(b), Some(a)) if b > 0.0 => Variation::Change((a - b) / b * 100.0),
            (Some(b), Some(a)) if b == 0.0 && a == 0.0 => Variation::Change(0.0),
            (Some(b), Some(a)) if b == 0.0 && a > 0.0 => Variation::New,
            (None, Some(_)) => Variation::New,
            (Some(_), None) => Variation::Discontinued,
            _ => Variation::Undefined,
        }
    }

    /// Finite percentage, if there is one.
    pub fn percent(&self) -> Option<f64> {
        match self {
            Variation::Change(pct) => Some(*pct),
            _ => None,
        }
    }
}

/// Whether a larger value of a metric is good or bad news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    LowerIsBetter,
    HigherIsBetter,
}

impl Polarity {
    /// Positive when the change is an improvement under this polarity.
    fn gain(&self, pct: f64) -> f64 {
        match self {
            Polarity::HigherIsBetter => pct,
            Polarity::LowerIsBetter => -pct,
        }
    }
}

/// Which side of a comparison row a ranking looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareField {
    Count,
    Mean,
}

impl CompareField {
    /// Volumes improve upward, durations downward.
    pub fn default_polarity(&self) -> Polarity {
        match self {
            CompareField::Count => Polarity::HigherIsBetter,
            CompareField::Mean => Polarity::LowerIsBetter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOrder {
    /// Largest `count_p1 + count_p2` first, ties by key.
    #[default]
    CombinedVolume,
    Key,
}

impl FromStr for CompareOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "volume" | "combined_volume" => Ok(CompareOrder::CombinedVolume),
            "key" => Ok(CompareOrder::Key),
            _ => anyhow::bail!("Unknown ordering: {}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareRow<K> {
    pub key: K,
    pub count_p1: usize,
    pub count_p2: usize,
    pub mean_p1: Option<f64>,
    pub mean_p2: Option<f64>,
    pub count_variation: Variation,
    pub mean_variation: Variation,
}

impl<K> CompareRow<K> {
    fn join(key: K, p1: Option<&GroupStats>, p2: Option<&GroupStats>) -> Self {
        let count_p1 = p1.map(|s| s.count).unwrap_or(0);
        let count_p2 = p2.map(|s| s.count).unwrap_or(0);
        let mean_p1 = p1.and_then(|s| s.mean);
        let mean_p2 = p2.and_then(|s| s.mean);

        Self {
            key,
            count_p1,
            count_p2,
            mean_p1,
            mean_p2,
            count_variation: Variation::between(Some(count_p1 as f64), Some(count_p2 as f64)),
            mean_variation: Variation::between(mean_p1, mean_p2),
        }
    }

    pub fn combined_count(&self) -> usize {
        self.count_p1 + self.count_p2
    }

    pub fn variation(&self, field: CompareField) -> Variation {
        match field {
            CompareField::Count => self.count_variation,
            CompareField::Mean => self.mean_variation,
        }
    }
}

pub fn compare<K: Ord + Clone>(p1: &Aggregate<K>, p2: &Aggregate<K>) -> Vec<CompareRow<K>> {
    compare_ordered(p1, p2, CompareOrder::default())
}

pub fn compare_ordered<K: Ord + Clone>(
    p1: &Aggregate<K>,
    p2: &Aggregate<K>,
    order: CompareOrder,
) -> Vec<CompareRow<K>> {
    let keys: BTreeSet<&K> = p1.keys().chain(p2.keys()).collect();

    let mut rows: Vec<CompareRow<K>> = keys
        .into_iter()
        .map(|key| CompareRow::join(key.clone(), p1.get(key), p2.get(key)))
        .collect();

    if order == CompareOrder::CombinedVolume {
        // Stable sort keeps key order among equal volumes.
        rows.sort_by(|a, b| b.combined_count().cmp(&a.combined_count()));
    }

    rows
}

/// Rows whose `field` improved, best first. Rows without a finite variation are
/// not ranked.
pub fn top_improvements<K: Ord>(
    rows: &[CompareRow<K>],
    field: CompareField,
    polarity: Polarity,
    n: usize,
) -> Vec<&CompareRow<K>> {
    rank(rows, field, polarity, n, Ordering::Greater)
}

/// Rows whose `field` got worse, worst first.
pub fn top_regressions<K: Ord>(
    rows: &[CompareRow<K>],
    field: CompareField,
    polarity: Polarity,
    n: usize,
) -> Vec<&CompareRow<K>> {
    rank(rows, field, polarity, n, Ordering::Less)
}

fn rank<K: Ord>(
    rows: &[CompareRow<K>],
    field: CompareField,
    polarity: Polarity,
    n: usize,
    direction: Ordering,
) -> Vec<&CompareRow<K>> {
    let mut ranked: Vec<(f64, &CompareRow<K>)> = rows
        .iter()
        .filter_map(|row| {
            let gain = polarity.gain(row.variation(field).percent()?);
            (gain.partial_cmp(&0.0) == Some(direction)).then_some((gain, row))
        })
        .collect();

    ranked.sort_by(|(ga, ra), (gb, rb)| {
        let by_gain = match direction {
            Ordering::Greater => gb.total_cmp(ga),
            _ => ga.total_cmp(gb),
        };
        by_gain.then_with(|| ra.key.cmp(&rb.key))
    });

    ranked.into_iter().take(n).map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stats(count: usize, mean: f64) -> GroupStats {
        GroupStats {
            count,
            mean: Some(mean),
            stddev: Some(0.0),
        }
    }

    fn agg(entries: &[(&str, usize, f64)]) -> Aggregate<String> {
        entries
            .iter()
            .map(|(k, c, m)| (k.to_string(), stats(*c, *m)))
            .collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn test_variation_scenario() {
        let rows = compare(&agg(&[("clientA", 10, 120.0)]), &agg(&[("clientA", 15, 100.0)]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count_variation, Variation::Change(50.0));
        let pct = rows[0].mean_variation.percent().unwrap();
        assert!((pct - (-16.666_666_666_666_7)).abs() < 1e-9);
    }

    #[test]
    fn test_group_missing_in_period_two() {
        let rows = compare(&agg(&[("clientB", 5, 300.0)]), &agg(&[]));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.count_p2, 0);
        assert_eq!(row.mean_p2, None);
        assert_eq!(row.count_variation, Variation::Change(-100.0));
        assert_eq!(row.mean_variation, Variation::Discontinued);
    }

    #[test]
    fn test_group_missing_in_period_one() {
        let rows = compare(&agg(&[]), &agg(&[("clientC", 7, 90.0)]));
        let row = &rows[0];
        assert_eq!(row.count_p1, 0);
        assert_eq!(row.count_variation, Variation::New);
        assert_eq!(row.mean_variation, Variation::New);
    }

    #[test]
    fn test_zero_to_zero_is_no_change() {
        assert_eq!(Variation::between(Some(0.0), Some(0.0)), Variation::Change(0.0));
        assert_eq!(Variation::between(None, None), Variation::Undefined);
    }

    #[test]
    fn test_outer_join_completeness() {
        let p1 = agg(&[("a", 1, 1.0), ("b", 2, 1.0)]);
        let p2 = agg(&[("b", 3, 1.0), ("c", 4, 1.0)]);
        let rows = compare(&p1, &p2);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(rows.len(), 3);
        assert!(keys.contains(&"a") && keys.contains(&"b") && keys.contains(&"c"));
    }

    #[test]
    fn test_default_order_is_combined_volume() {
        let p1 = agg(&[("a", 1, 1.0), ("b", 10, 1.0), ("c", 3, 1.0)]);
        let p2 = agg(&[("a", 1, 1.0), ("c", 3, 1.0)]);
        let rows = compare(&p1, &p2);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);

        let by_key = compare_ordered(&p1, &p2, CompareOrder::Key);
        let keys: Vec<&str> = by_key.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rankings_respect_polarity() {
        let p1 = agg(&[("fast", 10, 200.0), ("slow", 10, 100.0), ("flat", 10, 100.0)]);
        let p2 = agg(&[("fast", 20, 100.0), ("slow", 5, 150.0), ("flat", 10, 100.0)]);
        let rows = compare(&p1, &p2);

        let better_time = top_improvements(&rows, CompareField::Mean, Polarity::LowerIsBetter, 5);
        assert_eq!(better_time.len(), 1);
        assert_eq!(better_time[0].key, "fast");

        let worse_time = top_regressions(&rows, CompareField::Mean, Polarity::LowerIsBetter, 5);
        assert_eq!(worse_time.len(), 1);
        assert_eq!(worse_time[0].key, "slow");

        let more_volume = top_improvements(
            &rows,
            CompareField::Count,
            CompareField::Count.default_polarity(),
            5,
        );
        assert_eq!(more_volume[0].key, "fast");
    }

    #[test]
    fn test_sentinels_are_not_ranked() {
        let rows = compare(&agg(&[]), &agg(&[("new", 3, 50.0)]));
        assert!(top_improvements(&rows, CompareField::Count, Polarity::HigherIsBetter, 5).is_empty());
        assert!(top_regressions(&rows, CompareField::Mean, Polarity::LowerIsBetter, 5).is_empty());
    }

    #[test]
    fn test_top_n_truncates() {
        let p1 = agg(&[("a", 10, 1.0), ("b", 10, 1.0), ("c", 10, 1.0)]);
        let p2 = agg(&[("a", 11, 1.0), ("b", 15, 1.0), ("c", 13, 1.0)]);
        let rows = compare(&p1, &p2);
        let top = top_improvements(&rows, CompareField::Count, Polarity::HigherIsBetter, 2);
        let keys: Vec<&str> = top.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }
}
