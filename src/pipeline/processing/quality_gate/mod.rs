//! Quality Gate: drops (dataset, period) groups observed for too few countries.
//!
//! The same filter runs on every table during normalization and again on the
//! consolidated master table, so it is generic over the row shape.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::metrics::QualityGateMetrics;
use crate::types::{FactRow, MasterFactRow};

/// Fields the gate groups and counts by.
pub trait Observation {
    fn dataset_key(&self) -> &str;
    fn period(&self) -> &str;
    fn country_m49(&self) -> &str;
}

impl Observation for FactRow {
    fn dataset_key(&self) -> &str {
        &self.dataset_key
    }
    fn period(&self) -> &str {
        &self.period
    }
    fn country_m49(&self) -> &str {
        &self.country_m49
    }
}

impl Observation for MasterFactRow {
    fn dataset_key(&self) -> &str {
        &self.dataset_key
    }
    fn period(&self) -> &str {
        &self.period
    }
    fn country_m49(&self) -> &str {
        &self.country_m49
    }
}

/// Before/after counts of one gate pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub groups_before: usize,
    pub groups_after: usize,
}

impl CoverageReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_before - self.rows_after
    }

    pub fn groups_dropped(&self) -> usize {
        self.groups_before - self.groups_after
    }
}

/// Keep only rows whose `(dataset_key, period)` group has at least
/// `min_countries` distinct countries. Row order is preserved.
pub fn filter_coverage<T: Observation>(rows: Vec<T>, min_countries: usize) -> (Vec<T>, CoverageReport) {
    let mut coverage: HashMap<(&str, &str), HashSet<&str>> = HashMap::new();
    for row in &rows {
        coverage
            .entry((row.dataset_key(), row.period()))
            .or_default()
            .insert(row.country_m49());
    }

    let keep: Vec<bool> = rows
        .iter()
        .map(|row| {
            coverage
                .get(&(row.dataset_key(), row.period()))
                .map_or(false, |countries| countries.len() >= min_countries)
        })
        .collect();
    let groups_before = coverage.len();
    let groups_after = coverage
        .values()
        .filter(|countries| countries.len() >= min_countries)
        .count();
    drop(coverage);

    let rows_before = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect();

    let report = CoverageReport {
        rows_before,
        rows_after: kept.len(),
        groups_before,
        groups_after,
    };

    QualityGateMetrics::record_filter(report.groups_dropped(), report.rows_dropped());
    if report.groups_dropped() > 0 {
        info!(
            rows_before = report.rows_before,
            rows_after = report.rows_after,
            groups_dropped = report.groups_dropped(),
            min_countries,
            "Coverage filter dropped under-covered groups"
        );
    } else {
        debug!(rows = report.rows_after, min_countries, "Coverage filter kept every group");
    }

    (kept, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, period: &str, m49: usize) -> FactRow {
        FactRow {
            country_m49: format!("{:03}", m49),
            country_name: format!("Country {}", m49),
            dataset_key: key.to_string(),
            period: period.to_string(),
            value: "1".to_string(),
            continent: String::new(),
            un_region: String::new(),
            world_bank_region: String::new(),
            source_citation: String::new(),
            source_link: String::new(),
            note: String::new(),
        }
    }

    #[test]
    fn test_under_covered_period_is_dropped() {
        // 150 countries for 2020, 10 for 2019
        let mut rows: Vec<FactRow> = (1..=150).map(|c| row("Population", "2020", c)).collect();
        rows.extend((1..=10).map(|c| row("Population", "2019", c)));

        let (kept, report) = filter_coverage(rows, 30);

        assert_eq!(kept.len(), 150);
        assert!(kept.iter().all(|r| r.period == "2020"));
        assert_eq!(report.groups_dropped(), 1);
        assert_eq!(report.rows_dropped(), 10);
    }

    #[test]
    fn test_duplicate_rows_do_not_inflate_coverage() {
        let rows: Vec<FactRow> = (0..40).map(|_| row("GDP", "2000", 4)).collect();
        let (kept, report) = filter_coverage(rows, 30);
        assert!(kept.is_empty());
        assert_eq!(report.groups_after, 0);
    }

    #[test]
    fn test_threshold_is_inclusive_and_idempotent() {
        let rows: Vec<FactRow> = (1..=30).map(|c| row("GDP", "2000", c)).collect();
        let (once, _) = filter_coverage(rows, 30);
        assert_eq!(once.len(), 30);

        let (twice, report) = filter_coverage(once.clone(), 30);
        assert_eq!(once, twice);
        assert_eq!(report.rows_dropped(), 0);
    }

    #[test]
    fn test_master_rows_are_gated_the_same_way() {
        let rows: Vec<MasterFactRow> = (1..=5).map(|c| row("GDP", "2000", c).into()).collect();
        let (kept, _) = filter_coverage(rows, 5);
        assert_eq!(kept.len(), 5);
    }
}
