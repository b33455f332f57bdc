//! Composite data-quality scoring for a pipeline run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weight of the spelling-correction burden in the composite score
pub const MISSPELLING_WEIGHT: f64 = 0.85;
/// Weight of the duplication rate in the composite score
pub const DUPLICATION_WEIGHT: f64 = 0.15;

/// Per-field correction counts produced by the upstream spelling corrector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionReport {
    counts: BTreeMap<String, u64>,
}

impl CorrectionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts<I, K>(counts: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            counts: counts.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Add `count` corrections for `field`
    pub fn record(&mut self, field: impl Into<String>, count: u64) {
        *self.counts.entry(field.into()).or_insert(0) += count;
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of corrected field names
    pub fn field_count(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, field: &str) -> Option<u64> {
        self.counts.get(field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Summary metrics for one run. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub quality_score: f64,
    pub misspelling_ratio: f64,
    pub duplication_ratio: f64,
    pub total_corrections: u64,
    pub duplicates_count: usize,
    pub initial_rows: usize,
}

/// Combine correction and duplication activity into the composite score.
///
/// The misspelling denominator is `initial_rows × corrected field names`.
/// Any zero denominator yields a zero ratio. Ratios are clamped to
/// `[0, 100]` so the score stays in range for inconsistent inputs.
pub fn score(
    initial_rows: usize,
    corrections: &CorrectionReport,
    duplicates_count: usize,
) -> QualityMetrics {
    let total_corrections = corrections.total();
    let cells = initial_rows as f64 * corrections.field_count() as f64;

    let misspelling_ratio = ratio(total_corrections as f64, cells);
    let duplication_ratio = ratio(duplicates_count as f64, initial_rows as f64);
    let quality_score = MISSPELLING_WEIGHT * (100.0 - misspelling_ratio)
        + DUPLICATION_WEIGHT * (100.0 - duplication_ratio);

    QualityMetrics {
        quality_score: round2(quality_score),
        misspelling_ratio: round2(misspelling_ratio),
        duplication_ratio: round2(duplication_ratio),
        total_corrections,
        duplicates_count,
        initial_rows,
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    (numerator / denominator * 100.0).clamp(0.0, 100.0)
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        let corrections = CorrectionReport::from_counts([("first_name", 5), ("last_name", 5)]);
        let metrics = score(50, &corrections, 5);

        assert_eq!(metrics.misspelling_ratio, 10.0);
        assert_eq!(metrics.duplication_ratio, 10.0);
        assert_eq!(metrics.quality_score, 90.0);
        assert_eq!(metrics.total_corrections, 10);
    }

    #[test]
    fn test_duplication_ratio_example() {
        let metrics = score(3, &CorrectionReport::new(), 1);
        assert_eq!(metrics.duplication_ratio, 33.33);
        assert_eq!(metrics.misspelling_ratio, 0.0);
    }

    #[test]
    fn test_zero_rows_is_defined() {
        let corrections = CorrectionReport::from_counts([("city", 4)]);
        let metrics = score(0, &corrections, 0);
        assert_eq!(metrics.misspelling_ratio, 0.0);
        assert_eq!(metrics.duplication_ratio, 0.0);
        assert_eq!(metrics.quality_score, 100.0);
    }

    #[test]
    fn test_out_of_contract_inputs_stay_in_range() {
        let corrections = CorrectionReport::from_counts([("city", 1_000)]);
        let metrics = score(2, &corrections, 7);
        assert_eq!(metrics.misspelling_ratio, 100.0);
        assert_eq!(metrics.duplication_ratio, 100.0);
        assert_eq!(metrics.quality_score, 0.0);
    }

    #[test]
    fn test_record_accumulates() {
        let mut report = CorrectionReport::new();
        report.record("city", 2);
        report.record("city", 3);
        assert_eq!(report.get("city"), Some(5));
        assert_eq!(report.field_count(), 1);

        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"city":5}"#);
    }
}
