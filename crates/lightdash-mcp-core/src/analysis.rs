//! Heuristic query analysis.
//!
//! Nothing here talks to the API. The score is a weighted count of the parts
//! of a query and the latency estimate is a linear function of the score;
//! both are rough guides for an agent deciding whether to simplify a query.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Limit above which a query counts as a large scan.
pub const LARGE_LIMIT: u32 = 1000;

const DIMENSION_WEIGHT: f64 = 1.0;
const METRIC_WEIGHT: f64 = 2.0;
const FILTER_WEIGHT: f64 = 1.5;
const SORT_WEIGHT: f64 = 0.5;
const TABLE_CALCULATION_WEIGHT: f64 = 3.0;
const LARGE_LIMIT_PENALTY: f64 = 2.0;

const MEDIUM_THRESHOLD: f64 = 5.0;
const HIGH_THRESHOLD: f64 = 12.0;

const BASE_LATENCY_MS: f64 = 200.0;
const LATENCY_PER_POINT_MS: f64 = 75.0;
const FAST_BELOW_MS: f64 = 500.0;
const MODERATE_BELOW_MS: f64 = 1500.0;

/// Two-sided 95% Student-t critical values for 1..=30 degrees of freedom.
const T_CRITICAL_95: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

/// Normal approximation used past the table.
const Z_95: f64 = 1.96;

/// Counts describing a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueryShape {
    /// Number of dimensions.
    pub dimensions: usize,
    /// Number of metrics.
    pub metrics: usize,
    /// Number of filter rules.
    pub filters: usize,
    /// Number of sorts.
    pub sorts: usize,
    /// Number of table calculations.
    pub table_calculations: usize,
    /// Row limit.
    pub limit: u32,
}

/// Coarse complexity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    /// Score below 5.
    Low,
    /// Score from 5 up to 12.
    Medium,
    /// Score of 12 or more.
    High,
}

/// Output of [`complexity_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexityReport {
    /// Weighted score.
    pub score: f64,
    /// Bucket the score falls in.
    pub level: ComplexityLevel,
    /// One line per part that contributed to the score.
    pub factors: Vec<String>,
    /// Ways to make the query cheaper.
    pub recommendations: Vec<String>,
}

/// Expected latency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceCategory {
    /// Under 500 ms.
    Fast,
    /// Under 1.5 s.
    Moderate,
    /// Everything else.
    Slow,
}

/// Output of [`predict_performance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformancePrediction {
    /// Estimated latency in milliseconds.
    pub estimated_ms: f64,
    /// Bucket the estimate falls in.
    pub category: PerformanceCategory,
}

/// Summary statistics over timing samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampleStats {
    /// Number of samples.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1). Zero for a single sample.
    pub std_dev: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Lower bound of the 95% confidence interval for the mean.
    pub ci95_low: f64,
    /// Upper bound of the 95% confidence interval for the mean.
    pub ci95_high: f64,
}

/// Score a query by the number and kind of its parts.
#[tracing::instrument(level = "debug")]
pub fn complexity_score(shape: &QueryShape) -> ComplexityReport {
    let parts = [
        (shape.dimensions, DIMENSION_WEIGHT, "dimension"),
        (shape.metrics, METRIC_WEIGHT, "metric"),
        (shape.filters, FILTER_WEIGHT, "filter"),
        (shape.sorts, SORT_WEIGHT, "sort"),
        (
            shape.table_calculations,
            TABLE_CALCULATION_WEIGHT,
            "table calculation",
        ),
    ];

    let mut score = 0.0;
    let mut factors = Vec::new();
    for (count, weight, label) in parts {
        if count == 0 {
            continue;
        }
        let points = count as f64 * weight;
        score += points;
        let plural = if count == 1 { "" } else { "s" };
        factors.push(format!("{count} {label}{plural} (+{points:.1})"));
    }
    if shape.limit > LARGE_LIMIT {
        score += LARGE_LIMIT_PENALTY;
        factors.push(format!(
            "limit {} above {LARGE_LIMIT} (+{LARGE_LIMIT_PENALTY:.1})",
            shape.limit
        ));
    }

    let level = if score < MEDIUM_THRESHOLD {
        ComplexityLevel::Low
    } else if score < HIGH_THRESHOLD {
        ComplexityLevel::Medium
    } else {
        ComplexityLevel::High
    };

    ComplexityReport {
        score,
        level,
        factors,
        recommendations: recommendations(shape, level),
    }
}

fn recommendations(shape: &QueryShape, level: ComplexityLevel) -> Vec<String> {
    let mut out = Vec::new();
    if shape.limit > LARGE_LIMIT {
        out.push(format!(
            "Lower the limit to {LARGE_LIMIT} or less unless every row is needed."
        ));
    }
    if shape.table_calculations > 0 {
        out.push("Table calculations run after the query; compute them client-side if possible.".into());
    }
    if shape.dimensions > 5 {
        out.push("Many dimensions multiply the row count; group by fewer fields.".into());
    }
    if level != ComplexityLevel::Low && shape.filters == 0 {
        out.push("Add a filter (for example a date range) to narrow the scan.".into());
    }
    out
}

/// Estimate latency from a complexity report.
pub fn predict_performance(report: &ComplexityReport) -> PerformancePrediction {
    let estimated_ms = BASE_LATENCY_MS + LATENCY_PER_POINT_MS * report.score;
    PerformancePrediction {
        estimated_ms,
        category: categorize(estimated_ms),
    }
}

fn categorize(estimated_ms: f64) -> PerformanceCategory {
    if estimated_ms < FAST_BELOW_MS {
        PerformanceCategory::Fast
    } else if estimated_ms < MODERATE_BELOW_MS {
        PerformanceCategory::Moderate
    } else {
        PerformanceCategory::Slow
    }
}

/// Mean, spread and 95% confidence interval of `samples`.
///
/// Returns `None` for an empty slice.
pub fn summarize_samples(samples: &[f64]) -> Option<SampleStats> {
    let count = samples.len();
    if count == 0 {
        return None;
    }
    let n = count as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (std_dev, half_width) = if count < 2 {
        (0.0, 0.0)
    } else {
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();
        (std_dev, t_critical_95(count - 1) * std_dev / n.sqrt())
    };

    Some(SampleStats {
        count,
        mean,
        std_dev,
        min,
        max,
        ci95_low: mean - half_width,
        ci95_high: mean + half_width,
    })
}

fn t_critical_95(degrees_of_freedom: usize) -> f64 {
    degrees_of_freedom
        .checked_sub(1)
        .and_then(|i| T_CRITICAL_95.get(i))
        .copied()
        .unwrap_or(Z_95)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(dimensions: usize, metrics: usize, filters: usize) -> QueryShape {
        QueryShape {
            dimensions,
            metrics,
            filters,
            limit: 500,
            ..QueryShape::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn weights_every_part() {
        let report = complexity_score(&QueryShape {
            dimensions: 2,
            metrics: 1,
            filters: 2,
            sorts: 1,
            table_calculations: 1,
            limit: 5000,
        });
        // 2 + 2 + 3 + 0.5 + 3 + 2
        assert!(approx(report.score, 12.5));
        assert_eq!(report.level, ComplexityLevel::High);
        assert_eq!(report.factors.len(), 6);
        assert_eq!(report.factors[0], "2 dimensions (+2.0)");
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(complexity_score(&shape(4, 0, 0)).level, ComplexityLevel::Low);
        assert_eq!(complexity_score(&shape(5, 0, 0)).level, ComplexityLevel::Medium);
        assert_eq!(complexity_score(&shape(0, 5, 1)).level, ComplexityLevel::Medium);
        assert_eq!(complexity_score(&shape(0, 6, 0)).level, ComplexityLevel::High);
    }

    #[test]
    fn limit_at_threshold_is_not_penalised() {
        let mut s = shape(1, 0, 0);
        s.limit = LARGE_LIMIT;
        assert!(approx(complexity_score(&s).score, 1.0));
        s.limit = LARGE_LIMIT + 1;
        assert!(approx(complexity_score(&s).score, 3.0));
    }

    #[test]
    fn empty_query_scores_zero() {
        let report = complexity_score(&QueryShape::default());
        assert!(approx(report.score, 0.0));
        assert!(report.factors.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn unfiltered_heavy_query_gets_filter_advice() {
        let report = complexity_score(&shape(2, 3, 0));
        assert!(report.recommendations.iter().any(|r| r.contains("filter")));
    }

    #[test]
    fn prediction_buckets() {
        let at = |score| ComplexityReport {
            score,
            level: ComplexityLevel::Low,
            factors: vec![],
            recommendations: vec![],
        };
        let fast = predict_performance(&at(3.0));
        assert!(approx(fast.estimated_ms, 425.0));
        assert_eq!(fast.category, PerformanceCategory::Fast);
        // 200 + 75 * 4 = 500 is no longer fast
        assert_eq!(predict_performance(&at(4.0)).category, PerformanceCategory::Moderate);
        // 200 + 75 * 17 = 1475, 200 + 75 * 18 = 1550
        assert_eq!(predict_performance(&at(17.0)).category, PerformanceCategory::Moderate);
        assert_eq!(predict_performance(&at(18.0)).category, PerformanceCategory::Slow);
    }

    #[test]
    fn category_boundaries_are_exclusive_upper_bounds() {
        assert_eq!(categorize(499.9), PerformanceCategory::Fast);
        assert_eq!(categorize(500.0), PerformanceCategory::Moderate);
        assert_eq!(categorize(1499.9), PerformanceCategory::Moderate);
        assert_eq!(categorize(1500.0), PerformanceCategory::Slow);
    }

    #[test]
    fn no_samples() {
        assert_eq!(summarize_samples(&[]), None);
    }

    #[test]
    fn single_sample_has_zero_width_interval() {
        let stats = summarize_samples(&[120.0]).unwrap();
        assert_eq!(stats.count, 1);
        assert!(approx(stats.std_dev, 0.0));
        assert!(approx(stats.ci95_low, 120.0));
        assert!(approx(stats.ci95_high, 120.0));
    }

    #[test]
    fn three_samples_use_t_distribution() {
        let stats = summarize_samples(&[100.0, 200.0, 300.0]).unwrap();
        assert!(approx(stats.mean, 200.0));
        assert!(approx(stats.std_dev, 100.0));
        assert!(approx(stats.min, 100.0));
        assert!(approx(stats.max, 300.0));
        let half = 4.303 * 100.0 / 3f64.sqrt();
        assert!(approx(stats.ci95_high - stats.mean, half));
        assert!(approx(stats.mean - stats.ci95_low, half));
    }

    #[test]
    fn large_samples_fall_back_to_normal() {
        assert!(approx(t_critical_95(30), 2.042));
        assert!(approx(t_critical_95(31), Z_95));
        assert!(approx(t_critical_95(1), 12.706));
    }
}
