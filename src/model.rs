//! Value types recovered from an llvm-cov HTML report. Parsers produce these
//! and the merge engine only ever reads them.

use std::path::PathBuf;

use serde::Serialize;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// A `covered/total` fraction for one metric. `covered <= total` always holds
/// for values produced by the parsers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CoverageMetricValue {
    pub covered: u64,
    pub total: u64,
}

impl CoverageMetricValue {
    /// Returns `None` when `covered > total`.
    #[must_use]
    pub fn new(covered: u64, total: u64) -> Option<Self> {
        (covered <= total).then_some(Self { covered, total })
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        rate(self.covered, self.total)
    }

    /// Component-wise sum; `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        Some(Self {
            covered: self.covered.checked_add(rhs.covered)?,
            total: self.total.checked_add(rhs.total)?,
        })
    }
}

/// The four coverage dimensions reported for one row of the index table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct MetricSet {
    pub function: CoverageMetricValue,
    pub line: CoverageMetricValue,
    pub region: CoverageMetricValue,
    pub branch: CoverageMetricValue,
}

impl MetricSet {
    /// Metric-wise sum; `None` if any counter overflows.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        Some(Self {
            function: self.function.checked_add(rhs.function)?,
            line: self.line.checked_add(rhs.line)?,
            region: self.region.checked_add(rhs.region)?,
            branch: self.branch.checked_add(rhs.branch)?,
        })
    }
}

/// One file row of the index table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCoverageSummary {
    /// Path relative to the project root; the join key across reports.
    pub src_relative_path: String,
    /// Link to the file's detail page, relative to the report root.
    pub detail_report_ref: PathBuf,
    pub metrics: MetricSet,
}

/// The `Totals` row of the index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TotalCoverageSummary {
    pub metrics: MetricSet,
}

/// A 0-based column range of a source line that was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UncoveredLineRegion {
    pub start_col: usize,
    pub length: usize,
}

impl UncoveredLineRegion {
    #[must_use]
    pub fn end_col(&self) -> usize {
        self.start_col + self.length
    }
}

/// One row of a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLine {
    pub line_number: u32,
    /// `None` for lines that are not executable.
    pub exec_count: Option<u64>,
    pub text: String,
    pub uncovered_regions: Vec<UncoveredLineRegion>,
}

impl FileLine {
    /// Executable and never executed.
    #[must_use]
    pub fn is_uncovered(&self) -> bool {
        self.exec_count == Some(0)
    }
}

/// Line-level coverage for a single source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCoverage {
    pub src_relative_path: String,
    /// Absolute path as recorded by the instrumentation tool.
    pub origin_absolute_path: PathBuf,
    /// Ordered by increasing line number.
    pub lines: Vec<FileLine>,
}

impl FileCoverage {
    pub fn line(&self, line_number: u32) -> Option<&FileLine> {
        self.lines
            .binary_search_by_key(&line_number, |l| l.line_number)
            .ok()
            .map(|idx| &self.lines[idx])
    }
}

/// A (report, file summary) pair flattened for the merged index listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedSummaryRecord {
    pub src_relative_path: String,
    pub report_name: String,
    #[serde(flatten)]
    pub metrics: MetricSet,
}

impl MaterializedSummaryRecord {
    pub fn new(report_name: &str, summary: &FileCoverageSummary) -> Self {
        Self {
            src_relative_path: summary.src_relative_path.clone(),
            report_name: report_name.to_string(),
            metrics: summary.metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_value_rejects_covered_above_total() {
        assert!(CoverageMetricValue::new(3, 2).is_none());
        assert_eq!(
            CoverageMetricValue::new(2, 2),
            Some(CoverageMetricValue { covered: 2, total: 2 })
        );
    }

    #[test]
    fn metric_rate_of_empty_total_is_zero() {
        assert_eq!(CoverageMetricValue::default().rate(), 0.0);
        assert_eq!(CoverageMetricValue { covered: 1, total: 4 }.rate(), 0.25);
    }

    #[test]
    fn checked_add_detects_overflow() {
        let max = CoverageMetricValue { covered: u64::MAX, total: u64::MAX };
        let one = CoverageMetricValue { covered: 1, total: 1 };
        assert_eq!(max.checked_add(CoverageMetricValue::default()), Some(max));
        assert_eq!(max.checked_add(one), None);

        let set = MetricSet {
            branch: max,
            ..Default::default()
        };
        let ones = MetricSet {
            function: one,
            line: one,
            region: one,
            branch: CoverageMetricValue::default(),
        };
        assert!(set.checked_add(ones).is_some());
        assert_eq!(set.checked_add(set), None);
    }

    #[test]
    fn materialized_record_flattens_metrics() {
        let summary = FileCoverageSummary {
            src_relative_path: "src/a.c".to_string(),
            detail_report_ref: PathBuf::from("coverage/src/a.c.html"),
            metrics: MetricSet {
                line: CoverageMetricValue { covered: 6, total: 48 },
                ..Default::default()
            },
        };
        let record = MaterializedSummaryRecord::new("FT", &summary);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["report_name"], "FT");
        assert_eq!(json["src_relative_path"], "src/a.c");
        assert_eq!(json["line"]["covered"], 6);
        assert_eq!(json["line"]["total"], 48);
        assert_eq!(json["branch"]["total"], 0);
    }

    #[test]
    fn line_lookup_by_number() {
        let file = FileCoverage {
            src_relative_path: "a.c".to_string(),
            origin_absolute_path: PathBuf::from("/p/a.c"),
            lines: [1, 2, 5]
                .into_iter()
                .map(|n| FileLine {
                    line_number: n,
                    exec_count: None,
                    text: String::new(),
                    uncovered_regions: vec![],
                })
                .collect(),
        };
        assert_eq!(file.line(5).map(|l| l.line_number), Some(5));
        assert!(file.line(3).is_none());
    }
}
