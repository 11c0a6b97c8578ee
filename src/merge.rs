//! Side-by-side merge of several parsed reports.
//!
//! Merging is a pure function of the input reports: it only reads them and
//! derives the union of files, the flattened per-report listing and, on
//! demand, the per-file comparison handed to a renderer. Nothing is summed
//! or diffed here.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::error::{CovmergeError, Result};
use crate::model::*;
use crate::report::ReportModel;

/// Derived view over two or more reports.
#[derive(Debug, Clone)]
pub struct MergedCoverage<'a> {
    /// Reports sorted by name.
    reports: Vec<&'a ReportModel>,
    report_names: Vec<String>,
    files: Vec<String>,
    listing: Vec<MaterializedSummaryRecord>,
}

/// Serializable form of the merged index data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSnapshot {
    pub report_names: Vec<String>,
    pub files: Vec<String>,
    pub indexed_files: Vec<MaterializedSummaryRecord>,
}

/// One report's view of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportEntry<'a> {
    pub report_name: &'a str,
    /// `None` when the report did not test this file.
    pub summary: Option<&'a FileCoverageSummary>,
    /// `None` when the report did not test this file.
    pub coverage: Option<&'a FileCoverage>,
}

impl ReportEntry<'_> {
    pub fn is_present(&self) -> bool {
        self.coverage.is_some()
    }
}

/// All reports' views of a single file, ordered by report name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileComparison<'a> {
    pub src_relative_path: String,
    pub entries: Vec<ReportEntry<'a>>,
}

impl FileComparison<'_> {
    /// Line numbers seen in any present report, ascending.
    pub fn line_numbers(&self) -> Vec<u32> {
        let lines: BTreeSet<u32> = self
            .entries
            .iter()
            .filter_map(|e| e.coverage)
            .flat_map(|c| c.lines.iter().map(|l| l.line_number))
            .collect();
        lines.into_iter().collect()
    }
}

/// Merge two or more reports. Report names must be distinct.
pub fn merge(reports: &[ReportModel]) -> Result<MergedCoverage<'_>> {
    if reports.len() < 2 {
        return Err(CovmergeError::InvalidMerge(format!(
            "at least two reports are required, got {}",
            reports.len()
        )));
    }

    let mut seen = HashSet::new();
    for report in reports {
        if !seen.insert(report.name()) {
            return Err(CovmergeError::InvalidMerge(format!(
                "duplicate report name '{}'",
                report.name()
            )));
        }
    }

    let mut sorted: Vec<&ReportModel> = reports.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let report_names = sorted.iter().map(|r| r.name().to_string()).collect();
    let files = union_paths(reports);
    let listing = materialize(reports);

    Ok(MergedCoverage {
        reports: sorted,
        report_names,
        files,
        listing,
    })
}

/// Sorted union of every report's relative source paths.
fn union_paths(reports: &[ReportModel]) -> Vec<String> {
    let union: BTreeSet<&str> = reports.iter().flat_map(|r| r.paths()).collect();
    union.into_iter().map(str::to_string).collect()
}

/// One record per (report, file row), in input order.
fn materialize(reports: &[ReportModel]) -> Vec<MaterializedSummaryRecord> {
    reports
        .iter()
        .flat_map(|r| {
            r.summaries()
                .iter()
                .map(move |s| MaterializedSummaryRecord::new(r.name(), s))
        })
        .collect()
}

impl<'a> MergedCoverage<'a> {
    /// Distinct report names, sorted.
    pub fn report_names(&self) -> &[String] {
        &self.report_names
    }

    /// Every file tested by at least one report, sorted by path string.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Flattened (file, report, metrics) records; one per file row of each report.
    pub fn listing(&self) -> &[MaterializedSummaryRecord] {
        &self.listing
    }

    /// The merged reports, sorted by name.
    pub fn reports(&self) -> &[&'a ReportModel] {
        &self.reports
    }

    /// Each report's totals, sorted by report name.
    pub fn totals(&self) -> Vec<(&'a str, &'a TotalCoverageSummary)> {
        self.reports.iter().map(|r| (r.name(), r.totals())).collect()
    }

    /// Per-report detail for `path`. Returns `None` only when no report
    /// covers the path; reports lacking the file get an absent entry.
    pub fn file_detail(&self, path: &str) -> Option<FileComparison<'a>> {
        self.files.binary_search_by(|f| f.as_str().cmp(path)).ok()?;
        let entries = self
            .reports
            .iter()
            .map(|r| ReportEntry {
                report_name: r.name(),
                summary: r.summary(path),
                coverage: r.detail(path),
            })
            .collect();
        Some(FileComparison {
            src_relative_path: path.to_string(),
            entries,
        })
    }

    pub fn snapshot(&self) -> MergeSnapshot {
        MergeSnapshot {
            report_names: self.report_names.clone(),
            files: self.files.clone(),
            indexed_files: self.listing.clone(),
        }
    }
}
