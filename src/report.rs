//! One parsed llvm-cov HTML report.
//!
//! A [`ReportModel`] is built in one go from a report root and is immutable
//! afterwards. Construction either yields a fully parsed model or an error;
//! a partially parsed report is never exposed.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CovmergeError, Result};
use crate::model::*;
use crate::parsers::index;
use crate::scheduler;

pub const INDEX_PAGE: &str = "index.html";
pub const STYLE_SHEET: &str = "style.css";
pub const DETAIL_DIR: &str = "coverage";

/// Knobs for report parsing.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Size of the detail-page worker pool.
    pub jobs: NonZeroUsize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            jobs: scheduler::available_jobs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportModel {
    name: String,
    root: PathBuf,
    summaries: Vec<FileCoverageSummary>,
    summary_index: HashMap<String, usize>,
    totals: TotalCoverageSummary,
    details: HashMap<String, FileCoverage>,
}

impl ReportModel {
    /// Parse the report at `root` with default options.
    pub fn open(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(name, root, &ParseOptions::default())
    }

    pub fn open_with(
        name: impl Into<String>,
        root: impl AsRef<Path>,
        options: &ParseOptions,
    ) -> Result<Self> {
        let name = name.into();
        let root = root.as_ref().to_path_buf();
        check_layout(&root)?;

        let index_path = root.join(INDEX_PAGE);
        let input = std::fs::read_to_string(&index_path).map_err(|source| CovmergeError::Read {
            path: index_path.clone(),
            source,
        })?;
        let table = index::parse(&input, &index_path)?;

        let mut summary_index = HashMap::with_capacity(table.files.len());
        for (idx, summary) in table.files.iter().enumerate() {
            if summary_index
                .insert(summary.src_relative_path.clone(), idx)
                .is_some()
            {
                return Err(CovmergeError::format(
                    &index_path,
                    format!("file '{}' is listed twice", summary.src_relative_path),
                ));
            }
        }

        let pages = table
            .files
            .iter()
            .map(|s| (s.src_relative_path.clone(), root.join(&s.detail_report_ref)))
            .collect();
        let details = scheduler::parse_detail_pages(pages, options.jobs)?;

        let report = Self {
            name,
            root,
            summaries: table.files,
            summary_index,
            totals: table.totals,
            details,
        };

        info!(
            report = %report.name,
            root = %report.root.display(),
            files = report.summaries.len(),
            "parsed report"
        );
        if !report.totals_reconcile() {
            warn!(
                report = %report.name,
                "per-file metrics do not add up to the Totals row"
            );
        }

        Ok(report)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File rows in index-page order.
    pub fn summaries(&self) -> &[FileCoverageSummary] {
        &self.summaries
    }

    pub fn totals(&self) -> &TotalCoverageSummary {
        &self.totals
    }

    /// Relative source paths of every file row, in index-page order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.summaries.iter().map(|s| s.src_relative_path.as_str())
    }

    pub fn summary(&self, path: &str) -> Option<&FileCoverageSummary> {
        self.summary_index.get(path).map(|&idx| &self.summaries[idx])
    }

    /// Line-level coverage for an exact relative path. `None` is a normal
    /// outcome: reports need not share file sets.
    pub fn detail(&self, path: &str) -> Option<&FileCoverage> {
        self.details.get(path)
    }

    /// Sum of the per-file metrics, or `None` if a counter overflows `u64`.
    pub fn summed_metrics(&self) -> Option<MetricSet> {
        self.summaries
            .iter()
            .try_fold(MetricSet::default(), |acc, s| acc.checked_add(s.metrics))
    }

    /// Whether the per-file rows add up to the Totals row. A sum that
    /// overflows never reconciles.
    pub fn totals_reconcile(&self) -> bool {
        self.summed_metrics() == Some(self.totals.metrics)
    }
}

/// Verify the report root carries the three artifacts llvm-cov writes.
fn check_layout(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Err(CovmergeError::MissingRoot(root.to_path_buf()));
    }
    let index = root.join(INDEX_PAGE);
    let style = root.join(STYLE_SHEET);
    let detail_dir = root.join(DETAIL_DIR);
    for (path, present) in [
        (&index, index.is_file()),
        (&style, style.is_file()),
        (&detail_dir, detail_dir.is_dir()),
    ] {
        if !present {
            return Err(CovmergeError::MissingRoot(path.clone()));
        }
    }
    Ok(())
}
