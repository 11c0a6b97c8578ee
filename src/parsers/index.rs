/// Parser for the `index.html` summary page of an llvm-cov HTML report.
///
/// The page carries two tables. The first one is the coverage table:
///
/// ```text
///   <tr><td>Filename</td><td>Function Coverage</td><td>Line Coverage</td>
///       <td>Region Coverage</td><td>Branch Coverage</td></tr>
///   <tr><td><pre><a href='coverage/.../a.c.html'>src/a.c</a></pre></td>
///       <td><pre>  50.00% (1/2)</pre></td> ... </tr>
///   ...
///   <tr><td><pre>Totals</pre></td> ... </tr>
/// ```
///
/// The second lists files which contain no functions and is ignored.
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use super::html;
use crate::error::{CovmergeError, Result};
use crate::model::*;

pub const EXPECTED_HEADINGS: [&str; 5] = [
    "Filename",
    "Function Coverage",
    "Line Coverage",
    "Region Coverage",
    "Branch Coverage",
];

/// First cell text of the row that holds the report totals.
pub const TOTALS_MARKER: &str = "Totals";

/// Pre-compiled regex for metric cells like "50.00% (6/48)".
static FRACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").unwrap());

/// Everything recovered from one index page.
#[derive(Debug, Clone)]
pub struct IndexTable {
    pub files: Vec<FileCoverageSummary>,
    pub totals: TotalCoverageSummary,
}

/// Parse the index page found at `origin` (used for error context only).
pub fn parse(input: &str, origin: &Path) -> Result<IndexTable> {
    let doc = html::parse(input);
    let tables = html::find_all(&doc, "table");
    if tables.len() != 2 {
        return Err(CovmergeError::format(
            origin,
            format!("expected 2 tables on the index page, found {}", tables.len()),
        ));
    }
    parse_coverage_table(&tables[0], origin)
}

fn parse_coverage_table(table: &Handle, origin: &Path) -> Result<IndexTable> {
    let rows = html::table_rows(table);
    let (header, rows) = rows
        .split_first()
        .ok_or_else(|| CovmergeError::format(origin, "summary table has no header row"))?;

    let headings: Vec<String> = html::row_cells(header)
        .iter()
        .map(|cell| html::text_content(cell).trim().to_string())
        .collect();
    if headings != EXPECTED_HEADINGS {
        return Err(CovmergeError::format(
            origin,
            format!(
                "summary table has unexpected headings. Expected: {:?}. Got: {:?}",
                EXPECTED_HEADINGS, headings
            ),
        ));
    }

    let mut files = Vec::new();
    let mut totals: Option<TotalCoverageSummary> = None;

    for row in rows {
        let cells = html::row_cells(row);
        if cells.len() != EXPECTED_HEADINGS.len() {
            return Err(CovmergeError::format(
                origin,
                format!(
                    "summary row has {} cells, expected {}",
                    cells.len(),
                    EXPECTED_HEADINGS.len()
                ),
            ));
        }

        let filename = html::text_content(&cells[0]).trim().to_string();
        let metrics = parse_metrics(&cells[1..], &filename, origin)?;

        if filename == TOTALS_MARKER {
            if totals.is_some() {
                return Err(CovmergeError::format(
                    origin,
                    "summary table has more than one 'Totals' row",
                ));
            }
            totals = Some(TotalCoverageSummary { metrics });
            continue;
        }

        let href = html::find_all(&cells[0], "a")
            .first()
            .and_then(|a| html::attr(a, "href"))
            .filter(|href| !href.is_empty())
            .ok_or_else(|| {
                CovmergeError::parse(
                    origin,
                    format!("row of file '{filename}' has no link to its detail page"),
                )
            })?;

        files.push(FileCoverageSummary {
            src_relative_path: filename,
            detail_report_ref: PathBuf::from(href),
            metrics,
        });
    }

    let totals = totals
        .ok_or_else(|| CovmergeError::format(origin, "report does not contain a 'Totals' row"))?;

    Ok(IndexTable { files, totals })
}

/// Parse the four metric cells of one row, in heading order.
fn parse_metrics(cells: &[Handle], filename: &str, origin: &Path) -> Result<MetricSet> {
    let mut values = [CoverageMetricValue::default(); 4];
    for ((value, cell), heading) in values.iter_mut().zip(cells).zip(&EXPECTED_HEADINGS[1..]) {
        let text = html::text_content(cell);
        *value = parse_fraction(&text).ok_or_else(|| {
            CovmergeError::parse(
                origin,
                format!(
                    "row of file '{filename}': {heading} cell '{}' has no valid (covered/total) fraction",
                    text.trim()
                ),
            )
        })?;
    }
    let [function, line, region, branch] = values;
    Ok(MetricSet {
        function,
        line,
        region,
        branch,
    })
}

/// Extract the `(covered/total)` part of a metric cell.
pub fn parse_fraction(text: &str) -> Option<CoverageMetricValue> {
    let caps = FRACTION_RE.captures(text)?;
    let covered: u64 = caps[1].parse().ok()?;
    let total: u64 = caps[2].parse().ok()?;
    CoverageMetricValue::new(covered, total)
}
