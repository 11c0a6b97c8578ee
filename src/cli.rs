//! Command handler functions for the covmerge CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::merge;
use crate::model::FileLine;
use crate::render::{self, HtmlRenderer, RenderContext};
use crate::report::{ParseOptions, ReportModel};

/// Parse a `NAME=ROOT` report argument.
pub fn parse_report_arg(arg: &str) -> std::result::Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, root)) if !name.is_empty() && !root.is_empty() => {
            Ok((name.to_string(), PathBuf::from(root)))
        }
        _ => Err(format!("expected NAME=PATH, got '{arg}'")),
    }
}

fn open_report(name: &str, root: &Path, options: &ParseOptions) -> Result<ReportModel> {
    ReportModel::open_with(name, root, options)
        .with_context(|| format!("Failed to parse report '{}' at {}", name, root.display()))
}

pub fn cmd_merge(
    reports: &[(String, PathBuf)],
    output: &Path,
    title: Option<&str>,
    options: &ParseOptions,
) -> Result<String> {
    let models = reports
        .iter()
        .map(|(name, root)| open_report(name, root, options))
        .collect::<Result<Vec<_>>>()?;

    let merged = merge::merge(&models)?;

    let mut context = RenderContext::default();
    if let Some(title) = title {
        context.title = title.to_string();
    }
    render::write_merged(&merged, &HtmlRenderer::new(context), output)?;

    let mut out = String::new();
    writeln!(
        out,
        "Merged {} reports ({}) → {}",
        merged.report_names().len(),
        merged.report_names().join(", "),
        output.display()
    )
    .unwrap();
    writeln!(out, "Files:      {}", merged.files().len()).unwrap();
    for (name, totals) in merged.totals() {
        let line = totals.metrics.line;
        writeln!(
            out,
            "  {:<20} lines {}/{} ({:.1}%)",
            name,
            line.covered,
            line.total,
            line.rate() * 100.0
        )
        .unwrap();
    }
    Ok(out)
}

pub fn cmd_summary(root: &Path, options: &ParseOptions) -> Result<String> {
    let report = open_report(&root.display().to_string(), root, options)?;
    let totals = report.totals().metrics;

    let mut out = String::new();
    writeln!(out, "Report:     {}", report.root().display()).unwrap();
    writeln!(out, "Files:      {}", report.summaries().len()).unwrap();
    for (label, value) in [
        ("Functions:", totals.function),
        ("Lines:", totals.line),
        ("Regions:", totals.region),
        ("Branches:", totals.branch),
    ] {
        if value.total > 0 {
            writeln!(
                out,
                "{:<11} {}/{} ({:.1}%)",
                label,
                value.covered,
                value.total,
                value.rate() * 100.0
            )
            .unwrap();
        }
    }
    if !report.totals_reconcile() {
        writeln!(out, "Warning: per-file metrics do not add up to the Totals row").unwrap();
    }
    Ok(out)
}

pub fn cmd_files(root: &Path, sort_by_coverage: bool, options: &ParseOptions) -> Result<String> {
    let report = open_report(&root.display().to_string(), root, options)?;

    let mut files: Vec<_> = report.summaries().iter().collect();
    if sort_by_coverage {
        files.sort_by(|a, b| a.metrics.line.rate().total_cmp(&b.metrics.line.rate()));
    } else {
        files.sort_by(|a, b| a.src_relative_path.cmp(&b.src_relative_path));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8} {:>8}",
        "FILE", "LINES", "COVERED", "RATE", "REGIONS"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(97)).unwrap();

    for f in &files {
        let line = f.metrics.line;
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>7.1}% {:>7.1}%",
            f.src_relative_path,
            line.total,
            line.covered,
            line.rate() * 100.0,
            f.metrics.region.rate() * 100.0
        )
        .unwrap();
    }

    Ok(out)
}

pub fn cmd_uncovered(root: &Path, source_file: &str, options: &ParseOptions) -> Result<String> {
    let report = open_report(&root.display().to_string(), root, options)?;
    let file = report
        .detail(source_file)
        .ok_or_else(|| anyhow::anyhow!("No coverage data for '{}'", source_file))?;

    let uncovered: Vec<u32> = file
        .lines
        .iter()
        .filter(|l| l.is_uncovered())
        .map(|l| l.line_number)
        .collect();
    let executable: Vec<u32> = file
        .lines
        .iter()
        .filter(|l| l.exec_count.is_some())
        .map(|l| l.line_number)
        .collect();
    let partial: Vec<&FileLine> = file
        .lines
        .iter()
        .filter(|l| !l.is_uncovered() && !l.uncovered_regions.is_empty())
        .collect();

    if uncovered.is_empty() && partial.is_empty() {
        return Ok(format!(
            "All executable lines and regions are covered in '{}'\n",
            source_file
        ));
    }

    let mut out = String::new();
    if !uncovered.is_empty() {
        writeln!(out, "Uncovered lines in '{}':", source_file).unwrap();
        writeln!(out, "  {}", format_line_ranges(&uncovered, &executable)).unwrap();
        writeln!(out, "  ({} lines)", uncovered.len()).unwrap();
    }
    if !partial.is_empty() {
        writeln!(out, "Partially covered lines in '{}':", source_file).unwrap();
        for line in partial {
            let cols: Vec<String> = line
                .uncovered_regions
                .iter()
                .map(|r| format!("{}-{}", r.start_col + 1, r.end_col()))
                .collect();
            writeln!(
                out,
                "  {:>6}  cols {}  {}",
                line.line_number,
                cols.join(", "),
                line.text.trim()
            )
            .unwrap();
        }
    }
    Ok(out)
}

/// Maximum number of consecutive non-executable lines that can be bridged
/// when coalescing uncovered ranges.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging gaps
/// of at most [`MAX_BRIDGE_GAP`] lines where no gap line is executable.
fn coalesce_ranges(lines: &[u32], executable: &[u32]) -> Vec<(u32, u32)> {
    let Some((&first, rest)) = lines.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut start = first;
    let mut end = first;
    for &line in rest {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP && (end + 1..line).all(|l| executable.binary_search(&l).is_err())
        {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }
    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
fn format_line_ranges(lines: &[u32], executable: &[u32]) -> String {
    coalesce_ranges(lines, executable)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
