/// Parser for the per-file detail pages of an llvm-cov HTML report.
///
/// Detail page structure:
/// ```text
///   <div class='source-name-title'><pre>/abs/path/to/src/a.c</pre></div>
///   <table>
///     <tr><td><pre>Line</pre></td><td><pre>Count</pre></td><td><pre>Source</pre></td></tr>
///     <tr><td class='line-number'><a name='L3' href='#L3'><pre>3</pre></a></td>
///         <td class='covered-line'><pre>12.3k</pre></td>
///         <td class='code'><pre>  if (<span class='red'>x == 1</span>) {</pre></td></tr>
///     ...
///   </table>
/// ```
///
/// The count cell is empty for lines that are not executable. Counts above
/// 999 are abbreviated with a `k` or `M` suffix. Sub-line regions that were
/// never executed are wrapped in `<span class='red'>`.
use std::path::{Path, PathBuf};

use markup5ever_rcdom::{Handle, NodeData};

use super::html;
use crate::error::{CovmergeError, Result};
use crate::model::*;

/// Class of the element holding the original absolute source path.
const TITLE_CLASS: &str = "source-name-title";

/// Class marking a span of source text that was never executed.
const UNCOVERED_CLASS: &str = "red";

/// Hover annotations rendered inside the code cell; not part of the source.
const TOOLTIP_CLASS: &str = "tooltip-content";

/// Macro expansion, template instantiation and branch views that llvm-cov
/// nests after the line's `pre` inside the same code cell.
const EXPANSION_CLASS: &str = "expansion-view";

/// A contiguous run of annotated source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub flagged: bool,
}

impl Segment {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            flagged: false,
        }
    }

    pub fn flagged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            flagged: true,
        }
    }
}

/// Parse one detail page. `origin` is the page's location, used for errors.
pub fn parse(input: &str, src_relative_path: &str, origin: &Path) -> Result<FileCoverage> {
    let doc = html::parse(input);

    let origin_absolute_path = html::find_by_class(&doc, TITLE_CLASS)
        .map(|title| html::text_content(&title).trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            CovmergeError::format(origin, "detail page has no source-name title")
        })?;

    let table = html::find_all(&doc, "table")
        .into_iter()
        .next()
        .ok_or_else(|| CovmergeError::format(origin, "detail page has no table"))?;

    let rows = html::table_rows(&table);
    let (_header, rows) = rows
        .split_first()
        .ok_or_else(|| CovmergeError::format(origin, "detail table has no header row"))?;

    let mut lines: Vec<FileLine> = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let line = parse_row(row, idx + 1, origin)?;
        if let Some(prev) = lines.last() {
            if line.line_number <= prev.line_number {
                return Err(CovmergeError::format(
                    origin,
                    format!(
                        "line {} follows line {}; lines must be increasing",
                        line.line_number, prev.line_number
                    ),
                ));
            }
        }
        lines.push(line);
    }

    Ok(FileCoverage {
        src_relative_path: src_relative_path.to_string(),
        origin_absolute_path,
        lines,
    })
}

fn parse_row(row: &Handle, row_index: usize, origin: &Path) -> Result<FileLine> {
    let cells = html::row_cells(row);
    let [number_cell, count_cell, code_cell] = cells.as_slice() else {
        return Err(CovmergeError::format(
            origin,
            format!("row {row_index} has {} cells, expected 3", cells.len()),
        ));
    };

    let number_text = html::text_content(number_cell);
    let line_number = number_text
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            CovmergeError::parse(
                origin,
                format!("row {row_index}: invalid line number '{}'", number_text.trim()),
            )
        })?;

    let exec_count = parse_exec_count(&html::text_content(count_cell)).map_err(|text| {
        CovmergeError::parse(
            origin,
            format!("line {line_number}: invalid execution count '{text}'"),
        )
    })?;

    let (text, uncovered_regions) = reconstruct(&segments(code_cell));

    Ok(FileLine {
        line_number,
        exec_count,
        text,
        uncovered_regions,
    })
}

/// Decode an execution-count cell.
///
/// Empty text means the line is not executable. Otherwise the text is a
/// decimal number with an optional `k` (x1000) or `M` (x1000000) suffix;
/// the scaled value is truncated to an integer. On failure the offending
/// text is returned.
pub fn parse_exec_count(text: &str) -> std::result::Result<Option<u64>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let (number, multiplier) = if let Some(n) = text.strip_suffix('k') {
        (n, 1_000u128)
    } else if let Some(n) = text.strip_suffix('M') {
        (n, 1_000_000u128)
    } else {
        (text, 1u128)
    };

    decode_scaled(number, multiplier)
        .map(Some)
        .ok_or_else(|| text.to_string())
}

/// `number * multiplier` with exact decimal arithmetic, truncated.
fn decode_scaled(number: &str, multiplier: u128) -> Option<u64> {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) if !f.is_empty() => (i, f),
        Some(_) => return None,
        None => (number, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int_part.is_empty() || !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    let int_value: u128 = int_part.parse().ok()?;
    let mut value = int_value.checked_mul(multiplier)?;
    if !frac_part.is_empty() {
        let scale = 10u128.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
        let frac_value: u128 = frac_part.parse().ok()?;
        value = value.checked_add(frac_value.checked_mul(multiplier)? / scale)?;
    }
    u64::try_from(value).ok()
}

/// Split an annotated code cell into plain and flagged-uncovered runs, in
/// document order. Each flagged element yields exactly one segment, even
/// when empty or adjacent to another flagged element.
pub fn segments(cell: &Handle) -> Vec<Segment> {
    let mut out = Vec::new();
    walk(cell, false, &mut out);
    out
}

fn walk(node: &Handle, flagged: bool, out: &mut Vec<Segment>) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => {
                let contents = contents.borrow();
                match out.last_mut() {
                    // Inside a flagged element the open segment is always its own.
                    Some(last) if flagged || !last.flagged => last.text.push_str(&contents),
                    _ => out.push(Segment::plain(&contents)),
                }
            }
            NodeData::Element { .. } => {
                if html::has_class(child, TOOLTIP_CLASS)
                    || html::has_class(child, EXPANSION_CLASS)
                    || html::is_element(child, "table")
                {
                    continue;
                }
                if !flagged
                    && html::is_element(child, "span")
                    && html::has_class(child, UNCOVERED_CLASS)
                {
                    out.push(Segment::flagged(""));
                    walk(child, true, out);
                    // Text after the flagged element starts a new plain run.
                    out.push(Segment::plain(""));
                } else {
                    walk(child, flagged, out);
                }
            }
            _ => {}
        }
    }
}

/// Rebuild a line's text and its uncovered column ranges from its segments.
///
/// A cursor starts at column 0 and advances by every segment's length;
/// each non-empty flagged segment becomes one region at the cursor.
pub fn reconstruct(segments: &[Segment]) -> (String, Vec<UncoveredLineRegion>) {
    let mut text = String::new();
    let mut regions = Vec::new();
    let mut cursor = 0usize;

    for segment in segments {
        let length = segment.text.chars().count();
        if segment.flagged && length > 0 {
            regions.push(UncoveredLineRegion {
                start_col: cursor,
                length,
            });
        }
        cursor += length;
        text.push_str(&segment.text);
    }

    (text, regions)
}
