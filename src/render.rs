//! Output of a merged comparison as a browsable directory.
//!
//! The merge core hands a [`MergedCoverage`] to a [`Renderer`]; everything
//! the renderer needs besides the data travels in a [`RenderContext`].
//! [`write_merged`] stages the output next to the target and moves it into
//! place only once rendering succeeded, so the target is either complete or
//! absent.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{CovmergeError, Result};
use crate::merge::{FileComparison, MergedCoverage, ReportEntry};
use crate::model::*;

pub const DEFAULT_STYLESHEET: &str = include_str!("../assets/style.css");

/// Directory, inside the output, holding one page per source file.
pub const FILES_DIR: &str = "coverage";

/// Presentation settings passed once to a renderer.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub title: String,
    pub stylesheet: String,
    pub generated_at: DateTime<Utc>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            title: "Merged Coverage Report".to_string(),
            stylesheet: DEFAULT_STYLESHEET.to_string(),
            generated_at: Utc::now(),
        }
    }
}

/// Turns merged data into files under an (existing, empty) directory.
pub trait Renderer {
    fn render(&self, merged: &MergedCoverage<'_>, out_dir: &Path) -> Result<()>;
}

/// Render `merged` into `target`, which must not exist yet.
pub fn write_merged(
    merged: &MergedCoverage<'_>,
    renderer: &dyn Renderer,
    target: &Path,
) -> Result<()> {
    if target.exists() {
        return Err(CovmergeError::DuplicateOutput(target.to_path_buf()));
    }
    let name = target.file_name().ok_or_else(|| {
        CovmergeError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("output path {} has no final component", target.display()),
        ))
    })?;
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let staging = parent.join(format!(
        ".{}.partial-{}",
        name.to_string_lossy(),
        std::process::id()
    ));
    fs::create_dir(&staging)?;
    debug!(staging = %staging.display(), "rendering into staging directory");

    let committed = renderer
        .render(merged, &staging)
        .and_then(|()| commit(&staging, target));
    if committed.is_err() {
        let _ = fs::remove_dir_all(&staging);
    }
    committed?;

    info!(output = %target.display(), files = merged.files().len(), "wrote merged report");
    Ok(())
}

/// Claim `target` with `create_dir`, which fails if anything appeared there
/// meanwhile, then move the staged entries in. A failed move removes the
/// claimed target again.
fn commit(staging: &Path, target: &Path) -> Result<()> {
    match fs::create_dir(target) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(CovmergeError::DuplicateOutput(target.to_path_buf()));
        }
        other => other?,
    }
    let moved = move_entries(staging, target);
    if moved.is_err() {
        let _ = fs::remove_dir_all(target);
    }
    moved
}

fn move_entries(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        fs::rename(entry.path(), to.join(entry.file_name()))?;
    }
    fs::remove_dir(from)?;
    Ok(())
}

/// Static HTML pages plus a JSON dump of the merged index data.
pub struct HtmlRenderer {
    pub context: RenderContext,
}

impl HtmlRenderer {
    pub fn new(context: RenderContext) -> Self {
        Self { context }
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, merged: &MergedCoverage<'_>, out_dir: &Path) -> Result<()> {
        fs::write(out_dir.join("style.css"), &self.context.stylesheet)?;
        let pages = page_paths(merged.files());
        fs::write(out_dir.join("index.html"), self.index_page(merged, &pages))?;
        fs::write(
            out_dir.join("merged.json"),
            serde_json::to_string_pretty(&merged.snapshot())?,
        )?;

        for (path, rel) in merged.files().iter().zip(&pages) {
            let Some(comparison) = merged.file_detail(path) else {
                continue;
            };
            let dst = out_dir.join(rel);
            if let Some(dir) = dst.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&dst, self.file_page(&comparison, rel))?;
        }
        Ok(())
    }
}

impl HtmlRenderer {
    fn header(&self, out: &mut String, stylesheet_href: &str, heading: &str) {
        let title = escape(&self.context.title);
        writeln!(out, "<!doctype html><html><head><meta charset='UTF-8'>").unwrap();
        writeln!(out, "<title>{title}</title>").unwrap();
        writeln!(
            out,
            "<link rel='stylesheet' type='text/css' href='{}'></head><body>",
            escape(stylesheet_href)
        )
        .unwrap();
        writeln!(out, "<h2>{}</h2>", escape(heading)).unwrap();
        writeln!(
            out,
            "<h4>Created: {}</h4>",
            self.context.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .unwrap();
    }

    fn index_page(&self, merged: &MergedCoverage<'_>, pages: &[PathBuf]) -> String {
        let mut by_key: HashMap<(&str, &str), &MetricSet> = HashMap::new();
        for record in merged.listing() {
            by_key.insert(
                (record.src_relative_path.as_str(), record.report_name.as_str()),
                &record.metrics,
            );
        }

        let mut out = String::new();
        self.header(&mut out, "style.css", &self.context.title);
        out.push_str("<table>\n<tr><th rowspan='2'>Filename</th>");
        for name in merged.report_names() {
            write!(out, "<th colspan='4'>{}</th>", escape(name)).unwrap();
        }
        out.push_str("</tr>\n<tr>");
        for _ in merged.report_names() {
            out.push_str("<th>Function</th><th>Line</th><th>Region</th><th>Branch</th>");
        }
        out.push_str("</tr>\n");

        for (path, href) in merged.files().iter().zip(pages) {
            write!(
                out,
                "<tr><td class='file-name'><a href='{}'>{}</a></td>",
                escape(&href_string(href)),
                escape(path)
            )
            .unwrap();
            for name in merged.report_names() {
                match by_key.get(&(path.as_str(), name.as_str())) {
                    Some(metrics) => metric_cells(&mut out, metrics),
                    None => out.push_str("<td class='absent' colspan='4'>-</td>"),
                }
            }
            out.push_str("</tr>\n");
        }

        out.push_str("<tr class='totals'><td>Totals</td>");
        for (_, totals) in merged.totals() {
            metric_cells(&mut out, &totals.metrics);
        }
        out.push_str("</tr>\n</table>\n</body></html>\n");
        out
    }

    fn file_page(&self, comparison: &FileComparison<'_>, rel: &Path) -> String {
        let depth = rel.components().count().saturating_sub(1);
        let stylesheet = format!("{}style.css", "../".repeat(depth));

        let mut out = String::new();
        self.header(&mut out, &stylesheet, &comparison.src_relative_path);

        out.push_str("<table>\n<tr><th rowspan='2'>Line</th>");
        for entry in &comparison.entries {
            let label = match entry.coverage {
                Some(c) => format!(
                    "{}<br><small>{}</small>",
                    escape(entry.report_name),
                    escape(&c.origin_absolute_path.display().to_string())
                ),
                None => format!("{} (not covered)", escape(entry.report_name)),
            };
            write!(out, "<th colspan='2'>{label}</th>").unwrap();
        }
        out.push_str("</tr>\n<tr>");
        for _ in &comparison.entries {
            out.push_str("<th>Count</th><th>Source</th>");
        }
        out.push_str("</tr>\n");

        for number in comparison.line_numbers() {
            write!(out, "<tr><td class='line-number'>{number}</td>").unwrap();
            for entry in &comparison.entries {
                line_cells(&mut out, entry, number);
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</table>\n</body></html>\n");
        out
    }
}

fn metric_cells(out: &mut String, metrics: &MetricSet) {
    for value in [metrics.function, metrics.line, metrics.region, metrics.branch] {
        let class = if value.total == 0 {
            ""
        } else if value.rate() >= 0.8 {
            " high"
        } else if value.rate() >= 0.5 {
            " medium"
        } else {
            " low"
        };
        write!(
            out,
            "<td class='metric{class}'>{} ({}/{})</td>",
            percent(&value),
            value.covered,
            value.total
        )
        .unwrap();
    }
}

fn line_cells(out: &mut String, entry: &ReportEntry<'_>, number: u32) {
    let Some(line) = entry.coverage.and_then(|c| c.line(number)) else {
        out.push_str("<td class='absent'></td><td class='absent'></td>");
        return;
    };
    let (class, count) = match line.exec_count {
        None => ("", String::new()),
        Some(0) => (" uncovered-line", "0".to_string()),
        Some(n) => (" covered-line", n.to_string()),
    };
    write!(
        out,
        "<td class='count{class}'>{count}</td><td class='code'>{}</td>",
        highlight(&line.text, &line.uncovered_regions)
    )
    .unwrap();
}

/// `12.50%`, or `-` when there is nothing to cover.
fn percent(value: &CoverageMetricValue) -> String {
    if value.total == 0 {
        "-".to_string()
    } else {
        format!("{:.2}%", value.rate() * 100.0)
    }
}

/// Escape `text` and wrap each uncovered region in `<span class='red'>`.
/// Columns count characters.
pub fn highlight(text: &str, regions: &[UncoveredLineRegion]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let slice = |from: usize, to: usize| escape(&chars[from..to].iter().collect::<String>());

    let mut out = String::new();
    let mut pos = 0;
    for region in regions {
        let start = region.start_col.clamp(pos, chars.len());
        let end = region.end_col().min(chars.len());
        if start >= end {
            continue;
        }
        out.push_str(&slice(pos, start));
        write!(out, "<span class='red'>{}</span>", slice(start, end)).unwrap();
        pos = end;
    }
    out.push_str(&slice(pos, chars.len()));
    out
}

/// Output page for a relative source path: `coverage/<path>.html`, keeping
/// only normal path components.
pub fn file_page_path(src_relative_path: &str) -> PathBuf {
    let mut path = PathBuf::from(FILES_DIR);
    for component in Path::new(src_relative_path).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    let file_name = path
        .file_name()
        .map(|n| format!("{}.html", n.to_string_lossy()))
        .unwrap_or_else(|| "index.html".to_string());
    path.set_file_name(file_name);
    path
}

/// One output page per path, in the same order. Paths that clean up to the
/// same page (`src/a.c`, `./src/a.c`, `src//a.c`) get a numbered name such as
/// `a.c-2.html`. A page whose directory is already another page falls back to
/// `coverage/page-N.html`.
pub fn page_paths(files: &[String]) -> Vec<PathBuf> {
    let mut used_pages: HashSet<PathBuf> = HashSet::new();
    let mut used_dirs: HashSet<PathBuf> = HashSet::new();
    let mut pages = Vec::with_capacity(files.len());
    for file in files {
        let base = file_page_path(file);
        let dir_is_free = !under_page(&base, &used_pages);
        let mut page = base.clone();
        let mut n = 1;
        while used_pages.contains(&page)
            || used_dirs.contains(&page)
            || under_page(&page, &used_pages)
        {
            n += 1;
            page = if dir_is_free {
                numbered(&base, n)
            } else {
                Path::new(FILES_DIR).join(format!("page-{n}.html"))
            };
        }
        used_dirs.extend(page.ancestors().skip(1).map(Path::to_path_buf));
        used_pages.insert(page.clone());
        pages.push(page);
    }
    pages
}

fn under_page(page: &Path, used_pages: &HashSet<PathBuf>) -> bool {
    page.ancestors().skip(1).any(|dir| used_pages.contains(dir))
}

/// `coverage/src/a.c.html` -> `coverage/src/a.c-2.html`.
fn numbered(page: &Path, n: usize) -> PathBuf {
    let name = page.file_name().map(|f| f.to_string_lossy()).unwrap_or_default();
    let stem = name.strip_suffix(".html").unwrap_or(&name[..]);
    page.with_file_name(format!("{stem}-{n}.html"))
}

fn href_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
