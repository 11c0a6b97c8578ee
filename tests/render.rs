mod common;

use std::path::Path;

use chrono::{TimeZone, Utc};
use covmerge::error::{CovmergeError, Result};
use covmerge::merge::{self, MergedCoverage};
use covmerge::render::{self, HtmlRenderer, RenderContext, Renderer};
use covmerge::report::ReportModel;

fn fixed_context() -> RenderContext {
    RenderContext {
        generated_at: Utc.with_ymd_and_hms(2024, 3, 2, 10, 11, 0).unwrap(),
        ..Default::default()
    }
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn writes_index_file_pages_and_json() {
    let (ft, sg) = common::fixture_reports();
    let reports = [ft, sg];
    let merged = merge::merge(&reports).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged");
    render::write_merged(&merged, &HtmlRenderer::new(fixed_context()), &out).unwrap();

    assert_eq!(
        dir_names(&out),
        vec!["coverage", "index.html", "merged.json", "style.css"]
    );
    assert_eq!(dir_names(&out.join("coverage/src")), vec!["a.c.html", "b.c.html", "c.c.html"]);
    // Only the output itself is left in the parent; no staging directory.
    assert_eq!(dir_names(dir.path()), vec!["merged"]);

    let index = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains("<a href='coverage/src/a.c.html'>src/a.c</a>"));
    assert!(index.contains("<th colspan='4'>FT</th>"));
    assert!(index.contains("<td class='absent' colspan='4'>-</td>"));
    assert!(index.contains("Created: 2024-03-02 10:11:00 UTC"));

    let page = std::fs::read_to_string(out.join("coverage/src/a.c.html")).unwrap();
    assert!(page.contains("href='../../style.css'"));
    assert!(page.contains("SG (not covered)"));
    assert!(page.contains("  if (<span class='red'>x == 1</span>) {"));
    assert!(page.contains("#include &lt;stdio.h&gt;"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("merged.json")).unwrap()).unwrap();
    assert_eq!(json["report_names"], serde_json::json!(["FT", "SG"]));
    assert_eq!(json["files"].as_array().unwrap().len(), 3);
    assert_eq!(json["indexed_files"].as_array().unwrap().len(), 4);
    assert_eq!(json["indexed_files"][0]["line"]["total"], 6);
}

#[test]
fn existing_target_is_never_overwritten() {
    let (ft, sg) = common::fixture_reports();
    let reports = [ft, sg];
    let merged = merge::merge(&reports).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged");
    std::fs::create_dir(&out).unwrap();
    std::fs::write(out.join("keep.txt"), "previous merge").unwrap();

    let err = render::write_merged(&merged, &HtmlRenderer::new(fixed_context()), &out).unwrap_err();
    assert!(matches!(err, CovmergeError::DuplicateOutput(_)), "{err}");
    assert_eq!(dir_names(&out), vec!["keep.txt"]);
}

struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _merged: &MergedCoverage<'_>, out_dir: &Path) -> Result<()> {
        std::fs::write(out_dir.join("index.html"), "half done")?;
        Err(CovmergeError::InvalidMerge("renderer gave up".to_string()))
    }
}

#[test]
fn failed_render_leaves_nothing_behind() {
    let (ft, sg) = common::fixture_reports();
    let reports = [ft, sg];
    let merged = merge::merge(&reports).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged");
    let err = render::write_merged(&merged, &FailingRenderer, &out).unwrap_err();
    assert!(err.to_string().contains("renderer gave up"));
    assert!(!out.exists());
    assert!(dir_names(dir.path()).is_empty());
}

/// Creates the target directory while rendering, the way a concurrent
/// process could.
struct RacingRenderer<'a> {
    target: &'a Path,
}

impl Renderer for RacingRenderer<'_> {
    fn render(&self, merged: &MergedCoverage<'_>, out_dir: &Path) -> Result<()> {
        HtmlRenderer::new(fixed_context()).render(merged, out_dir)?;
        std::fs::create_dir(self.target)?;
        Ok(())
    }
}

#[test]
fn target_created_during_render_is_not_replaced() {
    let (ft, sg) = common::fixture_reports();
    let reports = [ft, sg];
    let merged = merge::merge(&reports).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("merged");
    let err = render::write_merged(&merged, &RacingRenderer { target: &out }, &out).unwrap_err();
    assert!(matches!(err, CovmergeError::DuplicateOutput(_)), "{err}");
    assert!(dir_names(&out).is_empty());
    assert_eq!(dir_names(dir.path()), vec!["merged"]);
}

#[test]
fn colliding_paths_get_separate_pages() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain");
    let dotted = dir.path().join("dotted");
    common::write_report(&plain, &["src/a.c"]);
    common::write_report(&dotted, &["./src/a.c"]);
    let reports = [
        ReportModel::open("P", &plain).unwrap(),
        ReportModel::open("D", &dotted).unwrap(),
    ];
    let merged = merge::merge(&reports).unwrap();
    assert_eq!(merged.files(), ["./src/a.c", "src/a.c"]);

    let out = dir.path().join("merged");
    render::write_merged(&merged, &HtmlRenderer::new(fixed_context()), &out).unwrap();
    assert_eq!(dir_names(&out.join("coverage/src")), vec!["a.c-2.html", "a.c.html"]);

    let index = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains("<a href='coverage/src/a.c.html'>./src/a.c</a>"));
    assert!(index.contains("<a href='coverage/src/a.c-2.html'>src/a.c</a>"));

    let first = std::fs::read_to_string(out.join("coverage/src/a.c.html")).unwrap();
    let second = std::fs::read_to_string(out.join("coverage/src/a.c-2.html")).unwrap();
    assert!(first.contains("<h2>./src/a.c</h2>"));
    assert!(first.contains("P (not covered)"));
    assert!(second.contains("<h2>src/a.c</h2>"));
    assert!(second.contains("D (not covered)"));
}

#[test]
fn two_targets_get_identical_output() {
    let (ft, sg) = common::fixture_reports();
    let reports = [ft, sg];
    let renderer = HtmlRenderer::new(fixed_context());

    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("nested/second");
    render::write_merged(&merge::merge(&reports).unwrap(), &renderer, &first).unwrap();
    render::write_merged(&merge::merge(&reports).unwrap(), &renderer, &second).unwrap();

    for file in [
        "index.html",
        "merged.json",
        "style.css",
        "coverage/src/a.c.html",
        "coverage/src/b.c.html",
        "coverage/src/c.c.html",
    ] {
        assert_eq!(
            std::fs::read_to_string(first.join(file)).unwrap(),
            std::fs::read_to_string(second.join(file)).unwrap(),
            "{file} differs"
        );
    }
}
