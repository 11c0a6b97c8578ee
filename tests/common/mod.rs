#![allow(dead_code)]

use std::path::{Path, PathBuf};

use covmerge::report::ReportModel;

/// Path of a checked-in report under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// The two checked-in reports: "FT" covers src/a.c and src/b.c, "SG" covers
/// src/b.c and src/c.c.
pub fn fixture_reports() -> (ReportModel, ReportModel) {
    let ft = ReportModel::open("FT", fixture("report_ft")).unwrap();
    let sg = ReportModel::open("SG", fixture("report_sg")).unwrap();
    (ft, sg)
}

const HEADINGS: &str = "<tr><td class='column-entry-bold'>Filename</td>\
    <td class='column-entry-bold'>Function Coverage</td>\
    <td class='column-entry-bold'>Line Coverage</td>\
    <td class='column-entry-bold'>Region Coverage</td>\
    <td class='column-entry-bold'>Branch Coverage</td></tr>";

/// Write a minimal llvm-cov style report at `root`: every file gets one
/// covered line and `(1/1)` in every metric.
pub fn write_report(root: &Path, files: &[&str]) {
    std::fs::create_dir_all(root.join("coverage")).unwrap();
    std::fs::write(root.join("style.css"), ".red { }\n").unwrap();

    let mut rows = String::new();
    for file in files {
        let href = format!("coverage/{file}.html");
        rows.push_str(&format!(
            "<tr><td><pre><a href='{href}'>{file}</a></pre></td>{}</tr>",
            "<td><pre>100.00% (1/1)</pre></td>".repeat(4)
        ));
        let page = root.join(&href);
        std::fs::create_dir_all(page.parent().unwrap()).unwrap();
        std::fs::write(&page, detail_page(&format!("/proj/{file}"), &[(1, "1", "x();")])).unwrap();
    }
    let n = files.len();
    rows.push_str(&format!(
        "<tr><td><pre>Totals</pre></td>{}</tr>",
        format!("<td><pre>100.00% ({n}/{n})</pre></td>").repeat(4)
    ));
    std::fs::write(root.join("index.html"), index_page(HEADINGS, &rows)).unwrap();
}

pub fn index_page(headings: &str, rows: &str) -> String {
    format!(
        "<!doctype html><html><body><table>{headings}{rows}</table>\
         <table>{headings}</table></body></html>"
    )
}

pub fn detail_page(abs_path: &str, lines: &[(u32, &str, &str)]) -> String {
    let mut rows = String::new();
    for (n, count, code) in lines {
        let count_cell = if count.is_empty() {
            "<td class='skipped-line'></td>".to_string()
        } else {
            format!("<td class='covered-line'><pre>{count}</pre></td>")
        };
        rows.push_str(&format!(
            "<tr><td class='line-number'><a name='L{n}' href='#L{n}'><pre>{n}</pre></a></td>\
             {count_cell}<td class='code'><pre>{code}</pre></td></tr>"
        ));
    }
    format!(
        "<!doctype html><html><body><div class='centered'><table>\
         <div class='source-name-title'><pre>{abs_path}</pre></div>\
         <tr><td><pre>Line</pre></td><td><pre>Count</pre></td><td><pre>Source</pre></td></tr>\
         {rows}</table></div></body></html>"
    )
}
