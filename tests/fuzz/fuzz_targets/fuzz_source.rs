#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Detail-page parser and count decoder must not panic on any input.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = covmerge::parsers::source::parse(s, "src/fuzz.c", std::path::Path::new("fuzz.c.html"));
        let _ = covmerge::parsers::source::parse_exec_count(s);
    }
});
