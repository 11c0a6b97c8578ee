//! Small helpers over the html5ever reference DOM. llvm-cov pages are
//! rendered for browsers and are not well-formed XML, so they go through a
//! real HTML5 tree builder before any table walking happens.
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse a full HTML document and return its root node.
pub fn parse(input: &str) -> Handle {
    let dom = parse_document(RcDom::default(), Default::default()).one(input);
    dom.document
}

/// Whether `node` is an element with the given local name.
pub fn is_element(node: &Handle, tag: &str) -> bool {
    match &node.data {
        NodeData::Element { name, .. } => &*name.local == tag,
        _ => false,
    }
}

/// Value of an attribute on an element.
pub fn attr(node: &Handle, key: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == key)
            .map(|a| String::from(&*a.value)),
        _ => None,
    }
}

/// Whether the element's whitespace-separated `class` list contains `class`.
pub fn has_class(node: &Handle, class: &str) -> bool {
    attr(node, "class")
        .map(|v| v.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

/// All descendant elements with the given tag, in document order.
pub fn find_all(node: &Handle, tag: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    collect(node, &mut |n| is_element(n, tag), &mut found);
    found
}

/// First descendant element (document order) carrying the given class.
pub fn find_by_class(node: &Handle, class: &str) -> Option<Handle> {
    let mut found = Vec::new();
    collect(node, &mut |n| has_class(n, class), &mut found);
    found.into_iter().next()
}

fn collect(node: &Handle, pred: &mut dyn FnMut(&Handle) -> bool, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if pred(child) {
            out.push(child.clone());
        }
        collect(child, pred, out);
    }
}

/// Rows that belong directly to `table`. Rows of nested tables are skipped.
pub fn table_rows(table: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    for child in table.children.borrow().iter() {
        if is_element(child, "tr") {
            rows.push(child.clone());
        } else if ["thead", "tbody", "tfoot"]
            .iter()
            .any(|section| is_element(child, section))
        {
            rows.extend(
                child
                    .children
                    .borrow()
                    .iter()
                    .filter(|n| is_element(n, "tr"))
                    .cloned(),
            );
        }
    }
    rows
}

/// Direct `td`/`th` cells of a row.
pub fn row_cells(row: &Handle) -> Vec<Handle> {
    row.children
        .borrow()
        .iter()
        .filter(|n| is_element(n, "td") || is_element(n, "th"))
        .cloned()
        .collect()
}

/// Concatenated text of every descendant text node.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    push_text(node, &mut out);
    out
}

fn push_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                push_text(child, out);
            }
        }
    }
}
