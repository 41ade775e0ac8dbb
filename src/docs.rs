//! Documentation-comment cleanup applied to every documented declaration.
use once_cell::sync::Lazy;
use regex::Regex;

static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{@link\s+([^}]+)\}").expect("link-tag regex is valid"));

/// Tags that open a paragraph of their own, with their rendered heading.
const PARAGRAPH_TAGS: [(&str, &str); 4] = [
    ("@proposed", "Proposed in:"),
    ("@sample", "Example:"),
    ("@since", "@since"),
    ("@deprecated", "Deprecated:"),
];

/// Normalize a raw documentation string.
///
/// `{@link Foo}` becomes `Foo`, line breaks are folded into single spaces, and
/// the block tags above are moved onto their own paragraphs.
pub fn normalize(raw: &str) -> String {
    let mut s = LINK_TAG.replace_all(raw, "$1").replace('\n', " ").replace("  ", " ");
    for (tag, heading) in PARAGRAPH_TAGS {
        s = s.replace(tag, &format!("\n\n{heading}"));
    }
    s.trim().to_string()
}

pub fn normalize_opt(raw: Option<&str>) -> String {
    raw.map(normalize).unwrap_or_default()
}
