//! Identifier normalization for declaration and member names.

/// Declaration-style name for a wire name.
///
/// - leading `_` are stripped and `Base` appended (`_InitializeParams` → `InitializeParamsBase`)
/// - leading `$` are stripped
/// - `/` becomes a word separator
/// - the result is PascalCase
pub fn class_name(name: &str) -> String {
    let name = match name.strip_prefix('_') {
        Some(rest) => format!("{}Base", rest.trim_start_matches('_')),
        None => name.to_string(),
    };
    let name = name.trim_start_matches('$').replace('/', "_");
    pascal_case(&name)
}

/// `textDocument_didOpen` → `TextDocumentDidOpen`. Interior capitals are kept.
pub fn pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// `textDocument` → `text_document`, `documentURI` → `document_uri`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            push_separator(&mut out);
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                // end of an acronym: `URIParser` → `uri_parser`
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary {
                push_separator(&mut out);
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn push_separator(out: &mut String) {
    if !out.is_empty() && !out.ends_with('_') {
        out.push('_');
    }
}
