//! Page introspection for the `page_snapshot` tool.

use std::collections::HashSet;

use serde::Serialize;

use super::effector::ElementDescriptor;

/// Most elements a snapshot reports.
pub const MAX_SNAPSHOT_ELEMENTS: usize = 60;

/// Visible text is cut to this many characters per element.
const MAX_TEXT_CHARS: usize = 80;

/// One annotated element in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    /// Lookup expression the model can hand back to other tools
    pub selector: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Best-effort lookup expression for an element.
///
/// Preference: `#id`, then `tag[name="…"]`, then `[aria-label="…"]`, then
/// `tag.class1.class2`, then the bare tag. The result is not guaranteed to be
/// unique on the page.
pub fn best_effort_lookup(element: &ElementDescriptor) -> String {
    let tag = element.tag.to_ascii_lowercase();

    if let Some(id) = non_empty(&element.id) {
        return if is_css_identifier(id) {
            format!("#{id}")
        } else {
            format!("[id=\"{}\"]", escape_attribute(id))
        };
    }
    if let Some(name) = non_empty(&element.name) {
        return format!("{tag}[name=\"{}\"]", escape_attribute(name));
    }
    if let Some(label) = non_empty(&element.aria_label) {
        return format!("[aria-label=\"{}\"]", escape_attribute(label));
    }

    let classes: Vec<&str> = element
        .classes
        .iter()
        .map(String::as_str)
        .filter(|c| is_css_identifier(c))
        .collect();
    if classes.is_empty() {
        tag
    } else {
        format!("{tag}.{}", classes.join("."))
    }
}

/// Annotate, deduplicate and cap the host's element list.
///
/// Elements collapse when both their lookup expression and their text match;
/// document order is preserved.
pub fn build_snapshot(elements: Vec<ElementDescriptor>) -> Vec<SnapshotEntry> {
    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    let mut entries = Vec::new();

    for element in elements {
        if entries.len() == MAX_SNAPSHOT_ELEMENTS {
            break;
        }
        let selector = best_effort_lookup(&element);
        let text = non_empty(&element.text)
            .map(|t| truncate_chars(&collapse_whitespace(t), MAX_TEXT_CHARS));
        if !seen.insert((selector.clone(), text.clone())) {
            continue;
        }
        entries.push(SnapshotEntry {
            selector,
            tag: element.tag.to_ascii_lowercase(),
            text,
            role: element.role,
            label: element.aria_label,
        });
    }

    entries
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn is_css_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn escape_attribute(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((byte_index, _)) => value[..byte_index].to_string(),
        None => value.to_string(),
    }
}
