//! Conversion between plain editor text and the rich-text document tree.
//!
//! Documents are `{"type":"doc","content":[...]}` trees. Everything outside
//! this module treats them as opaque values.

use serde_json::{json, Map, Value};

use crate::cache::is_document_empty;

/// The cleared document: one paragraph with no children.
pub fn empty_document() -> Value {
    json!({"type": "doc", "content": [{"type": "paragraph"}]})
}

/// One paragraph per line; blank lines become bare paragraphs.
pub fn text_to_document(text: &str) -> Value {
    if text.is_empty() {
        return empty_document();
    }
    let paragraphs: Vec<Value> = text
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                json!({"type": "paragraph"})
            } else {
                json!({"type": "paragraph", "content": [{"type": "text", "text": line}]})
            }
        })
        .collect();
    json!({"type": "doc", "content": paragraphs})
}

/// Best-effort plain text: text nodes are concatenated, block nodes end a line,
/// `hardBreak` inserts one. Non-text nodes such as images contribute nothing.
pub fn document_to_text(document: &Value) -> String {
    let mut lines = Vec::new();
    match document.get("content").and_then(Value::as_array) {
        Some(blocks) => {
            for block in blocks {
                let mut line = String::new();
                collect_text(block, &mut line, &mut lines);
                lines.push(line);
            }
        }
        None => return String::new(),
    }
    lines.join("\n")
}

/// True when editing the plain text and converting back loses nothing.
/// Headings, images, marks and attributes all fail this.
pub fn is_plain_text_document(document: &Value) -> bool {
    is_document_empty(document) || text_to_document(&document_to_text(document)) == *document
}

fn collect_text(node: &Value, line: &mut String, lines: &mut Vec<String>) {
    let Some(object) = node.as_object() else {
        return;
    };
    match node_type(object) {
        Some("text") => {
            if let Some(text) = object.get("text").and_then(Value::as_str) {
                line.push_str(text);
            }
        }
        Some("hardBreak") => lines.push(std::mem::take(line)),
        _ => {
            let Some(children) = object.get("content").and_then(Value::as_array) else {
                return;
            };
            for (idx, child) in children.iter().enumerate() {
                let is_block = child
                    .as_object()
                    .and_then(node_type)
                    .map(|kind| kind != "text" && kind != "hardBreak")
                    .unwrap_or(false);
                if is_block && idx > 0 && !line.is_empty() {
                    lines.push(std::mem::take(line));
                }
                collect_text(child, line, lines);
            }
        }
    }
}

fn node_type(object: &Map<String, Value>) -> Option<&str> {
    object.get("type").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_maps_to_the_cleared_document() {
        let doc = text_to_document("");
        assert_eq!(doc, empty_document());
        assert!(is_document_empty(&doc));
    }

    #[test]
    fn lines_become_paragraphs_and_back() {
        let text = "first line\n\nthird line";
        let doc = text_to_document(text);
        assert_eq!(doc["content"].as_array().map(Vec::len), Some(3));
        assert_eq!(doc["content"][1], json!({"type": "paragraph"}));
        assert_eq!(document_to_text(&doc), text);
    }

    #[test]
    fn rich_nodes_flatten_to_their_text() {
        let doc = json!({"type": "doc", "content": [
            {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Trip"}]},
            {"type": "paragraph", "content": [
                {"type": "text", "text": "day "},
                {"type": "text", "marks": [{"type": "bold"}], "text": "one"},
                {"type": "hardBreak"},
                {"type": "text", "text": "night"}
            ]},
            {"type": "image", "attrs": {"src": "x.png"}}
        ]});
        assert_eq!(document_to_text(&doc), "Trip\nday one\nnight\n");
        assert!(!is_plain_text_document(&doc));
    }

    #[test]
    fn only_plain_paragraphs_count_as_plain_text() {
        assert!(is_plain_text_document(&text_to_document("one\n\ntwo")));
        assert!(is_plain_text_document(&json!({"type": "doc", "content": []})));
        assert!(is_plain_text_document(&Value::Null));
        let image = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "look"}]},
            {"type": "image", "attrs": {"src": "a.png"}}
        ]});
        assert!(!is_plain_text_document(&image));
        let bold = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "marks": [{"type": "bold"}], "text": "loud"}]}
        ]});
        assert!(!is_plain_text_document(&bold));
    }
}
