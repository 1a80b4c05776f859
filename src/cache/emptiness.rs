use serde_json::Value;

/// True when a document tree holds no meaningful content.
///
/// A missing or empty `content` array and a single childless paragraph
/// (the editor's cleared state) are both empty.
pub fn is_document_empty(document: &Value) -> bool {
    let nodes = match document.get("content") {
        None | Some(Value::Null) => return true,
        Some(Value::Array(nodes)) => nodes,
        Some(_) => return false,
    };
    match nodes.as_slice() {
        [] => true,
        [only] => is_bare_paragraph(only),
        _ => false,
    }
}

pub fn is_blank_entry(title: &str, document: &Value) -> bool {
    title.trim().is_empty() && is_document_empty(document)
}

fn is_bare_paragraph(node: &Value) -> bool {
    if node.get("type").and_then(Value::as_str) != Some("paragraph") {
        return false;
    }
    match node.get("content") {
        None | Some(Value::Null) => true,
        Some(Value::Array(children)) => children.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cleared_and_nodeless_documents_are_equally_empty() {
        let nodeless = json!({"type": "doc", "content": []});
        let cleared = json!({"type": "doc", "content": [{"type": "paragraph"}]});
        let cleared_with_array = json!({"type": "doc", "content": [{"type": "paragraph", "content": []}]});
        assert!(is_document_empty(&nodeless));
        assert!(is_document_empty(&cleared));
        assert!(is_document_empty(&cleared_with_array));
        assert!(is_document_empty(&Value::Null));
        assert!(is_blank_entry("  \t", &cleared));
    }

    #[test]
    fn any_real_node_makes_the_document_non_empty() {
        let text = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "hi"}]}
        ]});
        let image = json!({"type": "doc", "content": [{"type": "image", "attrs": {"src": "a.png"}}]});
        let two_paragraphs = json!({"type": "doc", "content": [{"type": "paragraph"}, {"type": "paragraph"}]});
        assert!(!is_document_empty(&text));
        assert!(!is_document_empty(&image));
        assert!(!is_document_empty(&two_paragraphs));
    }

    #[test]
    fn non_blank_title_is_never_empty() {
        let nodeless = json!({"type": "doc", "content": []});
        assert!(!is_blank_entry("Hello", &nodeless));
        assert!(!is_blank_entry(" x ", &Value::Null));
    }
}
