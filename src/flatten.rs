//! Flattening of schema-less XML into [`Node`] values.
//!
//! Every element becomes `{tag: value}` where `value` is built from:
//!
//! 1. child elements: a tag seen once merges its value under its own name, a
//!    tag seen several times among the siblings becomes a list of the values of
//!    every occurrence, in document order;
//! 2. attributes, added next to the children (an attribute whose name is
//!    already taken is kept as `xml_<name>`, prefixed again until the key is
//!    free);
//! 3. non-blank text: the bare text when nothing else was collected, otherwise
//!    under `text`, or `xml_text` (and so on) when `text` is already taken.
//!
//! An element with none of these flattens to `{tag: null}`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use roxmltree::{Document, ParsingOptions};

use crate::error::FlowcellError;
use crate::fs_util::read_text;
use crate::node::Node;

pub const TEXT_KEY: &str = "text";
const FALLBACK_PREFIX: &str = "xml_";

/// Flattens `element` into `{tag: value}`.
pub fn flatten(element: roxmltree::Node<'_, '_>) -> Node {
    let tag = element.tag_name().name().to_string();
    Node::Map(BTreeMap::from([(tag, flatten_value(element))]))
}

/// Parses an XML document and flattens its root element.
pub fn flatten_str(text: &str, input: &str) -> Result<Node, FlowcellError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(text, options)
        .map_err(|err| FlowcellError::format(input, err.to_string()))?;
    Ok(flatten(document.root_element()))
}

pub fn flatten_file(path: &Path) -> Result<Node, FlowcellError> {
    let text = read_text(path)?;
    let node = flatten_str(&text, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), "flattened XML document");
    Ok(node)
}

fn flatten_value(element: roxmltree::Node<'_, '_>) -> Node {
    let children = element
        .children()
        .filter(|child| child.is_element())
        .collect::<Vec<_>>();

    let mut occurrences = HashMap::<&str, usize>::new();
    for child in &children {
        *occurrences.entry(child.tag_name().name()).or_default() += 1;
    }

    let mut fields = BTreeMap::<String, Node>::new();
    for child in &children {
        let name = child.tag_name().name();
        let value = flatten_value(*child);
        if occurrences.get(name).copied().unwrap_or(0) > 1 {
            push_repeated(&mut fields, name, value);
        } else {
            fields.insert(name.to_string(), value);
        }
    }

    for attribute in element.attributes() {
        let key = free_key(&fields, attribute.name());
        fields.insert(key, Node::scalar(attribute.value()));
    }

    if let Some(text) = own_text(element) {
        if fields.is_empty() {
            return Node::Scalar(text);
        }
        let key = free_key(&fields, TEXT_KEY);
        fields.insert(key, Node::Scalar(text));
    }

    if fields.is_empty() {
        Node::Null
    } else {
        Node::Map(fields)
    }
}

/// `name`, or `name` behind as many `xml_` prefixes as needed to reach an unused key.
fn free_key(fields: &BTreeMap<String, Node>, name: &str) -> String {
    let mut key = name.to_string();
    while fields.contains_key(&key) {
        key.insert_str(0, FALLBACK_PREFIX);
    }
    key
}

fn push_repeated(fields: &mut BTreeMap<String, Node>, name: &str, value: Node) {
    let slot = fields
        .entry(name.to_string())
        .or_insert_with(|| Node::List(Vec::new()));
    match slot {
        Node::List(items) => items.push(value),
        other => {
            let previous = std::mem::take(other);
            *other = Node::List(vec![previous, value]);
        }
    }
}

/// Direct text content of an element, ignoring text inside its children.
fn own_text(element: roxmltree::Node<'_, '_>) -> Option<String> {
    let text = element
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect::<String>();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(xml: &str) -> Node {
        flatten_str(xml, "test").unwrap()
    }

    #[test]
    fn empty_element_is_null() {
        assert_eq!(flat("<Username/>"), flat("<Username></Username>"));
        assert_eq!(
            flat("<Username>   </Username>").get("Username"),
            Some(&Node::Null)
        );
    }

    #[test]
    fn attribute_named_like_child_is_kept() {
        let node = flat(r#"<Run Flowcell="A"><Flowcell>B</Flowcell></Run>"#);
        let run = node.get("Run").unwrap();
        assert_eq!(run.get("Flowcell"), Some(&Node::scalar("B")));
        assert_eq!(run.get("xml_Flowcell"), Some(&Node::scalar("A")));
    }

    #[test]
    fn text_collision_uses_fallback_key() {
        let node = flat(r#"<Note text="attr">body</Note>"#);
        let note = node.get("Note").unwrap();
        assert_eq!(note.get("text"), Some(&Node::scalar("attr")));
        assert_eq!(note.get("xml_text"), Some(&Node::scalar("body")));
    }

    #[test]
    fn attribute_fallback_never_overwrites() {
        let node = flat(r#"<Run xml_Flowcell="C" Flowcell="A"><Flowcell>B</Flowcell></Run>"#);
        let run = node.get("Run").unwrap();
        assert_eq!(run.get("Flowcell"), Some(&Node::scalar("B")));
        assert_eq!(run.get("xml_Flowcell"), Some(&Node::scalar("C")));
        assert_eq!(run.get("xml_xml_Flowcell"), Some(&Node::scalar("A")));
    }

    #[test]
    fn text_fallback_never_overwrites() {
        let node = flat(r#"<Note text="a" xml_text="b">body</Note>"#);
        let note = node.get("Note").unwrap();
        assert_eq!(note.get("text"), Some(&Node::scalar("a")));
        assert_eq!(note.get("xml_text"), Some(&Node::scalar("b")));
        assert_eq!(note.get("xml_xml_text"), Some(&Node::scalar("body")));
    }

    #[test]
    fn malformed_xml_is_format_error() {
        let err = flatten_str("<Run><Open></Run>", "RunInfo.xml").unwrap_err();
        assert!(matches!(err, FlowcellError::Format { .. }));
    }
}
