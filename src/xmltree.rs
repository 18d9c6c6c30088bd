//! The generic labeled tree producer.
//!
//! This is kept deliberately narrow: it turns schema and stylesheet text
//! into a [`LabeledTree`] and nothing else. Parsing uses `roxmltree`, a
//! non-owning, borrowed-document XML parser; [`LabeledTree`] itself owns
//! its data so it outlives the `roxmltree::Document` it was built from.

use std::collections::BTreeMap;

use crate::errors::{InputSource, PipelineError};

/// A node in the generic labeled tree: a tag, optional text, ordered
/// children, and an attribute map. Produced by [`parse`]; consumed by the
/// schema-to-grammar and stylesheet-to-MTT translators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledTree {
    pub tag: String,
    pub text: Option<String>,
    pub children: Vec<LabeledTree>,
    pub attrs: BTreeMap<String, String>,
    /// Byte offset of this node's opening tag in the source text, used to
    /// anchor diagnostics produced downstream.
    pub byte_start: usize,
    pub byte_end: usize,
}

impl LabeledTree {
    /// Local name, stripped of any namespace prefix (`xsl:template` ->
    /// `template`). The stylesheet namespace check operates on local
    /// names only; this crate does not resolve namespace URIs.
    pub fn local_name(&self) -> &str {
        match self.tag.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.tag,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn children_named(&self, local_name: &str) -> impl Iterator<Item = &LabeledTree> {
        self.children
            .iter()
            .filter(move |c| c.local_name() == local_name)
    }

    pub fn first_child_named(&self, local_name: &str) -> Option<&LabeledTree> {
        self.children_named(local_name).next()
    }

    /// Depth-first pre-order walk over this node and all descendants.
    pub fn walk(&self) -> Vec<&LabeledTree> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

/// Parse `text` (schema or stylesheet XML) into a [`LabeledTree`] rooted at
/// the document element.
pub fn parse(text: &str, source: InputSource) -> Result<LabeledTree, PipelineError> {
    let doc = roxmltree::Document::parse(text).map_err(|e| PipelineError::InputMalformation {
        source,
        message: e.to_string(),
        byte_offset: roxmltree_error_offset(&e, text),
    })?;
    Ok(convert(doc.root_element()))
}

fn roxmltree_error_offset(_err: &roxmltree::Error, _text: &str) -> Option<usize> {
    // roxmltree::Error exposes a `pos()` in (row, col) terms, not a byte
    // offset; callers that need a precise span re-derive it from the text
    // via `line_col` when rendering a report.
    None
}

fn convert(node: roxmltree::Node) -> LabeledTree {
    let local = node.tag_name().name().to_string();
    let tag = match node.tag_name().namespace().and_then(|ns| node.lookup_prefix(ns)) {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
        _ => local,
    };

    let mut attrs = BTreeMap::new();
    for attr in node.attributes() {
        attrs.insert(attr.name().to_string(), attr.value().to_string());
    }

    let mut children = Vec::new();
    let mut text_parts: Vec<String> = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(convert(child));
        } else if child.is_text() {
            if let Some(t) = child.text() {
                let trimmed = t.trim();
                if !trimmed.is_empty() {
                    text_parts.push(trimmed.to_string());
                }
            }
        }
    }

    let text = if text_parts.is_empty() {
        None
    } else {
        Some(text_parts.join(" "))
    };

    let range = node.range();
    LabeledTree {
        tag,
        text,
        children,
        attrs,
        byte_start: range.start,
        byte_end: range.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_element_tree() {
        let xml = r#"<root><a x="1"/><b>hello</b></root>"#;
        let tree = parse(xml, InputSource::SourceSchema).expect("should parse");
        assert_eq!(tree.tag, "root");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].local_name(), "a");
        assert_eq!(tree.children[0].attr("x"), Some("1"));
        assert_eq!(tree.children[1].text.as_deref(), Some("hello"));
    }

    #[test]
    fn rejects_malformed_xml() {
        let xml = "<root><unclosed></root>";
        let err = parse(xml, InputSource::Stylesheet).unwrap_err();
        match err {
            PipelineError::InputMalformation { source, .. } => {
                assert_eq!(source, InputSource::Stylesheet);
            }
            other => panic!("expected InputMalformation, got {:?}", other),
        }
    }

    #[test]
    fn preserves_namespaced_local_name() {
        let xml = r#"<xsl:stylesheet xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="Person"/>
        </xsl:stylesheet>"#;
        let tree = parse(xml, InputSource::Stylesheet).expect("should parse");
        assert_eq!(tree.local_name(), "stylesheet");
        assert_eq!(tree.children[0].local_name(), "template");
    }
}
