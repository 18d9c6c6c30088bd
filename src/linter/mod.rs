//! The subset linter: rejects stylesheets outside the
//! analyzable subset, and warns on syntactically-tolerated-but-imprecise
//! constructs.

pub mod errors;

use crate::errors::{Diagnostic, Level};
use crate::xmltree::LabeledTree;

pub use errors::LinterDiagnosticKind;

/// Local names the analyzable subset tolerates.
const ALLOWED: &[&str] = &[
    "stylesheet",
    "transform",
    "template",
    "apply-templates",
    "for-each",
    "if",
    "choose",
    "when",
    "otherwise",
    "value-of",
    "text",
    "element",
    "attribute",
    "with-param",
    "param",
];

/// Reserved local names that are textually in the stylesheet namespace but
/// get their own dedicated diagnostic category rather than a generic
/// `Disallowed`.
const RESERVED_DISALLOWED: &[&str] = &[
    "document",
    "key",
    "import",
    "include",
    "call-template",
    "variable",
    "sort",
    "number",
    "copy",
    "copy-of",
];

/// String-function tokens whose presence in a `test`/`select` expression is
/// tolerated but warned on.
const COMPLEX_FUNCTION_TOKENS: &[&str] = &[
    "contains(",
    "substring(",
    "concat(",
    "preceding::",
    "following::",
];

/// Path tokens whose presence in a `match` attribute is tolerated but
/// warned on as a "complex pattern".
const COMPLEX_PATTERN_TOKENS: &[&str] = &["//", "ancestor::", "following::"];

/// Outcome of the linter: whether the stylesheet is valid, plus every
/// error and warning it collected.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct LintResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

/// Walk the stylesheet tree depth-first and enforce the allowed-construct
/// subset. Linear in the stylesheet node count.
pub fn lint(stylesheet: &LabeledTree) -> LintResult {
    let mut result = LintResult {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    walk(stylesheet, "/stylesheet", 0, &mut result);
    result.valid = result.errors.is_empty();
    result
}

fn walk(node: &LabeledTree, path: &str, index_among_siblings: usize, result: &mut LintResult) {
    let node_path = if index_among_siblings == 0 {
        path.to_string()
    } else {
        format!("{}[{}]", path, index_among_siblings + 1)
    };

    check_node(node, &node_path, result);

    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for child in &node.children {
        let child_local = child.local_name().to_string();
        let count = counts.entry(child_local.clone()).or_insert(0);
        let child_path = format!("{}/{}", node_path, child_local);
        walk(child, &child_path, *count, result);
        *count += 1;
    }
}

fn check_node(node: &LabeledTree, path: &str, result: &mut LintResult) {
    let local = node.local_name();
    check_literal_element_attrs(node, path, result);
    let is_prefixed = node.tag.contains(':');

    // A node "belongs to the stylesheet namespace" if it
    // carries a namespace prefix, or — for the common unprefixed test
    // fixtures this crate also accepts — its local name is itself drawn
    // from the closed stylesheet vocabulary or the reserved-disallowed
    // set. Anything else is an ordinary literal result element and is
    // never subject to these checks.
    let in_stylesheet_namespace =
        is_prefixed || ALLOWED.contains(&local) || RESERVED_DISALLOWED.contains(&local);
    if !in_stylesheet_namespace {
        return;
    }

    if RESERVED_DISALLOWED.contains(&local) {
        result.errors.push(Diagnostic::at(
            Level::Error,
            format!("construct `{}` is disallowed in the analyzable subset", local),
            path.to_string(),
        ));
        return;
    }

    if !ALLOWED.contains(&local) {
        result.errors.push(Diagnostic::at(
            Level::Error,
            format!("disallowed stylesheet construct `{}`", local),
            path.to_string(),
        ));
        return;
    }

    match local {
        "template" => {
            if node.attr("match").is_none() {
                result.errors.push(Diagnostic::at(
                    Level::Error,
                    "`template` requires a `match` attribute".to_string(),
                    path.to_string(),
                ));
            } else if let Some(m) = node.attr("match") {
                if COMPLEX_PATTERN_TOKENS.iter().any(|t| m.contains(t)) {
                    result.warnings.push(Diagnostic::at(
                        Level::Warn,
                        format!("complex pattern in match=\"{}\"", m),
                        path.to_string(),
                    ));
                }
            }
        }
        "if" => {
            match node.attr("test") {
                None => result.errors.push(Diagnostic::at(
                    Level::Error,
                    "`if` requires a `test` attribute".to_string(),
                    path.to_string(),
                )),
                Some(test) => warn_on_complex_tokens(test, path, result),
            }
        }
        "for-each" => match node.attr("select") {
            None => result.errors.push(Diagnostic::at(
                Level::Error,
                "`for-each` requires a `select` attribute".to_string(),
                path.to_string(),
            )),
            Some(select) => warn_on_complex_tokens(select, path, result),
        },
        "value-of" => {
            if node.attr("select").is_none() {
                result.errors.push(Diagnostic::at(
                    Level::Error,
                    "`value-of` requires a `select` attribute".to_string(),
                    path.to_string(),
                ));
            }
        }
        "apply-templates" => {
            if let Some(select) = node.attr("select") {
                warn_on_complex_tokens(select, path, result);
            }
        }
        "choose" => {
            if node.first_child_named("when").is_none() {
                result.errors.push(Diagnostic::at(
                    Level::Error,
                    "`choose` must contain at least one `when` child".to_string(),
                    path.to_string(),
                ));
            }
        }
        _ => {}
    }

}

/// Attribute-value templates on literal result elements are checked
/// regardless of stylesheet-namespace membership: multi-segment `{...}` forms are rejected wherever they appear.
fn check_literal_element_attrs(node: &LabeledTree, path: &str, result: &mut LintResult) {
    for (name, value) in &node.attrs {
        check_attribute_value_template(value, name, path, result);
    }
}

fn check_attribute_value_template(value: &str, attr_name: &str, path: &str, result: &mut LintResult) {
    let segment_count = value.matches('{').count();
    if segment_count > 1 {
        result.errors.push(Diagnostic::at(
            Level::Error,
            format!(
                "attribute `{}` has a multi-segment attribute-value template `{}`; only one `{{...}}` segment per attribute is analyzable",
                attr_name, value
            ),
            path.to_string(),
        ));
    }
}

fn warn_on_complex_tokens(expr: &str, path: &str, result: &mut LintResult) {
    if COMPLEX_FUNCTION_TOKENS.iter().any(|t| expr.contains(t)) {
        result.warnings.push(Diagnostic::at(
            Level::Warn,
            format!("complex string-function usage in `{}`", expr),
            path.to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InputSource;
    use crate::xmltree;

    fn lint_xml(xml: &str) -> LintResult {
        let tree = xmltree::parse(xml, InputSource::Stylesheet).expect("parse stylesheet");
        lint(&tree)
    }

    #[test]
    fn accepts_minimal_valid_stylesheet() {
        let result = lint_xml(
            r#"<stylesheet>
                <template match="Person">
                    <Individual/>
                </template>
            </stylesheet>"#,
        );
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn rejects_disallowed_reserved_construct() {
        let result = lint_xml(
            r#"<stylesheet>
                <variable name="x" select="1"/>
                <copy-of select="."/>
            </stylesheet>"#,
        );
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn template_without_match_is_an_error() {
        let result = lint_xml(r#"<stylesheet><template/></stylesheet>"#);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn choose_without_when_is_an_error() {
        let result = lint_xml(
            r#"<stylesheet>
                <template match="Person">
                    <choose><otherwise><X/></otherwise></choose>
                </template>
            </stylesheet>"#,
        );
        assert!(!result.valid);
    }

    #[test]
    fn complex_pattern_in_match_is_a_warning_not_an_error() {
        let result = lint_xml(
            r#"<stylesheet><template match="//Person">
                <Individual/>
            </template></stylesheet>"#,
        );
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn multi_segment_attribute_value_template_is_rejected() {
        let result = lint_xml(
            r#"<stylesheet>
                <template match="Person">
                    <Individual fullname="{FirstName}-{LastName}"/>
                </template>
            </stylesheet>"#,
        );
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.message.contains("multi-segment")));
    }

    #[test]
    fn idempotent_on_repeated_runs() {
        let xml = r#"<stylesheet>
            <variable name="x"/>
            <template match="//Person[contains(Name, 'x')]">
                <Individual/>
            </template>
        </stylesheet>"#;
        let first = lint_xml(xml);
        let second = lint_xml(xml);
        assert_eq!(first, second);
    }
}
