//! The guard/predicate mini-language.
//!
//! `EXPR OP LITERAL` atomic comparisons joined by `and`/`or`
//! (case-insensitive), where `EXPR` is a dot- or slash-separated path
//! rooted at the matched node and `LITERAL` is a numeric literal or a
//! single-quoted string. Parsed eagerly into an AST so restriction reconciliation and preimage
//! constraint matching can compare predicates structurally rather than
//! textually.

use serde::{Deserialize, Serialize};

/// Comparison operators the mini-language supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn parse(token: &str) -> Option<(CompareOp, usize)> {
        // Longer operators must be tried before their single-character
        // prefixes (`<=` before `<`).
        const OPS: &[(&str, CompareOp)] = &[
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
            ("=", CompareOp::Eq),
        ];
        for (lexeme, op) in OPS {
            if token.starts_with(lexeme) {
                return Some((*op, lexeme.len()));
            }
        }
        None
    }
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Literal {
    Number(f64),
    Str(String),
}

/// The parsed guard/test AST.
///
/// `Predicate::Or`/`Predicate::And` hold their direct operands in source
/// order; `Not` exists for structural completeness even though the mini-language's surface grammar
/// has no negation token — nothing in this crate currently
/// constructs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        path: String,
        op: CompareOp,
        literal: Literal,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Text the mini-language's grammar does not cover. Preserved verbatim
    /// for proof-trace output.
    Opaque(String),
}

impl Predicate {
    /// Normalized textual form used for deduplication by textual equality.
    pub fn normalized_text(&self) -> String {
        match self {
            Predicate::Compare { path, op, literal } => {
                format!("{} {} {}", path, op_text(*op), literal_text(literal))
            }
            Predicate::And(parts) => parts
                .iter()
                .map(|p| p.normalized_text())
                .collect::<Vec<_>>()
                .join(" and "),
            Predicate::Or(parts) => format!(
                "({})",
                parts
                    .iter()
                    .map(|p| p.normalized_text())
                    .collect::<Vec<_>>()
                    .join(" or ")
            ),
            Predicate::Not(inner) => format!("not({})", inner.normalized_text()),
            Predicate::Opaque(text) => text.clone(),
        }
    }
}

fn op_text(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "==",
        CompareOp::Ne => "!=",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Literal::Str(s) => format!("'{}'", s),
    }
}

/// Parse a guard/test expression. Never fails: text outside the
/// grammar becomes [`Predicate::Opaque`].
pub fn parse(raw: &str) -> Predicate {
    let decoded = decode_entities(raw.trim());
    let disjuncts = split_top_level(&decoded, "or");
    if disjuncts.len() > 1 {
        return Predicate::Or(disjuncts.iter().map(|d| parse_conjunction(d)).collect());
    }
    parse_conjunction(&decoded)
}

fn parse_conjunction(text: &str) -> Predicate {
    let conjuncts = split_top_level(text, "and");
    if conjuncts.len() > 1 {
        return Predicate::And(conjuncts.iter().map(|c| parse_atomic(c)).collect());
    }
    parse_atomic(text)
}

fn parse_atomic(text: &str) -> Predicate {
    let text = text.trim();
    for (i, _) in text.char_indices() {
        let rest = &text[i..];
        if let Some((op, op_len)) = CompareOp::parse(rest) {
            let path = text[..i].trim();
            let literal_raw = text[i + op_len..].trim();
            if path.is_empty() || literal_raw.is_empty() || !is_path_expr(path) {
                continue;
            }
            if let Some(literal) = parse_literal(literal_raw) {
                return Predicate::Compare {
                    path: path.to_string(),
                    op,
                    literal,
                };
            }
        }
    }
    Predicate::Opaque(text.to_string())
}

fn parse_literal(text: &str) -> Option<Literal> {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Some(Literal::Str(text[1..text.len() - 1].to_string()));
    }
    text.parse::<f64>().ok().map(Literal::Number)
}

fn is_path_expr(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '/' || c == '@' || c == '-')
}

/// Split `text` on whole-word occurrences of `keyword` (case-insensitive),
/// never inside a single-quoted literal.
fn split_top_level(text: &str, keyword: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let kw = keyword.to_ascii_lowercase();
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '\'' {
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if !in_quotes {
            let remaining = &text[i..];
            let lower_remaining = remaining.to_ascii_lowercase();
            if lower_remaining.starts_with(&kw) {
                let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
                let after = i + kw.len();
                let after_ok = after >= bytes.len() || !bytes[after].is_ascii_alphanumeric();
                let padded = i > 0 && (bytes[i - 1] as char).is_whitespace()
                    && after < bytes.len()
                    && (bytes[after] as char).is_whitespace();
                if before_ok && after_ok && padded {
                    parts.push(text[start..i].trim().to_string());
                    i = after;
                    start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    parts.push(text[start..].trim().to_string());
    parts
}

/// Decode the XML entity escapes the mini-language must tolerate:
/// `&lt;`, `&gt;`, `&amp;`.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let p = parse("Age >= 0");
        assert_eq!(
            p,
            Predicate::Compare {
                path: "Age".to_string(),
                op: CompareOp::Ge,
                literal: Literal::Number(0.0),
            }
        );
    }

    #[test]
    fn parses_legacy_equals_as_eq() {
        let p = parse("Role = 'manager'");
        assert_eq!(
            p,
            Predicate::Compare {
                path: "Role".to_string(),
                op: CompareOp::Eq,
                literal: Literal::Str("manager".to_string()),
            }
        );
    }

    #[test]
    fn parses_conjunction() {
        let p = parse("Role != 'intern' and Age >= 18 and Salary > 0");
        match p {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn parses_top_level_disjunction_as_single_predicate() {
        let p = parse("Role == 'manager' or Role == 'lead'");
        match p {
            Predicate::Or(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn decodes_entity_escapes() {
        let p = parse("Age &gt;= 18");
        assert_eq!(
            p,
            Predicate::Compare {
                path: "Age".to_string(),
                op: CompareOp::Ge,
                literal: Literal::Number(18.0),
            }
        );
    }

    #[test]
    fn normalized_text_uses_double_equals() {
        let p = parse("Role = 'manager'");
        assert_eq!(p.normalized_text(), "Role == 'manager'");
    }

    #[test]
    fn unparseable_text_is_opaque() {
        let p = parse("starts-with(Name, 'A')");
        assert!(matches!(p, Predicate::Opaque(_)));
    }
}
