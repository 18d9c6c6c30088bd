//! Diagnostic helpers for the type-preservation validator.
//!
//! Every condition the validator checks is reported as a
//! [`crate::errors::Diagnostic`] pushed onto the shared proof trace. A
//! semantic mismatch never aborts the pipeline, so there is no dedicated
//! `PipelineError` variant here, only message builders kept next to the
//! checks that raise them.

use crate::errors::{Diagnostic, Level};
use crate::grammar::{Cardinality, RestrictionKey, RestrictionValue};

pub fn no_rule_for_root(root: &str) -> Diagnostic {
    Diagnostic::at(
        Level::Error,
        format!("no transformation rule covers the source root element `{}`", root),
        format!("/{}", root),
    )
}

pub fn uncovered_production(lhs: &str) -> Diagnostic {
    Diagnostic::at(
        Level::Warn,
        format!(
            "source element `{}` is never referenced by any transformation rule; it is silently dropped",
            lhs
        ),
        format!("//{}", lhs),
    )
}

pub fn incompatible_base_types(
    source_elem: &str,
    target_name: &str,
    src_base: &str,
    tgt_base: &str,
) -> Diagnostic {
    Diagnostic::at(
        Level::Error,
        format!(
            "`{}` (type {}) is not compatible with target `{}` (type {})",
            source_elem, src_base, target_name, tgt_base
        ),
        format!("//{}", source_elem),
    )
}

pub fn missing_restriction_warning(
    source_elem: &str,
    target_name: &str,
    key: &RestrictionKey,
    value: &RestrictionValue,
) -> Diagnostic {
    Diagnostic::at(
        Level::Warn,
        format!(
            "target `{}` has {}={}, but source `{}` guarantees no such constraint",
            target_name,
            facet_name(key),
            facet_value(value),
            source_elem
        ),
        format!("//{}", source_elem),
    )
}

pub fn restriction_reconciled(
    source_elem: &str,
    key: &RestrictionKey,
    value: &RestrictionValue,
) -> Diagnostic {
    Diagnostic::new(
        Level::Ok,
        format!(
            "guard on `{}` implies target restriction {}={}",
            source_elem,
            facet_name(key),
            facet_value(value)
        ),
    )
}

pub fn cardinality_warning(
    source_elem: &str,
    target_name: &str,
    src: Cardinality,
    tgt: Cardinality,
) -> Diagnostic {
    Diagnostic::at(
        Level::Warn,
        format!(
            "`{}` -> `{}` cardinality ({},{}) -> ({},{}){}",
            source_elem,
            target_name,
            src.lo,
            cardinality_hi_text(src),
            tgt.lo,
            cardinality_hi_text(tgt),
            cardinality_reason(src, tgt),
        ),
        format!("//{}", source_elem),
    )
}

pub fn cardinality_reconciled(source_elem: &str) -> Diagnostic {
    Diagnostic::new(
        Level::Ok,
        format!(
            "absence of `{}` is guarded away by its governing rule",
            source_elem
        ),
    )
}

fn cardinality_reason(src: Cardinality, tgt: Cardinality) -> &'static str {
    if src.lo == 0 && tgt.lo > 0 {
        ": source may be empty but target requires presence"
    } else if src.hi.map(|h| h > 1).unwrap_or(true) && tgt.hi == Some(1) {
        ": many-to-one drops data"
    } else {
        ""
    }
}

fn cardinality_hi_text(c: Cardinality) -> String {
    match c.hi {
        Some(h) => h.to_string(),
        None => "\u{221e}".to_string(),
    }
}

fn facet_name(key: &RestrictionKey) -> &'static str {
    match key {
        RestrictionKey::MinInclusive => "minInclusive",
        RestrictionKey::MaxInclusive => "maxInclusive",
        RestrictionKey::MinExclusive => "minExclusive",
        RestrictionKey::MaxExclusive => "maxExclusive",
        RestrictionKey::Enumeration => "enumeration",
        RestrictionKey::Pattern => "pattern",
        RestrictionKey::Length => "length",
        RestrictionKey::MinLength => "minLength",
        RestrictionKey::MaxLength => "maxLength",
    }
}

fn facet_value(value: &RestrictionValue) -> String {
    match value {
        RestrictionValue::Single(s) => s.clone(),
        RestrictionValue::Many(values) => format!("{{{}}}", values.join(", ")),
    }
}
