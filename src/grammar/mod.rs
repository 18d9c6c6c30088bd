//! Regular tree grammars: the schema-to-grammar output.

mod builder;
pub mod errors;

pub use builder::build;
pub use errors::GrammarError;

use std::collections::BTreeMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Atomic type labels: the closed set of scalar types a leaf production can
/// resolve to. Unknown `xs:*` references downgrade to `String` with a
/// warning; everything else is a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AtomType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
}

impl AtomType {
    /// Parse an `xs:*` built-in type name, returning `None` for anything
    /// not in the closed Σ set (caller downgrades to `String` + warning).
    pub fn from_xs_name(name: &str) -> Option<AtomType> {
        match name {
            "string" | "normalizedString" | "token" | "ID" | "IDREF" | "anyURI" => {
                Some(AtomType::String)
            }
            "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" => Some(AtomType::Integer),
            "decimal" | "float" | "double" => Some(AtomType::Decimal),
            "boolean" => Some(AtomType::Boolean),
            "date" | "dateTime" | "time" => Some(AtomType::Date),
            _ => None,
        }
    }

    /// Base-type compatibility: equal, both numeric, or
    /// (`String` source, `String`-family target).
    pub fn compatible_with(&self, other: &AtomType) -> bool {
        if self == other {
            return true;
        }
        let numeric = |t: &AtomType| matches!(t, AtomType::Integer | AtomType::Decimal);
        numeric(self) && numeric(other)
    }
}

/// A symbol on the right-hand side of a production: either another
/// nonterminal (by name) or an atomic Σ type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    NonTerminal(String),
    Atomic(AtomType),
}

/// Production grouping kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionKind {
    Sequence,
    Choice,
    All,
}

/// Occurrence bounds. `hi = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinality {
    pub lo: u32,
    pub hi: Option<u32>,
}

impl Cardinality {
    pub const ONE: Cardinality = Cardinality {
        lo: 1,
        hi: Some(1),
    };

    pub fn new(lo: u32, hi: Option<u32>) -> Self {
        Cardinality { lo, hi }
    }

    pub fn unbounded_from(lo: u32) -> Self {
        Cardinality { lo, hi: None }
    }

    /// Serialize `hi` for output formats with no `Option`, mapping
    /// unbounded to `-1`.
    pub fn hi_serialized(&self) -> i64 {
        self.hi.map(|h| h as i64).unwrap_or(-1)
    }

    pub fn is_valid(&self) -> bool {
        match self.hi {
            Some(hi) => hi >= self.lo,
            None => true,
        }
    }
}

/// A single production of the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub lhs: String,
    pub rhs: Vec<Symbol>,
    pub kind: ProductionKind,
    pub cardinality: Cardinality,
}

/// A closed set of XSD facet keywords restrictions may carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestrictionKey {
    MinInclusive,
    MaxInclusive,
    MinExclusive,
    MaxExclusive,
    Enumeration,
    Pattern,
    Length,
    MinLength,
    MaxLength,
}

impl RestrictionKey {
    pub fn from_facet_name(name: &str) -> Option<RestrictionKey> {
        match name {
            "minInclusive" => Some(RestrictionKey::MinInclusive),
            "maxInclusive" => Some(RestrictionKey::MaxInclusive),
            "minExclusive" => Some(RestrictionKey::MinExclusive),
            "maxExclusive" => Some(RestrictionKey::MaxExclusive),
            "enumeration" => Some(RestrictionKey::Enumeration),
            "pattern" => Some(RestrictionKey::Pattern),
            "length" => Some(RestrictionKey::Length),
            "minLength" => Some(RestrictionKey::MinLength),
            "maxLength" => Some(RestrictionKey::MaxLength),
            _ => None,
        }
    }
}

/// Restriction literal values. `enumeration` accumulates every occurrence;
/// every other facet keeps its last-seen value (schemas do not repeat
/// them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RestrictionValue {
    Single(String),
    Many(Vec<String>),
}

/// `type_constraints` entry: an element's base type plus its facets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConstraint {
    pub base_type: AtomType,
    pub restrictions: BTreeMap<RestrictionKey, RestrictionValue>,
}

impl TypeConstraint {
    pub fn atomic(base_type: AtomType) -> Self {
        TypeConstraint {
            base_type,
            restrictions: BTreeMap::new(),
        }
    }
}

/// One declared attribute of an element: name, referenced type, whether
/// `use="required"`, and any facets from an inline `simpleType` restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub type_ref: AtomType,
    pub required: bool,
    #[serde(default)]
    pub restrictions: BTreeMap<RestrictionKey, RestrictionValue>,
}

/// A regular tree grammar, G = (N, Σ, P, S) plus type constraints and
/// attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grammar {
    pub root: String,
    pub productions: Vec<Production>,
    pub type_constraints: BTreeMap<String, TypeConstraint>,
    pub attributes: BTreeMap<String, Vec<AttributeDecl>>,
    /// Index from an element name to the positions in `productions` where
    /// it appears as `lhs`, in insertion order, so callers can iterate a
    /// name's productions deterministically without a full scan.
    #[serde(skip)]
    productions_by_lhs: IndexMap<String, Vec<usize>>,
}

impl Grammar {
    pub fn new(root: impl Into<String>) -> Self {
        Grammar {
            root: root.into(),
            productions: Vec::new(),
            type_constraints: BTreeMap::new(),
            attributes: BTreeMap::new(),
            productions_by_lhs: IndexMap::new(),
        }
    }

    pub fn add_production(&mut self, production: Production) {
        let idx = self.productions.len();
        self.productions_by_lhs
            .entry(production.lhs.clone())
            .or_default()
            .push(idx);
        self.productions.push(production);
    }

    pub fn productions_for(&self, name: &str) -> impl Iterator<Item = &Production> {
        self.productions_by_lhs
            .get(name)
            .into_iter()
            .flat_map(move |idxs| idxs.iter().map(move |&i| &self.productions[i]))
    }

    pub fn has_nonterminal(&self, name: &str) -> bool {
        self.productions_by_lhs.contains_key(name)
    }

    /// A "simple leaf production": the element's only production has a
    /// single rhs symbol and that symbol is atomic, e.g. `Age -> integer`.
    /// Distinguishes top-level structural patterns from scalar leaves.
    pub fn is_leaf(&self, name: &str) -> bool {
        let mut prods = self.productions_for(name).peekable();
        let Some(first) = prods.next() else {
            return false;
        };
        if prods.peek().is_some() {
            return false;
        }
        matches!(first.rhs.as_slice(), [Symbol::Atomic(_)])
    }

    /// Rebuild the lhs index. Used after deserializing a `Grammar` whose
    /// index was skipped, or after bulk-mutating `productions` directly.
    pub fn reindex(&mut self) {
        self.productions_by_lhs.clear();
        for (idx, p) in self.productions.iter().enumerate() {
            self.productions_by_lhs
                .entry(p.lhs.clone())
                .or_default()
                .push(idx);
        }
    }

    /// Every rhs symbol is either atomic or the lhs of some production.
    pub fn every_symbol_resolves(&self) -> bool {
        for p in &self.productions {
            for sym in &p.rhs {
                if let Symbol::NonTerminal(name) = sym {
                    if !self.has_nonterminal(name) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// The root appears as the lhs of at least one production.
    pub fn root_has_production(&self) -> bool {
        self.has_nonterminal(&self.root)
    }
}
