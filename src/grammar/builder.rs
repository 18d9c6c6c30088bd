//! Schema-to-grammar translation.

use std::collections::{HashMap, HashSet};

use crate::errors::{InputSource, PipelineError};
use crate::xmltree::LabeledTree;

use super::errors::{GrammarBuildOutput, GrammarError, GrammarWarning};
use super::{
    AtomType, AttributeDecl, Cardinality, Grammar, Production, ProductionKind, RestrictionKey,
    RestrictionValue, Symbol, TypeConstraint,
};

const XS_PREFIX_SEPARATOR: char = ':';

/// Build a [`Grammar`] from parsed schema XML. The schema's
/// first top-level element becomes the grammar root.
pub fn build(
    schema_tree: &LabeledTree,
    source: InputSource,
) -> Result<GrammarBuildOutput, PipelineError> {
    let mut ctx = BuildContext::new(source);
    ctx.collect_types(schema_tree);

    let root_element = schema_tree
        .children
        .iter()
        .find(|c| c.local_name() == "element")
        .ok_or_else(|| GrammarError::NoRootElement.into_pipeline_error(source))?;

    let root_name = root_element
        .attr("name")
        .ok_or_else(|| GrammarError::NoRootElement.into_pipeline_error(source))?
        .to_string();

    let mut grammar = Grammar::new(root_name);
    let mut visiting = HashSet::new();
    for el in schema_tree.children.iter().filter(|c| c.local_name() == "element") {
        ctx.process_element(el, &mut grammar, &mut visiting)?;
    }

    Ok(GrammarBuildOutput {
        grammar,
        warnings: ctx.warnings,
    })
}

struct BuildContext {
    source: InputSource,
    complex_types: HashMap<String, LabeledTree>,
    simple_types: HashMap<String, LabeledTree>,
    warnings: Vec<GrammarWarning>,
}

impl BuildContext {
    fn new(source: InputSource) -> Self {
        BuildContext {
            source,
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Step 2: scan top-level complex-type and simple-type definitions.
    fn collect_types(&mut self, schema_tree: &LabeledTree) {
        for child in &schema_tree.children {
            match child.local_name() {
                "complexType" => {
                    if let Some(name) = child.attr("name") {
                        self.complex_types.insert(name.to_string(), child.clone());
                    }
                }
                "simpleType" => {
                    if let Some(name) = child.attr("name") {
                        self.simple_types.insert(name.to_string(), child.clone());
                    }
                }
                _ => {}
            }
        }
    }

    /// Step 3: process one `<element>` definition, recursing into inline
    /// type bodies. `visiting` guards against circular element definitions
    ///: a revisit reuses the already-emitted
    /// production instead of recursing again.
    fn process_element(
        &mut self,
        el: &LabeledTree,
        grammar: &mut Grammar,
        visiting: &mut HashSet<String>,
    ) -> Result<(), PipelineError> {
        // `ref=` without `name=` reuses the referenced nonterminal; no new
        // productions are emitted for it.
        if let Some(_r) = el.attr("ref") {
            return Ok(());
        }

        let name = match el.attr("name") {
            Some(n) => n.to_string(),
            None => return Ok(()),
        };

        if grammar.has_nonterminal(&name) || visiting.contains(&name) {
            return Ok(());
        }
        visiting.insert(name.clone());

        let cardinality = parse_cardinality(el, &name, self.source)?;

        if let Some(type_attr) = el.attr("type") {
            self.process_typed_element(&name, type_attr, cardinality, grammar, visiting)?;
        } else if let Some(complex) = el.first_child_named("complexType") {
            self.process_complex_type(&name, complex, cardinality, grammar, visiting)?;
        } else if let Some(simple) = el.first_child_named("simpleType") {
            self.process_simple_type(&name, simple, grammar);
        } else {
            // An element with no type information at all: treat as an
            // opaque string leaf, same as an unknown type reference.
            grammar.add_production(Production {
                lhs: name.clone(),
                rhs: vec![Symbol::Atomic(AtomType::String)],
                kind: ProductionKind::Sequence,
                cardinality,
            });
            grammar
                .type_constraints
                .insert(name, TypeConstraint::atomic(AtomType::String));
        }

        visiting.remove(&name);
        Ok(())
    }

    fn process_typed_element(
        &mut self,
        name: &str,
        type_attr: &str,
        cardinality: Cardinality,
        grammar: &mut Grammar,
        visiting: &mut HashSet<String>,
    ) -> Result<(), PipelineError> {
        let local_type = strip_prefix(type_attr);

        if let Some(base) = AtomType::from_xs_name(local_type) {
            grammar.add_production(Production {
                lhs: name.to_string(),
                rhs: vec![Symbol::Atomic(base)],
                kind: ProductionKind::Sequence,
                cardinality,
            });
            grammar
                .type_constraints
                .insert(name.to_string(), TypeConstraint::atomic(base));
            return Ok(());
        }

        if let Some(complex) = self.complex_types.get(local_type).cloned() {
            self.process_complex_type(name, &complex, cardinality, grammar, visiting)?;
            return Ok(());
        }

        if let Some(simple) = self.simple_types.get(local_type).cloned() {
            self.process_simple_type(name, &simple, grammar);
            return Ok(());
        }

        // Unknown type reference: downgrade to string with a warning
        // rather than aborting.
        self.warnings.push(GrammarWarning::UnknownTypeDowngraded {
            element: name.to_string(),
            type_name: type_attr.to_string(),
        });
        grammar.add_production(Production {
            lhs: name.to_string(),
            rhs: vec![Symbol::Atomic(AtomType::String)],
            kind: ProductionKind::Sequence,
            cardinality,
        });
        grammar
            .type_constraints
            .insert(name.to_string(), TypeConstraint::atomic(AtomType::String));
        Ok(())
    }

    fn process_complex_type(
        &mut self,
        name: &str,
        complex: &LabeledTree,
        cardinality: Cardinality,
        grammar: &mut Grammar,
        visiting: &mut HashSet<String>,
    ) -> Result<(), PipelineError> {
        // Harvest attributes regardless of which content model follows.
        let attrs: Vec<AttributeDecl> = complex
            .children_named("attribute")
            .filter_map(|a| attribute_decl(a))
            .collect();
        if !attrs.is_empty() {
            grammar.attributes.insert(name.to_string(), attrs);
        }

        if let Some(simple_content) = complex.first_child_named("simpleContent") {
            if let Some(extension) = simple_content.first_child_named("extension") {
                if let Some(base) = extension.attr("base") {
                    let base_type =
                        AtomType::from_xs_name(strip_prefix(base)).unwrap_or(AtomType::String);
                    grammar
                        .type_constraints
                        .insert(name.to_string(), TypeConstraint::atomic(base_type));
                    let ext_attrs: Vec<AttributeDecl> = extension
                        .children_named("attribute")
                        .filter_map(|a| attribute_decl(a))
                        .collect();
                    if !ext_attrs.is_empty() {
                        grammar
                            .attributes
                            .entry(name.to_string())
                            .or_default()
                            .extend(ext_attrs);
                    }
                }
            }
            // simpleContent produces no sequence production, but the element is still a nonterminal the rest of
            // the grammar can reference, so register a trivial self
            // production pointing at its base type if one was found.
            if let Some(tc) = grammar.type_constraints.get(name).cloned() {
                grammar.add_production(Production {
                    lhs: name.to_string(),
                    rhs: vec![Symbol::Atomic(tc.base_type)],
                    kind: ProductionKind::Sequence,
                    cardinality,
                });
            }
            return Ok(());
        }

        for (local, kind) in [
            ("sequence", ProductionKind::Sequence),
            ("choice", ProductionKind::Choice),
            ("all", ProductionKind::All),
        ] {
            if let Some(group) = complex.first_child_named(local) {
                let mut rhs = Vec::new();
                for child_el in group.children_named("element") {
                    let child_name = match child_el.attr("ref") {
                        Some(r) => strip_prefix(r).to_string(),
                        None => child_el.attr("name").unwrap_or_default().to_string(),
                    };
                    if child_name.is_empty() {
                        continue;
                    }
                    rhs.push(Symbol::NonTerminal(child_name.clone()));
                    self.process_element(child_el, grammar, visiting)?;
                }
                grammar.add_production(Production {
                    lhs: name.to_string(),
                    rhs,
                    kind,
                    cardinality,
                });
                return Ok(());
            }
        }

        // A complex type with no content model and no simpleContent: an
        // empty element, modeled as a production with no rhs symbols.
        grammar.add_production(Production {
            lhs: name.to_string(),
            rhs: Vec::new(),
            kind: ProductionKind::Sequence,
            cardinality,
        });
        Ok(())
    }

    /// Step 5: a simple type with a `restriction` facet list.
    fn process_simple_type(&mut self, name: &str, simple: &LabeledTree, grammar: &mut Grammar) {
        let Some(restriction) = simple.first_child_named("restriction") else {
            grammar.add_production(Production {
                lhs: name.to_string(),
                rhs: vec![Symbol::Atomic(AtomType::String)],
                kind: ProductionKind::Sequence,
                cardinality: Cardinality::ONE,
            });
            grammar
                .type_constraints
                .insert(name.to_string(), TypeConstraint::atomic(AtomType::String));
            return;
        };

        let (base, restrictions) = parse_restriction(restriction);

        grammar.type_constraints.insert(
            name.to_string(),
            TypeConstraint {
                base_type: base,
                restrictions,
            },
        );
        grammar.add_production(Production {
            lhs: name.to_string(),
            rhs: vec![Symbol::Atomic(base)],
            kind: ProductionKind::Sequence,
            cardinality: Cardinality::ONE,
        });
    }
}

/// Shared facet-table reader for both top-level `simpleType` definitions
/// and inline `simpleType` bodies nested under an
/// `attribute`.
fn parse_restriction(restriction: &LabeledTree) -> (AtomType, std::collections::BTreeMap<RestrictionKey, RestrictionValue>) {
    let base = restriction
        .attr("base")
        .map(strip_prefix)
        .and_then(AtomType::from_xs_name)
        .unwrap_or(AtomType::String);

    let mut restrictions = std::collections::BTreeMap::new();
    let mut enumerations = Vec::new();
    for facet in &restriction.children {
        let Some(key) = RestrictionKey::from_facet_name(facet.local_name()) else {
            continue;
        };
        let Some(value) = facet.attr("value") else {
            continue;
        };
        if key == RestrictionKey::Enumeration {
            enumerations.push(value.to_string());
        } else {
            restrictions.insert(key, RestrictionValue::Single(value.to_string()));
        }
    }
    if !enumerations.is_empty() {
        restrictions.insert(RestrictionKey::Enumeration, RestrictionValue::Many(enumerations));
    }
    (base, restrictions)
}

fn attribute_decl(attr_node: &LabeledTree) -> Option<AttributeDecl> {
    let name = attr_node.attr("name")?.to_string();
    let required = attr_node.attr("use") == Some("required");

    if let Some(simple) = attr_node.first_child_named("simpleType") {
        if let Some(restriction) = simple.first_child_named("restriction") {
            let (type_ref, restrictions) = parse_restriction(restriction);
            return Some(AttributeDecl {
                name,
                type_ref,
                required,
                restrictions,
            });
        }
    }

    let type_ref = attr_node
        .attr("type")
        .map(strip_prefix)
        .and_then(AtomType::from_xs_name)
        .unwrap_or(AtomType::String);
    Some(AttributeDecl {
        name,
        type_ref,
        required,
        restrictions: std::collections::BTreeMap::new(),
    })
}

fn strip_prefix(name: &str) -> &str {
    match name.split_once(XS_PREFIX_SEPARATOR) {
        Some((_, local)) => local,
        None => name,
    }
}

fn parse_cardinality(
    el: &LabeledTree,
    element_name: &str,
    source: InputSource,
) -> Result<Cardinality, PipelineError> {
    let lo: u32 = el
        .attr("minOccurs")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    let hi: Option<u32> = match el.attr("maxOccurs") {
        None => Some(1),
        Some("unbounded") => None,
        Some(s) => s.parse().ok(),
    };
    let cardinality = Cardinality::new(lo, hi);
    if !cardinality.is_valid() {
        return Err(GrammarError::InvalidCardinality {
            element: element_name.to_string(),
            lo,
            hi: hi.unwrap_or(0),
        }
        .into_pipeline_error(source));
    }
    Ok(cardinality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltree;

    fn build_grammar(xml: &str) -> Grammar {
        let tree = xmltree::parse(xml, InputSource::SourceSchema).expect("parse schema");
        build(&tree, InputSource::SourceSchema)
            .expect("build grammar")
            .grammar
    }

    #[test]
    fn builds_simple_typed_leaf_elements() {
        let xml = r#"<schema>
            <element name="Person">
                <complexType>
                    <sequence>
                        <element name="Name" type="xs:string"/>
                        <element name="Age" type="xs:integer"/>
                    </sequence>
                </complexType>
            </element>
        </schema>"#;
        let grammar = build_grammar(xml);
        assert_eq!(grammar.root, "Person");
        assert!(grammar.root_has_production());
        assert!(grammar.every_symbol_resolves());
        assert!(grammar.is_leaf("Name"));
        assert!(grammar.is_leaf("Age"));
        assert_eq!(
            grammar.type_constraints.get("Age").unwrap().base_type,
            AtomType::Integer
        );
    }

    #[test]
    fn downgrades_unknown_type_with_warning() {
        let xml = r#"<schema>
            <element name="Person" type="custom:Weird"/>
        </schema>"#;
        let tree = xmltree::parse(xml, InputSource::SourceSchema).unwrap();
        let output = build(&tree, InputSource::SourceSchema).unwrap();
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(
            output.grammar.type_constraints.get("Person").unwrap().base_type,
            AtomType::String
        );
    }

    #[test]
    fn rejects_cardinality_with_hi_less_than_lo() {
        let xml = r#"<schema>
            <element name="Root">
                <complexType>
                    <sequence>
                        <element name="Child" type="xs:string" minOccurs="5" maxOccurs="2"/>
                    </sequence>
                </complexType>
            </element>
        </schema>"#;
        let tree = xmltree::parse(xml, InputSource::SourceSchema).unwrap();
        let err = build(&tree, InputSource::SourceSchema).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaDefect { .. }));
    }

    #[test]
    fn unbounded_max_occurs_serializes_as_minus_one() {
        let xml = r#"<schema>
            <element name="Root">
                <complexType>
                    <sequence>
                        <element name="Phone" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
                    </sequence>
                </complexType>
            </element>
        </schema>"#;
        let grammar = build_grammar(xml);
        let phone_production = grammar.productions_for("Phone").next().unwrap();
        assert_eq!(phone_production.cardinality.hi_serialized(), -1);
        assert_eq!(phone_production.cardinality.lo, 0);
    }

    #[test]
    fn enumeration_facets_accumulate() {
        let xml = r#"<schema>
            <simpleType name="RoleType">
                <restriction base="xs:string">
                    <enumeration value="engineer"/>
                    <enumeration value="lead"/>
                </restriction>
            </simpleType>
            <element name="Role" type="RoleType"/>
        </schema>"#;
        let grammar = build_grammar(xml);
        let tc = grammar.type_constraints.get("Role").unwrap();
        match tc.restrictions.get(&RestrictionKey::Enumeration).unwrap() {
            RestrictionValue::Many(values) => {
                assert_eq!(values, &vec!["engineer".to_string(), "lead".to_string()])
            }
            other => panic!("expected Many, got {:?}", other),
        }
    }
}
