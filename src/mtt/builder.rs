//! Stylesheet-to-MTT translation.

use std::collections::{HashMap, HashSet};

use crate::errors::PipelineError;
use crate::xmltree::LabeledTree;

use super::errors::MttError;
use super::predicate::{self, Predicate};
use super::{AttrValue, ChooseBranch, LhsPattern, Mtt, MttRule, MttRuleBuilder, OutputAttr, RhsOutput};

/// Build an [`Mtt`] from a subset-conformant stylesheet tree.
///
/// Assumes the tree already passed the subset linter; this
/// function does not re-validate vocabulary membership.
pub fn build(stylesheet: &LabeledTree) -> Result<Mtt, PipelineError> {
    let templates: Vec<&LabeledTree> = stylesheet.children_named("template").collect();

    let state_by_key = assign_state_names(&templates);

    let mut ctx = BuildContext {
        state_by_key: state_by_key.clone(),
        fresh_counter: 0,
    };

    let mut rules = Vec::with_capacity(templates.len());
    let mut origins = Vec::with_capacity(templates.len());
    for template in &templates {
        let match_expr = template.attr("match").unwrap_or_default().to_string();
        let mode = template.attr("mode").unwrap_or("default").to_string();
        origins.push((match_expr, mode));
        rules.push(ctx.translate_template(template));
    }

    check_determinism(&rules, &origins)?;

    let mut states: Vec<String> = state_by_key.values().cloned().collect();
    states.sort();
    states.dedup();

    // q0 is typically the state derived from the template matching the
    // document root; falls back to the synthetic `q_root`
    // initialized in step 1 if no template matches `/`.
    let initial_state = state_by_key
        .get(&("/".to_string(), "default".to_string()))
        .cloned()
        .unwrap_or_else(|| "q_root".to_string());
    if !states.contains(&initial_state) {
        states.push(initial_state.clone());
    }

    let mut input_alphabet: Vec<String> =
        rules.iter().map(|r| r.lhs_pattern.element.clone()).collect();
    input_alphabet.sort();
    input_alphabet.dedup();

    let mut output_alphabet: Vec<String> = Vec::new();
    for r in &rules {
        collect_output_names(&r.rhs_output, &mut output_alphabet);
    }
    output_alphabet.sort();
    output_alphabet.dedup();

    Ok(Mtt {
        states,
        initial_state,
        rules,
        input_alphabet,
        output_alphabet,
    })
}

/// Step 1 (state naming): every template is keyed by its literal
/// `(match, mode)` pair. Templates sharing a key share one state — they are
/// guarded variants of the same rule slot. A genuine naming
/// collision — two *different* keys rewriting to the same base name — is
/// disambiguated with a monotone counter, per the state-naming rule.
fn assign_state_names(templates: &[&LabeledTree]) -> HashMap<(String, String), String> {
    let mut state_by_key: HashMap<(String, String), String> = HashMap::new();
    let mut used_names: HashSet<String> = HashSet::new();
    let mut canonical_first_key: HashMap<String, (String, String)> = HashMap::new();

    for template in templates {
        let match_expr = template.attr("match").unwrap_or_default().to_string();
        let mode = template.attr("mode").unwrap_or("default").to_string();
        let key = (match_expr.clone(), mode.clone());
        if state_by_key.contains_key(&key) {
            continue;
        }

        let canonical = canonical_state_name(&match_expr, &mode);
        let first_key = canonical_first_key
            .entry(canonical.clone())
            .or_insert_with(|| key.clone());

        let name = if *first_key == key {
            canonical.clone()
        } else {
            let mut counter = 2;
            let mut candidate = format!("{}_{}", canonical, counter);
            while used_names.contains(&candidate) {
                counter += 1;
                candidate = format!("{}_{}", canonical, counter);
            }
            candidate
        };

        used_names.insert(name.clone());
        state_by_key.insert(key, name);
    }

    state_by_key
}

/// Rewrite a `match`/`select` path into the base of a state identifier:
/// `/` -> `root`, leading `@` -> `attr_`, `*` -> `any`, internal `/` -> `_`,
/// then `q_<base>_<mode>`.
fn canonical_state_name(path_expr: &str, mode: &str) -> String {
    if path_expr == "/" {
        return format!("q_root_{}", mode);
    }
    let mut base = path_expr.to_string();
    if let Some(rest) = base.strip_prefix('@') {
        base = format!("attr_{}", rest);
    }
    base = base.replace('*', "any");
    base = base.replace('/', "_");
    let base = base.trim_start_matches('_');
    format!("q_{}_{}", base, mode)
}

/// The element half of input-pattern derivation: `/` -> `root`, a
/// root-anchored path keeps only its last segment, a bare name passes
/// through unchanged. Children are always the `*`
/// wildcard — templates never enumerate their matched node's children.
fn derive_input_element(match_expr: &str) -> String {
    if match_expr == "/" {
        return "root".to_string();
    }
    match match_expr.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => match_expr.to_string(),
    }
}

struct BuildContext {
    state_by_key: HashMap<(String, String), String>,
    fresh_counter: usize,
}

impl BuildContext {
    fn translate_template(&mut self, template: &LabeledTree) -> MttRule {
        let match_expr = template.attr("match").unwrap_or_default().to_string();
        let mode = template.attr("mode").unwrap_or("default").to_string();
        let state = self
            .state_by_key
            .get(&(match_expr.clone(), mode.clone()))
            .cloned()
            .unwrap_or_else(|| canonical_state_name(&match_expr, &mode));

        let lhs_pattern = LhsPattern::any(derive_input_element(&match_expr));

        let (guard, guard_text) = extract_top_level_guard(template);

        let body: Vec<&LabeledTree> = template.children.iter().collect();
        let rhs_output = self.translate_body(&body);

        MttRuleBuilder::default()
            .state(state)
            .lhs_pattern(lhs_pattern)
            .guard(guard)
            .guard_text(guard_text)
            .rhs_output(rhs_output)
            .build()
            .expect("translate_template sets every MttRule field")
    }

    fn translate_body(&mut self, nodes: &[&LabeledTree]) -> Vec<RhsOutput> {
        nodes.iter().map(|n| self.translate_node(n)).collect()
    }

    fn translate_node(&mut self, node: &LabeledTree) -> RhsOutput {
        match node.local_name() {
            "value-of" => RhsOutput::ValueOf {
                path: node.attr("select").unwrap_or_default().to_string(),
            },
            "text" => RhsOutput::Text {
                literal: node.text.clone().unwrap_or_default(),
            },
            "apply-templates" => {
                let select = node.attr("select").unwrap_or(".").to_string();
                let mode = node.attr("mode").unwrap_or("default").to_string();
                let callee = self
                    .state_by_key
                    .get(&(select.clone(), mode.clone()))
                    .cloned()
                    .unwrap_or_else(|| canonical_state_name(&select, &mode));
                RhsOutput::ApplyTemplates { select, callee }
            }
            "for-each" => {
                let select = node.attr("select").unwrap_or_default().to_string();
                let children: Vec<&LabeledTree> = node.children.iter().collect();
                let body = self.translate_body(&children);
                let list_state = self.fresh_list_state();
                RhsOutput::ForEach {
                    select,
                    body,
                    list_state,
                }
            }
            "if" => {
                let test = node.attr("test").unwrap_or_default().to_string();
                let children: Vec<&LabeledTree> = node.children.iter().collect();
                let then = self.translate_body(&children);
                RhsOutput::If { test, then }
            }
            "choose" => {
                let mut branches = Vec::new();
                for when in node.children_named("when") {
                    let test = when.attr("test").map(|s| s.to_string());
                    let kids: Vec<&LabeledTree> = when.children.iter().collect();
                    branches.push(ChooseBranch {
                        test,
                        body: self.translate_body(&kids),
                    });
                }
                if let Some(otherwise) = node.first_child_named("otherwise") {
                    let kids: Vec<&LabeledTree> = otherwise.children.iter().collect();
                    branches.push(ChooseBranch {
                        test: None,
                        body: self.translate_body(&kids),
                    });
                }
                RhsOutput::Choose { branches }
            }
            "element" => {
                let name = node.attr("name").unwrap_or_default().to_string();
                self.translate_element_like(node, name)
            }
            // A bare `attribute`/`with-param`/`param` outside an enclosing
            // element constructor carries no tree-shaped output of its own
            // in this subset (attributes are folded into their parent's
            // attrs list by `translate_element_like`; named-template
            // parameters are out of scope).
            "with-param" | "param" => RhsOutput::Text {
                literal: String::new(),
            },
            local => self.translate_element_like(node, local.to_string()),
        }
    }

    /// Literal result elements and the dynamic `element` constructor share
    /// one shape: gather literal/templated attrs, pull any `attribute`
    /// children into the attrs list, recurse into the rest.
    fn translate_element_like(&mut self, node: &LabeledTree, name: String) -> RhsOutput {
        let mut attrs = literal_attrs(node);
        let mut remaining: Vec<&LabeledTree> = Vec::new();
        for child in &node.children {
            if child.local_name() == "attribute" {
                if let Some(attr_name) = child.attr("name") {
                    attrs.push(OutputAttr {
                        name: attr_name.to_string(),
                        value: attribute_constructor_value(child),
                    });
                }
            } else {
                remaining.push(child);
            }
        }
        let children = self.translate_body(&remaining);
        RhsOutput::Element {
            name,
            attrs,
            children,
        }
    }

    fn fresh_list_state(&mut self) -> String {
        self.fresh_counter += 1;
        format!("list_{}", self.fresh_counter)
    }
}

/// Ordinary XML attributes on a literal result element or dynamic
/// `element` node: a single-segment `{...}` template becomes a
/// `value_expr`; anything else is literal.
fn literal_attrs(node: &LabeledTree) -> Vec<OutputAttr> {
    node.attrs
        .iter()
        .map(|(name, value)| OutputAttr {
            name: name.clone(),
            value: match attribute_value_template_expr(value) {
                Some(expr) => AttrValue::ValueExpr(expr),
                None => AttrValue::Literal(value.clone()),
            },
        })
        .collect()
}

fn attribute_value_template_expr(value: &str) -> Option<String> {
    if value.matches('{').count() != 1 {
        return None;
    }
    let open = value.find('{')?;
    let close = value.rfind('}')?;
    if close > open {
        Some(value[open + 1..close].to_string())
    } else {
        None
    }
}

/// A dynamic `attribute` constructor's value: a `value-of` child or a
/// `select` attribute becomes a `value_expr`; otherwise its text content is
/// literal.
fn attribute_constructor_value(node: &LabeledTree) -> AttrValue {
    if let Some(value_of) = node.first_child_named("value-of") {
        if let Some(select) = value_of.attr("select") {
            return AttrValue::ValueExpr(select.to_string());
        }
    }
    if let Some(select) = node.attr("select") {
        return AttrValue::ValueExpr(select.to_string());
    }
    AttrValue::Literal(node.text.clone().unwrap_or_default())
}

/// A template whose entire body is one `if` is mirrored into the rule's
/// `guard` field in addition to the ordinary
/// `RhsOutput::If` translation of that same node — the guard is a parsed
/// copy kept for structural analysis, not a rewrite of the output skeleton.
fn extract_top_level_guard(template: &LabeledTree) -> (Option<Predicate>, Option<String>) {
    if template.children.len() != 1 {
        return (None, None);
    }
    let only = &template.children[0];
    if only.local_name() != "if" {
        return (None, None);
    }
    match only.attr("test") {
        Some(test) => (Some(predicate::parse(test)), Some(test.to_string())),
        None => (None, None),
    }
}

fn collect_output_names(nodes: &[RhsOutput], names: &mut Vec<String>) {
    for node in nodes {
        match node {
            RhsOutput::Element { name, children, .. } => {
                names.push(name.clone());
                collect_output_names(children, names);
            }
            RhsOutput::ForEach { body, .. } => collect_output_names(body, names),
            RhsOutput::If { then, .. } => collect_output_names(then, names),
            RhsOutput::Choose { branches } => {
                for b in branches {
                    collect_output_names(&b.body, names);
                }
            }
            RhsOutput::Text { .. } | RhsOutput::ValueOf { .. } | RhsOutput::ApplyTemplates { .. } => {}
        }
    }
}

/// Determinism check: two rules sharing a state are admissible
/// only if their guards are provably disjoint. Disjointness is decided
/// syntactically on the parsed predicate AST, never by evaluating guards
/// against concrete data.
fn check_determinism(
    rules: &[MttRule],
    origins: &[(String, String)],
) -> Result<(), PipelineError> {
    for (i, a) in rules.iter().enumerate() {
        for b in rules.iter().skip(i + 1) {
            if a.state != b.state {
                continue;
            }
            if !guards_provably_disjoint(a.guard.as_ref(), b.guard.as_ref()) {
                let (match_expr, mode) = origins[i].clone();
                return Err(MttError::AmbiguousTemplates { match_expr, mode }.into_pipeline_error());
            }
        }
    }
    Ok(())
}

fn guards_provably_disjoint(a: Option<&Predicate>, b: Option<&Predicate>) -> bool {
    match (a, b) {
        (Some(pa), Some(pb)) => predicates_provably_disjoint(pa, pb),
        // An unguarded rule matches every input; it cannot be proven
        // disjoint from any other rule on the same state.
        _ => false,
    }
}

/// Conservative syntactic disjointness: only the comparison shapes the
/// guard mini-language actually lets authors write are recognized —
/// equality against distinct
/// literals on the same path, or an equality directly contradicted by a
/// not-equals on the same literal. Anything else (differing paths,
/// inequalities, boolean combinations, opaque text) is not provably
/// disjoint, matching the "reject unless provably disjoint" default.
fn predicates_provably_disjoint(a: &Predicate, b: &Predicate) -> bool {
    use super::predicate::CompareOp;
    match (a, b) {
        (
            Predicate::Compare {
                path: pa,
                op: CompareOp::Eq,
                literal: la,
            },
            Predicate::Compare {
                path: pb,
                op: CompareOp::Eq,
                literal: lb,
            },
        ) => pa == pb && la != lb,
        (
            Predicate::Compare {
                path: pa,
                op: CompareOp::Eq,
                literal: la,
            },
            Predicate::Compare {
                path: pb,
                op: CompareOp::Ne,
                literal: lb,
            },
        )
        | (
            Predicate::Compare {
                path: pb,
                op: CompareOp::Ne,
                literal: lb,
            },
            Predicate::Compare {
                path: pa,
                op: CompareOp::Eq,
                literal: la,
            },
        ) => pa == pb && la == lb,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InputSource;
    use crate::xmltree;

    fn build_mtt(xml: &str) -> Mtt {
        let tree = xmltree::parse(xml, InputSource::Stylesheet).expect("parse stylesheet");
        build(&tree).expect("build mtt")
    }

    #[test]
    fn derives_root_state_and_literal_element_output() {
        let mtt = build_mtt(
            r#"<stylesheet>
                <template match="/">
                    <Root><value-of select="Name"/></Root>
                </template>
            </stylesheet>"#,
        );
        assert_eq!(mtt.initial_state, "q_root_default");
        assert_eq!(mtt.rules.len(), 1);
        assert_eq!(mtt.rules[0].lhs_pattern.element, "root");
        match &mtt.rules[0].rhs_output[0] {
            RhsOutput::Element { name, children, .. } => {
                assert_eq!(name, "Root");
                assert!(matches!(&children[0], RhsOutput::ValueOf { path } if path == "Name"));
            }
            other => panic!("expected Element, got {:?}", other),
        }
    }

    #[test]
    fn single_segment_attribute_value_template_becomes_value_expr() {
        let mtt = build_mtt(
            r#"<stylesheet>
                <template match="Person">
                    <Individual fullname="{Name}"/>
                </template>
            </stylesheet>"#,
        );
        match &mtt.rules[0].rhs_output[0] {
            RhsOutput::Element { attrs, .. } => {
                assert_eq!(attrs[0].name, "fullname");
                assert_eq!(attrs[0].value, AttrValue::ValueExpr("Name".to_string()));
            }
            other => panic!("expected Element, got {:?}", other),
        }
    }

    #[test]
    fn top_level_if_is_mirrored_into_guard() {
        let mtt = build_mtt(
            r#"<stylesheet>
                <template match="Person">
                    <if test="Age &gt;= 18">
                        <Adult/>
                    </if>
                </template>
            </stylesheet>"#,
        );
        let rule = &mtt.rules[0];
        assert_eq!(rule.guard_text.as_deref(), Some("Age &gt;= 18"));
        assert!(rule.guard.is_some());
        assert!(matches!(rule.rhs_output[0], RhsOutput::If { .. }));
    }

    #[test]
    fn same_match_and_mode_with_disjoint_guards_is_admissible() {
        let mtt = build_mtt(
            r#"<stylesheet>
                <template match="Person"><if test="Role == 'manager'"><Manager/></if></template>
                <template match="Person"><if test="Role == 'intern'"><Intern/></if></template>
            </stylesheet>"#,
        );
        assert_eq!(mtt.rules.len(), 2);
        assert_eq!(mtt.rules[0].state, mtt.rules[1].state);
    }

    #[test]
    fn same_match_and_mode_without_disjoint_guards_is_rejected() {
        let tree = xmltree::parse(
            r#"<stylesheet>
                <template match="Person"><A/></template>
                <template match="Person"><B/></template>
            </stylesheet>"#,
            InputSource::Stylesheet,
        )
        .unwrap();
        let err = build(&tree).unwrap_err();
        assert!(matches!(err, PipelineError::MttConstruction { .. }));
    }

    #[test]
    fn apply_templates_callee_resolves_to_matching_template_state() {
        let mtt = build_mtt(
            r#"<stylesheet>
                <template match="/">
                    <apply-templates select="Person"/>
                </template>
                <template match="Person"><Individual/></template>
            </stylesheet>"#,
        );
        let root_rule = mtt.rules.iter().find(|r| r.state == "q_root_default").unwrap();
        let callee = match &root_rule.rhs_output[0] {
            RhsOutput::ApplyTemplates { callee, .. } => callee.clone(),
            other => panic!("expected ApplyTemplates, got {:?}", other),
        };
        assert!(mtt.has_state(&callee));
        assert!(mtt.rules.iter().any(|r| r.state == callee && r.lhs_pattern.element == "Person"));
    }

    #[test]
    fn for_each_gets_a_fresh_list_state() {
        let mtt = build_mtt(
            r#"<stylesheet>
                <template match="Family">
                    <for-each select="Member"><Name/></for-each>
                </template>
            </stylesheet>"#,
        );
        match &mtt.rules[0].rhs_output[0] {
            RhsOutput::ForEach { list_state, .. } => assert_eq!(list_state, "list_1"),
            other => panic!("expected ForEach, got {:?}", other),
        }
    }

    #[test]
    fn choose_preserves_when_and_otherwise_order() {
        let mtt = build_mtt(
            r#"<stylesheet>
                <template match="Person">
                    <choose>
                        <when test="Age &gt;= 18"><Adult/></when>
                        <otherwise><Minor/></otherwise>
                    </choose>
                </template>
            </stylesheet>"#,
        );
        match &mtt.rules[0].rhs_output[0] {
            RhsOutput::Choose { branches } => {
                assert_eq!(branches.len(), 2);
                assert!(branches[0].test.is_some());
                assert!(branches[1].test.is_none());
            }
            other => panic!("expected Choose, got {:?}", other),
        }
    }
}
