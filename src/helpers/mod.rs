//! Tree dumps for the `--dump-grammar`/`--dump-mtt` diagnostic CLI
//! subcommands, built on the generic `ptree` wrapper in
//! `xform_typecheck_utils`. A [`Grammar`] or [`Mtt`] has no single node
//! type of its own, so each gets a thin borrowing wrapper that projects
//! its structure into the label/children shape `LabeledNode` expects.

use xform_typecheck_utils::{print_tree, LabeledNode};

use crate::grammar::{Grammar, Production, Symbol};
use crate::mtt::{ChooseBranch, Mtt, MttRule, RhsOutput};

#[derive(Clone)]
enum GrammarNode<'a> {
    Root(&'a Grammar),
    Production(&'a Production),
    Symbol(&'a Symbol),
}

impl<'a> LabeledNode for GrammarNode<'a> {
    fn label(&self) -> String {
        match self {
            GrammarNode::Root(g) => format!("grammar (root: {})", g.root),
            GrammarNode::Production(p) => format!(
                "{} -> {:?} [{}..{}]",
                p.lhs,
                p.kind,
                p.cardinality.lo,
                p.cardinality
                    .hi
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| "*".to_string()),
            ),
            GrammarNode::Symbol(Symbol::NonTerminal(name)) => name.clone(),
            GrammarNode::Symbol(Symbol::Atomic(atom)) => format!("{:?}", atom),
        }
    }

    fn children(&self) -> Vec<Self> {
        match self {
            GrammarNode::Root(g) => g.productions.iter().map(GrammarNode::Production).collect(),
            GrammarNode::Production(p) => p.rhs.iter().map(GrammarNode::Symbol).collect(),
            GrammarNode::Symbol(_) => Vec::new(),
        }
    }
}

/// Render a grammar as an indented tree: root, then every production in
/// insertion order, then each production's rhs symbols.
pub fn dump_grammar(grammar: &Grammar) -> String {
    print_tree(GrammarNode::Root(grammar))
}

#[derive(Clone)]
enum MttNode<'a> {
    Root(&'a Mtt),
    Rule(&'a MttRule),
    Output(&'a RhsOutput),
    Branch(&'a ChooseBranch),
}

impl<'a> LabeledNode for MttNode<'a> {
    fn label(&self) -> String {
        match self {
            MttNode::Root(m) => format!("mtt (initial: {})", m.initial_state),
            MttNode::Rule(r) => match &r.guard_text {
                Some(guard) => format!("{}/{} [{}]", r.state, r.lhs_pattern.element, guard),
                None => format!("{}/{}", r.state, r.lhs_pattern.element),
            },
            MttNode::Output(RhsOutput::Element { name, .. }) => format!("<{}>", name),
            MttNode::Output(RhsOutput::Text { literal }) => format!("text({:?})", literal),
            MttNode::Output(RhsOutput::ValueOf { path }) => format!("value-of({})", path),
            MttNode::Output(RhsOutput::ApplyTemplates { select, callee }) => {
                format!("apply-templates({} -> {})", select, callee)
            }
            MttNode::Output(RhsOutput::ForEach { select, .. }) => format!("for-each({})", select),
            MttNode::Output(RhsOutput::If { test, .. }) => format!("if({})", test),
            MttNode::Output(RhsOutput::Choose { .. }) => "choose".to_string(),
            MttNode::Branch(b) => match &b.test {
                Some(test) => format!("when({})", test),
                None => "otherwise".to_string(),
            },
        }
    }

    fn children(&self) -> Vec<Self> {
        match self {
            MttNode::Root(m) => m.rules.iter().map(MttNode::Rule).collect(),
            MttNode::Rule(r) => r.rhs_output.iter().map(MttNode::Output).collect(),
            MttNode::Output(RhsOutput::Element { children, .. }) => {
                children.iter().map(MttNode::Output).collect()
            }
            MttNode::Output(RhsOutput::ForEach { body, .. }) => {
                body.iter().map(MttNode::Output).collect()
            }
            MttNode::Output(RhsOutput::If { then, .. }) => {
                then.iter().map(MttNode::Output).collect()
            }
            MttNode::Output(RhsOutput::Choose { branches }) => {
                branches.iter().map(MttNode::Branch).collect()
            }
            MttNode::Output(RhsOutput::Text { .. })
            | MttNode::Output(RhsOutput::ValueOf { .. })
            | MttNode::Output(RhsOutput::ApplyTemplates { .. }) => Vec::new(),
            MttNode::Branch(b) => b.body.iter().map(MttNode::Output).collect(),
        }
    }
}

/// Render an MTT as an indented tree: one top-level node per rule
/// (labeled by state/matched element and its guard, if any), then each
/// rule's output skeleton.
pub fn dump_mtt(mtt: &Mtt) -> String {
    print_tree(MttNode::Root(mtt))
}

/// Install a span-aware tracing subscriber for the `#[instrument]`-ed
/// pipeline stages (see `api::run_analysis_with_cancel`). Not wired into
/// `main` by default since `log`/`env_logger` already covers ordinary
/// CLI output; opt in with `RUST_LOG` when chasing down a slow or
/// miscounted analysis run.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .without_time()
        .with_target(false)
        .with_span_events(
            tracing_subscriber::fmt::format::FmtSpan::ENTER
                | tracing_subscriber::fmt::format::FmtSpan::CLOSE,
        )
        .init();
}
