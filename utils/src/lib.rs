//! Generic `ptree`-backed tree dumping, shared by xform-typecheck's
//! `--dump-grammar`/`--dump-mtt` diagnostic CLI subcommands. A grammar or
//! an MTT has no single node type of its own, so the dumper is generic
//! over anything that can describe itself and its children rather than
//! over one fixed node shape.

use std::borrow::Cow;
use std::io::{self, Write};

use ptree::{Style, TreeItem};

/// Anything that can be rendered as one node of a `ptree` dump: a label
/// and an ordered list of children of the same type.
pub trait LabeledNode: Clone {
    fn label(&self) -> String;
    fn children(&self) -> Vec<Self>;
}

#[derive(Clone)]
struct TreeWrapper<T>(T);

impl<T: LabeledNode> TreeItem for TreeWrapper<T> {
    type Child = Self;

    fn write_self<W: Write>(&self, f: &mut W, style: &Style) -> io::Result<()> {
        write!(f, "{}", style.paint(self.0.label()))
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::from(
            self.0
                .children()
                .into_iter()
                .map(TreeWrapper)
                .collect::<Vec<_>>(),
        )
    }
}

/// Render `root` as an indented tree, depth-first, in the order
/// `children()` returns them.
pub fn print_tree<T: LabeledNode>(root: T) -> String {
    let wrapper = TreeWrapper(root);
    let mut output = Vec::new();
    ptree::write_tree(&wrapper, &mut output).expect("ptree write_tree never fails on a Vec sink");
    String::from_utf8(output).expect("ptree output is always valid utf8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Leaf(&'static str, Vec<Leaf>);

    impl LabeledNode for Leaf {
        fn label(&self) -> String {
            self.0.to_string()
        }
        fn children(&self) -> Vec<Self> {
            self.1.clone()
        }
    }

    #[test]
    fn renders_nested_labels_depth_first() {
        let tree = Leaf("root", vec![Leaf("a", vec![]), Leaf("b", vec![Leaf("c", vec![])])]);
        let rendered = print_tree(tree);
        assert!(rendered.contains("root"));
        assert!(rendered.contains('a'));
        assert!(rendered.contains('b'));
        assert!(rendered.contains('c'));
    }
}
