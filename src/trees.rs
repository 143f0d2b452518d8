//! Ordered trees over sentence spans, and the binarization that maps them onto CNF.
use chumsky::prelude::*;
use itertools::Itertools;
use std::fmt::Display;
use thiserror::Error;

#[cfg(feature = "pretty")]
mod serialization;

///A half-open range of token positions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("An internal node needs at least one child")]
    NoChildren,
    #[error("Child spans {left:?} and {right:?} are not adjacent")]
    NotContiguous { left: Span, right: Span },
    #[error("A node with {0} children cannot be part of a binary tree")]
    TooManyChildren(usize),
    #[error("{0}")]
    Syntax(String),
}

///A tree whose leaves, read left to right, are the words of a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub struct NaryTree<L> {
    pub label: L,
    pub span: Span,
    pub children: Vec<NaryTree<L>>,
    pub is_lexical: bool,
}

impl<L> NaryTree<L> {
    ///A word at `position`.
    pub fn leaf(label: L, position: usize) -> Self {
        NaryTree {
            label,
            span: Span::new(position, position + 1),
            children: vec![],
            is_lexical: true,
        }
    }

    ///An internal node. The children must cover adjacent spans.
    pub fn node(label: L, children: Vec<NaryTree<L>>) -> Result<Self, TreeError> {
        let (Some(first), Some(last)) = (children.first(), children.last()) else {
            return Err(TreeError::NoChildren);
        };
        if let Some((l, r)) = children
            .iter()
            .tuple_windows()
            .find(|(l, r)| l.span.end != r.span.start)
        {
            return Err(TreeError::NotContiguous {
                left: l.span,
                right: r.span,
            });
        }
        let span = Span::new(first.span.start, last.span.end);
        Ok(NaryTree {
            label,
            span,
            children,
            is_lexical: false,
        })
    }

    ///Builds a node whose children are known to be adjacent, as when reading a chart.
    pub(crate) fn node_unchecked(label: L, span: Span, children: Vec<NaryTree<L>>) -> Self {
        debug_assert!(children.first().is_some_and(|c| c.span.start == span.start));
        debug_assert!(children.last().is_some_and(|c| c.span.end == span.end));
        NaryTree {
            label,
            span,
            children,
            is_lexical: false,
        }
    }

    ///The words of the tree, left to right.
    pub fn leaves(&self) -> Vec<&L> {
        let mut leaves = vec![];
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a L>) {
        if self.is_lexical {
            leaves.push(&self.label);
        }
        for child in &self.children {
            child.collect_leaves(leaves);
        }
    }

    pub fn map_labels<M>(&self, f: &mut impl FnMut(&L) -> M) -> NaryTree<M> {
        NaryTree {
            label: f(&self.label),
            span: self.span,
            children: self.children.iter().map(|c| c.map_labels(f)).collect(),
            is_lexical: self.is_lexical,
        }
    }

    pub fn n_nodes(&self) -> usize {
        1 + self.children.iter().map(NaryTree::n_nodes).sum::<usize>()
    }
}

impl<L: Clone> NaryTree<L> {
    ///Turns every node with more than two children into a left-branching chain.
    ///
    ///The leftmost two children are joined under a new node, which is then joined with the next
    ///child, until two remain. `synthetic(parent, i)` labels the node whose last child is child
    ///`i` of `parent`. Unary nodes and leaves are kept as they are.
    pub fn left_binarize(&self, synthetic: &mut impl FnMut(&L, usize) -> L) -> BinaryTree<L> {
        let children = match self.children.as_slice() {
            [] => BinaryChildren::Leaf,
            [child] => BinaryChildren::Unary(Box::new(child.left_binarize(synthetic))),
            [first, middle @ .., last] => {
                let mut acc = first.left_binarize(synthetic);
                for (i, child) in middle.iter().enumerate() {
                    let right = child.left_binarize(synthetic);
                    acc = BinaryTree {
                        label: synthetic(&self.label, i + 1),
                        span: Span::new(acc.span.start, right.span.end),
                        is_lexical: false,
                        children: BinaryChildren::Binary(Box::new(acc), Box::new(right)),
                    };
                }
                BinaryChildren::Binary(Box::new(acc), Box::new(last.left_binarize(synthetic)))
            }
        };
        BinaryTree {
            label: self.label.clone(),
            span: self.span,
            is_lexical: self.is_lexical,
            children,
        }
    }
}

impl<'src> NaryTree<&'src str> {
    ///Reads a tree in bracketed notation, e.g. `(S (NP (N time)) (VP (V flies)))`. Bare tokens
    ///are words and are numbered left to right.
    pub fn parse_bracketed(s: &'src str) -> Result<Self, TreeError> {
        let bracketed = bracketed_parser().parse(s).into_result().map_err(|errs| {
            TreeError::Syntax(errs.into_iter().map(|e| e.to_string()).join("\n"))
        })?;
        let mut position = 0;
        bracketed.into_tree(&mut position)
    }
}

#[derive(Debug, Clone)]
enum Bracketed<'src> {
    Node(&'src str, Vec<Bracketed<'src>>),
    Word(&'src str),
}

impl<'src> Bracketed<'src> {
    fn into_tree(self, position: &mut usize) -> Result<NaryTree<&'src str>, TreeError> {
        match self {
            Bracketed::Word(w) => {
                let leaf = NaryTree::leaf(w, *position);
                *position += 1;
                Ok(leaf)
            }
            Bracketed::Node(label, children) => {
                let children = children
                    .into_iter()
                    .map(|c| c.into_tree(position))
                    .collect::<Result<Vec<_>, _>>()?;
                NaryTree::node(label, children)
            }
        }
    }
}

fn bracketed_parser<'src>()
-> impl Parser<'src, &'src str, Bracketed<'src>, extra::Err<Rich<'src, char>>> {
    let label = any()
        .and_is(none_of(['(', ')', ' ', '\t', '\n', '\r']))
        .repeated()
        .at_least(1)
        .to_slice()
        .labelled("label");

    recursive(|node| {
        just('(')
            .ignore_then(label.clone().padded())
            .then(
                choice((node, label.map(Bracketed::Word)))
                    .padded()
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(')'))
            .map(|(label, children)| Bracketed::Node(label, children))
    })
    .padded()
    .then_ignore(end())
}

impl<L: Display> Display for NaryTree<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.children.is_empty() {
            return write!(f, "{}", self.label);
        }
        write!(f, "({}", self.label)?;
        for child in &self.children {
            write!(f, " {child}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BinaryChildren<L> {
    Leaf,
    Unary(Box<BinaryTree<L>>),
    Binary(Box<BinaryTree<L>>, Box<BinaryTree<L>>),
}

///A tree in which every node has zero, one or two children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryTree<L> {
    pub label: L,
    pub span: Span,
    pub is_lexical: bool,
    pub children: BinaryChildren<L>,
}

impl<L> BinaryTree<L> {
    ///Undoes binarization: every child for which `is_synthetic` holds is replaced by its own
    ///(recursively flattened) children, keeping their order.
    pub fn collapse_to_nary(self, is_synthetic: &impl Fn(&L) -> bool) -> NaryTree<L> {
        let children = match self.children {
            BinaryChildren::Leaf => vec![],
            BinaryChildren::Unary(child) => {
                let mut children = vec![];
                child.splice_into(is_synthetic, &mut children);
                children
            }
            BinaryChildren::Binary(left, right) => {
                let mut children = vec![];
                left.splice_into(is_synthetic, &mut children);
                right.splice_into(is_synthetic, &mut children);
                children
            }
        };
        NaryTree {
            label: self.label,
            span: self.span,
            children,
            is_lexical: self.is_lexical,
        }
    }

    fn splice_into(self, is_synthetic: &impl Fn(&L) -> bool, out: &mut Vec<NaryTree<L>>) {
        if self.is_lexical || !is_synthetic(&self.label) {
            out.push(self.collapse_to_nary(is_synthetic));
            return;
        }
        match self.children {
            BinaryChildren::Leaf => (),
            BinaryChildren::Unary(child) => child.splice_into(is_synthetic, out),
            BinaryChildren::Binary(left, right) => {
                left.splice_into(is_synthetic, out);
                right.splice_into(is_synthetic, out);
            }
        }
    }
}

impl<L> TryFrom<NaryTree<L>> for BinaryTree<L> {
    type Error = TreeError;

    fn try_from(tree: NaryTree<L>) -> Result<Self, Self::Error> {
        let NaryTree {
            label,
            span,
            children,
            is_lexical,
        } = tree;
        let n_children = children.len();
        let mut children = children.into_iter().map(BinaryTree::try_from);
        let children = match (children.next(), children.next(), n_children) {
            (None, None, _) => BinaryChildren::Leaf,
            (Some(child), None, _) => BinaryChildren::Unary(Box::new(child?)),
            (Some(left), Some(right), 2) => BinaryChildren::Binary(Box::new(left?), Box::new(right?)),
            _ => return Err(TreeError::TooManyChildren(n_children)),
        };
        Ok(BinaryTree {
            label,
            span,
            is_lexical,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn owned(tree: NaryTree<&str>) -> NaryTree<String> {
        tree.map_labels(&mut |s| s.to_string())
    }

    fn synthetic(parent: &String, i: usize) -> String {
        format!("{parent}|{i}")
    }

    fn is_synthetic(label: &String) -> bool {
        label.contains('|')
    }

    #[test]
    fn bracketed_notation() -> anyhow::Result<()> {
        let tree = NaryTree::parse_bracketed("(S (NP (N time)) (VP (V flies)))")?;
        assert_eq!(tree.label, "S");
        assert_eq!(tree.span, Span::new(0, 2));
        assert_eq!(tree.leaves(), vec![&"time", &"flies"]);
        assert_eq!(tree.children[1].span, Span::new(1, 2));
        assert!(tree.children[0].children[0].children[0].is_lexical);
        assert_eq!(tree.to_string(), "(S (NP (N time)) (VP (V flies)))");

        let spaced = NaryTree::parse_bracketed("  ( S(NP (N time) )\n (VP (V flies)))  ")?;
        assert_eq!(spaced, tree);
        Ok(())
    }

    #[test]
    fn bracketed_errors() {
        assert!(matches!(
            NaryTree::parse_bracketed("(S (NP time)"),
            Err(TreeError::Syntax(_))
        ));
        assert!(matches!(
            NaryTree::parse_bracketed("S"),
            Err(TreeError::Syntax(_))
        ));
        assert!(matches!(
            NaryTree::parse_bracketed("(S (NP))"),
            Err(TreeError::NoChildren)
        ));
        assert!(NaryTree::parse_bracketed("(S (A a)) (B b)").is_err());
    }

    #[test]
    fn node_validation() {
        let a = NaryTree::leaf("a", 0);
        let c = NaryTree::leaf("c", 2);
        assert_eq!(
            NaryTree::node("X", vec![a.clone(), c]),
            Err(TreeError::NotContiguous {
                left: Span::new(0, 1),
                right: Span::new(2, 3)
            })
        );
        assert_eq!(NaryTree::<&str>::node("X", vec![]), Err(TreeError::NoChildren));
        let b = NaryTree::leaf("b", 1);
        let x = NaryTree::node("X", vec![a, b]).unwrap();
        assert_eq!(x.span, Span::new(0, 2));
        assert!(!x.is_lexical);
    }

    #[test]
    fn left_binarize_flat_node() -> anyhow::Result<()> {
        let tree = owned(NaryTree::parse_bracketed(
            "(NP (DT a) (JJ money-losing) (JJ big) (NN magazine))",
        )?);
        let binary = tree.left_binarize(&mut synthetic);
        let BinaryChildren::Binary(left, right) = &binary.children else {
            panic!("the root must be binary");
        };
        assert_eq!(binary.label, "NP");
        assert_eq!(right.label, "NN");
        assert_eq!(left.label, "NP|2");
        assert_eq!(left.span, Span::new(0, 3));
        let BinaryChildren::Binary(inner, jj) = &left.children else {
            panic!("synthetic nodes are binary");
        };
        assert_eq!(inner.label, "NP|1");
        assert_eq!(inner.span, Span::new(0, 2));
        assert_eq!(jj.label, "JJ");

        assert_eq!(binary.collapse_to_nary(&is_synthetic), tree);
        Ok(())
    }

    #[test]
    fn unary_chains_survive() -> anyhow::Result<()> {
        let tree = owned(NaryTree::parse_bracketed("(ROOT (S (NP (N time)) (VP (V flies))))")?);
        let binary = tree.left_binarize(&mut synthetic);
        assert!(matches!(binary.children, BinaryChildren::Unary(_)));
        assert_eq!(BinaryTree::try_from(tree.clone())?, binary);
        assert_eq!(binary.collapse_to_nary(&is_synthetic), tree);
        Ok(())
    }

    #[test]
    fn try_from_rejects_wide_nodes() -> anyhow::Result<()> {
        let tree = NaryTree::parse_bracketed("(X a b c)")?;
        assert_eq!(
            BinaryTree::try_from(tree),
            Err(TreeError::TooManyChildren(3))
        );
        Ok(())
    }

    fn random_tree(rng: &mut ChaCha8Rng, depth: usize, position: &mut usize) -> NaryTree<String> {
        if depth == 0 || rng.random_bool(0.2) {
            let leaf = NaryTree::leaf(format!("w{position}"), *position);
            *position += 1;
            return NaryTree::node(format!("P{}", rng.random_range(0..3)), vec![leaf]).unwrap();
        }
        let arity = rng.random_range(1..=5);
        let children = (0..arity)
            .map(|_| random_tree(rng, depth - 1, position))
            .collect();
        NaryTree::node(format!("X{}", rng.random_range(0..4)), children).unwrap()
    }

    #[test]
    fn binarization_round_trips() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..200 {
            let mut position = 0;
            let tree = random_tree(&mut rng, 4, &mut position);
            let binary = tree.left_binarize(&mut synthetic);
            let restored = binary.collapse_to_nary(&is_synthetic);
            assert_eq!(restored, tree);
            assert_eq!(
                restored.leaves().len(),
                position,
                "leaves must reproduce the sentence"
            );
        }
    }
}
