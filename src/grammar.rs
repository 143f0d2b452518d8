//! Indexed CNF grammars over dense integer symbol ids.
use ahash::HashMap;
use petgraph::{algo::toposort, graph::DiGraph, graph::NodeIndex};
use std::fmt::Display;
use thiserror::Error;

mod reader;
pub use reader::{GrammarFile, ReadError, SymbolTable};

///A nonterminal symbol id. Ids are dense and index per-cell arrays.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub struct NonTerminal(u32);

impl NonTerminal {
    pub fn new(id: u32) -> Self {
        NonTerminal(id)
    }

    ///Gets the inner value of the symbol as a `usize`
    #[must_use]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

///A lexical (terminal) symbol id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub struct Terminal(u32);

impl Terminal {
    ///A terminal that no grammar derives. Words missing from a symbol table are mapped to it.
    pub const UNKNOWN: Terminal = Terminal(u32::MAX);

    pub fn new(id: u32) -> Self {
        Terminal(id)
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for NonTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

impl Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

///Either kind of symbol. This is the label type of trees read off a chart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub enum Symbol {
    NonTerminal(NonTerminal),
    Terminal(Terminal),
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::NonTerminal(nt) => write!(f, "{nt}"),
            Symbol::Terminal(t) => write!(f, "{t}"),
        }
    }
}

///The position of a rule in its [`Grammar`], which is also its insertion order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub struct RuleId(u32);

impl RuleId {
    #[must_use]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<RuleId> for usize {
    fn from(value: RuleId) -> Self {
        value.0 as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Lexical,
    Unary,
    Binary,
}

///Right hand side of a CNF rule. The variant fixes which namespace each child lives in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Rhs {
    Lexical(Terminal),
    Unary(NonTerminal),
    Binary(NonTerminal, NonTerminal),
}

///A weighted CNF rule. `score` is a log-space semiring element (usually a log-probability).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rule {
    pub parent: NonTerminal,
    pub rhs: Rhs,
    pub score: f64,
}

impl Rule {
    pub fn lexical(parent: NonTerminal, word: Terminal, score: f64) -> Self {
        Rule {
            parent,
            rhs: Rhs::Lexical(word),
            score,
        }
    }

    pub fn unary(parent: NonTerminal, child: NonTerminal, score: f64) -> Self {
        Rule {
            parent,
            rhs: Rhs::Unary(child),
            score,
        }
    }

    pub fn binary(parent: NonTerminal, left: NonTerminal, right: NonTerminal, score: f64) -> Self {
        Rule {
            parent,
            rhs: Rhs::Binary(left, right),
            score,
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self.rhs {
            Rhs::Lexical(_) => RuleKind::Lexical,
            Rhs::Unary(_) => RuleKind::Unary,
            Rhs::Binary(_, _) => RuleKind::Binary,
        }
    }

    pub fn left(&self) -> Symbol {
        match self.rhs {
            Rhs::Lexical(t) => Symbol::Terminal(t),
            Rhs::Unary(c) | Rhs::Binary(c, _) => Symbol::NonTerminal(c),
        }
    }

    pub fn right(&self) -> Option<NonTerminal> {
        match self.rhs {
            Rhs::Binary(_, r) => Some(r),
            Rhs::Lexical(_) | Rhs::Unary(_) => None,
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.rhs {
            Rhs::Lexical(t) => write!(f, "{} --> {} {}", self.parent, t, self.score),
            Rhs::Unary(c) => write!(f, "{} --> {} {}", self.parent, c, self.score),
            Rhs::Binary(l, r) => write!(f, "{} --> {} {} {}", self.parent, l, r, self.score),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GrammarError {
    #[error("The root {0} is not a nonterminal of the grammar")]
    UnknownRoot(NonTerminal),
    #[error("No rule has the root {0} as its parent")]
    RootNotProduced(NonTerminal),
    #[error("Rule {rule} mentions {symbol} which is outside the symbol table")]
    SymbolOutOfRange { rule: usize, symbol: Symbol },
    #[error("Rule {rule} has score {score} which is not a usable log-space weight")]
    InvalidScore { rule: usize, score: f64 },
    #[error("The unary rules form a cycle through {symbol}")]
    CyclicUnaryRules { symbol: NonTerminal },
}

///Collects rules before a [`Grammar`] is frozen.
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    root: NonTerminal,
    rules: Vec<Rule>,
    symbol_counts: Option<(usize, usize)>,
}

impl GrammarBuilder {
    pub fn new(root: NonTerminal) -> Self {
        GrammarBuilder {
            root,
            rules: vec![],
            symbol_counts: None,
        }
    }

    ///Declares the sizes of the nonterminal and terminal symbol tables. Without this they are
    ///inferred from the largest id in use.
    pub fn with_symbol_counts(mut self, n_nonterminals: usize, n_terminals: usize) -> Self {
        self.symbol_counts = Some((n_nonterminals, n_terminals));
        self
    }

    pub fn push(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(rule);
        id
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.rules.extend(rules);
    }

    ///Validates the rules and builds every lookup index. No index is modified afterwards.
    pub fn freeze(self) -> Result<Grammar, GrammarError> {
        let GrammarBuilder {
            root,
            rules,
            symbol_counts,
        } = self;

        let (n_nonterminals, n_terminals) = symbol_counts.unwrap_or_else(|| inferred_counts(&rules));

        for (i, rule) in rules.iter().enumerate() {
            if rule.score.is_nan() || rule.score == f64::INFINITY {
                return Err(GrammarError::InvalidScore {
                    rule: i,
                    score: rule.score,
                });
            }
            let out_of_range = |symbol: Symbol| GrammarError::SymbolOutOfRange { rule: i, symbol };
            if rule.parent.index() >= n_nonterminals {
                return Err(out_of_range(Symbol::NonTerminal(rule.parent)));
            }
            match rule.rhs {
                Rhs::Lexical(t) if t.index() >= n_terminals => {
                    return Err(out_of_range(Symbol::Terminal(t)));
                }
                Rhs::Unary(c) if c.index() >= n_nonterminals => {
                    return Err(out_of_range(Symbol::NonTerminal(c)));
                }
                Rhs::Binary(l, r) => {
                    for c in [l, r] {
                        if c.index() >= n_nonterminals {
                            return Err(out_of_range(Symbol::NonTerminal(c)));
                        }
                    }
                }
                _ => (),
            }
        }

        if root.index() >= n_nonterminals {
            return Err(GrammarError::UnknownRoot(root));
        }
        if !rules.iter().any(|r| r.parent == root) {
            return Err(GrammarError::RootNotProduced(root));
        }

        let mut lexical = vec![vec![]; n_terminals];
        let mut unary_by_child = vec![vec![]; n_nonterminals];
        let mut by_left = vec![vec![]; n_nonterminals];
        let mut by_right = vec![vec![]; n_nonterminals];
        let mut by_parent = vec![vec![]; n_nonterminals];
        let mut by_children: HashMap<(NonTerminal, NonTerminal), Vec<RuleId>> = HashMap::default();
        let mut unary_graph = DiGraph::<NonTerminal, RuleId>::with_capacity(n_nonterminals, 0);
        for i in 0..n_nonterminals {
            unary_graph.add_node(NonTerminal(i as u32));
        }

        for (i, rule) in rules.iter().enumerate() {
            let id = RuleId(i as u32);
            by_parent[rule.parent.index()].push(id);
            match rule.rhs {
                Rhs::Lexical(t) => lexical[t.index()].push(id),
                Rhs::Unary(c) => {
                    unary_by_child[c.index()].push(id);
                    unary_graph.add_edge(
                        NodeIndex::new(c.index()),
                        NodeIndex::new(rule.parent.index()),
                        id,
                    );
                }
                Rhs::Binary(l, r) => {
                    by_left[l.index()].push(id);
                    by_right[r.index()].push(id);
                    by_children.entry((l, r)).or_default().push(id);
                }
            }
        }

        //Children must be finished before any unary rule reads them, so rules are ordered by the
        //topological rank of their child.
        let order = toposort(&unary_graph, None).map_err(|cycle| GrammarError::CyclicUnaryRules {
            symbol: unary_graph[cycle.node_id()],
        })?;
        let mut rank = vec![0; n_nonterminals];
        for (position, node) in order.into_iter().enumerate() {
            rank[node.index()] = position;
        }
        let mut ranked: Vec<(usize, RuleId)> = rules
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match r.rhs {
                Rhs::Unary(c) => Some((rank[c.index()], RuleId(i as u32))),
                _ => None,
            })
            .collect();
        ranked.sort_unstable();
        let unary_order: Vec<RuleId> = ranked.into_iter().map(|(_, id)| id).collect();

        tracing::debug!(
            rules = rules.len(),
            nonterminals = n_nonterminals,
            terminals = n_terminals,
            unary = unary_order.len(),
            "froze grammar"
        );

        Ok(Grammar {
            root,
            rules,
            n_nonterminals,
            n_terminals,
            lexical,
            unary_by_child,
            unary_order,
            by_left,
            by_right,
            by_parent,
            by_children,
        })
    }
}

fn inferred_counts(rules: &[Rule]) -> (usize, usize) {
    let mut n_nonterminals = 0;
    let mut n_terminals = 0;
    for rule in rules {
        n_nonterminals = n_nonterminals.max(rule.parent.index() + 1);
        match rule.rhs {
            Rhs::Lexical(t) => n_terminals = n_terminals.max(t.index() + 1),
            Rhs::Unary(c) => n_nonterminals = n_nonterminals.max(c.index() + 1),
            Rhs::Binary(l, r) => {
                n_nonterminals = n_nonterminals.max(l.index().max(r.index()) + 1);
            }
        }
    }
    (n_nonterminals, n_terminals)
}

///An immutable CNF grammar with every index a chart parser needs.
///
///All lookups return rule ids in insertion order, which is what makes first-wins tie breaking
///deterministic. A `Grammar` is `Sync`, so one instance can serve parsers on many threads.
#[derive(Debug, Clone)]
pub struct Grammar {
    root: NonTerminal,
    rules: Vec<Rule>,
    n_nonterminals: usize,
    n_terminals: usize,
    lexical: Vec<Vec<RuleId>>,
    unary_by_child: Vec<Vec<RuleId>>,
    unary_order: Vec<RuleId>,
    by_left: Vec<Vec<RuleId>>,
    by_right: Vec<Vec<RuleId>>,
    by_parent: Vec<Vec<RuleId>>,
    by_children: HashMap<(NonTerminal, NonTerminal), Vec<RuleId>>,
}

impl Grammar {
    ///Builds a grammar, inferring the symbol table sizes from the rules.
    pub fn build(
        rules: impl IntoIterator<Item = Rule>,
        root: NonTerminal,
    ) -> Result<Grammar, GrammarError> {
        let mut builder = GrammarBuilder::new(root);
        builder.extend(rules);
        builder.freeze()
    }

    pub fn root(&self) -> NonTerminal {
        self.root
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, r)| (RuleId(i as u32), r))
    }

    pub fn n_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn num_nonterminals(&self) -> usize {
        self.n_nonterminals
    }

    pub fn num_lexical(&self) -> usize {
        self.n_terminals
    }

    ///Lexical rules rewriting to `word`. Unknown words have none.
    pub fn lexical_rules(&self, word: Terminal) -> &[RuleId] {
        self.lexical
            .get(word.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn unary_rules_by_child(&self, child: NonTerminal) -> &[RuleId] {
        self.unary_by_child
            .get(child.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    ///Every unary rule, children before the parents that use them.
    pub fn unary_closure_order(&self) -> &[RuleId] {
        &self.unary_order
    }

    ///Binary rules whose left child is `left`.
    pub fn rules_by_left_child(&self, left: NonTerminal) -> &[RuleId] {
        self.by_left
            .get(left.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    ///Binary rules whose right child is `right`.
    pub fn rules_by_right_child(&self, right: NonTerminal) -> &[RuleId] {
        self.by_right
            .get(right.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    ///Rules of every kind rewriting `parent`.
    pub fn rules_by_parent(&self, parent: NonTerminal) -> &[RuleId] {
        self.by_parent
            .get(parent.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn rules_by_children(&self, left: NonTerminal, right: NonTerminal) -> &[RuleId] {
        self.by_children
            .get(&(left, right))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
