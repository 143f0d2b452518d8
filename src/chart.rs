//! The triangular chart and the per-span cells it is made of.
//!
//! Cells are stored width-major: every span of width `w` comes after every span of width `w - 1`.
//! When a cell of width `w` is filled, all of its possible children therefore live in the prefix
//! of the cell array, which can be borrowed immutably while the current width is borrowed mutably.
use crate::grammar::{Grammar, NonTerminal, RuleId};
use crate::semiring::{Semiring, TIE_TOLERANCE};
use std::fmt::Debug;

mod dense;
mod hashed;
mod ties;

pub use dense::DenseCell;
pub use hashed::HashedCell;
pub use ties::{FirstWins, RandomTies, TiePolicy};

///Grammars with at most this many nonterminals get [`DenseCell`]s under [`CellStorage::Auto`].
pub const DENSE_LIMIT: usize = 512;

///How each cell stores its entries.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CellStorage {
    ///[`CellStorage::Dense`] for grammars with at most [`DENSE_LIMIT`] nonterminals, otherwise
    ///[`CellStorage::Hashed`].
    #[default]
    Auto,
    ///One slot per nonterminal: constant time access, memory linear in the grammar.
    Dense,
    ///A hash map of the nonterminals actually derived.
    Hashed,
}

impl CellStorage {
    ///Replaces [`CellStorage::Auto`] with the concrete storage for `grammar`.
    pub fn resolve(self, grammar: &Grammar) -> CellStorage {
        match self {
            CellStorage::Auto if grammar.num_nonterminals() <= DENSE_LIMIT => CellStorage::Dense,
            CellStorage::Auto => CellStorage::Hashed,
            storage => storage,
        }
    }
}

///How an entry's best derivation was built: a rule and, for binary rules, the split point.
///Ordered by rule, then split.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub struct Backpointer {
    pub rule: RuleId,
    pub split: Option<usize>,
}

impl Backpointer {
    pub fn new(rule: RuleId, split: Option<usize>) -> Self {
        Backpointer { rule, split }
    }
}

///The value a cell keeps for one nonterminal.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Entry<S, M> {
    ///All derivations combined with ⊕.
    pub score: S,
    ///Log value of the single derivation the backpointer points to.
    pub best: f64,
    pub backpointer: Option<Backpointer>,
    pub(crate) mark: M,
}

impl<S: Semiring, M: Default> Entry<S, M> {
    pub(crate) fn empty() -> Self {
        Entry {
            score: S::zero(),
            best: f64::NEG_INFINITY,
            backpointer: None,
            mark: M::default(),
        }
    }

    pub(crate) fn is_zero(&self) -> bool {
        self.score.is_zero()
    }

    ///Adds a derivation to the entry. The score always absorbs the candidate; the backpointer
    ///only moves if the candidate is strictly better, or ties and wins under `ties`.
    pub(crate) fn offer<P: TiePolicy<Mark = M>>(
        &mut self,
        candidate: S,
        backpointer: Backpointer,
        ties: &P,
    ) {
        self.score = self.score.combine(candidate);
        let value = candidate.log_value();
        match self.backpointer {
            Some(incumbent) if value <= self.best + TIE_TOLERANCE => {
                if value + TIE_TOLERANCE < self.best {
                    return;
                }
                if let Some(mark) = ties.challenger_wins(incumbent, &mut self.mark, backpointer) {
                    self.best = self.best.max(value);
                    self.backpointer = Some(backpointer);
                    self.mark = mark;
                }
            }
            _ => {
                self.best = value;
                self.backpointer = Some(backpointer);
                self.mark = M::default();
            }
        }
    }
}

///Storage for the items of one span.
///
///Cells are created empty, filled while open, closed once their span is complete and then only
///read. [`ChartCell::reset`] makes a cell reusable for the next sentence.
pub trait ChartCell: Debug + Sized {
    type Value: Semiring;
    type Ties: TiePolicy;

    fn with_capacity(n_nonterminals: usize) -> Self;

    fn entry(&self, nt: NonTerminal) -> Option<&Entry<Self::Value, <Self::Ties as TiePolicy>::Mark>>;

    fn entry_mut(
        &mut self,
        nt: NonTerminal,
    ) -> &mut Entry<Self::Value, <Self::Ties as TiePolicy>::Mark>;

    ///Nonterminals with an entry, in the order they were first derived.
    fn active_nonterminals(&self) -> &[NonTerminal];

    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn reset(&mut self);

    ///Offers a derivation of `nt`. Zero candidates are dropped.
    fn update(
        &mut self,
        nt: NonTerminal,
        candidate: Self::Value,
        backpointer: Backpointer,
        ties: &mut Self::Ties,
    ) {
        debug_assert!(!self.is_closed(), "updating {nt} in a closed cell");
        debug_assert!(
            !candidate.log_value().is_nan(),
            "NaN score for {nt} via {backpointer:?}"
        );
        if candidate.is_zero() {
            return;
        }
        self.entry_mut(nt).offer(candidate, backpointer, ties);
    }

    ///Combines `value` into the score of `nt` without touching its backpointer.
    fn accumulate(&mut self, nt: NonTerminal, value: Self::Value) {
        debug_assert!(!value.log_value().is_nan(), "NaN score for {nt}");
        if value.is_zero() {
            return;
        }
        let entry = self.entry_mut(nt);
        entry.score = entry.score.combine(value);
    }

    ///The semiring zero if `nt` was never derived.
    fn score(&self, nt: NonTerminal) -> Self::Value {
        self.entry(nt)
            .map_or_else(Self::Value::zero, |entry| entry.score)
    }

    fn backpointer(&self, nt: NonTerminal) -> Option<Backpointer> {
        self.entry(nt).and_then(|entry| entry.backpointer)
    }

    fn is_active(&self, nt: NonTerminal) -> bool {
        self.entry(nt).is_some()
    }
}

///Index of span `(start, end)` in a width-major chart over `len` words.
fn cell_index(len: usize, start: usize, end: usize) -> usize {
    debug_assert!(
        start < end && end <= len,
        "span ({start}, {end}) is outside a chart of length {len}"
    );
    width_offset(len, end - start) + start
}

///Number of cells narrower than `width`.
fn width_offset(len: usize, width: usize) -> usize {
    let w = width - 1;
    w * (len + 1) - w * (w + 1) / 2
}

///A triangular array of cells, one per span `(start, end)` with `0 <= start < end <= len`.
#[derive(Debug)]
pub struct Chart<'g, C> {
    grammar: &'g Grammar,
    len: usize,
    cells: Vec<C>,
}

impl<'g, C: ChartCell> Chart<'g, C> {
    pub fn new(grammar: &'g Grammar, len: usize) -> Self {
        let n_cells = len * (len + 1) / 2;
        let cells = (0..n_cells)
            .map(|_| C::with_capacity(grammar.num_nonterminals()))
            .collect();
        Chart {
            grammar,
            len,
            cells,
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    ///Length of the sentence the chart is sized for.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cell(&self, start: usize, end: usize) -> &C {
        &self.cells[cell_index(self.len, start, end)]
    }

    pub fn cell_mut(&mut self, start: usize, end: usize) -> &mut C {
        let i = cell_index(self.len, start, end);
        &mut self.cells[i]
    }

    ///Shorthand for the score of `nt` over `(start, end)`.
    pub fn score(&self, nt: NonTerminal, start: usize, end: usize) -> C::Value {
        self.cell(start, end).score(nt)
    }

    ///Prepares the chart for a sentence of `len` words. Used cells are cleared in place and new
    ///ones are only allocated if the sentence is longer than any seen before.
    pub fn reset(&mut self, len: usize) {
        let used = (self.len * (self.len + 1) / 2).min(self.cells.len());
        for cell in &mut self.cells[..used] {
            cell.reset();
        }
        let needed = len * (len + 1) / 2;
        if needed > self.cells.len() {
            let n_nonterminals = self.grammar.num_nonterminals();
            self.cells
                .resize_with(needed, || C::with_capacity(n_nonterminals));
        }
        self.len = len;
    }

    ///Splits the chart into every cell narrower than `width` and the cells of exactly `width`,
    ///the latter indexed by their start.
    pub(crate) fn split_at_width(&mut self, width: usize) -> (Narrower<'_, C>, &mut [C]) {
        let offset = width_offset(self.len, width);
        let n_current = self.len + 1 - width;
        let (narrower, rest) = self.cells.split_at_mut(offset);
        (
            Narrower {
                len: self.len,
                cells: narrower,
            },
            &mut rest[..n_current],
        )
    }
}

///Read access to the cells below the width currently being filled.
#[derive(Debug)]
pub(crate) struct Narrower<'a, C> {
    len: usize,
    cells: &'a [C],
}

impl<C> Narrower<'_, C> {
    pub(crate) fn cell(&self, start: usize, end: usize) -> &C {
        &self.cells[cell_index(self.len, start, end)]
    }
}
