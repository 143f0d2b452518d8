use super::{ChartCell, Entry, FirstWins, TiePolicy};
use crate::grammar::NonTerminal;
use crate::semiring::Semiring;
use bitvec::vec::BitVec;

///A cell with one slot per nonterminal of the grammar.
#[derive(Debug, Clone)]
pub struct DenseCell<S: Semiring, P: TiePolicy = FirstWins> {
    entries: Vec<Entry<S, P::Mark>>,
    present: BitVec,
    active: Vec<NonTerminal>,
    closed: bool,
}

impl<S: Semiring, P: TiePolicy> ChartCell for DenseCell<S, P> {
    type Value = S;
    type Ties = P;

    fn with_capacity(n_nonterminals: usize) -> Self {
        DenseCell {
            entries: vec![Entry::empty(); n_nonterminals],
            present: BitVec::repeat(false, n_nonterminals),
            active: vec![],
            closed: false,
        }
    }

    fn entry(&self, nt: NonTerminal) -> Option<&Entry<S, P::Mark>> {
        let i = nt.index();
        if self.present.get(i).is_some_and(|bit| *bit) {
            Some(&self.entries[i])
        } else {
            None
        }
    }

    fn entry_mut(&mut self, nt: NonTerminal) -> &mut Entry<S, P::Mark> {
        let i = nt.index();
        debug_assert!(
            i < self.entries.len(),
            "{nt} is outside a cell of {} nonterminals",
            self.entries.len()
        );
        if !self.present[i] {
            self.present.set(i, true);
            self.active.push(nt);
        }
        &mut self.entries[i]
    }

    fn active_nonterminals(&self) -> &[NonTerminal] {
        &self.active
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn reset(&mut self) {
        for nt in self.active.drain(..) {
            self.entries[nt.index()] = Entry::empty();
            self.present.set(nt.index(), false);
        }
        self.closed = false;
    }
}
