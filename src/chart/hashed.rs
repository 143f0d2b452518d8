use super::{ChartCell, Entry, FirstWins, TiePolicy};
use crate::grammar::NonTerminal;
use crate::semiring::Semiring;
use ahash::HashMap;

///A cell that only stores the nonterminals it has seen. Suits grammars with many more
///nonterminals than any one span ever derives.
#[derive(Debug, Clone)]
pub struct HashedCell<S: Semiring, P: TiePolicy = FirstWins> {
    entries: HashMap<NonTerminal, Entry<S, P::Mark>>,
    active: Vec<NonTerminal>,
    closed: bool,
}

impl<S: Semiring, P: TiePolicy> ChartCell for HashedCell<S, P> {
    type Value = S;
    type Ties = P;

    fn with_capacity(_n_nonterminals: usize) -> Self {
        HashedCell {
            entries: HashMap::default(),
            active: vec![],
            closed: false,
        }
    }

    fn entry(&self, nt: NonTerminal) -> Option<&Entry<S, P::Mark>> {
        self.entries.get(&nt)
    }

    fn entry_mut(&mut self, nt: NonTerminal) -> &mut Entry<S, P::Mark> {
        let active = &mut self.active;
        self.entries.entry(nt).or_insert_with(|| {
            active.push(nt);
            Entry::empty()
        })
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
        self.entries.clear();
        self.active.clear();
        self.closed = false;
    }
}
