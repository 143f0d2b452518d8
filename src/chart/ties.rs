//! What happens when two derivations of the same item score the same.
//!
//! Both policies only look at the contenders themselves, never at the order they are offered in,
//! so every loop order ends up with the same backpointers.
use super::Backpointer;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt::Debug;

///Decides between an incumbent backpointer and a challenger that scores within
///[`TIE_TOLERANCE`](crate::semiring::TIE_TOLERANCE) of it.
pub trait TiePolicy: Debug {
    ///Per-entry state, reset whenever an entry is strictly improved.
    type Mark: Copy + Debug + Default + PartialEq;

    ///Called before the cell over `(start, end)` is filled.
    fn enter_span(&mut self, _start: usize, _end: usize) {}

    ///Returns the challenger's mark if it should replace the incumbent. The incumbent's mark may be
    ///filled in on first use.
    fn challenger_wins(
        &self,
        incumbent: Backpointer,
        mark: &mut Self::Mark,
        challenger: Backpointer,
    ) -> Option<Self::Mark>;
}

///The derivation with the earliest rule wins, and for the same rule the earliest split.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FirstWins;

impl TiePolicy for FirstWins {
    type Mark = ();

    fn challenger_wins(
        &self,
        incumbent: Backpointer,
        _mark: &mut (),
        challenger: Backpointer,
    ) -> Option<()> {
        (challenger < incumbent).then_some(())
    }
}

///Every contender gets a random jitter drawn from the seed, its span, its rule and its split; the
///larger jitter wins. The incumbent's jitter is cached on the entry. The same seed always yields
///the same choices.
#[derive(Debug, Clone)]
pub struct RandomTies {
    seed: u64,
    span: (usize, usize),
}

impl RandomTies {
    pub fn new(seed: u64) -> Self {
        RandomTies { seed, span: (0, 0) }
    }

    fn jitter(&self, backpointer: Backpointer) -> u64 {
        let (start, end) = self.span;
        let split = backpointer.split.map_or(u32::MAX, |s| s as u32);
        let mut key = [0; 32];
        key[..8].copy_from_slice(&self.seed.to_le_bytes());
        key[8..16].copy_from_slice(&(start as u64).to_le_bytes());
        key[16..24].copy_from_slice(&(end as u64).to_le_bytes());
        key[24..28].copy_from_slice(&(backpointer.rule.index() as u32).to_le_bytes());
        key[28..].copy_from_slice(&split.to_le_bytes());
        ChaCha8Rng::from_seed(key).random()
    }
}

impl TiePolicy for RandomTies {
    type Mark = Option<u64>;

    fn enter_span(&mut self, start: usize, end: usize) {
        self.span = (start, end);
    }

    fn challenger_wins(
        &self,
        incumbent: Backpointer,
        mark: &mut Option<u64>,
        challenger: Backpointer,
    ) -> Option<Option<u64>> {
        let held = *mark.get_or_insert_with(|| self.jitter(incumbent));
        let drawn = self.jitter(challenger);
        let wins = drawn > held || (drawn == held && challenger < incumbent);
        wins.then_some(Some(drawn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, NonTerminal, Rule, RuleId, Terminal};

    fn rules() -> Vec<RuleId> {
        let nt = NonTerminal::new(0);
        let g = Grammar::build((0..3).map(|_| Rule::lexical(nt, Terminal::new(0), -1.0)), nt)
            .unwrap();
        g.rules().map(|(id, _)| id).collect()
    }

    #[test]
    fn first_wins_prefers_earlier_rules_and_splits() {
        let ids = rules();
        let bp = |i: usize, split| Backpointer::new(ids[i], split);
        let ties = FirstWins;
        assert_eq!(ties.challenger_wins(bp(2, None), &mut (), bp(0, None)), Some(()));
        assert_eq!(ties.challenger_wins(bp(0, None), &mut (), bp(2, None)), None);
        assert_eq!(ties.challenger_wins(bp(1, Some(3)), &mut (), bp(1, Some(1))), Some(()));
        assert_eq!(ties.challenger_wins(bp(1, Some(1)), &mut (), bp(1, Some(3))), None);
    }

    #[test]
    fn random_ties_do_not_depend_on_offer_order() {
        let ids = rules();
        let a = Backpointer::new(ids[0], Some(1));
        let b = Backpointer::new(ids[1], Some(2));
        let mut outcomes = vec![];
        for seed in 0..64 {
            let mut ties = RandomTies::new(seed);
            ties.enter_span(0, 3);
            let b_beats_a = ties.challenger_wins(a, &mut None, b).is_some();
            let a_beats_b = ties.challenger_wins(b, &mut None, a).is_some();
            assert_ne!(a_beats_b, b_beats_a);
            assert_eq!(
                RandomTies::new(seed).jitter(a),
                RandomTies::new(seed).jitter(a)
            );
            outcomes.push(b_beats_a);
        }
        assert!(outcomes.iter().any(|&x| x));
        assert!(outcomes.iter().any(|&x| !x));
    }

    #[test]
    fn jitter_depends_on_the_span() {
        let ids = rules();
        let a = Backpointer::new(ids[0], None);
        let mut ties = RandomTies::new(0);
        let before = ties.jitter(a);
        ties.enter_span(2, 3);
        assert_ne!(ties.jitter(a), before);
    }

    #[test]
    fn incumbent_mark_is_drawn_once() {
        let ids = rules();
        let a = Backpointer::new(ids[0], None);
        let b = Backpointer::new(ids[1], None);
        let ties = RandomTies::new(0);
        let mut mark = None;
        let _ = ties.challenger_wins(a, &mut mark, b);
        assert_eq!(mark, Some(ties.jitter(a)));
        mark = Some(u64::MAX);
        assert_eq!(ties.challenger_wins(a, &mut mark, b), None);
    }
}
