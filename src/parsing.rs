//! The CKY recurrence, shared by every semiring and every kind of cell.
//!
//! Spans are filled by increasing width. Width one reads lexical rules off the sentence, wider
//! spans combine pairs of adjacent narrower spans with binary rules, and every cell finishes with
//! a unary closure before it is closed.
use crate::ParserConfig;
use crate::chart::{Backpointer, Chart, ChartCell, TiePolicy};
use crate::grammar::{Grammar, Rhs, Rule, Terminal};
use crate::semiring::Semiring;
use std::sync::atomic::Ordering;
use thiserror::Error;

mod inside_outside;
mod viterbi;


pub use inside_outside::InsideOutsideChart;
pub(crate) use inside_outside::{Pass, Tables};
pub use viterbi::viterbi_tree;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParsingError {
    #[error("The sentence has no derivation from the root")]
    NoParse,
    #[error("Cannot parse an empty sentence")]
    EmptySentence,
    #[error("Parsing was cancelled before width {width}")]
    Cancelled { width: usize },
}

///The order in which the binary step enumerates candidate rules for one split point. Every order
///finds the same derivations and keeps the same backpointers; only the memory access pattern
///differs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum LoopOrder {
    ///Active nonterminals of the left cell, then the rules they are the left child of.
    #[default]
    LeftChildFirst,
    ///Active nonterminals of the right cell, then the rules they are the right child of.
    RightChildFirst,
    ///Every pair of active left and right nonterminals, then the rules with exactly those
    ///children.
    Cartesian,
}

///Where a rule is applied. `mid` is the split point of binary rules and `None` otherwise.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RuleSpan {
    pub start: usize,
    pub mid: Option<usize>,
    pub end: usize,
}

impl RuleSpan {
    pub fn new(start: usize, mid: Option<usize>, end: usize) -> Self {
        RuleSpan { start, mid, end }
    }
}

///Adds a span-dependent term to rule scores, e.g. for reranking, without touching the grammar.
pub trait Scorer {
    ///Log-space value added to `rule.score` when `rule` is used over `span`.
    fn adjust(&self, rule: &Rule, span: RuleSpan) -> f64;
}

impl<F: Fn(&Rule, RuleSpan) -> f64> Scorer for F {
    fn adjust(&self, rule: &Rule, span: RuleSpan) -> f64 {
        self(rule, span)
    }
}

///Uses the grammar's scores as they are.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Unscored;

impl Scorer for Unscored {
    fn adjust(&self, _rule: &Rule, _span: RuleSpan) -> f64 {
        0.0
    }
}

///The semiring weight of `rule` over `span`.
pub(crate) fn weight<S: Semiring>(rule: &Rule, span: RuleSpan, scorer: &impl Scorer) -> S {
    S::from_log(rule.score + scorer.adjust(rule, span))
}

struct Cky<'a, Sc> {
    grammar: &'a Grammar,
    scorer: &'a Sc,
    order: LoopOrder,
}

impl<Sc: Scorer> Cky<'_, Sc> {
    fn lexical<C: ChartCell>(&self, cell: &mut C, word: Terminal, start: usize, ties: &mut C::Ties) {
        let span = RuleSpan::new(start, None, start + 1);
        for &id in self.grammar.lexical_rules(word) {
            let rule = self.grammar.rule(id);
            cell.update(
                rule.parent,
                weight(rule, span, self.scorer),
                Backpointer::new(id, None),
                ties,
            );
        }
    }

    fn binary<C: ChartCell>(
        &self,
        target: &mut C,
        left: &C,
        right: &C,
        span: RuleSpan,
        ties: &mut C::Ties,
    ) {
        let grammar = self.grammar;
        let mut apply = |id, l: C::Value, r: C::Value| {
            let rule = grammar.rule(id);
            let candidate = l.extend(r).extend(weight(rule, span, self.scorer));
            target.update(rule.parent, candidate, Backpointer::new(id, span.mid), ties);
        };

        match self.order {
            LoopOrder::LeftChildFirst => {
                for &l in left.active_nonterminals() {
                    let left_score = left.score(l);
                    for &id in grammar.rules_by_left_child(l) {
                        let Some(r) = grammar.rule(id).right() else {
                            continue;
                        };
                        let right_score = right.score(r);
                        if !right_score.is_zero() {
                            apply(id, left_score, right_score);
                        }
                    }
                }
            }
            LoopOrder::RightChildFirst => {
                for &r in right.active_nonterminals() {
                    let right_score = right.score(r);
                    for &id in grammar.rules_by_right_child(r) {
                        let Rhs::Binary(l, _) = grammar.rule(id).rhs else {
                            continue;
                        };
                        let left_score = left.score(l);
                        if !left_score.is_zero() {
                            apply(id, left_score, right_score);
                        }
                    }
                }
            }
            LoopOrder::Cartesian => {
                for &l in left.active_nonterminals() {
                    let left_score = left.score(l);
                    for &r in right.active_nonterminals() {
                        let right_score = right.score(r);
                        for &id in grammar.rules_by_children(l, r) {
                            apply(id, left_score, right_score);
                        }
                    }
                }
            }
        }
    }

    ///Applies every unary rule once, children before parents, so chains of any length are
    ///complete afterwards.
    fn unary_closure<C: ChartCell>(
        &self,
        cell: &mut C,
        start: usize,
        end: usize,
        ties: &mut C::Ties,
    ) {
        let span = RuleSpan::new(start, None, end);
        for &id in self.grammar.unary_closure_order() {
            let rule = self.grammar.rule(id);
            let Rhs::Unary(child) = rule.rhs else {
                continue;
            };
            let child_score = cell.score(child);
            if child_score.is_zero() {
                continue;
            }
            let candidate = child_score.extend(weight(rule, span, self.scorer));
            cell.update(rule.parent, candidate, Backpointer::new(id, None), ties);
        }
    }
}

///Fills `chart` for `sentence`, resizing and clearing it first so a chart can be reused from
///one sentence to the next.
///
///The chart is filled whether or not the root is derivable; the caller checks the root cell.
///Cancellation is checked before every `config.cancel_check_interval` widths.
pub fn fill<C: ChartCell>(
    chart: &mut Chart<'_, C>,
    sentence: &[Terminal],
    config: &ParserConfig,
    scorer: &impl Scorer,
    ties: &mut C::Ties,
) -> Result<(), ParsingError> {
    if sentence.is_empty() {
        return Err(ParsingError::EmptySentence);
    }
    let n = sentence.len();
    chart.reset(n);
    let cky = Cky {
        grammar: chart.grammar(),
        scorer,
        order: config.loop_order,
    };
    let check_every = config.cancel_check_interval.max(1);

    for width in 1..=n {
        if let Some(cancel) = config.cancel.as_deref() {
            if (width - 1) % check_every == 0 && cancel.load(Ordering::Relaxed) {
                tracing::debug!(width, "parse cancelled");
                return Err(ParsingError::Cancelled { width });
            }
        }

        let (narrower, current) = chart.split_at_width(width);
        for (start, cell) in current.iter_mut().enumerate() {
            let end = start + width;
            ties.enter_span(start, end);
            if width == 1 {
                cky.lexical(cell, sentence[start], start, ties);
            } else {
                for mid in start + 1..end {
                    let span = RuleSpan::new(start, Some(mid), end);
                    cky.binary(
                        cell,
                        narrower.cell(start, mid),
                        narrower.cell(mid, end),
                        span,
                        ties,
                    );
                }
            }
            cky.unary_closure(cell, start, end, ties);
            cell.close();
        }
        tracing::trace!(width, "filled width");
    }
    Ok(())
}
