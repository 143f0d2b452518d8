//! Inside and outside scores, and the expected rule counts built from them.
use super::{ParsingError, RuleSpan, Scorer, Unscored, fill, weight};
use crate::ParserConfig;
use crate::chart::{Chart, ChartCell, DenseCell, FirstWins, HashedCell};
use crate::grammar::{Grammar, NonTerminal, Rhs, RuleId, Terminal};
use crate::semiring::{LogInside, Semiring};
use logprob::LogProb;

///An inside chart and the outside chart computed from it.
#[derive(Debug)]
pub(crate) struct Pass<'g, C> {
    inside: Chart<'g, C>,
    outside: Chart<'g, C>,
}

#[derive(Debug)]
pub(crate) enum Tables<'g> {
    Dense(Pass<'g, DenseCell<LogInside>>),
    Hashed(Pass<'g, HashedCell<LogInside>>),
}

impl<'g, C: ChartCell<Value = LogInside, Ties = FirstWins>> Pass<'g, C> {
    pub(crate) fn compute(
        grammar: &'g Grammar,
        sentence: &[Terminal],
        config: &ParserConfig,
        scorer: &impl Scorer,
    ) -> Result<Self, ParsingError> {
        let n = sentence.len();
        let mut inside: Chart<'g, C> = Chart::new(grammar, n);
        {
            let _span = tracing::debug_span!("inside", len = n).entered();
            fill(&mut inside, sentence, config, scorer, &mut FirstWins)?;
        }
        if inside.score(grammar.root(), 0, n).is_zero() {
            tracing::debug!(len = n, "no parse");
            return Err(ParsingError::NoParse);
        }
        let _span = tracing::debug_span!("outside", len = n).entered();
        let outside = outside_pass(&inside, scorer);
        Ok(Pass { inside, outside })
    }

    fn expected_count(
        &self,
        sentence: &[Terminal],
        scorer: &impl Scorer,
        id: RuleId,
        span: RuleSpan,
        total: f64,
    ) -> f64 {
        let RuleSpan { start, mid, end } = span;
        let rule = self.inside.grammar().rule(id);
        let parent_outside = self.outside.score(rule.parent, start, end);
        if parent_outside.is_zero() {
            return 0.0;
        }
        let children = match (rule.rhs, mid) {
            (Rhs::Lexical(word), None) if end == start + 1 && sentence[start] == word => {
                LogInside::one()
            }
            (Rhs::Unary(child), None) => self.inside.score(child, start, end),
            (Rhs::Binary(left, right), Some(mid)) if start < mid && mid < end => self
                .inside
                .score(left, start, mid)
                .extend(self.inside.score(right, mid, end)),
            _ => return 0.0,
        };
        let joint = children
            .extend(weight(rule, span, scorer))
            .extend(parent_outside);
        (joint.log_value() - total).exp()
    }

    fn expected_rule_counts(&self, sentence: &[Terminal], scorer: &impl Scorer, total: f64) -> Vec<f64> {
        let grammar = self.inside.grammar();
        let n = self.inside.len();
        let mut counts = vec![0.0; grammar.n_rules()];
        for width in 1..=n {
            for start in 0..=n - width {
                let end = start + width;
                for &parent in self.inside.cell(start, end).active_nonterminals() {
                    if self.outside.score(parent, start, end).is_zero() {
                        continue;
                    }
                    for &id in grammar.rules_by_parent(parent) {
                        let count = &mut counts[id.index()];
                        match grammar.rule(id).rhs {
                            Rhs::Binary(..) => {
                                for mid in start + 1..end {
                                    let span = RuleSpan::new(start, Some(mid), end);
                                    *count += self.expected_count(sentence, scorer, id, span, total);
                                }
                            }
                            Rhs::Lexical(_) | Rhs::Unary(_) => {
                                let span = RuleSpan::new(start, None, end);
                                *count += self.expected_count(sentence, scorer, id, span, total);
                            }
                        }
                    }
                }
            }
        }
        counts
    }
}

///Runs from the widest span to the narrowest. Within a cell, unary rules go parents first so
///that a symbol's outside score is complete before it is passed down a chain; binary rules then
///pass it to the two narrower children.
fn outside_pass<'g, C: ChartCell<Value = LogInside>>(
    inside: &Chart<'g, C>,
    scorer: &impl Scorer,
) -> Chart<'g, C> {
    let grammar = inside.grammar();
    let n = inside.len();
    let mut outside: Chart<'g, C> = Chart::new(grammar, n);
    outside
        .cell_mut(0, n)
        .accumulate(grammar.root(), LogInside::one());

    for width in (1..=n).rev() {
        for start in 0..=n - width {
            let end = start + width;
            let inside_cell = inside.cell(start, end);

            let unary_span = RuleSpan::new(start, None, end);
            for &id in grammar.unary_closure_order().iter().rev() {
                let rule = grammar.rule(id);
                let Rhs::Unary(child) = rule.rhs else {
                    continue;
                };
                let parent_outside = outside.score(rule.parent, start, end);
                if parent_outside.is_zero() || !inside_cell.is_active(child) {
                    continue;
                }
                let passed = parent_outside.extend(weight(rule, unary_span, scorer));
                outside.cell_mut(start, end).accumulate(child, passed);
            }

            for &parent in inside_cell.active_nonterminals() {
                let parent_outside = outside.score(parent, start, end);
                if parent_outside.is_zero() {
                    continue;
                }
                for &id in grammar.rules_by_parent(parent) {
                    let rule = grammar.rule(id);
                    let Rhs::Binary(left, right) = rule.rhs else {
                        continue;
                    };
                    for mid in start + 1..end {
                        let left_inside = inside.score(left, start, mid);
                        let right_inside = inside.score(right, mid, end);
                        if left_inside.is_zero() || right_inside.is_zero() {
                            continue;
                        }
                        let span = RuleSpan::new(start, Some(mid), end);
                        let through = parent_outside.extend(weight(rule, span, scorer));
                        outside
                            .cell_mut(start, mid)
                            .accumulate(left, through.extend(right_inside));
                        outside
                            .cell_mut(mid, end)
                            .accumulate(right, through.extend(left_inside));
                    }
                }
            }
            outside.cell_mut(start, end).close();
        }
    }
    outside
}

macro_rules! with_pass {
    ($tables:expr, $pass:ident => $body:expr) => {
        match $tables {
            Tables::Dense($pass) => $body,
            Tables::Hashed($pass) => $body,
        }
    };
}

///Inside and outside scores of every `(symbol, start, end)` item of one sentence.
///
///All scores are natural logs. Items that cannot be derived, or that lie outside the sentence,
///score `-inf`.
#[derive(Debug)]
pub struct InsideOutsideChart<'g, Sc = Unscored> {
    grammar: &'g Grammar,
    sentence: Vec<Terminal>,
    scorer: Sc,
    tables: Tables<'g>,
    total: f64,
}

impl<'g, Sc: Scorer> InsideOutsideChart<'g, Sc> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        sentence: &[Terminal],
        scorer: Sc,
        tables: Tables<'g>,
    ) -> Self {
        let n = sentence.len();
        let total = with_pass!(&tables, pass => pass.inside.score(grammar.root(), 0, n).0);
        InsideOutsideChart {
            grammar,
            sentence: sentence.to_vec(),
            scorer,
            tables,
            total,
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn sentence(&self) -> &[Terminal] {
        &self.sentence
    }

    pub fn len(&self) -> usize {
        self.sentence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentence.is_empty()
    }

    ///Log of the total weight of all parses, the inside score of the root over the sentence.
    pub fn total(&self) -> f64 {
        self.total
    }

    fn in_range(&self, start: usize, end: usize) -> bool {
        start < end && end <= self.len()
    }

    pub fn inside(&self, nt: NonTerminal, start: usize, end: usize) -> f64 {
        if !self.in_range(start, end) {
            return f64::NEG_INFINITY;
        }
        with_pass!(&self.tables, pass => pass.inside.score(nt, start, end).0)
    }

    pub fn outside(&self, nt: NonTerminal, start: usize, end: usize) -> f64 {
        if !self.in_range(start, end) {
            return f64::NEG_INFINITY;
        }
        with_pass!(&self.tables, pass => pass.outside.score(nt, start, end).0)
    }

    ///The probability that a parse of the sentence has `nt` over `(start, end)`, or `None` if
    ///`nt` cannot be derived there.
    pub fn posterior(&self, nt: NonTerminal, start: usize, end: usize) -> Option<LogProb<f64>> {
        let inside = self.inside(nt, start, end);
        if inside == f64::NEG_INFINITY {
            return None;
        }
        let value = inside + self.outside(nt, start, end) - self.total;
        LogProb::new(value.min(0.0)).ok()
    }

    ///Expected number of times `rule` is used over `(start, end)`, split at `mid` for binary
    ///rules. `mid` must be `None` for lexical and unary rules; mismatched shapes count zero.
    pub fn expected_count(&self, rule: RuleId, start: usize, mid: Option<usize>, end: usize) -> f64 {
        if !self.in_range(start, end) || rule.index() >= self.grammar.n_rules() {
            return 0.0;
        }
        let span = RuleSpan::new(start, mid, end);
        with_pass!(&self.tables, pass => pass.expected_count(
            &self.sentence,
            &self.scorer,
            rule,
            span,
            self.total
        ))
    }

    ///Expected counts of every rule summed over all spans, indexed by [`RuleId`].
    pub fn expected_rule_counts(&self) -> Vec<f64> {
        with_pass!(&self.tables, pass => pass.expected_rule_counts(
            &self.sentence,
            &self.scorer,
            self.total
        ))
    }
}
