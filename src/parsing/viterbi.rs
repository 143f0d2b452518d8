use super::ParsingError;
use crate::chart::{Chart, ChartCell};
use crate::grammar::{Rhs, Symbol};
use crate::semiring::Semiring;
use crate::trees::{NaryTree, Span};

///Reads the best tree off a filled chart by following backpointers down from the root.
///
///Preterminals get their word as a lexical leaf, so the leaves of the tree are the sentence.
pub fn viterbi_tree<C: ChartCell>(chart: &Chart<'_, C>) -> Result<NaryTree<Symbol>, ParsingError> {
    let root = chart.grammar().root();
    if chart.is_empty() || chart.score(root, 0, chart.len()).is_zero() {
        tracing::debug!(len = chart.len(), "no parse");
        return Err(ParsingError::NoParse);
    }
    build(chart, Symbol::NonTerminal(root), 0, chart.len())
}

fn build<C: ChartCell>(
    chart: &Chart<'_, C>,
    symbol: Symbol,
    start: usize,
    end: usize,
) -> Result<NaryTree<Symbol>, ParsingError> {
    let Symbol::NonTerminal(nt) = symbol else {
        return Ok(NaryTree::leaf(symbol, start));
    };
    let backpointer = chart
        .cell(start, end)
        .backpointer(nt)
        .ok_or(ParsingError::NoParse)?;
    let rule = chart.grammar().rule(backpointer.rule);
    let children = match (rule.rhs, backpointer.split) {
        (Rhs::Lexical(word), _) => vec![build(chart, Symbol::Terminal(word), start, end)?],
        (Rhs::Unary(child), _) => vec![build(chart, Symbol::NonTerminal(child), start, end)?],
        (Rhs::Binary(left, right), Some(mid)) => vec![
            build(chart, Symbol::NonTerminal(left), start, mid)?,
            build(chart, Symbol::NonTerminal(right), mid, end)?,
        ],
        (Rhs::Binary(..), None) => unreachable!("binary backpointers always have a split"),
    };
    Ok(NaryTree::node_unchecked(
        symbol,
        Span::new(start, end),
        children,
    ))
}
