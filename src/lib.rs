//! A CKY chart parser for probabilistic context-free grammars in Chomsky normal form.
//!
//! A [`Grammar`] is built once, frozen, and can then be shared between threads. A [`Parser`]
//! finds the best tree of a sentence with the Viterbi semiring and the total weight of all trees
//! with the inside semiring, and [`Parser::run_inside_outside`] gives the expected rule counts
//! needed for EM.
//!
//! ```
//! use pcfg_cky::{GrammarFile, Parser, grammars::TIME_FLIES};
//!
//! let file = GrammarFile::parse(TIME_FLIES)?;
//! let parser = Parser::new(&file.grammar);
//! let result = parser.parse(&file.sentence(&["time", "flies"]))?;
//! assert_eq!(
//!     file.label_tree(&result.viterbi_tree).to_string(),
//!     "(S (NP (N time)) (VP (V flies)))"
//! );
//! assert_eq!(result.viterbi_score, -5.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chart::{Chart, ChartCell};
use parsing::{Pass, Tables};

pub use chart::{CellStorage, DenseCell, FirstWins, HashedCell, RandomTies, TiePolicy};
pub use grammar::{
    Grammar, GrammarBuilder, GrammarError, GrammarFile, NonTerminal, ReadError, Rhs, Rule, RuleId,
    RuleKind, Symbol, SymbolTable, Terminal,
};
pub use parsing::{
    InsideOutsideChart, LoopOrder, ParsingError, RuleSpan, Scorer, Unscored, fill, viterbi_tree,
};
pub use semiring::{LogInside, Semiring, Viterbi};
pub use trees::{BinaryChildren, BinaryTree, NaryTree, Span, TreeError};

///How equal-scoring derivations of the same item are chosen between.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TieBreaking {
    ///Keep the derivation with the earliest rule, then the earliest split.
    #[default]
    FirstWins,
    ///Choose with random jitter seeded by this value together with the span, rule and split.
    Seeded(u64),
}

///Settings shared by every parse a [`Parser`] runs.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub loop_order: LoopOrder,
    pub storage: CellStorage,
    pub tie_breaking: TieBreaking,
    ///Raise this flag from another thread to stop a parse early.
    pub cancel: Option<Arc<AtomicBool>>,
    ///The cancellation flag is read before every this many widths.
    pub cancel_check_interval: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            loop_order: LoopOrder::default(),
            storage: CellStorage::default(),
            tie_breaking: TieBreaking::default(),
            cancel: None,
            cancel_check_interval: 1,
        }
    }
}

impl ParserConfig {
    pub fn with_loop_order(mut self, loop_order: LoopOrder) -> Self {
        self.loop_order = loop_order;
        self
    }

    pub fn with_storage(mut self, storage: CellStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_tie_breaking(mut self, tie_breaking: TieBreaking) -> Self {
        self.tie_breaking = tie_breaking;
        self
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>, check_every: usize) -> Self {
        self.cancel = Some(flag);
        self.cancel_check_interval = check_every;
        self
    }
}

///The best tree of a sentence with its score, and the log of the summed weight of every tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "pretty", derive(serde::Serialize))]
pub struct ParseResult {
    pub viterbi_tree: NaryTree<Symbol>,
    pub viterbi_score: f64,
    pub inside_total_score: f64,
}

///Parses sentences with one grammar. Each call owns its charts, so a `Parser` can be used from
///several threads at once.
#[derive(Debug, Clone)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    config: ParserConfig,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Parser {
            grammar,
            config: ParserConfig::default(),
        }
    }

    pub fn with_config(grammar: &'g Grammar, config: ParserConfig) -> Self {
        Parser { grammar, config }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse(&self, sentence: &[Terminal]) -> Result<ParseResult, ParsingError> {
        self.parse_with(sentence, &Unscored)
    }

    ///Parses with random tie breaking seeded by `seed`, whatever the configuration says.
    pub fn parse_seeded(&self, sentence: &[Terminal], seed: u64) -> Result<ParseResult, ParsingError> {
        self.run(sentence, &Unscored, TieBreaking::Seeded(seed))
    }

    ///Parses with every rule score adjusted by `scorer`.
    pub fn parse_with(
        &self,
        sentence: &[Terminal],
        scorer: &impl Scorer,
    ) -> Result<ParseResult, ParsingError> {
        self.run(sentence, scorer, self.config.tie_breaking)
    }

    fn run(
        &self,
        sentence: &[Terminal],
        scorer: &impl Scorer,
        tie_breaking: TieBreaking,
    ) -> Result<ParseResult, ParsingError> {
        let storage = self.config.storage.resolve(self.grammar);
        let (viterbi_tree, viterbi_score) = {
            let _span = tracing::debug_span!("viterbi", len = sentence.len()).entered();
            match (storage, tie_breaking) {
                (CellStorage::Hashed, TieBreaking::FirstWins) => {
                    self.viterbi::<HashedCell<Viterbi>>(sentence, scorer, FirstWins)
                }
                (CellStorage::Hashed, TieBreaking::Seeded(seed)) => self
                    .viterbi::<HashedCell<Viterbi, RandomTies>>(
                        sentence,
                        scorer,
                        RandomTies::new(seed),
                    ),
                (_, TieBreaking::FirstWins) => {
                    self.viterbi::<DenseCell<Viterbi>>(sentence, scorer, FirstWins)
                }
                (_, TieBreaking::Seeded(seed)) => self.viterbi::<DenseCell<Viterbi, RandomTies>>(
                    sentence,
                    scorer,
                    RandomTies::new(seed),
                ),
            }?
        };
        let inside_total_score = {
            let _span = tracing::debug_span!("inside", len = sentence.len()).entered();
            match storage {
                CellStorage::Hashed => self.inside::<HashedCell<LogInside>>(sentence, scorer),
                _ => self.inside::<DenseCell<LogInside>>(sentence, scorer),
            }?
        };
        Ok(ParseResult {
            viterbi_tree,
            viterbi_score,
            inside_total_score,
        })
    }

    fn viterbi<C: ChartCell<Value = Viterbi>>(
        &self,
        sentence: &[Terminal],
        scorer: &impl Scorer,
        mut ties: C::Ties,
    ) -> Result<(NaryTree<Symbol>, f64), ParsingError> {
        let mut chart: Chart<C> = Chart::new(self.grammar, sentence.len());
        fill(&mut chart, sentence, &self.config, scorer, &mut ties)?;
        let tree = viterbi_tree(&chart)?;
        let score = chart.score(self.grammar.root(), 0, sentence.len());
        Ok((tree, score.0))
    }

    fn inside<C: ChartCell<Value = LogInside, Ties = FirstWins>>(
        &self,
        sentence: &[Terminal],
        scorer: &impl Scorer,
    ) -> Result<f64, ParsingError> {
        let mut chart: Chart<C> = Chart::new(self.grammar, sentence.len());
        fill(&mut chart, sentence, &self.config, scorer, &mut FirstWins)?;
        Ok(chart.score(self.grammar.root(), 0, sentence.len()).0)
    }

    ///Inside and outside scores of every item of `sentence`.
    pub fn run_inside_outside(
        &self,
        sentence: &[Terminal],
    ) -> Result<InsideOutsideChart<'g>, ParsingError> {
        self.run_inside_outside_with(sentence, Unscored)
    }

    ///Like [`Parser::run_inside_outside`], with rule scores adjusted by `scorer`. The chart keeps
    ///the scorer so that expected counts use the same weights as the passes.
    pub fn run_inside_outside_with<Sc: Scorer>(
        &self,
        sentence: &[Terminal],
        scorer: Sc,
    ) -> Result<InsideOutsideChart<'g, Sc>, ParsingError> {
        let tables = match self.config.storage.resolve(self.grammar) {
            CellStorage::Hashed => Tables::Hashed(Pass::compute(
                self.grammar,
                sentence,
                &self.config,
                &scorer,
            )?),
            _ => Tables::Dense(Pass::compute(
                self.grammar,
                sentence,
                &self.config,
                &scorer,
            )?),
        };
        Ok(InsideOutsideChart::new(
            self.grammar,
            sentence,
            scorer,
            tables,
        ))
    }
}

pub mod chart;
pub mod grammar;
pub mod grammars;
pub mod parsing;
pub mod semiring;
pub mod trees;

#[cfg(test)]
mod tests;
