//! Reader for the line-based grammar format.
//!
//! ```text
//! # comment
//! S
//! S --> NP VP -1
//! NP --> N -1
//! ===
//! N --> time -1
//! ```
//! The first line names the root. Lines up to `===` are nonterminal rules (unary or binary), lines
//! after it are lexical rules. Tokens are split on whitespace and token 2 is always `-->`.
use super::{Grammar, GrammarBuilder, GrammarError, NonTerminal, Rule, Symbol, Terminal};
use crate::trees::NaryTree;
use ahash::HashMap;
use logprob::LogProb;
use thiserror::Error;

const SEPARATOR: &str = "-->";
const SECTION_BREAK: &str = "===";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReadError {
    #[error("The grammar has no root line")]
    MissingRoot,
    #[error("Line {line} is not a rule: '{content}'")]
    MalformedLine { line: usize, content: String },
    #[error("Line {line} uses '{found}' where '-->' was expected")]
    BadSeparator { line: usize, found: String },
    #[error("Line {line} has score '{score}' which is not a log-probability")]
    BadScore { line: usize, score: String },
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

///Bidirectional map between labels and dense ids, assigned in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    labels: Vec<String>,
    ids: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, label: &str) -> u32 {
        if let Some(id) = self.ids.get(label) {
            return *id;
        }
        let id = self.labels.len() as u32;
        self.labels.push(label.to_string());
        self.ids.insert(label.to_string(), id);
        id
    }

    pub fn get(&self, label: &str) -> Option<u32> {
        self.ids.get(label).copied()
    }

    pub fn label(&self, id: u32) -> Option<&str> {
        self.labels.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

///A grammar together with the symbol tables used to read it.
#[derive(Debug, Clone)]
pub struct GrammarFile {
    pub grammar: Grammar,
    pub nonterminals: SymbolTable,
    pub terminals: SymbolTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    NonTerminalRules,
    LexicalRules,
}

impl GrammarFile {
    pub fn parse(s: &str) -> Result<GrammarFile, ReadError> {
        let mut nonterminals = SymbolTable::new();
        let mut terminals = SymbolTable::new();
        let mut rules = vec![];
        let mut root = None;
        let mut section = Section::Root;

        for (i, line) in s.lines().enumerate() {
            let line_number = i + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.first() {
                None => continue,
                Some(first) if first.starts_with('#') => continue,
                Some(_) => (),
            }

            match section {
                Section::Root => {
                    if tokens.len() != 1 {
                        return Err(ReadError::MalformedLine {
                            line: line_number,
                            content: line.to_string(),
                        });
                    }
                    root = Some(NonTerminal::new(nonterminals.intern(tokens[0])));
                    section = Section::NonTerminalRules;
                    continue;
                }
                Section::NonTerminalRules if tokens == [SECTION_BREAK] => {
                    section = Section::LexicalRules;
                    continue;
                }
                _ => (),
            }

            if tokens.len() < 4 {
                return Err(ReadError::MalformedLine {
                    line: line_number,
                    content: line.to_string(),
                });
            }
            if tokens[1] != SEPARATOR {
                return Err(ReadError::BadSeparator {
                    line: line_number,
                    found: tokens[1].to_string(),
                });
            }
            let score_token = tokens[tokens.len() - 1];
            let score = parse_score(score_token).ok_or_else(|| ReadError::BadScore {
                line: line_number,
                score: score_token.to_string(),
            })?;
            let parent = NonTerminal::new(nonterminals.intern(tokens[0]));

            let rule = match (section, tokens.len()) {
                (Section::NonTerminalRules, 4) => Rule::unary(
                    parent,
                    NonTerminal::new(nonterminals.intern(tokens[2])),
                    score,
                ),
                (Section::NonTerminalRules, 5) => Rule::binary(
                    parent,
                    NonTerminal::new(nonterminals.intern(tokens[2])),
                    NonTerminal::new(nonterminals.intern(tokens[3])),
                    score,
                ),
                (Section::LexicalRules, 4) => {
                    Rule::lexical(parent, Terminal::new(terminals.intern(tokens[2])), score)
                }
                _ => {
                    return Err(ReadError::MalformedLine {
                        line: line_number,
                        content: line.to_string(),
                    });
                }
            };
            rules.push(rule);
        }

        let root = root.ok_or(ReadError::MissingRoot)?;
        let mut builder =
            GrammarBuilder::new(root).with_symbol_counts(nonterminals.len(), terminals.len());
        builder.extend(rules);
        let grammar = builder.freeze()?;
        tracing::debug!(
            rules = grammar.n_rules(),
            nonterminals = nonterminals.len(),
            terminals = terminals.len(),
            "read grammar"
        );
        Ok(GrammarFile {
            grammar,
            nonterminals,
            terminals,
        })
    }

    ///Maps words to terminal ids. Words outside the lexicon become [`Terminal::UNKNOWN`].
    pub fn sentence(&self, words: &[&str]) -> Vec<Terminal> {
        words
            .iter()
            .map(|w| {
                self.terminals
                    .get(w)
                    .map_or(Terminal::UNKNOWN, Terminal::new)
            })
            .collect()
    }

    pub fn nonterminal(&self, label: &str) -> Option<NonTerminal> {
        self.nonterminals.get(label).map(NonTerminal::new)
    }

    pub fn symbol_label(&self, symbol: Symbol) -> String {
        let label = match symbol {
            Symbol::NonTerminal(nt) => self.nonterminals.label(nt.index() as u32),
            Symbol::Terminal(t) => self.terminals.label(t.index() as u32),
        };
        label.map_or_else(|| symbol.to_string(), str::to_string)
    }

    ///Replaces symbol ids in a tree with their labels.
    pub fn label_tree(&self, tree: &NaryTree<Symbol>) -> NaryTree<String> {
        tree.map_labels(&mut |s| self.symbol_label(*s))
    }
}

///Scores are natural-log probabilities; anything that is not one is rejected.
fn parse_score(token: &str) -> Option<f64> {
    let value: f64 = token.parse().ok()?;
    LogProb::new(value).ok().map(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::RuleKind;
    use crate::grammars::{TIME_FLIES, TIME_FLIES_LIKE_AN_ARROW};

    #[test]
    fn reads_time_flies() -> anyhow::Result<()> {
        let file = GrammarFile::parse(TIME_FLIES)?;
        let g = &file.grammar;
        assert_eq!(file.nonterminals.label(g.root().index() as u32), Some("S"));
        assert_eq!(g.n_rules(), 5);
        assert_eq!(file.terminals.len(), 2);
        assert_eq!(
            g.rules().map(|(_, r)| r.kind()).collect::<Vec<_>>(),
            vec![
                RuleKind::Binary,
                RuleKind::Unary,
                RuleKind::Unary,
                RuleKind::Lexical,
                RuleKind::Lexical
            ]
        );
        let np = file.nonterminal("NP").unwrap();
        let n = file.nonterminal("N").unwrap();
        let (_, r) = g.rules().nth(1).unwrap();
        assert_eq!(*r, Rule::unary(np, n, -1.0));
        assert_eq!(
            file.sentence(&["time", "flies", "banana"]),
            vec![Terminal::new(0), Terminal::new(1), Terminal::UNKNOWN]
        );
        Ok(())
    }

    #[test]
    fn comments_and_blank_lines() -> anyhow::Result<()> {
        let file = GrammarFile::parse(
            "# a grammar\n\n   # indented comment\nS\nS --> A A -0.5\n\n===\n# words\nA --> a 0\n",
        )?;
        assert_eq!(file.grammar.n_rules(), 2);
        assert_eq!(file.nonterminals.len(), 2);
        Ok(())
    }

    #[test]
    fn arrow_fixture() -> anyhow::Result<()> {
        let file = GrammarFile::parse(TIME_FLIES_LIKE_AN_ARROW)?;
        assert_eq!(file.terminals.len(), 5);
        assert!(file.terminals.get("arrow").is_some());
        assert_eq!(file.nonterminals.label(0), Some("S"));
        Ok(())
    }

    #[test]
    fn malformed_input() {
        assert_eq!(
            GrammarFile::parse("# nothing\n").unwrap_err(),
            ReadError::MissingRoot
        );
        assert_eq!(
            GrammarFile::parse("S\nS -> A B -1\n").unwrap_err(),
            ReadError::BadSeparator {
                line: 2,
                found: "->".to_string()
            }
        );
        assert_eq!(
            GrammarFile::parse("S\nS --> A B 0.5\n").unwrap_err(),
            ReadError::BadScore {
                line: 2,
                score: "0.5".to_string()
            }
        );
        assert_eq!(
            GrammarFile::parse("S\nS --> A B C -1\n").unwrap_err(),
            ReadError::MalformedLine {
                line: 2,
                content: "S --> A B C -1".to_string()
            }
        );
        assert!(matches!(
            GrammarFile::parse("S\n===\nS --> a b -1\n"),
            Err(ReadError::MalformedLine { line: 3, .. })
        ));
        assert!(matches!(
            GrammarFile::parse("S\nA --> B -1\n===\nB --> b -1\n"),
            Err(ReadError::Grammar(GrammarError::RootNotProduced(_)))
        ));
    }
}
