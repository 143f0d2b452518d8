use anyhow::Result;
use approx::assert_relative_eq;
use std::collections::HashSet;

use crate::grammars::{SYMMETRIC_TIE, TIME_FLIES, TIME_FLIES_LIKE_AN_ARROW};

use super::*;

const ARROW: [&str; 5] = ["time", "flies", "like", "an", "arrow"];

#[test]
fn time_flies() -> Result<()> {
    let file = GrammarFile::parse(TIME_FLIES)?;
    let result = Parser::new(&file.grammar).parse(&file.sentence(&["time", "flies"]))?;
    assert_eq!(result.viterbi_score, -5.0);
    assert_eq!(result.inside_total_score, -5.0);
    let tree = file.label_tree(&result.viterbi_tree);
    assert_eq!(tree.to_string(), "(S (NP (N time)) (VP (V flies)))");
    assert_eq!(tree.leaves(), vec!["time", "flies"]);
    let gold = NaryTree::parse_bracketed("(S (NP (N time)) (VP (V flies)))")?;
    assert_eq!(tree, gold.map_labels(&mut |s| s.to_string()));
    Ok(())
}

#[test]
fn time_flies_like_an_arrow() -> Result<()> {
    let file = GrammarFile::parse(TIME_FLIES_LIKE_AN_ARROW)?;
    let sentence = file.sentence(&ARROW);
    for storage in [CellStorage::Dense, CellStorage::Hashed] {
        let config = ParserConfig::default().with_storage(storage);
        let result = Parser::with_config(&file.grammar, config).parse(&sentence)?;
        assert_eq!(result.viterbi_score, -11.0);
        assert_eq!(
            file.label_tree(&result.viterbi_tree).to_string(),
            "(S (NP (N time)) (VP (V flies) (PP (P like) (NP (D an) (N arrow)))))"
        );
        assert_relative_eq!(
            result.inside_total_score,
            -10.686_738_312_481_777,
            epsilon = 1e-12
        );
    }
    Ok(())
}

#[test]
fn seeded_ties() -> Result<()> {
    let file = GrammarFile::parse(SYMMETRIC_TIE)?;
    let parser = Parser::new(&file.grammar);
    let sentence = file.sentence(&["a", "a"]);

    let mut trees = HashSet::new();
    for seed in 0..64 {
        let result = parser.parse_seeded(&sentence, seed)?;
        assert_eq!(parser.parse_seeded(&sentence, seed)?, result);
        assert_eq!(result.viterbi_score, -3.0);
        trees.insert(file.label_tree(&result.viterbi_tree).to_string());
    }
    assert_eq!(
        trees,
        HashSet::from([
            "(S (X a) (Y a))".to_string(),
            "(S (Y a) (X a))".to_string()
        ])
    );

    let config = ParserConfig::default().with_tie_breaking(TieBreaking::Seeded(9));
    let configured = Parser::with_config(&file.grammar, config).parse(&sentence)?;
    assert_eq!(configured, parser.parse_seeded(&sentence, 9)?);

    //Without a seed the earliest rule wins.
    let first = parser.parse(&sentence)?;
    assert_eq!(file.label_tree(&first.viterbi_tree).to_string(), "(S (X a) (Y a))");
    Ok(())
}

#[test]
fn unknown_words() -> Result<()> {
    let file = GrammarFile::parse(TIME_FLIES_LIKE_AN_ARROW)?;
    let parser = Parser::new(&file.grammar);
    let sentence = file.sentence(&["time", "flies", "like", "a", "banana"]);
    assert_eq!(sentence[4], Terminal::UNKNOWN);
    assert_eq!(parser.parse(&sentence), Err(ParsingError::NoParse));
    assert!(matches!(
        parser.run_inside_outside(&sentence),
        Err(ParsingError::NoParse)
    ));

    let mut chart: Chart<DenseCell<Viterbi>> = Chart::new(&file.grammar, sentence.len());
    fill(
        &mut chart,
        &sentence,
        &ParserConfig::default(),
        &Unscored,
        &mut FirstWins,
    )?;
    for start in 0..sentence.len() {
        for end in start + 1..=sentence.len() {
            let covers_unknown = start <= 4 && 4 < end;
            let cell = chart.cell(start, end);
            assert!(cell.is_closed());
            if covers_unknown {
                assert!(cell.active_nonterminals().is_empty());
                for i in 0..file.grammar.num_nonterminals() as u32 {
                    assert_eq!(cell.score(NonTerminal::new(i)), Viterbi::zero());
                }
            }
        }
    }
    assert!(!chart.cell(0, 2).active_nonterminals().is_empty());
    Ok(())
}

#[test]
fn parse_from_many_threads() -> Result<()> {
    let file = GrammarFile::parse(TIME_FLIES_LIKE_AN_ARROW)?;
    let parser = &Parser::new(&file.grammar);
    let sentences = [
        file.sentence(&ARROW),
        file.sentence(&["time", "flies"]),
        file.sentence(&["an", "arrow", "flies"]),
    ];
    let expected: Vec<_> = sentences.iter().map(|s| parser.parse(s)).collect();
    std::thread::scope(|scope| {
        let handles: Vec<_> = sentences
            .iter()
            .map(|s| scope.spawn(move || parser.parse(s)))
            .collect();
        for (handle, expected) in handles.into_iter().zip(&expected) {
            assert_eq!(&handle.join().unwrap(), expected);
        }
    });
    Ok(())
}

#[test]
fn binarized_treebank_trees_parse() -> Result<()> {
    let file = GrammarFile::parse(TIME_FLIES_LIKE_AN_ARROW)?;
    let gold = NaryTree::parse_bracketed(
        "(S (NP (N time)) (VP (V flies) (PP (P like) (NP (D an) (N arrow)))))",
    )?
    .map_labels(&mut |s| s.to_string());
    let words: Vec<&str> = gold.leaves().into_iter().map(String::as_str).collect();
    let result = Parser::new(&file.grammar).parse(&file.sentence(&words))?;
    let binary = BinaryTree::try_from(file.label_tree(&result.viterbi_tree))?;
    assert_eq!(binary.collapse_to_nary(&|l: &String| l.contains('|')), gold);
    Ok(())
}
