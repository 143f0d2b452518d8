use lazy_static::lazy_static;
use pcfg_cky::{
    CellStorage, GrammarFile, LoopOrder, Parser, ParserConfig, Terminal,
    grammars::{ALL_BRACKETINGS, TIME_FLIES_LIKE_AN_ARROW},
};

fn main() {
    // Run registered benchmarks.
    divan::main();
}

lazy_static! {
    static ref ARROW: GrammarFile = GrammarFile::parse(TIME_FLIES_LIKE_AN_ARROW).unwrap();
    static ref BRACKETINGS: GrammarFile = GrammarFile::parse(ALL_BRACKETINGS).unwrap();
    static ref LONG_SENTENCE: Vec<Terminal> = BRACKETINGS.sentence(&["a"; 24]);
}

#[divan::bench]
fn parse_arrow() {
    let sentence = ARROW.sentence(&["time", "flies", "like", "an", "arrow"]);
    let parser = Parser::new(&ARROW.grammar);
    divan::black_box(parser.parse(divan::black_box(&sentence)).unwrap());
}

#[divan::bench(args = [LoopOrder::LeftChildFirst, LoopOrder::RightChildFirst, LoopOrder::Cartesian])]
fn parse_all_bracketings(order: LoopOrder) {
    let config = ParserConfig::default().with_loop_order(order);
    let parser = Parser::with_config(&BRACKETINGS.grammar, config);
    divan::black_box(parser.parse(divan::black_box(&LONG_SENTENCE)).unwrap());
}

#[divan::bench(args = [CellStorage::Dense, CellStorage::Hashed])]
fn inside_outside(storage: CellStorage) {
    let config = ParserConfig::default().with_storage(storage);
    let parser = Parser::with_config(&BRACKETINGS.grammar, config);
    let chart = parser
        .run_inside_outside(divan::black_box(&LONG_SENTENCE))
        .unwrap();
    divan::black_box(chart.expected_rule_counts());
}
