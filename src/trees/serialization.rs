//! JSON export of trees and parse results.
use super::NaryTree;
use crate::ParseResult;
use serde::Serialize;

impl<L: Serialize> NaryTree<L> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ParseResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::grammars::TIME_FLIES;
    use crate::{GrammarFile, NaryTree, Parser};
    use serde_json::Value;

    #[test]
    fn tree_json() -> anyhow::Result<()> {
        let tree = NaryTree::parse_bracketed("(NP (D an) (N arrow))")?;
        let json: Value = serde_json::from_str(&tree.to_json()?)?;
        assert_eq!(json["label"], "NP");
        assert_eq!(json["span"]["end"], 2);
        assert_eq!(json["children"][1]["children"][0]["label"], "arrow");
        assert_eq!(json["children"][1]["children"][0]["is_lexical"], true);
        Ok(())
    }

    #[test]
    fn parse_result_json() -> anyhow::Result<()> {
        let file = GrammarFile::parse(TIME_FLIES)?;
        let result = Parser::new(&file.grammar).parse(&file.sentence(&["time", "flies"]))?;
        let json: Value = serde_json::from_str(&result.to_json()?)?;
        assert_eq!(json["viterbi_score"], -5.0);
        assert_eq!(json["inside_total_score"], -5.0);
        assert_eq!(json["viterbi_tree"]["label"]["NonTerminal"], 0);
        Ok(())
    }
}
