//! Code parsing via tree-sitter
//!
//! Parses Java sources into the [`ProgramUnit`](crate::ast::ProgramUnit)
//! model the rewrite rules work on.

mod java;

use crate::error::{Error, Result};
use tree_sitter::{Node, Parser};

pub use java::parse_java;

/// Get raw tree-sitter S-expression for Java source code
///
/// Useful when a construct lands in a `Raw` node and you want to see what
/// tree-sitter made of it.
pub fn to_sexp(source: &str) -> Result<String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| Error::CodeParse(format!("Failed to set language: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::CodeParse("Failed to parse source".into()))?;

    Ok(tree.root_node().to_sexp())
}

/// First `ERROR` or `MISSING` node, depth first
pub(crate) fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Unnamed-field child of a given kind (`modifiers`, `throws`, ...)
pub(crate) fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Strip up to `column` leading spaces from every line after the first, so
/// multi-line text captured at some column can be re-indented.
pub(crate) fn dedent(text: &str, column: usize) -> String {
    let mut lines = text.lines();
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        let strip = line
            .char_indices()
            .take(column)
            .take_while(|(_, c)| *c == ' ' || *c == '\t')
            .count();
        out.push_str(line[strip..].trim_end());
    }
    out
}

/// Collapse whitespace runs to single spaces
pub(crate) fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedent_keeps_relative_indentation() {
        let text = "/**\n     * Doc\n     */";
        assert_eq!(dedent(text, 4), "/**\n * Doc\n */");
    }

    #[test]
    fn test_collapse() {
        assert_eq!(collapse("extends  Base\n   implements X"), "extends Base implements X");
    }

    #[test]
    fn test_to_sexp() {
        let sexp = to_sexp("class A {}").unwrap();
        assert!(sexp.starts_with("(program"));
    }
}
