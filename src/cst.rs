//! Shared helpers for walking the tree-sitter CST that both the source
//! analyzer and the structural parser rely on: finding a clause's suite,
//! locating the colon that ends a header, and flattening decorators.

use tree_sitter::Node;

/// Node kinds that open a colon-suite (`block`) as a direct child: these
/// are the "clauses" of the control-flow grammar — `if_statement` owns the
/// `if` clause only, `elif_clause`/`else_clause` are separate siblings, and
/// likewise for `except_clause`/`else_clause`/`finally_clause` under
/// `try_statement`.
pub const CLAUSE_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "else_clause",
    "for_statement",
    "while_statement",
    "try_statement",
    "except_clause",
    "except_group_clause",
    "finally_clause",
    "with_statement",
    "function_definition",
    "class_definition",
    "case_clause",
];

/// The first direct child of `node` with kind `"block"`: the suite a
/// clause header introduces.
pub fn block_of<'a>(node: Node<'a>) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == "block")
}

/// The statements inside a `block` (or `module`) node, in source order,
/// with comments dropped.
pub fn suite_statements<'a>(block: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// 1-based row of the last line of the header preceding `node`'s suite —
/// the line of the `:` token. Used both to detect multi-line headers and
/// to anchor a pragma comment that sits on the same physical line as the
/// colon.
pub fn header_last_line(node: Node) -> u32 {
    let mut cursor = node.walk();
    let mut prev_end_row = node.start_position().row;
    for child in node.children(&mut cursor) {
        if child.kind() == "block" {
            return prev_end_row as u32 + 1;
        }
        prev_end_row = child.end_position().row;
    }
    node.end_position().row as u32 + 1
}

/// 1-based first line of `node`, accounting for `decorated_definition`
/// whose span already starts at its first decorator.
pub fn first_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

pub fn last_line(node: Node) -> u32 {
    let end = node.end_position();
    // tree-sitter end positions are exclusive; a node ending exactly at
    // column 0 of the next row has no content on that row.
    if end.column == 0 && end.row > node.start_position().row {
        end.row as u32
    } else {
        end.row as u32 + 1
    }
}

/// Expands a `decorated_definition` into its decorator statements followed
/// by the inner `function_definition`/`class_definition`; every other node
/// is returned as a single-element vec. Used when flattening a suite's
/// statement list for CFG construction, so each decorator participates as
/// its own sequential statement.
pub fn expand_statement<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    if node.kind() == "decorated_definition" {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).collect()
    } else {
        vec![node]
    }
}

pub fn expand_statements<'a>(stmts: &[Node<'a>]) -> Vec<Node<'a>> {
    stmts.iter().flat_map(|n| expand_statement(*n)).collect()
}

/// Whether an `except_clause`/`except_group_clause` names an exception
/// type (as opposed to a bare `except:`), which changes whether a runtime
/// exception-type mismatch can fall through to the next handler.
pub fn except_has_type(node: Node) -> bool {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .any(|c| c.kind() != "block")
}

/// Recursively collects every `function_definition` and `class_definition`
/// node in the tree — each compiles to its own reachable code object, per
/// spec.md §4.3.1 ("every code object found among its constants,
/// recursively").
pub fn collect_code_objects<'a>(root: Node<'a>, out: &mut Vec<Node<'a>>) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "function_definition" || child.kind() == "class_definition" {
            out.push(child);
        }
        collect_code_objects(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::CodeUnit;

    fn parse(src: &str) -> CodeUnit {
        CodeUnit::from_source("<code>", src).unwrap()
    }

    #[test]
    fn block_of_finds_suite() {
        let unit = parse("if a:\n    b = 1\n");
        let root = unit.tree().root_node();
        let if_stmt = root.named_child(0).unwrap();
        assert_eq!(if_stmt.kind(), "if_statement");
        let block = block_of(if_stmt).unwrap();
        assert_eq!(block.kind(), "block");
    }

    #[test]
    fn header_last_line_is_colon_line() {
        let unit = parse("if (a and\n    b):\n    c = 1\n");
        let root = unit.tree().root_node();
        let if_stmt = root.named_child(0).unwrap();
        assert_eq!(header_last_line(if_stmt), 2);
    }

    #[test]
    fn collects_nested_code_objects() {
        let unit = parse("def outer():\n    def inner():\n        pass\n    return inner\n");
        let root = unit.tree().root_node();
        let mut out = Vec::new();
        collect_code_objects(root, &mut out);
        assert_eq!(out.len(), 2);
    }
}
