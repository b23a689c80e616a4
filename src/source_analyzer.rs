//! Source Analyzer (spec.md §4.2): excluded lines, docstrings, and the
//! multi-line statement map, derived from the CST rather than a raw token
//! stream — tree-sitter already gives exact suite boundaries, so suite
//! exclusion is a direct span check instead of an indent-tracking state
//! machine.

use std::collections::BTreeSet;

use regex::Regex;
use tree_sitter::Node;

use crate::cst::{block_of, first_line, header_last_line, last_line, suite_statements};
use crate::multiline::MultilineMap;
use crate::unit::CodeUnit;

/// The three line-keyed sets the source pass is responsible for, plus the
/// raw multi-line spans (the façade turns these into a `MultilineMap`).
pub struct SourceLineSets {
    pub excluded: BTreeSet<u32>,
    pub docstrings: BTreeSet<u32>,
    pub multiline_spans: Vec<(u32, u32)>,
}

/// Runs the source analyzer over `unit`, excluding lines matched by
/// `exclude_re` (if any).
pub fn analyze_source(unit: &CodeUnit, exclude_re: Option<&Regex>) -> SourceLineSets {
    let mut excluded = pragma_prescan(unit, exclude_re);
    let mut docstrings = BTreeSet::new();
    let mut multiline_spans = Vec::new();

    let root = unit.tree().root_node();
    collect_docstrings(root, &mut docstrings);
    collect_multiline_spans(root, &mut multiline_spans);
    propagate_suite_exclusions(root, &mut excluded);

    SourceLineSets {
        excluded,
        docstrings,
        multiline_spans,
    }
}

pub fn build_multiline_map(spans: &[(u32, u32)]) -> MultilineMap {
    MultilineMap::new(spans.iter().copied())
}

/// Every raw line whose text matches `exclude_re`. Matching is purely
/// textual, on the line as written — a pragma inside a string literal is
/// matched the same as one in a real comment (spec.md §9, open question:
/// "the source trims by matching on raw line text only").
fn pragma_prescan(unit: &CodeUnit, exclude_re: Option<&Regex>) -> BTreeSet<u32> {
    let mut excluded = BTreeSet::new();
    let Some(re) = exclude_re else {
        return excluded;
    };
    for (i, line) in unit.lines().iter().enumerate() {
        if re.is_match(line) {
            excluded.insert(i as u32 + 1);
        }
    }
    excluded
}

/// A pragma on a suite's header line (anchored on the colon, so a comment
/// on the same physical line as `:` counts) excludes the whole suite —
/// header and body — but not any sibling clause. An `else:` matched by its
/// own pragma excludes only the else suite, never the preceding branches,
/// because each clause is walked and span-checked independently.
fn propagate_suite_exclusions(node: Node, excluded: &mut BTreeSet<u32>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if block_of(child).is_some() {
            let colon_line = header_last_line(child);
            if excluded.contains(&colon_line) {
                for line in first_line(child)..=last_line(child) {
                    excluded.insert(line);
                }
            }
        }
        propagate_suite_exclusions(child, excluded);
    }
}

/// A string literal that is the first statement of a suite (or of the
/// module itself) is a docstring — a trick lifted from the original
/// token-based pass ("previous token was INDENT"), expressed directly as
/// "first statement of a block" now that suite boundaries are explicit.
fn collect_docstrings(root: Node, docstrings: &mut BTreeSet<u32>) {
    mark_docstring(root, docstrings);
    walk_blocks(root, &mut |block| mark_docstring(block, docstrings));
}

fn mark_docstring(suite: Node, docstrings: &mut BTreeSet<u32>) {
    let Some(first) = suite_statements(suite).into_iter().next() else {
        return;
    };
    if first.kind() != "expression_statement" {
        return;
    }
    let Some(expr) = first.named_child(0) else {
        return;
    };
    if matches!(expr.kind(), "string" | "concatenated_string") {
        for line in first_line(first)..=last_line(first) {
            docstrings.insert(line);
        }
    }
}

/// Multi-line spans: a simple statement spanning more than one physical
/// line (continuation inside brackets or a backslash join), or a compound
/// clause's header (up to its colon) doing the same.
fn collect_multiline_spans(root: Node, spans: &mut Vec<(u32, u32)>) {
    for stmt in suite_statements(root) {
        record_span(stmt, spans);
    }
    walk_blocks(root, &mut |block| {
        for stmt in suite_statements(block) {
            record_span(stmt, spans);
        }
    });
    walk_clause_headers(root, spans);
}

fn record_span(stmt: Node, spans: &mut Vec<(u32, u32)>) {
    let lo = first_line(stmt);
    let hi = last_line(stmt);
    if lo != hi {
        spans.push((lo, hi));
    }
}

fn walk_clause_headers(node: Node, spans: &mut Vec<(u32, u32)>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if block_of(child).is_some() {
            let lo = first_line(child);
            let hi = header_last_line(child);
            if lo != hi {
                spans.push((lo, hi));
            }
        }
        walk_clause_headers(child, spans);
    }
}

fn walk_blocks<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "block" {
            f(child);
        }
        walk_blocks(child, f);
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
    fn docstring_suppresses_function_body_first_line() {
        let unit = parse("def f():\n    \"doc\"\n    return 1\n");
        let sets = analyze_source(&unit, None);
        assert!(sets.docstrings.contains(&2));
        assert!(!sets.docstrings.contains(&3));
    }

    #[test]
    fn module_docstring_is_detected() {
        let unit = parse("\"module doc\"\na = 1\n");
        let sets = analyze_source(&unit, None);
        assert!(sets.docstrings.contains(&1));
    }

    #[test]
    fn multiline_statement_spans_all_physical_lines() {
        let unit = parse("x = (1 +\n     2 +\n     3)\n");
        let sets = analyze_source(&unit, None);
        let map = build_multiline_map(&sets.multiline_spans);
        assert_eq!(map.first_line(1), 1);
        assert_eq!(map.first_line(2), 1);
        assert_eq!(map.first_line(3), 1);
    }

    #[test]
    fn pragma_on_if_colon_excludes_whole_suite() {
        let src = "if 0:  # no cover\n    a = 4\n    b = 5\nc = 6\n";
        let unit = parse(src);
        let re = Regex::new("no cover").unwrap();
        let sets = analyze_source(&unit, Some(&re));
        assert_eq!(
            sets.excluded,
            BTreeSet::from([1, 2, 3])
        );
    }

    #[test]
    fn pragma_on_else_excludes_only_else_suite() {
        let src = "if a == 1:\n    x = 3\nelse:  # no cover\n    y = 5\nassert x == 3\n";
        let unit = parse(src);
        let re = Regex::new("no cover").unwrap();
        let sets = analyze_source(&unit, Some(&re));
        assert!(sets.excluded.contains(&3));
        assert!(sets.excluded.contains(&4));
        assert!(!sets.excluded.contains(&1));
        assert!(!sets.excluded.contains(&2));
    }
}
