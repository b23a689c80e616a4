//! S1/S2 from spec.md §8: a plain `if` and an `if`/`else` chain.

use std::collections::BTreeSet;

use arcmap::{Analyzer, Arc, CodeUnit, ExclusionConfig};

fn analyze(src: &str) -> (arcmap::CodeUnit, std::sync::Arc<arcmap::AnalysisResult>) {
    let analyzer = Analyzer::new(ExclusionConfig::default());
    let unit = CodeUnit::from_source("<s1>", src).unwrap();
    let result = analyzer.analyze(&unit).unwrap();
    (unit, result)
}

#[test]
fn s1_simple_if_has_expected_statements_and_arcs() {
    let (_, result) = analyze("a = 1\nif a == 2:\n    a = 3\n");
    assert_eq!(result.executable_statements(), vec![1, 2, 3]);

    let arcs: BTreeSet<Arc> = result.arc_possibilities().into_iter().collect();
    let expected: BTreeSet<Arc> = [(-1, 1), (1, 2), (2, 3), (2, -1), (3, -1)]
        .into_iter()
        .map(|(from, to)| Arc { from, to })
        .collect();
    assert_eq!(arcs, expected);
}

#[test]
fn s2_else_branch_has_expected_statements() {
    let src = "a = 1\nif a == 1:\n    x = 3\nelse:\n    y = 5\nassert x == 3\n";
    let (_, result) = analyze(src);
    assert_eq!(result.executable_statements(), vec![1, 2, 3, 5, 6]);

    let arcs: BTreeSet<Arc> = result.arc_possibilities().into_iter().collect();
    for (from, to) in [(2, 3), (2, 5), (3, 6), (5, 6), (6, -1)] {
        assert!(arcs.contains(&Arc { from, to }), "missing arc ({from}, {to})");
    }
}

#[test]
fn s2_taking_the_if_branch_leaves_the_else_arc_missing() {
    let src = "a = 1\nif a == 1:\n    x = 3\nelse:\n    y = 5\nassert x == 3\n";
    let (_, result) = analyze(src);

    // Executing with a == 1 takes 2 -> 3 -> 6, never 2 -> 5 or 5 -> 6.
    let executed: BTreeSet<Arc> = [(-1, 1), (1, 2), (2, 3), (3, 6), (6, -1)]
        .into_iter()
        .map(|(from, to)| Arc { from, to })
        .collect();
    let missing: BTreeSet<Arc> = result.arcs_missing(&executed).into_iter().collect();
    assert!(missing.contains(&Arc { from: 2, to: 5 }));
    assert!(missing.contains(&Arc { from: 5, to: 6 }));
    assert!(!missing.contains(&Arc { from: 2, to: 3 }));
}
