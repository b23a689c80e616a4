//! S5 from spec.md §8: try/except/finally where the try body always raises
//! and the handler matches. No unpredicted arcs against that trace; the
//! missing arcs are exactly the two edges only a *different* outcome would
//! take (an unmatched/re-raised exception flowing straight through the
//! finally to the code object's exit).

use std::collections::BTreeSet;

use arcmap::{Analyzer, Arc, ExclusionConfig};

fn src() -> &'static str {
    "try:\n    a = 1\n    raise ValueError()\nexcept ValueError:\n    a = 99\nfinally:\n    b = 2\nprint(a)\n"
}

fn traced_arcs() -> BTreeSet<Arc> {
    [
        (-1, 1),
        (1, 2),
        (1, 4),
        (2, 3),
        (3, 7),
        (4, 5),
        (5, 7),
        (7, 8),
        (8, -1),
    ]
    .into_iter()
    .map(|(from, to)| Arc { from, to })
    .collect()
}

#[test]
fn s5_no_unpredicted_arcs_against_the_matched_handler_trace() {
    let analyzer = Analyzer::new(ExclusionConfig::default());
    let unit = arcmap::CodeUnit::from_source("<s5>", src()).unwrap();
    let result = analyzer.analyze(&unit).unwrap();

    let unpredicted = result.arcs_unpredicted(&traced_arcs());
    assert!(unpredicted.is_empty(), "unexpected unpredicted arcs: {unpredicted:?}");
}

#[test]
fn s5_missing_arcs_are_the_unmatched_exception_edges() {
    let analyzer = Analyzer::new(ExclusionConfig::default());
    let unit = arcmap::CodeUnit::from_source("<s5>", src()).unwrap();
    let result = analyzer.analyze(&unit).unwrap();

    let missing: BTreeSet<Arc> = result.arcs_missing(&traced_arcs()).into_iter().collect();
    // (4, 7): the handler re-raising/not matching, routed straight through
    // the finally. (7, -1): an exception still live when the finally
    // completes, exiting the code object instead of reaching `print(a)`.
    assert!(missing.contains(&Arc { from: 4, to: 7 }));
    assert!(missing.contains(&Arc { from: 7, to: -1 }));
    assert!(!missing.contains(&Arc { from: 4, to: 5 }));
    assert!(!missing.contains(&Arc { from: 7, to: 8 }));
}
