//! S3 from spec.md §8: a pragma on an `if` suite's header excludes the
//! whole suite, collapsed to the suite's first line.

use arcmap::{Analyzer, CodeUnit, ExclusionConfig};

#[test]
fn s3_pragma_excludes_suite_but_not_trailing_statement() {
    let analyzer = Analyzer::new(ExclusionConfig::single("no cover"));
    let unit = CodeUnit::from_source("<s3>", "if 0:  # no cover\n    a=4\n    b=5\nc=6\n").unwrap();
    let result = analyzer.analyze(&unit).unwrap();

    assert_eq!(result.executable_statements(), vec![1, 4]);
    assert_eq!(result.excluded_lines(), vec![1]);

    let arcs = result.arc_possibilities();
    assert!(!arcs.iter().any(|a| a.to == 2 || a.to == 3));
}
