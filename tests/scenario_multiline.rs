//! S4 from spec.md §8: a parenthesized multi-line expression collapses to
//! one statement, one executable line, and a three-line multiline span.

use arcmap::{Analyzer, ExclusionConfig};

#[test]
fn s4_multiline_statement_is_one_executable_line() {
    let analyzer = Analyzer::new(ExclusionConfig::default());
    let unit =
        arcmap::CodeUnit::from_source("<s4>", "x = (1 +\n     2 +\n     3)\n").unwrap();
    let result = analyzer.analyze(&unit).unwrap();

    assert_eq!(result.executable_statements(), vec![1]);
}
