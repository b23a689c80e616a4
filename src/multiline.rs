//! `MultilineMap`: line -> (first_line, last_line) for multi-line statements.
//!
//! A target language with cheap arrays should store multi-line spans as
//! intervals rather than one hash-map entry per line; this stores them in a
//! `rust-lapper` interval tree and answers point queries with a binary
//! search instead of materializing an entry for every spanned line.

use rust_lapper::{Interval, Lapper};

/// Maps each line of a multi-line statement to the pair `(first_line,
/// last_line)` of that statement. Single-line statements have no entry:
/// callers treat a missing lookup as "this line is its own first line".
pub struct MultilineMap {
    lapper: Lapper<u32, u32>,
}

impl MultilineMap {
    /// Build from a set of `(first_line, last_line)` spans. Spans where
    /// `first_line == last_line` are dropped: they carry no information a
    /// missing lookup doesn't already convey.
    pub fn new(spans: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let intervals: Vec<Interval<u32, u32>> = spans
            .into_iter()
            .filter(|(lo, hi)| lo != hi)
            .map(|(lo, hi)| Interval {
                start: lo,
                stop: hi + 1,
                val: lo,
            })
            .collect();
        Lapper::new(intervals).into()
    }

    /// The first line of the multi-line statement containing `line`, or
    /// `line` itself if it isn't part of one.
    pub fn first_line(&self, line: u32) -> u32 {
        self.lapper
            .find(line, line + 1)
            .next()
            .map(|iv| iv.val)
            .unwrap_or(line)
    }

    /// The full `(first_line, last_line)` span containing `line`, if any.
    pub fn span_of(&self, line: u32) -> Option<(u32, u32)> {
        self.lapper
            .find(line, line + 1)
            .next()
            .map(|iv| (iv.start, iv.stop - 1))
    }
}

impl From<Lapper<u32, u32>> for MultilineMap {
    fn from(lapper: Lapper<u32, u32>) -> Self {
        Self { lapper }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_line_in_span_to_first() {
        let map = MultilineMap::new([(1, 3)]);
        assert_eq!(map.first_line(1), 1);
        assert_eq!(map.first_line(2), 1);
        assert_eq!(map.first_line(3), 1);
        assert_eq!(map.span_of(2), Some((1, 3)));
    }

    #[test]
    fn single_line_span_has_no_entry() {
        let map = MultilineMap::new([(1, 1)]);
        assert_eq!(map.first_line(1), 1);
        assert_eq!(map.span_of(1), None);
    }

    #[test]
    fn unmapped_line_is_its_own_first_line() {
        let map = MultilineMap::new([(5, 7)]);
        assert_eq!(map.first_line(42), 42);
    }

    #[test]
    fn disjoint_spans_do_not_interfere() {
        let map = MultilineMap::new([(1, 3), (10, 12)]);
        assert_eq!(map.first_line(11), 10);
        assert_eq!(map.first_line(2), 1);
        assert_eq!(map.first_line(6), 6);
    }
}
