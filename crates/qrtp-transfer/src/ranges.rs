//! Normalized sets of closed integer intervals.
//!
//! Used for received character offsets on the receiver and for the
//! exclusion set on the sender. Ranges are kept sorted by start, and no two
//! ranges overlap or touch: `[0,4]` and `[5,9]` are stored as `[0,9]`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::FrameError;

/// Closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of positions covered.
    pub fn width(&self) -> usize {
        self.end - self.start + 1
    }

    fn touches(&self, start: usize, end: usize) -> bool {
        self.start <= end.saturating_add(1) && start <= self.end.saturating_add(1)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `[start, end]`, merging with every range it overlaps or touches.
    /// Returns true if coverage grew. Inverted intervals are ignored.
    pub fn add(&mut self, start: usize, end: usize) -> bool {
        if start > end {
            return false;
        }
        if self.contains(start, end) {
            return false;
        }

        let mut merged = Range::new(start, end);
        self.ranges.retain(|r| {
            if r.touches(merged.start, merged.end) {
                merged.start = merged.start.min(r.start);
                merged.end = merged.end.max(r.end);
                false
            } else {
                true
            }
        });
        let pos = self.ranges.partition_point(|r| r.start < merged.start);
        self.ranges.insert(pos, merged);
        true
    }

    /// True if a single stored range covers all of `[start, end]`.
    pub fn contains(&self, start: usize, end: usize) -> bool {
        self.ranges.iter().any(|r| r.start <= start && end <= r.end)
    }

    pub fn contains_point(&self, pos: usize) -> bool {
        self.contains(pos, pos)
    }

    /// True if positions `0..=max` are all present with no gap.
    pub fn is_contiguous_through(&self, max: usize) -> bool {
        match self.ranges.first() {
            Some(first) => first.start == 0 && first.end >= max,
            None => false,
        }
    }

    /// Total number of positions covered.
    pub fn covered(&self) -> usize {
        self.ranges.iter().map(Range::width).sum()
    }

    /// Number of disjoint ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.ranges.iter()
    }

    pub fn as_slice(&self) -> &[Range] {
        &self.ranges
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

impl FromStr for RangeSet {
    type Err = FrameError;

    /// Parse `a-b,c-d`. The empty string is the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = RangeSet::new();
        if s.is_empty() {
            return Ok(set);
        }
        for part in s.split(',') {
            let (a, b) = part
                .split_once('-')
                .ok_or_else(|| FrameError::Malformed(format!("range \"{}\" has no '-'", part)))?;
            let start = parse_bound(a)?;
            let end = parse_bound(b)?;
            if start > end {
                return Err(FrameError::Malformed(format!("inverted range \"{}\"", part)));
            }
            set.add(start, end);
        }
        Ok(set)
    }
}

fn parse_bound(s: &str) -> Result<usize, FrameError> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| FrameError::Malformed(format!("bad range bound \"{}\"", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_normalized(set: &RangeSet) {
        for w in set.as_slice().windows(2) {
            assert!(w[0].end + 1 < w[1].start, "{} and {} overlap or touch", w[0], w[1]);
        }
    }

    #[test]
    fn test_adjacent_ranges_merge() {
        let mut set = RangeSet::new();
        assert!(set.add(0, 4));
        assert!(set.add(5, 9));
        assert_eq!(set.as_slice(), &[Range::new(0, 9)]);
    }

    #[test]
    fn test_bridging_range_merges_many() {
        let mut set = RangeSet::new();
        set.add(0, 1);
        set.add(4, 5);
        set.add(8, 9);
        assert_eq!(set.len(), 3);

        set.add(2, 7);
        assert_eq!(set.as_slice(), &[Range::new(0, 9)]);
    }

    #[test]
    fn test_out_of_order_adds_stay_sorted() {
        let mut set = RangeSet::new();
        for (a, b) in [(20, 22), (0, 2), (10, 12), (30, 30), (5, 6)] {
            set.add(a, b);
            assert_normalized(&set);
        }
        let starts: Vec<usize> = set.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 5, 10, 20, 30]);
        assert_eq!(set.covered(), 3 + 2 + 3 + 3 + 1);
    }

    #[test]
    fn test_pseudo_random_adds_normalized() {
        let mut set = RangeSet::new();
        let mut x: usize = 7;
        for _ in 0..500 {
            x = x.wrapping_mul(1103515245).wrapping_add(12345) % 1000;
            let len = x % 7;
            set.add(x, x + len);
            assert_normalized(&set);
        }
    }

    #[test]
    fn test_add_returns_false_when_already_covered() {
        let mut set = RangeSet::new();
        set.add(0, 10);
        assert!(!set.add(3, 4));
        assert!(!set.add(7, 3));
        assert!(set.add(10, 11));
    }

    #[test]
    fn test_contains() {
        let set: RangeSet = "0-4,10-12".parse().unwrap();
        assert!(set.contains(0, 4));
        assert!(set.contains(10, 12));
        assert!(!set.contains(5, 9));
        assert!(!set.contains(3, 10));
        assert!(set.contains_point(11));
        assert!(!set.contains_point(5));
    }

    #[test]
    fn test_contiguity() {
        let mut set = RangeSet::new();
        assert!(!set.is_contiguous_through(0));
        set.add(1, 5);
        assert!(!set.is_contiguous_through(5));
        set.add(0, 0);
        assert!(set.is_contiguous_through(5));
        set.add(8, 9);
        assert!(!set.is_contiguous_through(9));
    }

    #[test]
    fn test_wire_form() {
        let mut set = RangeSet::new();
        set.add(10, 12);
        set.add(0, 4);
        set.add(7, 7);
        assert_eq!(set.to_string(), "0-4,7-7,10-12");
        assert_eq!(set.to_string().parse::<RangeSet>().unwrap(), set);
        assert!("".parse::<RangeSet>().unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("0-4,x".parse::<RangeSet>().is_err());
        assert!("4-0".parse::<RangeSet>().is_err());
        assert!("-3".parse::<RangeSet>().is_err());
        assert!("0-".parse::<RangeSet>().is_err());
    }

    #[test]
    fn test_saturating_merge_at_max() {
        let mut set = RangeSet::new();
        set.add(usize::MAX - 1, usize::MAX);
        set.add(0, 0);
        assert_eq!(set.len(), 2);
    }
}
