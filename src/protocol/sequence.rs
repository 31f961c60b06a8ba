//! Serial command identifiers and ranged id sets.
//!
//! AMQP 0-10 identifies every command on a session with a 32-bit serial
//! number that wraps; comparisons follow RFC 1982 serial arithmetic so
//! bookkeeping survives the wrap.

use std::fmt;

/// Wrap-aware 32-bit command sequence number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Post-increment: returns the current value and advances by one.
    pub fn advance(&mut self) -> Self {
        let current = *self;
        *self = self.next();
        current
    }

    /// Signed serial distance from `other` to `self`.
    pub fn distance(self, other: Self) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }
}

impl From<u32> for SequenceNumber {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl PartialOrd for SequenceNumber {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SequenceNumber {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance(*other).cmp(&0)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered set of command ids stored as coalesced inclusive ranges.
///
/// Used for the session's `completed`, `incomplete` and `accepted`
/// bookkeeping and for the ranges carried by completion and accept
/// frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet {
    // Ascending, non-overlapping, non-adjacent (lo, hi) pairs.
    ranges: Vec<(u32, u32)>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(lo, hi)| (hi - lo) as usize + 1)
            .sum()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn contains(&self, id: SequenceNumber) -> bool {
        let v = id.value();
        self.ranges.iter().any(|&(lo, hi)| lo <= v && v <= hi)
    }

    /// Smallest id in the set.
    pub fn first(&self) -> Option<SequenceNumber> {
        self.ranges.first().map(|&(lo, _)| SequenceNumber::new(lo))
    }

    /// Largest id in the set.
    pub fn last(&self) -> Option<SequenceNumber> {
        self.ranges.last().map(|&(_, hi)| SequenceNumber::new(hi))
    }

    pub fn add(&mut self, id: SequenceNumber) {
        self.add_range(id, id);
    }

    /// Insert the inclusive range `lo..=hi`, coalescing neighbours.
    pub fn add_range(&mut self, lo: SequenceNumber, hi: SequenceNumber) {
        let (lo, hi) = (lo.value(), hi.value());
        debug_assert!(lo <= hi, "inverted range {lo}..={hi}");
        let mut merged = Vec::with_capacity(self.ranges.len() + 1);
        let mut new = (lo, hi);
        let mut placed = false;
        for &(a, b) in &self.ranges {
            if b.saturating_add(1) < new.0 {
                merged.push((a, b));
            } else if new.1.saturating_add(1) < a {
                if !placed {
                    merged.push(new);
                    placed = true;
                }
                merged.push((a, b));
            } else {
                new = (new.0.min(a), new.1.max(b));
            }
        }
        if !placed {
            merged.push(new);
        }
        self.ranges = merged;
    }

    /// Remove a single id, splitting its range if needed.
    pub fn remove(&mut self, id: SequenceNumber) {
        let v = id.value();
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        for &(lo, hi) in &self.ranges {
            if v < lo || v > hi {
                out.push((lo, hi));
            } else {
                if v > lo {
                    out.push((lo, v - 1));
                }
                if v < hi {
                    out.push((v + 1, hi));
                }
            }
        }
        self.ranges = out;
    }

    pub fn ranges(&self) -> impl Iterator<Item = (SequenceNumber, SequenceNumber)> + '_ {
        self.ranges
            .iter()
            .map(|&(lo, hi)| (SequenceNumber::new(lo), SequenceNumber::new(hi)))
    }

    pub fn iter(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        self.ranges
            .iter()
            .flat_map(|&(lo, hi)| (lo..=hi).map(SequenceNumber::new))
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        write!(f, "}}")
    }
}

impl FromIterator<SequenceNumber> for SequenceSet {
    fn from_iter<I: IntoIterator<Item = SequenceNumber>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}
