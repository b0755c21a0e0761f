use std::fmt::{Debug, Display};
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use crate::num::PrimInt;
use derive_getters::Dissolve;
use eyre::{eyre, Report, Result};
use impl_tools::autoimpl;

/// Interval is a half-open genomic region [start, end).
/// Empty intervals (start == end) and intervals with negative length are rejected on construction.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Dissolve)]
pub struct Interval<Idx: PrimInt> {
    start: Idx,
    end: Idx,
}

/// Trait for types that can be generally viewed as half-open genomic intervals [start, end).
#[autoimpl(for <T: trait + ?Sized> &T, Box<T>, Rc<T>, Arc<T>)]
#[allow(clippy::len_without_is_empty)]
pub trait IntervalOp {
    type Idx: PrimInt;

    fn start(&self) -> Self::Idx;

    fn end(&self) -> Self::Idx;

    fn len(&self) -> Self::Idx {
        self.end() - self.start()
    }

    /// Check if the interval-like object contains a given position.
    fn contains(&self, pos: Self::Idx) -> bool {
        self.start() <= pos && pos < self.end()
    }

    /// Check if the other interval lies wholly within this one, boundaries included.
    fn envelops(&self, other: &Self) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }

    /// Check if the interval-like object intersects with another interval-like object.
    /// The condition is strict and doesn't allow touching intervals.
    fn intersects(&self, other: &Self) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }

    /// Number of positions separating two intervals, zero if they intersect or touch.
    fn distance(&self, other: &Self) -> Self::Idx {
        if other.start() >= self.end() {
            other.start() - self.end()
        } else if self.start() >= other.end() {
            self.start() - other.end()
        } else {
            <Self::Idx as ::num::Zero>::zero()
        }
    }

    fn as_interval(&self) -> Interval<Self::Idx> {
        Interval {
            start: self.start(),
            end: self.end(),
        }
    }
}

impl<T: PrimInt> IntervalOp for Interval<T> {
    type Idx = T;

    #[inline(always)]
    fn start(&self) -> Self::Idx {
        self.start
    }
    #[inline(always)]
    fn end(&self) -> Self::Idx {
        self.end
    }
}

impl<Idx: PrimInt> Interval<Idx> {
    pub fn new(start: Idx, end: Idx) -> Result<Self> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(eyre!("Invalid interval: start >= end"))
        }
    }

    /// Interval widened by `left` and `right` positions, with the start clamped at `floor`
    /// and the end saturating at the maximum coordinate.
    pub fn widened(&self, left: Idx, right: Idx, floor: Idx) -> Self {
        let start = if self.start <= floor {
            self.start
        } else if self.start - floor > left {
            self.start - left
        } else {
            floor
        };
        Self {
            start,
            end: self.end.saturating_add(right),
        }
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }
}

impl<Idx: PrimInt> Default for Interval<Idx> {
    fn default() -> Self {
        Self {
            start: Idx::zero(),
            end: Idx::one(),
        }
    }
}

impl<Idx: PrimInt + Display> Display for Interval<Idx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl<Idx: PrimInt> TryFrom<(Idx, Idx)> for Interval<Idx> {
    type Error = Report;

    fn try_from(value: (Idx, Idx)) -> Result<Self, Self::Error> {
        Self::new(value.0, value.1)
    }
}

impl<Idx: PrimInt> TryFrom<Range<Idx>> for Interval<Idx> {
    type Error = Report;

    fn try_from(value: Range<Idx>) -> Result<Self, Self::Error> {
        Self::new(value.start, value.end)
    }
}

impl<Idx: PrimInt> From<Interval<Idx>> for Range<Idx> {
    fn from(interval: Interval<Idx>) -> Self {
        interval.start..interval.end
    }
}

impl<Idx: PrimInt> PartialEq<(Idx, Idx)> for Interval<Idx> {
    fn eq(&self, other: &(Idx, Idx)) -> bool {
        self.start == other.0 && self.end == other.1
    }
}

impl<Idx: PrimInt> PartialEq<Range<Idx>> for Interval<Idx> {
    fn eq(&self, other: &Range<Idx>) -> bool {
        self.start == other.start && self.end == other.end
    }
}
