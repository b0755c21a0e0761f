//! Implementation of an interval tree using the BITS algorithm.
//! Reference: https://doi.org/10.1093/bioinformatics/bts652

use derive_getters::Dissolve;
use derive_more::From;
use itertools::Itertools;
use utrex_core_rs::{
    loc::{Interval, IntervalOp},
    num::PrimInt,
};

/// A builder for constructing [`Bits`] interval trees.
#[derive(Debug, Clone, From, Dissolve)]
pub struct BitsBuilder<Idx: PrimInt, Data> {
    records: Vec<(Interval<Idx>, Data)>,
}

impl<Idx: PrimInt, Data> Default for BitsBuilder<Idx, Data> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<Idx: PrimInt, Data> BitsBuilder<Idx, Data> {
    pub fn add(&mut self, interval: Interval<Idx>, data: Data) -> &mut Self {
        self.records.push((interval, data));
        self
    }

    pub fn build(self) -> Bits<Idx, Data> {
        Bits::new(self.records)
    }
}

/// Immutable interval tree: intervals sorted by start plus the longest interval length,
/// which bounds how far back a query has to look.
#[derive(Debug, Clone, PartialEq, Eq, Dissolve)]
pub struct Bits<Idx: PrimInt, Data> {
    data: Vec<Data>,
    starts: Vec<Idx>,
    ends: Vec<Idx>,
    max_len: Idx,
}

impl<Idx: PrimInt, Data> Default for Bits<Idx, Data> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            starts: Vec::new(),
            ends: Vec::new(),
            max_len: Idx::zero(),
        }
    }
}

impl<Idx: PrimInt, Data> Bits<Idx, Data> {
    /// Build the tree from unsorted records. Records sharing a start keep their input order.
    pub fn new(iter: impl IntoIterator<Item = (Interval<Idx>, Data)>) -> Self {
        let iter = iter.into_iter();

        let explen = iter.size_hint().0;
        let mut starts = Vec::with_capacity(explen);
        let mut ends = Vec::with_capacity(explen);
        let mut data = Vec::with_capacity(explen);
        let mut max_len = Idx::zero();

        for (interval, idata) in iter.sorted_by_key(|(it, _)| it.start()) {
            starts.push(interval.start());
            ends.push(interval.end());
            data.push(idata);
            max_len = max_len.max(interval.len());
        }

        Self {
            data,
            starts,
            ends,
            max_len,
        }
    }

    #[inline]
    fn lower_bound(&self, start: Idx) -> usize {
        // Nothing starting before `start - max_len` can reach the query.
        let boundary = start.saturating_sub(self.max_len);
        self.starts.partition_point(|x| *x < boundary)
    }

    /// Entries intersecting the given interval, ordered by start.
    pub fn query(&self, interval: Interval<Idx>) -> impl Iterator<Item = (Interval<Idx>, &Data)> {
        let from = self.lower_bound(interval.start());
        let to = self.starts.partition_point(|x| *x < interval.end());

        (from..to.max(from)).filter_map(move |ind| {
            let (start, end) = (self.starts[ind], self.ends[ind]);
            (end > interval.start()).then(|| {
                // Each stored pair came from a valid interval.
                let segment = Interval::new(start, end).unwrap_or_default();
                (segment, &self.data[ind])
            })
        })
    }

    pub fn records(&self) -> impl Iterator<Item = (Interval<Idx>, &Data)> {
        self.starts
            .iter()
            .zip(self.ends.iter())
            .zip(self.data.iter())
            .map(|((start, end), data)| (Interval::new(*start, *end).unwrap_or_default(), data))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn builder() -> BitsBuilder<Idx, Data> {
        BitsBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(tree: &Bits<i64, usize>, start: i64, end: i64) -> Vec<usize> {
        tree.query(Interval::new(start, end).unwrap())
            .map(|(_, x)| *x)
            .collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = Bits::<i64, usize>::builder().build();
        assert!(tree.is_empty());
        assert!(hits(&tree, 5, 15).is_empty());
    }

    #[test]
    fn test_single_interval_tree() {
        let mut builder = Bits::builder();
        builder.add(Interval::new(10, 20).unwrap(), 1);
        let tree = builder.build();

        assert!(hits(&tree, 5, 9).is_empty());
        assert!(hits(&tree, 21, 25).is_empty());
        // Touching is not intersecting
        assert!(hits(&tree, 0, 10).is_empty());
        assert!(hits(&tree, 20, 30).is_empty());

        for (start, end) in [(5, 15), (15, 25), (5, 25), (12, 13)] {
            assert_eq!(hits(&tree, start, end), vec![1]);
        }
    }

    #[test]
    fn test_multi_interval_tree() {
        let tree = Bits::new([
            (Interval::new(10, 20).unwrap(), 3),
            (Interval::new(1, 10).unwrap(), 1),
            (Interval::new(5, 15).unwrap(), 2),
            (Interval::new(0, 1000).unwrap(), 0),
            (Interval::new(30, 40).unwrap(), 4),
        ]);
        assert_eq!(tree.len(), 5);
        assert_eq!(hits(&tree, 5, 15), vec![0, 1, 2, 3]);
        assert_eq!(hits(&tree, 20, 30), vec![0]);
        assert_eq!(hits(&tree, 500, 501), vec![0]);
        assert_eq!(hits(&tree, 1000, 1001), Vec::<usize>::new());

        let records = tree.records().map(|(it, _)| it.start()).collect::<Vec<_>>();
        assert_eq!(records, vec![0, 1, 5, 10, 30]);
    }
}
