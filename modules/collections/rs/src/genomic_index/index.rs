use std::borrow::Borrow;
use std::hash::Hash;

use ahash::HashMap;
use derive_getters::Dissolve;
use utrex_core_rs::loc::{Contig, Interval, PerStrand, Strand};
use utrex_core_rs::num::PrimInt;

use crate::interval_tree::{Bits, BitsBuilder};

/// Per-contig, per-strand interval trees.
#[derive(Clone, Debug, Dissolve)]
pub struct GenomicIndex<Ctg: Contig, Idx: PrimInt, Data> {
    itrees: HashMap<Ctg, PerStrand<Bits<Idx, Data>>>,
}

impl<Ctg: Contig, Idx: PrimInt, Data> Default for GenomicIndex<Ctg, Idx, Data> {
    fn default() -> Self {
        Self {
            itrees: HashMap::default(),
        }
    }
}

impl<Ctg: Contig, Idx: PrimInt, Data> GenomicIndex<Ctg, Idx, Data> {
    pub fn builder() -> GenomicIndexBuilder<Ctg, Idx, Data> {
        GenomicIndexBuilder::default()
    }

    /// Entries on the given contig and strand that intersect the interval, ordered by start.
    pub fn overlap<Q>(
        &self,
        contig: &Q,
        strand: Strand,
        interval: Interval<Idx>,
    ) -> impl Iterator<Item = (Interval<Idx>, &Data)>
    where
        Ctg: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.itrees
            .get(contig)
            .map(|trees| trees.get(strand))
            .into_iter()
            .flat_map(move |tree| tree.query(interval))
    }

    pub fn contigs(&self) -> impl Iterator<Item = &Ctg> {
        self.itrees.keys()
    }

    pub fn len(&self) -> usize {
        self.itrees
            .values()
            .map(|x| x.forward.len() + x.reverse.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct GenomicIndexBuilder<Ctg: Contig, Idx: PrimInt, Data> {
    builders: HashMap<Ctg, PerStrand<BitsBuilder<Idx, Data>>>,
}

impl<Ctg: Contig, Idx: PrimInt, Data> Default for GenomicIndexBuilder<Ctg, Idx, Data> {
    fn default() -> Self {
        Self {
            builders: HashMap::default(),
        }
    }
}

impl<Ctg: Contig, Idx: PrimInt, Data> GenomicIndexBuilder<Ctg, Idx, Data> {
    pub fn add(
        &mut self,
        contig: Ctg,
        strand: Strand,
        interval: Interval<Idx>,
        data: Data,
    ) -> &mut Self {
        self.builders
            .entry(contig)
            .or_default()
            .get_mut(strand)
            .add(interval, data);
        self
    }

    pub fn build(self) -> GenomicIndex<Ctg, Idx, Data> {
        let itrees = self
            .builders
            .into_iter()
            .map(|(contig, builders)| {
                let (forward, reverse) = builders.dissolve();
                (contig, PerStrand::new(forward.build(), reverse.build()))
            })
            .collect();
        GenomicIndex { itrees }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genomic_index() {
        let mut builder = GenomicIndex::builder();
        builder
            .add("ctg1".to_string(), Strand::Forward, Interval::new(0, 10).unwrap(), 1)
            .add("ctg1".to_string(), Strand::Forward, Interval::new(5, 15).unwrap(), 2)
            .add("ctg1".to_string(), Strand::Reverse, Interval::new(0, 10).unwrap(), 3)
            .add("ctg2".to_string(), Strand::Forward, Interval::new(0, 10).unwrap(), 4);
        let index: GenomicIndex<String, i64, usize> = builder.build();
        assert_eq!(index.len(), 4);

        let query = Interval::new(0, 10).unwrap();
        let hits = index
            .overlap("ctg1", Strand::Forward, query)
            .map(|(it, x)| (it, *x))
            .collect::<Vec<_>>();
        assert_eq!(
            hits,
            vec![
                (Interval::new(0, 10).unwrap(), 1),
                (Interval::new(5, 15).unwrap(), 2)
            ]
        );

        let hits = index
            .overlap("ctg1", Strand::Reverse, query)
            .map(|(_, x)| *x)
            .collect::<Vec<_>>();
        assert_eq!(hits, vec![3]);

        assert_eq!(index.overlap("ctg3", Strand::Forward, query).count(), 0);
    }
}
