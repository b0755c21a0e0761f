use std::fmt::Display;

use derive_getters::Dissolve;
use derive_more::Constructor;
use eyre::Result;

use crate::num::PrimInt;

use super::contig::Contig;
use super::interval::{Interval, IntervalOp};
use super::strand::Strand;

/// A locus is a stranded region of a contig.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Dissolve, Constructor)]
pub struct Locus<Ctg: Contig, Idx: PrimInt> {
    pub contig: Ctg,
    pub interval: Interval<Idx>,
    pub strand: Strand,
}

impl<Ctg: Contig, Idx: PrimInt> Locus<Ctg, Idx> {
    pub fn try_new(contig: Ctg, start: Idx, end: Idx, strand: Strand) -> Result<Self> {
        Ok(Self {
            contig,
            interval: Interval::new(start, end)?,
            strand,
        })
    }

    /// Loci overlap when they share a contig and their intervals intersect. Strand is not considered.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.contig == other.contig && self.interval.intersects(&other.interval)
    }

    /// Gap between two loci on the same contig, `None` for loci on different contigs.
    pub fn distance(&self, other: &Self) -> Option<Idx> {
        (self.contig == other.contig).then(|| self.interval.distance(&other.interval))
    }

    /// The other locus lies wholly within this one (boundaries included) on the same contig.
    pub fn contains(&self, other: &Self) -> bool {
        self.contig == other.contig && self.interval.envelops(&other.interval)
    }

    pub fn start(&self) -> Idx {
        self.interval.start()
    }

    pub fn end(&self) -> Idx {
        self.interval.end()
    }
}

impl<Ctg: Contig + Display, Idx: PrimInt + Display> Display for Locus<Ctg, Idx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}[{}]",
            self.contig,
            self.interval.start(),
            self.interval.end(),
            self.strand
        )
    }
}
