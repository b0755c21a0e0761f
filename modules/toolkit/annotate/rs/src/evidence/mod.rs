//! Read-coverage evidence used to trim candidate 3'UTRs.

pub use bam::{BamEvidence, BamEvidenceSource};
pub use coverage::{has_poly_tail, truncation_point, zero_coverage_gaps, CoverageEvidence};
pub use memory::MemoryEvidence;

mod bam;
mod coverage;
mod memory;

use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use eyre::Result;
use utrex_core_rs::loc::{Interval, Strand};

/// An aligned read with the bases soft-clipped at either end.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve, Constructor)]
pub struct ClippedRead {
    interval: Interval<u64>,
    left_clip: Vec<u8>,
    right_clip: Vec<u8>,
}

/// Pileup and alignment lookups on strand-specific reads.
///
/// Providers are owned by a single worker and may keep file handles or buffers, hence `&mut self`.
pub trait Evidence {
    /// Read depth of every position in `interval`, one value per base.
    fn depth_profile(
        &mut self,
        contig: &str,
        strand: Strand,
        interval: Interval<u64>,
    ) -> Result<Vec<u32>>;

    fn depth(&mut self, contig: &str, strand: Strand, position: u64) -> Result<u32> {
        let interval = Interval::new(position, position + 1)?;
        let profile = self.depth_profile(contig, strand, interval)?;
        Ok(profile.first().copied().unwrap_or(0))
    }

    /// Reads overlapping `interval` that carry soft clips on at least one end.
    fn clipped_reads(
        &mut self,
        contig: &str,
        strand: Strand,
        interval: Interval<u64>,
    ) -> Result<Vec<ClippedRead>>;
}

/// Opens one [`Evidence`] provider per worker. Shared across worker threads.
pub trait EvidenceSource: Sync {
    type Evidence: Evidence;

    fn open(&self) -> Result<Self::Evidence>;
}
