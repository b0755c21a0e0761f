use std::path::PathBuf;

use eyre::{Result, WrapErr};
use utrex_core_rs::loc::{Interval, IntervalOp, PerStrand, Strand};
use utrex_io_rs::bam::{AlignedRead, Reader};

use super::{ClippedRead, Evidence, EvidenceSource};

const REVERSE: u16 = 0x10;

/// Per-strand indexed BAM files.
#[derive(Clone, Debug)]
pub struct BamEvidenceSource {
    paths: PerStrand<PathBuf>,
    /// Reads are already split by strand into separate files.
    split: bool,
    minmapq: u8,
}

impl BamEvidenceSource {
    /// One BAM file per strand, as produced by strand splitting.
    pub fn from_split(forward: impl Into<PathBuf>, reverse: impl Into<PathBuf>) -> Self {
        Self {
            paths: PerStrand::new(forward.into(), reverse.into()),
            split: true,
            minmapq: 0,
        }
    }

    /// A single BAM file; strands are separated with the reverse-complement flag.
    pub fn from_unsplit(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            paths: PerStrand::new(path.clone(), path),
            split: false,
            minmapq: 0,
        }
    }

    pub fn set_minmapq(&mut self, minmapq: u8) -> &mut Self {
        self.minmapq = minmapq;
        self
    }
}

impl EvidenceSource for BamEvidenceSource {
    type Evidence = BamEvidence;

    fn open(&self) -> Result<BamEvidence> {
        let readers = PerStrand::try_from_fn(|strand| {
            let path = self.paths.get(strand);
            let mut reader = Reader::new(path)
                .wrap_err_with(|| format!("Failed to open {} reads", strand.label()))?;
            reader.set_minmapq(self.minmapq);
            if !self.split {
                match strand {
                    Strand::Forward => reader.set_exflags(REVERSE),
                    Strand::Reverse => reader.set_inflags(REVERSE),
                };
            }
            Ok(reader)
        })?;
        Ok(BamEvidence {
            readers,
            buffer: Vec::new(),
        })
    }
}

/// Worker-owned BAM readers, one per strand.
pub struct BamEvidence {
    readers: PerStrand<Reader>,
    buffer: Vec<AlignedRead>,
}

impl Evidence for BamEvidence {
    fn depth_profile(
        &mut self,
        contig: &str,
        strand: Strand,
        interval: Interval<u64>,
    ) -> Result<Vec<u32>> {
        self.readers
            .get_mut(strand)
            .fetch(contig, interval, &mut self.buffer)?;

        let mut profile = vec![0u32; interval.len() as usize];
        for block in self.buffer.iter().flat_map(|x| x.blocks()) {
            if let Some(overlap) = block.intersection(&interval) {
                let from = (overlap.start() - interval.start()) as usize;
                let to = (overlap.end() - interval.start()) as usize;
                for depth in &mut profile[from..to] {
                    *depth += 1;
                }
            }
        }
        Ok(profile)
    }

    fn clipped_reads(
        &mut self,
        contig: &str,
        strand: Strand,
        interval: Interval<u64>,
    ) -> Result<Vec<ClippedRead>> {
        self.readers
            .get_mut(strand)
            .fetch(contig, interval, &mut self.buffer)?;

        Ok(self
            .buffer
            .iter()
            .filter(|x| !x.left_clip().is_empty() || !x.right_clip().is_empty())
            .map(|x| ClippedRead::new(*x.interval(), x.left_clip().clone(), x.right_clip().clone()))
            .collect())
    }
}
