use ahash::HashMap;
use eyre::Result;
use utrex_core_rs::loc::{Interval, IntervalOp, Strand};

use super::{ClippedRead, Evidence, EvidenceSource};

/// Coverage evidence held in memory: piecewise-constant depth tracks and clipped reads.
#[derive(Clone, Debug, Default)]
pub struct MemoryEvidence {
    depth: HashMap<(String, Strand), Vec<(Interval<u64>, u32)>>,
    reads: HashMap<(String, Strand), Vec<ClippedRead>>,
}

impl MemoryEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `depth` reads over `interval`. Overlapping tracks are summed.
    pub fn add_depth(
        &mut self,
        contig: &str,
        strand: Strand,
        interval: Interval<u64>,
        depth: u32,
    ) -> &mut Self {
        self.depth
            .entry((contig.to_string(), strand))
            .or_default()
            .push((interval, depth));
        self
    }

    pub fn add_read(&mut self, contig: &str, strand: Strand, read: ClippedRead) -> &mut Self {
        self.reads
            .entry((contig.to_string(), strand))
            .or_default()
            .push(read);
        self
    }
}

impl Evidence for MemoryEvidence {
    fn depth_profile(
        &mut self,
        contig: &str,
        strand: Strand,
        interval: Interval<u64>,
    ) -> Result<Vec<u32>> {
        let mut profile = vec![0; interval.len() as usize];
        let tracks = self.depth.get(&(contig.to_string(), strand));
        for (track, depth) in tracks.into_iter().flatten() {
            if let Some(overlap) = track.intersection(&interval) {
                let from = (overlap.start() - interval.start()) as usize;
                let to = (overlap.end() - interval.start()) as usize;
                for value in &mut profile[from..to] {
                    *value += depth;
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
        let reads = self.reads.get(&(contig.to_string(), strand));
        Ok(reads
            .into_iter()
            .flatten()
            .filter(|x| x.interval().intersects(&interval))
            .cloned()
            .collect())
    }
}

impl EvidenceSource for MemoryEvidence {
    type Evidence = MemoryEvidence;

    fn open(&self) -> Result<Self::Evidence> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_profile() -> Result<()> {
        let mut evidence = MemoryEvidence::new();
        evidence
            .add_depth("chr1", Strand::Forward, Interval::new(10, 15)?, 5)
            .add_depth("chr1", Strand::Forward, Interval::new(12, 20)?, 7)
            .add_depth("chr1", Strand::Reverse, Interval::new(0, 100)?, 100);

        assert_eq!(
            evidence.depth_profile("chr1", Strand::Forward, Interval::new(8, 16)?)?,
            vec![0, 0, 5, 5, 12, 12, 12, 7]
        );
        assert_eq!(evidence.depth("chr1", Strand::Forward, 19)?, 7);
        assert_eq!(evidence.depth("chr1", Strand::Forward, 20)?, 0);
        assert_eq!(evidence.depth("chr2", Strand::Forward, 12)?, 0);
        Ok(())
    }

    #[test]
    fn test_clipped_reads() -> Result<()> {
        let mut evidence = MemoryEvidence::new();
        let read = ClippedRead::new(Interval::new(10, 20)?, vec![], b"AAAA".to_vec());
        evidence.add_read("chr1", Strand::Forward, read.clone());

        let open = evidence.open()?.clipped_reads("chr1", Strand::Forward, Interval::new(15, 30)?)?;
        assert_eq!(open, vec![read]);
        assert!(evidence
            .clipped_reads("chr1", Strand::Reverse, Interval::new(15, 30)?)?
            .is_empty());
        Ok(())
    }
}
