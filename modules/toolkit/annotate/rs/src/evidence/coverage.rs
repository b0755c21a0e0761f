use ahash::{HashMap, HashMapExt};
use eyre::Result;
use utrex_core_rs::loc::{Interval, IntervalOp, Strand};

use super::{ClippedRead, Evidence};
use crate::features::GeneFeature;
use crate::GenomicInterval;

/// Maximal runs of positions with depth below `min_pileups`, in genomic coordinates.
pub fn zero_coverage_gaps(profile: &[u32], offset: u64, min_pileups: u32) -> Vec<Interval<u64>> {
    let mut gaps = Vec::new();
    let mut start = None;
    for (ind, depth) in profile.iter().enumerate() {
        let pos = offset + ind as u64;
        match (*depth < min_pileups, start) {
            (true, None) => start = Some(pos),
            (false, Some(gap)) => {
                gaps.extend(Interval::new(gap, pos).ok());
                start = None;
            }
            _ => {}
        }
    }
    if let Some(gap) = start {
        gaps.extend(Interval::new(gap, offset + profile.len() as u64).ok());
    }
    gaps
}

/// True if `clip` holds a run of at least `min_len` copies of `base` (case-insensitive).
pub fn has_poly_tail(clip: &[u8], base: u8, min_len: usize) -> bool {
    if min_len == 0 {
        return true;
    }
    let base = base.to_ascii_uppercase();
    let mut run = 0;
    for symbol in clip {
        if symbol.to_ascii_uppercase() == base {
            run += 1;
            if run >= min_len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Polyadenylation site closest to the gene that lies strictly inside `range`.
///
/// Forward genes look for poly-A in right clips and use the alignment end. Reverse genes look
/// for poly-T in left clips and use the alignment start.
pub fn truncation_point(
    reads: &[ClippedRead],
    strand: Strand,
    range: Interval<u64>,
    min_poly_tail: usize,
) -> Option<u64> {
    let inside = |pos: &u64| range.start() < *pos && *pos < range.end();
    match strand {
        Strand::Forward => reads
            .iter()
            .filter(|x| has_poly_tail(x.right_clip(), b'A', min_poly_tail))
            .map(|x| x.interval().end())
            .filter(inside)
            .min(),
        Strand::Reverse => reads
            .iter()
            .filter(|x| has_poly_tail(x.left_clip(), b'T', min_poly_tail))
            .map(|x| x.interval().start())
            .filter(inside)
            .max(),
    }
}

type MemoKey = (String, Interval<u64>);

/// Memoized coverage computations on top of a worker-owned evidence provider.
pub struct CoverageEvidence<E> {
    evidence: E,
    gaps: HashMap<MemoKey, Vec<Interval<u64>>>,
    truncations: HashMap<MemoKey, Option<u64>>,
}

impl<E: Evidence> CoverageEvidence<E> {
    pub fn new(evidence: E) -> Self {
        Self {
            evidence,
            gaps: HashMap::new(),
            truncations: HashMap::new(),
        }
    }

    /// Zero-coverage gaps inside a candidate UTR of `gene`.
    pub fn zero_coverage_gaps(
        &mut self,
        gene: &GeneFeature,
        range: &GenomicInterval,
        min_pileups: u32,
    ) -> Result<&[Interval<u64>]> {
        let key = (gene.id().clone(), range.interval);
        if !self.gaps.contains_key(&key) {
            let profile = self
                .evidence
                .depth_profile(&range.contig, range.strand, range.interval)?;
            let gaps = zero_coverage_gaps(&profile, range.start(), min_pileups);
            self.gaps.insert(key.clone(), gaps);
        }
        Ok(self.gaps.get(&key).map(Vec::as_slice).unwrap_or_default())
    }

    /// Poly-tail truncation point inside a candidate UTR of `gene`.
    pub fn poly_tail_truncation(
        &mut self,
        gene: &GeneFeature,
        range: &GenomicInterval,
        min_poly_tail: usize,
    ) -> Result<Option<u64>> {
        let key = (gene.id().clone(), range.interval);
        if let Some(point) = self.truncations.get(&key) {
            return Ok(*point);
        }

        let reads = self
            .evidence
            .clipped_reads(&range.contig, range.strand, range.interval)?;
        let point = truncation_point(&reads, range.strand, range.interval, min_poly_tail);
        self.truncations.insert(key, point);
        Ok(point)
    }

    pub fn cached(&self) -> usize {
        self.gaps.len() + self.truncations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::MemoryEvidence;
    use crate::features::FeatureKind;
    use utrex_core_rs::loc::Locus;

    fn read(start: u64, end: u64, left: &str, right: &str) -> ClippedRead {
        ClippedRead::new(
            Interval::new(start, end).unwrap(),
            left.as_bytes().to_vec(),
            right.as_bytes().to_vec(),
        )
    }

    #[test]
    fn test_zero_coverage_gaps() {
        let profile = [0, 0, 12, 15, 3, 10, 10, 0];
        assert_eq!(
            zero_coverage_gaps(&profile, 100, 10),
            vec![
                Interval::new(100, 102).unwrap(),
                Interval::new(104, 105).unwrap(),
                Interval::new(107, 108).unwrap()
            ]
        );
        assert!(zero_coverage_gaps(&[10, 11, 12], 0, 10).is_empty());
        assert!(zero_coverage_gaps(&[], 0, 10).is_empty());
        assert_eq!(
            zero_coverage_gaps(&[1, 1], 5, 1),
            Vec::<Interval<u64>>::new()
        );
    }

    #[test]
    fn test_has_poly_tail() {
        assert!(has_poly_tail(b"GCaaaaaAAAAA", b'A', 10));
        assert!(!has_poly_tail(b"AAAAACAAAAA", b'A', 10));
        assert!(has_poly_tail(b"TTTT", b'T', 4));
        assert!(!has_poly_tail(b"", b'T', 1));
    }

    #[test]
    fn test_truncation_point() {
        let range = Interval::new(1000, 1200).unwrap();
        let reads = vec![
            read(900, 1150, "", "AAAAAAAAAAAA"),
            read(900, 1100, "", "AAAAAAAAAAAA"),
            read(900, 1050, "", "ACGT"),
            read(900, 1000, "", "AAAAAAAAAAAA"),
            read(1120, 1300, "TTTTTTTTTTTT", ""),
            read(1010, 1300, "TTTTTTTTTTTT", ""),
        ];
        assert_eq!(truncation_point(&reads, Strand::Forward, range, 10), Some(1100));
        assert_eq!(truncation_point(&reads, Strand::Reverse, range, 10), Some(1120));
        assert_eq!(truncation_point(&reads, Strand::Forward, range, 20), None);
    }

    #[test]
    fn test_memoized_queries() -> Result<()> {
        let mut evidence = MemoryEvidence::new();
        evidence.add_depth("chr1", Strand::Forward, Interval::new(1000, 1100)?, 20);
        let mut coverage = CoverageEvidence::new(evidence);

        let gene = GeneFeature::new(
            "g1",
            Locus::try_new("chr1".to_string(), 500, 1000, Strand::Forward)?,
            FeatureKind::Gene,
            None,
            vec![],
        );
        let range = Locus::try_new("chr1".to_string(), 1000, 1200, Strand::Forward)?;

        let gaps = coverage.zero_coverage_gaps(&gene, &range, 10)?.to_vec();
        assert_eq!(gaps, vec![Interval::new(1100, 1200)?]);
        assert_eq!(coverage.poly_tail_truncation(&gene, &range, 10)?, None);
        assert_eq!(coverage.cached(), 2);

        // Same key is served from the cache
        coverage.zero_coverage_gaps(&gene, &range, 10)?;
        coverage.poly_tail_truncation(&gene, &range, 10)?;
        assert_eq!(coverage.cached(), 2);
        Ok(())
    }
}
