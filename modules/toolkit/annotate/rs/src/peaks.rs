use std::cmp::Ordering;
use std::path::Path;

use ahash::HashSet;
use derive_getters::{Dissolve, Getters};
use eyre::{ensure, Result, WrapErr};
use utrex_core_rs::loc::{Locus, Strand};
use utrex_io_rs::peaks::{PeakRecord, Reader};
use utrex_io_rs::ReadRecord;

use crate::GenomicInterval;

/// A called peak on one strand.
#[derive(Clone, PartialEq, Debug, Getters, Dissolve)]
pub struct Peak {
    /// Position in the loaded collection, assigned by [`PeakCollection::new`].
    index: usize,
    name: String,
    locus: GenomicInterval,
    score: u32,
    signal_value: f64,
    p_value: f64,
    q_value: f64,
}

impl Peak {
    pub fn new(
        name: impl Into<String>,
        locus: GenomicInterval,
        score: u32,
        signal_value: f64,
        p_value: f64,
        q_value: f64,
    ) -> Self {
        Self {
            index: 0,
            name: name.into(),
            locus,
            score,
            signal_value,
            p_value,
            q_value,
        }
    }

    /// Peak files carry no strand column; the strand comes from the file they were called on.
    pub fn from_record(record: PeakRecord, strand: Strand) -> Self {
        let (seqid, interval, name, score, signal_value, p_value, q_value, _) = record.dissolve();
        Self::new(
            name,
            Locus::new(seqid, interval, strand),
            score,
            signal_value,
            p_value,
            q_value,
        )
    }
}

/// Peaks of both strands: forward peaks first, each strand ordered by chromosome then start.
/// Peak names are unique within a strand.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PeakCollection {
    peaks: Vec<Peak>,
}

fn strand_rank(strand: Strand) -> u8 {
    match strand {
        Strand::Forward => 0,
        Strand::Reverse => 1,
    }
}

fn load_order(a: &Peak, b: &Peak) -> Ordering {
    strand_rank(a.locus.strand)
        .cmp(&strand_rank(b.locus.strand))
        .then_with(|| a.locus.contig.cmp(&b.locus.contig))
        .then_with(|| a.locus.start().cmp(&b.locus.start()))
        .then_with(|| a.locus.end().cmp(&b.locus.end()))
}

impl PeakCollection {
    pub fn new(mut peaks: Vec<Peak>) -> Result<Self> {
        peaks.sort_by(load_order);

        let mut names = HashSet::default();
        for peak in &peaks {
            ensure!(
                names.insert((peak.locus.strand, peak.name.as_str())),
                "Duplicated peak name on the {} strand: {}",
                peak.locus.strand.label(),
                peak.name
            );
        }

        for (index, peak) in peaks.iter_mut().enumerate() {
            peak.index = index;
        }
        Ok(Self { peaks })
    }

    /// Load forward and reverse peak calls from broadPeak/narrowPeak files.
    pub fn load(forward: impl AsRef<Path>, reverse: impl AsRef<Path>) -> Result<Self> {
        let mut peaks = Vec::new();
        for (strand, path) in [
            (Strand::Forward, forward.as_ref()),
            (Strand::Reverse, reverse.as_ref()),
        ] {
            let mut records = Vec::new();
            Reader::from_path(path)?
                .read_to_end(&mut records)
                .wrap_err_with(|| format!("Failed to read peaks from {}", path.display()))?;
            log::info!(
                "Loaded {} {} peaks from {}",
                records.len(),
                strand.label(),
                path.display()
            );
            peaks.extend(records.into_iter().map(|x| Peak::from_record(x, strand)));
        }
        Self::new(peaks)
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peak> {
        self.peaks.iter()
    }

    /// Split into at most `batches` consecutive parts of `ceil(len / batches)` peaks each.
    /// Every peak lands in exactly one part and keeps its relative order.
    pub fn partition_into(self, batches: usize) -> Vec<PeakCollection> {
        if self.peaks.is_empty() {
            return Vec::new();
        }
        let size = self.peaks.len().div_ceil(batches.max(1));

        let mut parts = Vec::with_capacity(batches);
        let mut peaks = self.peaks.into_iter().peekable();
        while peaks.peek().is_some() {
            parts.push(PeakCollection {
                peaks: peaks.by_ref().take(size).collect(),
            });
        }
        parts
    }
}

impl IntoIterator for PeakCollection {
    type Item = Peak;
    type IntoIter = std::vec::IntoIter<Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn peak(name: &str, contig: &str, start: u64, end: u64, strand: Strand) -> Peak {
        Peak::new(
            name,
            Locus::try_new(contig.to_string(), start, end, strand).unwrap(),
            10,
            1.0,
            1.0,
            1.0,
        )
    }

    fn collection(n: usize) -> PeakCollection {
        let peaks = (0..n)
            .map(|i| {
                let strand = if i % 3 == 0 { Strand::Reverse } else { Strand::Forward };
                peak(&format!("peak_{i}"), "chr1", (i as u64) * 100, (i as u64) * 100 + 50, strand)
            })
            .collect();
        PeakCollection::new(peaks).unwrap()
    }

    #[test]
    fn test_load_order() -> Result<()> {
        let peaks = PeakCollection::new(vec![
            peak("r1", "chr1", 10, 20, Strand::Reverse),
            peak("f2", "chr2", 5, 10, Strand::Forward),
            peak("f1", "chr1", 50, 60, Strand::Forward),
            peak("f0", "chr1", 0, 60, Strand::Forward),
        ])?;
        let names = peaks.iter().map(|x| x.name().as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["f0", "f1", "f2", "r1"]);

        let indices = peaks.iter().map(|x| *x.index()).collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_names_unique_per_strand() {
        let duplicated = PeakCollection::new(vec![
            peak("p", "chr1", 10, 20, Strand::Forward),
            peak("p", "chr2", 10, 20, Strand::Forward),
        ]);
        assert!(duplicated.is_err());

        let across_strands = PeakCollection::new(vec![
            peak("p", "chr1", 10, 20, Strand::Forward),
            peak("p", "chr1", 10, 20, Strand::Reverse),
        ]);
        assert!(across_strands.is_ok());
    }

    #[test]
    fn test_partition_invariant() {
        for total in [0, 1, 2, 7, 10, 31] {
            for batches in [1, 2, 3, 4, 8, 40] {
                let peaks = collection(total);
                let expected = peaks.iter().map(|x| *x.index()).collect::<Vec<_>>();

                let parts = peaks.partition_into(batches);
                assert!(parts.len() <= batches);
                assert!(parts.iter().all(|x| !x.is_empty()));
                if total > 0 {
                    let size = total.div_ceil(batches);
                    assert!(parts.iter().all(|x| x.len() <= size));
                }

                let flattened = parts
                    .iter()
                    .flat_map(|x| x.iter().map(|p| *p.index()))
                    .collect::<Vec<_>>();
                assert_eq!(flattened, expected, "{total} peaks into {batches}");
                assert!(flattened.iter().all_unique());
            }
        }
    }
}
