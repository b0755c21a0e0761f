use derive_getters::{Dissolve, Getters};
use eyre::{eyre, Result};
use noodles::bam;
use noodles::sam::alignment::record::cigar::op::Kind;
use utrex_core_rs::loc::{Interval, IntervalOp};

/// Reference footprint of a single alignment together with its soft-clipped ends.
#[derive(Clone, PartialEq, Eq, Debug, Default, Getters, Dissolve)]
pub struct AlignedRead {
    /// Reference span, from the first to the last reference-consuming operation.
    interval: Interval<u64>,
    /// Blocks aligned to the reference (M, = and X operations).
    blocks: Vec<Interval<u64>>,
    /// Soft-clipped bases before the first aligned base, in reference orientation.
    left_clip: Vec<u8>,
    /// Soft-clipped bases after the last aligned base, in reference orientation.
    right_clip: Vec<u8>,
    reverse: bool,
}

impl AlignedRead {
    pub fn new(
        interval: Interval<u64>,
        blocks: Vec<Interval<u64>>,
        left_clip: Vec<u8>,
        right_clip: Vec<u8>,
        reverse: bool,
    ) -> Self {
        Self {
            interval,
            blocks,
            left_clip,
            right_clip,
            reverse,
        }
    }

    /// Walk the CIGAR of a mapped record. `start` is the 0-based alignment start.
    pub(crate) fn from_record(record: &bam::Record, start: u64, reverse: bool) -> Result<Option<Self>> {
        let mut blocks: Vec<Interval<u64>> = Vec::new();
        let (mut refpos, mut readpos) = (start, 0usize);
        let (mut left_clip, mut right_clip) = (0usize, 0usize);
        let mut seen_aligned = false;

        for op in record.cigar().iter() {
            let op = op?;
            let len = op.len();
            match op.kind() {
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                    let end = refpos + len as u64;
                    match blocks.last_mut() {
                        Some(last) if last.end() == refpos => {
                            *last = Interval::new(last.start(), end)?;
                        }
                        _ => blocks.push(Interval::new(refpos, end)?),
                    }
                    refpos = end;
                    readpos += len;
                    seen_aligned = true;
                }
                Kind::Deletion | Kind::Skip => {
                    refpos += len as u64;
                }
                Kind::Insertion => {
                    readpos += len;
                }
                Kind::SoftClip => {
                    if seen_aligned {
                        right_clip += len;
                    } else {
                        left_clip += len;
                    }
                    readpos += len;
                }
                Kind::HardClip | Kind::Pad => {}
            }
        }

        let (first, last) = match (blocks.first(), blocks.last()) {
            (Some(first), Some(last)) => (first.start(), last.end()),
            _ => return Ok(None),
        };
        let interval = Interval::new(first, refpos.max(last))?;

        let (left, right) = if left_clip + right_clip > 0 {
            let sequence = record.sequence().iter().collect::<Vec<u8>>();
            if sequence.is_empty() {
                // SEQ is `*`: the clipped bases are unknown
                (Vec::new(), Vec::new())
            } else if sequence.len() < readpos {
                return Err(eyre!(
                    "Read sequence is shorter than its CIGAR: {} < {}",
                    sequence.len(),
                    readpos
                ));
            } else {
                (
                    sequence[..left_clip].to_vec(),
                    sequence[readpos - right_clip..readpos].to_vec(),
                )
            }
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Some(Self::new(interval, blocks, left, right, reverse)))
    }
}
