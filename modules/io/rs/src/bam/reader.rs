use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use derive_getters::Getters;
use eyre::{Result, WrapErr};
use noodles::core::region::Interval as RegionInterval;
use noodles::core::Position;
use noodles::csi::BinningIndex;
use noodles::{bam, bgzf, csi, sam};
use utrex_core_rs::loc::{Interval, IntervalOp};

use super::alignment::AlignedRead;

const UNMAPPED: u16 = 0x4;
const REVERSE: u16 = 0x10;

/// Indexed BAM reader. The index is expected next to the file as `<path>.bai`.
#[derive(Getters)]
pub struct Reader {
    path: PathBuf,
    #[getter(skip)]
    inner: bam::io::Reader<bgzf::io::Reader<File>>,
    #[getter(skip)]
    index: Box<dyn BinningIndex + Send + Sync>,
    header: sam::Header,
    #[getter(skip)]
    record: bam::Record,
    inflags: u16,
    exflags: u16,
    minmapq: u8,
}

impl Reader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut index = OsString::from(path);
        index.push(".bai");

        let index = bam::bai::read(&index)
            .wrap_err_with(|| format!("Failed to read BAM index for {}", path.display()))?;
        let file = File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
        let mut inner = bam::io::Reader::new(file);
        let header = inner
            .read_header()
            .wrap_err_with(|| format!("Failed to read BAM header of {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            index: Box::new(index),
            header,
            record: bam::Record::default(),
            inflags: 0,
            exflags: UNMAPPED,
            minmapq: 0,
        })
    }

    /// Keep only records with all of these flag bits set.
    pub fn set_inflags(&mut self, inflags: u16) -> &mut Self {
        self.inflags = inflags;
        self
    }

    /// Drop records with any of these flag bits set. Unmapped reads are always dropped.
    pub fn set_exflags(&mut self, exflags: u16) -> &mut Self {
        self.exflags = exflags | UNMAPPED;
        self
    }

    pub fn set_minmapq(&mut self, minmapq: u8) -> &mut Self {
        self.minmapq = minmapq;
        self
    }

    /// Collect alignments overlapping `interval` on `contig` into `into` (which is cleared first).
    /// Unknown contigs yield no alignments.
    pub fn fetch(
        &mut self,
        contig: &str,
        interval: Interval<u64>,
        into: &mut Vec<AlignedRead>,
    ) -> Result<()> {
        into.clear();

        let Some(refid) = self
            .header
            .reference_sequences()
            .get_index_of(contig.as_bytes())
        else {
            log::debug!("Contig {contig} is absent from {}", self.path.display());
            return Ok(());
        };

        let region = RegionInterval::from(
            Position::try_from(interval.start() as usize + 1)?
                ..=Position::try_from(interval.end() as usize)?,
        );
        let chunks = self.index.query(refid, region)?;

        let Self {
            inner,
            record,
            inflags,
            exflags,
            minmapq,
            ..
        } = self;
        let mut query = bam::io::Reader::from(csi::io::Query::new(inner.get_mut(), chunks));

        while query.read_record(record)? != 0 {
            let flags: u16 = record.flags().into();
            let mapq = record.mapping_quality().map(|x| x.get()).unwrap_or(255);
            if flags & *inflags != *inflags || flags & *exflags != 0 || mapq < *minmapq {
                continue;
            }

            let start = match (
                record.reference_sequence_id().transpose()?,
                record.alignment_start().transpose()?,
            ) {
                (Some(id), Some(start)) if id == refid => usize::from(start) as u64 - 1,
                _ => continue,
            };

            if let Some(read) = AlignedRead::from_record(record, start, flags & REVERSE != 0)? {
                if read.interval().intersects(&interval) {
                    into.push(read);
                }
            }
        }
        Ok(())
    }
}
