use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use eyre::{Result, WrapErr};
use itertools::Itertools;
use utrex_core_rs::loc::IntervalOp;

use super::record::GffRecord;
use crate::WriteRecord;

/// GFF3 writer. The version directive is emitted before the first record.
pub struct Writer<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> Writer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<()> {
        if !self.header_written {
            writeln!(self.writer, "##gff-version 3")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl Writer<BufWriter<File>> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

/// Escape characters with a reserved meaning in GFF3 columns.
pub fn percent_encode(value: &str, reserved: &[u8]) -> String {
    let mut encoded = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            c if c.is_ascii_control() || c == '%' || (c.is_ascii() && reserved.contains(&(c as u8))) => {
                encoded.push_str(&format!("%{:02X}", c as u8));
            }
            c => encoded.push(c),
        }
    }
    encoded
}

const ATTRIBUTE_RESERVED: &[u8] = b";=&,";

fn attributes(record: &GffRecord) -> String {
    if record.attributes.is_empty() {
        return ".".to_string();
    }
    record
        .attributes
        .iter()
        .map(|(key, values)| {
            format!(
                "{}={}",
                percent_encode(key, ATTRIBUTE_RESERVED),
                values
                    .iter()
                    .map(|x| percent_encode(x, ATTRIBUTE_RESERVED))
                    .join(",")
            )
        })
        .join(";")
}

impl<W: Write> WriteRecord for Writer<W> {
    type Record = GffRecord;

    fn write_record(&mut self, record: &GffRecord) -> Result<()> {
        self.write_header()?;

        let score = record.score.map_or(".".to_string(), |x| x.to_string());
        let strand = record.strand.map_or('.', |x| x.symbol());
        let phase = record.phase.map_or(".".to_string(), |x| x.to_string());
        writeln!(
            self.writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            percent_encode(&record.seqid, b""),
            record.source,
            record.feature_type,
            record.interval.start() + 1,
            record.interval.end(),
            score,
            strand,
            phase,
            attributes(record)
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.write_header()?;
        self.writer.flush()?;
        Ok(())
    }
}
