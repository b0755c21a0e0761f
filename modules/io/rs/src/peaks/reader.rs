use std::io::BufRead;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use super::record::PeakRecord;
use crate::compression;
use crate::ReadRecord;

pub mod parse {
    use eyre::{bail, OptionExt, Result, WrapErr};
    use utrex_core_rs::loc::Interval;

    pub fn interval<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Interval<u64>> {
        let start = parts.next().ok_or_eyre("Missing peak start")?;
        let end = parts.next().ok_or_eyre("Missing peak end")?;

        let (start, end) = match (start.parse::<u64>(), end.parse::<u64>()) {
            (Ok(start), Ok(end)) => (start, end),
            _ => bail!("Invalid peak interval: {start}-{end}"),
        };
        Interval::new(start, end).wrap_err("Invalid peak interval")
    }

    /// MACS writes integer scores, but some tools emit them as floats.
    pub fn score(field: &str) -> Result<u32> {
        match field.parse::<u32>() {
            Ok(score) => Ok(score),
            Err(_) => {
                let score = field
                    .parse::<f64>()
                    .wrap_err_with(|| format!("Invalid peak score: {field}"))?;
                Ok(score.max(0.0).round() as u32)
            }
        }
    }

    pub fn float(field: Option<&str>, what: &str) -> Result<f64> {
        let field = field.ok_or_else(|| eyre::eyre!("Missing peak {what}"))?;
        field
            .parse::<f64>()
            .wrap_err_with(|| format!("Invalid peak {what}: {field}"))
    }

    pub fn summit(field: Option<&str>) -> Result<Option<u64>> {
        match field {
            None => Ok(None),
            Some("-1") => Ok(None),
            Some(field) => field
                .parse::<u64>()
                .map(Some)
                .wrap_err_with(|| format!("Invalid peak summit: {field}")),
        }
    }
}

/// Streaming reader for broadPeak/narrowPeak files.
pub struct Reader<R> {
    reader: R,
    buffer: String,
    line: usize,
}

impl<R: BufRead> Reader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
            line: 0,
        }
    }
}

impl Reader<Box<dyn BufRead + Send + Sync>> {
    /// Open a peak file; gzip compression is detected automatically.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let stream = compression::read_file(path)?;
        Ok(Self::new(stream.box_bufread()))
    }
}

fn is_header(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with("track") || line.starts_with("browser")
}

impl<R: BufRead> ReadRecord for Reader<R> {
    type Record = PeakRecord;

    fn read_record(&mut self, into: &mut PeakRecord) -> Result<bool> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(false);
            }
            self.line += 1;
            if !is_header(self.buffer.trim_end()) {
                break;
            }
        }

        let line = self.buffer.trim_end_matches(['\n', '\r']);
        let fields = line.split('\t').collect::<Vec<_>>();
        ensure!(
            fields.len() == 9 || fields.len() == 10,
            "Peak record at line {} must have 9 (broadPeak) or 10 (narrowPeak) columns, found {}",
            self.line,
            fields.len()
        );

        let parsed: Result<()> = (|| {
            into.seqid.clear();
            into.seqid.push_str(fields[0]);
            into.interval = parse::interval(&mut fields[1..3].iter().copied())?;
            into.name.clear();
            into.name.push_str(fields[3]);
            into.score = parse::score(fields[4])?;
            // fields[5] is the strand column, always '.' for MACS output
            into.signal_value = parse::float(fields.get(6).copied(), "signalValue")?;
            into.p_value = parse::float(fields.get(7).copied(), "pValue")?;
            into.q_value = parse::float(fields.get(8).copied(), "qValue")?;
            into.summit = parse::summit(fields.get(9).copied())?;
            Ok(())
        })();
        parsed.wrap_err_with(|| format!("Failed to parse peak record at line {}: {line}", self.line))?;

        Ok(true)
    }
}
