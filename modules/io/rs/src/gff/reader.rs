use std::io::BufRead;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use super::record::GffRecord;
use crate::compression;
use crate::ReadRecord;

/// Attribute column syntax.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dialect {
    /// `key=value1,value2;key2=value`
    Gff3,
    /// `key "value"; key2 "value";`
    Gtf,
}

impl Dialect {
    /// Guess the dialect from a single attribute column.
    pub fn detect(attributes: &str) -> Self {
        let first = attributes.split(';').map(str::trim).find(|x| !x.is_empty());
        match first {
            Some(pair) => match (pair.find('='), pair.find([' ', '"'])) {
                (Some(eq), Some(sep)) if eq < sep => Dialect::Gff3,
                (Some(_), None) => Dialect::Gff3,
                _ => Dialect::Gtf,
            },
            None => Dialect::Gff3,
        }
    }
}

pub mod parse {
    use eyre::{bail, eyre, Result, WrapErr};
    use utrex_core_rs::loc::{Interval, Strand};

    /// 1-based closed coordinates into a 0-based half-open interval.
    pub fn interval(start: &str, end: &str) -> Result<Interval<u64>> {
        let (start, end) = match (start.parse::<u64>(), end.parse::<u64>()) {
            (Ok(start), Ok(end)) if start >= 1 => (start, end),
            _ => bail!("Invalid GFF coordinates: {start}-{end}"),
        };
        Interval::new(start - 1, end).wrap_err("Invalid GFF interval")
    }

    pub fn score(field: &str) -> Result<Option<f64>> {
        match field {
            "." => Ok(None),
            _ => field
                .parse::<f64>()
                .map(Some)
                .wrap_err_with(|| format!("Invalid GFF score: {field}")),
        }
    }

    pub fn strand(field: &str) -> Result<Option<Strand>> {
        match field {
            "." | "?" => Ok(None),
            _ => field.parse::<Strand>().map(Some),
        }
    }

    pub fn phase(field: &str) -> Result<Option<u8>> {
        match field {
            "." => Ok(None),
            "0" => Ok(Some(0)),
            "1" => Ok(Some(1)),
            "2" => Ok(Some(2)),
            _ => Err(eyre!("Invalid GFF phase: {field}")),
        }
    }

    pub fn percent_decode(value: &str) -> String {
        let bytes = value.as_bytes();
        if memchr::memchr(b'%', bytes).is_none() {
            return value.to_string();
        }

        let mut decoded = Vec::with_capacity(bytes.len());
        let mut ind = 0;
        while ind < bytes.len() {
            let hex = bytes
                .get(ind + 1..ind + 3)
                .and_then(|x| std::str::from_utf8(x).ok())
                .and_then(|x| u8::from_str_radix(x, 16).ok());
            match (bytes[ind], hex) {
                (b'%', Some(byte)) => {
                    decoded.push(byte);
                    ind += 3;
                }
                (byte, _) => {
                    decoded.push(byte);
                    ind += 1;
                }
            }
        }
        String::from_utf8_lossy(&decoded).into_owned()
    }

    fn push(attributes: &mut Vec<(String, Vec<String>)>, key: &str, values: Vec<String>) {
        match attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => existing.extend(values),
            None => attributes.push((key.to_string(), values)),
        }
    }

    pub fn gff3_attributes(field: &str, into: &mut Vec<(String, Vec<String>)>) -> Result<()> {
        into.clear();
        if field == "." {
            return Ok(());
        }
        for pair in field.split(';').map(str::trim).filter(|x| !x.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| eyre!("GFF3 attribute without a value: {pair}"))?;
            let values = value.split(',').map(percent_decode).collect();
            push(into, &percent_decode(key.trim()), values);
        }
        Ok(())
    }

    pub fn gtf_attributes(field: &str, into: &mut Vec<(String, Vec<String>)>) -> Result<()> {
        into.clear();
        if field == "." {
            return Ok(());
        }

        let mut rest = field.trim();
        while !rest.is_empty() {
            let (key, tail) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| eyre!("GTF attribute without a value: {rest}"))?;
            let tail = tail.trim_start();

            let (value, tail) = match tail.strip_prefix('"') {
                Some(quoted) => {
                    let end = memchr::memchr(b'"', quoted.as_bytes())
                        .ok_or_else(|| eyre!("Unterminated GTF attribute value: {tail}"))?;
                    (&quoted[..end], &quoted[end + 1..])
                }
                None => match tail.find(';') {
                    Some(end) => (tail[..end].trim(), &tail[end..]),
                    None => (tail.trim(), ""),
                },
            };
            push(into, key, vec![value.to_string()]);

            rest = tail.trim_start();
            rest = rest.strip_prefix(';').unwrap_or(rest).trim_start();
        }
        Ok(())
    }
}

/// Streaming GFF3/GTF reader. The dialect is taken from the `##gff-version` directive
/// or guessed from the first record, then fixed for the rest of the file.
pub struct Reader<R> {
    reader: R,
    buffer: String,
    line: usize,
    dialect: Option<Dialect>,
    finished: bool,
}

impl<R: BufRead> Reader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
            line: 0,
            dialect: None,
            finished: false,
        }
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    fn next_line(&mut self) -> Result<bool> {
        while !self.finished {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                self.finished = true;
                break;
            }
            self.line += 1;

            let line = self.buffer.trim_end();
            if line.starts_with("##FASTA") {
                self.finished = true;
            } else if let Some(version) = line.strip_prefix("##gff-version") {
                if version.trim().starts_with('3') {
                    self.dialect = Some(Dialect::Gff3);
                }
            } else if !line.is_empty() && !line.starts_with('#') {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Reader<Box<dyn BufRead + Send + Sync>> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let stream = compression::read_file(path)?;
        Ok(Self::new(stream.box_bufread()))
    }
}

impl<R: BufRead> ReadRecord for Reader<R> {
    type Record = GffRecord;

    fn read_record(&mut self, into: &mut GffRecord) -> Result<bool> {
        if !self.next_line()? {
            return Ok(false);
        }

        let line = self.buffer.trim_end_matches(['\n', '\r']);
        let fields = line.split('\t').collect::<Vec<_>>();
        ensure!(
            fields.len() == 9,
            "GFF record at line {} must have 9 columns, found {}",
            self.line,
            fields.len()
        );
        let dialect = *self.dialect.get_or_insert_with(|| Dialect::detect(fields[8]));

        let parsed: Result<()> = (|| {
            into.seqid = parse::percent_decode(fields[0]);
            into.source = fields[1].to_string();
            into.feature_type = fields[2].to_string();
            into.interval = parse::interval(fields[3], fields[4])?;
            into.score = parse::score(fields[5])?;
            into.strand = parse::strand(fields[6])?;
            into.phase = parse::phase(fields[7])?;
            match dialect {
                Dialect::Gff3 => parse::gff3_attributes(fields[8], &mut into.attributes),
                Dialect::Gtf => parse::gtf_attributes(fields[8], &mut into.attributes),
            }
        })();
        parsed.wrap_err_with(|| format!("Failed to parse GFF record at line {}: {line}", self.line))?;

        Ok(true)
    }
}
