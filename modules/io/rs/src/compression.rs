use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use flate2::read::MultiGzDecoder;

pub enum DecompressedStream {
    PlainText(File),
    Gzip(MultiGzDecoder<File>),
}

impl DecompressedStream {
    pub fn box_bufread(self) -> Box<dyn BufRead + Send + Sync + 'static> {
        match self {
            DecompressedStream::PlainText(file) => Box::new(BufReader::new(file)),
            DecompressedStream::Gzip(decoder) => Box::new(BufReader::new(decoder)),
        }
    }
}

/// Open a file for reading, transparently decompressing gzip content.
/// Compression is detected from the file signature, not the extension.
pub fn read_file(path: impl AsRef<Path>) -> Result<DecompressedStream> {
    let path = path.as_ref();
    ensure!(path.exists(), "File {} does not exist", path.display());

    let kind = infer::get_from_path(path)
        .wrap_err_with(|| format!("Failed to sniff the file type of {}", path.display()))?;
    let file = File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;

    let stream = match kind.map(|x| (x.extension(), x.mime_type())) {
        Some(("gz", "application/gzip")) => DecompressedStream::Gzip(MultiGzDecoder::new(file)),
        // Anything else is treated as plain text
        _ => DecompressedStream::PlainText(file),
    };
    Ok(stream)
}
