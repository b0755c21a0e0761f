//! MACS-style peak calls: broadPeak (BED6+3) and narrowPeak (BED6+4).

pub use reader::{parse, Reader};
pub use record::PeakRecord;

mod reader;
mod record;
