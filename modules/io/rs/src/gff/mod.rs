//! GFF3 and GTF gene models.
//!
//! Both dialects are read into the same [`GffRecord`] with 0-based half-open coordinates.
//! Output is always GFF3.

pub use reader::{parse, Dialect, Reader};
pub use record::GffRecord;
pub use writer::Writer;

mod reader;
mod record;
mod writer;
