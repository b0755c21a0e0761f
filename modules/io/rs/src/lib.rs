pub mod bam;
pub mod compression;
pub mod gff;
pub mod peaks;
mod traits;

pub use traits::{ReadRecord, WriteRecord};
