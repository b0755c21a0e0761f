pub use alignment::AlignedRead;
pub use reader::Reader;

mod alignment;
mod reader;
