pub use contig::Contig;
pub use interval::{Interval, IntervalOp};
pub use locus::Locus;
pub use per_strand::PerStrand;
pub use strand::Strand;

mod contig;
mod interval;
mod locus;
mod per_strand;
mod strand;
