pub use bits::{Bits, BitsBuilder};

mod bits;
