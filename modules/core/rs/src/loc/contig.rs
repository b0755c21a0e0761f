use std::fmt::Debug;
use std::hash::Hash;

/// Anything that names an assembly contig: a chromosome name, a numeric reference id, etc.
pub trait Contig: Hash + Eq + Ord + Clone + Default + Debug + Send + Sync {}

impl<T: Hash + Eq + Ord + Clone + Default + Debug + Send + Sync> Contig for T {}
