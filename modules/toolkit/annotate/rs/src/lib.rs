pub use aggregate::{AnnotationAggregator, AnnotationSet, Summary};
pub use config::{Config, ConfigError};
pub use decision::UtrDecisionEngine;
pub use engine::{BatchAnnotator, Run, RunStatus};
pub use features::{FeatureKind, FeatureQuery, FeatureStore, GeneFeature};
pub use peaks::{Peak, PeakCollection};
pub use result::{
    AbandonReason, AnnotationRecord, Emission, Flag, GeneCall, PeakOutcome, Utr, Verdict,
};

pub mod aggregate;
mod config;
pub mod decision;
mod engine;
pub mod evidence;
pub mod export;
pub mod features;
pub mod peaks;
pub mod result;
mod worker;

use utrex_core_rs::loc::Locus;

/// Stranded, half-open, 0-based region of a named chromosome.
pub type GenomicInterval = Locus<String, u64>;
