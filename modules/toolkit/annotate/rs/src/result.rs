use std::collections::BTreeSet;
use std::fmt::Display;

use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use utrex_core_rs::loc::IntervalOp;

use crate::GenomicInterval;

/// A new or extended 3'UTR of a gene.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve, Constructor)]
pub struct Utr {
    gene_id: String,
    locus: GenomicInterval,
}

impl Utr {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.locus.interval.len()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Flag {
    ZeroCoverageWarning,
    Truncated,
    ExtendedExisting,
}

impl Flag {
    pub fn label(&self) -> &'static str {
        match self {
            Flag::ZeroCoverageWarning => "zero_coverage_warning",
            Flag::Truncated => "truncated",
            Flag::ExtendedExisting => "extended_existing",
        }
    }
}

impl Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// UTR claimed by a single peak for a single gene.
#[derive(Clone, PartialEq, Debug, Getters, Dissolve)]
pub struct AnnotationRecord {
    gene_id: String,
    peak: String,
    /// Load index of the claiming peak.
    peak_index: usize,
    signal_value: f64,
    utr: Utr,
    flags: BTreeSet<Flag>,
}

impl AnnotationRecord {
    pub fn new(
        peak: impl Into<String>,
        peak_index: usize,
        signal_value: f64,
        utr: Utr,
        flags: impl IntoIterator<Item = Flag>,
    ) -> Self {
        Self {
            gene_id: utr.gene_id.clone(),
            peak: peak.into(),
            peak_index,
            signal_value,
            utr,
            flags: flags.into_iter().collect(),
        }
    }

    pub fn is_flagged(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Decision for one candidate gene of a peak.
#[derive(Clone, PartialEq, Debug)]
pub enum Verdict {
    AlreadyAnnotated,
    ContainedInGene,
    AmbiguousNeighbor,
    /// The peak doesn't reach past the gene in the direction of transcription.
    NotDownstream,
    Confirmed(AnnotationRecord),
    PotentialUtrZeroCoverage(AnnotationRecord),
}

#[derive(Clone, PartialEq, Debug, Getters, Dissolve, Constructor)]
pub struct GeneCall {
    gene_id: String,
    verdict: Verdict,
}

#[derive(Clone, PartialEq, Debug)]
pub enum PeakOutcome {
    NoNearbyFeatures,
    Evaluated(Vec<GeneCall>),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AbandonReason {
    Interrupted,
    /// The worker could not (re)open its evidence provider.
    WorkerFailure(String),
}

/// One message on the result channel. Every peak is covered by exactly one emission.
#[derive(Clone, PartialEq, Debug)]
pub enum Emission {
    Peak {
        index: usize,
        name: String,
        outcome: PeakOutcome,
    },
    Failed {
        index: usize,
        name: String,
        error: String,
    },
    Abandoned {
        batch: usize,
        peaks: Vec<(usize, String)>,
        reason: AbandonReason,
    },
}

impl Emission {
    /// Number of peaks accounted for by this emission.
    pub fn peaks(&self) -> usize {
        match self {
            Emission::Peak { .. } | Emission::Failed { .. } => 1,
            Emission::Abandoned { peaks, .. } => peaks.len(),
        }
    }
}
