use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Display;

use derive_getters::Getters;

use crate::result::{AbandonReason, AnnotationRecord, Emission, Flag, PeakOutcome, Verdict};

/// Final tallies reported at the end of a run.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Getters)]
pub struct Summary {
    total_peaks: usize,
    no_nearby_features_count: usize,
    zero_coverage_count: usize,
    annotated_count: usize,
    already_annotated: usize,
    contained: usize,
    ambiguous: usize,
    not_downstream: usize,
    failed: usize,
}

impl Summary {
    pub fn entries(&self) -> [(&'static str, usize); 9] {
        [
            ("total_peaks", self.total_peaks),
            ("no_nearby_features_count", self.no_nearby_features_count),
            ("zero_coverage_count", self.zero_coverage_count),
            ("annotated_count", self.annotated_count),
            ("already_annotated", self.already_annotated),
            ("contained", self.contained),
            ("ambiguous", self.ambiguous),
            ("not_downstream", self.not_downstream),
            ("failed", self.failed),
        ]
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, value) in self.entries() {
            writeln!(f, "{key}\t{value}")?;
        }
        Ok(())
    }
}

/// Winning UTR per gene plus the run counters.
///
/// Counters for gene-level verdicts are incremented once per (peak, gene) pair.
#[derive(Clone, PartialEq, Debug, Default, Getters)]
pub struct AnnotationSet {
    records: BTreeMap<String, AnnotationRecord>,
    /// Number of peaks that claimed a UTR for each gene.
    support: BTreeMap<String, usize>,
    total_peaks: usize,
    no_nearby_features_count: usize,
    zero_coverage_count: usize,
    already_annotated: usize,
    contained: usize,
    ambiguous: usize,
    not_downstream: usize,
    failed: usize,
    /// Peaks left unprocessed by abandoned batches.
    abandoned: usize,
    interrupted: bool,
}

/// Strict preference between two claims on the same gene.
///
/// Confirmed beats zero-coverage flagged, then the longer UTR, then the higher signal,
/// then the peak loaded first.
fn preference(a: &AnnotationRecord, b: &AnnotationRecord) -> Ordering {
    let confirmed = |x: &AnnotationRecord| !x.is_flagged(Flag::ZeroCoverageWarning);
    confirmed(a)
        .cmp(&confirmed(b))
        .then_with(|| a.utr().len().cmp(&b.utr().len()))
        .then_with(|| a.signal_value().total_cmp(b.signal_value()))
        .then_with(|| b.peak_index().cmp(a.peak_index()))
}

impl AnnotationSet {
    /// Insert a claim, keeping the preferred record if the gene is already annotated.
    /// Returns true if the claim became the gene's record.
    pub fn insert(&mut self, record: AnnotationRecord) -> bool {
        *self.support.entry(record.gene_id().clone()).or_default() += 1;
        match self.records.get_mut(record.gene_id()) {
            Some(current) if preference(&record, current) != Ordering::Greater => false,
            Some(current) => {
                *current = record;
                true
            }
            None => {
                self.records.insert(record.gene_id().clone(), record);
                true
            }
        }
    }

    pub fn get(&self, gene_id: &str) -> Option<&AnnotationRecord> {
        self.records.get(gene_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            total_peaks: self.total_peaks,
            no_nearby_features_count: self.no_nearby_features_count,
            zero_coverage_count: self.zero_coverage_count,
            annotated_count: self
                .records
                .values()
                .filter(|x| !x.is_flagged(Flag::ZeroCoverageWarning))
                .count(),
            already_annotated: self.already_annotated,
            contained: self.contained,
            ambiguous: self.ambiguous,
            not_downstream: self.not_downstream,
            failed: self.failed,
        }
    }
}

/// Folds the result stream into an [`AnnotationSet`] in arrival order.
#[derive(Debug, Default)]
pub struct AnnotationAggregator {
    set: AnnotationSet,
}

impl AnnotationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, emission: Emission) -> &mut Self {
        let set = &mut self.set;
        set.total_peaks += emission.peaks();

        match emission {
            Emission::Peak { outcome, .. } => match outcome {
                PeakOutcome::NoNearbyFeatures => set.no_nearby_features_count += 1,
                PeakOutcome::Evaluated(calls) => {
                    for (_, verdict) in calls.into_iter().map(|x| x.dissolve()) {
                        match verdict {
                            Verdict::AlreadyAnnotated => set.already_annotated += 1,
                            Verdict::ContainedInGene => set.contained += 1,
                            Verdict::AmbiguousNeighbor => set.ambiguous += 1,
                            Verdict::NotDownstream => set.not_downstream += 1,
                            Verdict::Confirmed(record) => {
                                set.insert(record);
                            }
                            Verdict::PotentialUtrZeroCoverage(record) => {
                                set.zero_coverage_count += 1;
                                set.insert(record);
                            }
                        }
                    }
                }
            },
            Emission::Failed { .. } => set.failed += 1,
            Emission::Abandoned { peaks, reason, .. } => {
                set.abandoned += peaks.len();
                set.interrupted |= reason == AbandonReason::Interrupted;
            }
        }
        self
    }

    pub fn finish(self) -> AnnotationSet {
        self.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{GeneCall, Utr};
    use itertools::Itertools;
    use utrex_core_rs::loc::{Locus, Strand};

    fn record(peak_index: usize, end: u64, signal: f64, flags: Vec<Flag>) -> AnnotationRecord {
        let locus = Locus::try_new("chr1".to_string(), 1000, end, Strand::Forward).unwrap();
        AnnotationRecord::new(
            format!("peak_{peak_index}"),
            peak_index,
            signal,
            Utr::new("g1".to_string(), locus),
            flags,
        )
    }

    fn emission(record: AnnotationRecord) -> Emission {
        Emission::Peak {
            index: *record.peak_index(),
            name: record.peak().clone(),
            outcome: PeakOutcome::Evaluated(vec![GeneCall::new(
                record.gene_id().clone(),
                Verdict::Confirmed(record),
            )]),
        }
    }

    fn fold(emissions: impl IntoIterator<Item = Emission>) -> AnnotationSet {
        let mut aggregator = AnnotationAggregator::new();
        for emission in emissions {
            aggregator.fold(emission);
        }
        aggregator.finish()
    }

    #[test]
    fn test_longer_utr_wins_in_any_order() {
        let claims = vec![record(0, 1150, 9.0, vec![]), record(1, 1200, 1.0, vec![])];
        for order in claims.iter().cloned().permutations(2) {
            let set = fold(order.into_iter().map(emission));
            let winner = set.get("g1").unwrap();
            assert_eq!(winner.utr().len(), 200);
            assert_eq!(set.support()["g1"], 2);
        }
    }

    #[test]
    fn test_tie_breaks() {
        let claims = vec![
            record(3, 1200, 1.0, vec![]),
            record(2, 1200, 5.0, vec![]),
            record(1, 1200, 5.0, vec![]),
            record(0, 1300, 50.0, vec![Flag::ZeroCoverageWarning]),
        ];
        for order in claims.iter().cloned().permutations(claims.len()) {
            let set = fold(order.into_iter().map(emission));
            assert_eq!(*set.get("g1").unwrap().peak_index(), 1);
        }
    }

    #[test]
    fn test_counters() {
        let mut aggregator = AnnotationAggregator::new();
        aggregator
            .fold(Emission::Peak {
                index: 0,
                name: "a".into(),
                outcome: PeakOutcome::NoNearbyFeatures,
            })
            .fold(Emission::Peak {
                index: 1,
                name: "b".into(),
                outcome: PeakOutcome::Evaluated(vec![
                    GeneCall::new("g1".into(), Verdict::ContainedInGene),
                    GeneCall::new("g2".into(), Verdict::AmbiguousNeighbor),
                    GeneCall::new(
                        "g1".into(),
                        Verdict::PotentialUtrZeroCoverage(record(
                            1,
                            1200,
                            1.0,
                            vec![Flag::ZeroCoverageWarning],
                        )),
                    ),
                ]),
            })
            .fold(Emission::Failed {
                index: 2,
                name: "c".into(),
                error: "boom".into(),
            })
            .fold(Emission::Abandoned {
                batch: 1,
                peaks: vec![(3, "d".into()), (4, "e".into())],
                reason: AbandonReason::Interrupted,
            });

        let set = aggregator.finish();
        let summary = set.summary();
        assert_eq!(*summary.total_peaks(), 5);
        assert_eq!(*summary.no_nearby_features_count(), 1);
        assert_eq!(*summary.zero_coverage_count(), 1);
        assert_eq!(*summary.annotated_count(), 0);
        assert_eq!(*summary.contained(), 1);
        assert_eq!(*summary.ambiguous(), 1);
        assert_eq!(*summary.failed(), 1);
        assert_eq!(*set.abandoned(), 2);
        assert!(*set.interrupted());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_summary_display() {
        let summary = AnnotationSet::default().summary();
        let text = summary.to_string();
        assert!(text.starts_with("total_peaks\t0\n"));
        assert_eq!(text.lines().count(), 9);
    }
}
