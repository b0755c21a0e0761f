//! Conversion of the annotation set into GFF3 records.

use itertools::Itertools;
use utrex_core_rs::loc::IntervalOp;
use utrex_io_rs::gff::GffRecord;

use crate::aggregate::AnnotationSet;
use crate::features::{FeatureKind, FeatureStore};
use crate::result::Flag;

pub const SOURCE: &str = "utrex";
pub const FEATURE_TYPE: &str = "three_prime_UTR";

/// One `three_prime_UTR` record per annotated gene. Zero-coverage warnings are not exported.
pub fn utr_features(annotations: &AnnotationSet, store: &FeatureStore) -> Vec<GffRecord> {
    let mut records = Vec::with_capacity(annotations.len());
    for annotation in annotations.iter() {
        if annotation.is_flagged(Flag::ZeroCoverageWarning) {
            continue;
        }

        let locus = annotation.utr().locus();
        let mut record = GffRecord::new(
            locus.contig.clone(),
            SOURCE.to_string(),
            FEATURE_TYPE.to_string(),
            locus.interval,
            Some(locus.strand),
        );

        let gene_id = annotation.gene_id();
        match store.gene(gene_id) {
            Some(gene) => {
                for (key, values) in gene.attributes() {
                    record.set_attribute(key, values.clone());
                }
            }
            None => log::warn!("Gene {gene_id} is missing from the feature store"),
        }

        record
            .set_attribute("ID", vec![format!("{gene_id}_UTR")])
            .set_attribute("Parent", vec![gene_id.clone()])
            .set_attribute("colour", vec!["3".to_string()])
            .set_attribute("peak", vec![annotation.peak().clone()]);
        if !annotation.flags().is_empty() {
            let flags = annotation.flags().iter().map(|x| x.label().to_string()).collect();
            record.set_attribute("utr_flags", flags);
        }
        records.push(record);
    }
    records
}

/// Combine the input gene model with new UTR records, sorted by position and feature type.
pub fn merge_features(input: Vec<GffRecord>, utrs: Vec<GffRecord>) -> Vec<GffRecord> {
    input
        .into_iter()
        .chain(utrs)
        .sorted_by(|a, b| {
            a.seqid()
                .cmp(b.seqid())
                .then_with(|| a.interval().start().cmp(&b.interval().start()))
                .then_with(|| a.interval().end().cmp(&b.interval().end()))
                .then_with(|| {
                    FeatureKind::parse(a.feature_type()).cmp(&FeatureKind::parse(b.feature_type()))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AnnotationAggregator;
    use crate::features::GeneFeature;
    use crate::result::{AnnotationRecord, Emission, GeneCall, PeakOutcome, Utr, Verdict};
    use utrex_core_rs::loc::{Interval, Locus, Strand};

    fn store() -> FeatureStore {
        FeatureStore::from_features(vec![GeneFeature::new(
            "g1",
            Locus::try_new("chr1".to_string(), 100, 1000, Strand::Forward).unwrap(),
            FeatureKind::Gene,
            None,
            vec![
                ("ID".to_string(), vec!["g1".to_string()]),
                ("Name".to_string(), vec!["Abc1".to_string()]),
            ],
        )])
    }

    fn annotations(verdicts: Vec<Verdict>) -> AnnotationSet {
        let mut aggregator = AnnotationAggregator::new();
        for (index, verdict) in verdicts.into_iter().enumerate() {
            aggregator.fold(Emission::Peak {
                index,
                name: format!("peak_{index}"),
                outcome: PeakOutcome::Evaluated(vec![GeneCall::new("g1".into(), verdict)]),
            });
        }
        aggregator.finish()
    }

    fn record(end: u64, flags: Vec<Flag>) -> AnnotationRecord {
        let locus = Locus::try_new("chr1".to_string(), 1000, end, Strand::Forward).unwrap();
        AnnotationRecord::new("peak_0", 0, 1.0, Utr::new("g1".into(), locus), flags)
    }

    #[test]
    fn test_utr_features() {
        let set = annotations(vec![Verdict::Confirmed(record(1200, vec![Flag::Truncated]))]);
        let records = utr_features(&set, &store());
        assert_eq!(records.len(), 1);

        let utr = &records[0];
        assert_eq!(utr.feature_type(), FEATURE_TYPE);
        assert_eq!(utr.source(), SOURCE);
        assert_eq!(*utr.interval(), Interval::new(1000, 1200).unwrap());
        assert_eq!(*utr.strand(), Some(Strand::Forward));
        assert_eq!(utr.first("ID"), Some("g1_UTR"));
        assert_eq!(utr.first("Parent"), Some("g1"));
        assert_eq!(utr.first("Name"), Some("Abc1"));
        assert_eq!(utr.first("colour"), Some("3"));
        assert_eq!(utr.first("peak"), Some("peak_0"));
        assert_eq!(utr.first("utr_flags"), Some("truncated"));
    }

    #[test]
    fn test_zero_coverage_not_exported() {
        let set = annotations(vec![Verdict::PotentialUtrZeroCoverage(record(
            1200,
            vec![Flag::ZeroCoverageWarning],
        ))]);
        assert_eq!(set.len(), 1);
        assert!(utr_features(&set, &store()).is_empty());
    }

    #[test]
    fn test_merge_order() {
        let gff = |seqid: &str, kind: &str, start: u64, end: u64| {
            GffRecord::new(
                seqid.to_string(),
                "src".to_string(),
                kind.to_string(),
                Interval::new(start, end).unwrap(),
                Some(Strand::Forward),
            )
        };
        let merged = merge_features(
            vec![gff("chr2", "gene", 0, 10), gff("chr1", "exon", 100, 200), gff("chr1", "gene", 100, 200)],
            vec![gff("chr1", FEATURE_TYPE, 50, 60)],
        );
        let order = merged
            .iter()
            .map(|x| (x.seqid().as_str(), x.feature_type().as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                ("chr1", FEATURE_TYPE),
                ("chr1", "gene"),
                ("chr1", "exon"),
                ("chr2", "gene")
            ]
        );
    }
}
