use eyre::Result;
use utrex_core_rs::loc::{Interval, IntervalOp, Locus, Strand};

use crate::config::Config;
use crate::evidence::{CoverageEvidence, Evidence};
use crate::features::{FeatureKind, FeatureQuery, GeneFeature};
use crate::peaks::Peak;
use crate::result::{AnnotationRecord, Flag, GeneCall, PeakOutcome, Utr, Verdict};

/// Decides which genes a peak marks the 3' end of.
pub struct UtrDecisionEngine<'a, F: FeatureQuery + ?Sized> {
    config: &'a Config,
    features: &'a F,
}

impl<'a, F: FeatureQuery + ?Sized> UtrDecisionEngine<'a, F> {
    pub fn new(config: &'a Config, features: &'a F) -> Self {
        Self { config, features }
    }

    pub fn decide<E: Evidence>(
        &self,
        peak: &Peak,
        evidence: &mut CoverageEvidence<E>,
    ) -> Result<PeakOutcome> {
        let locus = peak.locus();
        let distance = *self.config.max_distance();
        let window = locus.interval.widened(distance, distance, 0);

        let mut genes = self
            .features
            .query(&locus.contig, window, locus.strand)
            .into_iter()
            .filter(|x| *x.kind() == FeatureKind::Gene)
            .collect::<Vec<_>>();
        if genes.is_empty() {
            log::debug!("{} ({}): no nearby genes", peak.name(), locus);
            return Ok(PeakOutcome::NoNearbyFeatures);
        }
        genes.sort_by(|a, b| {
            a.start()
                .cmp(&b.start())
                .then_with(|| a.end().cmp(&b.end()))
                .then_with(|| a.id().cmp(b.id()))
        });

        let mut calls = Vec::with_capacity(genes.len());
        // Skipped genes (annotated or containing the peak) can't pair up with their successor
        let mut previous: Option<&GeneFeature> = None;
        for (idx, &gene) in genes.iter().enumerate() {
            let next = genes.get(idx + 1).copied();
            let verdict = self.evaluate(peak, gene, previous, next, evidence)?;
            log::debug!("{} ({}) vs {}: {:?}", peak.name(), locus, gene.id(), verdict);

            previous = match verdict {
                Verdict::AlreadyAnnotated | Verdict::ContainedInGene => None,
                _ => Some(gene),
            };
            calls.push(GeneCall::new(gene.id().clone(), verdict));
        }
        Ok(PeakOutcome::Evaluated(calls))
    }

    /// Gene extent with its 5' end pushed out by `five_prime_ext`.
    fn reach(&self, gene: &GeneFeature) -> Interval<u64> {
        let ext = *self.config.five_prime_ext();
        let interval = gene.locus().interval;
        match gene.locus().strand {
            Strand::Forward => interval.widened(ext, 0, 0),
            Strand::Reverse => interval.widened(0, ext, 0),
        }
    }

    fn evaluate<E: Evidence>(
        &self,
        peak: &Peak,
        gene: &GeneFeature,
        previous: Option<&GeneFeature>,
        next: Option<&GeneFeature>,
        evidence: &mut CoverageEvidence<E>,
    ) -> Result<Verdict> {
        let locus = peak.locus();
        let strand = locus.strand;
        let mut flags = Vec::new();

        let mut anchor = match strand {
            Strand::Forward => gene.end(),
            Strand::Reverse => gene.start(),
        };
        let existing = self.features.three_prime_utrs(gene);
        if !existing.is_empty() {
            if *self.config.extend_utr() {
                flags.push(Flag::ExtendedExisting);
                anchor = match strand {
                    Strand::Forward => existing.iter().map(|x| x.end()).fold(anchor, u64::max),
                    Strand::Reverse => existing.iter().map(|x| x.start()).fold(anchor, u64::min),
                };
            } else if !*self.config.override_utr() {
                return Ok(Verdict::AlreadyAnnotated);
            }
        }

        if self.reach(gene).envelops(&locus.interval) {
            return Ok(Verdict::ContainedInGene);
        }

        let bridges = |left: &GeneFeature, right: &GeneFeature| {
            locus.start() < self.reach(left).end() && locus.end() > self.reach(right).start()
        };
        let ambiguous = previous.is_some_and(|prev| bridges(prev, gene))
            || next.is_some_and(|next| bridges(gene, next));
        if ambiguous {
            return Ok(Verdict::AmbiguousNeighbor);
        }

        let full = match strand {
            Strand::Forward if locus.end() > anchor => Interval::new(anchor, locus.end())?,
            Strand::Reverse if locus.start() < anchor => Interval::new(locus.start(), anchor)?,
            _ => return Ok(Verdict::NotDownstream),
        };
        let candidate = Locus::new(locus.contig.clone(), full, strand);

        // Zero-coverage gaps: the one closest to the gene limits the UTR
        let gaps = evidence.zero_coverage_gaps(gene, &candidate, *self.config.min_pileups())?;
        let limit = match strand {
            Strand::Forward => gaps.first().map(|gap| (gap.start() <= anchor, gap.start())),
            Strand::Reverse => gaps.last().map(|gap| (gap.end() >= anchor, gap.end())),
        };
        let mut range = full;
        match limit {
            Some((true, _)) => {
                flags.push(Flag::ZeroCoverageWarning);
                let utr = Utr::new(gene.id().clone(), candidate);
                return Ok(Verdict::PotentialUtrZeroCoverage(self.record(peak, utr, flags)));
            }
            Some((false, point)) => range = truncate(range, strand, point)?,
            None => {}
        }

        if !*self.config.skip_soft_clip() {
            let point =
                evidence.poly_tail_truncation(gene, &candidate, *self.config.min_poly_tail())?;
            if let Some(point) = point {
                range = truncate(range, strand, point)?;
            }
        }

        if range != full {
            flags.push(Flag::Truncated);
        }
        let utr = Utr::new(gene.id().clone(), Locus::new(locus.contig.clone(), range, strand));
        Ok(Verdict::Confirmed(self.record(peak, utr, flags)))
    }

    fn record(&self, peak: &Peak, utr: Utr, flags: Vec<Flag>) -> AnnotationRecord {
        AnnotationRecord::new(
            peak.name().clone(),
            *peak.index(),
            *peak.signal_value(),
            utr,
            flags,
        )
    }
}

/// Cut the far end of a UTR at `point`, keeping the shorter of the two.
fn truncate(range: Interval<u64>, strand: Strand, point: u64) -> Result<Interval<u64>> {
    match strand {
        Strand::Forward => Interval::new(range.start(), range.end().min(point)),
        Strand::Reverse => Interval::new(range.start().max(point), range.end()),
    }
}
