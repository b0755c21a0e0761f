use std::any::Any;
use std::iter;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use crate::decision::UtrDecisionEngine;
use crate::evidence::{CoverageEvidence, EvidenceSource};
use crate::features::FeatureQuery;
use crate::peaks::{Peak, PeakCollection};
use crate::result::{AbandonReason, Emission};

/// Runs the decision engine over one batch of peaks and streams one emission per peak.
pub(crate) struct Worker<'a, F: FeatureQuery + ?Sized, S: EvidenceSource> {
    batch: usize,
    engine: UtrDecisionEngine<'a, F>,
    source: &'a S,
    interrupted: &'a AtomicBool,
    tx: Sender<Emission>,
}

impl<'a, F: FeatureQuery + ?Sized, S: EvidenceSource> Worker<'a, F, S> {
    pub fn new(
        batch: usize,
        engine: UtrDecisionEngine<'a, F>,
        source: &'a S,
        interrupted: &'a AtomicBool,
        tx: Sender<Emission>,
    ) -> Self {
        Self {
            batch,
            engine,
            source,
            interrupted,
            tx,
        }
    }

    pub fn run(self, peaks: PeakCollection) {
        log::debug!("Batch {}: {} peaks", self.batch, peaks.len());
        let mut peaks = peaks.into_iter();

        let mut evidence = match self.source.open() {
            Ok(evidence) => CoverageEvidence::new(evidence),
            Err(err) => {
                log::error!("Batch {}: failed to open read evidence: {err:#}", self.batch);
                self.abandon(peaks, AbandonReason::WorkerFailure(format!("{err:#}")));
                return;
            }
        };

        while let Some(peak) = peaks.next() {
            if self.interrupted.load(Ordering::Relaxed) {
                self.abandon(iter::once(peak).chain(peaks), AbandonReason::Interrupted);
                return;
            }

            let result = catch_unwind(AssertUnwindSafe(|| self.engine.decide(&peak, &mut evidence)));
            let (emission, panicked) = match result {
                Ok(Ok(outcome)) => (
                    Emission::Peak {
                        index: *peak.index(),
                        name: peak.name().clone(),
                        outcome,
                    },
                    false,
                ),
                Ok(Err(err)) => {
                    log::error!("Failed to annotate peak {} ({}): {err:#}", peak.name(), peak.locus());
                    (failed(&peak, format!("{err:#}")), false)
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    log::error!("Panic while annotating peak {} ({}): {message}", peak.name(), peak.locus());
                    (failed(&peak, message), true)
                }
            };
            if self.tx.send(emission).is_err() {
                // The receiving side is gone, nobody is left to report to
                return;
            }

            if panicked {
                match self.source.open() {
                    Ok(reopened) => evidence = CoverageEvidence::new(reopened),
                    Err(err) => {
                        log::error!("Batch {}: failed to reopen read evidence: {err:#}", self.batch);
                        self.abandon(peaks, AbandonReason::WorkerFailure(format!("{err:#}")));
                        return;
                    }
                }
            }
        }
        log::debug!("Batch {}: done", self.batch);
    }

    fn abandon(&self, remaining: impl Iterator<Item = Peak>, reason: AbandonReason) {
        let peaks = remaining
            .map(|x| (*x.index(), x.name().clone()))
            .collect::<Vec<_>>();
        if peaks.is_empty() {
            return;
        }
        log::warn!(
            "Batch {}: {} peaks left unprocessed ({:?})",
            self.batch,
            peaks.len(),
            reason
        );
        let _ = self.tx.send(Emission::Abandoned {
            batch: self.batch,
            peaks,
            reason,
        });
    }
}

fn failed(peak: &Peak, error: String) -> Emission {
    Emission::Failed {
        index: *peak.index(),
        name: peak.name().clone(),
        error,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
