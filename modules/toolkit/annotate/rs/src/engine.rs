use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use derive_getters::{Dissolve, Getters};
use eyre::{Result, WrapErr};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::aggregate::{AnnotationAggregator, AnnotationSet};
use crate::config::Config;
use crate::decision::UtrDecisionEngine;
use crate::evidence::EvidenceSource;
use crate::features::FeatureQuery;
use crate::peaks::PeakCollection;
use crate::worker::Worker;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunStatus {
    Complete,
    /// Some batches were abandoned after a worker failure.
    Incomplete,
    Interrupted,
}

#[derive(Clone, PartialEq, Debug, Getters, Dissolve)]
pub struct Run {
    annotations: AnnotationSet,
    status: RunStatus,
}

/// Fans the decision engine out over disjoint peak batches on a fixed thread pool.
pub struct BatchAnnotator {
    config: Config,
    pool: ThreadPool,
    interrupted: Arc<AtomicBool>,
}

impl BatchAnnotator {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(*config.processors())
            .thread_name(|ind| format!("utrex-worker-{ind}"))
            .build()
            .wrap_err("Failed to start the worker pool")?;
        Ok(Self {
            config,
            pool,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Setting the returned flag makes workers abandon their remaining peaks.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Annotate all peaks. `progress` is called on the calling thread with the number of peaks
    /// covered by every emission received.
    pub fn run<F, S>(
        &self,
        peaks: PeakCollection,
        features: &F,
        source: &S,
        mut progress: impl FnMut(usize),
    ) -> Result<Run>
    where
        F: FeatureQuery + ?Sized,
        S: EvidenceSource,
    {
        let total = peaks.len();
        let batches = peaks.partition_into(*self.config.processors());
        log::info!(
            "Annotating {} peaks in {} batches on {} threads",
            total,
            batches.len(),
            self.pool.current_num_threads()
        );

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut aggregator = AnnotationAggregator::new();
        self.pool.in_place_scope(|scope| {
            for (batch, peaks) in batches.into_iter().enumerate() {
                let engine = UtrDecisionEngine::new(&self.config, features);
                let worker = Worker::new(batch, engine, source, &self.interrupted, tx.clone());
                scope.spawn(move |_| worker.run(peaks));
            }
            // Only workers hold senders now: the loop ends once every batch is done
            drop(tx);

            for emission in rx.iter() {
                progress(emission.peaks());
                aggregator.fold(emission);
            }
        });

        let annotations = aggregator.finish();
        if *annotations.total_peaks() != total {
            log::warn!(
                "{} of {} peaks were reported by the workers",
                annotations.total_peaks(),
                total
            );
        }

        let status = if *annotations.interrupted() || self.interrupted.load(Ordering::Relaxed) {
            RunStatus::Interrupted
        } else if *annotations.abandoned() > 0 {
            RunStatus::Incomplete
        } else {
            RunStatus::Complete
        };
        Ok(Run {
            annotations,
            status,
        })
    }
}
