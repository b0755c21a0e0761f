use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use derive_more::{Display, Error};
use eyre::{eyre, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use utrex_annotate_rs::evidence::BamEvidenceSource;
use utrex_annotate_rs::export::{merge_features, utr_features};
use utrex_annotate_rs::{AnnotationSet, BatchAnnotator, FeatureStore, PeakCollection, RunStatus};
use utrex_core_rs::loc::PerStrand;
use utrex_io_rs::gff::{self, GffRecord};
use utrex_io_rs::{ReadRecord, WriteRecord};

use crate::args::{file_stem, Args};
use crate::cache::Cache;
use crate::preprocess::Preprocessor;

#[derive(Debug, Display, Error)]
#[display("Interrupted by user")]
pub struct Interrupted;

#[derive(Debug, Display, Error)]
#[display("{} already exists, re-run with -f to overwrite it", path.display())]
pub struct OutputExists {
    pub path: PathBuf,
}

fn ensure_running(interrupted: &AtomicBool) -> Result<()> {
    if interrupted.load(Ordering::Relaxed) {
        return Err(Interrupted.into());
    }
    Ok(())
}

fn read_gene_model(path: &Path) -> Result<Vec<GffRecord>> {
    info!("Reading gene model from {}", path.display());
    let mut reader = gff::Reader::from_path(path)?;
    let mut records = Vec::new();
    reader
        .read_to_end(&mut records)
        .wrap_err_with(|| format!("Failed to read gene model {}", path.display()))?;
    info!(
        "Read {} records ({:?})",
        records.len(),
        reader.dialect().unwrap_or(gff::Dialect::Gff3)
    );
    Ok(records)
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} peaks ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(200));
    bar
}

fn write_outputs(
    args: &Args,
    output: &Path,
    records: Vec<GffRecord>,
    store: &FeatureStore,
    annotations: &AnnotationSet,
) -> Result<()> {
    let utrs = utr_features(annotations, store);
    info!("Writing {} new 3'UTRs to {}", utrs.len(), output.display());

    let merged = merge_features(records, utrs);
    let mut writer = gff::Writer::from_path(output)?;
    writer.write_records(&merged)?;
    writer
        .flush()
        .wrap_err_with(|| format!("Failed to write {}", output.display()))?;

    let summary = annotations.summary();
    for (key, value) in summary.entries() {
        info!("{key}: {value}");
    }
    if let Some(path) = &args.summary {
        fs::write(path, summary.to_string())
            .wrap_err_with(|| format!("Failed to write summary to {}", path.display()))?;
    }
    Ok(())
}

/// The whole pipeline: checks, preprocessing, annotation and output.
pub fn run(args: &Args) -> Result<RunStatus> {
    // Checks that must pass before anything is run
    let annotator = BatchAnnotator::new(args.config()?)?;
    let output = args.output();
    if output.exists() && !args.force {
        return Err(OutputExists { path: output }.into());
    }

    let interrupted = annotator.interrupt_handle();
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            if interrupted.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            warn!("Interrupt received, stopping");
        })
        .wrap_err("Failed to install the interrupt handler")?;
    }

    let mut cache = Cache::new(&args.cache_dir, args.keep_cache)?;
    let preprocessor = Preprocessor::new(&cache, &args.log_dir, &args.samtools, &args.macs);
    let given = match (&args.forward_peaks, &args.reverse_peaks) {
        (Some(forward), Some(reverse)) => Some(PerStrand::new(forward.clone(), reverse.clone())),
        _ => None,
    };

    // The gene model is read while reads are split and peaks are called
    let prepared = thread::scope(|scope| {
        let model = scope.spawn(|| read_gene_model(&args.gff));
        let inputs = preprocessor.prepare(&args.bam, &file_stem(&args.bam), given.as_ref());
        let model = model
            .join()
            .unwrap_or_else(|_| Err(eyre!("Gene model reader panicked")));
        Ok::<_, eyre::Report>((model, inputs))
    })?;
    ensure_running(&interrupted)?;
    let (records, inputs) = prepared;
    let records = records?;
    let inputs = inputs?;

    let store = FeatureStore::from_records(&records)
        .wrap_err_with(|| format!("Failed to build the feature database from {}", args.gff.display()))?;
    info!("Feature database holds {} features", store.len());

    let peaks = PeakCollection::load(&inputs.forward.peaks, &inputs.reverse.peaks)?;
    let source = BamEvidenceSource::from_split(&inputs.forward.reads, &inputs.reverse.reads);

    info!("Iterating over {} peaks to annotate 3'UTRs", peaks.len());
    let bar = progress_bar(peaks.len());
    let run = annotator.run(peaks, &store, &source, |n| bar.inc(n as u64))?;
    bar.finish_and_clear();

    let (annotations, status) = run.dissolve();
    match status {
        RunStatus::Interrupted => return Ok(status),
        RunStatus::Incomplete => error!(
            "{} peaks were left unprocessed after worker failures",
            annotations.abandoned()
        ),
        RunStatus::Complete => {}
    }
    write_outputs(args, &output, records, &store, &annotations)?;

    cache.teardown()?;
    Ok(status)
}
