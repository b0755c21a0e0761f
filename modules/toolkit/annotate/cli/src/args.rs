use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use eyre::Result;
use utrex_annotate_rs::Config;
use utrex_core_rs::parallelism;

pub const MAX_DISTANCE: u64 = 200;
pub const MIN_PILEUPS: u32 = 10;
pub const MIN_POLY_TAIL: usize = 10;

#[derive(Debug, Parser)]
#[command(
    name = "utrex",
    version,
    about = "Annotate 3'UTR extensions of gene models from strand-specific peak calls"
)]
pub struct Args {
    #[arg(value_name = "GFF_IN", help = "Input gene model in GFF3 or GTF format, plain or gzipped")]
    pub gff: PathBuf,

    #[arg(value_name = "BAM_IN", help = "Input reads, coordinate-sorted BAM")]
    pub bam: PathBuf,

    #[arg(
        long = "max-distance",
        value_name = "BASES",
        default_value_t = MAX_DISTANCE,
        help = "Maximum distance in bases between a peak and the gene it extends"
    )]
    pub max_distance: u64,

    #[arg(long = "override-utr", action = ArgAction::SetTrue, help = "Ignore existing 3'UTR annotations")]
    pub override_utr: bool,

    #[arg(
        long = "extend-utr",
        action = ArgAction::SetTrue,
        help = "Extend existing 3'UTR annotations where possible"
    )]
    pub extend_utr: bool,

    #[arg(
        long = "five-prime-ext",
        value_name = "BASES",
        default_value_t = 0,
        help = "A peak within this many bases of a gene's 5' end is assumed to belong to it"
    )]
    pub five_prime_ext: u64,

    #[arg(
        long = "skip-soft-clip",
        action = ArgAction::SetTrue,
        help = "Skip the poly-A/T search in soft-clipped read ends"
    )]
    pub skip_soft_clip: bool,

    #[arg(
        long = "min-pileups",
        value_name = "READS",
        default_value_t = MIN_PILEUPS,
        help = "Minimum read depth that keeps a UTR going"
    )]
    pub min_pileups: u32,

    #[arg(
        long = "min-poly-tail",
        value_name = "BASES",
        default_value_t = MIN_POLY_TAIL,
        help = "Minimum poly-A/T run in a soft clip"
    )]
    pub min_poly_tail: usize,

    #[arg(
        short = 'p',
        long = "processors",
        value_name = "N",
        default_value_t = 1,
        allow_negative_numbers = true,
        help = "Worker threads: 0 for one, negative to leave |N|-1 cores idle"
    )]
    pub processors: isize,

    #[arg(short = 'f', long = "force", action = ArgAction::SetTrue, help = "Overwrite the output if it exists")]
    pub force: bool,

    #[arg(short = 'o', long = "output", value_name = "PATH", help = "Output GFF3 [default: <GFF_IN stem>.new.gff]")]
    pub output: Option<PathBuf>,

    #[arg(long = "keep-cache", action = ArgAction::SetTrue, help = "Keep cached files after the run")]
    pub keep_cache: bool,

    #[arg(long = "cache-dir", value_name = "DIR", default_value = ".cache")]
    pub cache_dir: PathBuf,

    #[arg(long = "log-dir", value_name = "DIR", default_value = ".log")]
    pub log_dir: PathBuf,

    #[arg(
        long = "forward-peaks",
        value_name = "PATH",
        requires = "reverse_peaks",
        help = "Use these forward strand peaks instead of calling them"
    )]
    pub forward_peaks: Option<PathBuf>,

    #[arg(
        long = "reverse-peaks",
        value_name = "PATH",
        requires = "forward_peaks",
        help = "Use these reverse strand peaks instead of calling them"
    )]
    pub reverse_peaks: Option<PathBuf>,

    #[arg(long = "macs", value_name = "EXE", default_value = "macs3")]
    pub macs: String,

    #[arg(long = "samtools", value_name = "EXE", default_value = "samtools")]
    pub samtools: String,

    #[arg(long = "summary", value_name = "PATH", help = "Also write summary statistics to this file")]
    pub summary: Option<PathBuf>,
}

impl Args {
    pub fn output(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = file_stem(&self.gff);
            PathBuf::from(format!("{stem}.new.gff"))
        })
    }

    pub fn config(&self) -> Result<Config> {
        let mut config = Config::new();
        config
            .set_max_distance(self.max_distance)
            .set_override_utr(self.override_utr)
            .set_extend_utr(self.extend_utr)
            .set_five_prime_ext(self.five_prime_ext)
            .set_min_pileups(self.min_pileups)
            .set_min_poly_tail(self.min_poly_tail)
            .set_skip_soft_clip(self.skip_soft_clip)
            .set_processors(parallelism::available(self.processors)?);
        Ok(config)
    }
}

/// File name without directories and without compression or format extensions.
pub fn file_stem(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    for ext in [".gz", ".gff3", ".gff", ".gtf", ".bam"] {
        if let Some(stripped) = name.strip_suffix(ext) {
            name = stripped.to_string();
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let args = Args::try_parse_from(["utrex", "data/genes.gff3.gz", "reads.bam"])?;
        assert_eq!(args.output(), PathBuf::from("genes.new.gff"));
        assert_eq!(args.cache_dir, PathBuf::from(".cache"));

        let config = args.config()?;
        assert_eq!(*config.max_distance(), MAX_DISTANCE);
        assert_eq!(*config.min_pileups(), MIN_PILEUPS);
        assert_eq!(*config.processors(), 1);
        assert_eq!(*config.five_prime_ext(), 0);
        Ok(())
    }

    #[test]
    fn test_five_prime_ext() -> Result<()> {
        let args = Args::try_parse_from(["utrex", "a.gff", "b.bam", "--five-prime-ext", "150"])?;
        assert_eq!(*args.config()?.five_prime_ext(), 150);
        Ok(())
    }

    #[test]
    fn test_peaks_come_in_pairs() {
        let args = Args::try_parse_from(["utrex", "a.gff", "b.bam", "--forward-peaks", "f.broadPeak"]);
        assert!(args.is_err());

        let args = Args::try_parse_from([
            "utrex",
            "a.gff",
            "b.bam",
            "--forward-peaks",
            "f.broadPeak",
            "--reverse-peaks",
            "r.broadPeak",
            "-p",
            "-1",
        ]);
        assert!(args.is_ok());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/x/y/genes.gtf")), "genes");
        assert_eq!(file_stem(Path::new("reads.sorted.bam")), "reads.sorted");
        assert_eq!(file_stem(Path::new("model.txt")), "model.txt");
    }
}
