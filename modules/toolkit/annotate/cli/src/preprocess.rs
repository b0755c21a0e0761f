use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use derive_more::{Display, Error};
use eyre::{eyre, Result, WrapErr};
use utrex_core_rs::loc::{PerStrand, Strand};

use crate::cache::Cache;

/// An external tool exited with an error. Its output is kept in `log`.
#[derive(Debug, Display, Error)]
#[display("{tool} failed ({status}), check {}", log.display())]
pub struct CollaboratorError {
    pub tool: String,
    pub status: String,
    pub log: PathBuf,
}

/// Run `program`, appending its stdout and stderr to `log`.
pub fn run_tool<I, A>(program: &str, args: I, log: &Path) -> Result<()>
where
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let file = File::options()
        .create(true)
        .append(true)
        .open(log)
        .wrap_err_with(|| format!("Failed to open {}", log.display()))?;
    let stderr = file.try_clone()?;

    let mut command = Command::new(program);
    command.args(args).stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
    tracing::debug!("Running {command:?}");

    let status = command
        .status()
        .wrap_err_with(|| format!("Failed to launch {program}"))?;
    if !status.success() {
        return Err(CollaboratorError {
            tool: program.to_string(),
            status: status.to_string(),
            log: log.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Strand-specific inputs of the annotation engine.
#[derive(Clone, Debug)]
pub struct StrandInputs {
    pub reads: PathBuf,
    pub peaks: PathBuf,
}

/// Strand splitting and peak calling through external tools, cached between runs.
pub struct Preprocessor<'a> {
    cache: &'a Cache,
    log_dir: PathBuf,
    samtools: String,
    macs: String,
}

impl<'a> Preprocessor<'a> {
    pub fn new(
        cache: &'a Cache,
        log_dir: impl Into<PathBuf>,
        samtools: impl Into<String>,
        macs: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            log_dir: log_dir.into(),
            samtools: samtools.into(),
            macs: macs.into(),
        }
    }

    fn log(&self, strand: Strand, tool: &str) -> PathBuf {
        self.log_dir.join(format!("{}_{tool}.log", strand.label()))
    }

    /// Indexed BAM with the reads of one strand.
    pub fn split(&self, bam: &Path, stem: &str, strand: Strand) -> Result<PathBuf> {
        let name = format!("{stem}.{}.bam", strand.label());
        let log = self.log(strand, "samtools");
        let flag = match strand {
            Strand::Forward => "-F",
            Strand::Reverse => "-f",
        };

        let split = self.cache.fetch_or_build(&name, |staging| {
            tracing::info!("Splitting {} strand reads from {}", strand.label(), bam.display());
            run_tool(
                &self.samtools,
                [
                    OsStr::new("view"),
                    OsStr::new("-b"),
                    OsStr::new(flag),
                    OsStr::new("16"),
                    OsStr::new("-o"),
                    staging.as_os_str(),
                    bam.as_os_str(),
                ],
                &log,
            )
        })?;
        self.cache.fetch_or_build(&format!("{name}.bai"), |staging| {
            run_tool(
                &self.samtools,
                [OsStr::new("index"), split.as_os_str(), staging.as_os_str()],
                &log,
            )
        })?;
        Ok(split)
    }

    /// Broad peaks called on the reads of one strand.
    pub fn call_peaks(&self, reads: &Path, strand: Strand) -> Result<PathBuf> {
        let label = strand.label();
        let name = format!("{label}_peaks.broadPeak");
        let log = self.log(strand, "macs");

        self.cache.fetch_or_build(&name, |staging| {
            tracing::info!("Calling {label} strand peaks with {}", self.macs);
            let outdir = self.cache.path(&format!("{label}_macs"));
            fs::create_dir_all(&outdir)?;
            run_tool(
                &self.macs,
                [
                    OsStr::new("callpeak"),
                    OsStr::new("-t"),
                    reads.as_os_str(),
                    OsStr::new("-n"),
                    OsStr::new(label),
                    OsStr::new("--nomodel"),
                    OsStr::new("--extsize"),
                    OsStr::new("100"),
                    OsStr::new("--broad"),
                    OsStr::new("--outdir"),
                    outdir.as_os_str(),
                ],
                &log,
            )?;
            let called = outdir.join(&name);
            fs::rename(&called, staging)
                .wrap_err_with(|| format!("{} produced no {}", self.macs, called.display()))?;
            tracing::info!("Finished calling {label} strand peaks");
            Ok(())
        })
    }

    /// Split reads by strand and call peaks on both strands concurrently.
    /// Peak calling is skipped for strands with `peaks` given.
    pub fn prepare(
        &self,
        bam: &Path,
        stem: &str,
        peaks: Option<&PerStrand<PathBuf>>,
    ) -> Result<PerStrand<StrandInputs>> {
        thread::scope(|scope| {
            let handles = Strand::both().map(|strand| {
                scope.spawn(move || -> Result<StrandInputs> {
                    let reads = self.split(bam, stem, strand)?;
                    let peaks = match peaks {
                        Some(peaks) => peaks.get(strand).clone(),
                        None => self.call_peaks(&reads, strand)?,
                    };
                    Ok(StrandInputs { reads, peaks })
                })
            });
            let [forward, reverse] = handles.map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(eyre!("Preprocessing thread panicked")))
            });
            Ok(PerStrand::new(forward?, reverse?))
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> Result<String> {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path.to_string_lossy().into_owned())
    }

    #[test]
    fn test_run_tool_failure() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("tool.log");

        let err = run_tool("sh", ["-c", "echo broken input; exit 3"], &log).unwrap_err();
        let collaborator = err.downcast_ref::<CollaboratorError>().unwrap();
        assert_eq!(collaborator.tool, "sh");
        assert_eq!(collaborator.log, log);
        assert!(err.to_string().contains("tool.log"));
        assert_eq!(fs::read_to_string(&log)?, "broken input\n");

        run_tool("sh", ["-c", "echo fine"], &log)?;
        assert_eq!(fs::read_to_string(&log)?, "broken input\nfine\n");
        Ok(())
    }

    #[test]
    fn test_call_peaks() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let macs = script(
            dir.path(),
            "fake-macs",
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    -n) name="$2"; shift ;;
    --outdir) out="$2"; shift ;;
  esac
  shift
done
printf 'chr1\t10\t20\tp1\t5\t.\t2.0\t3.0\t1.0\n' > "$out/${name}_peaks.broadPeak"
echo "called $name""#,
        )?;

        let cache = Cache::new(dir.path().join("cache"), false)?;
        let preprocessor = Preprocessor::new(&cache, dir.path(), "samtools", macs);
        let peaks = preprocessor.call_peaks(Path::new("reads.bam"), Strand::Reverse)?;

        assert_eq!(peaks, cache.path("reverse_peaks.broadPeak"));
        assert!(fs::read_to_string(&peaks)?.contains("p1"));
        assert_eq!(
            fs::read_to_string(dir.path().join("reverse_macs.log"))?,
            "called reverse\n"
        );
        Ok(())
    }

    #[test]
    fn test_failing_peak_caller() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let macs = script(dir.path(), "broken-macs", "echo no reads; exit 1")?;

        let cache = Cache::new(dir.path().join("cache"), false)?;
        let preprocessor = Preprocessor::new(&cache, dir.path(), "samtools", macs);
        let err = preprocessor
            .call_peaks(Path::new("reads.bam"), Strand::Forward)
            .unwrap_err();
        assert!(err.downcast_ref::<CollaboratorError>().is_some());
        assert!(!cache.path("forward_peaks.broadPeak").exists());
        Ok(())
    }
}
