use derive_getters::{Dissolve, Getters};
use derive_more::{Display, Error};
use eyre::Result;

/// Invalid combination of annotation settings, detected before any peak is processed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, Error)]
pub enum ConfigError {
    #[display("--override-utr and --extend-utr are mutually exclusive")]
    OverrideAndExtend,
    #[display("At least one processor is required")]
    NoProcessors,
}

#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve)]
pub struct Config {
    /// Distance around a peak searched for genes.
    max_distance: u64,
    /// Ignore existing 3'UTR annotations.
    override_utr: bool,
    /// Lengthen existing 3'UTR annotations instead of skipping their genes.
    extend_utr: bool,
    /// A peak this close to a gene's 5' end is taken to belong to that gene.
    five_prime_ext: u64,
    /// Positions covered by fewer reads are treated as zero coverage.
    min_pileups: u32,
    /// Minimum poly-A/T run in a soft clip that marks a polyadenylation site.
    min_poly_tail: usize,
    skip_soft_clip: bool,
    processors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_distance: 200,
            override_utr: false,
            extend_utr: false,
            five_prime_ext: 0,
            min_pileups: 10,
            min_poly_tail: 10,
            skip_soft_clip: false,
            processors: 1,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_distance(&mut self, max_distance: u64) -> &mut Self {
        self.max_distance = max_distance;
        self
    }

    pub fn set_override_utr(&mut self, override_utr: bool) -> &mut Self {
        self.override_utr = override_utr;
        self
    }

    pub fn set_extend_utr(&mut self, extend_utr: bool) -> &mut Self {
        self.extend_utr = extend_utr;
        self
    }

    pub fn set_five_prime_ext(&mut self, five_prime_ext: u64) -> &mut Self {
        self.five_prime_ext = five_prime_ext;
        self
    }

    pub fn set_min_pileups(&mut self, min_pileups: u32) -> &mut Self {
        self.min_pileups = min_pileups;
        self
    }

    pub fn set_min_poly_tail(&mut self, min_poly_tail: usize) -> &mut Self {
        self.min_poly_tail = min_poly_tail;
        self
    }

    pub fn set_skip_soft_clip(&mut self, skip_soft_clip: bool) -> &mut Self {
        self.skip_soft_clip = skip_soft_clip;
        self
    }

    pub fn set_processors(&mut self, processors: usize) -> &mut Self {
        self.processors = processors;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.override_utr && self.extend_utr {
            return Err(ConfigError::OverrideAndExtend.into());
        }
        if self.processors == 0 {
            return Err(ConfigError::NoProcessors.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(*config.max_distance(), 200);
        assert_eq!(*config.five_prime_ext(), 0);
        assert_eq!(*config.min_pileups(), 10);
        assert_eq!(*config.min_poly_tail(), 10);
        assert_eq!(*config.processors(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_override_and_extend_are_exclusive() {
        let mut config = Config::new();
        config.set_override_utr(true).set_extend_utr(true);

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::OverrideAndExtend)
        );

        config.set_extend_utr(false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_processors_rejected() {
        let mut config = Config::new();
        config.set_processors(0);
        assert!(config.validate().is_err());
    }
}
