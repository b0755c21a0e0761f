use derive_getters::Dissolve;
use derive_more::Constructor;
use eyre::Result;

use super::strand::Strand;

/// A struct that holds data for each strand.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Dissolve, Constructor,
)]
pub struct PerStrand<T> {
    pub forward: T,
    pub reverse: T,
}

impl<T> PerStrand<T> {
    pub fn get(&self, strand: Strand) -> &T {
        match strand {
            Strand::Forward => &self.forward,
            Strand::Reverse => &self.reverse,
        }
    }

    pub fn get_mut(&mut self, strand: Strand) -> &mut T {
        match strand {
            Strand::Forward => &mut self.forward,
            Strand::Reverse => &mut self.reverse,
        }
    }

    /// Build both sides from a fallible per-strand constructor, forward first.
    pub fn try_from_fn(mut f: impl FnMut(Strand) -> Result<T>) -> Result<Self> {
        Ok(Self {
            forward: f(Strand::Forward)?,
            reverse: f(Strand::Reverse)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strand, &T)> {
        [(Strand::Forward, &self.forward), (Strand::Reverse, &self.reverse)].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_strand_access() -> Result<()> {
        let mut data = PerStrand::try_from_fn(|s| Ok(s.label().to_string()))?;
        assert_eq!(data.get(Strand::Reverse), "reverse");

        data.get_mut(Strand::Forward).push('!');
        assert_eq!(
            data.iter().map(|(_, x)| x.as_str()).collect::<Vec<_>>(),
            vec!["forward!", "reverse"]
        );
        Ok(())
    }
}
