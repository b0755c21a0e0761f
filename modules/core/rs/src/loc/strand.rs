use std::fmt::Display;
use std::str::FromStr;

use eyre::{eyre, Report};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[repr(i8)]
pub enum Strand {
    /// The forward strand, also known as the positive strand or Watson strand.
    #[default]
    Forward = 1,
    /// The reverse strand, also known as the negative strand or Crick strand.
    Reverse = -1,
}

impl Strand {
    pub fn flipped(&self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }

    /// Get the symbolic representation of the strand.
    pub fn symbol(&self) -> char {
        match self {
            Self::Forward => '+',
            Self::Reverse => '-',
        }
    }

    /// Human-readable name, used to tag per-strand inputs and outputs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        }
    }

    pub fn both() -> [Strand; 2] {
        [Self::Forward, Self::Reverse]
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl TryFrom<char> for Strand {
    type Error = ();

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            '+' => Ok(Self::Forward),
            '-' => Ok(Self::Reverse),
            _ => Err(()),
        }
    }
}

impl FromStr for Strand {
    type Err = Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "forward" => Ok(Self::Forward),
            "-" | "reverse" => Ok(Self::Reverse),
            _ => Err(eyre!("Unknown strand: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_flipped() {
        assert_eq!(Strand::Forward.flipped(), Strand::Reverse);
        assert_eq!(Strand::Reverse.flipped(), Strand::Forward);
    }

    #[test]
    fn test_strand_display() {
        assert_eq!(format!("{}", Strand::Forward), "+");
        assert_eq!(format!("{}", Strand::Reverse), "-");
        assert_eq!(Strand::Reverse.label(), "reverse");
    }

    #[test]
    fn test_strand_parse() {
        assert_eq!(Strand::try_from('+'), Ok(Strand::Forward));
        assert_eq!(Strand::try_from('x'), Err(()));
        assert_eq!("forward".parse::<Strand>().unwrap(), Strand::Forward);
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Reverse);
        assert!(".".parse::<Strand>().is_err());
    }
}
