use derive_getters::{Dissolve, Getters};
use utrex_core_rs::loc::Interval;

/// A single called peak. Coordinates are 0-based half-open, as stored in the file.
#[derive(Clone, PartialEq, Debug, Default, Getters, Dissolve)]
pub struct PeakRecord {
    pub(crate) seqid: String,
    pub(crate) interval: Interval<u64>,
    pub(crate) name: String,
    pub(crate) score: u32,
    pub(crate) signal_value: f64,
    pub(crate) p_value: f64,
    pub(crate) q_value: f64,
    /// Summit offset from the peak start, narrowPeak only.
    pub(crate) summit: Option<u64>,
}

impl PeakRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seqid: String,
        interval: Interval<u64>,
        name: String,
        score: u32,
        signal_value: f64,
        p_value: f64,
        q_value: f64,
        summit: Option<u64>,
    ) -> Self {
        Self {
            seqid,
            interval,
            name,
            score,
            signal_value,
            p_value,
            q_value,
            summit,
        }
    }
}
