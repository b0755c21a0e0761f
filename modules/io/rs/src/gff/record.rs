use derive_getters::{Dissolve, Getters};
use utrex_core_rs::loc::{Interval, Strand};

#[derive(Clone, PartialEq, Debug, Default, Getters, Dissolve)]
pub struct GffRecord {
    pub(crate) seqid: String,
    pub(crate) source: String,
    pub(crate) feature_type: String,
    pub(crate) interval: Interval<u64>,
    pub(crate) score: Option<f64>,
    pub(crate) strand: Option<Strand>,
    pub(crate) phase: Option<u8>,
    /// Attributes in file order. Multi-valued GFF3 attributes keep every value.
    pub(crate) attributes: Vec<(String, Vec<String>)>,
}

impl GffRecord {
    pub fn new(
        seqid: String,
        source: String,
        feature_type: String,
        interval: Interval<u64>,
        strand: Option<Strand>,
    ) -> Self {
        Self {
            seqid,
            source,
            feature_type,
            interval,
            score: None,
            strand,
            phase: None,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First value of the attribute, if present.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.attribute(key)
            .and_then(|x| x.first())
            .map(String::as_str)
    }

    /// Replace the attribute values or append the attribute if it is missing.
    pub fn set_attribute(&mut self, key: &str, values: Vec<String>) -> &mut Self {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = values,
            None => self.attributes.push((key.to_string(), values)),
        }
        self
    }

    pub fn set_source(&mut self, source: String) -> &mut Self {
        self.source = source;
        self
    }

    pub fn set_score(&mut self, score: Option<f64>) -> &mut Self {
        self.score = score;
        self
    }

    pub fn set_phase(&mut self, phase: Option<u8>) -> &mut Self {
        self.phase = phase;
        self
    }
}
