use ahash::{HashMap, HashMapExt};
use derive_getters::{Dissolve, Getters};
use eyre::Result;
use utrex_collections_rs::genomic_index::GenomicIndex;
use utrex_core_rs::loc::{Interval, IntervalOp, Locus, Strand};
use utrex_io_rs::gff::GffRecord;

use crate::GenomicInterval;

/// Normalized feature type. The declaration order is the tie-break order used by queries.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum FeatureKind {
    Gene,
    Transcript,
    Exon,
    Cds,
    ThreePrimeUtr,
    FivePrimeUtr,
    Other,
}

impl FeatureKind {
    pub fn parse(feature_type: &str) -> Self {
        match feature_type.to_ascii_lowercase().as_str() {
            "gene" | "protein_coding_gene" | "ncrna_gene" => Self::Gene,
            "transcript" | "mrna" | "primary_transcript" | "ncrna" | "lnc_rna" => Self::Transcript,
            "exon" => Self::Exon,
            "cds" => Self::Cds,
            "three_prime_utr" | "3utr" | "3'utr" | "3'-utr" | "utr3" => Self::ThreePrimeUtr,
            "five_prime_utr" | "5utr" | "5'utr" | "5'-utr" | "utr5" => Self::FivePrimeUtr,
            _ => Self::Other,
        }
    }
}

/// A stranded feature of the gene model.
#[derive(Clone, PartialEq, Debug, Getters, Dissolve)]
pub struct GeneFeature {
    id: String,
    locus: GenomicInterval,
    kind: FeatureKind,
    /// Identifier of the owning gene; genes own themselves.
    gene: Option<String>,
    attributes: Vec<(String, Vec<String>)>,
}

impl GeneFeature {
    pub fn new(
        id: impl Into<String>,
        locus: GenomicInterval,
        kind: FeatureKind,
        gene: Option<String>,
        attributes: Vec<(String, Vec<String>)>,
    ) -> Self {
        let id = id.into();
        let gene = match kind {
            FeatureKind::Gene => Some(id.clone()),
            _ => gene,
        };
        Self {
            id,
            locus,
            kind,
            gene,
            attributes,
        }
    }

    pub fn start(&self) -> u64 {
        self.locus.start()
    }

    pub fn end(&self) -> u64 {
        self.locus.end()
    }
}

/// Read-only lookup of gene-model features around a region.
pub trait FeatureQuery: Sync {
    /// Features on `strand` of `contig` intersecting `interval`, ordered by start and then
    /// by [`FeatureKind`].
    fn query(&self, contig: &str, interval: Interval<u64>, strand: Strand) -> Vec<&GeneFeature>;

    /// Existing 3'UTRs of the gene: the ones it owns wherever they lie, plus unowned
    /// 3'UTRs overlapping it on its strand.
    fn three_prime_utrs(&self, gene: &GeneFeature) -> Vec<&GeneFeature>;
}

/// In-memory feature database backed by a strand-aware interval index.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    features: Vec<GeneFeature>,
    index: GenomicIndex<String, u64, usize>,
    genes: HashMap<String, usize>,
    /// 3'UTR indices per owning gene.
    utrs: HashMap<String, Vec<usize>>,
}

impl FeatureStore {
    pub fn from_features(features: Vec<GeneFeature>) -> Self {
        let mut builder = GenomicIndex::builder();
        let mut genes = HashMap::new();
        let mut utrs: HashMap<String, Vec<usize>> = HashMap::new();
        for (ind, feature) in features.iter().enumerate() {
            builder.add(
                feature.locus.contig.clone(),
                feature.locus.strand,
                feature.locus.interval,
                ind,
            );
            match (feature.kind, &feature.gene) {
                (FeatureKind::Gene, _) => {
                    genes.entry(feature.id.clone()).or_insert(ind);
                }
                (FeatureKind::ThreePrimeUtr, Some(owner)) => {
                    utrs.entry(owner.clone()).or_default().push(ind);
                }
                _ => {}
            }
        }

        Self {
            features,
            index: builder.build(),
            genes,
            utrs,
        }
    }

    /// Build the store from GFF3 or GTF records.
    ///
    /// GFF3 features are identified by `ID` and linked to their gene through the `Parent` chain.
    /// GTF features are linked through `gene_id`; genes without their own line get an extent
    /// spanning every record that names them.
    pub fn from_records(records: &[GffRecord]) -> Result<Self> {
        let mut features = Vec::with_capacity(records.len());
        let mut taken: HashMap<String, usize> = HashMap::new();
        let mut parents: HashMap<String, (FeatureKind, Option<String>)> = HashMap::new();

        for record in records {
            let kind = FeatureKind::parse(record.feature_type());
            let id = match (record.first("ID"), kind) {
                (Some(id), _) => Some(id.to_string()),
                (None, FeatureKind::Gene) => record.first("gene_id").map(str::to_string),
                (None, FeatureKind::Transcript) => record.first("transcript_id").map(str::to_string),
                (None, _) => None,
            };
            if let Some(id) = &id {
                parents
                    .entry(id.clone())
                    .or_insert_with(|| (kind, record.first("Parent").map(str::to_string)));
            }

            let Some(strand) = *record.strand() else {
                log::debug!(
                    "Skipping unstranded {} feature at {}:{}",
                    record.feature_type(),
                    record.seqid(),
                    record.interval()
                );
                continue;
            };

            let mut id = id.unwrap_or_else(|| {
                format!(
                    "{}:{}:{}-{}",
                    record.feature_type(),
                    record.seqid(),
                    record.interval().start() + 1,
                    record.interval().end()
                )
            });
            let copies = taken.entry(id.clone()).or_insert(0);
            *copies += 1;
            if *copies > 1 {
                id = format!("{id}.{copies}");
            }

            let locus = Locus::new(record.seqid().clone(), *record.interval(), strand);
            let gene = record
                .first("Parent")
                .map(str::to_string)
                .or_else(|| record.first("gene_id").map(str::to_string));
            features.push(GeneFeature::new(
                id,
                locus,
                kind,
                gene,
                record.attributes().clone(),
            ));
        }

        // Resolve owning genes through the Parent chain
        for feature in features.iter_mut().filter(|x| x.kind != FeatureKind::Gene) {
            feature.gene = resolve_gene(feature.gene.take(), &parents);
        }

        let mut store_features = features;
        store_features.extend(infer_missing_genes(&store_features));
        Ok(Self::from_features(store_features))
    }

    pub fn gene(&self, id: &str) -> Option<&GeneFeature> {
        self.genes.get(id).map(|ind| &self.features[*ind])
    }

    pub fn features(&self) -> &[GeneFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn resolve_gene(
    mut current: Option<String>,
    parents: &HashMap<String, (FeatureKind, Option<String>)>,
) -> Option<String> {
    // Gene models are shallow; the bound only guards against cyclic Parent links.
    for _ in 0..16 {
        let id = current?;
        match parents.get(&id) {
            Some((FeatureKind::Gene, _)) => return Some(id),
            Some((_, Some(parent))) => current = Some(parent.clone()),
            // Unknown ids are kept as is: for GTF they are gene_id values
            Some((_, None)) | None => return Some(id),
        }
    }
    None
}

fn infer_missing_genes(features: &[GeneFeature]) -> Vec<GeneFeature> {
    let known = features
        .iter()
        .filter(|x| x.kind == FeatureKind::Gene)
        .map(|x| x.id.as_str())
        .collect::<ahash::HashSet<_>>();

    let mut extents: Vec<(String, GenomicInterval, Vec<(String, Vec<String>)>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for feature in features {
        let Some(gene) = feature.gene.as_ref() else {
            continue;
        };
        if known.contains(gene.as_str()) || feature.attributes.iter().all(|(k, _)| k != "gene_id") {
            continue;
        }

        match positions.get(gene) {
            Some(ind) => {
                let locus = &mut extents[*ind].1;
                if locus.contig == feature.locus.contig && locus.strand == feature.locus.strand {
                    let start = locus.start().min(feature.start());
                    let end = locus.end().max(feature.end());
                    locus.interval = Interval::new(start, end).unwrap_or(locus.interval);
                }
            }
            None => {
                let mut attributes = vec![("gene_id".to_string(), vec![gene.clone()])];
                for key in ["gene_name", "gene_biotype", "gene_type"] {
                    if let Some((k, v)) = feature.attributes.iter().find(|(k, _)| k == key) {
                        attributes.push((k.clone(), v.clone()));
                    }
                }
                positions.insert(gene.clone(), extents.len());
                extents.push((gene.clone(), feature.locus.clone(), attributes));
            }
        }
    }

    extents
        .into_iter()
        .map(|(id, locus, attributes)| {
            GeneFeature::new(id, locus, FeatureKind::Gene, None, attributes)
        })
        .collect()
}

impl FeatureQuery for FeatureStore {
    fn query(&self, contig: &str, interval: Interval<u64>, strand: Strand) -> Vec<&GeneFeature> {
        let mut hits = self
            .index
            .overlap(contig, strand, interval)
            .map(|(_, ind)| &self.features[*ind])
            .collect::<Vec<_>>();
        hits.sort_by_key(|x| (x.start(), x.kind));
        hits
    }

    fn three_prime_utrs(&self, gene: &GeneFeature) -> Vec<&GeneFeature> {
        let locus = gene.locus();
        let owned = self
            .utrs
            .get(&gene.id)
            .into_iter()
            .flatten()
            .map(|ind| &self.features[*ind]);
        let unowned = self
            .index
            .overlap(&locus.contig, locus.strand, locus.interval)
            .map(|(_, ind)| &self.features[*ind])
            .filter(|x| x.kind == FeatureKind::ThreePrimeUtr && x.gene.is_none());

        let mut hits = owned.chain(unowned).collect::<Vec<_>>();
        hits.sort_by_key(|x| (x.start(), x.end()));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use utrex_io_rs::gff::Reader;
    use utrex_io_rs::ReadRecord;

    fn records(content: &str) -> Result<Vec<GffRecord>> {
        let mut reader = Reader::new(Cursor::new(content.to_string()));
        let mut records = Vec::new();
        reader.read_to_end(&mut records)?;
        Ok(records)
    }

    #[test]
    fn test_feature_kind() {
        assert_eq!(FeatureKind::parse("gene"), FeatureKind::Gene);
        assert_eq!(FeatureKind::parse("mRNA"), FeatureKind::Transcript);
        assert_eq!(FeatureKind::parse("three_prime_UTR"), FeatureKind::ThreePrimeUtr);
        assert_eq!(FeatureKind::parse("3UTR"), FeatureKind::ThreePrimeUtr);
        assert_eq!(FeatureKind::parse("5'UTR"), FeatureKind::FivePrimeUtr);
        assert_eq!(FeatureKind::parse("repeat_region"), FeatureKind::Other);
        assert!(FeatureKind::Gene < FeatureKind::Exon && FeatureKind::Exon < FeatureKind::ThreePrimeUtr);
    }

    #[test]
    fn test_gff3_parent_chain() -> Result<()> {
        let store = FeatureStore::from_records(&records(
            "chr1\ts\tgene\t101\t1000\t.\t+\t.\tID=g1\n\
             chr1\ts\tmRNA\t101\t1000\t.\t+\t.\tID=t1;Parent=g1\n\
             chr1\ts\texon\t101\t500\t.\t+\t.\tParent=t1\n\
             chr1\ts\tthree_prime_UTR\t901\t1000\t.\t+\t.\tParent=t1\n\
             chr1\ts\tgene\t2001\t3000\t.\t-\t.\tID=g2\n\
             chr1\ts\tregion\t1\t5000\t.\t.\t.\tID=r1\n",
        )?)?;
        assert_eq!(store.len(), 5);
        assert_eq!(store.gene("g1").map(|x| x.end()), Some(1000));

        let hits = store.query("chr1", Interval::new(0, 5000)?, Strand::Forward);
        let kinds = hits.iter().map(|x| *x.kind()).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                FeatureKind::Gene,
                FeatureKind::Transcript,
                FeatureKind::Exon,
                FeatureKind::ThreePrimeUtr
            ]
        );
        assert!(hits.iter().all(|x| x.gene().as_deref() == Some("g1")));

        let hits = store.query("chr1", Interval::new(0, 5000)?, Strand::Reverse);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "g2");
        Ok(())
    }

    #[test]
    fn test_gtf_gene_inference() -> Result<()> {
        let store = FeatureStore::from_records(&records(
            "chr2\ts\texon\t11\t20\t.\t-\t.\tgene_id \"g1\"; transcript_id \"t1\"; gene_name \"Abc\";\n\
             chr2\ts\texon\t51\t80\t.\t-\t.\tgene_id \"g1\"; transcript_id \"t1\";\n\
             chr2\ts\t3UTR\t11\t15\t.\t-\t.\tgene_id \"g1\"; transcript_id \"t1\";\n",
        )?)?;

        let gene = store.gene("g1").expect("inferred gene");
        assert_eq!(gene.locus().interval, Interval::new(10, 80)?);
        assert_eq!(gene.locus().strand, Strand::Reverse);
        assert!(gene.attributes().iter().any(|(k, v)| k == "gene_name" && v[0] == "Abc"));

        let utrs = store
            .query("chr2", Interval::new(0, 100)?, Strand::Reverse)
            .into_iter()
            .filter(|x| *x.kind() == FeatureKind::ThreePrimeUtr)
            .collect::<Vec<_>>();
        assert_eq!(utrs.len(), 1);
        assert_eq!(utrs[0].gene().as_deref(), Some("g1"));
        Ok(())
    }

    #[test]
    fn test_three_prime_utrs_by_owner() -> Result<()> {
        let store = FeatureStore::from_records(&records(
            "chr1\ts\tgene\t101\t1000\t.\t+\t.\tID=g1\n\
             chr1\ts\tmRNA\t101\t1400\t.\t+\t.\tID=t1;Parent=g1\n\
             chr1\ts\tthree_prime_UTR\t1201\t1400\t.\t+\t.\tID=u1;Parent=t1\n\
             chr1\ts\tthree_prime_UTR\t901\t1000\t.\t+\t.\tID=u2\n\
             chr1\ts\tgene\t2001\t3000\t.\t+\t.\tID=g2\n\
             chr1\ts\tthree_prime_UTR\t2901\t3000\t.\t+\t.\tID=u3;Parent=g2\n",
        )?)?;

        let g1 = store.gene("g1").expect("g1");
        let ids = store
            .three_prime_utrs(g1)
            .iter()
            .map(|x| x.id().as_str())
            .collect::<Vec<_>>();
        // u1 lies past the gene line but is owned through its transcript
        assert_eq!(ids, vec!["u2", "u1"]);

        let g2 = store.gene("g2").expect("g2");
        let ids = store
            .three_prime_utrs(g2)
            .iter()
            .map(|x| x.id().as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["u3"]);
        Ok(())
    }

    #[test]
    fn test_query_window() -> Result<()> {
        let g = |id: &str, start: u64, end: u64| -> Result<GeneFeature> {
            Ok(GeneFeature::new(
                id,
                Locus::try_new("chr1".to_string(), start, end, Strand::Forward)?,
                FeatureKind::Gene,
                None,
                vec![],
            ))
        };
        let store = FeatureStore::from_features(vec![g("b", 500, 900)?, g("a", 100, 400)?]);

        let ids = |start: u64, end: u64| -> Result<Vec<String>> {
            Ok(store
                .query("chr1", Interval::new(start, end)?, Strand::Forward)
                .iter()
                .map(|x| x.id().clone())
                .collect())
        };
        assert_eq!(ids(0, 1000)?, vec!["a", "b"]);
        assert_eq!(ids(400, 500)?, Vec::<String>::new());
        assert_eq!(ids(399, 501)?, vec!["a", "b"]);
        assert!(store.query("chrX", Interval::new(0, 1000)?, Strand::Forward).is_empty());
        Ok(())
    }
}
