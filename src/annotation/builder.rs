use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};

use crate::annotation::io::{split_parent_list, AnnotationReader, Dialect, Entry, ParseError};
use crate::model::graph::{FeatureGraph, FeatureRowsMut};
use crate::model::types::{FeatureType, TranscriptId};
use crate::types::{RefBlock, Strand};

/// Which attributes and feature types carry ids, names and structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdNameKeys {
    pub gene_id_keys: Vec<String>,
    pub gene_name_keys: Vec<String>,

    pub transcript_id_keys: Vec<String>,
    pub transcript_name_keys: Vec<String>,

    /// GFF3 child -> parent linkage (most commonly: Parent)
    pub parent_keys: Vec<String>,

    /// GFF3 gene lines, used for gene names only
    pub gene_feature_types: Vec<String>,
    /// GFF3 transcript lines, linking a transcript id to its gene
    pub transcript_feature_types: Vec<String>,
    pub exon_feature_types: Vec<String>,
    pub coding_feature_types: Vec<String>,
    /// Regions whose annotation is known to be unreliable
    pub error_feature_types: Vec<String>,
}

impl Default for IdNameKeys {
    fn default() -> Self {
        Self {
            gene_id_keys: vec!["gene_id".into(), "gene".into(), "GeneID".into()],
            gene_name_keys: vec!["gene_name".into(), "Name".into()],

            transcript_id_keys: vec!["transcript_id".into(), "transcript".into()],
            transcript_name_keys: vec!["transcript_name".into(), "Name".into()],

            parent_keys: vec!["Parent".into()],

            gene_feature_types: vec!["gene".into()],
            transcript_feature_types: vec!["mRNA".into(), "transcript".into()],
            exon_feature_types: vec!["exon".into()],
            coding_feature_types: vec!["CDS".into()],
            error_feature_types: vec!["error".into()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Exon,
    Coding,
    Error,
}

/// Blocks of one transcript on one (seqid, strand).
#[derive(Debug, Default)]
struct PieceAcc {
    seqid: String,
    strand: Strand,
    exons: Vec<RefBlock>,
    coding: Vec<RefBlock>,
    errors: Vec<RefBlock>,
}

#[derive(Debug)]
struct TranscriptAcc {
    key: String,
    gene_key: Option<String>,
    names: Vec<String>,
    line_no: usize,
    pieces: Vec<PieceAcc>,
}

impl TranscriptAcc {
    fn piece_mut(&mut self, seqid: &str, strand: Strand) -> &mut PieceAcc {
        let at = match self
            .pieces
            .iter()
            .position(|p| p.seqid == seqid && p.strand == strand)
        {
            Some(i) => i,
            None => {
                self.pieces.push(PieceAcc {
                    seqid: seqid.to_string(),
                    strand,
                    ..Default::default()
                });
                self.pieces.len() - 1
            }
        };
        &mut self.pieces[at]
    }
}

fn intern_tx(
    key_to_acc: &mut HashMap<String, usize>,
    txs: &mut Vec<TranscriptAcc>,
    key: &str,
    line_no: usize,
) -> usize {
    *key_to_acc.entry(key.to_string()).or_insert_with(|| {
        txs.push(TranscriptAcc {
            key: key.to_string(),
            gene_key: None,
            names: Vec::new(),
            line_no,
            pieces: Vec::new(),
        });
        txs.len() - 1
    })
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// High-level builder turning a GTF/GFF3 file into a [`FeatureGraph`].
///
/// - parses the whole file (optionally gzipped)
/// - configurable id/name attribute keys and feature types
/// - one coordinate per sequence id, one super-locus per gene, one transcript per
///   transcript id, one piece per (sequence, strand) a transcript touches
#[derive(Debug, Clone)]
pub struct AnnotationBuilder {
    /// Species / genome name stored on every coordinate.
    pub genome: String,
    pub keys: IdNameKeys,
}

impl AnnotationBuilder {
    pub fn new(genome: &str) -> Self {
        Self {
            genome: genome.to_string(),
            keys: IdNameKeys::default(),
        }
    }

    pub fn gene_id_key(mut self, key: &str) -> Self {
        self.keys.gene_id_keys = vec![key.to_string()];
        self
    }

    pub fn gene_name_keys(mut self, keys: &[&str]) -> Self {
        self.keys.gene_name_keys = keys.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn transcript_id_keys(mut self, keys: &[&str]) -> Self {
        self.keys.transcript_id_keys = keys.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn parent_keys(mut self, keys: &[&str]) -> Self {
        self.keys.parent_keys = keys.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn error_feature_types(mut self, types: &[&str]) -> Self {
        self.keys.error_feature_types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Build a graph from anything implementing `BufRead`.
    pub fn build_from_reader<R: BufRead>(&self, reader: R) -> Result<FeatureGraph, ParseError> {
        let keys = &self.keys;

        let mut regions: HashMap<String, RefBlock> = HashMap::new();
        let mut seq_order: Vec<String> = Vec::new();
        let mut seq_max_end: HashMap<String, u32> = HashMap::new();

        // GFF3 linkage from transcript lines: transcript id -> gene id
        let mut tx_parent: HashMap<String, String> = HashMap::new();
        let mut gene_names: HashMap<String, Vec<String>> = HashMap::new();

        let mut tx_key_to_acc: HashMap<String, usize> = HashMap::new();
        let mut txs: Vec<TranscriptAcc> = Vec::new();

        for entry in AnnotationReader::new(reader).entries() {
            let rec = match entry? {
                Entry::Region { seqid, start, end } => {
                    if start < end {
                        regions.insert(seqid, RefBlock { start, end });
                    }
                    continue;
                }
                Entry::Record(rec) => rec,
            };

            if rec.is_one_of(&keys.gene_feature_types) {
                if let (Some(id), Some(name)) = (rec.attr("ID"), rec.pick_first_attr(&keys.gene_name_keys)) {
                    push_unique(gene_names.entry(id.to_string()).or_default(), name);
                }
                continue;
            }

            if rec.is_one_of(&keys.transcript_feature_types) {
                let tx_key = rec
                    .pick_first_attr(&keys.transcript_id_keys)
                    .or_else(|| rec.attr("ID").map(str::to_string));
                let gene_key = rec
                    .pick_first_attr(&keys.gene_id_keys)
                    .or_else(|| rec.pick_first_attr(&keys.parent_keys));
                if let (Some(tx_key), Some(gene_key)) = (tx_key, gene_key) {
                    if let Some(name) = rec.pick_first_attr(&keys.transcript_name_keys) {
                        let at = intern_tx(&mut tx_key_to_acc, &mut txs, &tx_key, rec.line_no);
                        push_unique(&mut txs[at].names, name);
                    }
                    tx_parent.insert(tx_key, gene_key);
                }
                continue;
            }

            let part = if rec.is_one_of(&keys.exon_feature_types) {
                Part::Exon
            } else if rec.is_one_of(&keys.coding_feature_types) {
                Part::Coding
            } else if rec.is_one_of(&keys.error_feature_types) {
                Part::Error
            } else {
                continue;
            };

            if !seq_max_end.contains_key(&rec.seqname) {
                seq_order.push(rec.seqname.clone());
            }
            let max_end = seq_max_end.entry(rec.seqname.clone()).or_insert(0);
            *max_end = (*max_end).max(rec.end0);

            let tx_key_raw = rec
                .pick_first_attr(&keys.transcript_id_keys)
                .or_else(|| rec.pick_first_attr(&keys.parent_keys))
                .ok_or_else(|| {
                    let mut tried = keys.transcript_id_keys.clone();
                    tried.extend(keys.parent_keys.clone());
                    ParseError::MissingAttribute {
                        line_no: rec.line_no,
                        transcript: rec.feature_type.clone(),
                        what: "transcript id",
                        tried,
                    }
                })?;
            let gene_key = rec.pick_first_attr(&keys.gene_id_keys);
            let block = RefBlock {
                start: rec.start0,
                end: rec.end0,
            };

            for tx_key in split_parent_list(&tx_key_raw) {
                let at = intern_tx(&mut tx_key_to_acc, &mut txs, &tx_key, rec.line_no);
                let tx = &mut txs[at];
                if tx.gene_key.is_none() {
                    tx.gene_key = gene_key.clone();
                }
                if let Some(name) = rec.pick_first_attr(&keys.transcript_name_keys) {
                    if rec.dialect != Dialect::Gff3 {
                        push_unique(&mut tx.names, name);
                    }
                }
                if let Some(gk) = &gene_key {
                    if let Some(name) = rec.pick_first_attr(&keys.gene_name_keys) {
                        push_unique(gene_names.entry(gk.clone()).or_default(), name);
                    }
                }

                let piece = tx.piece_mut(&rec.seqname, rec.strand);
                match part {
                    Part::Exon => piece.exons.push(block),
                    Part::Coding => piece.coding.push(block),
                    Part::Error => piece.errors.push(block),
                }
            }
        }

        let mut graph = FeatureGraph::new();

        // coordinates
        let mut coord_of: HashMap<String, usize> = HashMap::new();
        for seqid in &seq_order {
            let max_end = seq_max_end.get(seqid).copied().unwrap_or(0);
            let extent = match regions.get(seqid) {
                Some(r) if r.end >= max_end => *r,
                Some(r) => {
                    warn!(
                        "Sequence region {}:{}-{} ends before its last feature at {}; extending",
                        seqid, r.start, r.end, max_end
                    );
                    RefBlock { start: r.start, end: max_end }
                }
                None => RefBlock { start: 0, end: max_end },
            };
            if extent.start >= extent.end {
                continue;
            }
            let id = graph.add_coordinate(&self.genome, seqid, extent.start, extent.end, None);
            coord_of.insert(seqid.clone(), id);
        }

        // genes and transcripts, in first-seen order
        let mut gene_to_sl: HashMap<String, usize> = HashMap::new();
        for tx in txs {
            if tx.pieces.is_empty() {
                continue;
            }
            let gene_key = tx
                .gene_key
                .clone()
                .or_else(|| tx_parent.get(&tx.key).cloned())
                .ok_or_else(|| ParseError::MissingAttribute {
                    line_no: tx.line_no,
                    transcript: tx.key.clone(),
                    what: "gene id",
                    tried: keys.gene_id_keys.clone(),
                })?;

            let sl = *gene_to_sl.entry(gene_key.clone()).or_insert_with(|| {
                let sl = graph.add_super_locus(&gene_key);
                for name in gene_names.get(&gene_key).into_iter().flatten() {
                    if !graph.super_loci[sl].names.contains(name) {
                        graph.super_loci[sl].names.push(name.clone());
                    }
                }
                sl
            });
            let t = graph.add_transcript(sl, &tx.key);
            for name in &tx.names {
                graph.transcripts[t].add_name(name);
            }
            self.add_pieces(&mut graph, t, &tx, &coord_of);
        }

        for sl in &mut graph.super_loci {
            sl.finalize();
        }
        info!("{}", graph);
        Ok(graph)
    }

    /// Features of each piece: the exon span as transcribed region, the CDS span as
    /// coding region, one intron per gap between merged exons and the error blocks.
    fn add_pieces(&self, graph: &mut FeatureGraph, t: TranscriptId, tx: &TranscriptAcc, coord_of: &HashMap<String, usize>) {
        let mut position = 0;
        for acc in &tx.pieces {
            if !acc.strand.is_oriented() {
                warn!(
                    "Transcript {} has unstranded parts on {}; skipping them",
                    tx.key, acc.seqid
                );
                continue;
            }
            let Some(&coord) = coord_of.get(&acc.seqid) else {
                continue;
            };

            let exons = if acc.exons.is_empty() {
                RefBlock::merge_all(acc.coding.clone())
            } else {
                RefBlock::merge_all(acc.exons.clone())
            };
            let coding = RefBlock::merge_all(acc.coding.clone());

            let piece = graph.create_piece(t, position);
            position += 1;

            if let Some(span) = RefBlock::span(&exons) {
                graph.add_feature(piece, coord, FeatureType::Transcribed, span.start, span.end, acc.strand);
            }
            if let Some(span) = RefBlock::span(&coding) {
                graph.add_feature(piece, coord, FeatureType::Coding, span.start, span.end, acc.strand);
            }
            for gap in RefBlock::gaps(&exons) {
                graph.add_feature(piece, coord, FeatureType::Intron, gap.start, gap.end, acc.strand);
            }
            for e in &acc.errors {
                if e.start < e.end {
                    graph.add_feature(piece, coord, FeatureType::Error, e.start, e.end, acc.strand);
                }
            }
        }
    }

    /// Build a graph from a file path; `.gz` files are decompressed on the fly.
    pub fn build_from_path<P: AsRef<Path>>(&self, path: P) -> Result<FeatureGraph, ParseError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| ParseError::IoPath {
            path: path.display().to_string(),
            source: e,
        })?;

        let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);
        if is_gz {
            let decoder = flate2::read::GzDecoder::new(file);
            self.build_from_reader(BufReader::new(decoder))
        } else {
            self.build_from_reader(BufReader::new(file))
        }
    }
}
