//! Dense per-base arrays for finalized coordinates.
//!
//! [`CoordNumerifier`] turns the features of one coordinate into chunked label,
//! transition, mask and (optionally) sequence matrices. Each strand is encoded in
//! genomic order and, on the minus strand, every chunk is reversed so that row 0 is
//! always the 5' end. Plus-strand chunks come first, then minus-strand chunks from
//! the genomic end of the coordinate towards its start.

pub mod labels;
pub mod mers;
pub mod sequence;
pub mod transitions;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use log::{debug, warn};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::NumerifyError;
use crate::model::feature::Feature;
use crate::model::graph::FeatureGraph;
use crate::model::types::{CoordinateId, FeatureId};
use crate::partition::Stepper;
use crate::snapshot;
use crate::types::Strand;

const MAGIC: &[u8; 4] = b"GTC1";

/// Column layout of the base-pair class matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassGranularity {
    /// Three indicator tracks: transcribed, coding, intron.
    Raw,
    /// Four mutually exclusive classes: intergenic, UTR, CDS, intron.
    #[default]
    OneHot,
}

impl ClassGranularity {
    pub fn n_columns(self) -> usize {
        match self {
            ClassGranularity::Raw => labels::N_RAW,
            ClassGranularity::OneHot => labels::N_CLASSES,
        }
    }
}

impl fmt::Display for ClassGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassGranularity::Raw => write!(f, "raw"),
            ClassGranularity::OneHot => write!(f, "one-hot"),
        }
    }
}

impl FromStr for ClassGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(ClassGranularity::Raw),
            "one-hot" | "onehot" => Ok(ClassGranularity::OneHot),
            other => Err(format!("unknown class granularity '{other}' (expected raw or one-hot)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumerifyOptions {
    /// Rows per chunk; the last chunk of a strand holds the remainder.
    pub chunk_size: u32,
    pub granularity: ClassGranularity,
    /// Fill the last chunk up to `chunk_size` with zero rows (mask 0).
    pub pad_final_chunk: bool,
    /// Emit all-intergenic chunks for strands without features instead of skipping them.
    pub keep_unannotated: bool,
}

impl Default for NumerifyOptions {
    fn default() -> Self {
        Self {
            chunk_size: 20_000,
            granularity: ClassGranularity::OneHot,
            pad_final_chunk: false,
            keep_unannotated: false,
        }
    }
}

/// Genomic range a chunk was cut from; `start < end` on both strands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub start: u32,
    pub end: u32,
    pub strand: Strand,
}

/// All chunks of one coordinate. The per-chunk vectors are parallel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordChunks {
    pub coordinate: CoordinateId,
    pub species: String,
    pub seqid: String,
    pub meta: Vec<ChunkMeta>,
    pub labels: Vec<Array2<i8>>,
    pub transitions: Vec<Array2<i8>>,
    /// 1 = use the base, 0 = excluded (annotation error or padding).
    pub label_masks: Vec<Array1<i8>>,
    /// Present when the coordinate carries its sequence.
    pub sequence: Option<Vec<Array2<f32>>>,
}

impl CoordChunks {
    fn empty(coordinate: CoordinateId, species: &str, seqid: &str, with_sequence: bool) -> Self {
        Self {
            coordinate,
            species: species.to_string(),
            seqid: seqid.to_string(),
            meta: Vec::new(),
            labels: Vec::new(),
            transitions: Vec::new(),
            label_masks: Vec::new(),
            sequence: with_sequence.then(Vec::new),
        }
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    fn append(&mut self, other: CoordChunks) {
        self.meta.extend(other.meta);
        self.labels.extend(other.labels);
        self.transitions.extend(other.transitions);
        self.label_masks.extend(other.label_masks);
        if let (Some(mine), Some(theirs)) = (self.sequence.as_mut(), other.sequence) {
            mine.extend(theirs);
        }
    }
}

/// `species/seqid coordinate N: K chunks (P plus, M minus)`
impl fmt::Display for CoordChunks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plus = self.meta.iter().filter(|m| m.strand == Strand::Plus).count();
        write!(
            f,
            "{}/{} coordinate {}: {} chunks ({} plus, {} minus)",
            self.species,
            self.seqid,
            self.coordinate,
            self.len(),
            plus,
            self.len() - plus
        )
    }
}

/// Encodes coordinates of one graph.
///
/// Feature ids are grouped by coordinate once, so numerifying many coordinates
/// does not rescan the whole graph.
pub struct CoordNumerifier<'g> {
    graph: &'g FeatureGraph,
    by_coordinate: HashMap<CoordinateId, Vec<FeatureId>>,
    opts: NumerifyOptions,
}

impl<'g> CoordNumerifier<'g> {
    pub fn new(graph: &'g FeatureGraph, opts: NumerifyOptions) -> Self {
        assert!(opts.chunk_size > 0, "chunk_size must be > 0");
        Self {
            graph,
            by_coordinate: graph.features_by_coordinate(),
            opts,
        }
    }

    /// Both strands of `coordinate`, plus first.
    ///
    /// A strand without features is skipped (or encoded as intergenic with
    /// `keep_unannotated`). When both are skipped the coordinate has nothing to
    /// offer and `NoFeaturesInSlice` is returned with an unknown strand.
    pub fn numerify(&self, coordinate: CoordinateId) -> Result<CoordChunks, NumerifyError> {
        let coord = self.graph.coordinates.get(coordinate).ok_or_else(|| {
            NumerifyError::DataInterpretation(format!("unknown coordinate {coordinate}"))
        })?;
        let mut out = CoordChunks::empty(coordinate, &coord.genome, &coord.seqid, coord.sequence.is_some());

        for strand in [Strand::Plus, Strand::Minus] {
            match self.numerify_strand(coordinate, strand) {
                Ok(chunks) => out.append(chunks),
                Err(NumerifyError::NoFeaturesInSlice { .. }) => {
                    warn!(
                        "Sequence {} [{}, {}) has no annotations on the {} strand",
                        coord.seqid, coord.start, coord.end, strand
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if out.is_empty() {
            return Err(NumerifyError::NoFeaturesInSlice {
                coordinate,
                strand: Strand::Unknown,
            });
        }
        Ok(out)
    }

    /// Chunks of one strand of `coordinate`.
    pub fn numerify_strand(&self, coordinate: CoordinateId, strand: Strand) -> Result<CoordChunks, NumerifyError> {
        if !strand.is_oriented() {
            return Err(NumerifyError::DataInterpretation(
                "cannot numerify an unknown strand".to_string(),
            ));
        }
        let coord = self.graph.coordinates.get(coordinate).ok_or_else(|| {
            NumerifyError::DataInterpretation(format!("unknown coordinate {coordinate}"))
        })?;

        let features = self.strand_features(coordinate, strand)?;
        if features.is_empty() && !self.opts.keep_unannotated {
            return Err(NumerifyError::NoFeaturesInSlice { coordinate, strand });
        }
        debug!(
            "numerify {}:{}-{} ({}) with {} features",
            coord.seqid,
            coord.start,
            coord.end,
            strand,
            features.len()
        );

        let (raw, mask) = labels::raw_tracks(coord, &features)?;
        let classes = match self.opts.granularity {
            ClassGranularity::Raw => raw,
            ClassGranularity::OneHot => labels::one_hot(&raw),
        };
        let transitions = transitions::transition_matrix(coord, &features);
        let seq = coord
            .sequence
            .as_deref()
            .map(|s| sequence::encode(s, strand))
            .transpose()?;

        let mut out = CoordChunks::empty(coordinate, &coord.genome, &coord.seqid, seq.is_some());
        let size = self.opts.chunk_size as usize;
        let minus = strand == Strand::Minus;

        let mut steps: Vec<(u32, u32)> = Stepper::new(coord.len(), self.opts.chunk_size).collect();
        if minus {
            steps.reverse();
        }

        for (a, b) in steps {
            let (from, to) = (a as usize, b as usize);
            let pad_to = if self.opts.pad_final_chunk { size } else { to - from };

            out.meta.push(ChunkMeta {
                start: coord.start + a,
                end: coord.start + b,
                strand,
            });
            out.labels.push(chunk_rows(classes.view(), from, to, minus, pad_to));
            out.transitions.push(chunk_rows(transitions.view(), from, to, minus, pad_to));
            out.label_masks.push(chunk_mask(mask.view(), from, to, minus, pad_to));
            if let (Some(chunks), Some(seq)) = (out.sequence.as_mut(), seq.as_ref()) {
                chunks.push(chunk_rows(seq.view(), from, to, minus, pad_to));
            }
        }
        Ok(out)
    }

    /// Features of `coordinate` on `strand`, sorted by position.
    ///
    /// Any unstranded feature on the coordinate makes it uninterpretable.
    fn strand_features(&self, coordinate: CoordinateId, strand: Strand) -> Result<Vec<&'g Feature>, NumerifyError> {
        let graph = self.graph;
        let mut out = Vec::new();
        for &id in self.by_coordinate.get(&coordinate).map(Vec::as_slice).unwrap_or_default() {
            let f = &graph.features[id];
            if !f.strand.is_oriented() {
                return Err(NumerifyError::DataInterpretation(format!(
                    "{} feature {} on coordinate {} has no strand",
                    f.kind, f.id, coordinate
                )));
            }
            if f.strand == strand {
                out.push(f);
            }
        }
        out.sort_by_key(|f| (f.start, f.end, f.kind));
        Ok(out)
    }
}

/// Rows `[from, to)`, reversed for the minus strand, zero-padded to `pad_to` rows.
fn chunk_rows<T: Clone + Default>(m: ArrayView2<T>, from: usize, to: usize, reverse: bool, pad_to: usize) -> Array2<T> {
    let rows = if reverse {
        m.slice(s![from..to;-1, ..])
    } else {
        m.slice(s![from..to, ..])
    };
    let mut out = Array2::from_elem((pad_to.max(to - from), m.ncols()), T::default());
    out.slice_mut(s![..to - from, ..]).assign(&rows);
    out
}

fn chunk_mask(m: ArrayView1<i8>, from: usize, to: usize, reverse: bool, pad_to: usize) -> Array1<i8> {
    let rows = if reverse {
        m.slice(s![from..to;-1])
    } else {
        m.slice(s![from..to])
    };
    let mut out = Array1::zeros(pad_to.max(to - from));
    out.slice_mut(s![..to - from]).assign(&rows);
    out
}

/// Numerify `coordinates` in parallel, one result per coordinate in input order.
pub fn numerify_all(
    graph: &FeatureGraph,
    coordinates: &[CoordinateId],
    opts: NumerifyOptions,
) -> Vec<(CoordinateId, Result<CoordChunks, NumerifyError>)> {
    let numerifier = CoordNumerifier::new(graph, opts);
    coordinates
        .par_iter()
        .map(|&c| (c, numerifier.numerify(c)))
        .collect()
}

/// Write chunk sets in the snapshot format (magic `GTC1`).
pub fn write_chunks(path: impl AsRef<Path>, chunks: &[CoordChunks]) -> Result<()> {
    snapshot::save(path, MAGIC, &chunks)
}

pub fn read_chunks(path: impl AsRef<Path>) -> Result<Vec<CoordChunks>> {
    snapshot::load(path, MAGIC, "chunk")
}
