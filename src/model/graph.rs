use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::{Serialize, Deserialize};

use crate::model::coordinate::Coordinate;
use crate::model::feature::Feature;
use crate::model::transcript::{SuperLocus, TranscribedPiece, Transcript};
use crate::model::types::{
    CoordinateId, FeatureId, FeatureType, PieceId, ProcessingSet, SuperLocusId, TranscriptId,
};
use crate::snapshot;
use crate::types::Strand;

const MAGIC: &[u8; 4] = b"GTG1";

/// Read access to the rows the engine works on.
///
/// Implemented by the committed [`FeatureGraph`] and by the staged overlay the
/// trimmer writes into, so the same code can read either.
pub trait FeatureRows {
    fn coordinate(&self, id: CoordinateId) -> Option<&Coordinate>;
    fn feature(&self, id: FeatureId) -> Option<&Feature>;
    fn piece(&self, id: PieceId) -> Option<&TranscribedPiece>;
    fn transcript(&self, id: TranscriptId) -> Option<&Transcript>;
}

/// Write access used by the trimmer.
pub trait FeatureRowsMut: FeatureRows {
    /// Append a new piece to `transcript` and return its id.
    fn create_piece(&mut self, transcript: TranscriptId, position: u32) -> PieceId;

    /// Append `feature` (its `id` is overwritten) and register it with its piece.
    fn create_feature(&mut self, feature: Feature) -> FeatureId;

    /// Replace the row `feature.id`; a changed `piece` moves ownership.
    fn update_feature(&mut self, feature: Feature);

    fn set_position(&mut self, piece: PieceId, position: u32);
}

/// Arena holding the whole annotation: coordinates, features, pieces,
/// transcripts and super-loci, all addressed by their index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureGraph {
    pub coordinates: Vec<Coordinate>,
    pub features: Vec<Feature>,
    pub pieces: Vec<TranscribedPiece>,
    pub transcripts: Vec<Transcript>,
    pub super_loci: Vec<SuperLocus>,
    /// Train/dev/test tags of tiled coordinates.
    pub processing_sets: BTreeMap<CoordinateId, ProcessingSet>,
}

/// Summary of the graph: totals, then one line per genome/sequence id.
impl fmt::Display for FeatureGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "FeatureGraph: {} super-loci, {} transcripts, {} pieces, {} features, {} coordinates",
            self.super_loci.len(),
            self.transcripts.len(),
            self.pieces.len(),
            self.features.len(),
            self.coordinates.len()
        )?;

        let mut by_kind: BTreeMap<FeatureType, usize> = BTreeMap::new();
        for feat in &self.features {
            *by_kind.entry(feat.kind).or_default() += 1;
        }
        for (kind, n) in &by_kind {
            writeln!(f, "  {kind}: {n}")?;
        }

        // (coordinates, bases, features)
        let mut per_seq: BTreeMap<(&str, &str), (usize, u64, usize)> = BTreeMap::new();
        for c in &self.coordinates {
            let e = per_seq.entry((c.genome.as_str(), c.seqid.as_str())).or_default();
            e.0 += 1;
            e.1 += c.len() as u64;
        }
        for feat in &self.features {
            if let Some(c) = self.coordinates.get(feat.coordinate) {
                per_seq.entry((c.genome.as_str(), c.seqid.as_str())).or_default().2 += 1;
            }
        }
        for ((genome, seqid), (n_coords, bases, n_feats)) in &per_seq {
            writeln!(
                f,
                "  - {genome}/{seqid}: coordinates={n_coords}, bp={bases}, features={n_feats}"
            )?;
        }

        if !self.processing_sets.is_empty() {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for set in self.processing_sets.values() {
                *counts.entry(set.as_str()).or_default() += 1;
            }
            let parts: Vec<String> = counts.iter().map(|(k, v)| format!("{k}={v}")).collect();
            writeln!(f, "  processing sets: {}", parts.join(", "))?;
        }

        Ok(())
    }
}

impl FeatureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_coordinate(
        &mut self,
        genome: &str,
        seqid: &str,
        start: u32,
        end: u32,
        sequence: Option<String>,
    ) -> CoordinateId {
        let id = self.coordinates.len();
        let mut coord = Coordinate::new(id, genome, seqid, start, end);
        if let Some(seq) = sequence {
            coord = coord.with_sequence(seq);
        }
        self.coordinates.push(coord);
        id
    }

    pub fn add_super_locus(&mut self, name: &str) -> SuperLocusId {
        let id = self.super_loci.len();
        self.super_loci.push(SuperLocus::new(id, name));
        id
    }

    pub fn add_transcript(&mut self, super_locus: SuperLocusId, name: &str) -> TranscriptId {
        let id = self.transcripts.len();
        self.transcripts.push(Transcript::new(id, super_locus, name));
        self.super_loci[super_locus].add_transcript(id);
        id
    }

    /// Add a feature with both boundaries marked biological.
    pub fn add_feature(
        &mut self,
        piece: PieceId,
        coordinate: CoordinateId,
        kind: FeatureType,
        start: u32,
        end: u32,
        strand: Strand,
    ) -> FeatureId {
        assert!(start < end, "Feature requires start < end");
        self.create_feature(Feature {
            id: 0,
            coordinate,
            kind,
            start,
            end,
            strand,
            start_is_biological_start: true,
            end_is_biological_end: true,
            piece,
        })
    }

    /// All feature ids grouped by their coordinate.
    pub fn features_by_coordinate(&self) -> HashMap<CoordinateId, Vec<FeatureId>> {
        let mut map: HashMap<CoordinateId, Vec<FeatureId>> = HashMap::new();
        for f in &self.features {
            map.entry(f.coordinate).or_default().push(f.id);
        }
        map
    }

    pub fn super_locus_of_feature(&self, feature: FeatureId) -> Option<SuperLocusId> {
        let piece = self.pieces.get(self.features.get(feature)?.piece)?;
        Some(self.transcripts.get(piece.transcript)?.super_locus)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        snapshot::save(path, MAGIC, self)
    }

    /// Load a graph written by `save()`. Rejects wrong file types and version mismatches.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        snapshot::load(path, MAGIC, "FeatureGraph")
    }
}

impl FeatureRows for FeatureGraph {
    fn coordinate(&self, id: CoordinateId) -> Option<&Coordinate> {
        self.coordinates.get(id)
    }

    fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id)
    }

    fn piece(&self, id: PieceId) -> Option<&TranscribedPiece> {
        self.pieces.get(id)
    }

    fn transcript(&self, id: TranscriptId) -> Option<&Transcript> {
        self.transcripts.get(id)
    }
}

impl FeatureRowsMut for FeatureGraph {
    fn create_piece(&mut self, transcript: TranscriptId, position: u32) -> PieceId {
        let id = self.pieces.len();
        self.pieces.push(TranscribedPiece::new(id, transcript, position));
        self.transcripts[transcript].add_piece(id);
        id
    }

    fn create_feature(&mut self, mut feature: Feature) -> FeatureId {
        let id = self.features.len();
        feature.id = id;
        self.pieces[feature.piece].add_feature(id);
        self.features.push(feature);
        id
    }

    fn update_feature(&mut self, feature: Feature) {
        let id = feature.id;
        let old_piece = self.features[id].piece;
        if old_piece != feature.piece {
            self.pieces[old_piece].remove_feature(id);
            self.pieces[feature.piece].add_feature(id);
        }
        self.features[id] = feature;
    }

    fn set_position(&mut self, piece: PieceId, position: u32) {
        self.pieces[piece].position = position;
    }
}
