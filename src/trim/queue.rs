use std::collections::HashMap;

use crate::error::TrimError;
use crate::model::coordinate::Coordinate;
use crate::model::feature::Feature;
use crate::model::graph::{FeatureGraph, FeatureRows, FeatureRowsMut};
use crate::model::transcript::{TranscribedPiece, Transcript};
use crate::model::types::{CoordinateId, FeatureId, PieceId, TranscriptId};

/// One pending write against the feature graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreatePiece {
        piece: PieceId,
        transcript: TranscriptId,
        position: u32,
    },
    CreateFeature(Feature),
    /// Full replacement of an existing row.
    UpdateFeature(Feature),
    SetPosition { piece: PieceId, position: u32 },
}

/// Ordered unit of work for one super-locus.
///
/// Records are replayed in order by [`FeatureGraph::execute`]. Ids of created rows
/// are numbered from the graph sizes seen when the queue was opened; dropping the
/// queue discards every pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceQueue {
    base_features: usize,
    base_pieces: usize,
    records: Vec<Mutation>,
}

impl SliceQueue {
    pub fn new(base: &FeatureGraph) -> Self {
        Self {
            base_features: base.features.len(),
            base_pieces: base.pieces.len(),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[Mutation] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn push(&mut self, m: Mutation) {
        self.records.push(m);
    }
}

/// Read-only graph with a queue of pending writes laid over it.
///
/// Rows touched by the queue are copied on first write, so later reads in the
/// same batch observe earlier splits while the base graph stays untouched.
pub struct StagedGraph<'g> {
    base: &'g FeatureGraph,
    queue: SliceQueue,
    features: HashMap<FeatureId, Feature>,
    pieces: HashMap<PieceId, TranscribedPiece>,
    transcripts: HashMap<TranscriptId, Transcript>,
    next_feature: FeatureId,
    next_piece: PieceId,
}

impl<'g> StagedGraph<'g> {
    pub fn new(base: &'g FeatureGraph) -> Self {
        Self {
            base,
            queue: SliceQueue::new(base),
            features: HashMap::new(),
            pieces: HashMap::new(),
            transcripts: HashMap::new(),
            next_feature: base.features.len(),
            next_piece: base.pieces.len(),
        }
    }

    pub fn queue(&self) -> &SliceQueue {
        &self.queue
    }

    /// Close the batch and hand back its records for [`FeatureGraph::execute`].
    pub fn into_queue(self) -> SliceQueue {
        self.queue
    }

    fn piece_mut(&mut self, id: PieceId) -> Option<&mut TranscribedPiece> {
        if !self.pieces.contains_key(&id) {
            let row = self.base.pieces.get(id)?.clone();
            self.pieces.insert(id, row);
        }
        self.pieces.get_mut(&id)
    }

    fn transcript_mut(&mut self, id: TranscriptId) -> Option<&mut Transcript> {
        if !self.transcripts.contains_key(&id) {
            let row = self.base.transcripts.get(id)?.clone();
            self.transcripts.insert(id, row);
        }
        self.transcripts.get_mut(&id)
    }
}

impl FeatureRows for StagedGraph<'_> {
    fn coordinate(&self, id: CoordinateId) -> Option<&Coordinate> {
        self.base.coordinates.get(id)
    }

    fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id).or_else(|| self.base.features.get(id))
    }

    fn piece(&self, id: PieceId) -> Option<&TranscribedPiece> {
        self.pieces.get(&id).or_else(|| self.base.pieces.get(id))
    }

    fn transcript(&self, id: TranscriptId) -> Option<&Transcript> {
        self.transcripts.get(&id).or_else(|| self.base.transcripts.get(id))
    }
}

impl FeatureRowsMut for StagedGraph<'_> {
    fn create_piece(&mut self, transcript: TranscriptId, position: u32) -> PieceId {
        let id = self.next_piece;
        self.next_piece += 1;
        self.pieces.insert(id, TranscribedPiece::new(id, transcript, position));
        if let Some(t) = self.transcript_mut(transcript) {
            t.add_piece(id);
        }
        self.queue.push(Mutation::CreatePiece {
            piece: id,
            transcript,
            position,
        });
        id
    }

    fn create_feature(&mut self, mut feature: Feature) -> FeatureId {
        let id = self.next_feature;
        self.next_feature += 1;
        feature.id = id;
        if let Some(p) = self.piece_mut(feature.piece) {
            p.add_feature(id);
        }
        self.features.insert(id, feature.clone());
        self.queue.push(Mutation::CreateFeature(feature));
        id
    }

    fn update_feature(&mut self, feature: Feature) {
        let id = feature.id;
        let old_piece = self.feature(id).map(|f| f.piece);
        if let Some(old_piece) = old_piece.filter(|&p| p != feature.piece) {
            if let Some(p) = self.piece_mut(old_piece) {
                p.remove_feature(id);
            }
            if let Some(p) = self.piece_mut(feature.piece) {
                p.add_feature(id);
            }
        }
        self.features.insert(id, feature.clone());
        self.queue.push(Mutation::UpdateFeature(feature));
    }

    fn set_position(&mut self, piece: PieceId, position: u32) {
        if let Some(p) = self.piece_mut(piece) {
            p.position = position;
        }
        self.queue.push(Mutation::SetPosition { piece, position });
    }
}

impl FeatureGraph {
    /// Flush a queue: replay its records in order.
    ///
    /// When other queues opened on the same base were flushed first, rows this
    /// queue created are renumbered past the rows that now exist. Returns the number
    /// of records applied.
    pub fn execute(&mut self, queue: SliceQueue) -> Result<usize, TrimError> {
        let piece_shift = self.pieces.len().checked_sub(queue.base_pieces);
        let feature_shift = self.features.len().checked_sub(queue.base_features);
        let (Some(piece_shift), Some(feature_shift)) = (piece_shift, feature_shift) else {
            return Err(TrimError::Structural(
                "queue was opened on a larger graph than the one it is flushed into".to_string(),
            ));
        };

        let piece_id = |id: PieceId| {
            if id >= queue.base_pieces {
                id + piece_shift
            } else {
                id
            }
        };
        let feature_id = |id: FeatureId| {
            if id >= queue.base_features {
                id + feature_shift
            } else {
                id
            }
        };

        let n = queue.records.len();
        for record in queue.records.iter().cloned() {
            match record {
                Mutation::CreatePiece {
                    piece,
                    transcript,
                    position,
                } => {
                    if transcript >= self.transcripts.len() {
                        return Err(TrimError::Structural(format!("unknown transcript {transcript}")));
                    }
                    let id = self.create_piece(transcript, position);
                    debug_assert_eq!(id, piece_id(piece));
                }
                Mutation::CreateFeature(mut f) => {
                    f.piece = piece_id(f.piece);
                    if f.piece >= self.pieces.len() {
                        return Err(TrimError::Structural(format!("unknown piece {}", f.piece)));
                    }
                    let expected = feature_id(f.id);
                    let id = self.create_feature(f);
                    debug_assert_eq!(id, expected);
                }
                Mutation::UpdateFeature(mut f) => {
                    f.id = feature_id(f.id);
                    f.piece = piece_id(f.piece);
                    if f.id >= self.features.len() || f.piece >= self.pieces.len() {
                        return Err(TrimError::Structural(format!(
                            "update of unknown feature {} / piece {}",
                            f.id, f.piece
                        )));
                    }
                    self.update_feature(f);
                }
                Mutation::SetPosition { piece, position } => {
                    let piece = piece_id(piece);
                    if piece >= self.pieces.len() {
                        return Err(TrimError::Structural(format!("unknown piece {piece}")));
                    }
                    self.set_position(piece, position);
                }
            }
        }
        Ok(n)
    }
}
