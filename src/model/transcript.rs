use crate::model::types::{FeatureId, PieceId, SuperLocusId, TranscriptId};
use serde::{Serialize, Deserialize};

/// Contiguous, ordered segment of a transcript.
///
/// `position` orders pieces 5'->3' within the transcript; `features` lists the
/// features this piece owns (ordering within the list is not significant, see
/// `trim::trimmer::sorted_features`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribedPiece {
    pub id: PieceId,
    pub transcript: TranscriptId,
    pub position: u32,
    pub features: Vec<FeatureId>,
}

impl TranscribedPiece {
    pub fn new(id: PieceId, transcript: TranscriptId, position: u32) -> Self {
        Self {
            id,
            transcript,
            position,
            features: Vec::new(),
        }
    }

    pub fn add_feature(&mut self, feature: FeatureId) {
        if !self.features.contains(&feature) {
            self.features.push(feature);
        }
    }

    pub fn remove_feature(&mut self, feature: FeatureId) {
        self.features.retain(|&f| f != feature);
    }
}

/// Transcript: one or more pieces (more than one only under trans-splicing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: TranscriptId,
    pub super_locus: SuperLocusId,
    pub names: Vec<String>,
    pub pieces: Vec<PieceId>,
}

impl Transcript {
    pub fn new(id: TranscriptId, super_locus: SuperLocusId, primary_name: impl Into<String>) -> Self {
        Self {
            id,
            super_locus,
            names: vec![primary_name.into()],
            pieces: Vec::new(),
        }
    }

    pub fn add_name(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(|s| s.as_str())
    }

    pub fn add_piece(&mut self, piece: PieceId) {
        if !self.pieces.contains(&piece) {
            self.pieces.push(piece);
        }
    }
}

/// Gene-level locus grouping transcripts.
///
/// Notes:
/// - `names[0]` is treated as the primary name (if present).
/// - trimming batches are committed per super-locus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperLocus {
    pub id: SuperLocusId,
    pub names: Vec<String>,
    transcript_ids: Vec<TranscriptId>,
}

impl SuperLocus {
    pub fn new(id: SuperLocusId, primary_name: impl Into<String>) -> Self {
        Self {
            id,
            names: vec![primary_name.into()],
            transcript_ids: Vec::new(),
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(|s| s.as_str())
    }

    pub fn add_transcript(&mut self, tx_id: TranscriptId) {
        self.transcript_ids.push(tx_id);
    }

    pub fn transcript_ids(&self) -> &[TranscriptId] {
        &self.transcript_ids
    }

    /// Sort transcript IDs and remove duplicates.
    pub fn finalize(&mut self) {
        self.transcript_ids.sort_unstable();
        self.transcript_ids.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_names_dedup() {
        let mut t = Transcript::new(0, 0, "T1");
        t.add_name("T1");
        t.add_name("ENST0000");
        t.add_name("ENST0000");
        t.add_name("  ");
        assert_eq!(t.names, vec!["T1".to_string(), "ENST0000".to_string()]);
        assert_eq!(t.primary_name(), Some("T1"));
    }

    #[test]
    fn super_locus_finalize_sorts_and_dedups() {
        let mut sl = SuperLocus::new(0, "G1");
        sl.add_transcript(10);
        sl.add_transcript(3);
        sl.add_transcript(10);
        assert_eq!(sl.transcript_ids().len(), 3);
        sl.finalize();
        assert_eq!(sl.transcript_ids(), &[3, 10]);
        assert_eq!(sl.primary_name(), Some("G1"));
    }

    #[test]
    fn piece_feature_list_has_no_duplicates() {
        let mut p = TranscribedPiece::new(0, 0, 0);
        p.add_feature(4);
        p.add_feature(4);
        p.add_feature(7);
        p.remove_feature(4);
        assert_eq!(p.features, vec![7]);
    }
}
