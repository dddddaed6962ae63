//! Re-partitioning of one transcript onto a new coordinate window.
//!
//! The transcript is walked 5'->3' piece by piece. Positions are mapped into
//! "walk space" (`(s, e)` on plus, `(-e, -s)` on minus) so the same ordering logic
//! serves both strands. A piece that crosses a window boundary is split there: the
//! upstream part stays on the piece, everything downstream moves to a new piece
//! inserted right after it.

use crate::error::TrimError;
use crate::index::IntervalIndex;
use crate::model::feature::{genomic_span, walk_span, Feature};
use crate::model::graph::{FeatureRows, FeatureRowsMut};
use crate::model::types::{CoordinateId, FeatureId, FeatureType, PieceId, TranscriptId};
use crate::types::Strand;

/// Result of a successful [`TranscriptTrimmer::apply_slice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// The transcript was made consistent with the window; `splits` pieces were cut.
    Sliced { splits: usize },
    /// Every feature touching the window already lies inside it and belongs to it.
    AlreadySliced,
}

/// Cursor position of the walk relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    BeforeWindow,
    InWindow,
    AfterWindow,
    Done,
}

/// Pieces of `transcript` in 5'->3' order (ascending `position`).
pub fn sorted_pieces<R: FeatureRows>(rows: &R, transcript: TranscriptId) -> Result<Vec<PieceId>, TrimError> {
    let tx = rows
        .transcript(transcript)
        .ok_or_else(|| TrimError::Structural(format!("unknown transcript {transcript}")))?;

    let mut pieces: Vec<(u32, PieceId)> = Vec::with_capacity(tx.pieces.len());
    for &pid in &tx.pieces {
        let piece = rows
            .piece(pid)
            .ok_or_else(|| TrimError::Structural(format!("transcript {transcript} lists unknown piece {pid}")))?;
        pieces.push((piece.position, pid));
    }
    pieces.sort_unstable();

    if let Some(w) = pieces.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(TrimError::Structural(format!(
            "pieces {} and {} of transcript {transcript} share position {}",
            w[0].1, w[1].1, w[0].0
        )));
    }
    Ok(pieces.into_iter().map(|(_, pid)| pid).collect())
}

/// Features of `piece` in walk order, together with the piece strand.
///
/// A piece must be single-stranded with a known strand, and its transcribed
/// regions must not overlap. Among its transcribed (and its coding) features only
/// the first in walk order may carry a biological start, and only the last a
/// biological end.
pub fn sorted_features<R: FeatureRows>(rows: &R, piece: PieceId) -> Result<(Vec<FeatureId>, Option<Strand>), TrimError> {
    let p = rows
        .piece(piece)
        .ok_or_else(|| TrimError::Structural(format!("unknown piece {piece}")))?;

    let mut feats: Vec<&Feature> = Vec::with_capacity(p.features.len());
    for &fid in &p.features {
        let f = rows
            .feature(fid)
            .ok_or_else(|| TrimError::Structural(format!("piece {piece} lists unknown feature {fid}")))?;
        feats.push(f);
    }

    let Some(first) = feats.first() else {
        return Ok((Vec::new(), None));
    };
    let strand = first.strand;
    if !strand.is_oriented() {
        return Err(TrimError::Structural(format!("piece {piece} has features without strand")));
    }
    if feats.iter().any(|f| f.strand != strand) {
        return Err(TrimError::Structural(format!("piece {piece} mixes strands")));
    }

    feats.sort_by_key(|f| (f.walk_span(), f.kind, f.id));

    let mut last_transcribed: Option<(i64, i64)> = None;
    for f in feats.iter().filter(|f| f.kind == FeatureType::Transcribed) {
        let span = f.walk_span();
        if let Some(prev) = last_transcribed {
            if span.0 < prev.1 {
                return Err(TrimError::Structural(format!(
                    "piece {piece} has overlapping transcribed features"
                )));
            }
        }
        last_transcribed = Some(span);
    }

    for kind in [FeatureType::Transcribed, FeatureType::Coding] {
        let of_kind: Vec<&Feature> = feats.iter().copied().filter(|f| f.kind == kind).collect();
        let last = of_kind.len().saturating_sub(1);
        for (i, f) in of_kind.iter().enumerate() {
            if (f.start_is_biological_start && i != 0) || (f.end_is_biological_end && i != last) {
                return Err(TrimError::Structural(format!(
                    "piece {piece} has conflicting biological boundaries on {kind:?} feature {}",
                    f.id
                )));
            }
        }
    }

    Ok((feats.iter().map(|f| f.id).collect(), Some(strand)))
}

/// Applies new coordinate windows to transcripts.
pub struct TranscriptTrimmer<'i> {
    index: &'i IntervalIndex,
}

impl<'i> TranscriptTrimmer<'i> {
    pub fn new(index: &'i IntervalIndex) -> Self {
        Self { index }
    }

    /// Make `transcript` consistent with the window `window` on `strand`.
    ///
    /// Every feature straddling a window boundary is truncated at the boundary and
    /// continued by a successor feature on a new piece; features inside the window
    /// are re-assigned to it. Pieces on the other strand or another sequence are not
    /// touched. Re-applying a window is a no-op.
    pub fn apply_slice<R: FeatureRowsMut>(
        &self,
        rows: &mut R,
        transcript: TranscriptId,
        window: CoordinateId,
        strand: Strand,
    ) -> Result<SliceOutcome, TrimError> {
        if !strand.is_oriented() {
            return Err(TrimError::Structural("cannot slice on an unknown strand".to_string()));
        }
        let (seqid, start, end) = {
            let c = rows
                .coordinate(window)
                .ok_or_else(|| TrimError::Structural(format!("unknown coordinate {window}")))?;
            (c.seqid.clone(), c.start, c.end)
        };

        let hits: Vec<FeatureId> = self
            .index
            .query(&seqid, start, end, strand)
            .into_iter()
            .filter(|&fid| owning_transcript(&*rows, fid) == Some(transcript))
            .collect();
        if hits.is_empty() {
            return Err(self.no_features(&seqid, start, end, strand));
        }

        // relevant pieces: same strand, same sequence
        let mut pieces: Vec<PieceId> = Vec::new();
        for pid in sorted_pieces(rows, transcript)? {
            let (feats, piece_strand) = sorted_features(rows, pid)?;
            if piece_strand != Some(strand) {
                continue;
            }
            let on_seq = feats.first().and_then(|&fid| {
                let f = rows.feature(fid)?;
                Some(rows.coordinate(f.coordinate)?.seqid == seqid)
            });
            if on_seq == Some(true) {
                pieces.push(pid);
            }
        }

        let (lo, hi) = walk_span(start, end, strand);

        // idempotence
        let mut touching = 0usize;
        let mut settled = true;
        for &pid in &pieces {
            for fid in sorted_features(rows, pid)?.0 {
                let Some(f) = rows.feature(fid) else { continue };
                let (ws, we) = f.walk_span();
                if ws < hi && lo < we {
                    touching += 1;
                    settled &= lo <= ws && we <= hi && f.coordinate == window;
                }
            }
        }
        if touching == 0 {
            return Err(self.no_features(&seqid, start, end, strand));
        }
        if settled {
            return Ok(SliceOutcome::AlreadySliced);
        }

        let mut splits = 0usize;
        for pid in pieces {
            splits += walk_piece(rows, pid, window, lo, hi)?;
        }
        Ok(SliceOutcome::Sliced { splits })
    }

    fn no_features(&self, seqid: &str, start: u32, end: u32, strand: Strand) -> TrimError {
        TrimError::NoFeaturesInSlice {
            seqid: seqid.to_string(),
            start,
            end,
            strand,
        }
    }
}

fn owning_transcript<R: FeatureRows>(rows: &R, feature: FeatureId) -> Option<TranscriptId> {
    let f = rows.feature(feature)?;
    Some(rows.piece(f.piece)?.transcript)
}

/// Walk extent of a piece: (lowest walk start, highest walk end).
fn piece_walk_span<R: FeatureRows>(rows: &R, piece: PieceId) -> Result<Option<(i64, i64)>, TrimError> {
    let (feats, _) = sorted_features(rows, piece)?;
    let mut span: Option<(i64, i64)> = None;
    for fid in feats {
        let Some(f) = rows.feature(fid) else { continue };
        let (ws, we) = f.walk_span();
        span = Some(match span {
            None => (ws, we),
            Some((a, b)) => (a.min(ws), b.max(we)),
        });
    }
    Ok(span)
}

/// Run the window state machine over one piece; returns the number of splits.
fn walk_piece<R: FeatureRowsMut>(
    rows: &mut R,
    piece: PieceId,
    window: CoordinateId,
    lo: i64,
    hi: i64,
) -> Result<usize, TrimError> {
    let Some((first, last)) = piece_walk_span(rows, piece)? else {
        return Ok(0);
    };

    let mut splits = 0usize;
    let mut current = piece;
    let mut state = if first < lo {
        WalkState::BeforeWindow
    } else if first < hi {
        WalkState::InWindow
    } else {
        WalkState::AfterWindow
    };

    loop {
        state = match state {
            WalkState::BeforeWindow => {
                if last <= lo {
                    WalkState::Done
                } else {
                    if let Some(next) = split_piece(rows, current, lo)? {
                        current = next;
                        splits += 1;
                    }
                    WalkState::InWindow
                }
            }
            WalkState::InWindow => {
                if last > hi && split_piece(rows, current, hi)?.is_some() {
                    splits += 1;
                }
                claim_for_window(rows, current, window, lo, hi)?;
                WalkState::AfterWindow
            }
            WalkState::AfterWindow => WalkState::Done,
            WalkState::Done => break,
        };
    }
    Ok(splits)
}

/// Split `piece` at walk boundary `b` if it has features on both sides of it.
///
/// Returns the new downstream piece.
fn split_piece<R: FeatureRowsMut>(rows: &mut R, piece: PieceId, b: i64) -> Result<Option<PieceId>, TrimError> {
    let (feats, strand) = sorted_features(rows, piece)?;
    let Some(strand) = strand else {
        return Ok(None);
    };

    let spans: Vec<(FeatureId, i64, i64)> = feats
        .iter()
        .filter_map(|&fid| rows.feature(fid).map(|f| (fid, f.walk_span().0, f.walk_span().1)))
        .collect();
    let has_upstream = spans.iter().any(|&(_, ws, _)| ws < b);
    let has_downstream = spans.iter().any(|&(_, _, we)| we > b);
    if !(has_upstream && has_downstream) {
        return Ok(None);
    }

    let (transcript, position) = {
        let p = rows
            .piece(piece)
            .ok_or_else(|| TrimError::Structural(format!("unknown piece {piece}")))?;
        (p.transcript, p.position)
    };

    // make room right after this piece
    for pid in sorted_pieces(rows, transcript)? {
        let pos = rows.piece(pid).map(|p| p.position).unwrap_or_default();
        if pos > position {
            rows.set_position(pid, pos + 1);
        }
    }
    let next = rows.create_piece(transcript, position + 1);

    for (fid, ws, we) in spans {
        let Some(f) = rows.feature(fid).cloned() else { continue };
        if we <= b {
            continue;
        }
        if ws >= b {
            rows.update_feature(Feature { piece: next, ..f });
            continue;
        }

        // straddles b
        let (up_start, up_end) = genomic_span(ws, b, strand);
        let (down_start, down_end) = genomic_span(b, we, strand);

        let successor = Feature {
            start: down_start,
            end: down_end,
            start_is_biological_start: false,
            piece: next,
            ..f.clone()
        };
        rows.update_feature(Feature {
            start: up_start,
            end: up_end,
            end_is_biological_end: false,
            ..f
        });
        rows.create_feature(successor);
    }
    Ok(Some(next))
}

/// Assign every feature of `piece` lying inside `[lo, hi)` (walk space) to `window`.
fn claim_for_window<R: FeatureRowsMut>(
    rows: &mut R,
    piece: PieceId,
    window: CoordinateId,
    lo: i64,
    hi: i64,
) -> Result<(), TrimError> {
    let (feats, _) = sorted_features(rows, piece)?;
    for fid in feats {
        let Some(f) = rows.feature(fid).cloned() else { continue };
        let (ws, we) = f.walk_span();
        if lo <= ws && we <= hi && f.coordinate != window {
            rows.update_feature(Feature { coordinate: window, ..f });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::FeatureGraph;
    use crate::trim::queue::StagedGraph;

    fn feature_set<R: FeatureRows>(rows: &R, piece: PieceId) -> Vec<(FeatureType, u32, u32, bool, bool)> {
        let mut out: Vec<_> = rows
            .piece(piece)
            .unwrap()
            .features
            .iter()
            .map(|&fid| {
                let f = rows.feature(fid).unwrap();
                (f.kind, f.start, f.end, f.start_is_biological_start, f.end_is_biological_end)
            })
            .collect();
        out.sort();
        out
    }

    fn add(g: &mut FeatureGraph, piece: PieceId, kind: FeatureType, start: u32, end: u32, strand: Strand, bio: (bool, bool)) -> FeatureId {
        let fid = g.add_feature(piece, 0, kind, start, end, strand);
        g.features[fid].start_is_biological_start = bio.0;
        g.features[fid].end_is_biological_end = bio.1;
        fid
    }

    /// Transcript with transcribed [100,300) and coding [110,209) on chr1 [0,1000).
    fn simple_plus() -> FeatureGraph {
        let mut g = FeatureGraph::new();
        g.add_coordinate("puma", "chr1", 0, 1000, None);
        let sl = g.add_super_locus("G1");
        let t = g.add_transcript(sl, "T1");
        let p = g.create_piece(t, 0);
        add(&mut g, p, FeatureType::Transcribed, 100, 300, Strand::Plus, (true, true));
        add(&mut g, p, FeatureType::Coding, 110, 209, Strand::Plus, (true, true));
        g
    }

    /// Pieces AB (+, [190,210)) then CD (-, [90,110)) of one transcript on 'a' [0,1000).
    fn ab_cd() -> FeatureGraph {
        let mut g = FeatureGraph::new();
        g.add_coordinate("puma", "a", 0, 1000, None);
        let sl = g.add_super_locus("long");
        let t = g.add_transcript(sl, "long.1");
        let ab = g.create_piece(t, 0);
        let cd = g.create_piece(t, 1);
        add(&mut g, ab, FeatureType::Transcribed, 190, 210, Strand::Plus, (true, false));
        add(&mut g, cd, FeatureType::Transcribed, 90, 110, Strand::Minus, (false, true));
        g
    }

    fn window(g: &mut FeatureGraph, start: u32, end: u32) -> CoordinateId {
        let seqid = g.coordinates[0].seqid.clone();
        g.add_coordinate("puma", &seqid, start, end, None)
    }

    fn slice(g: &mut FeatureGraph, index: &IntervalIndex, coord: CoordinateId, strand: Strand) -> Result<SliceOutcome, TrimError> {
        let queue = {
            let mut staged = StagedGraph::new(g);
            let out = TranscriptTrimmer::new(index).apply_slice(&mut staged, 0, coord, strand)?;
            (out, staged.into_queue())
        };
        g.execute(queue.1)?;
        Ok(queue.0)
    }

    #[test]
    fn split_at_downstream_border() {
        let mut g = simple_plus();
        let w1 = window(&mut g, 0, 200);
        let w2 = window(&mut g, 200, 1000);
        let index = IntervalIndex::build(&g);

        assert_eq!(slice(&mut g, &index, w1, Strand::Plus).unwrap(), SliceOutcome::Sliced { splits: 1 });

        let pieces = sorted_pieces(&g, 0).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(
            feature_set(&g, pieces[0]),
            vec![
                (FeatureType::Transcribed, 100, 200, true, false),
                (FeatureType::Coding, 110, 200, true, false),
            ]
        );
        assert_eq!(
            feature_set(&g, pieces[1]),
            vec![
                (FeatureType::Transcribed, 200, 300, false, true),
                (FeatureType::Coding, 200, 209, false, true),
            ]
        );
        assert!(g.pieces[pieces[0]].features.iter().all(|&f| g.features[f].coordinate == w1));
        assert!(g.pieces[pieces[1]].features.iter().all(|&f| g.features[f].coordinate == 0));

        slice(&mut g, &index, w2, Strand::Plus).unwrap();
        assert_eq!(sorted_pieces(&g, 0).unwrap().len(), 2);
        assert!(g.pieces[pieces[1]].features.iter().all(|&f| g.features[f].coordinate == w2));
        assert_eq!(g.features.len(), 4);
    }

    #[test]
    fn minus_strand_keeps_5prime_part_upstream() {
        let mut g = FeatureGraph::new();
        g.add_coordinate("puma", "chr1", 0, 1000, None);
        let sl = g.add_super_locus("G1");
        let t = g.add_transcript(sl, "T1");
        let p = g.create_piece(t, 0);
        add(&mut g, p, FeatureType::Transcribed, 100, 300, Strand::Minus, (true, true));
        add(&mut g, p, FeatureType::Coding, 150, 290, Strand::Minus, (true, true));
        let w_hi = window(&mut g, 200, 1000);
        let index = IntervalIndex::build(&g);

        slice(&mut g, &index, w_hi, Strand::Minus).unwrap();
        let pieces = sorted_pieces(&g, 0).unwrap();
        assert_eq!(pieces.len(), 2);
        // 5' end of a minus transcript is at the high coordinate
        assert_eq!(
            feature_set(&g, pieces[0]),
            vec![
                (FeatureType::Transcribed, 200, 300, true, false),
                (FeatureType::Coding, 200, 290, true, false),
            ]
        );
        assert_eq!(
            feature_set(&g, pieces[1]),
            vec![
                (FeatureType::Transcribed, 100, 200, false, true),
                (FeatureType::Coding, 150, 200, false, true),
            ]
        );
    }

    #[test]
    fn directions_of_mixed_strand_pieces() {
        let mut g = ab_cd();
        let half1 = window(&mut g, 1, 200);
        let half2 = window(&mut g, 200, 400);
        let index = IntervalIndex::build(&g);

        slice(&mut g, &index, half1, Strand::Plus).unwrap();
        slice(&mut g, &index, half2, Strand::Plus).unwrap();
        slice(&mut g, &index, half1, Strand::Minus).unwrap();

        let pieces = sorted_pieces(&g, 0).unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0], 0);
        assert_eq!(pieces[2], 1);
        assert_eq!(feature_set(&g, pieces[0]), vec![(FeatureType::Transcribed, 190, 200, true, false)]);
        assert_eq!(feature_set(&g, pieces[1]), vec![(FeatureType::Transcribed, 200, 210, false, false)]);
        assert_eq!(feature_set(&g, pieces[2]), vec![(FeatureType::Transcribed, 90, 110, false, true)]);
        assert_eq!(g.features[g.pieces[pieces[1]].features[0]].coordinate, half2);
        assert_eq!(g.features[1].coordinate, half1);
        for f in &g.features {
            assert_eq!(g.pieces.iter().filter(|p| p.features.contains(&f.id)).count(), 1);
        }
    }

    #[test]
    fn tiny_windows_across_both_strands() {
        let mut g = ab_cd();
        let plus: Vec<_> = [(185, 195), (195, 205), (205, 215)]
            .into_iter()
            .map(|(s, e)| window(&mut g, s, e))
            .collect();
        let minus: Vec<_> = [(105, 115), (95, 105), (85, 95)]
            .into_iter()
            .map(|(s, e)| window(&mut g, s, e))
            .collect();
        let index = IntervalIndex::build(&g);

        for &w in &plus {
            slice(&mut g, &index, w, Strand::Plus).unwrap();
        }
        for &w in &minus {
            slice(&mut g, &index, w, Strand::Minus).unwrap();
        }

        let pieces = sorted_pieces(&g, 0).unwrap();
        let spans: Vec<_> = pieces
            .iter()
            .map(|&p| {
                let f = &g.features[g.pieces[p].features[0]];
                (f.start, f.end, f.strand)
            })
            .collect();
        assert_eq!(
            spans,
            vec![
                (190, 195, Strand::Plus),
                (195, 205, Strand::Plus),
                (205, 210, Strand::Plus),
                (105, 110, Strand::Minus),
                (95, 105, Strand::Minus),
                (90, 95, Strand::Minus),
            ]
        );
        // original pieces are kept at their ends of the chain
        assert_eq!(pieces[0], 0);
        assert_eq!(pieces[3], 1);
    }

    #[test]
    fn windows_without_features_are_reported() {
        let mut g = ab_cd();
        let before = window(&mut g, 0, 10);
        let after = window(&mut g, 399, 410);
        let between = window(&mut g, 149, 160);
        let index = IntervalIndex::build(&g);

        for (w, strand) in [
            (before, Strand::Plus),
            (after, Strand::Plus),
            (between, Strand::Plus),
            (between, Strand::Minus),
        ] {
            let err = slice(&mut g, &index, w, strand).unwrap_err();
            assert!(matches!(err, TrimError::NoFeaturesInSlice { .. }));
            assert!(err.is_recoverable());
        }
        assert_eq!(g.pieces.len(), 2);
    }

    #[test]
    fn opposite_strand_is_untouched() {
        let mut g = ab_cd();
        let w = window(&mut g, 100, 1000);
        let index = IntervalIndex::build(&g);
        slice(&mut g, &index, w, Strand::Plus).unwrap();
        assert_eq!(g.pieces.len(), 2);
        assert_eq!(g.features[1].start, 90);
        assert_eq!(g.features[1].coordinate, 0);

        let mut g = ab_cd();
        let w = window(&mut g, 1, 200);
        let index = IntervalIndex::build(&g);
        slice(&mut g, &index, w, Strand::Minus).unwrap();
        assert_eq!(g.pieces.len(), 2);
        assert_eq!(g.features[0].end, 210);
        assert_eq!(g.features[0].coordinate, 0);
    }

    #[test]
    fn reslice_at_same_spot_is_a_no_op() {
        let mut g = simple_plus();
        let w = window(&mut g, 0, 200);
        let index = IntervalIndex::build(&g);
        slice(&mut g, &index, w, Strand::Plus).unwrap();
        let (n_pieces, n_features) = (g.pieces.len(), g.features.len());

        assert_eq!(slice(&mut g, &index, w, Strand::Plus).unwrap(), SliceOutcome::AlreadySliced);
        assert_eq!((g.pieces.len(), g.features.len()), (n_pieces, n_features));
    }

    /// Plus piece 0: transcribed, coding and trans-splice donor region; piece 1
    /// continues the transcript further downstream on `second`.
    fn trans_spliced(second: Strand) -> FeatureGraph {
        let mut g = FeatureGraph::new();
        g.add_coordinate("puma", "a", 0, 2000, None);
        let sl = g.add_super_locus("ts");
        let t = g.add_transcript(sl, "ts.1");
        let a = g.create_piece(t, 0);
        let b = g.create_piece(t, 1);
        add(&mut g, a, FeatureType::Transcribed, 10, 500, Strand::Plus, (true, true));
        add(&mut g, a, FeatureType::Coding, 100, 500, Strand::Plus, (true, false));
        add(&mut g, a, FeatureType::TransSplicedIntron, 450, 500, Strand::Plus, (true, false));
        match second {
            Strand::Plus => {
                add(&mut g, b, FeatureType::Transcribed, 800, 1400, Strand::Plus, (true, true));
                add(&mut g, b, FeatureType::Coding, 800, 1200, Strand::Plus, (false, true));
                add(&mut g, b, FeatureType::TransSplicedIntron, 850, 1000, Strand::Plus, (false, true));
            }
            _ => {
                add(&mut g, b, FeatureType::Transcribed, 800, 1400, Strand::Minus, (true, true));
                add(&mut g, b, FeatureType::Coding, 1000, 1400, Strand::Minus, (false, true));
                add(&mut g, b, FeatureType::TransSplicedIntron, 1300, 1400, Strand::Minus, (false, true));
            }
        }
        g
    }

    #[test]
    fn trans_spliced_pieces_are_sliced_independently() {
        let mut g = trans_spliced(Strand::Plus);
        let w0 = window(&mut g, 0, 915);
        let w1 = window(&mut g, 915, 2000);
        let index = IntervalIndex::build(&g);

        slice(&mut g, &index, w0, Strand::Plus).unwrap();
        slice(&mut g, &index, w1, Strand::Plus).unwrap();

        let pieces = sorted_pieces(&g, 0).unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(&pieces[..2], &[0, 1]);
        let lens: Vec<_> = pieces.iter().map(|&p| g.pieces[p].features.len()).collect();
        assert_eq!(lens, vec![3, 3, 3]);
        assert_eq!(
            feature_set(&g, pieces[0]),
            vec![
                (FeatureType::Transcribed, 10, 500, true, true),
                (FeatureType::Coding, 100, 500, true, false),
                (FeatureType::TransSplicedIntron, 450, 500, true, false),
            ]
        );
        assert_eq!(
            feature_set(&g, pieces[2]),
            vec![
                (FeatureType::Transcribed, 915, 1400, false, true),
                (FeatureType::Coding, 915, 1200, false, true),
                (FeatureType::TransSplicedIntron, 915, 1000, false, true),
            ]
        );
        assert!(g.features.iter().all(|f| f.coordinate == w0 || f.coordinate == w1));
    }

    #[test]
    fn trans_spliced_flipped_second_half_first() {
        let mut g = trans_spliced(Strand::Minus);
        let w0 = window(&mut g, 0, 915);
        let w1 = window(&mut g, 915, 2000);
        let index = IntervalIndex::build(&g);

        slice(&mut g, &index, w1, Strand::Minus).unwrap();
        slice(&mut g, &index, w0, Strand::Minus).unwrap();
        slice(&mut g, &index, w0, Strand::Plus).unwrap();

        let pieces = sorted_pieces(&g, 0).unwrap();
        assert_eq!(pieces.len(), 3);
        let lens: Vec<_> = pieces.iter().map(|&p| g.pieces[p].features.len()).collect();
        assert_eq!(lens, vec![3, 3, 1]);
        assert_eq!(
            feature_set(&g, pieces[2]),
            vec![(FeatureType::Transcribed, 800, 915, false, true)]
        );
        assert!(g.features.iter().all(|f| f.coordinate == w0 || f.coordinate == w1));
        let positions: Vec<_> = pieces.iter().map(|&p| g.pieces[p].position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn mixed_strand_piece_is_structural() {
        let mut g = simple_plus();
        g.features[1].strand = Strand::Minus;
        let w = window(&mut g, 0, 200);
        let index = IntervalIndex::build(&g);
        let err = slice(&mut g, &index, w, Strand::Plus).unwrap_err();
        assert!(matches!(err, TrimError::Structural(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn second_biological_start_is_structural() {
        let mut g = FeatureGraph::new();
        g.add_coordinate("puma", "chr1", 0, 1000, None);
        let sl = g.add_super_locus("G1");
        let t = g.add_transcript(sl, "T1");
        let p = g.create_piece(t, 0);
        add(&mut g, p, FeatureType::Transcribed, 100, 200, Strand::Plus, (true, false));
        add(&mut g, p, FeatureType::Transcribed, 200, 300, Strand::Plus, (true, true));
        let w = window(&mut g, 0, 250);
        let index = IntervalIndex::build(&g);

        let err = slice(&mut g, &index, w, Strand::Plus).unwrap_err();
        assert!(matches!(err, TrimError::Structural(_)));
        // nothing was flushed
        assert_eq!(g.pieces.len(), 1);
        assert_eq!(g.features[1].coordinate, 0);
    }

    #[test]
    fn biological_end_must_close_the_piece() {
        let mut g = FeatureGraph::new();
        g.add_coordinate("puma", "chr1", 0, 1000, None);
        let sl = g.add_super_locus("G1");
        let t = g.add_transcript(sl, "T1");
        let p = g.create_piece(t, 0);
        // minus strand: [200,300) comes first in walk order
        add(&mut g, p, FeatureType::Coding, 200, 300, Strand::Minus, (true, true));
        add(&mut g, p, FeatureType::Coding, 100, 200, Strand::Minus, (false, true));
        assert!(matches!(sorted_features(&g, p), Err(TrimError::Structural(_))));

        g.features[0].end_is_biological_end = false;
        let (order, strand) = sorted_features(&g, p).unwrap();
        assert_eq!(order, vec![0, 1]);
        assert_eq!(strand, Some(Strand::Minus));
    }
}
