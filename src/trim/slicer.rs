use std::collections::BTreeMap;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::TrimError;
use crate::index::IntervalIndex;
use crate::model::graph::FeatureGraph;
use crate::model::types::{CoordinateId, ProcessingSet, SuperLocusId};
use crate::partition::partition;
use crate::trim::queue::{SliceQueue, StagedGraph};
use crate::trim::trimmer::{SliceOutcome, TranscriptTrimmer};
use crate::types::Strand;

/// Settings of a slicing run.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceOptions {
    /// Tile length in bp.
    pub window: u32,
    pub train_ratio: f64,
    pub dev_ratio: f64,
    /// Seeds the train/dev/test assignment.
    pub seed: String,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            window: 2_000_000,
            train_ratio: 0.8,
            dev_ratio: 0.1,
            seed: "puma".to_string(),
        }
    }
}

/// What happened during [`SliceController::slice_annotations`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceReport {
    pub loci_committed: usize,
    pub loci_failed: Vec<(SuperLocusId, TrimError)>,
    pub splits: usize,
    /// (transcript, window, strand) combinations without features.
    pub skipped: usize,
    pub records: usize,
}

/// Work and outcome of one super-locus batch.
struct LocusBatch {
    queue: SliceQueue,
    splits: usize,
    skipped: usize,
}

/// Re-tiles a genome and re-partitions every transcript onto the new tiles.
#[derive(Debug, Clone, Default)]
pub struct SliceController {
    pub opts: SliceOptions,
}

impl SliceController {
    pub fn new(opts: SliceOptions) -> Self {
        Self { opts }
    }

    /// Tile + slice in one go; returns the new windows and the slicing report.
    pub fn run(&self, graph: &mut FeatureGraph) -> (Vec<CoordinateId>, SliceReport) {
        let windows = self.tile(graph);
        let report = self.slice_annotations(graph, &windows);
        (windows, report)
    }

    /// Create one Coordinate per window of every existing Coordinate and tag it
    /// train/dev/test.
    ///
    /// The same seed always gives the same tags.
    pub fn tile(&self, graph: &mut FeatureGraph) -> Vec<CoordinateId> {
        let mut rng = StdRng::seed_from_u64(seed_from_str(&self.opts.seed));
        let originals: Vec<CoordinateId> = (0..graph.coordinates.len()).collect();

        let mut windows = Vec::new();
        for cid in originals {
            let (genome, seqid, start, len) = {
                let c = &graph.coordinates[cid];
                (c.genome.clone(), c.seqid.clone(), c.start, c.len())
            };
            for (s, e) in partition(len, self.opts.window) {
                let sequence = graph.coordinates[cid]
                    .subsequence(start + s, start + e)
                    .map(|seq| seq.to_string());
                let id = graph.add_coordinate(&genome, &seqid, start + s, start + e, sequence);
                let set = self.draw_set(&mut rng);
                graph.processing_sets.insert(id, set);
                windows.push(id);
            }
        }
        info!(
            "Tiled {} sequences into {} windows of up to {} bp",
            graph.coordinates.len() - windows.len(),
            windows.len(),
            self.opts.window
        );
        windows
    }

    fn draw_set(&self, rng: &mut StdRng) -> ProcessingSet {
        let r: f64 = rng.gen();
        if r < self.opts.train_ratio {
            ProcessingSet::Train
        } else if r < self.opts.train_ratio + self.opts.dev_ratio {
            ProcessingSet::Dev
        } else {
            ProcessingSet::Test
        }
    }

    /// Re-partition every transcript onto `windows`.
    ///
    /// Super-loci are trimmed in parallel against the read-only graph, each into its
    /// own batch; successful batches are flushed one after another. A structural
    /// error discards the batch of its locus only.
    pub fn slice_annotations(&self, graph: &mut FeatureGraph, windows: &[CoordinateId]) -> SliceReport {
        let index = IntervalIndex::build(graph);
        let work = assign_windows(graph, &index, windows);
        debug!("{} super-loci touched by {} windows", work.len(), windows.len());

        let results: Vec<(SuperLocusId, Result<LocusBatch, TrimError>)> = {
            let base: &FeatureGraph = graph;
            work.par_iter()
                .map(|(&sl, todo)| (sl, trim_locus(base, &index, sl, todo)))
                .collect()
        };

        let mut report = SliceReport::default();
        for (sl, result) in results {
            match result.and_then(|batch| {
                let n = graph.execute(batch.queue)?;
                Ok((batch.splits, batch.skipped, n))
            }) {
                Ok((splits, skipped, n)) => {
                    report.loci_committed += 1;
                    report.splits += splits;
                    report.skipped += skipped;
                    report.records += n;
                }
                Err(e) => {
                    warn!("discarding slicing batch of super-locus {sl}: {e}");
                    report.loci_failed.push((sl, e));
                }
            }
        }

        info!(
            "Sliced {} super-loci ({} failed): {} splits, {} records",
            report.loci_committed,
            report.loci_failed.len(),
            report.splits,
            report.records
        );
        report
    }
}

/// Per super-locus: windows to apply, plus strand ascending then minus strand descending.
fn assign_windows(
    graph: &FeatureGraph,
    index: &IntervalIndex,
    windows: &[CoordinateId],
) -> BTreeMap<SuperLocusId, Vec<(CoordinateId, Strand)>> {
    let mut ordered: Vec<CoordinateId> = windows.to_vec();
    ordered.sort_by(|&a, &b| {
        let (ca, cb) = (&graph.coordinates[a], &graph.coordinates[b]);
        (&ca.seqid, ca.start).cmp(&(&cb.seqid, cb.start))
    });

    let mut work: BTreeMap<SuperLocusId, Vec<(CoordinateId, Strand)>> = BTreeMap::new();
    for strand in [Strand::Plus, Strand::Minus] {
        let pass: Box<dyn Iterator<Item = &CoordinateId>> = match strand {
            Strand::Minus => Box::new(ordered.iter().rev()),
            _ => Box::new(ordered.iter()),
        };
        for &cid in pass {
            let c = &graph.coordinates[cid];
            for sl in index.super_loci_in(graph, &c.seqid, c.start, c.end, strand) {
                work.entry(sl).or_default().push((cid, strand));
            }
        }
    }
    work
}

fn trim_locus(
    base: &FeatureGraph,
    index: &IntervalIndex,
    sl: SuperLocusId,
    todo: &[(CoordinateId, Strand)],
) -> Result<LocusBatch, TrimError> {
    let transcripts = base
        .super_loci
        .get(sl)
        .ok_or_else(|| TrimError::Structural(format!("unknown super-locus {sl}")))?
        .transcript_ids()
        .to_vec();

    let trimmer = TranscriptTrimmer::new(index);
    let mut staged = StagedGraph::new(base);
    let mut splits = 0usize;
    let mut skipped = 0usize;

    for &(window, strand) in todo {
        for &tid in &transcripts {
            match trimmer.apply_slice(&mut staged, tid, window, strand) {
                Ok(SliceOutcome::Sliced { splits: n }) => splits += n,
                Ok(SliceOutcome::AlreadySliced) => {}
                Err(e) if e.is_recoverable() => {
                    debug!("transcript {tid}: {e}");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(LocusBatch {
        queue: staged.into_queue(),
        splits,
        skipped,
    })
}

/// FNV-1a; stable across platforms and releases.
fn seed_from_str(seed: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in seed.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::FeatureRowsMut;
    use crate::model::types::FeatureType;
    use crate::trim::trimmer::sorted_pieces;

    fn two_genes() -> FeatureGraph {
        let mut g = FeatureGraph::new();
        let c = g.add_coordinate("puma", "1", 0, 400, Some("ACGT".repeat(100)));
        let a = g.add_super_locus("A");
        let ta = g.add_transcript(a, "A.1");
        let pa = g.create_piece(ta, 0);
        g.add_feature(pa, c, FeatureType::Transcribed, 10, 250, Strand::Plus);
        g.add_feature(pa, c, FeatureType::Coding, 20, 240, Strand::Plus);

        let b = g.add_super_locus("B");
        let tb = g.add_transcript(b, "B.1");
        let pb = g.create_piece(tb, 0);
        g.add_feature(pb, c, FeatureType::Transcribed, 90, 390, Strand::Minus);
        g
    }

    #[test]
    fn tile_slices_sequence_and_tags_windows() {
        let mut g = two_genes();
        let ctl = SliceController::new(SliceOptions { window: 100, ..Default::default() });
        let windows = ctl.tile(&mut g);
        assert_eq!(windows, vec![1, 2, 3, 4]);
        assert_eq!(g.coordinates[2].start, 100);
        assert_eq!(g.coordinates[2].end, 200);
        assert_eq!(g.coordinates[2].sequence.as_deref(), Some(&"ACGT".repeat(25)[..]));
        assert_eq!(g.processing_sets.len(), 4);
        assert!(!g.processing_sets.contains_key(&0));
    }

    #[test]
    fn processing_sets_are_reproducible_and_follow_ratios() {
        let mut g = FeatureGraph::new();
        g.add_coordinate("puma", "1", 0, 100_000, None);
        let ctl = SliceController::new(SliceOptions { window: 100, ..Default::default() });

        let mut a = g.clone();
        let mut b = g.clone();
        ctl.tile(&mut a);
        ctl.tile(&mut b);
        assert_eq!(a.processing_sets, b.processing_sets);

        let n = a.processing_sets.len() as f64;
        let train = a.processing_sets.values().filter(|&&s| s == ProcessingSet::Train).count() as f64;
        let dev = a.processing_sets.values().filter(|&&s| s == ProcessingSet::Dev).count() as f64;
        assert!((train / n - 0.8).abs() < 0.05);
        assert!((dev / n - 0.1).abs() < 0.05);

        let other = SliceController::new(SliceOptions {
            window: 100,
            seed: "lynx".to_string(),
            ..Default::default()
        });
        let mut c = g.clone();
        other.tile(&mut c);
        assert_ne!(a.processing_sets, c.processing_sets);
    }

    #[test]
    fn slicing_moves_every_feature_onto_a_window() {
        let mut g = two_genes();
        let ctl = SliceController::new(SliceOptions { window: 100, ..Default::default() });
        let (windows, report) = ctl.run(&mut g);

        assert!(report.loci_failed.is_empty());
        assert_eq!(report.loci_committed, 2);
        // A: 10..250 cut at 100 and 200; B: 90..390 cut at 300, 200 and 100
        assert_eq!(report.splits, 5);
        assert_eq!(sorted_pieces(&g, 0).unwrap().len(), 3);
        assert_eq!(sorted_pieces(&g, 1).unwrap().len(), 4);
        assert!(g.features.iter().all(|f| windows.contains(&f.coordinate)));
        for f in &g.features {
            let c = &g.coordinates[f.coordinate];
            assert!(c.start <= f.start && f.end <= c.end);
        }

        // running the same windows again changes nothing
        let before = g.clone();
        let again = ctl.slice_annotations(&mut g, &windows);
        assert_eq!(again.splits, 0);
        assert_eq!(g, before);
    }

    #[test]
    fn structural_error_discards_only_its_locus() {
        let mut g = two_genes();
        // corrupt locus A: second feature on the other strand
        g.features[1].strand = Strand::Minus;
        let ctl = SliceController::new(SliceOptions { window: 100, ..Default::default() });
        let (_, report) = ctl.run(&mut g);

        assert_eq!(report.loci_failed.len(), 1);
        assert_eq!(report.loci_failed[0].0, 0);
        assert!(matches!(report.loci_failed[0].1, TrimError::Structural(_)));
        assert_eq!(report.loci_committed, 1);
        assert_eq!(g.transcripts[0].pieces.len(), 1);
        assert_eq!(g.features[0].coordinate, 0);
        assert_eq!(sorted_pieces(&g, 1).unwrap().len(), 4);
    }

    #[test]
    fn conflicting_biological_starts_discard_the_locus() {
        let mut g = two_genes();
        // second transcribed feature on A.1 claiming its own TSS
        g.add_feature(0, 0, FeatureType::Transcribed, 250, 300, Strand::Plus);
        let ctl = SliceController::new(SliceOptions { window: 100, ..Default::default() });
        let (_, report) = ctl.run(&mut g);

        assert_eq!(report.loci_failed.len(), 1);
        assert_eq!(report.loci_failed[0].0, 0);
        assert!(matches!(report.loci_failed[0].1, TrimError::Structural(_)));
        assert_eq!(g.transcripts[0].pieces.len(), 1);
        assert!(g.features[..2].iter().all(|f| f.coordinate == 0));
        assert_eq!(sorted_pieces(&g, 1).unwrap().len(), 4);
    }

    #[test]
    fn sliced_windows_numerify() {
        use crate::numerify::labels::CDS;
        use crate::numerify::transitions::{CODING_CUT_START, TRANSCRIBED_CUT_START, TSS};
        use crate::numerify::{numerify_all, ChunkMeta, NumerifyOptions};

        let mut g = two_genes();
        let ctl = SliceController::new(SliceOptions { window: 100, ..Default::default() });
        let (windows, _) = ctl.run(&mut g);

        let opts = NumerifyOptions { chunk_size: 100, ..Default::default() };
        let results = numerify_all(&g, &windows, opts);
        assert!(results.iter().all(|(_, r)| r.is_ok()));

        let mid = results[1].1.as_ref().unwrap();
        assert_eq!(mid.len(), 2);
        assert_eq!(mid.meta[0], ChunkMeta { start: 100, end: 200, strand: Strand::Plus });
        assert!(mid.labels[0].column(CDS).iter().all(|&v| v == 1));
        assert_eq!(mid.transitions[0][[0, TRANSCRIBED_CUT_START]], 1);
        assert_eq!(mid.transitions[0][[0, CODING_CUT_START]], 1);
        assert_eq!(mid.transitions[0][[0, TSS]], 0);
    }
}
