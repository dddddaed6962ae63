use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use coitrees::{BasicCOITree, Interval, IntervalTree};
use log::warn;

use crate::model::graph::{FeatureGraph, FeatureRows};
use crate::model::types::{FeatureId, SuperLocusId};
use crate::types::{RefBlock, Strand};

/// Metadata stored per tree node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureTag {
    pub feature: FeatureId,
    pub start: u32,
    pub end: u32,
}

/// Width of one tree block. Tree keys are `i32` and the trees subtract them, so
/// every key and every span inside one tree must stay below 2^31.
const BLOCK_BITS: u32 = 30;
const BLOCK_LEN: u32 = 1 << BLOCK_BITS;

/// Closed block-relative ranges `(block, first, last)` covering `[start, end)`.
fn block_ranges(start: u32, end: u32) -> impl Iterator<Item = (u32, i32, i32)> {
    let last = end - 1;
    ((start >> BLOCK_BITS)..=(last >> BLOCK_BITS)).map(move |block| {
        let base = block << BLOCK_BITS;
        let first = start.max(base) - base;
        let last = last.min(base + (BLOCK_LEN - 1)) - base;
        (block, first as i32, last as i32)
    })
}

/// Interval trees of one sequence id and strand, one per occupied block.
#[derive(Default)]
pub struct StrandTree {
    blocks: BTreeMap<u32, BasicCOITree<FeatureTag, u32>>,
    n_features: usize,
}

impl StrandTree {
    fn build(features: &[FeatureTag]) -> Self {
        let mut nodes: BTreeMap<u32, Vec<Interval<FeatureTag>>> = BTreeMap::new();
        for &tag in features {
            for (block, first, last) in block_ranges(tag.start, tag.end) {
                nodes.entry(block).or_default().push(Interval {
                    first,
                    last,
                    metadata: tag,
                });
            }
        }
        Self {
            blocks: nodes
                .into_iter()
                .map(|(block, nodes)| (block, BasicCOITree::new(nodes.as_slice())))
                .collect(),
            n_features: features.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.n_features
    }

    pub fn is_empty(&self) -> bool {
        self.n_features == 0
    }

    /// Visit every stored feature whose block range meets `[start, end)`.
    fn visit(&self, start: u32, end: u32, mut f: impl FnMut(&FeatureTag)) {
        for (block, first, last) in block_ranges(start, end) {
            if let Some(tree) = self.blocks.get(&block) {
                tree.query(first, last, |node| f(&node.metadata));
            }
        }
    }
}

/// Plus- and minus-strand trees of one sequence id.
#[derive(Default)]
pub struct StrandTrees {
    plus: StrandTree,
    minus: StrandTree,
}

impl StrandTrees {
    fn tree(&self, strand: Strand) -> Option<&StrandTree> {
        match strand {
            Strand::Plus => Some(&self.plus),
            Strand::Minus => Some(&self.minus),
            Strand::Unknown => None,
        }
    }
}

/// Overlap index over feature ranges: one interval tree per sequence id and strand.
///
/// Built once from a [`FeatureGraph`]; the index stores feature ids plus the
/// extent each feature had at build time. Splitting a feature never changes the
/// union of extents, so a slightly stale index still answers "does anything of
/// this transcript touch the window" correctly.
pub struct IntervalIndex {
    trees: BTreeMap<String, StrandTrees>,
    n_features: usize,
}

/// Human-readable summary: one line per sequence id with the indexed features per strand.
impl fmt::Display for IntervalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "IntervalIndex: {} features on {} sequences",
            self.n_features,
            self.trees.len()
        )?;
        for (seqid, trees) in &self.trees {
            writeln!(
                f,
                "  - {}: plus={}, minus={}",
                seqid,
                trees.plus.len(),
                trees.minus.len()
            )?;
        }
        Ok(())
    }
}

impl IntervalIndex {
    /// Bulk-load the trees from every feature of `graph`.
    ///
    /// Features with an unknown strand cannot be queried by strand and are skipped.
    ///
    /// ```
    /// use gene_tiler::index::IntervalIndex;
    /// use gene_tiler::model::FeatureGraph;
    /// use gene_tiler::model::FeatureRowsMut;
    /// use gene_tiler::model::types::FeatureType;
    /// use gene_tiler::types::Strand;
    ///
    /// let mut g = FeatureGraph::new();
    /// let c = g.add_coordinate("puma", "chr1", 0, 1000, None);
    /// let sl = g.add_super_locus("G1");
    /// let t = g.add_transcript(sl, "T1");
    /// let p = g.create_piece(t, 0);
    /// g.add_feature(p, c, FeatureType::Transcribed, 100, 300, Strand::Plus);
    ///
    /// let idx = IntervalIndex::build(&g);
    /// assert_eq!(idx.query("chr1", 299, 400, Strand::Plus), vec![0]);
    /// assert!(idx.query("chr1", 300, 400, Strand::Plus).is_empty());
    /// assert!(idx.query("chr1", 0, 1000, Strand::Minus).is_empty());
    /// ```
    pub fn build(graph: &FeatureGraph) -> Self {
        let mut tags: BTreeMap<String, (Vec<FeatureTag>, Vec<FeatureTag>)> = BTreeMap::new();
        let mut n_features = 0usize;
        let mut n_skipped = 0usize;

        for feat in &graph.features {
            let Some(coord) = graph.coordinate(feat.coordinate) else {
                continue;
            };
            let tag = FeatureTag {
                feature: feat.id,
                start: feat.start,
                end: feat.end,
            };
            let entry = tags.entry(coord.seqid.clone()).or_default();
            match feat.strand {
                Strand::Plus => entry.0.push(tag),
                Strand::Minus => entry.1.push(tag),
                Strand::Unknown => {
                    n_skipped += 1;
                    continue;
                }
            }
            n_features += 1;
        }

        if n_skipped > 0 {
            warn!("{n_skipped} features without strand were not indexed");
        }

        let trees = tags
            .into_iter()
            .map(|(seqid, (plus, minus))| {
                (
                    seqid,
                    StrandTrees {
                        plus: StrandTree::build(&plus),
                        minus: StrandTree::build(&minus),
                    },
                )
            })
            .collect();

        Self { trees, n_features }
    }

    pub fn len(&self) -> usize {
        self.n_features
    }

    pub fn is_empty(&self) -> bool {
        self.n_features == 0
    }

    /// Features overlapping `[start, end)` on `seqid` and `strand`; sorted, deduplicated.
    pub fn query(&self, seqid: &str, start: u32, end: u32, strand: Strand) -> Vec<FeatureId> {
        if end <= start {
            return Vec::new();
        }
        let Some(tree) = self.trees.get(seqid).and_then(|t| t.tree(strand)) else {
            return Vec::new();
        };

        let window = RefBlock::new(start, end);
        let mut out: Vec<FeatureId> = Vec::new();
        tree.visit(start, end, |tag| {
            if window.overlaps(RefBlock { start: tag.start, end: tag.end }) {
                out.push(tag.feature);
            }
        });
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Super-loci owning at least one feature in the window.
    pub fn super_loci_in(
        &self,
        graph: &FeatureGraph,
        seqid: &str,
        start: u32,
        end: u32,
        strand: Strand,
    ) -> BTreeSet<SuperLocusId> {
        self.query(seqid, start, end, strand)
            .into_iter()
            .filter_map(|fid| graph.super_locus_of_feature(fid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::FeatureRowsMut;
    use crate::model::types::FeatureType;

    fn two_loci() -> FeatureGraph {
        let mut g = FeatureGraph::new();
        let c1 = g.add_coordinate("puma", "chr1", 0, 5000, None);
        let c2 = g.add_coordinate("puma", "chr2", 0, 5000, None);

        let a = g.add_super_locus("A");
        let ta = g.add_transcript(a, "A.1");
        let pa = g.create_piece(ta, 0);
        g.add_feature(pa, c1, FeatureType::Transcribed, 100, 900, Strand::Plus);
        g.add_feature(pa, c1, FeatureType::Coding, 150, 800, Strand::Plus);

        let b = g.add_super_locus("B");
        let tb = g.add_transcript(b, "B.1");
        let pb = g.create_piece(tb, 0);
        g.add_feature(pb, c1, FeatureType::Transcribed, 700, 1500, Strand::Minus);

        let c = g.add_super_locus("C");
        let tc = g.add_transcript(c, "C.1");
        let pc = g.create_piece(tc, 0);
        g.add_feature(pc, c2, FeatureType::Transcribed, 0, 10, Strand::Plus);
        g
    }

    #[test]
    fn query_respects_strand_and_half_open_bounds() {
        let g = two_loci();
        let idx = IntervalIndex::build(&g);
        assert_eq!(idx.len(), 4);

        assert_eq!(idx.query("chr1", 0, 1000, Strand::Plus), vec![0, 1]);
        assert_eq!(idx.query("chr1", 0, 1000, Strand::Minus), vec![2]);
        assert_eq!(idx.query("chr1", 800, 900, Strand::Plus), vec![0]);
        assert!(idx.query("chr1", 900, 1000, Strand::Plus).is_empty());
        assert!(idx.query("chr1", 0, 100, Strand::Plus).is_empty());
        assert_eq!(idx.query("chr2", 9, 10, Strand::Plus), vec![3]);
        assert!(idx.query("chr3", 0, 10, Strand::Plus).is_empty());
        assert!(idx.query("chr1", 0, 1000, Strand::Unknown).is_empty());
    }

    #[test]
    fn super_loci_lookup() {
        let g = two_loci();
        let idx = IntervalIndex::build(&g);
        let plus: Vec<_> = idx.super_loci_in(&g, "chr1", 0, 5000, Strand::Plus).into_iter().collect();
        assert_eq!(plus, vec![0]);
        let minus: Vec<_> = idx.super_loci_in(&g, "chr1", 1000, 1200, Strand::Minus).into_iter().collect();
        assert_eq!(minus, vec![1]);
    }

    #[test]
    fn positions_past_two_gigabases() {
        let mut g = FeatureGraph::new();
        let c = g.add_coordinate("puma", "chr1", 0, u32::MAX, None);
        let sl = g.add_super_locus("big");
        let t = g.add_transcript(sl, "big.1");
        let p = g.create_piece(t, 0);
        g.add_feature(p, c, FeatureType::Transcribed, 2_147_483_000, 2_147_484_000, Strand::Plus);
        g.add_feature(p, c, FeatureType::Coding, 2_147_483_648, 2_147_483_700, Strand::Plus);
        g.add_feature(p, c, FeatureType::Error, 4_294_967_000, u32::MAX, Strand::Plus);
        g.add_feature(p, c, FeatureType::Error, 0, 1, Strand::Plus);

        let idx = IntervalIndex::build(&g);
        assert_eq!(idx.len(), 4);
        assert_eq!(idx.query("chr1", 2_147_483_600, 2_147_483_650, Strand::Plus), vec![0, 1]);
        assert_eq!(idx.query("chr1", 2_147_483_000, 2_147_483_001, Strand::Plus), vec![0]);
        assert!(idx.query("chr1", 2_147_484_000, 2_147_485_000, Strand::Plus).is_empty());
        assert_eq!(idx.query("chr1", 4_294_967_294, u32::MAX, Strand::Plus), vec![2]);
        assert_eq!(idx.query("chr1", 0, 10, Strand::Plus), vec![3]);
        assert_eq!(idx.query("chr1", 0, u32::MAX, Strand::Plus), vec![0, 1, 2, 3]);
    }

    #[test]
    fn display_summarises_per_sequence() {
        let idx = IntervalIndex::build(&two_loci());
        let s = idx.to_string();
        assert!(s.contains("IntervalIndex: 4 features on 2 sequences"));
        assert!(s.contains("chr1: plus=2, minus=1"));
    }
}
