//! Canonical k-mer counts over coordinate sequences.
//!
//! A mer and its reverse complement share one entry, keyed by the
//! lexicographically smaller of the two. Windows containing a base outside
//! `ACGT` are not counted.

use std::collections::BTreeMap;

use log::warn;
use rayon::prelude::*;

use crate::model::coordinate::Coordinate;
use crate::model::graph::{FeatureGraph, FeatureRows};
use crate::model::types::CoordinateId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerCounter {
    k: usize,
    counts: BTreeMap<Vec<u8>, u64>,
    skipped: u64,
}

impl MerCounter {
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "MerCounter requires k > 0");
        Self {
            k,
            counts: BTreeMap::new(),
            skipped: 0,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Windows left out because they held an ambiguous base.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Count every `k`-long window of `seq` (case-insensitive).
    pub fn add_sequence(&mut self, seq: &str) {
        let bytes: Vec<u8> = seq.bytes().map(|b| b.to_ascii_uppercase()).collect();
        for mer in bytes.windows(self.k) {
            match canonical(mer) {
                Some(key) => *self.counts.entry(key).or_insert(0) += 1,
                None => self.skipped += 1,
            }
        }
    }

    pub fn merge(&mut self, other: MerCounter) {
        assert_eq!(self.k, other.k, "cannot merge counters of different k");
        for (mer, n) in other.counts {
            *self.counts.entry(mer).or_insert(0) += n;
        }
        self.skipped += other.skipped;
    }

    /// Observed canonical mers and their counts.
    pub fn export(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|(mer, &n)| (String::from_utf8_lossy(mer).into_owned(), n))
            .collect()
    }
}

fn complement(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(b'T'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'T' => Some(b'A'),
        _ => None,
    }
}

fn canonical(mer: &[u8]) -> Option<Vec<u8>> {
    let rc: Vec<u8> = mer.iter().rev().map(|&b| complement(b)).collect::<Option<_>>()?;
    Some(if rc.as_slice() < mer { rc } else { mer.to_vec() })
}

fn counters(min_k: usize, max_k: usize) -> Vec<MerCounter> {
    (min_k..=max_k).map(MerCounter::new).collect()
}

/// One counter per `k` in `min_k..=max_k` over the sequence of `coord`.
pub fn count_mers(coord: &Coordinate, min_k: usize, max_k: usize) -> Vec<MerCounter> {
    let mut out = counters(min_k, max_k);
    match coord.sequence.as_deref() {
        Some(seq) => out.iter_mut().for_each(|c| c.add_sequence(seq)),
        None => warn!(
            "Coordinate {} ({}:{}-{}) has no sequence; no mers counted",
            coord.id, coord.seqid, coord.start, coord.end
        ),
    }
    out
}

/// [`count_mers`] summed over `coords`, counted in parallel.
pub fn count_mers_all(graph: &FeatureGraph, coords: &[CoordinateId], min_k: usize, max_k: usize) -> Vec<MerCounter> {
    coords
        .par_iter()
        .filter_map(|&c| graph.coordinate(c))
        .map(|coord| count_mers(coord, min_k, max_k))
        .reduce(
            || counters(min_k, max_k),
            |mut acc, part| {
                for (a, p) in acc.iter_mut().zip(part) {
                    a.merge(p);
                }
                acc
            },
        )
}
