//! Distance kernels over sequence payloads.
//!
//! Four pure kernels are provided: Hamming, edit (Levenshtein), k-mer
//! Jaccard, and Needleman-Wunsch affine-gap alignment. The alignment kernel
//! comes in a sequential form and an anti-diagonal form that dispatches each
//! anti-diagonal of the score table to shared-memory workers; both return
//! identical scores.

use crate::error::{Error, Result};
use crate::fasta::Sequence;
use rayon::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;

/// Scoring parameters for Needleman-Wunsch global alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringParams {
	pub match_score: i32,
	pub mismatch: i32,
	pub gap_open: i32,
	pub gap_extend: i32,
}

impl Default for ScoringParams {
	fn default() -> Self {
		ScoringParams {
			match_score: 1,
			mismatch: -1,
			gap_open: -3,
			gap_extend: -1,
		}
	}
}

/// The distance applied to every pair by the matrix builder.
///
/// Dispatched once per pair at the site where the work is issued, so the
/// kernel inner loops stay monomorphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceKind {
	/// Position-wise mismatch count; requires equal lengths.
	Hamming,
	/// Unit-cost insertion, deletion, and substitution.
	Edit,
	/// Jaccard distance over length-`k` substring sets, scaled to 0..=100.
	Kmer { k: usize },
	/// Affine-gap alignment score converted to a distance.
	Needleman { params: ScoringParams },
}

impl DistanceKind {
	/// Distance between two sequences under this kernel.
	///
	/// `Hamming` reports `LengthMismatch` for unequal lengths; every other
	/// kernel is total.
	pub fn distance(&self, a: &Sequence, b: &Sequence) -> Result<i32> {
		match *self {
			DistanceKind::Hamming => hamming(&a.payload, &b.payload),
			DistanceKind::Edit => Ok(edit(&a.payload, &b.payload)),
			DistanceKind::Kmer { k } => Ok(kmer(&a.payload, &b.payload, k)),
			DistanceKind::Needleman { params } => {
				let score = needleman(&a.payload, &b.payload, &params);
				let bound = a.payload.len().max(b.payload.len()) as i32 * params.match_score;
				Ok((bound - score).max(0))
			}
		}
	}
}

impl FromStr for DistanceKind {
	type Err = Error;

	fn from_str(name: &str) -> Result<Self> {
		match name {
			"hamming" => Ok(DistanceKind::Hamming),
			"edit" => Ok(DistanceKind::Edit),
			"kmer" => Ok(DistanceKind::Kmer { k: 3 }),
			"needleman" => Ok(DistanceKind::Needleman {
				params: ScoringParams::default(),
			}),
			other => Err(Error::Config(format!(
				"unknown distance type {other:?}, expected hamming, edit, kmer, or needleman"
			))),
		}
	}
}

/// Hamming distance: number of differing positions.
///
/// Only defined for equal lengths; unequal inputs are a `LengthMismatch`.
pub fn hamming(a: &str, b: &str) -> Result<i32> {
	if a.len() != b.len() {
		return Err(Error::LengthMismatch(a.len(), b.len()));
	}
	Ok(a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count() as i32)
}

/// Edit (Levenshtein) distance with unit costs.
pub fn edit(a: &str, b: &str) -> i32 {
	let (a, b) = (a.as_bytes(), b.as_bytes());
	let mut prev: Vec<i32> = (0..=b.len() as i32).collect();
	let mut cur = vec![0i32; b.len() + 1];
	for i in 1..=a.len() {
		cur[0] = i as i32;
		for j in 1..=b.len() {
			let cost = i32::from(a[i - 1] != b[j - 1]);
			cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
		}
		std::mem::swap(&mut prev, &mut cur);
	}
	prev[b.len()]
}

/// K-mer Jaccard distance scaled to 0..=100.
///
/// Returns 100 when either sequence is shorter than `k` or the k-mer union
/// is empty. The percentage is computed in integer arithmetic,
/// `(|U| - |I|) * 100 / |U|`, which floors exactly.
pub fn kmer(a: &str, b: &str, k: usize) -> i32 {
	if k == 0 || a.len() < k || b.len() < k {
		return 100;
	}
	let set_a: HashSet<&[u8]> = a.as_bytes().windows(k).collect();
	let set_b: HashSet<&[u8]> = b.as_bytes().windows(k).collect();
	let inter = set_a.intersection(&set_b).count();
	let union = set_a.len() + set_b.len() - inter;
	if union == 0 {
		return 100;
	}
	((union - inter) * 100 / union) as i32
}

// Gap-state markers for the alignment tables.
const DIAG: u8 = 0;
const GAP_VERT: u8 = 1;
const GAP_HORIZ: u8 = 2;

#[inline]
fn substitution(a: u8, b: u8, params: &ScoringParams) -> i32 {
	if a == b {
		params.match_score
	} else {
		params.mismatch
	}
}

#[inline]
fn boundary_gap(t: usize, params: &ScoringParams) -> i32 {
	params.gap_open + (t as i32 - 1) * params.gap_extend
}

/// Needleman-Wunsch affine-gap global alignment score.
///
/// Fills a score table and a companion last-move table; a gap costs
/// `gap_extend` when it extends a gap in the same direction and `gap_open`
/// otherwise. Returns the bottom-right score.
pub fn needleman(a: &str, b: &str, params: &ScoringParams) -> i32 {
	let (a, b) = (a.as_bytes(), b.as_bytes());
	let (m, n) = (a.len(), b.len());
	if m == 0 && n == 0 {
		return 0;
	}
	if m == 0 {
		return boundary_gap(n, params);
	}
	if n == 0 {
		return boundary_gap(m, params);
	}
	let width = n + 1;
	let mut dp = vec![0i32; (m + 1) * width];
	let mut state = vec![DIAG; (m + 1) * width];
	for i in 1..=m {
		dp[i * width] = boundary_gap(i, params);
		state[i * width] = GAP_VERT;
	}
	for j in 1..=n {
		dp[j] = boundary_gap(j, params);
		state[j] = GAP_HORIZ;
	}
	for i in 1..=m {
		for j in 1..=n {
			let diag = dp[(i - 1) * width + j - 1] + substitution(a[i - 1], b[j - 1], params);
			let vert_pen = if state[(i - 1) * width + j] == GAP_VERT {
				params.gap_extend
			} else {
				params.gap_open
			};
			let vert = dp[(i - 1) * width + j] + vert_pen;
			let horiz_pen = if state[i * width + j - 1] == GAP_HORIZ {
				params.gap_extend
			} else {
				params.gap_open
			};
			let horiz = dp[i * width + j - 1] + horiz_pen;
			let best = diag.max(vert).max(horiz);
			dp[i * width + j] = best;
			state[i * width + j] = if best == vert {
				GAP_VERT
			} else if best == horiz {
				GAP_HORIZ
			} else {
				DIAG
			};
		}
	}
	dp[m * width + n]
}

/// Needleman-Wunsch score computed one anti-diagonal at a time.
///
/// All cells on an anti-diagonal depend only on the previous two diagonals,
/// so each diagonal is relaxed by parallel workers. Bit-identical to
/// [`needleman`].
pub fn needleman_diagonal(a: &str, b: &str, params: &ScoringParams) -> i32 {
	let (a, b) = (a.as_bytes(), b.as_bytes());
	let (m, n) = (a.len(), b.len());
	if m == 0 && n == 0 {
		return 0;
	}
	if m == 0 {
		return boundary_gap(n, params);
	}
	if n == 0 {
		return boundary_gap(m, params);
	}
	// Diagonal d holds cells (i, d - i); buffers are indexed by i.
	let mut prev2 = vec![0i32; m + 1];
	let mut prev = vec![0i32; m + 1];
	let mut cur = vec![0i32; m + 1];
	let mut gprev = vec![DIAG; m + 1];
	let mut gcur = vec![DIAG; m + 1];
	for d in 0..=(m + n) {
		let lo = d.saturating_sub(n);
		let hi = m.min(d);
		let params = *params;
		cur[lo..=hi]
			.par_iter_mut()
			.zip(gcur[lo..=hi].par_iter_mut())
			.enumerate()
			.for_each(|(off, (value, gstate))| {
				let i = lo + off;
				let j = d - i;
				if i == 0 {
					*value = if j == 0 { 0 } else { boundary_gap(j, &params) };
					*gstate = if j == 0 { DIAG } else { GAP_HORIZ };
				} else if j == 0 {
					*value = boundary_gap(i, &params);
					*gstate = GAP_VERT;
				} else {
					let diag = prev2[i - 1] + substitution(a[i - 1], b[j - 1], &params);
					let vert_pen = if gprev[i - 1] == GAP_VERT {
						params.gap_extend
					} else {
						params.gap_open
					};
					let vert = prev[i - 1] + vert_pen;
					let horiz_pen = if gprev[i] == GAP_HORIZ {
						params.gap_extend
					} else {
						params.gap_open
					};
					let horiz = prev[i] + horiz_pen;
					let best = diag.max(vert).max(horiz);
					*value = best;
					*gstate = if best == vert {
						GAP_VERT
					} else if best == horiz {
						GAP_HORIZ
					} else {
						DIAG
					};
				}
			});
		std::mem::swap(&mut prev2, &mut prev);
		std::mem::swap(&mut prev, &mut cur);
		std::mem::swap(&mut gprev, &mut gcur);
	}
	prev[m]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hamming_pairs() {
		assert_eq!(hamming("AAAA", "AAAT").unwrap(), 1);
		assert_eq!(hamming("AAAA", "ATAT").unwrap(), 2);
		assert_eq!(hamming("AAAT", "ATAT").unwrap(), 1);
		assert_eq!(hamming("ACGT", "ACGT").unwrap(), 0, "identity must be zero");
	}

	#[test]
	fn test_hamming_length_mismatch() {
		assert!(matches!(
			hamming("ACGT", "ACG"),
			Err(Error::LengthMismatch(4, 3))
		));
	}

	#[test]
	fn test_edit_small() {
		assert_eq!(edit("ACGT", "ACGA"), 1);
		assert_eq!(edit("ACGT", "ACGT"), 0);
		assert_eq!(edit("ACGT", "AGT"), 1);
		assert_eq!(edit("", "ACGT"), 4, "empty side equals the other length");
		assert_eq!(edit("kitten", "sitting"), 3);
	}

	#[test]
	fn test_edit_symmetric() {
		assert_eq!(edit("ACCGT", "AGT"), edit("AGT", "ACCGT"));
	}

	#[test]
	fn test_kmer_pairs() {
		assert_eq!(kmer("ACGT", "ACGT", 2), 0, "identical k-mer sets");
		assert_eq!(kmer("ACGT", "TTTT", 2), 100, "disjoint k-mer sets");
		assert_eq!(kmer("AC", "ACGT", 3), 100, "too short for k");
		// {AC,CG,GT} vs {AC,CT}: intersection 1, union 4.
		assert_eq!(kmer("ACGT", "ACT", 2), 75);
	}

	#[test]
	fn test_kmer_symmetric() {
		assert_eq!(kmer("ACGTAC", "GTACGT", 3), kmer("GTACGT", "ACGTAC", 3));
	}

	#[test]
	fn test_needleman_scores() {
		let p = ScoringParams::default();
		assert_eq!(needleman("ACGT", "ACGT", &p), 4);
		assert_eq!(needleman("ACGT", "ACGA", &p), 2);
		// One gap: three matches minus one gap open.
		assert_eq!(needleman("ACGT", "ACG", &p), 0);
		assert_eq!(needleman("", "ACGT", &p), -6, "affine boundary");
		assert_eq!(needleman("", "", &p), 0);
	}

	#[test]
	fn test_needleman_gap_extension() {
		let p = ScoringParams::default();
		// Two-base gap: two matches, one open, one extend.
		assert_eq!(needleman("ACGT", "AT", &p), -2);
	}

	#[test]
	fn test_needleman_symmetric() {
		let p = ScoringParams::default();
		for (a, b) in [("ACGT", "ACG"), ("ACGT", "AT"), ("ACGT", "ACGA")] {
			assert_eq!(needleman(a, b, &p), needleman(b, a, &p), "asymmetry on {a:?} / {b:?}");
		}
	}

	#[test]
	fn test_needleman_diagonal_matches_sequential() {
		let p = ScoringParams::default();
		let cases = [
			("ACGT", "ACGT"),
			("ACGT", "ACGA"),
			("ACGTACGTAC", "AGTACCGT"),
			("TTTT", "ACGT"),
			("", "ACGT"),
			("A", ""),
			("GATTACA", "GCATGCU"),
		];
		for (a, b) in cases {
			assert_eq!(
				needleman_diagonal(a, b, &p),
				needleman(a, b, &p),
				"diagonal schedule diverged on {a:?} / {b:?}"
			);
		}
	}

	#[test]
	fn test_distance_kind_parse() {
		assert_eq!("hamming".parse::<DistanceKind>().unwrap(), DistanceKind::Hamming);
		assert_eq!("kmer".parse::<DistanceKind>().unwrap(), DistanceKind::Kmer { k: 3 });
		assert!("cosine".parse::<DistanceKind>().is_err());
	}

	#[test]
	fn test_needleman_distance_conversion() {
		let kind = DistanceKind::Needleman {
			params: ScoringParams::default(),
		};
		let a = Sequence::new("a", "ACGT");
		let same = kind.distance(&a, &a).unwrap();
		assert_eq!(same, 0, "identical sequences must be at distance zero");
		let b = Sequence::new("b", "ACGA");
		assert_eq!(kind.distance(&a, &b).unwrap(), 2);
		let c = Sequence::new("c", "TGCA");
		assert!(kind.distance(&a, &c).unwrap() >= 0, "distances clamp at zero");
	}
}
