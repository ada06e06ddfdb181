//! Pairwise distance-matrix construction.
//!
//! The n(n-1)/2 unordered pairs are indexed linearly and split into
//! contiguous ranges across the rank group; within a rank the range is
//! chewed through by shared-memory workers in small chunks, since pair cost
//! varies with sequence length. Each rank emits (i, j, d) triples and the
//! root assembles the symmetric matrix.

use crate::comm::{Communicator, SelfComm};
use crate::distance::DistanceKind;
use crate::error::{Error, Result};
use crate::fasta::Sequence;
use crate::matrix::{SquareMatrix, INF};
use rayon::prelude::*;

/// Number of unordered pairs with first index below `i`.
#[inline]
pub(crate) fn pairs_before(i: usize, n: usize) -> usize {
	i * n - i * (i + 1) / 2
}

/// Map a linear pair index to its (i, j) pair, i < j.
///
/// The float estimate of the row can be off by one at range boundaries, so
/// it is corrected against the exact pair counts.
pub fn pair_of_index(p: usize, n: usize) -> (usize, usize) {
	debug_assert!(p < n * (n - 1) / 2, "pair index out of range");
	let t2 = (2 * n - 1) as f64;
	let disc = t2 * t2 - 8.0 * p as f64;
	let mut i = ((t2 - disc.sqrt()) / 2.0) as usize;
	while pairs_before(i + 1, n) <= p {
		i += 1;
	}
	while pairs_before(i, n) > p {
		i -= 1;
	}
	let j = p - pairs_before(i, n) + i + 1;
	(i, j)
}

/// Distance for one pair, with the length-mismatch sentinel substitution.
#[inline]
fn pair_distance(kind: &DistanceKind, a: &Sequence, b: &Sequence) -> Result<i32> {
	match kind.distance(a, b) {
		Ok(d) => Ok(d),
		Err(Error::LengthMismatch(..)) => Ok(INF),
		Err(e) => Err(e),
	}
}

/// Compute the (i, j, d) triples for a contiguous range of pair indices.
fn local_triples(
	sequences: &[Sequence],
	kind: &DistanceKind,
	start: usize,
	count: usize,
) -> Result<Vec<i32>> {
	let n = sequences.len();
	let triples: Vec<[i32; 3]> = (0..count)
		.into_par_iter()
		.with_max_len(32)
		.map(|offset| -> Result<[i32; 3]> {
			let (i, j) = pair_of_index(start + offset, n);
			let d = pair_distance(kind, &sequences[i], &sequences[j])?;
			Ok([i as i32, j as i32, d])
		})
		.collect::<Result<_>>()?;
	Ok(triples.into_iter().flatten().collect())
}

/// Build the full distance matrix on a single process.
pub fn build_matrix(sequences: &[Sequence], kind: &DistanceKind) -> Result<SquareMatrix> {
	Ok(build_matrix_distributed(&SelfComm, sequences, kind)?
		.expect("a group of one always holds the result"))
}

/// Build the distance matrix across a rank group.
///
/// Every rank passes the same sequence slice. Pair ranges are contiguous
/// with remainder pairs going to the lowest ranks; the root gathers all
/// triples and returns `Some(matrix)`, other ranks return `None`.
pub fn build_matrix_distributed<C: Communicator>(
	comm: &C,
	sequences: &[Sequence],
	kind: &DistanceKind,
) -> Result<Option<SquareMatrix>> {
	let n = sequences.len();
	let total = n * (n - 1) / 2;
	let (size, rank) = (comm.size(), comm.rank());
	let per = total / size;
	let rem = total % size;
	let start = rank * per + rank.min(rem);
	let count = per + usize::from(rank < rem);
	tracing::info!(n, total, rank, count, "distance matrix build started");

	let local = local_triples(sequences, kind, start, count)?;
	let gathered = comm.gatherv(0, local);

	let Some(triples) = gathered else {
		return Ok(None);
	};
	debug_assert_eq!(triples.len(), 3 * total, "gathered triple count");
	let mut matrix = SquareMatrix::zeros(n)?;
	for triple in triples.chunks_exact(3) {
		let (i, j, d) = (triple[0] as usize, triple[1] as usize, triple[2]);
		matrix.set(i, j, d);
		matrix.set(j, i, d);
	}
	tracing::info!(n, "distance matrix assembled");
	Ok(Some(matrix))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::comm::run_group;

	fn seqs(payloads: &[&str]) -> Vec<Sequence> {
		payloads
			.iter()
			.enumerate()
			.map(|(i, p)| Sequence::new(format!("seq{i}"), *p))
			.collect()
	}

	#[test]
	fn test_pair_bijection_exhaustive() {
		for n in 2..=40 {
			let mut expected = Vec::new();
			for i in 0..n {
				for j in (i + 1)..n {
					expected.push((i, j));
				}
			}
			for (p, &want) in expected.iter().enumerate() {
				assert_eq!(pair_of_index(p, n), want, "bijection broken at n={n} p={p}");
			}
		}
	}

	#[test]
	fn test_edit_matrix_small() {
		let d = build_matrix(&seqs(&["ACGT", "ACGA", "ACGT"]), &DistanceKind::Edit).unwrap();
		let want = SquareMatrix::from_rows(&[&[0, 1, 0], &[1, 0, 1], &[0, 1, 0]]);
		assert_eq!(d, want, "edit matrix not as expected");
	}

	#[test]
	fn test_hamming_matrix() {
		let d = build_matrix(&seqs(&["AAAA", "AAAT", "ATAT"]), &DistanceKind::Hamming).unwrap();
		assert_eq!(d.get(0, 1), 1);
		assert_eq!(d.get(0, 2), 2);
		assert_eq!(d.get(1, 2), 1);
		assert_eq!(d.get(2, 1), 1, "matrix must be symmetric");
		assert_eq!(d.get(1, 1), 0, "diagonal must be zero");
	}

	#[test]
	fn test_hamming_mismatch_becomes_inf() {
		let d = build_matrix(&seqs(&["ACGT", "ACG"]), &DistanceKind::Hamming).unwrap();
		assert_eq!(d.get(0, 1), INF, "length mismatch must map to INF");
	}

	#[test]
	fn test_single_sequence() {
		let d = build_matrix(&seqs(&["ACGT"]), &DistanceKind::Edit).unwrap();
		assert_eq!(d.n(), 1);
		assert_eq!(d.get(0, 0), 0);
	}

	#[test]
	fn test_distributed_matches_sequential() {
		let inputs = seqs(&["ACGTACGT", "ACGAACGA", "TTGTACGT", "ACGT", "GGGGCCCC"]);
		let want = build_matrix(&inputs, &DistanceKind::Edit).unwrap();
		for p in [2, 3] {
			let results = run_group(p, |comm| {
				build_matrix_distributed(&comm, &inputs, &DistanceKind::Edit).unwrap()
			});
			assert_eq!(
				results[0].as_ref(),
				Some(&want),
				"distributed build diverged for p={p}"
			);
			assert!(results[1..].iter().all(Option::is_none));
		}
	}
}
