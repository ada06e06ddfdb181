//! PAM k-medoids clustering with brute-force swap search.
//!
//! The engine keeps, per point, the nearest medoid slot and the distances
//! to the two nearest medoids. One iteration scores every (medoid slot,
//! non-medoid candidate) exchange: points assigned to the leaving medoid
//! move to the candidate or to their former second choice, every other
//! point moves only if the candidate beats its current best. The single
//! best exchange is applied if it strictly lowers the total cost, then the
//! assignment is rebuilt from scratch; the search ends at the first
//! iteration with no improving exchange.
//!
//! The distributed variant partitions matrix rows across the rank group,
//! sums the per-rank exchange scores with one all-reduce per iteration, and
//! lets every rank pick the same argmin from the replicated buffer.

use crate::arrayadapter::ArrayAdapter;
use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::matrix::SquareMatrix;
use core::ops::AddAssign;
use num_traits::{Bounded, Signed, Zero};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Nearest-medoid record for one point: the slot of the nearest medoid and
/// the distances to the two nearest medoids.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Assignment<N> {
	pub(crate) med: u32,
	pub(crate) best: N,
	pub(crate) second: N,
}

/// Seed the medoid list: a seeded permutation of 0..n-1, first k entries.
///
/// Deterministic for fixed (n, seed).
pub fn seed_medoids(n: usize, k: usize, seed: u64) -> Vec<usize> {
	let mut perm: Vec<usize> = (0..n).collect();
	perm.shuffle(&mut StdRng::seed_from_u64(seed));
	perm.truncate(k);
	perm
}

/// Compute the assignment records and total loss for the given medoids.
///
/// Ties between equally near medoids go to the lower slot.
fn assign<M, N, L>(mat: &M, med: &[usize]) -> (L, Vec<Assignment<N>>)
where
	N: Bounded + Zero + PartialOrd + Copy,
	L: AddAssign + Zero + Copy + From<N>,
	M: ArrayAdapter<N>,
{
	let n = mat.len();
	let mut loss = L::zero();
	let mut data = Vec::with_capacity(n);
	for i in 0..n {
		let mut rec = Assignment {
			med: 0,
			best: N::max_value(),
			second: N::max_value(),
		};
		for (m, &me) in med.iter().enumerate() {
			let d = mat.get(i, me);
			if d < rec.best {
				rec.second = rec.best;
				rec.best = d;
				rec.med = m as u32;
			} else if d < rec.second {
				rec.second = d;
			}
		}
		loss += L::from(rec.best);
		data.push(rec);
	}
	(loss, data)
}

/// Cost change of replacing medoid slot `m` by candidate point `c`.
#[inline]
fn swap_delta<M, N, L>(mat: &M, data: &[Assignment<N>], m: usize, c: usize) -> L
where
	N: Zero + PartialOrd + Copy,
	L: AddAssign + Signed + Zero + Copy + From<N>,
	M: ArrayAdapter<N>,
{
	let mut delta = L::zero();
	for (i, rec) in data.iter().enumerate() {
		let dic = mat.get(i, c);
		if rec.med as usize == m {
			// This point loses its medoid: candidate or former second.
			let nd = if dic < rec.second { dic } else { rec.second };
			delta += L::from(nd) - L::from(rec.best);
		} else if dic < rec.best {
			delta += L::from(dic) - L::from(rec.best);
		}
	}
	delta
}

/// Scan all (slot, candidate) exchanges and return the best one.
///
/// Candidates already serving as medoids are skipped. The reduction orders
/// by (delta, slot, candidate), so the lexicographically smallest pair wins
/// ties no matter how the work is split.
fn find_best_swap<M, N, L>(mat: &M, med: &[usize], data: &[Assignment<N>]) -> Option<(L, usize, usize)>
where
	N: Zero + PartialOrd + Copy + Send + Sync,
	L: AddAssign + Signed + Zero + PartialOrd + Copy + From<N> + Send + Sync,
	M: ArrayAdapter<N> + Sync,
{
	let n = data.len();
	let k = med.len();
	let mut is_medoid = vec![false; n];
	for &m in med {
		is_medoid[m] = true;
	}
	(0..k * n)
		.into_par_iter()
		.filter_map(|idx| {
			let (m, c) = (idx / n, idx % n);
			if is_medoid[c] {
				return None;
			}
			Some((swap_delta::<M, N, L>(mat, data, m, c), m, c))
		})
		.min_by(|a, b| {
			a.0.partial_cmp(&b.0)
				.unwrap_or(Ordering::Equal)
				.then(a.1.cmp(&b.1))
				.then(a.2.cmp(&b.2))
		})
}

/// Run PAM swap optimization from the given initial medoids.
///
/// * type `M` - matrix data type such as `SquareMatrix` or `ndarray::Array2`
/// * type `N` - distance data type such as `i32`
/// * type `L` - signed cost data type such as `i64`
/// * `mat` - a pairwise distance matrix
/// * `med` - the initial medoids, replaced in place by the final ones
/// * `maxiter` - safety bound on the number of swap iterations
///
/// returns a tuple containing:
/// * the final cost
/// * the final cluster assignment (slot into `med` per point)
/// * the number of iterations
/// * the number of accepted swaps
///
/// ## Panics
///
/// * panics when the dissimilarity matrix is not square
/// * panics when k is 0 or larger than N
///
/// ## Example
/// Given a dissimilarity matrix of size 4 x 4, use:
/// ```
/// let data = seqpam::SquareMatrix::from_rows(&[&[0, 1, 2, 3], &[1, 0, 4, 5], &[2, 4, 0, 6], &[3, 5, 6, 0]]);
/// let mut meds = seqpam::seed_medoids(4, 2, 12345);
/// let (cost, assi, n_iter, n_swap): (i64, _, _, _) = seqpam::pam(&data, &mut meds, 100);
/// println!("Cost is: {}", cost);
/// ```
pub fn pam<M, N, L>(mat: &M, med: &mut [usize], maxiter: usize) -> (L, Vec<usize>, usize, usize)
where
	N: Bounded + Zero + PartialOrd + Copy + Send + Sync,
	L: AddAssign + Signed + Zero + PartialOrd + Copy + From<N> + Send + Sync,
	M: ArrayAdapter<N> + Sync,
{
	let (n, k) = (mat.len(), med.len());
	assert!(mat.is_square(), "dissimilarity matrix is not square");
	assert!(k > 0, "at least one medoid is required");
	assert!(k <= n, "k must be at most the number of points");
	let (mut loss, mut data) = assign(mat, med);
	let (mut iter, mut n_swaps) = (0, 0);
	while iter < maxiter {
		iter += 1;
		let best = find_best_swap::<M, N, L>(mat, med, &data);
		let Some((delta, m, c)) = best else {
			break; // k == n, nothing to exchange
		};
		if delta >= L::zero() {
			break; // no strict improvement left
		}
		med[m] = c;
		n_swaps += 1;
		let (new_loss, new_data) = assign(mat, med);
		tracing::debug!(swap = n_swaps, slot = m, candidate = c, "accepted swap");
		debug_assert!(new_loss < loss, "accepted swap must lower the cost");
		loss = new_loss;
		data = new_data;
	}
	let membership = data.iter().map(|rec| rec.med as usize).collect();
	(loss, membership, iter, n_swaps)
}

/// Clustering output: medoids as point indices, per-point slot membership,
/// and the summed cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
	pub medoids: Vec<usize>,
	pub membership: Vec<usize>,
	pub cost: i64,
	pub iterations: usize,
	pub swaps: usize,
}

/// Seed and run PAM on a single process.
pub fn cluster(matrix: &SquareMatrix, k: usize, seed: u64) -> Result<Clustering> {
	let n = matrix.n();
	if k == 0 || k > n {
		return Err(Error::Config(format!("cluster count {k} must be in 1..={n}")));
	}
	let mut medoids = seed_medoids(n, k, seed);
	let (cost, membership, iterations, swaps) = pam::<_, i32, i64>(matrix, &mut medoids, usize::MAX);
	tracing::info!(n, k, cost, iterations, swaps, "pam converged");
	Ok(Clustering {
		medoids,
		membership,
		cost,
		iterations,
		swaps,
	})
}

/// Assignment over a contiguous slice of matrix rows.
fn assign_rows(local_d: &[i32], n: usize, med: &[usize]) -> (i64, Vec<Assignment<i32>>) {
	let rows = local_d.len() / n.max(1);
	let mut loss = 0i64;
	let mut data = Vec::with_capacity(rows);
	for li in 0..rows {
		let row = &local_d[li * n..(li + 1) * n];
		let mut rec = Assignment {
			med: 0,
			best: i32::MAX,
			second: i32::MAX,
		};
		for (m, &me) in med.iter().enumerate() {
			let d = row[me];
			if d < rec.best {
				rec.second = rec.best;
				rec.best = d;
				rec.med = m as u32;
			} else if d < rec.second {
				rec.second = d;
			}
		}
		loss += i64::from(rec.best);
		data.push(rec);
	}
	(loss, data)
}

/// Seed and run PAM across a rank group, rows of the matrix partitioned
/// with remainder rows on the lowest ranks.
///
/// The root passes `Some(matrix)` and receives `Some(clustering)`; other
/// ranks pass and receive `None`. Every rank scores exchanges against its
/// own row slice; one all-reduce per iteration sums the k * (n - k) score
/// buffer and every rank independently picks the same argmin.
pub fn cluster_distributed<C: Communicator>(
	comm: &C,
	matrix: Option<&SquareMatrix>,
	k: usize,
	seed: u64,
) -> Result<Option<Clustering>> {
	let (size, rank) = (comm.size(), comm.rank());
	let n_buf = comm.broadcast(
		0,
		matrix.map(|m| vec![m.n() as i32]).unwrap_or_default(),
	);
	let n = n_buf[0] as usize;
	if k == 0 || k > n {
		return Err(Error::Config(format!("cluster count {k} must be in 1..={n}")));
	}

	// Contiguous row partition, remainder rows to the lowest ranks.
	let per = n / size;
	let rem = n % size;
	let my_rows = per + usize::from(rank < rem);
	let local_d: Vec<i32> = if rank == 0 {
		let matrix = matrix.expect("the root must hold the matrix");
		let mut own = Vec::new();
		let mut row = 0usize;
		for dest in 0..size {
			let count = per + usize::from(dest < rem);
			let slice = matrix.as_slice()[row * n..(row + count) * n].to_vec();
			if dest == 0 {
				own = slice;
			} else {
				comm.send(dest, slice);
			}
			row += count;
		}
		own
	} else {
		comm.recv(0)
	};
	let row_start: usize = rank * per + rank.min(rem);

	// The root seeds; everyone else receives the same list.
	let med_buf = comm.broadcast(
		0,
		if rank == 0 {
			seed_medoids(n, k, seed).iter().map(|&m| m as i32).collect()
		} else {
			Vec::new()
		},
	);
	let mut med: Vec<usize> = med_buf.iter().map(|&m| m as usize).collect();

	let (mut local_cost, mut data) = assign_rows(&local_d, n, &med);
	let (mut iterations, mut swaps) = (0usize, 0usize);
	loop {
		iterations += 1;
		let mut is_medoid = vec![false; n];
		for &m in &med {
			is_medoid[m] = true;
		}
		let candidates: Vec<usize> = (0..n).filter(|&c| !is_medoid[c]).collect();
		let local_deltas: Vec<i64> = (0..k * candidates.len())
			.into_par_iter()
			.map(|idx| {
				let (m, cand) = (idx / candidates.len(), candidates[idx % candidates.len()]);
				let mut delta = 0i64;
				for (li, rec) in data.iter().enumerate() {
					let dic = local_d[li * n + cand];
					if rec.med as usize == m {
						delta += i64::from(dic.min(rec.second)) - i64::from(rec.best);
					} else if dic < rec.best {
						delta += i64::from(dic) - i64::from(rec.best);
					}
				}
				delta
			})
			.collect();
		let global_deltas = comm.allreduce_sum(&local_deltas);

		// Replicated argmin; the ascending scan with strict improvement
		// picks the same lexicographically smallest pair on every rank.
		let mut best: Option<(i64, usize, usize)> = None;
		for m in 0..k {
			for (ci, &cand) in candidates.iter().enumerate() {
				let delta = global_deltas[m * candidates.len() + ci];
				if delta < best.map_or(0, |b| b.0) {
					best = Some((delta, m, cand));
				}
			}
		}
		let Some((delta, m, cand)) = best else {
			break;
		};
		med[m] = cand;
		swaps += 1;
		tracing::debug!(rank, swap = swaps, slot = m, candidate = cand, delta, "accepted swap");
		let (cost, new_data) = assign_rows(&local_d, n, &med);
		local_cost = cost;
		data = new_data;
	}

	let local_membership: Vec<i32> = data.iter().map(|rec| rec.med as i32).collect();
	debug_assert_eq!(local_membership.len(), my_rows);
	debug_assert!(row_start + my_rows <= n);
	let membership = comm.gatherv(0, local_membership);
	let total_cost = comm.allreduce_sum(&[local_cost])[0];
	Ok(membership.map(|membership| Clustering {
		medoids: med,
		membership: membership.iter().map(|&m| m as usize).collect(),
		cost: total_cost,
		iterations,
		swaps,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::comm::run_group;

	/// Points on a line at {0, 1, 2, 10, 11, 12}, distances are absolute
	/// coordinate differences.
	fn two_groups() -> SquareMatrix {
		let coords = [0i32, 1, 2, 10, 11, 12];
		let mut d = SquareMatrix::zeros(6).unwrap();
		for i in 0..6 {
			for j in 0..6 {
				d.set(i, j, (coords[i] - coords[j]).abs());
			}
		}
		d
	}

	#[test]
	fn test_two_groups_converges() {
		let d = two_groups();
		for seed in [0u64, 12345, 777] {
			let result = cluster(&d, 2, seed).unwrap();
			assert_eq!(result.cost, 4, "cost not as expected for seed {seed}");
			let mut meds = result.medoids.clone();
			meds.sort_unstable();
			assert_eq!(meds, vec![1, 4], "medoids not as expected for seed {seed}");
			for (i, &slot) in result.membership.iter().enumerate() {
				let same_side = (i < 3) == (result.medoids[slot] < 3);
				assert!(same_side, "point {i} assigned across the gap");
			}
		}
	}

	#[test]
	fn test_tie_breaks_to_first_candidate() {
		// Points 0 and 2 are identical; starting from the middle point the
		// swap search must pick candidate 0, not 2.
		let d = SquareMatrix::from_rows(&[&[0, 1, 0], &[1, 0, 1], &[0, 1, 0]]);
		let mut med = vec![1];
		let (cost, assi, _, n_swap): (i64, _, _, _) = pam(&d, &mut med, 100);
		assert_eq!(cost, 1, "cost not as expected");
		assert_eq!(med, vec![0], "tie must break to the lower candidate");
		assert_eq!(n_swap, 1);
		assert_eq!(assi, vec![0, 0, 0]);
	}

	#[test]
	fn test_k_equals_n() {
		let d = two_groups();
		let result = cluster(&d, 6, 1).unwrap();
		assert_eq!(result.cost, 0, "every point its own medoid");
		assert_eq!(result.swaps, 0);
	}

	#[test]
	fn test_single_point() {
		let d = SquareMatrix::from_rows(&[&[0]]);
		let result = cluster(&d, 1, 42).unwrap();
		assert_eq!(result.medoids, vec![0]);
		assert_eq!(result.membership, vec![0]);
		assert_eq!(result.cost, 0);
	}

	#[test]
	fn test_invalid_k() {
		let d = two_groups();
		assert!(cluster(&d, 0, 1).is_err());
		assert!(cluster(&d, 7, 1).is_err());
	}

	#[test]
	fn test_cost_matches_assignment_sum() {
		let d = two_groups();
		let result = cluster(&d, 3, 9).unwrap();
		let recomputed: i64 = result
			.membership
			.iter()
			.enumerate()
			.map(|(i, &slot)| i64::from(d.get(i, result.medoids[slot])))
			.sum();
		assert_eq!(recomputed, result.cost, "cost must equal the assignment sum");
	}

	#[test]
	fn test_deterministic() {
		let d = two_groups();
		let a = cluster(&d, 2, 4).unwrap();
		let b = cluster(&d, 2, 4).unwrap();
		assert_eq!(a, b, "same seed must reproduce the same clustering");
	}

	#[test]
	fn test_seed_medoids_distinct() {
		let meds = seed_medoids(10, 10, 3);
		let mut sorted = meds.clone();
		sorted.sort_unstable();
		assert_eq!(sorted, (0..10).collect::<Vec<_>>(), "medoids must be distinct");
	}

	#[cfg(feature = "ndarray")]
	#[test]
	fn test_ndarray_adapter() {
		let data = ndarray::arr2(&[[0, 1, 2, 3], [1, 0, 4, 5], [2, 4, 0, 6], [3, 5, 6, 0]]);
		let mut meds = vec![2, 3];
		let (cost, assi, _, _): (i64, _, _, _) = pam(&data, &mut meds, 100);
		assert_eq!(cost, 3, "cost not as expected");
		assert_eq!(assi.len(), 4);
	}

	#[test]
	fn test_distributed_matches_sequential() {
		let d = two_groups();
		let want = cluster(&d, 2, 12345).unwrap();
		for p in [2, 3] {
			let results = run_group(p, |comm| {
				let input = (comm.rank() == 0).then_some(&d);
				cluster_distributed(&comm, input, 2, 12345).unwrap()
			});
			assert_eq!(
				results[0].as_ref(),
				Some(&want),
				"distributed pam diverged for p={p}"
			);
			assert!(results[1..].iter().all(Option::is_none));
		}
	}

	#[test]
	fn test_distributed_k_equals_n() {
		let d = two_groups();
		let results = run_group(2, |comm| {
			let input = (comm.rank() == 0).then_some(&d);
			cluster_distributed(&comm, input, 6, 1).unwrap()
		});
		assert_eq!(results[0].as_ref().unwrap().cost, 0);
	}
}
