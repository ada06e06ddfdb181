//! All-pairs shortest paths: blocked Floyd-Warshall over the process grid.
//!
//! Each stage k promotes the nodes spanned by block row/column k to
//! intermediate nodes: the pivot tile (k, k) closes itself, the tiles on
//! grid row and column k relax against the pivot, and every remaining tile
//! relaxes against its row and column bands. Entries at or above
//! [`INF`](crate::matrix::INF) mean "no edge" and stay that way, since any
//! relaxation with an INF addend is skipped.

use crate::comm::Communicator;
use crate::error::Result;
use crate::grid::{gather, scatter, GridTopology};
use crate::matrix::{SquareMatrix, INF};
use rayon::prelude::*;

/// Relax `tile[i][j] = min(tile[i][j], left[i][x] + right[x][j])` over all
/// in-tile intermediates x.
///
/// `left` and `right` must not alias `tile`; callers pass a snapshot when
/// an operand is the tile itself. Rows are relaxed by parallel workers,
/// each writing only its own row.
fn relax_product(tile: &mut [i32], left: &[i32], right: &[i32], b: usize) {
	tile.par_chunks_mut(b).enumerate().for_each(|(i, row)| {
		for x in 0..b {
			let lix = left[i * b + x];
			if lix >= INF {
				continue;
			}
			for (j, cell) in row.iter_mut().enumerate() {
				let rxj = right[x * b + j];
				if rxj >= INF {
					continue;
				}
				let candidate = lix.saturating_add(rxj);
				if candidate < *cell {
					*cell = candidate;
				}
			}
		}
	});
}

/// Full Floyd pass over one square tile, in place.
///
/// The intermediate loop is outermost and sequential; the row and column of
/// the current intermediate are snapshotted so parallel row updates read a
/// stable operand.
fn closure_tile(tile: &mut [i32], b: usize) {
	let mut row_x = vec![0i32; b];
	let mut col_x = vec![0i32; b];
	for x in 0..b {
		row_x.copy_from_slice(&tile[x * b..(x + 1) * b]);
		for (i, c) in col_x.iter_mut().enumerate() {
			*c = tile[i * b + x];
		}
		tile.par_chunks_mut(b).enumerate().for_each(|(i, row)| {
			let dix = col_x[i];
			if dix >= INF {
				return;
			}
			for (j, cell) in row.iter_mut().enumerate() {
				let dxj = row_x[j];
				if dxj >= INF {
					continue;
				}
				let candidate = dix.saturating_add(dxj);
				if candidate < *cell {
					*cell = candidate;
				}
			}
		});
	}
}

/// Replace the matrix with its shortest-path closure, single process.
pub fn closure_in_place(matrix: &mut SquareMatrix) {
	let n = matrix.n();
	closure_tile(matrix.as_mut_slice(), n);
}

/// Run the blocked Floyd stages over this rank's tile.
///
/// Takes ownership of the tile and returns it fully relaxed. Barriers
/// separate the pivot, band, and general phases of every stage so each
/// phase reads the previous phase's output.
pub fn floyd_blocks<C: Communicator>(comm: &C, topo: &GridTopology, mut tile: Vec<i32>) -> Vec<i32> {
	let (q, b) = (topo.side(), topo.block());
	let (px, py) = topo.coords(comm.rank());
	for k in 0..q {
		tracing::debug!(stage = k, "floyd pivot stage");
		let pivot_rank = topo.rank_of(k, k);
		if comm.rank() == pivot_rank {
			closure_tile(&mut tile, b);
		}
		let pivot = comm.broadcast(
			pivot_rank,
			if comm.rank() == pivot_rank { tile.clone() } else { Vec::new() },
		);
		comm.barrier();

		if px == k && py != k {
			let snapshot = tile.clone();
			relax_product(&mut tile, &pivot, &snapshot, b);
		}
		if py == k && px != k {
			let snapshot = tile.clone();
			relax_product(&mut tile, &snapshot, &pivot, b);
		}
		comm.barrier();

		// Every rank needs the updated tiles at (k, py) and (px, k); the
		// bands travel as whole-group broadcasts rooted at each band owner.
		let mut row_block = None;
		for c in 0..q {
			let owner = topo.rank_of(k, c);
			let payload = if comm.rank() == owner { tile.clone() } else { Vec::new() };
			let block = comm.broadcast(owner, payload);
			if c == py {
				row_block = Some(block);
			}
		}
		let mut col_block = None;
		for r in 0..q {
			let owner = topo.rank_of(r, k);
			let payload = if comm.rank() == owner { tile.clone() } else { Vec::new() };
			let block = comm.broadcast(owner, payload);
			if r == px {
				col_block = Some(block);
			}
		}

		if px != k && py != k {
			let row_block = row_block.expect("the band tile for this grid column is always broadcast");
			let col_block = col_block.expect("the band tile for this grid row is always broadcast");
			relax_product(&mut tile, &col_block, &row_block, b);
		}
		comm.barrier();
	}
	tile
}

/// All-pairs shortest paths across the rank group.
///
/// The root passes `Some(matrix)` and receives `Some(closure)`; other ranks
/// pass and receive `None`. With a group of one this is the plain
/// three-loop Floyd over the matrix, parallelized over rows.
pub fn shortest_paths<C: Communicator>(
	comm: &C,
	matrix: Option<SquareMatrix>,
) -> Result<Option<SquareMatrix>> {
	if comm.size() == 1 {
		let mut matrix = matrix.expect("the root must hold the matrix");
		closure_in_place(&mut matrix);
		return Ok(Some(matrix));
	}
	let n_buf = comm.broadcast(
		0,
		matrix.as_ref().map(|m| vec![m.n() as i32]).unwrap_or_default(),
	);
	let n = n_buf[0] as usize;
	let topo = GridTopology::new(n, comm.size())?;
	tracing::info!(n, grid = topo.side(), block = topo.block(), "floyd started");
	let tile = scatter(comm, &topo, matrix.as_ref());
	let tile = floyd_blocks(comm, &topo, tile);
	gather(comm, &topo, tile)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::comm::run_group;

	/// Deterministic symmetric fixture with a few unreachable pairs.
	fn fixture(n: usize) -> SquareMatrix {
		let mut d = SquareMatrix::zeros(n).unwrap();
		for i in 0..n {
			for j in (i + 1)..n {
				let v = (3 * i + 5 * j) % 11;
				let v = if v == 7 { INF } else { v as i32 + 1 };
				d.set(i, j, v);
				d.set(j, i, v);
			}
		}
		d
	}

	#[test]
	fn test_chain_closure() {
		let mut d = SquareMatrix::from_rows(&[&[0, 2, INF], &[2, 0, 3], &[INF, 3, 0]]);
		closure_in_place(&mut d);
		assert_eq!(d.get(0, 2), 5, "path through the middle node");
		assert_eq!(d.get(2, 0), 5);
		assert_eq!(d.get(0, 1), 2, "direct edges keep their weight");
	}

	#[test]
	fn test_inf_preserved() {
		// Node 3 is isolated and must stay unreachable.
		let mut d = SquareMatrix::from_rows(&[
			&[0, 1, 2, INF],
			&[1, 0, 1, INF],
			&[2, 1, 0, INF],
			&[INF, INF, INF, 0],
		]);
		closure_in_place(&mut d);
		assert_eq!(d.get(0, 3), INF, "no chain may invent an edge");
		assert_eq!(d.get(3, 1), INF);
	}

	#[test]
	fn test_triangle_inequality_and_fixed_point() {
		let mut d = fixture(10);
		closure_in_place(&mut d);
		let again = {
			let mut copy = d.clone();
			closure_in_place(&mut copy);
			copy
		};
		assert_eq!(again, d, "the closure must be a fixed point");
		let n = d.n();
		for i in 0..n {
			for j in 0..n {
				for m in 0..n {
					let (dij, dim, dmj) = (d.get(i, j), d.get(i, m), d.get(m, j));
					if dim < INF && dmj < INF {
						assert!(dij <= dim + dmj, "triangle violated at ({i},{j}) via {m}");
					}
				}
			}
		}
	}

	#[test]
	fn test_single_node() {
		let mut d = SquareMatrix::from_rows(&[&[0]]);
		closure_in_place(&mut d);
		assert_eq!(d.get(0, 0), 0);
	}

	#[test]
	fn test_blocked_matches_sequential() {
		for n in [8, 12] {
			let mut want = fixture(n);
			closure_in_place(&mut want);
			let results = run_group(4, |comm| {
				let input = (comm.rank() == 0).then(|| fixture(n));
				shortest_paths(&comm, input).unwrap()
			});
			assert_eq!(
				results[0].as_ref(),
				Some(&want),
				"blocked floyd diverged for n={n}, p=4"
			);
			assert!(results[1..].iter().all(Option::is_none));
		}
	}

	#[test]
	fn test_blocked_nine_ranks() {
		let mut want = fixture(6);
		closure_in_place(&mut want);
		let results = run_group(9, |comm| {
			let input = (comm.rank() == 0).then(|| fixture(6));
			shortest_paths(&comm, input).unwrap()
		});
		assert_eq!(results[0].as_ref(), Some(&want), "blocked floyd diverged for p=9");
	}

	#[test]
	fn test_topology_failure_is_consistent() {
		// 7 is not divisible by 2, so every rank must report the error.
		let results = run_group(4, |comm| {
			let input = (comm.rank() == 0).then(|| fixture(7));
			shortest_paths(&comm, input).map(|_| ()).is_err()
		});
		assert!(results.iter().all(|&failed| failed), "all ranks must fail together");
	}
}
