//! Block grid primitives: tile scatter and gather.
//!
//! A group of p processes (p a perfect square) forms a sqrt(p) x sqrt(p)
//! grid in row-major rank order; each rank owns one b x b tile of the
//! global matrix, b = n / sqrt(p). Scatter slices the root's matrix into
//! tiles and ships each to its owner; gather is the exact inverse.

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::matrix::SquareMatrix;

/// Validated sqrt(p) x sqrt(p) process grid over an n x n matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridTopology {
	n: usize,
	/// Grid side, sqrt(p).
	q: usize,
	/// Tile side, n / q.
	b: usize,
}

impl GridTopology {
	/// Validate the topology constraints: p must be a perfect square and
	/// sqrt(p) must divide n.
	pub fn new(n: usize, p: usize) -> Result<Self> {
		let q = (p as f64).sqrt().round() as usize;
		if q * q != p {
			return Err(Error::Config(format!(
				"process count {p} is not a perfect square"
			)));
		}
		if q == 0 || n % q != 0 {
			return Err(Error::Config(format!(
				"matrix size {n} is not divisible by grid side {q}"
			)));
		}
		Ok(GridTopology { n, q, b: n / q })
	}

	#[inline]
	pub fn n(&self) -> usize {
		self.n
	}

	/// Grid side, sqrt(p).
	#[inline]
	pub fn side(&self) -> usize {
		self.q
	}

	/// Tile side, n / sqrt(p).
	#[inline]
	pub fn block(&self) -> usize {
		self.b
	}

	/// Grid coordinates of a rank, row-major.
	#[inline]
	pub fn coords(&self, rank: usize) -> (usize, usize) {
		(rank / self.q, rank % self.q)
	}

	/// Rank owning the tile at grid coordinates (bi, bj).
	#[inline]
	pub fn rank_of(&self, bi: usize, bj: usize) -> usize {
		bi * self.q + bj
	}

	/// Copy tile (bi, bj) out of the global matrix.
	fn extract(&self, matrix: &SquareMatrix, bi: usize, bj: usize) -> Vec<i32> {
		let b = self.b;
		let mut tile = Vec::with_capacity(b * b);
		for i in 0..b {
			let row = matrix.row(bi * b + i);
			tile.extend_from_slice(&row[bj * b..(bj + 1) * b]);
		}
		tile
	}
}

/// Distribute the root's matrix as one tile per rank.
///
/// The root passes `Some(matrix)`, everyone else `None`; every rank gets
/// back ownership of its own tile. The root's tile is copied locally, the
/// rest travel point-to-point.
pub fn scatter<C: Communicator>(
	comm: &C,
	topo: &GridTopology,
	matrix: Option<&SquareMatrix>,
) -> Vec<i32> {
	const ROOT: usize = 0;
	if comm.rank() == ROOT {
		let matrix = matrix.expect("the root must hold the matrix to scatter");
		debug_assert_eq!(matrix.n(), topo.n(), "matrix does not match the topology");
		let mut own = Vec::new();
		for bi in 0..topo.side() {
			for bj in 0..topo.side() {
				let tile = topo.extract(matrix, bi, bj);
				let dest = topo.rank_of(bi, bj);
				if dest == ROOT {
					own = tile;
				} else {
					comm.send(dest, tile);
				}
			}
		}
		own
	} else {
		comm.recv(ROOT)
	}
}

/// Reassemble the global matrix from the per-rank tiles; inverse of
/// [`scatter`]. Returns `Some` on the root, `None` elsewhere.
pub fn gather<C: Communicator>(
	comm: &C,
	topo: &GridTopology,
	tile: Vec<i32>,
) -> Result<Option<SquareMatrix>> {
	debug_assert_eq!(tile.len(), topo.block() * topo.block(), "tile size");
	let Some(tiles) = comm.gatherv(0, tile) else {
		return Ok(None);
	};
	let (n, b, q) = (topo.n(), topo.block(), topo.side());
	let mut matrix = SquareMatrix::zeros(n)?;
	for rank in 0..q * q {
		let (bi, bj) = topo.coords(rank);
		let src = &tiles[rank * b * b..(rank + 1) * b * b];
		for i in 0..b {
			for j in 0..b {
				matrix.set(bi * b + i, bj * b + j, src[i * b + j]);
			}
		}
	}
	Ok(Some(matrix))
}
