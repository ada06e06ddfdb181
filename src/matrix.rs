//! Dense square distance matrices.
//!
//! The n x n matrix is the one artifact every compute stage shares: the
//! builder produces it, the shortest-path closure rewrites it, and the PAM
//! engine reads it. Entries are non-negative integers; [`INF`] is the
//! reserved sentinel for "no edge / unreachable" and every finite entry is
//! strictly below it.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Sentinel distance denoting "no edge / unreachable".
///
/// Stable under relaxation: any sum with an INF addend is skipped.
pub const INF: i32 = 1000;

/// Dense n x n integer matrix with contiguous row-major storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquareMatrix {
	n: usize,
	data: Vec<i32>,
}

impl SquareMatrix {
	/// Zero-filled n x n matrix.
	///
	/// Fails with `Resource` when n * n does not fit in memory.
	pub fn zeros(n: usize) -> Result<Self> {
		let elems = n
			.checked_mul(n)
			.filter(|&e| e <= isize::MAX as usize / std::mem::size_of::<i32>())
			.ok_or(Error::Resource(n))?;
		Ok(SquareMatrix {
			n,
			data: vec![0; elems],
		})
	}

	/// Wrap an existing row-major buffer of length n * n.
	pub fn from_vec(n: usize, data: Vec<i32>) -> Result<Self> {
		if data.len() != n * n {
			return Err(Error::Config(format!(
				"matrix buffer holds {} entries, expected {}",
				data.len(),
				n * n
			)));
		}
		Ok(SquareMatrix { n, data })
	}

	/// Build from rows, for fixtures and tests.
	pub fn from_rows(rows: &[&[i32]]) -> Self {
		let n = rows.len();
		let mut data = Vec::with_capacity(n * n);
		for row in rows {
			assert_eq!(row.len(), n, "matrix rows must all have length n");
			data.extend_from_slice(row);
		}
		SquareMatrix { n, data }
	}

	#[inline]
	pub fn n(&self) -> usize {
		self.n
	}

	#[inline]
	pub fn get(&self, i: usize, j: usize) -> i32 {
		self.data[i * self.n + j]
	}

	#[inline]
	pub fn set(&mut self, i: usize, j: usize, value: i32) {
		self.data[i * self.n + j] = value;
	}

	#[inline]
	pub fn row(&self, i: usize) -> &[i32] {
		&self.data[i * self.n..(i + 1) * self.n]
	}

	#[inline]
	pub fn as_slice(&self) -> &[i32] {
		&self.data
	}

	#[inline]
	pub fn as_mut_slice(&mut self) -> &mut [i32] {
		&mut self.data
	}

	/// Consume the matrix and hand the row-major buffer to the caller.
	pub fn into_vec(self) -> Vec<i32> {
		self.data
	}

	/// Derive the adjacency matrix for a distance threshold.
	///
	/// Entries at or above `epsilon` become 0 ("no edge"); entries below are
	/// kept. The diagonal stays zero. An `epsilon` of [`INF`] or more keeps
	/// the matrix unchanged.
	pub fn filter(&self, epsilon: i32) -> SquareMatrix {
		if epsilon >= INF {
			return self.clone();
		}
		let mut out = SquareMatrix {
			n: self.n,
			data: vec![0; self.data.len()],
		};
		let mut edges = 0usize;
		for i in 0..self.n {
			for j in (i + 1)..self.n {
				let d = self.get(i, j);
				if d < epsilon {
					out.set(i, j, d);
					out.set(j, i, d);
					edges += 1;
				}
			}
		}
		tracing::info!(epsilon, edges, "adjacency filter applied");
		out
	}

	/// Turn an adjacency matrix into a shortest-path input.
	///
	/// In an adjacency matrix a zero off the diagonal means "no edge"; the
	/// closure wants [`INF`] there instead. The diagonal stays zero.
	pub fn distances_from_adjacency(&self) -> SquareMatrix {
		let mut out = self.clone();
		for i in 0..self.n {
			for j in 0..self.n {
				if i != j && self.get(i, j) == 0 {
					out.set(i, j, INF);
				}
			}
		}
		out
	}

	/// Summary statistics over finite off-diagonal entries.
	///
	/// Returns `None` when no pair has a finite distance.
	pub fn stats(&self) -> Option<DistanceStats> {
		let mut distances: Vec<i32> = Vec::new();
		for i in 0..self.n {
			for j in (i + 1)..self.n {
				let d = self.get(i, j);
				if d < INF {
					distances.push(d);
				}
			}
		}
		if distances.is_empty() {
			return None;
		}
		distances.sort_unstable();
		let sum: i64 = distances.iter().map(|&d| i64::from(d)).sum();
		Some(DistanceStats {
			pairs: distances.len(),
			min: distances[0],
			max: distances[distances.len() - 1],
			median: distances[distances.len() / 2],
			quartile1: distances[distances.len() / 4],
			quartile3: distances[3 * distances.len() / 4],
			mean: sum as f64 / distances.len() as f64,
		})
	}

	/// Read the text format: first token n, then n * n row-major integers.
	pub fn read_text(path: impl AsRef<Path>) -> Result<Self> {
		let file = File::open(path.as_ref())?;
		Self::parse_text(BufReader::new(file))
	}

	/// Parse the text format from any reader.
	pub fn parse_text(mut reader: impl Read) -> Result<Self> {
		let mut text = String::new();
		reader.read_to_string(&mut text)?;
		let mut tokens = text.split_whitespace();
		let n: usize = tokens
			.next()
			.ok_or_else(|| Error::Parse("matrix text is empty".into()))?
			.parse()
			.map_err(|e| Error::Parse(format!("matrix size: {e}")))?;
		let mut data = Vec::with_capacity(n * n);
		for idx in 0..n * n {
			let token = tokens.next().ok_or_else(|| {
				Error::Parse(format!("matrix text ends after {idx} of {} entries", n * n))
			})?;
			data.push(
				token
					.parse()
					.map_err(|e| Error::Parse(format!("matrix entry {idx}: {e}")))?,
			);
		}
		Ok(SquareMatrix { n, data })
	}

	/// Write the text format.
	pub fn write_text(&self, path: impl AsRef<Path>) -> Result<()> {
		let mut out = BufWriter::new(File::create(path.as_ref())?);
		writeln!(out, "{}", self.n)?;
		for i in 0..self.n {
			let row: Vec<String> = self.row(i).iter().map(|d| d.to_string()).collect();
			writeln!(out, "{}", row.join(" "))?;
		}
		out.flush()?;
		Ok(())
	}
}

/// Summary of the finite off-diagonal distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceStats {
	pub pairs: usize,
	pub min: i32,
	pub max: i32,
	pub median: i32,
	pub quartile1: i32,
	pub quartile3: i32,
	pub mean: f64,
}
