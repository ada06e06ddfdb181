//! Similarity graph emission in DOT format, and re-ingestion of the same
//! dialect.
//!
//! Nodes are `seq<i>` labeled with the sequence identifier; one edge is
//! written per unordered pair whose distance is positive and below the
//! epsilon threshold, carrying the distance as both weight and label.

use crate::error::{Error, Result};
use crate::fasta::Sequence;
use crate::matrix::{SquareMatrix, INF};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Write the similarity graph. Returns the number of edges emitted.
pub fn write_dot(
	path: impl AsRef<Path>,
	sequences: &[Sequence],
	matrix: &SquareMatrix,
	epsilon: i32,
) -> Result<usize> {
	let n = sequences.len();
	assert_eq!(matrix.n(), n, "matrix and sequence set must agree");
	let mut out = BufWriter::new(File::create(path.as_ref())?);
	writeln!(out, "graph arn {{")?;
	writeln!(out, "  rankdir=LR;")?;
	for (i, seq) in sequences.iter().enumerate() {
		writeln!(out, "  seq{i} [label=\"{}\"];", seq.id)?;
	}
	writeln!(out)?;
	let mut edges = 0usize;
	for i in 0..n {
		for j in (i + 1)..n {
			let d = matrix.get(i, j);
			if d > 0 && d < epsilon {
				writeln!(out, "  seq{i} -- seq{j} [weight={d}, label=\"{d}\"];")?;
				edges += 1;
			}
		}
	}
	writeln!(out, "}}")?;
	out.flush()?;
	tracing::info!(nodes = n, edges, "graph written");
	Ok(edges)
}

/// Parse the leading decimal number of a string slice.
fn leading_number(s: &str) -> Option<usize> {
	let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
	digits.parse().ok()
}

/// Read a graph in the emitted dialect back into an adjacency matrix.
///
/// Nodes are counted from the `seq<i>` declarations; pairs without an edge
/// get [`INF`], the diagonal is zero.
pub fn read_dot(path: impl AsRef<Path>) -> Result<SquareMatrix> {
	let reader = BufReader::new(File::open(path.as_ref())?);
	let mut nodes = 0usize;
	let mut edges: Vec<(usize, usize, i32)> = Vec::new();
	for line in reader.lines() {
		let line = line?;
		let line = line.trim();
		let Some(rest) = line.strip_prefix("seq") else {
			continue;
		};
		let i = leading_number(rest)
			.ok_or_else(|| Error::Parse(format!("malformed node index in {line:?}")))?;
		nodes = nodes.max(i + 1);
		if let Some(dashes) = line.find("--") {
			let tail = line[dashes + 2..].trim_start();
			let j = tail
				.strip_prefix("seq")
				.and_then(leading_number)
				.ok_or_else(|| Error::Parse(format!("malformed edge target in {line:?}")))?;
			nodes = nodes.max(j + 1);
			let weight = line
				.find("weight=")
				.and_then(|at| leading_number(&line[at + 7..]))
				.ok_or_else(|| Error::Parse(format!("missing edge weight in {line:?}")))?;
			edges.push((i, j, weight as i32));
		}
	}
	if nodes == 0 {
		return Err(Error::Parse("graph declares no seq<i> nodes".into()));
	}
	let mut matrix = SquareMatrix::zeros(nodes)?;
	for i in 0..nodes {
		for j in 0..nodes {
			if i != j {
				matrix.set(i, j, INF);
			}
		}
	}
	for (i, j, w) in edges {
		matrix.set(i, j, w);
		matrix.set(j, i, w);
	}
	Ok(matrix)
}
