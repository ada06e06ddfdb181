//! Clustering result report.

use crate::error::Result;
use crate::fasta::Sequence;
use crate::matrix::DistanceStats;
use crate::pam::Clustering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Render the distance statistics block shown by the drivers.
pub fn format_stats(stats: &DistanceStats) -> String {
	format!(
		"pairs: {}\nmin: {}  max: {}\nmedian: {}  mean: {:.2}\nq1: {}  q3: {}",
		stats.pairs, stats.min, stats.max, stats.median, stats.mean, stats.quartile1, stats.quartile3
	)
}

/// Write the per-cluster report: total cost, then for each cluster its
/// medoid, size, and member identifiers.
///
/// Only called after every compute stage has succeeded, so a failed run
/// leaves no partial report behind.
pub fn write_report(
	path: impl AsRef<Path>,
	sequences: &[Sequence],
	clustering: &Clustering,
) -> Result<()> {
	let mut out = BufWriter::new(File::create(path.as_ref())?);
	let k = clustering.medoids.len();
	writeln!(out, "PAM clustering results")?;
	writeln!(out, "total cost: {}", clustering.cost)?;
	writeln!(out, "clusters: {k}")?;
	writeln!(out)?;
	let mut counts = vec![0usize; k];
	for &slot in &clustering.membership {
		counts[slot] += 1;
	}
	for m in 0..k {
		writeln!(out, "--- cluster {m} ---")?;
		writeln!(out, "medoid: {}", sequences[clustering.medoids[m]].id)?;
		writeln!(out, "size: {}", counts[m])?;
		for (i, &slot) in clustering.membership.iter().enumerate() {
			if slot == m {
				writeln!(out, "  - {}", sequences[i].id)?;
			}
		}
		writeln!(out)?;
	}
	out.flush()?;
	tracing::info!(path = %path.as_ref().display(), "report written");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_report_contents() {
		let seqs = vec![
			Sequence::new("a", "AC"),
			Sequence::new("b", "AG"),
			Sequence::new("c", "TT"),
		];
		let clustering = Clustering {
			medoids: vec![0, 2],
			membership: vec![0, 0, 1],
			cost: 1,
			iterations: 1,
			swaps: 0,
		};
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("r.txt");
		write_report(&path, &seqs, &clustering).unwrap();
		let text = std::fs::read_to_string(&path).unwrap();
		assert!(text.contains("total cost: 1"));
		assert!(text.contains("medoid: a"));
		assert!(text.contains("size: 2"));
		assert!(text.contains("  - b"));
	}
}
