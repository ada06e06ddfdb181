use thiserror::Error;

/// Errors reported by the clustering engine and its I/O adapters.
#[derive(Debug, Error)]
pub enum Error {
	/// File open, read, or write failed.
	#[error("i/o failure: {0}")]
	Io(#[from] std::io::Error),

	/// Malformed FASTA, matrix, or graph text.
	#[error("parse failure: {0}")]
	Parse(String),

	/// Invalid epsilon, cluster count, distance type, or grid topology.
	#[error("invalid configuration: {0}")]
	Config(String),

	/// Hamming distance on sequences of unequal length.
	#[error("sequence length mismatch: {0} vs {1}")]
	LengthMismatch(usize, usize),

	/// A matrix of the requested size cannot be allocated.
	#[error("matrix of {0} x {0} entries exceeds addressable memory")]
	Resource(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
