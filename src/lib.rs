//! Similarity clustering of biological sequences.
//!
//! The crate covers the three compute-heavy stages of the pipeline and the
//! adapters around them:
//!
//! 1. pairwise distance matrix construction under a pluggable distance
//!    (Hamming, edit, k-mer Jaccard, Needleman-Wunsch score),
//! 2. blocked all-pairs shortest paths over the resulting weighted
//!    adjacency, so indirect similarity through chains of near neighbors
//!    becomes a distance,
//! 3. PAM k-medoids with brute-force swap search.
//!
//! All three share one data structure, a dense row-major integer matrix,
//! and one execution model: an outer group of message-passing ranks (see
//! [`comm::Communicator`]; a group of one is the sequential fallback) with
//! rayon worker threads inside each rank.
//!
//! ## Example
//!
//! Cluster a handful of sequences by edit distance:
//! ```
//! use seqpam::{build_matrix, cluster, DistanceKind, Sequence};
//!
//! let seqs = vec![
//! 	Sequence::new("a", "ACGT"),
//! 	Sequence::new("b", "ACGA"),
//! 	Sequence::new("c", "TTTT"),
//! ];
//! let matrix = build_matrix(&seqs, &DistanceKind::Edit).unwrap();
//! let result = cluster(&matrix, 2, 12345).unwrap();
//! println!("cost: {}", result.cost);
//! ```

pub mod arrayadapter;
pub mod builder;
pub mod comm;
pub mod distance;
pub mod error;
pub mod fasta;
pub mod floyd;
pub mod graph;
pub mod grid;
pub mod matrix;
pub mod pam;
pub mod report;

pub use crate::arrayadapter::ArrayAdapter;
pub use crate::builder::{build_matrix, build_matrix_distributed, pair_of_index};
pub use crate::comm::{run_group, Communicator, SelfComm, ThreadComm};
pub use crate::distance::{edit, hamming, kmer, needleman, needleman_diagonal, DistanceKind, ScoringParams};
pub use crate::error::{Error, Result};
pub use crate::fasta::{parse_fasta, read_fasta, synthesize, write_fasta, Sequence};
pub use crate::floyd::{closure_in_place, floyd_blocks, shortest_paths};
pub use crate::graph::{read_dot, write_dot};
pub use crate::grid::{gather, scatter, GridTopology};
pub use crate::matrix::{DistanceStats, SquareMatrix, INF};
pub use crate::pam::{cluster, cluster_distributed, pam, seed_medoids, Clustering};
pub use crate::report::{format_stats, write_report};
