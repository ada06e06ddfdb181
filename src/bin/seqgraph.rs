//! Distance and similarity-graph driver.
//!
//! Reads a FASTA file, builds the pairwise distance matrix, and writes the
//! similarity graph of all pairs closer than epsilon. With `--generate` it
//! instead synthesizes a test FASTA file and exits.

use anyhow::{bail, Context, Result};
use clap::Parser;
use seqpam::{
	build_matrix, read_fasta, synthesize, write_dot, write_fasta, DistanceKind,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build a sequence similarity graph from FASTA input")]
struct Args {
	/// Input FASTA file (output path in --generate mode).
	fasta: PathBuf,

	/// Distance threshold: pairs closer than this become graph edges.
	epsilon: Option<i32>,

	/// Output graph file.
	#[arg(default_value = "arn_graph.dot")]
	output: PathBuf,

	/// Distance type: hamming, edit, kmer, or needleman.
	#[arg(long, default_value = "edit")]
	distance: String,

	/// Substring length for the kmer distance.
	#[arg(long, default_value_t = 3)]
	kmer_size: usize,

	/// Synthesize test sequences instead: <count> <length> [families].
	#[arg(long, num_args = 2..=3, value_name = "N LEN [FAMILIES]")]
	generate: Option<Vec<usize>>,

	/// Seed for --generate.
	#[arg(long, default_value_t = 42)]
	seed: u64,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();
	let args = Args::parse();

	if let Some(gen) = &args.generate {
		let (n, len) = (gen[0], gen[1]);
		let families = gen.get(2).copied().unwrap_or(3);
		let sequences = synthesize(n, len, families, args.seed);
		write_fasta(&args.fasta, &sequences)
			.with_context(|| format!("writing {}", args.fasta.display()))?;
		println!(
			"generated {n} sequences of length {len} ({families} families) into {}",
			args.fasta.display()
		);
		return Ok(());
	}

	let Some(epsilon) = args.epsilon else {
		bail!("epsilon is required: seqgraph <fasta> <epsilon> [output.dot]");
	};
	if epsilon <= 0 {
		bail!("epsilon must be a strictly positive integer, got {epsilon}");
	}
	let mut kind: DistanceKind = args.distance.parse()?;
	if let DistanceKind::Kmer { ref mut k } = kind {
		*k = args.kmer_size;
	}

	let sequences =
		read_fasta(&args.fasta).with_context(|| format!("reading {}", args.fasta.display()))?;
	println!("read {} sequences from {}", sequences.len(), args.fasta.display());

	let matrix = build_matrix(&sequences, &kind)?;
	if let Some(stats) = matrix.stats() {
		println!("{}", seqpam::format_stats(&stats));
	}

	let edges = write_dot(&args.output, &sequences, &matrix, epsilon)
		.with_context(|| format!("writing {}", args.output.display()))?;
	println!(
		"graph written to {}: {} nodes, {edges} edges",
		args.output.display(),
		sequences.len()
	);
	Ok(())
}
