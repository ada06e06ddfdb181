//! PAM driver over a precomputed distance matrix or similarity graph.
//!
//! Accepts either the matrix text format (first token n, then n * n
//! row-major entries) or a `.dot` similarity graph; a graph is first closed
//! under shortest paths so unreachable pairs keep the INF sentinel.

use anyhow::{Context, Result};
use clap::Parser;
use seqpam::{closure_in_place, cluster, read_dot, SquareMatrix};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "PAM k-medoids over a distance matrix or similarity graph")]
struct Args {
	/// Distance matrix text file, or a .dot similarity graph.
	input: PathBuf,

	/// Number of clusters.
	k: usize,

	/// Seed for the medoid initialization.
	#[arg(default_value_t = 12345)]
	seed: u64,

	/// Worker threads; 0 lets the runtime decide.
	#[arg(default_value_t = 0)]
	threads: usize,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();
	let args = Args::parse();

	if args.threads > 0 {
		rayon::ThreadPoolBuilder::new()
			.num_threads(args.threads)
			.build_global()
			.context("configuring the worker pool")?;
	}

	let is_graph = args.input.extension().is_some_and(|e| e == "dot");
	let matrix = if is_graph {
		let mut adjacency =
			read_dot(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
		closure_in_place(&mut adjacency);
		adjacency
	} else {
		SquareMatrix::read_text(&args.input)
			.with_context(|| format!("reading {}", args.input.display()))?
	};
	println!("matrix: {0} x {0}", matrix.n());

	let clustering = cluster(&matrix, args.k, args.seed)?;
	println!("cost: {}", clustering.cost);
	println!(
		"medoids: {}",
		clustering
			.medoids
			.iter()
			.map(|m| m.to_string())
			.collect::<Vec<_>>()
			.join(" ")
	);
	let mut counts = vec![0usize; args.k];
	for &slot in &clustering.membership {
		counts[slot] += 1;
	}
	println!(
		"points per cluster: {}",
		counts.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
	);
	Ok(())
}
