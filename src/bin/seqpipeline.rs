//! Full pipeline driver: FASTA to clustered similarity graph.
//!
//! Builds the distance matrix, filters it by the epsilon threshold, closes
//! it under shortest paths so chained similarity counts, clusters with PAM,
//! and writes the similarity graph plus an optional cluster report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use seqpam::{
	build_matrix, cluster, read_fasta, shortest_paths, write_dot, write_report, DistanceKind,
	SelfComm, INF,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cluster sequences end to end and emit the similarity graph")]
struct Args {
	/// Input FASTA file.
	fasta: PathBuf,

	/// Distance threshold for the similarity filter and the graph edges.
	epsilon: i32,

	/// Number of clusters for PAM.
	k_clusters: usize,

	/// Output graph file.
	#[arg(default_value = "arn_graph.dot")]
	output: PathBuf,

	/// Distance type: hamming, edit, kmer, or needleman.
	#[arg(long, default_value = "edit")]
	distance: String,

	/// Substring length for the kmer distance.
	#[arg(long, default_value_t = 3)]
	kmer_size: usize,

	/// Seed for the medoid initialization.
	#[arg(long, default_value_t = 12345)]
	seed: u64,

	/// Skip the shortest-path closure and cluster on raw distances.
	#[arg(long)]
	no_floyd: bool,

	/// Also write a per-cluster text report to this path.
	#[arg(long)]
	report: Option<PathBuf>,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();
	let args = Args::parse();

	if args.epsilon <= 0 {
		bail!("epsilon must be a strictly positive integer, got {}", args.epsilon);
	}
	if args.k_clusters < 1 {
		bail!("at least one cluster is required");
	}
	let mut kind: DistanceKind = args.distance.parse()?;
	if let DistanceKind::Kmer { ref mut k } = kind {
		*k = args.kmer_size;
	}

	let sequences =
		read_fasta(&args.fasta).with_context(|| format!("reading {}", args.fasta.display()))?;
	println!("[1/4] read {} sequences", sequences.len());

	let distances = build_matrix(&sequences, &kind)?;
	if let Some(stats) = distances.stats() {
		println!("{}", seqpam::format_stats(&stats));
	}

	let closed = if args.no_floyd {
		distances.clone()
	} else {
		// Epsilon at INF or above means no filtering: close the raw
		// distances directly.
		let input = if args.epsilon < INF {
			distances.filter(args.epsilon).distances_from_adjacency()
		} else {
			distances.clone()
		};
		println!("[2/4] shortest-path closure");
		shortest_paths(&SelfComm, Some(input))?.expect("single-process closure returns the matrix")
	};

	println!("[3/4] PAM clustering, k = {}", args.k_clusters);
	let clustering = cluster(&closed, args.k_clusters, args.seed)?;
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
	let mut counts = vec![0usize; args.k_clusters];
	for &slot in &clustering.membership {
		counts[slot] += 1;
	}
	println!(
		"points per cluster: {}",
		counts.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
	);

	println!("[4/4] writing outputs");
	let edges = write_dot(&args.output, &sequences, &closed, args.epsilon)
		.with_context(|| format!("writing {}", args.output.display()))?;
	println!("graph written to {}: {edges} edges", args.output.display());
	if let Some(report) = &args.report {
		write_report(report, &sequences, &clustering)
			.with_context(|| format!("writing {}", report.display()))?;
		println!("report written to {}", report.display());
	}
	Ok(())
}
