//! Message-passing abstraction for the outer parallel level.
//!
//! Every distributed stage is written against [`Communicator`], which
//! provides exactly the primitives the engine needs: rank/size, barrier,
//! point-to-point send/recv, broadcast, gather with per-rank counts, and
//! all-reduce integer summation. A group of size 1 ([`SelfComm`]) turns
//! every collective into an identity, which is the sequential fallback.
//! [`ThreadComm`] runs a whole rank group inside one process on top of
//! channels, one directed channel per (source, destination) pair, so
//! same-pair messages stay ordered and collectives cannot cross-talk.
//!
//! Only the thread driving the engine may touch the communicator; rayon
//! workers never do.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::any::Any;
use std::sync::{Arc, Barrier};

type Packet = Box<dyn Any + Send>;

/// Message-passing primitives required by the distributed stages.
pub trait Communicator {
	/// Rank of this process in the group, 0-based.
	fn rank(&self) -> usize;
	/// Number of processes in the group.
	fn size(&self) -> usize;
	/// Block until every rank in the group has arrived.
	fn barrier(&self);
	/// Point-to-point send of an owned buffer.
	fn send<T: Any + Send>(&self, to: usize, buf: Vec<T>);
	/// Point-to-point receive of a buffer from a specific source.
	fn recv<T: Any + Send>(&self, from: usize) -> Vec<T>;

	/// Broadcast a buffer from `root` to the whole group.
	///
	/// The root passes the payload; other ranks pass anything (usually an
	/// empty vector). Every rank returns the root's payload.
	fn broadcast<T: Any + Send + Clone>(&self, root: usize, buf: Vec<T>) -> Vec<T> {
		if self.rank() == root {
			for dest in 0..self.size() {
				if dest != root {
					self.send(dest, buf.clone());
				}
			}
			buf
		} else {
			self.recv(root)
		}
	}

	/// Gather variable-length buffers to `root`, concatenated in rank order.
	///
	/// Returns `Some` on the root, `None` elsewhere.
	fn gatherv<T: Any + Send>(&self, root: usize, local: Vec<T>) -> Option<Vec<T>> {
		if self.rank() == root {
			let mut own = Some(local);
			let mut out = Vec::new();
			for src in 0..self.size() {
				if src == root {
					out.extend(own.take().unwrap());
				} else {
					out.extend(self.recv::<T>(src));
				}
			}
			Some(out)
		} else {
			self.send(root, local);
			None
		}
	}

	/// Element-wise integer sum over the group; every rank gets the result.
	fn allreduce_sum(&self, local: &[i64]) -> Vec<i64> {
		if self.size() == 1 {
			return local.to_vec();
		}
		if self.rank() == 0 {
			let mut sum = local.to_vec();
			for src in 1..self.size() {
				let part = self.recv::<i64>(src);
				debug_assert_eq!(part.len(), sum.len(), "reduction buffers must agree");
				for (acc, v) in sum.iter_mut().zip(part) {
					*acc += v;
				}
			}
			for dest in 1..self.size() {
				self.send(dest, sum.clone());
			}
			sum
		} else {
			self.send(0, local.to_vec());
			self.recv::<i64>(0)
		}
	}
}

/// The trivial group of one process.
///
/// Collectives are identities; point-to-point messaging is a programming
/// error and panics.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfComm;

impl Communicator for SelfComm {
	fn rank(&self) -> usize {
		0
	}
	fn size(&self) -> usize {
		1
	}
	fn barrier(&self) {}
	fn send<T: Any + Send>(&self, to: usize, _buf: Vec<T>) {
		unreachable!("send to rank {to} in a group of one");
	}
	fn recv<T: Any + Send>(&self, from: usize) -> Vec<T> {
		unreachable!("recv from rank {from} in a group of one");
	}
}

/// An in-process rank group: each rank runs on its own thread.
pub struct ThreadComm {
	rank: usize,
	size: usize,
	// Indexed by destination rank; each channel carries (self -> dest) only.
	senders: Vec<Sender<Packet>>,
	// Indexed by source rank.
	receivers: Vec<Receiver<Packet>>,
	barrier: Arc<Barrier>,
}

impl ThreadComm {
	/// Create all communicator endpoints for a group of the given size.
	pub fn group(size: usize) -> Vec<ThreadComm> {
		assert!(size > 0, "group size must be positive");
		let barrier = Arc::new(Barrier::new(size));
		// channel[src][dst]
		let mut txs: Vec<Vec<Option<Sender<Packet>>>> = Vec::with_capacity(size);
		let mut rxs: Vec<Vec<Option<Receiver<Packet>>>> = Vec::with_capacity(size);
		for _ in 0..size {
			txs.push((0..size).map(|_| None).collect());
			rxs.push((0..size).map(|_| None).collect());
		}
		for src in 0..size {
			for dst in 0..size {
				let (tx, rx) = unbounded();
				txs[src][dst] = Some(tx);
				rxs[dst][src] = Some(rx);
			}
		}
		txs.into_iter()
			.zip(rxs)
			.enumerate()
			.map(|(rank, (tx_row, rx_row))| ThreadComm {
				rank,
				size,
				senders: tx_row.into_iter().map(Option::unwrap).collect(),
				receivers: rx_row.into_iter().map(Option::unwrap).collect(),
				barrier: Arc::clone(&barrier),
			})
			.collect()
	}
}

impl Communicator for ThreadComm {
	fn rank(&self) -> usize {
		self.rank
	}
	fn size(&self) -> usize {
		self.size
	}
	fn barrier(&self) {
		self.barrier.wait();
	}
	fn send<T: Any + Send>(&self, to: usize, buf: Vec<T>) {
		self.senders[to]
			.send(Box::new(buf))
			.expect("peer rank is gone, group is aborting");
	}
	fn recv<T: Any + Send>(&self, from: usize) -> Vec<T> {
		let packet = self.receivers[from]
			.recv()
			.expect("peer rank is gone, group is aborting");
		*packet
			.downcast::<Vec<T>>()
			.expect("message element type does not match the matching send")
	}
}

/// Run one closure per rank of an in-process group and collect the results
/// in rank order.
///
/// A panicking rank drops its channel endpoints, which unblocks any peer
/// waiting on it; the panic is propagated to the caller on join, so no rank
/// is left stuck on a collective.
pub fn run_group<R, F>(size: usize, f: F) -> Vec<R>
where
	R: Send,
	F: Fn(ThreadComm) -> R + Sync,
{
	let comms = ThreadComm::group(size);
	std::thread::scope(|scope| {
		let handles: Vec<_> = comms
			.into_iter()
			.map(|comm| {
				let f = &f;
				scope.spawn(move || f(comm))
			})
			.collect();
		handles
			.into_iter()
			.map(|h| h.join().expect("a rank panicked"))
			.collect()
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_self_comm_collectives() {
		let comm = SelfComm;
		assert_eq!(comm.size(), 1);
		assert_eq!(comm.broadcast(0, vec![1, 2, 3]), vec![1, 2, 3]);
		assert_eq!(comm.gatherv(0, vec![7i32]), Some(vec![7]));
		assert_eq!(comm.allreduce_sum(&[4, 5]), vec![4, 5]);
	}

	#[test]
	fn test_broadcast() {
		let results = run_group(4, |comm| {
			let buf = if comm.rank() == 2 { vec![10i32, 20] } else { Vec::new() };
			comm.broadcast(2, buf)
		});
		for got in results {
			assert_eq!(got, vec![10, 20], "every rank must see the root payload");
		}
	}

	#[test]
	fn test_gatherv_rank_order() {
		let results = run_group(3, |comm| {
			// Rank r contributes r + 1 entries of value r.
			let local = vec![comm.rank() as i32; comm.rank() + 1];
			comm.gatherv(0, local)
		});
		assert_eq!(results[0], Some(vec![0, 1, 1, 2, 2, 2]));
		assert_eq!(results[1], None);
		assert_eq!(results[2], None);
	}

	#[test]
	fn test_allreduce_sum() {
		let results = run_group(4, |comm| {
			let local = vec![comm.rank() as i64, 1];
			comm.allreduce_sum(&local)
		});
		for got in results {
			assert_eq!(got, vec![6, 4], "sum must be replicated on every rank");
		}
	}

	#[test]
	fn test_send_recv_ring() {
		let results = run_group(3, |comm| {
			let next = (comm.rank() + 1) % comm.size();
			let prev = (comm.rank() + comm.size() - 1) % comm.size();
			comm.send(next, vec![comm.rank() as i32]);
			comm.recv::<i32>(prev)
		});
		assert_eq!(results, vec![vec![2], vec![0], vec![1]]);
	}

	#[test]
	fn test_barrier_phases() {
		// Two broadcast rounds separated by barriers keep rounds aligned.
		let results = run_group(4, |comm| {
			let a = comm.broadcast(0, if comm.rank() == 0 { vec![1i64] } else { vec![] });
			comm.barrier();
			let b = comm.broadcast(3, if comm.rank() == 3 { vec![2i64] } else { vec![] });
			(a[0], b[0])
		});
		assert!(results.iter().all(|&r| r == (1, 2)));
	}
}
