//! Adapter trait for accessing different types of distance matrices.
//!
//! The PAM engine only needs indexed reads, so it stays generic over this
//! trait; the native [`SquareMatrix`](crate::matrix::SquareMatrix) and
//! `ndarray::Array2` both qualify.

/// Adapter trait for accessing different types of distance matrices.
#[allow(clippy::len_without_is_empty)]
pub trait ArrayAdapter<N: Copy> {
	/// Number of rows (points).
	fn len(&self) -> usize;
	/// Verify that it is a square matrix.
	fn is_square(&self) -> bool;
	/// Get the contents at cell x,y.
	fn get(&self, x: usize, y: usize) -> N;
}

impl ArrayAdapter<i32> for crate::matrix::SquareMatrix {
	#[inline]
	fn len(&self) -> usize {
		self.n()
	}
	#[inline]
	fn is_square(&self) -> bool {
		true
	}
	#[inline]
	fn get(&self, x: usize, y: usize) -> i32 {
		crate::matrix::SquareMatrix::get(self, x, y)
	}
}

/// Adapter for `ndarray::Array2`.
#[cfg(feature = "ndarray")]
impl<N: Copy> ArrayAdapter<N> for ndarray::Array2<N> {
	#[inline]
	fn len(&self) -> usize {
		self.shape()[0]
	}
	#[inline]
	fn is_square(&self) -> bool {
		self.shape()[0] == self.shape()[1]
	}
	#[inline]
	fn get(&self, x: usize, y: usize) -> N {
		self[[x, y]]
	}
}
