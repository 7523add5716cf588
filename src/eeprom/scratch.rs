//! Staging area for block reads.
//!
//! Resize law, with `capacity` the size of the current allocation:
//! - first use: allocate `size + SLACK`
//! - `size > capacity`: grow to `size + SLACK`
//! - `size + SHRINK_THRESHOLD < capacity`: shrink to `size + SLACK`
//! - otherwise the allocation is reused
//!
//! Content is not preserved across reallocation; every read overwrites it.

pub const SLACK: usize = 10;
pub const SHRINK_THRESHOLD: usize = 100;

#[derive(Debug, Default)]
pub struct ScratchBuffer {
	data: Box<[u8]>,
	allocated: bool,
}

impl ScratchBuffer {
	pub fn new() -> Self {
		ScratchBuffer {
			data: Box::default(),
			allocated: false,
		}
	}

	pub fn capacity(&self) -> usize {
		self.data.len()
	}

	pub fn is_allocated(&self) -> bool {
		self.allocated
	}

	fn needs_resize(&self, size: usize) -> bool {
		!self.allocated
			|| size > self.data.len()
			|| size + SHRINK_THRESHOLD < self.data.len()
	}

	/// apply the resize law for a read of `size` bytes and return the
	/// region to read into
	pub fn prepare(&mut self, size: usize) -> &mut [u8] {
		if self.needs_resize(size) {
			if self.allocated {
				debug!("{} read buffer from {} to {} bytes",
					if size > self.data.len() { "growing" } else { "shrinking" },
					self.data.len(), size + SLACK);
			}
			self.data = vec![0u8; size + SLACK].into_boxed_slice();
			self.allocated = true;
		}
		&mut self.data[..size]
	}

	/// result of the last read of `size` bytes
	pub fn view(&self, size: usize) -> &[u8] {
		&self.data[..size]
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn check_capacity(buffer: &mut ScratchBuffer, size: usize, capacity: usize) {
		assert_eq!(buffer.prepare(size).len(), size);
		assert_eq!(buffer.capacity(), capacity, "unexpected capacity after read of {} bytes", size);
	}

	#[test]
	fn resize_law() {
		let mut buffer = ScratchBuffer::new();
		assert!(!buffer.is_allocated());
		assert_eq!(buffer.capacity(), 0);

		check_capacity(&mut buffer, 50, 60);
		// within [capacity - 100, capacity]: reuse
		check_capacity(&mut buffer, 60, 60);
		check_capacity(&mut buffer, 1, 60);
		check_capacity(&mut buffer, 0, 60);
		// grow
		check_capacity(&mut buffer, 61, 71);
		check_capacity(&mut buffer, 500, 510);
		// lower bound of the reuse window
		check_capacity(&mut buffer, 410, 510);
		// shrink
		check_capacity(&mut buffer, 409, 419);
		check_capacity(&mut buffer, 20, 30);
	}

	#[test]
	fn first_read_of_nothing() {
		let mut buffer = ScratchBuffer::new();
		check_capacity(&mut buffer, 0, SLACK);
		assert!(buffer.is_allocated());
		check_capacity(&mut buffer, 5, SLACK);
		check_capacity(&mut buffer, 11, 21);
	}
}
