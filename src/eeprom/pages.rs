#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PageChunk {
	// memory address of the first byte
	pub address: u32,
	// offset of the first byte within the whole range
	pub offset: usize,
	pub len: usize,
}

/// Splits `[address, address + len)` at multiples of the page size; the
/// first and last chunk may be shorter than a page.
#[derive(Clone, Debug)]
pub struct Pages {
	address: u32,
	offset: usize,
	remaining: usize,
	page_size: u32,
}

impl Pages {
	pub fn new(address: u32, len: usize, page_size: u16) -> Self {
		assert!(page_size > 0);
		Pages {
			address,
			offset: 0,
			remaining: len,
			page_size: u32::from(page_size),
		}
	}
}

impl Iterator for Pages {
	type Item = PageChunk;

	fn next(&mut self) -> Option<Self::Item> {
		if 0 == self.remaining {
			return None;
		}
		let room = (self.page_size - self.address % self.page_size) as usize;
		let len = std::cmp::min(room, self.remaining);
		let chunk = PageChunk {
			address: self.address,
			offset: self.offset,
			len,
		};
		self.address += len as u32;
		self.offset += len;
		self.remaining -= len;
		Some(chunk)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		if 0 == self.remaining {
			return (0, Some(0));
		}
		let page_size = self.page_size as usize;
		let head = std::cmp::min(page_size - (self.address % self.page_size) as usize, self.remaining);
		let count = 1 + (self.remaining - head + page_size - 1) / page_size;
		(count, Some(count))
	}
}

impl ExactSizeIterator for Pages {
}

#[cfg(test)]
mod test {
	use super::*;

	fn check_pages(address: u32, len: usize, page_size: u16, expected: &[(u32, usize)]) {
		let pages = Pages::new(address, len, page_size);
		assert_eq!(pages.len(), expected.len(), "page count for {} bytes at 0x{:x}", len, address);
		let chunks: Vec<PageChunk> = pages.collect();
		let got: Vec<(u32, usize)> = chunks.iter().map(|c| (c.address, c.len)).collect();
		assert_eq!(&got[..], expected);

		// chunks cover the range in order, without gaps
		let mut offset = 0;
		for c in &chunks {
			assert_eq!(c.offset, offset);
			assert_eq!(c.address, address + offset as u32);
			offset += c.len;
		}
		assert_eq!(offset, len);
	}

	#[test]
	fn split_at_page_boundaries() {
		check_pages(0x00a, 22, 16, &[(0x00a, 6), (0x010, 16)]);
		check_pages(0x000, 32, 16, &[(0x000, 16), (0x010, 16)]);
		check_pages(0x00a, 23, 16, &[(0x00a, 6), (0x010, 16), (0x020, 1)]);
		check_pages(0x00f, 1, 16, &[(0x00f, 1)]);
		check_pages(0x00f, 2, 16, &[(0x00f, 1), (0x010, 1)]);
		check_pages(0x100, 0x300, 256, &[(0x100, 256), (0x200, 256), (0x300, 256)]);
		check_pages(0x005, 0, 16, &[]);
	}
}
