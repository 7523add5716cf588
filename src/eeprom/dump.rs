use std::time::Instant;

use crate::bus::BusEndpoint;

use super::Eeprom;
use super::error::error_kind;
use super::monitor::{
	Operation,
	Report,
};
use super::pages::Pages;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Chunk {
	pub address: u32,
	pub data: Vec<u8>,
}

/// Reads the whole device page by page.
///
/// Each item is one page (the first and last may be shorter if the device
/// range isn't page aligned). Stops after the first error.
pub struct Dump<'a, B: ?Sized + BusEndpoint + 'a> {
	eeprom: &'a mut Eeprom,
	bus: &'a mut B,
	pages: Pages,
	started: Instant,
	bytes: usize,
	done: bool,
}

impl<'a, B: ?Sized + BusEndpoint> Dump<'a, B> {
	pub(super) fn new(eeprom: &'a mut Eeprom, bus: &'a mut B) -> Self {
		let config = eeprom.config();
		let pages = Pages::new(config.base_address, config.capacity() as usize, config.page_size);
		Dump {
			eeprom,
			bus,
			pages,
			started: Instant::now(),
			bytes: 0,
			done: false,
		}
	}

	fn finish(&mut self, result: Result<(), super::ErrorKind>) {
		self.done = true;
		let report = Report {
			operation: Operation::Dump,
			address: self.eeprom.config().base_address,
			bytes: self.bytes,
			elapsed: self.started.elapsed(),
			result,
		};
		self.eeprom.monitor.completed(&report);
	}
}

impl<'a, B: ?Sized + BusEndpoint> Iterator for Dump<'a, B> {
	type Item = crate::AResult<Chunk>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		let page = match self.pages.next() {
			Some(p) => p,
			None => {
				self.finish(Ok(()));
				return None;
			},
		};
		match self.eeprom.read_block(&mut *self.bus, page.address, page.len) {
			Ok(data) => {
				let data = data.to_vec();
				self.bytes += data.len();
				Some(Ok(Chunk {
					address: page.address,
					data,
				}))
			},
			Err(e) => {
				let kind = error_kind(&e).unwrap_or(super::ErrorKind::InvalidArgument);
				self.finish(Err(kind));
				Some(Err(e))
			},
		}
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		if self.done {
			(0, Some(0))
		} else {
			(0, Some(self.pages.len()))
		}
	}
}
