//! Command sequences (see AT24CM02 datasheet, "Write Operations" and
//! "Read Operations"):
//!
//! - write: `S, DEV|W, ADDR.., DATA.., P`
//! - random read: `S, DEV|W, ADDR.., Sr, DEV|R, DATA (NACK), P`
//! - sequential read: like random read, but every data byte except the last
//!   one gets ACKed
//!
//! Every write is followed by the settle delay, so the next transaction
//! doesn't run into the internal write cycle.

use crate::bus::{
	BusEndpoint,
	CommandLink,
	Direction,
};
use crate::config::{
	AddressWidth,
	EepromConfig,
};

use super::error::{
	TransactionError,
	classify,
};
use super::monitor::{
	Monitor,
	Operation,
};

fn push_memory_address(link: &mut CommandLink, width: AddressWidth, address: u32) {
	match width {
		AddressWidth::One => {
			link.write_byte(address as u8);
		},
		AddressWidth::Two => {
			link.write_byte((address >> 8) as u8);
			link.write_byte(address as u8);
		},
		AddressWidth::Three => {
			link.write_byte((address >> 16) as u8);
			link.write_byte((address >> 8) as u8);
			link.write_byte(address as u8);
		},
	}
}

pub(super) fn write_link(config: &EepromConfig, address: u32, data: &[u8]) -> CommandLink {
	let mut link = CommandLink::new();
	link.start().header(config.address, Direction::Write);
	push_memory_address(&mut link, config.address_width, address);
	link.write(data).stop();
	link
}

pub(super) fn read_link(config: &EepromConfig, address: u32, len: usize) -> CommandLink {
	let mut link = CommandLink::new();
	link.start().header(config.address, Direction::Write);
	push_memory_address(&mut link, config.address_width, address);
	link.start()
		.header(config.address, Direction::Read)
		.read(len)
		.stop();
	link
}

pub(super) struct Transaction<'a, B: ?Sized + 'a> {
	bus: &'a mut B,
	config: &'a EepromConfig,
	monitor: &'a mut (dyn Monitor + Send),
}

impl<'a, B: ?Sized + BusEndpoint> Transaction<'a, B> {
	pub fn new(bus: &'a mut B, config: &'a EepromConfig, monitor: &'a mut (dyn Monitor + Send)) -> Self {
		Transaction {
			bus,
			config,
			monitor,
		}
	}

	fn submit(&mut self, operation: Operation, address: u32, link: &CommandLink, rx: &mut [u8]) -> crate::AResult<()> {
		let status = self.bus.submit(self.config.port, link, rx, self.config.timeout);
		self.monitor.transaction(operation, address, status);
		classify(status).map_err(|kind| TransactionError::new(kind, operation, address).into())
	}

	/// single write transaction; `data` must not cross a page boundary
	pub fn write(&mut self, operation: Operation, address: u32, data: &[u8]) -> crate::AResult<()> {
		let link = write_link(self.config, address, data);
		let result = self.submit(operation, address, &link, &mut []);
		self.bus.delay(self.config.settle_delay);
		result
	}

	/// single read transaction filling all of `rx`
	pub fn read(&mut self, operation: Operation, address: u32, rx: &mut [u8]) -> crate::AResult<()> {
		ensure!(!rx.is_empty(), "read transaction without data at 0x{:04x}", address);
		let link = read_link(self.config, address, rx.len());
		self.submit(operation, address, &link, rx)
	}
}
