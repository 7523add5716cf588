//! Driver for AT24-style two-wire EEPROMs.
//!
//! The device is described by an `EepromConfig`; the bus itself is passed to
//! every operation, so several devices can share one endpoint. Operations
//! are synchronous: each transaction blocks until the endpoint finished it
//! (or the configured timeout hit), writes additionally wait for the
//! settle delay.

use std::fmt;
use std::io;
use std::time::Instant;

use crate::bus::BusEndpoint;
use crate::config::EepromConfig;

mod dump;
mod error;
mod monitor;
mod pages;
mod scratch;
mod transaction;

pub use self::dump::{
	Chunk,
	Dump,
};
pub use self::error::{
	ErrorKind,
	TransactionError,
	classify,
	error_kind,
};
pub use self::monitor::{
	LogMonitor,
	Monitor,
	NullMonitor,
	Operation,
	Report,
};
pub use self::pages::{
	PageChunk,
	Pages,
};
pub use self::scratch::ScratchBuffer;

use self::transaction::Transaction;

pub struct Eeprom {
	config: EepromConfig,
	scratch: ScratchBuffer,
	monitor: Box<dyn Monitor + Send>,
}

impl fmt::Debug for Eeprom {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Eeprom")
			.field("config", &self.config)
			.field("scratch", &self.scratch)
			.finish()
	}
}

impl Eeprom {
	pub fn new(config: EepromConfig) -> crate::AResult<Self> {
		config.validate()?;
		Ok(Eeprom {
			config,
			scratch: ScratchBuffer::new(),
			monitor: Box::new(LogMonitor),
		})
	}

	/// like `new`, but also sets up the bus if `config.bus` asks for it
	pub fn open<B: ?Sized + BusEndpoint>(bus: &mut B, config: EepromConfig) -> crate::AResult<Self> {
		let mut eeprom = Eeprom::new(config)?;
		if let Some(bus_config) = eeprom.config.bus {
			let port = eeprom.config.port;
			info!("{}: configuring bus (scl {}, sda {}, {} Hz, pull-ups {})",
				port, bus_config.scl, bus_config.sda, bus_config.frequency,
				if bus_config.pull_up { "on" } else { "off" });
			let status = bus.configure(port, &bus_config);
			eeprom.monitor.transaction(Operation::ConfigureBus, 0, status);
			if let Err(kind) = classify(status) {
				return Err(TransactionError {
					kind,
					operation: Operation::ConfigureBus,
					address: None,
				}.into());
			}
		}
		Ok(eeprom)
	}

	pub fn config(&self) -> &EepromConfig {
		&self.config
	}

	pub fn capacity(&self) -> u32 {
		self.config.capacity()
	}

	/// current allocation of the read buffer
	pub fn scratch_capacity(&self) -> usize {
		self.scratch.capacity()
	}

	pub fn set_monitor(&mut self, monitor: Box<dyn Monitor + Send>) {
		self.monitor = monitor;
	}

	fn report(&mut self, operation: Operation, address: u32, bytes: usize, started: Instant, result: &crate::AResult<()>) {
		let result = match result {
			Ok(()) => Ok(()),
			Err(e) => Err(error_kind(e).unwrap_or(ErrorKind::InvalidArgument)),
		};
		self.monitor.completed(&Report {
			operation,
			address,
			bytes,
			elapsed: started.elapsed(),
			result,
		});
	}

	// one write transaction per page chunk of `[address, address + len)`;
	// aborts on the first failed chunk
	fn write_pages<'d, B, F>(&mut self, bus: &mut B, operation: Operation, address: u32, len: usize, payload: F) -> crate::AResult<()>
	where
		B: ?Sized + BusEndpoint,
		F: Fn(&PageChunk) -> &'d [u8],
	{
		let started = Instant::now();
		let mut written = 0;
		let mut result = Ok(());
		{
			let mut tx = Transaction::new(bus, &self.config, &mut *self.monitor);
			for page in Pages::new(address, len, self.config.page_size) {
				if let Err(e) = tx.write(operation, page.address, payload(&page)) {
					warn!("{}: aborting after {} of {} bytes", operation, written, len);
					result = Err(e);
					break;
				}
				written += page.len;
			}
		}
		self.report(operation, address, written, started, &result);
		result
	}

	pub fn write_byte<B: ?Sized + BusEndpoint>(&mut self, bus: &mut B, address: u32, value: u8) -> crate::AResult<()> {
		self.config.check_range(address, 1)?;
		let started = Instant::now();
		let result = Transaction::new(bus, &self.config, &mut *self.monitor)
			.write(Operation::WriteByte, address, &[value]);
		let bytes = if result.is_ok() { 1 } else { 0 };
		self.report(Operation::WriteByte, address, bytes, started, &result);
		result
	}

	/// write `data` starting at `address`, split into one transaction per
	/// page; stops at the first failing page (earlier pages stay written)
	pub fn write_block<B: ?Sized + BusEndpoint>(&mut self, bus: &mut B, address: u32, data: &[u8]) -> crate::AResult<()> {
		self.config.check_range(address, data.len())?;
		self.write_pages(bus, Operation::WriteBlock, address, data.len(), move |page: &PageChunk| {
			&data[page.offset..page.offset + page.len]
		})
	}

	pub fn read_byte<B: ?Sized + BusEndpoint>(&mut self, bus: &mut B, address: u32) -> crate::AResult<u8> {
		self.config.check_range(address, 1)?;
		let started = Instant::now();
		let mut rx = [0u8];
		let result = Transaction::new(bus, &self.config, &mut *self.monitor)
			.read(Operation::ReadByte, address, &mut rx);
		let bytes = if result.is_ok() { 1 } else { 0 };
		self.report(Operation::ReadByte, address, bytes, started, &result);
		result?;
		Ok(rx[0])
	}

	/// read `size` bytes in a single transaction into the internal buffer
	///
	/// The returned data is overwritten by the next read. A read of zero
	/// bytes doesn't touch the bus.
	pub fn read_block<B: ?Sized + BusEndpoint>(&mut self, bus: &mut B, address: u32, size: usize) -> crate::AResult<&[u8]> {
		self.config.check_range(address, size)?;
		let started = Instant::now();
		let result = {
			let buffer = self.scratch.prepare(size);
			if buffer.is_empty() {
				Ok(())
			} else {
				Transaction::new(bus, &self.config, &mut *self.monitor)
					.read(Operation::ReadBlock, address, buffer)
			}
		};
		if size > 0 {
			let bytes = if result.is_ok() { size } else { 0 };
			self.report(Operation::ReadBlock, address, bytes, started, &result);
		}
		result?;
		Ok(self.scratch.view(size))
	}

	/// read `expected.len()` bytes at `address` and compare
	pub fn verify<B: ?Sized + BusEndpoint>(&mut self, bus: &mut B, address: u32, expected: &[u8]) -> crate::AResult<()> {
		let data = self.read_block(bus, address, expected.len())?;
		if let Some(pos) = data.iter().zip(expected).position(|(d, e)| d != e) {
			bail!("Verify failed at 0x{:04x}: expected 0x{:02x}, eeprom has 0x{:02x}",
				address + pos as u32, expected[pos], data[pos]);
		}
		Ok(())
	}

	/// page sized chunks covering the whole device
	pub fn dump<'a, B: ?Sized + BusEndpoint>(&'a mut self, bus: &'a mut B) -> Dump<'a, B> {
		Dump::new(self, bus)
	}

	/// write the whole device content to `out`
	pub fn dump_to<B, W>(&mut self, bus: &mut B, mut out: W) -> crate::AResult<usize>
	where
		B: ?Sized + BusEndpoint,
		W: io::Write,
	{
		let mut total = 0;
		for chunk in self.dump(bus) {
			let chunk = chunk?;
			out.write_all(&chunk.data)?;
			total += chunk.data.len();
		}
		out.flush()?;
		Ok(total)
	}

	/// fill the whole device with `fill`, page by page
	pub fn format<B: ?Sized + BusEndpoint>(&mut self, bus: &mut B, fill: u8) -> crate::AResult<()> {
		let fill_page = vec![fill; usize::from(self.config.page_size)];
		let fill_page = &fill_page[..];
		let base = self.config.base_address;
		let len = self.config.capacity() as usize;
		self.write_pages(bus, Operation::Format, base, len, move |page: &PageChunk| {
			&fill_page[..page.len]
		})
	}
}
