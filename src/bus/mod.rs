//! Command level interface to a two-wire (I²C) bus controller.
//!
//! A transaction is described as a `CommandLink`: an ordered list of start
//! conditions, bytes to send, bytes to receive and a final stop condition.
//! An endpoint runs the whole link (or nothing of it) and reports a raw
//! `Status`; interpreting the status is left to the caller.
//!
//! Device headers:
//! - 7-bit address: single byte `address << 1 | R/W`
//! - 10-bit address: `0b11110_xx_0` followed by the low address byte; after
//!   a repeated start only the first byte (with the READ bit) is sent again

use std::fmt;
use std::thread;
use std::time::{
	Duration,
	Instant,
};

use crate::config::BusConfig;

pub mod linux;
pub mod memory;

pub use self::linux::I2cDev;
pub use self::memory::{
	MemoryBus,
	Submission,
};

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// Identifies a bus controller (on linux: the `N` in `/dev/i2c-N`)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Port(pub u32);

impl fmt::Display for Port {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "i2c-{}", self.0)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Write,
	Read,
}

impl Direction {
	pub fn bit(self) -> u8 {
		match self {
			Direction::Write => 0,
			Direction::Read => 1,
		}
	}
}

/// Acknowledge sent by the master after receiving a byte
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Ack {
	Ack,
	// signals the device that no more bytes are wanted
	Nack,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Command {
	// (repeated) start condition
	Start,
	// send byte, device must acknowledge
	Write(u8),
	// receive byte, answer with given acknowledge
	Read(Ack),
	Stop,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct CommandLink {
	commands: Vec<Command>,
}

impl CommandLink {
	pub fn new() -> Self {
		CommandLink {
			commands: Vec::new(),
		}
	}

	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// number of bytes the link receives
	pub fn read_len(&self) -> usize {
		self.commands.iter().filter(|c| match c {
			Command::Read(_) => true,
			_ => false,
		}).count()
	}

	pub fn start(&mut self) -> &mut Self {
		self.commands.push(Command::Start);
		self
	}

	pub fn stop(&mut self) -> &mut Self {
		self.commands.push(Command::Stop);
		self
	}

	pub fn write_byte(&mut self, byte: u8) -> &mut Self {
		self.commands.push(Command::Write(byte));
		self
	}

	pub fn write(&mut self, data: &[u8]) -> &mut Self {
		self.commands.extend(data.iter().map(|&b| Command::Write(b)));
		self
	}

	/// device address byte(s) selecting the direction of the following
	/// transfer
	pub fn header(&mut self, address: u16, direction: Direction) -> &mut Self {
		if address > 0x7f {
			self.write_byte(0xf0 | ((address >> 7) as u8 & 0x06) | direction.bit());
			if direction == Direction::Write {
				self.write_byte(address as u8);
			}
		} else {
			self.write_byte(((address as u8) << 1) | direction.bit());
		}
		self
	}

	pub fn read_byte(&mut self, ack: Ack) -> &mut Self {
		self.commands.push(Command::Read(ack));
		self
	}

	/// receive `len` bytes, acknowledging all but the last one
	pub fn read(&mut self, len: usize) -> &mut Self {
		if len == 0 {
			return self;
		}
		for _ in 1..len {
			self.read_byte(Ack::Ack);
		}
		self.read_byte(Ack::Nack)
	}
}

/// Raw result of a submitted link; negative errno values (`0` is success).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Status(pub i32);

impl Status {
	pub const OK: Status = Status(0);
	// malformed link or parameters
	pub const INVALID_ARG: Status = Status(-libc::EINVAL);
	// controller not ready / busy
	pub const INVALID_STATE: Status = Status(-libc::EBUSY);
	pub const TIMEOUT: Status = Status(-libc::ETIMEDOUT);
	// nobody acknowledged a byte
	pub const NOT_ACKNOWLEDGED: Status = Status(-libc::ENXIO);

	pub fn from_errno(errno: i32) -> Self {
		Status(-errno)
	}

	pub fn is_ok(self) -> bool {
		self == Status::OK
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

pub trait BusEndpoint {
	/// run the full `link` on `port` within `timeout`; received bytes are
	/// stored in `rx` in order (`rx.len()` must match `link.read_len()`).
	fn submit(&mut self, port: Port, link: &CommandLink, rx: &mut [u8], timeout: Duration) -> Status;

	/// pin and clock setup; endpoints that are configured elsewhere accept
	/// anything
	fn configure(&mut self, port: Port, config: &BusConfig) -> Status {
		let _ = (port, config);
		Status::OK
	}

	fn delay(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}
}

impl<'a, B: ?Sized + BusEndpoint> BusEndpoint for &'a mut B {
	fn submit(&mut self, port: Port, link: &CommandLink, rx: &mut [u8], timeout: Duration) -> Status {
		B::submit(*self, port, link, rx, timeout)
	}

	fn configure(&mut self, port: Port, config: &BusConfig) -> Status {
		B::configure(*self, port, config)
	}

	fn delay(&mut self, duration: Duration) {
		B::delay(*self, duration)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn seven_bit_headers() {
		let mut link = CommandLink::new();
		link.header(0x50, Direction::Write).header(0x50, Direction::Read);
		assert_eq!(link.commands(), &[Command::Write(0xa0), Command::Write(0xa1)]);
	}

	#[test]
	fn ten_bit_headers() {
		let mut link = CommandLink::new();
		link.header(0x2a5, Direction::Write);
		assert_eq!(link.commands(), &[Command::Write(0xf4), Command::Write(0xa5)]);

		let mut link = CommandLink::new();
		link.header(0x2a5, Direction::Read);
		assert_eq!(link.commands(), &[Command::Write(0xf5)]);
	}

	#[test]
	fn read_acknowledges_all_but_last() {
		let mut link = CommandLink::new();
		link.read(3);
		assert_eq!(link.commands(), &[
			Command::Read(Ack::Ack),
			Command::Read(Ack::Ack),
			Command::Read(Ack::Nack),
		]);
		assert_eq!(link.read_len(), 3);

		let mut link = CommandLink::new();
		link.read(0);
		assert!(link.is_empty());
	}

	#[test]
	fn status_codes() {
		assert!(Status::OK.is_ok());
		assert!(!Status::TIMEOUT.is_ok());
		assert_eq!(Status::from_errno(libc::EINVAL), Status::INVALID_ARG);
	}
}
