//! Simulated bus with a single AT24-style EEPROM attached.
//!
//! Behaviour of the simulated chip:
//! - only the configured device address gets acknowledged
//! - the memory address pointer is loaded after the configured number of
//!   address bytes
//! - written bytes wrap around within the current page
//! - reads continue sequentially and wrap at the end of the array
//!
//! A link is validated completely before its writes are committed, so a
//! failing submission never changes the memory.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::{
	AddressWidth,
	BusConfig,
	EepromConfig,
};

use super::{
	BusEndpoint,
	Command,
	CommandLink,
	Port,
	Status,
};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Submission {
	pub port: Port,
	pub link: CommandLink,
	pub timeout: Duration,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
	Idle,
	Header,
	// first byte of a 10-bit write header seen; holds address bits 9..8
	TenBitLow(u16),
	MemoryAddress,
	Writing,
	Reading,
}

#[derive(Debug)]
pub struct MemoryBus {
	address: u16,
	address_width: AddressWidth,
	page_size: usize,
	memory: Vec<u8>,
	pointer: usize,
	submitted: usize,
	submissions: Vec<Submission>,
	faults: HashMap<usize, Status>,
	delays: Vec<Duration>,
	configured: Vec<(Port, BusConfig)>,
}

impl MemoryBus {
	/// erased (all `0xff`) chip of `size` bytes
	pub fn new(address: u16, size: usize, page_size: usize, address_width: AddressWidth) -> Self {
		assert!(size > 0 && page_size > 0);
		MemoryBus {
			address,
			address_width,
			page_size,
			memory: vec![0xff; size],
			pointer: 0,
			submitted: 0,
			submissions: Vec::new(),
			faults: HashMap::new(),
			delays: Vec::new(),
			configured: Vec::new(),
		}
	}

	/// chip matching `config`, with memory covering `0..top_address`
	pub fn for_config(config: &EepromConfig) -> Self {
		MemoryBus::new(
			config.address,
			config.top_address as usize,
			config.page_size as usize,
			config.address_width,
		)
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}

	/// every link submitted since the last `clear_log`
	pub fn submissions(&self) -> &[Submission] {
		&self.submissions
	}

	pub fn delays(&self) -> &[Duration] {
		&self.delays
	}

	pub fn configured(&self) -> &[(Port, BusConfig)] {
		&self.configured
	}

	pub fn clear_log(&mut self) {
		self.submissions.clear();
		self.delays.clear();
	}

	/// let the `index`-th submission (counting from 0, including already
	/// submitted links) fail with `status`
	pub fn fail_submission(&mut self, index: usize, status: Status) {
		self.faults.insert(index, status);
	}

	/// `(memory address, payload)` of every logged write transaction with
	/// data bytes
	pub fn written_chunks(&self) -> Vec<(u32, Vec<u8>)> {
		let mut chunks = Vec::new();
		'links: for submission in &self.submissions {
			let mut bytes = Vec::new();
			for command in submission.link.commands() {
				match *command {
					Command::Write(b) => bytes.push(b),
					Command::Read(_) => continue 'links,
					_ => (),
				}
			}
			let header = match bytes.first() {
				Some(b) if b & 0xf8 == 0xf0 => 2,
				_ => 1,
			};
			let skip = header + self.address_width.bytes();
			if bytes.len() <= skip {
				continue;
			}
			let address = bytes[header..skip].iter().fold(0u32, |a, &b| (a << 8) | u32::from(b));
			chunks.push((address, bytes[skip..].to_vec()));
		}
		chunks
	}

	fn next_in_page(&self, pointer: usize) -> usize {
		let page_start = pointer - pointer % self.page_size;
		let next = pointer + 1;
		if next - page_start >= self.page_size || next >= self.memory.len() {
			page_start
		} else {
			next
		}
	}

	fn run(&mut self, link: &CommandLink, rx: &mut [u8]) -> Status {
		let mut phase = Phase::Idle;
		let mut stopped = false;
		let mut ten_bit_selected = None;
		let mut address_bytes = 0;
		let mut address = 0usize;
		let mut pointer = self.pointer;
		let mut writes = Vec::new();
		let mut received = 0;

		for command in link.commands() {
			if stopped {
				return Status::INVALID_ARG;
			}
			match *command {
				Command::Start => phase = Phase::Header,
				Command::Stop => {
					if phase == Phase::Idle {
						return Status::INVALID_ARG;
					}
					stopped = true;
				},
				Command::Write(byte) => match phase {
					Phase::Idle | Phase::Reading => return Status::INVALID_ARG,
					Phase::Header => {
						if byte & 0xf8 == 0xf0 {
							let high = u16::from(byte & 0x06) << 7;
							if byte & 1 == 0 {
								phase = Phase::TenBitLow(high);
							} else {
								match ten_bit_selected {
									Some(a) if a & 0x300 == high => phase = Phase::Reading,
									_ => return Status::NOT_ACKNOWLEDGED,
								}
							}
						} else {
							if u16::from(byte >> 1) != self.address {
								return Status::NOT_ACKNOWLEDGED;
							}
							if byte & 1 == 0 {
								address_bytes = 0;
								address = 0;
								phase = Phase::MemoryAddress;
							} else {
								phase = Phase::Reading;
							}
						}
					},
					Phase::TenBitLow(high) => {
						let a = high | u16::from(byte);
						if a != self.address {
							return Status::NOT_ACKNOWLEDGED;
						}
						ten_bit_selected = Some(a);
						address_bytes = 0;
						address = 0;
						phase = Phase::MemoryAddress;
					},
					Phase::MemoryAddress => {
						address = (address << 8) | byte as usize;
						address_bytes += 1;
						if address_bytes == self.address_width.bytes() {
							pointer = address % self.memory.len();
							phase = Phase::Writing;
						}
					},
					Phase::Writing => {
						writes.push((pointer, byte));
						pointer = self.next_in_page(pointer);
					},
				},
				Command::Read(_) => {
					if phase != Phase::Reading || received >= rx.len() {
						return Status::INVALID_ARG;
					}
					rx[received] = self.memory[pointer];
					received += 1;
					pointer = (pointer + 1) % self.memory.len();
				},
			}
		}

		if !stopped || received != rx.len() {
			return Status::INVALID_ARG;
		}

		for (a, b) in writes {
			self.memory[a] = b;
		}
		self.pointer = pointer;
		Status::OK
	}
}

impl BusEndpoint for MemoryBus {
	fn submit(&mut self, port: Port, link: &CommandLink, rx: &mut [u8], timeout: Duration) -> Status {
		let index = self.submitted;
		self.submitted += 1;
		self.submissions.push(Submission {
			port,
			link: link.clone(),
			timeout,
		});

		if let Some(status) = self.faults.remove(&index) {
			trace!("{}: failing submission {} with status {}", port, index, status);
			return status;
		}

		self.run(link, rx)
	}

	fn configure(&mut self, port: Port, config: &BusConfig) -> Status {
		self.configured.push((port, *config));
		Status::OK
	}

	fn delay(&mut self, duration: Duration) {
		self.delays.push(duration);
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::bus::{
		Ack,
		Direction,
	};

	const TIMEOUT: Duration = Duration::from_millis(1000);

	fn bus() -> MemoryBus {
		MemoryBus::new(0x50, 0x100, 16, AddressWidth::Two)
	}

	fn write_link(address: u16, data: &[u8]) -> CommandLink {
		let mut link = CommandLink::new();
		link.start()
			.header(0x50, Direction::Write)
			.write(&address.to_be_bytes())
			.write(data)
			.stop();
		link
	}

	fn read_link(address: u16, len: usize) -> CommandLink {
		let mut link = CommandLink::new();
		link.start()
			.header(0x50, Direction::Write)
			.write(&address.to_be_bytes())
			.start()
			.header(0x50, Direction::Read)
			.read(len)
			.stop();
		link
	}

	#[test]
	fn write_then_read() {
		let mut bus = bus();
		assert_eq!(bus.submit(Port(0), &write_link(0x20, b"abc"), &mut [], TIMEOUT), Status::OK);
		assert_eq!(&bus.memory()[0x20..0x23], b"abc");

		let mut rx = [0u8; 4];
		assert_eq!(bus.submit(Port(0), &read_link(0x1f, 4), &mut rx, TIMEOUT), Status::OK);
		assert_eq!(&rx, b"\xffabc");
	}

	#[test]
	fn write_wraps_within_page() {
		let mut bus = bus();
		assert_eq!(bus.submit(Port(0), &write_link(0x1e, b"wxyz"), &mut [], TIMEOUT), Status::OK);
		assert_eq!(&bus.memory()[0x1e..0x20], b"wx");
		assert_eq!(&bus.memory()[0x10..0x12], b"yz");
		assert_eq!(bus.memory()[0x20], 0xff);
	}

	#[test]
	fn other_device_not_acknowledged() {
		let mut bus = bus();
		let mut link = CommandLink::new();
		link.start().header(0x51, Direction::Write).write(&[0, 0, 1]).stop();
		assert_eq!(bus.submit(Port(0), &link, &mut [], TIMEOUT), Status::NOT_ACKNOWLEDGED);
		assert!(bus.memory().iter().all(|&b| b == 0xff));
	}

	#[test]
	fn malformed_links() {
		let mut bus = bus();

		// missing stop
		let mut link = CommandLink::new();
		link.start().header(0x50, Direction::Write).write(&[0, 0, 1]);
		assert_eq!(bus.submit(Port(0), &link, &mut [], TIMEOUT), Status::INVALID_ARG);

		// reading without read header
		let mut link = CommandLink::new();
		link.start().header(0x50, Direction::Write).read_byte(Ack::Nack).stop();
		assert_eq!(bus.submit(Port(0), &link, &mut [0], TIMEOUT), Status::INVALID_ARG);

		// receive buffer doesn't match
		assert_eq!(bus.submit(Port(0), &read_link(0, 2), &mut [0; 3], TIMEOUT), Status::INVALID_ARG);

		assert!(bus.memory().iter().all(|&b| b == 0xff));
	}

	#[test]
	fn ten_bit_device() {
		let mut bus = MemoryBus::new(0x2a5, 0x100, 16, AddressWidth::One);
		let mut link = CommandLink::new();
		link.start().header(0x2a5, Direction::Write).write(&[0x10, 0x42]).stop();
		assert_eq!(bus.submit(Port(0), &link, &mut [], TIMEOUT), Status::OK);

		let mut link = CommandLink::new();
		link.start()
			.header(0x2a5, Direction::Write)
			.write_byte(0x10)
			.start()
			.header(0x2a5, Direction::Read)
			.read(1)
			.stop();
		let mut rx = [0u8];
		assert_eq!(bus.submit(Port(0), &link, &mut rx, TIMEOUT), Status::OK);
		assert_eq!(rx[0], 0x42);
		assert_eq!(bus.written_chunks(), vec![(0x10, vec![0x42])]);
	}

	#[test]
	fn injected_faults() {
		let mut bus = bus();
		bus.fail_submission(1, Status::TIMEOUT);
		assert_eq!(bus.submit(Port(0), &write_link(0, b"a"), &mut [], TIMEOUT), Status::OK);
		assert_eq!(bus.submit(Port(0), &write_link(1, b"b"), &mut [], TIMEOUT), Status::TIMEOUT);
		assert_eq!(bus.submit(Port(0), &write_link(2, b"c"), &mut [], TIMEOUT), Status::OK);
		assert_eq!(&bus.memory()[0..3], b"a\xffc");
		assert_eq!(bus.submissions().len(), 3);
	}
}
