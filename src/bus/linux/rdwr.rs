//! Translation of command links into `I2C_RDWR` messages.
//!
//! The kernel puts a (repeated) start condition before every message and a
//! single stop condition after the last one; it also NACKs the last byte of
//! each read message on its own. A link is only accepted if it has exactly
//! that shape.

#![allow(non_camel_case_types)]

use crate::bus::{
	Ack,
	Command,
	CommandLink,
	Direction,
	Status,
};

// from <linux/i2c-dev.h> and <linux/i2c.h>
pub const I2C_TIMEOUT: libc::c_ulong = 0x0702; // in units of 10 ms
pub const I2C_RDWR: libc::c_ulong = 0x0707;
pub const I2C_RDWR_IOCTL_MAX_MSGS: usize = 42;
// longer messages are refused by the kernel with EINVAL
pub const I2C_RDWR_MAX_MSG_LEN: usize = 8192;

pub const I2C_M_RD: u16 = 0x0001;
pub const I2C_M_TEN: u16 = 0x0010;

#[repr(C)]
pub struct i2c_msg {
	pub addr: u16,
	pub flags: u16,
	pub len: u16,
	pub buf: *mut u8,
}

#[repr(C)]
pub struct i2c_rdwr_ioctl_data {
	pub msgs: *mut i2c_msg,
	pub nmsgs: u32,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
	pub address: u16,
	pub ten_bit: bool,
	pub direction: Direction,
	// payload for writes, receive buffer for reads
	pub data: Vec<u8>,
}

impl Message {
	pub fn flags(&self) -> u16 {
		let mut flags = 0;
		if self.direction == Direction::Read {
			flags |= I2C_M_RD;
		}
		if self.ten_bit {
			flags |= I2C_M_TEN;
		}
		flags
	}

	pub fn raw(&mut self) -> i2c_msg {
		i2c_msg {
			addr: self.address,
			flags: self.flags(),
			len: self.data.len() as u16,
			buf: self.data.as_mut_ptr(),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
	Idle,
	Header,
	TenBitLow(u8),
	Transfer,
}

// a read message has to end with a NACK, and only there
fn finish_message(messages: &[Message], last_ack: Option<Ack>) -> Result<(), Status> {
	match messages.last() {
		Some(m) if m.direction == Direction::Read => match last_ack {
			Some(Ack::Nack) => Ok(()),
			_ => Err(Status::INVALID_ARG),
		},
		_ => Ok(()),
	}
}

pub fn split_messages(link: &CommandLink) -> Result<Vec<Message>, Status> {
	let mut messages: Vec<Message> = Vec::new();
	let mut state = State::Idle;
	let mut stopped = false;
	let mut ten_bit_address = None;
	let mut last_ack = None;

	for command in link.commands() {
		if stopped {
			return Err(Status::INVALID_ARG);
		}
		match *command {
			Command::Start => {
				match state {
					State::Header | State::TenBitLow(_) => return Err(Status::INVALID_ARG),
					_ => (),
				}
				finish_message(&messages, last_ack)?;
				last_ack = None;
				state = State::Header;
			},
			Command::Stop => {
				if state != State::Transfer {
					return Err(Status::INVALID_ARG);
				}
				finish_message(&messages, last_ack)?;
				stopped = true;
			},
			Command::Write(byte) => match state {
				State::Idle => return Err(Status::INVALID_ARG),
				State::Header => {
					if byte & 0xf8 == 0xf0 {
						if byte & 1 == 0 {
							state = State::TenBitLow(byte);
						} else {
							let address = match ten_bit_address {
								Some(a) if (a >> 7) as u8 & 0x06 == byte & 0x06 => a,
								_ => return Err(Status::INVALID_ARG),
							};
							messages.push(Message {
								address,
								ten_bit: true,
								direction: Direction::Read,
								data: Vec::new(),
							});
							state = State::Transfer;
						}
					} else {
						messages.push(Message {
							address: u16::from(byte >> 1),
							ten_bit: false,
							direction: if byte & 1 == 0 { Direction::Write } else { Direction::Read },
							data: Vec::new(),
						});
						state = State::Transfer;
					}
				},
				State::TenBitLow(first) => {
					let address = (u16::from(first & 0x06) << 7) | u16::from(byte);
					ten_bit_address = Some(address);
					messages.push(Message {
						address,
						ten_bit: true,
						direction: Direction::Write,
						data: Vec::new(),
					});
					state = State::Transfer;
				},
				State::Transfer => match messages.last_mut() {
					Some(m) if m.direction == Direction::Write => m.data.push(byte),
					_ => return Err(Status::INVALID_ARG),
				},
			},
			Command::Read(ack) => {
				if state != State::Transfer || last_ack == Some(Ack::Nack) {
					return Err(Status::INVALID_ARG);
				}
				match messages.last_mut() {
					Some(m) if m.direction == Direction::Read => m.data.push(0),
					_ => return Err(Status::INVALID_ARG),
				}
				last_ack = Some(ack);
			},
		}
	}

	if !stopped || messages.len() > I2C_RDWR_IOCTL_MAX_MSGS {
		return Err(Status::INVALID_ARG);
	}
	for m in &messages {
		if m.data.len() > I2C_RDWR_MAX_MSG_LEN {
			return Err(Status::INVALID_ARG);
		}
		if m.direction == Direction::Read && m.data.is_empty() {
			return Err(Status::INVALID_ARG);
		}
	}

	Ok(messages)
}

#[cfg(test)]
mod test {
	use super::*;

	fn random_read(device: u16, address: &[u8], len: usize) -> CommandLink {
		let mut link = CommandLink::new();
		link.start()
			.header(device, Direction::Write)
			.write(address)
			.start()
			.header(device, Direction::Read)
			.read(len)
			.stop();
		link
	}

	#[test]
	fn single_write_message() {
		let mut link = CommandLink::new();
		link.start().header(0x50, Direction::Write).write(&[0x01, 0x23, 0xaa, 0xbb]).stop();
		let messages = split_messages(&link).unwrap();
		assert_eq!(messages, vec![Message {
			address: 0x50,
			ten_bit: false,
			direction: Direction::Write,
			data: vec![0x01, 0x23, 0xaa, 0xbb],
		}]);
		assert_eq!(messages[0].flags(), 0);
	}

	#[test]
	fn random_read_messages() {
		let messages = split_messages(&random_read(0x50, &[0x00, 0x0a], 3)).unwrap();
		assert_eq!(messages.len(), 2);
		assert_eq!(messages[0].data, vec![0x00, 0x0a]);
		assert_eq!(messages[1].direction, Direction::Read);
		assert_eq!(messages[1].data.len(), 3);
		assert_eq!(messages[1].flags(), I2C_M_RD);
	}

	#[test]
	fn ten_bit_read_messages() {
		let messages = split_messages(&random_read(0x2a5, &[0x10], 1)).unwrap();
		assert_eq!(messages[0].address, 0x2a5);
		assert_eq!(messages[0].flags(), I2C_M_TEN);
		assert_eq!(messages[0].data, vec![0x10]);
		assert_eq!(messages[1].address, 0x2a5);
		assert_eq!(messages[1].flags(), I2C_M_TEN | I2C_M_RD);
	}

	#[test]
	fn rejects_unsupported_links() {
		// no stop
		let mut link = CommandLink::new();
		link.start().header(0x50, Direction::Write).write_byte(0);
		assert_eq!(split_messages(&link), Err(Status::INVALID_ARG));

		// acknowledged last byte
		let mut link = CommandLink::new();
		link.start().header(0x50, Direction::Read).read_byte(Ack::Ack).stop();
		assert_eq!(split_messages(&link), Err(Status::INVALID_ARG));

		// NACK before the end of a message
		let mut link = CommandLink::new();
		link.start().header(0x50, Direction::Read).read_byte(Ack::Nack).read_byte(Ack::Nack).stop();
		assert_eq!(split_messages(&link), Err(Status::INVALID_ARG));

		// 10-bit read without addressing the device first
		let mut link = CommandLink::new();
		link.start().header(0x2a5, Direction::Read).read(1).stop();
		assert_eq!(split_messages(&link), Err(Status::INVALID_ARG));

		// read longer than the kernel accepts in one message
		let mut link = random_read(0x50, &[0x00, 0x00, 0x00], I2C_RDWR_MAX_MSG_LEN + 1);
		assert_eq!(split_messages(&link), Err(Status::INVALID_ARG));
		link = random_read(0x50, &[0x00, 0x00, 0x00], I2C_RDWR_MAX_MSG_LEN);
		assert_eq!(split_messages(&link).unwrap()[1].data.len(), I2C_RDWR_MAX_MSG_LEN);

		// writing data in a read message
		let mut link = CommandLink::new();
		link.start().header(0x50, Direction::Read).write_byte(1).stop();
		assert_eq!(split_messages(&link), Err(Status::INVALID_ARG));
	}
}
