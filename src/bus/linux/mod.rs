use std::collections::hash_map::{
	Entry,
	HashMap,
};
use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

mod rdwr;

use self::rdwr::{
	I2C_RDWR,
	I2C_TIMEOUT,
	Message,
	i2c_msg,
	i2c_rdwr_ioctl_data,
};

use crate::bus::{
	BusEndpoint,
	CommandLink,
	Direction,
	Port,
	Status,
};
use crate::config::BusConfig;

fn errno_status(e: &io::Error) -> Status {
	match e.raw_os_error() {
		// lost arbitration: bus in use by another master
		Some(libc::EAGAIN) => Status::INVALID_STATE,
		Some(errno) => Status::from_errno(errno),
		None => Status::from_errno(libc::EIO),
	}
}

struct Adapter {
	file: fs::File,
	timeout: Option<Duration>,
}

impl Adapter {
	fn open(port: Port) -> io::Result<Self> {
		let file = fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(format!("/dev/{}", port))?;
		Ok(Adapter {
			file,
			timeout: None,
		})
	}

	fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
		if self.timeout == Some(timeout) {
			return Ok(());
		}
		// kernel counts in jiffies of 10 ms
		let ticks = std::cmp::max(1, (timeout.as_millis() + 9) / 10) as libc::c_ulong;
		let res = unsafe { libc::ioctl(self.file.as_raw_fd(), I2C_TIMEOUT as _, ticks) };
		if res < 0 {
			return Err(io::Error::last_os_error());
		}
		self.timeout = Some(timeout);
		Ok(())
	}

	fn transfer(&mut self, messages: &mut [Message]) -> io::Result<()> {
		let mut raw: Vec<i2c_msg> = messages.iter_mut().map(Message::raw).collect();
		let mut data = i2c_rdwr_ioctl_data {
			msgs: raw.as_mut_ptr(),
			nmsgs: raw.len() as u32,
		};
		let res = unsafe {
			libc::ioctl(self.file.as_raw_fd(), I2C_RDWR as _, &mut data as *mut i2c_rdwr_ioctl_data)
		};
		if res < 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}
}

/// Bus endpoint on top of the linux i2c-dev interface (`/dev/i2c-N`).
///
/// Adapters are opened on first use and kept open.
pub struct I2cDev {
	adapters: HashMap<Port, Adapter>,
}

impl I2cDev {
	pub fn new() -> Self {
		I2cDev {
			adapters: HashMap::new(),
		}
	}

	/// open adapter ahead of time to get a useful error message
	pub fn open_adapter(&mut self, port: Port) -> crate::AResult<()> {
		with_context!(("couldn't open I2C adapter /dev/{}", port), {
			self.adapter(port)?;
			Ok(())
		})
	}

	fn adapter(&mut self, port: Port) -> io::Result<&mut Adapter> {
		match self.adapters.entry(port) {
			Entry::Occupied(e) => Ok(e.into_mut()),
			Entry::Vacant(e) => Ok(e.insert(Adapter::open(port)?)),
		}
	}
}

impl Default for I2cDev {
	fn default() -> Self {
		I2cDev::new()
	}
}

impl BusEndpoint for I2cDev {
	fn submit(&mut self, port: Port, link: &CommandLink, rx: &mut [u8], timeout: Duration) -> Status {
		let mut messages = match rdwr::split_messages(link) {
			Ok(m) => m,
			Err(status) => {
				debug!("{}: command link can't be mapped to I2C_RDWR messages", port);
				return status;
			},
		};
		let read_len: usize = messages.iter()
			.filter(|m| m.direction == Direction::Read)
			.map(|m| m.data.len())
			.sum();
		if read_len != rx.len() {
			return Status::INVALID_ARG;
		}

		let adapter = match self.adapter(port) {
			Ok(a) => a,
			Err(e) => {
				error!("{}: couldn't open adapter: {}", port, e);
				return errno_status(&e);
			},
		};
		if let Err(e) = adapter.set_timeout(timeout) {
			warn!("{}: couldn't set timeout: {}", port, e);
			return errno_status(&e);
		}
		if let Err(e) = adapter.transfer(&mut messages) {
			trace!("{}: transfer failed: {}", port, e);
			return errno_status(&e);
		}

		let mut pos = 0;
		for m in messages.iter().filter(|m| m.direction == Direction::Read) {
			rx[pos..pos + m.data.len()].copy_from_slice(&m.data);
			pos += m.data.len();
		}

		Status::OK
	}

	fn configure(&mut self, port: Port, config: &BusConfig) -> Status {
		// pins, clock and pull-ups come from the kernel (device tree / ACPI)
		warn!("{}: bus parameters are managed by the kernel, ignoring {:?}", port, config);
		match self.adapter(port) {
			Ok(_) => Status::OK,
			Err(e) => {
				error!("{}: couldn't open adapter: {}", port, e);
				errno_status(&e)
			},
		}
	}
}
