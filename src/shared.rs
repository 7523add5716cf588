//! Access from more than one thread.
//!
//! A lock is held for a whole operation (all pages of a block write, a
//! complete dump, ...), not per transaction. `SharedEeprom` always takes
//! the device lock before the bus lock; both are released on every exit
//! path.

use std::sync::{
	Arc,
	Mutex,
	MutexGuard,
};

use crate::bus::BusEndpoint;
use crate::eeprom::{
	Chunk,
	Eeprom,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> crate::AResult<MutexGuard<'a, T>> {
	match mutex.lock() {
		Ok(guard) => Ok(guard),
		Err(_) => bail!("{} lock poisoned by a panicking thread", what),
	}
}

/// Bus endpoint shared between threads (and devices)
pub struct SharedBus<B> {
	inner: Arc<Mutex<B>>,
}

impl<B> Clone for SharedBus<B> {
	fn clone(&self) -> Self {
		SharedBus {
			inner: self.inner.clone(),
		}
	}
}

impl<B: BusEndpoint> SharedBus<B> {
	pub fn new(bus: B) -> Self {
		SharedBus {
			inner: Arc::new(Mutex::new(bus)),
		}
	}

	/// run `f` with exclusive access to the bus
	///
	/// Must not be entered while already holding the bus lock; `SharedEeprom`
	/// takes the device lock first and calls this afterwards.
	pub(crate) fn with<R, F>(&self, f: F) -> crate::AResult<R>
	where
		F: FnOnce(&mut B) -> crate::AResult<R>,
	{
		let mut guard = lock(&self.inner, "bus")?;
		f(&mut *guard)
	}
}

/// Device handle usable from several threads
pub struct SharedEeprom<B> {
	device: Arc<Mutex<Eeprom>>,
	bus: SharedBus<B>,
}

impl<B> Clone for SharedEeprom<B> {
	fn clone(&self) -> Self {
		SharedEeprom {
			device: self.device.clone(),
			bus: self.bus.clone(),
		}
	}
}

impl<B: BusEndpoint> SharedEeprom<B> {
	pub fn new(device: Eeprom, bus: SharedBus<B>) -> Self {
		SharedEeprom {
			device: Arc::new(Mutex::new(device)),
			bus,
		}
	}

	pub fn bus(&self) -> &SharedBus<B> {
		&self.bus
	}

	/// run `f` holding both the device and the bus lock
	///
	/// `f` must not call back into a `SharedEeprom` sharing the device.
	pub fn with<R, F>(&self, f: F) -> crate::AResult<R>
	where
		F: FnOnce(&mut Eeprom, &mut B) -> crate::AResult<R>,
	{
		let mut device = lock(&self.device, "device")?;
		self.bus.with(|bus| f(&mut *device, bus))
	}

	pub fn write_byte(&self, address: u32, value: u8) -> crate::AResult<()> {
		self.with(|eeprom, bus| eeprom.write_byte(bus, address, value))
	}

	pub fn write_block(&self, address: u32, data: &[u8]) -> crate::AResult<()> {
		self.with(|eeprom, bus| eeprom.write_block(bus, address, data))
	}

	pub fn read_byte(&self, address: u32) -> crate::AResult<u8> {
		self.with(|eeprom, bus| eeprom.read_byte(bus, address))
	}

	/// the read buffer can't leave the lock, so the data gets copied
	pub fn read_block(&self, address: u32, size: usize) -> crate::AResult<Vec<u8>> {
		self.with(|eeprom, bus| Ok(eeprom.read_block(bus, address, size)?.to_vec()))
	}

	/// pass every dumped page to `f` while holding the locks
	pub fn dump_with<F>(&self, mut f: F) -> crate::AResult<()>
	where
		F: FnMut(&Chunk) -> crate::AResult<()>,
	{
		self.with(|eeprom, bus| {
			for chunk in eeprom.dump(bus) {
				f(&chunk?)?;
			}
			Ok(())
		})
	}

	pub fn format(&self, fill: u8) -> crate::AResult<()> {
		self.with(|eeprom, bus| eeprom.format(bus, fill))
	}
}
