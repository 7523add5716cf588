//! Diagnostics hook for transactions and whole operations.
//!
//! The monitor only observes; results are always returned to the caller
//! of the operation as well.

use std::fmt;
use std::time::Duration;

use crate::bus::Status;

use super::error::{
	ErrorKind,
	classify,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Operation {
	WriteByte,
	WriteBlock,
	ReadByte,
	ReadBlock,
	Dump,
	Format,
	ConfigureBus,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let name = match *self {
			Operation::WriteByte => "byte write",
			Operation::WriteBlock => "page write",
			Operation::ReadByte => "random read",
			Operation::ReadBlock => "sequential read",
			Operation::Dump => "dump",
			Operation::Format => "format",
			Operation::ConfigureBus => "bus configuration",
		};
		f.write_str(name)
	}
}

/// Summary of a completed (or aborted) operation
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Report {
	pub operation: Operation,
	pub address: u32,
	// bytes transferred successfully
	pub bytes: usize,
	pub elapsed: Duration,
	pub result: Result<(), ErrorKind>,
}

impl Report {
	/// bytes per second; `None` if nothing was measured
	pub fn speed(&self) -> Option<f64> {
		let secs = self.elapsed.as_secs() as f64 + f64::from(self.elapsed.subsec_nanos()) / 1e9;
		if secs > 0.0 {
			Some(self.bytes as f64 / secs)
		} else {
			None
		}
	}
}

pub trait Monitor {
	/// called with the raw status of every submitted transaction
	fn transaction(&mut self, operation: Operation, address: u32, status: Status) {
		let _ = (operation, address, status);
	}

	fn completed(&mut self, report: &Report) {
		let _ = report;
	}
}

/// Logs classified transaction results and operation timing
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
	fn transaction(&mut self, operation: Operation, address: u32, status: Status) {
		match classify(status) {
			Ok(()) => debug!("{} at 0x{:04x}: operation successful", operation, address),
			Err(ErrorKind::InvalidArgument) => error!("{} at 0x{:04x}: invalid argument!", operation, address),
			Err(ErrorKind::InvalidState) => error!("{} at 0x{:04x}: invalid state!", operation, address),
			Err(ErrorKind::Timeout) => error!("{} at 0x{:04x}: timeout!", operation, address),
			Err(ErrorKind::Unclassified(code)) => error!("{} at 0x{:04x}: failed with status {}", operation, address, code),
		}
	}

	fn completed(&mut self, report: &Report) {
		let secs = report.elapsed.as_secs() as f64 + f64::from(report.elapsed.subsec_nanos()) / 1e9;
		match report.speed() {
			Some(speed) => debug!("{}: {} byte(s) at 0x{:04x} in {:.6} seconds, giving a speed of {:.1} Bps",
				report.operation, report.bytes, report.address, secs, speed),
			None => debug!("{}: {} byte(s) at 0x{:04x}", report.operation, report.bytes, report.address),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
}
