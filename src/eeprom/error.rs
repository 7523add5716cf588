use std::fmt;

use failure::Fail;

use crate::bus::Status;

use super::monitor::Operation;

/// Classified outcome of a failed transaction
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ErrorKind {
	// malformed command sequence or parameters
	InvalidArgument,
	// endpoint not ready or busy
	InvalidState,
	Timeout,
	// any other status code
	Unclassified(i32),
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			ErrorKind::InvalidArgument => write!(f, "invalid argument"),
			ErrorKind::InvalidState => write!(f, "invalid state"),
			ErrorKind::Timeout => write!(f, "timeout"),
			ErrorKind::Unclassified(code) => write!(f, "unclassified error (status {})", code),
		}
	}
}

pub fn classify(status: Status) -> Result<(), ErrorKind> {
	match status {
		Status::OK => Ok(()),
		Status::INVALID_ARG => Err(ErrorKind::InvalidArgument),
		Status::INVALID_STATE => Err(ErrorKind::InvalidState),
		Status::TIMEOUT => Err(ErrorKind::Timeout),
		Status(code) => Err(ErrorKind::Unclassified(code)),
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
pub struct TransactionError {
	pub kind: ErrorKind,
	pub operation: Operation,
	// memory address of the failed transaction; none for bus setup
	pub address: Option<u32>,
}

impl TransactionError {
	pub fn new(kind: ErrorKind, operation: Operation, address: u32) -> Self {
		TransactionError {
			kind,
			operation,
			address: Some(address),
		}
	}
}

impl fmt::Display for TransactionError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.address {
			Some(address) => write!(f, "{} at 0x{:04x} failed: {}", self.operation, address, self.kind),
			None => write!(f, "{} failed: {}", self.operation, self.kind),
		}
	}
}

/// classified kind of the first transaction failure in the cause chain
pub fn error_kind(e: &failure::Error) -> Option<ErrorKind> {
	e.iter_chain()
		.filter_map(|f| f.downcast_ref::<TransactionError>())
		.map(|t| t.kind)
		.next()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn classify_status() {
		assert_eq!(classify(Status::OK), Ok(()));
		assert_eq!(classify(Status::INVALID_ARG), Err(ErrorKind::InvalidArgument));
		assert_eq!(classify(Status::INVALID_STATE), Err(ErrorKind::InvalidState));
		assert_eq!(classify(Status::TIMEOUT), Err(ErrorKind::Timeout));
		assert_eq!(classify(Status::NOT_ACKNOWLEDGED), Err(ErrorKind::Unclassified(-libc::ENXIO)));
		assert_eq!(classify(Status(-1)), Err(ErrorKind::Unclassified(-1)));
	}

	#[test]
	fn kind_survives_context() {
		let e: failure::Error = TransactionError::new(ErrorKind::Timeout, Operation::WriteBlock, 0x10).into();
		assert_eq!(error_kind(&e), Some(ErrorKind::Timeout));
		assert_eq!(e.to_string(), "page write at 0x0010 failed: timeout");

		let e: failure::Error = e.context("writing image".to_string()).into();
		assert_eq!(error_kind(&e), Some(ErrorKind::Timeout));

		assert_eq!(error_kind(&format_err!("something else")), None);
	}
}
