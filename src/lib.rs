#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod bus;
pub mod config;
pub mod eeprom;
pub mod shared;

pub use self::config::{
	AddressWidth,
	BusConfig,
	EepromConfig,
};

pub use self::eeprom::{
	Eeprom,
	ErrorKind,
	TransactionError,
	error_kind,
};
