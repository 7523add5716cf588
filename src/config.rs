use std::convert::TryFrom;
use std::fmt;
use std::str;
use std::time::Duration;

use crate::bus::Port;

/// Number of memory address bytes sent after the device header, most
/// significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressWidth {
	One,
	Two,
	Three,
}

impl AddressWidth {
	pub fn bytes(self) -> usize {
		match self {
			AddressWidth::One => 1,
			AddressWidth::Two => 2,
			AddressWidth::Three => 3,
		}
	}

	/// first memory address that can't be expressed anymore
	pub fn limit(self) -> u64 {
		1u64 << (8 * self.bytes())
	}
}

impl Default for AddressWidth {
	fn default() -> Self {
		AddressWidth::Two
	}
}

impl fmt::Display for AddressWidth {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.bytes())
	}
}

impl str::FromStr for AddressWidth {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"1" => Ok(AddressWidth::One),
			"2" => Ok(AddressWidth::Two),
			"3" => Ok(AddressWidth::Three),
			_ => bail!("invalid address width {:?} (expected 1, 2 or 3 bytes)", s),
		}
	}
}

/// Pin and clock setup, only used when the device is asked to initialize
/// the bus itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusConfig {
	pub scl: u8,
	pub sda: u8,
	pub frequency: u32,
	pub pull_up: bool,
}

impl Default for BusConfig {
	fn default() -> Self {
		BusConfig {
			scl: 22,
			sda: 21,
			frequency: 400_000,
			pull_up: true,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EepromConfig {
	/// device address on the bus (7-bit, or 10-bit up to 0x3ff)
	pub address: u16,
	/// first usable memory address
	pub base_address: u32,
	/// end of the usable memory (exclusive)
	pub top_address: u32,
	/// largest run of bytes a single write transaction may carry; writes
	/// never cross a multiple of this
	pub page_size: u16,
	pub address_width: AddressWidth,
	pub port: Port,
	/// bound for a single transaction on the bus
	pub timeout: Duration,
	/// internal write cycle time after each write transaction
	pub settle_delay: Duration,
	pub bus: Option<BusConfig>,
}

impl Default for EepromConfig {
	fn default() -> Self {
		EepromConfig {
			address: 0x50,
			base_address: 0x0,
			top_address: 0x1000,
			page_size: 256,
			address_width: AddressWidth::Two,
			port: Port(0),
			timeout: Duration::from_millis(1000),
			settle_delay: Duration::from_millis(10),
			bus: None,
		}
	}
}

impl EepromConfig {
	pub fn new(address: u16, base_address: u32, top_address: u32, page_size: u16) -> Self {
		EepromConfig {
			address,
			base_address,
			top_address,
			page_size,
			..Default::default()
		}
	}

	pub fn capacity(&self) -> u32 {
		self.top_address - self.base_address
	}

	pub fn validate(&self) -> crate::AResult<()> {
		ensure!(self.address <= 0x3ff, "device address 0x{:x} doesn't fit into 10 bits", self.address);
		// header byte of these would read as a 10-bit address prefix
		ensure!(self.address < 0x78 || self.address > 0x7f,
			"device address 0x{:x} is reserved (0x78..=0x7f)", self.address
		);
		ensure!(self.page_size > 0, "page size must not be zero");
		ensure!(self.base_address < self.top_address,
			"empty address range: base 0x{:x}, top 0x{:x}", self.base_address, self.top_address
		);
		ensure!(u64::from(self.top_address) <= self.address_width.limit(),
			"top address 0x{:x} not reachable with {} address byte(s)", self.top_address, self.address_width
		);
		ensure!(self.timeout > Duration::from_millis(0), "transaction timeout must not be zero");
		Ok(())
	}

	/// make sure `[address, address + len)` lies within the device
	pub fn check_range(&self, address: u32, len: usize) -> crate::AResult<()> {
		ensure!(address >= self.base_address && address < self.top_address,
			"address 0x{:x} outside of device range 0x{:x}..0x{:x}", address, self.base_address, self.top_address
		);
		let end = u64::from(address) + len as u64;
		ensure!(end <= u64::from(self.top_address),
			"{} bytes at 0x{:x} exceed device top address 0x{:x}", len, address, self.top_address
		);
		Ok(())
	}
}

/// parse an unsigned number; accepts `0x`, `0o` and `0b` prefixes
pub fn parse_number(s: &str) -> crate::AResult<u64> {
	let s = s.trim();
	let (digits, radix) = if s.starts_with("0x") || s.starts_with("0X") {
		(&s[2..], 16)
	} else if s.starts_with("0o") {
		(&s[2..], 8)
	} else if s.starts_with("0b") {
		(&s[2..], 2)
	} else {
		(s, 10)
	};
	ensure!(!digits.is_empty(), "missing digits in number {:?}", s);
	with_context!(("invalid number {:?}", s),
		Ok(u64::from_str_radix(&digits.replace('_', ""), radix)?)
	)
}

pub fn parse_number_as<T>(s: &str) -> crate::AResult<T>
where
	T: TryFrom<u64>,
{
	let n = parse_number(s)?;
	match T::try_from(n) {
		Ok(v) => Ok(v),
		Err(_) => bail!("number {} out of range", s),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn check_number(repr: &str, value: u64) {
		match parse_number(repr) {
			Err(e) => panic!("{} failed to parse as number: {}", repr, e),
			Ok(n) => assert_eq!(n, value, "failed validating parsed {}", repr),
		}
	}

	fn check_invalid_number(repr: &str) {
		assert!(parse_number(repr).is_err(), "{:?} must not be a valid number", repr);
	}

	#[test]
	fn parse_numbers() {
		check_number("0", 0);
		check_number("80", 80);
		check_number("0x50", 0x50);
		check_number("0X1000", 0x1000);
		check_number("0o17", 0o17);
		check_number("0b1010", 0b1010);
		check_number("0x1_0000", 0x1_0000);
		check_number(" 42 ", 42);
		check_invalid_number("");
		check_invalid_number("0x");
		check_invalid_number("0xg");
		check_invalid_number("-1");
		check_invalid_number("abc");
	}

	#[test]
	fn parse_number_ranges() {
		assert_eq!(parse_number_as::<u8>("0xff").unwrap(), 0xff);
		assert!(parse_number_as::<u8>("0x100").is_err());
		assert_eq!(parse_number_as::<u16>("0x3ff").unwrap(), 0x3ff);
	}

	#[test]
	fn parse_address_width() {
		assert_eq!("1".parse::<AddressWidth>().unwrap(), AddressWidth::One);
		assert_eq!("2".parse::<AddressWidth>().unwrap(), AddressWidth::Two);
		assert_eq!("3".parse::<AddressWidth>().unwrap(), AddressWidth::Three);
		assert!("4".parse::<AddressWidth>().is_err());
		assert_eq!(AddressWidth::Two.limit(), 0x1_0000);
	}

	#[test]
	fn validate_config() {
		assert!(EepromConfig::default().validate().is_ok());
		assert!(EepromConfig::new(0x50, 0x0, 0x100, 16).validate().is_ok());
		assert!(EepromConfig::new(0x50, 0x0, 0x100, 0).validate().is_err());
		assert!(EepromConfig::new(0x50, 0x100, 0x100, 16).validate().is_err());
		assert!(EepromConfig::new(0x400, 0x0, 0x100, 16).validate().is_err());
		assert!(EepromConfig::new(0x77, 0x0, 0x100, 16).validate().is_ok());
		assert!(EepromConfig::new(0x78, 0x0, 0x100, 16).validate().is_err());
		assert!(EepromConfig::new(0x7a, 0x0, 0x100, 16).validate().is_err());
		assert!(EepromConfig::new(0x7f, 0x0, 0x100, 16).validate().is_err());
		assert!(EepromConfig::new(0x80, 0x0, 0x100, 16).validate().is_ok());
		assert!(EepromConfig::new(0x50, 0x0, 0x2_0000, 16).validate().is_err());

		let mut wide = EepromConfig::new(0x50, 0x0, 0x4_0000, 256);
		wide.address_width = AddressWidth::Three;
		assert!(wide.validate().is_ok());
	}

	#[test]
	fn range_checks() {
		let config = EepromConfig::new(0x50, 0x10, 0x100, 16);
		assert_eq!(config.capacity(), 0xf0);
		assert!(config.check_range(0x10, 0xf0).is_ok());
		assert!(config.check_range(0xff, 1).is_ok());
		assert!(config.check_range(0xff, 0).is_ok());
		assert!(config.check_range(0x0f, 1).is_err());
		assert!(config.check_range(0x100, 0).is_err());
		assert!(config.check_range(0xf0, 0x11).is_err());
	}
}
