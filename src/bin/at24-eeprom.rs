#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate at24_eeprom;
use at24_eeprom::*;

use std::convert::TryFrom;
use std::io::{
	self,
	Read,
	Write,
};
use std::process::exit;
use std::time::Duration;

use at24_eeprom::bus::{
	I2cDev,
	Port,
};
use at24_eeprom::config::parse_number_as;

fn get_number<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: TryFrom<u64>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	parse_number_as(param).map_err(|e| {
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_optional_number<T>(matches: &clap::ArgMatches, name: &str) -> AResult<Option<T>>
where
	T: TryFrom<u64>,
{
	if matches.is_present(name) {
		get_number(matches, name).map(Some)
	} else {
		Ok(None)
	}
}

fn config_from_args(matches: &clap::ArgMatches) -> AResult<EepromConfig> {
	let mut config = EepromConfig::default();
	if let Some(bus) = get_optional_number(matches, "bus")? {
		config.port = Port(bus);
	}
	if let Some(address) = get_optional_number(matches, "address")? {
		config.address = address;
	}
	if let Some(base) = get_optional_number(matches, "base")? {
		config.base_address = base;
	}
	if let Some(top) = get_optional_number(matches, "top")? {
		config.top_address = top;
	}
	if let Some(page_size) = get_optional_number(matches, "page_size")? {
		config.page_size = page_size;
	}
	if let Some(width) = matches.value_of("address_width") {
		config.address_width = width.parse()?;
	}
	if let Some(timeout) = get_optional_number(matches, "timeout")? {
		config.timeout = Duration::from_millis(timeout);
	}
	if let Some(settle) = get_optional_number(matches, "settle")? {
		config.settle_delay = Duration::from_millis(settle);
	}
	Ok(config)
}

fn hexdump(out: &mut dyn Write, address: u32, data: &[u8]) -> io::Result<()> {
	for (i, line) in data.chunks(16).enumerate() {
		write!(out, "{:08x} ", address as usize + 16 * i)?;
		for (j, b) in line.iter().enumerate() {
			if 8 == j {
				write!(out, " ")?;
			}
			write!(out, " {:02x}", b)?;
		}
		writeln!(out)?;
	}
	Ok(())
}

fn read_byte(eeprom: &mut Eeprom, bus: &mut I2cDev, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: u32 = get_number(sub_m, "ADDR")?;
	let value = eeprom.read_byte(bus, address)?;
	println!("@{:04x}: {:02x}", address, value);
	Ok(())
}

fn write_byte(eeprom: &mut Eeprom, bus: &mut I2cDev, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: u32 = get_number(sub_m, "ADDR")?;
	let value: u8 = get_number(sub_m, "VALUE")?;
	eeprom.write_byte(bus, address, value)?;
	eeprom.verify(bus, address, &[value])?;
	info!("Wrote 0x{:02x} to 0x{:04x}", value, address);
	Ok(())
}

fn read_block(eeprom: &mut Eeprom, bus: &mut I2cDev, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: u32 = get_number(sub_m, "ADDR")?;
	let len: usize = get_number(sub_m, "LEN")?;
	let data = eeprom.read_block(bus, address, len)?;
	let stdout = io::stdout();
	hexdump(&mut stdout.lock(), address, data)?;
	Ok(())
}

fn write_block(eeprom: &mut Eeprom, bus: &mut I2cDev, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: u32 = get_number(sub_m, "ADDR")?;
	let data = match sub_m.value_of("string") {
		Some(s) => s.as_bytes().to_vec(),
		None => {
			let mut data = Vec::new();
			io::stdin().read_to_end(&mut data)?;
			data
		},
	};
	eeprom.write_block(bus, address, &data)?;
	eeprom.verify(bus, address, &data)?;
	info!("Wrote and verified {} bytes at 0x{:04x}", data.len(), address);
	Ok(())
}

fn dump(eeprom: &mut Eeprom, bus: &mut I2cDev, sub_m: &clap::ArgMatches) -> AResult<()> {
	let stdout = io::stdout();
	let mut out = stdout.lock();
	if sub_m.is_present("raw") {
		eeprom.dump_to(bus, &mut out)?;
		return Ok(());
	}
	for chunk in eeprom.dump(bus) {
		let chunk = chunk?;
		hexdump(&mut out, chunk.address, &chunk.data)?;
	}
	Ok(())
}

fn format(eeprom: &mut Eeprom, bus: &mut I2cDev, sub_m: &clap::ArgMatches) -> AResult<()> {
	let fill: u8 = get_optional_number(sub_m, "FILL")?.unwrap_or(0x00);
	eeprom.format(bus, fill)?;
	info!("Formatted 0x{:04x}..0x{:04x} with 0x{:02x}",
		eeprom.config().base_address, eeprom.config().top_address, fill);
	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg bus: -b --bus +takes_value +global "I2C adapter number (/dev/i2c-N, default 0)")
		(@arg address: -a --address +takes_value +global "device address (default 0x50)")
		(@arg base: --base +takes_value +global "first usable memory address (default 0)")
		(@arg top: --top +takes_value +global "end of usable memory, exclusive (default 0x1000)")
		(@arg page_size: -p --("page-size") +takes_value +global "write page size in bytes (default 256)")
		(@arg address_width: -w --("address-width") +takes_value +global "memory address bytes: 1, 2 or 3 (default 2)")
		(@arg timeout: -t --timeout +takes_value +global "transaction timeout in ms (default 1000)")
		(@arg settle: --settle +takes_value +global "delay after each write in ms (default 10)")
		(@subcommand read_byte =>
			(name: "read-byte")
			(about: "read a single byte")
			(@arg ADDR: +required "memory address")
		)
		(@subcommand write_byte =>
			(name: "write-byte")
			(about: "write a single byte")
			(@arg ADDR: +required "memory address")
			(@arg VALUE: +required "byte value")
		)
		(@subcommand read =>
			(about: "read a block and show it as hex listing")
			(@arg ADDR: +required "memory address")
			(@arg LEN: +required "number of bytes")
		)
		(@subcommand write =>
			(about: "write a block (from stdin unless --string is given) and verify it")
			(@arg string: -s --string +takes_value "data to write")
			(@arg ADDR: +required "memory address")
		)
		(@subcommand dump =>
			(about: "read the whole device")
			(@arg raw: -r --raw "write binary data to stdout instead of a hex listing")
		)
		(@subcommand format =>
			(about: "fill the whole device")
			(@arg FILL: "fill byte (default 0x00)")
		)
	).get_matches();

	let config = config_from_args(&matches)?;
	let mut bus = I2cDev::new();
	bus.open_adapter(config.port)?;
	let mut eeprom = Eeprom::open(&mut bus, config)?;

	match matches.subcommand() {
		("read-byte", Some(sub_m)) => read_byte(&mut eeprom, &mut bus, sub_m),
		("write-byte", Some(sub_m)) => write_byte(&mut eeprom, &mut bus, sub_m),
		("read", Some(sub_m)) => read_block(&mut eeprom, &mut bus, sub_m),
		("write", Some(sub_m)) => write_block(&mut eeprom, &mut bus, sub_m),
		("dump", Some(sub_m)) => dump(&mut eeprom, &mut bus, sub_m),
		("format", Some(sub_m)) => format(&mut eeprom, &mut bus, sub_m),
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		if let Some(kind) = error_kind(&e) {
			debug!("Error kind: {}", kind);
		}
		exit(1);
	}
}
