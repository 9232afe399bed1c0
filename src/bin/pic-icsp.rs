#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate pic_icsp;
use pic_icsp::*;

use std::process::exit;

use pic_icsp::gpio::{
	Gpio,
	PinMap,
};
use pic_icsp::hex::HexFile;
use pic_icsp::pic::{
	Family,
	Flags,
	PicProgrammer,
	Programmer,
};
use pic_icsp::transfer::Session;

fn get_str<'a>(matches: &'a clap::ArgMatches, name: &str) -> AResult<&'a str> {
	match matches.value_of(name) {
		Some(p) => Ok(p),
		None => bail!("missing parameter {}", name),
	}
}

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = get_str(matches, name)?;
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

// decimal or 0x-prefixed hexadecimal
fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<u64> {
	let param = get_str(matches, name)?;
	let parsed = if param.starts_with("0x") || param.starts_with("0X") {
		u64::from_str_radix(&param[2..], 16)
	} else {
		param.parse::<u64>()
	};
	parsed.map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn dump(programmer: &mut Programmer<Gpio>, address: u64, count: usize) -> AResult<()> {
	let words = transfer::read_words(programmer, address, count)?;
	let wide = programmer.two_bytes_per_address();
	for (line, chunk) in words.chunks(8).enumerate() {
		let mut text = format!("0x{:06x}:", address + 8 * line as u64);
		for word in chunk {
			if wide {
				text += &format!(" {:04x}", word);
			} else {
				text += &format!(" {:02x}", word & 0xff);
			}
		}
		println!("{}", text);
	}
	Ok(())
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(global_setting: clap::AppSettings::SubcommandRequiredElseHelp)
		(@arg family: -f --family +takes_value +required "Device family: pic12f1822 (pic16f182x), pic18f1xk22, pic16f88x, pic16f184xx")
		(@arg low_voltage: -l --("low-voltage") "Low voltage programming")
		(@arg pins: --pins +takes_value "BCM GPIO numbers of mclr,clk,dat,pvcc,pgm (default: 2,3,4,5,6)")
		(@subcommand id =>
			(about: "Read the device id (without revision bits)")
		)
		(@subcommand erase =>
			(about: "Bulk erase the device")
		)
		(@subcommand write =>
			(about: "Write a HEX image and verify it")
			(@arg erase: -e --erase "Bulk erase before writing")
			(@arg HEX: +required "Intel HEX file")
		)
		(@subcommand verify =>
			(about: "Compare device memory with a HEX image")
			(@arg HEX: +required "Intel HEX file")
		)
		(@subcommand dump =>
			(about: "Print device memory")
			(@arg address: -a --address +takes_value "Device address (words on 14-bit devices, bytes on PIC18)")
			(@arg count: -n --count +takes_value "Number of words / bytes")
		)
	).get_matches();

	let family: Family = get_param(&matches, "family")?;
	let pins = if matches.is_present("pins") {
		get_param::<PinMap>(&matches, "pins")?
	} else {
		PinMap::default()
	};
	let flags = if matches.is_present("low_voltage") {
		Flags::low_voltage()
	} else {
		Flags::default()
	};

	let hardware = Gpio::open(pins)?;
	let mut programmer = Programmer::new(family, hardware, flags);
	info!("{} on GPIO {} (flags {:?})", family, pins, flags);

	let mut session = Session::enter(&mut programmer)?;
	match matches.subcommand() {
		("id", _) => {
			match session.read_device_id() {
				Some(id) => println!("device id: 0x{:04x}", id),
				None => bail!("invalid device id read"),
			}
		},
		("erase", _) => {
			session.erase_device();
			info!("Device erased");
		},
		("write", Some(sub)) => {
			let hex = HexFile::open(get_str(sub, "HEX")?)?;
			if sub.is_present("erase") {
				session.erase_device();
				info!("Device erased");
			}
			transfer::write_hex(&mut *session, &hex)?;
			transfer::verify_hex(&mut *session, &hex)?;
		},
		("verify", Some(sub)) => {
			let hex = HexFile::open(get_str(sub, "HEX")?)?;
			transfer::verify_hex(&mut *session, &hex)?;
		},
		("dump", Some(sub)) => {
			let address = if sub.is_present("address") { get_number(sub, "address")? } else { 0 };
			let count = if sub.is_present("count") { get_number(sub, "count")? as usize } else { 32 };
			dump(&mut *session, address, count)?;
		},
		(name, _) => bail!("unknown command {:?}", name),
	}

	Ok(())
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
