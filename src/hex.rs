/// Intel HEX images
///
/// Each line is `:LLAAAATT<data>CC` (byte count, 16-bit address, record
/// type, data, checksum). The checksum is the two's complement of the sum
/// of all other bytes.

use std::fmt;
use std::fs;
use std::path::Path;

pub const DATA: u8 = 0x00;
pub const END_OF_FILE: u8 = 0x01;
pub const EXTENDED_LINEAR_ADDRESS: u8 = 0x04;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Record {
	Data {
		address: u16,
		data: Vec<u8>,
	},
	EndOfFile,
	/// upper 16 bits of the 32-bit byte address for following data records
	ExtendedLinearAddress(u16),
	/// everything else (segment addresses, start addresses); ignored by the
	/// drivers
	Other {
		record_type: u8,
		address: u16,
		data: Vec<u8>,
	},
}

impl Record {
	pub fn record_type(&self) -> u8 {
		match self {
			Record::Data { .. } => DATA,
			Record::EndOfFile => END_OF_FILE,
			Record::ExtendedLinearAddress(_) => EXTENDED_LINEAR_ADDRESS,
			Record::Other { record_type, .. } => *record_type,
		}
	}
}

impl fmt::Display for Record {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Record::Data { address, data } => write!(f, "data 0x{:04x} ({} bytes)", address, data.len()),
			Record::EndOfFile => write!(f, "end of file"),
			Record::ExtendedLinearAddress(upper) => write!(f, "extended linear address 0x{:04x}", upper),
			Record::Other { record_type, address, data } => write!(f, "record type 0x{:02x} at 0x{:04x} ({} bytes)", record_type, address, data.len()),
		}
	}
}

/// Two's complement of the byte sum
pub fn checksum(bytes: &[u8]) -> u8 {
	let sum = bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));
	(!sum).wrapping_add(1)
}

fn hex_digit(c: u8) -> Option<u8> {
	match c {
		b'0'..=b'9' => Some(c - b'0'),
		b'a'..=b'f' => Some(c - b'a' + 10),
		b'A'..=b'F' => Some(c - b'A' + 10),
		_ => None,
	}
}

fn parse_record(line: &str) -> crate::AResult<Record> {
	ensure!(line.starts_with(':'), "record doesn't start with ':'");
	let digits = line[1..].as_bytes();
	ensure!(digits.len() % 2 == 0, "odd number of hex digits");

	let mut bytes = Vec::with_capacity(digits.len() / 2);
	for (i, pair) in digits.chunks(2).enumerate() {
		match (hex_digit(pair[0]), hex_digit(pair[1])) {
			(Some(hi), Some(lo)) => bytes.push((hi << 4) | lo),
			_ => bail!("invalid hex digit at column {}", 2 + 2 * i),
		}
	}

	ensure!(bytes.len() >= 5, "record too short");
	let count = bytes[0] as usize;
	ensure!(bytes.len() == 5 + count, "byte count {} doesn't match record length {}", count, bytes.len() - 5);

	let (body, check) = bytes.split_at(bytes.len() - 1);
	let expected = checksum(body);
	ensure!(expected == check[0], "checksum mismatch: expected 0x{:02x}, got 0x{:02x}", expected, check[0]);

	let address = ((body[1] as u16) << 8) | body[2] as u16;
	let record_type = body[3];
	let data = body[4..].to_vec();

	Ok(match record_type {
		DATA => Record::Data { address, data },
		END_OF_FILE => Record::EndOfFile,
		EXTENDED_LINEAR_ADDRESS => {
			ensure!(data.len() == 2, "extended linear address needs 2 bytes, got {}", data.len());
			Record::ExtendedLinearAddress(((data[0] as u16) << 8) | data[1] as u16)
		},
		_ => Record::Other { record_type, address, data },
	})
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct HexFile {
	pub records: Vec<Record>,
}

impl HexFile {
	pub fn parse(text: &str) -> crate::AResult<Self> {
		let mut records = Vec::new();
		for (index, line) in text.lines().enumerate() {
			let line = line.trim();
			if line.is_empty() {
				continue;
			}
			let record = with_context!(("line {}", index + 1),
				parse_record(line)
			)?;
			records.push(record);
		}

		let mut hex = HexFile { records };
		hex.pack();
		Ok(hex)
	}

	pub fn open<P: AsRef<Path>>(path: P) -> crate::AResult<Self> {
		let path = path.as_ref();
		let text = with_context!(("couldn't read {}", path.display()),
			Ok(fs::read_to_string(path)?)
		)?;
		with_context!(("invalid HEX file {}", path.display()),
			Self::parse(&text)
		)
	}

	// merge runs of data records where each starts right behind the previous
	fn pack(&mut self) {
		let mut packed: Vec<Record> = Vec::with_capacity(self.records.len());
		for record in self.records.drain(..) {
			if let Record::Data { address, data } = &record {
				if let Some(Record::Data { address: previous, data: previous_data }) = packed.last_mut() {
					if *previous as usize + previous_data.len() == *address as usize {
						previous_data.extend_from_slice(data);
						continue;
					}
				}
			}
			packed.push(record);
		}
		self.records = packed;
	}

	/// Number of data bytes in the image
	pub fn data_len(&self) -> usize {
		self.records.iter().map(|record| match record {
			Record::Data { data, .. } => data.len(),
			_ => 0,
		}).sum()
	}

	/// Records up to (not including) the end of file record
	pub fn records(&self) -> impl Iterator<Item = &Record> {
		self.records.iter().take_while(|record| **record != Record::EndOfFile)
	}
}
