/// Host side drivers: sessions, HEX write / verify, memory dumps

use std::ops::{
	Deref,
	DerefMut,
};

use crate::hex::{
	HexFile,
	Record,
};
use crate::memory::assemble_word;
use crate::pic::{
	EXTENDED_ADDRESS_BYTE_OFFSET,
	PicProgrammer,
	WRITE_BUFFER_SIZE,
};

// program words of the two-bytes-per-address families are 14 bits wide
const WORD_MASK: u16 = 0x3fff;

/// Programming mode for the lifetime of the value; leaves programming mode
/// when dropped.
pub struct Session<'a, P: PicProgrammer + ?Sized> {
	programmer: &'a mut P,
}

impl<'a, P: PicProgrammer + ?Sized> Session<'a, P> {
	pub fn enter(programmer: &'a mut P) -> crate::AResult<Self> {
		ensure!(programmer.enter_programming_mode(), "programming mode already active");
		Ok(Session { programmer })
	}
}

impl<'a, P: PicProgrammer + ?Sized> Deref for Session<'a, P> {
	type Target = P;

	fn deref(&self) -> &P {
		&*self.programmer
	}
}

impl<'a, P: PicProgrammer + ?Sized> DerefMut for Session<'a, P> {
	fn deref_mut(&mut self) -> &mut P {
		&mut *self.programmer
	}
}

impl<'a, P: PicProgrammer + ?Sized> Drop for Session<'a, P> {
	fn drop(&mut self) {
		self.programmer.leave_programming_mode();
	}
}

/// Bytes collected for one `program_write_buffer` call
pub struct WriteBuffer {
	data: [u8; WRITE_BUFFER_SIZE],
	len: usize,
}

impl Default for WriteBuffer {
	fn default() -> Self {
		WriteBuffer {
			data: [0u8; WRITE_BUFFER_SIZE],
			len: 0,
		}
	}
}

impl WriteBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// `false` if the buffer is full (the byte is not taken)
	pub fn push(&mut self, byte: u8) -> bool {
		if self.is_full() {
			return false;
		}
		self.data[self.len] = byte;
		self.len += 1;
		true
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		0 == self.len
	}

	pub fn is_full(&self) -> bool {
		WRITE_BUFFER_SIZE == self.len
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.data[..self.len]
	}

	pub fn clear(&mut self) {
		self.len = 0;
	}

	/// Program the buffered bytes at the current address.
	pub fn flush<P: PicProgrammer + ?Sized>(&mut self, programmer: &mut P) {
		if !self.is_empty() {
			programmer.program_write_buffer(self.as_slice());
			self.clear();
		}
	}
}

fn device_address<P: PicProgrammer + ?Sized>(programmer: &P, address: u16) -> u64 {
	if programmer.two_bytes_per_address() {
		(address as u64) >> 1
	} else {
		address as u64
	}
}

/// Write all data records of `hex`; stops at the end of file record.
pub fn write_hex<P: PicProgrammer + ?Sized>(programmer: &mut P, hex: &HexFile) -> crate::AResult<()> {
	ensure!(programmer.is_programming(), "not in programming mode");
	info!("Writing {} bytes", hex.data_len());

	let mut buffer = WriteBuffer::new();
	programmer.begin_writing();
	for record in hex.records() {
		match record {
			Record::ExtendedLinearAddress(upper) => {
				programmer.set_extended_address(*upper as u32);
			},
			Record::Data { address, data } => {
				let address = device_address(programmer, *address);
				programmer.set_address(address);
				for &byte in data {
					if buffer.is_full() {
						buffer.flush(programmer);
					}
					buffer.push(byte);
				}
				buffer.flush(programmer);
			},
			_ => (),
		}
	}
	programmer.end_writing();

	info!("Finished writing");
	Ok(())
}

fn verify_record<P: PicProgrammer + ?Sized>(programmer: &mut P, address: u16, data: &[u8]) -> crate::AResult<()> {
	let start = device_address(programmer, address);
	programmer.set_address(start);

	let two_bytes = programmer.two_bytes_per_address();
	let step = if two_bytes { 2 } else { 1 };
	let len = data.len();
	let mut offset = 0;
	while offset < len {
		let at = programmer.state().address.unwrap_or(start + (offset / step) as u64);
		let read = match programmer.read_program_word() {
			Some(word) => word,
			None => bail!("invalid read at 0x{:04x}", at),
		};

		if two_bytes {
			let expected = assemble_word(data, offset, len, false) & WORD_MASK;
			ensure!(read == expected, "program data 0x{:04x} at 0x{:04x} doesn't match image 0x{:04x}", read, at, expected);
		} else {
			let read = read & 0xff;
			let expected = data[offset] as u16;
			ensure!(read == expected, "program data 0x{:02x} at 0x{:06x} doesn't match image 0x{:02x}", read, at, expected);
		}
		offset += step;
	}
	Ok(())
}

/// Compare device memory with all data records of `hex`.
pub fn verify_hex<P: PicProgrammer + ?Sized>(programmer: &mut P, hex: &HexFile) -> crate::AResult<()> {
	ensure!(programmer.is_programming(), "not in programming mode");
	info!("Verifying {} bytes", hex.data_len());

	programmer.begin_reading();
	let result: crate::AResult<()> = (|| {
		for record in hex.records() {
			match record {
				Record::ExtendedLinearAddress(upper) => {
					programmer.set_extended_address(*upper as u32);
				},
				Record::Data { address, data } => {
					verify_record(programmer, *address, data)?;
				},
				_ => (),
			}
		}
		Ok(())
	})();
	programmer.end_reading();

	if result.is_ok() {
		info!("Finished verifying");
	}
	result
}

/// Read `count` words (bytes on byte-wide families) starting at the device
/// address `address`.
pub fn read_words<P: PicProgrammer + ?Sized>(programmer: &mut P, address: u64, count: usize) -> crate::AResult<Vec<u16>> {
	ensure!(programmer.is_programming(), "not in programming mode");

	let bank_size = if programmer.two_bytes_per_address() {
		EXTENDED_ADDRESS_BYTE_OFFSET / 2
	} else {
		EXTENDED_ADDRESS_BYTE_OFFSET
	};
	let bank = (address / bank_size) as u32;
	if bank != programmer.state().extended_address {
		programmer.set_extended_address(bank);
	}

	programmer.begin_reading();
	programmer.set_address(address % bank_size);
	let mut words = Vec::with_capacity(count);
	let mut result = Ok(());
	for i in 0..count {
		match programmer.read_program_word() {
			Some(word) => words.push(word),
			None => {
				result = Err(format_err!("invalid read at 0x{:04x}", address + i as u64));
				break;
			},
		}
	}
	programmer.end_reading();

	result.map(|()| words)
}
