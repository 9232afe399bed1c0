/// PIC16(L)F184XX
///
/// PIC16(L)F184XX Memory Programming Specification (DS40001970). Commands
/// are 8 bits MSB first; commands with data carry a 24-bit payload, also
/// MSB first. LOAD PC ADDRESS sets the program counter directly, so seeking
/// never needs to walk.

use crate::memory::assemble_word;
use crate::serial::{
	BitOrder,
	BitSerial,
	Direction,
	Hardware,
	Pin,
};

use super::{
	EXTENDED_ADDRESS_BYTE_OFFSET,
	Flags,
	PicProgrammer,
	SessionState,
};

pub mod commands {
	pub const COMMAND_WIDTH: u32 = 8;

	/// 32-bit key (MSB first) for low voltage programming; "MCHP"
	pub const KEY_SEQUENCE: u32 = 0x4d43_4850;

	pub const LOAD_DATA: u32 = 0x00;
	pub const LOAD_PC_ADDRESS: u32 = 0x80;
	pub const READ_DATA_INCREMENT: u32 = 0xfe;
	pub const INCREMENT_ADDRESS: u32 = 0xf8;
	pub const BEGIN_INTERNAL_PROGRAMMING: u32 = 0xe0;
	pub const BULK_ERASE: u32 = 0x18;
}

use self::commands::*;

const CONFIG_ADDRESS: u64 = 0x8000;
const DEVICE_ID_ADDRESS: u64 = 0x8006;

// TPINT: 2.8ms program memory, 5.6ms configuration memory
const PROGRAM_MS: u64 = 3;
const CONFIG_PROGRAM_MS: u64 = 6;
// TERAB: 8.4ms
const BULK_ERASE_MS: u64 = 9;

pub struct Pic16F184xx<H> {
	hardware: H,
	state: SessionState,
}

impl<H: Hardware> Pic16F184xx<H> {
	pub fn new(hardware: H, flags: Flags) -> Self {
		Pic16F184xx {
			hardware,
			state: SessionState::new(flags),
		}
	}

	pub fn hardware(&self) -> &H {
		&self.hardware
	}

	pub fn hardware_mut(&mut self) -> &mut H {
		&mut self.hardware
	}

	pub fn into_hardware(self) -> H {
		self.hardware
	}

	fn command(&mut self, command: u32) {
		trace!("PIC16F184XX: command 0x{:02x}", command);
		self.hardware.write_mode();
		self.hardware.write_bits(command, COMMAND_WIDTH, BitOrder::MsbFirst);
	}

	fn load_data(&mut self, word: u16) {
		self.command(LOAD_DATA);
		self.hardware.write_bits(0, 9, BitOrder::MsbFirst);
		self.hardware.write_bits(word as u32, 14, BitOrder::MsbFirst);
		self.hardware.write_bit(false);
	}

	fn load_pc_address(&mut self, address: u64) {
		self.command(LOAD_PC_ADDRESS);
		self.hardware.write_bits(0, 7, BitOrder::MsbFirst);
		self.hardware.write_bits(address as u32, 16, BitOrder::MsbFirst);
		self.hardware.write_bit(false);
		self.state.address = Some(address & 0xffff);
	}

	fn read_data_increment(&mut self) -> u16 {
		self.command(READ_DATA_INCREMENT);
		self.hardware.read_mode();
		self.hardware.read_bits(9, BitOrder::MsbFirst);
		let word = self.hardware.read_bits(14, BitOrder::MsbFirst);
		self.hardware.read_bit();
		self.state.advance(1);
		word as u16
	}
}

impl<H: Hardware> PicProgrammer for Pic16F184xx<H> {
	fn state(&self) -> &SessionState {
		&self.state
	}

	fn enter_programming_mode(&mut self) -> bool {
		if self.state.programming {
			return false;
		}

		let low_voltage = self.state.low_voltage;
		self.hardware.set_direction(Pin::Reset, Direction::Output);
		self.hardware.write_pin(Pin::Reset, true);
		if low_voltage {
			self.hardware.write_pin(Pin::Reset, false);
		}
		self.hardware.delay_us(1);

		self.hardware.write_pin(Pin::Power, true);
		self.hardware.delay_ms(1);

		if low_voltage {
			self.hardware.write_mode();
			self.hardware.write_bits(KEY_SEQUENCE, 32, BitOrder::MsbFirst);
			self.hardware.delay_ms(1);
		}

		self.state.programming = true;
		self.state.address = Some(0);
		self.state.extended_address = 0;
		debug!("PIC16F184XX: entered programming mode (low voltage: {})", low_voltage);

		true
	}

	fn leave_programming_mode(&mut self) {
		self.hardware.write_pin(Pin::Clock, false);
		self.hardware.write_pin(Pin::Data, false);
		self.hardware.set_direction(Pin::Reset, Direction::Input);
		self.hardware.delay_ms(1);
		self.hardware.write_pin(Pin::Power, false);

		self.state.reset();
		debug!("PIC16F184XX: left programming mode");
	}

	fn read_program_word(&mut self) -> Option<u16> {
		Some(self.read_data_increment())
	}

	fn program_write_buffer(&mut self, buffer: &[u8]) {
		let len = buffer.len();
		let mut offset = 0;
		while offset < len {
			let word = assemble_word(buffer, offset, len, false);
			offset += 2;

			self.load_data(word);
			self.command(BEGIN_INTERNAL_PROGRAMMING);
			if self.state.address.map_or(false, |a| a >= CONFIG_ADDRESS) {
				self.hardware.delay_ms(CONFIG_PROGRAM_MS);
			} else {
				self.hardware.delay_ms(PROGRAM_MS);
			}

			self.command(INCREMENT_ADDRESS);
			self.state.advance(1);
		}
	}

	fn set_extended_address(&mut self, extended_address: u32) {
		self.state.extended_address = extended_address;
		self.set_address(0);
	}

	fn set_address(&mut self, address: u64) {
		// two bytes per address
		let target = address + (EXTENDED_ADDRESS_BYTE_OFFSET / 2) * self.state.extended_address as u64;
		if self.state.address != Some(target) {
			debug!("PIC16F184XX: address 0x{:04x}", target);
			self.load_pc_address(target);
		}
	}

	fn read_device_id(&mut self) -> Option<u16> {
		self.load_pc_address(DEVICE_ID_ADDRESS);
		// no revision bits in this word
		Some(self.read_data_increment())
	}

	fn erase_device(&mut self) {
		// the region erased depends on the current PC
		self.command(BULK_ERASE);
		self.hardware.delay_ms(BULK_ERASE_MS);
	}

	fn two_bytes_per_address(&self) -> bool {
		true
	}
}
