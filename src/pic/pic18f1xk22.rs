/// PIC18F1XK22 / PIC18LF1XK22
///
/// PIC18F1XK22/LF1XK22 Flash Memory Programming Specification (DS41357B).
///
/// The host feeds instructions to the core: a 4-bit instruction code (LSB
/// first) followed by a 16-bit operand (LSB first). Table reads send 8
/// zero bits instead and then shift out TABLAT (8 bits, LSB first).
/// Memory is byte addressed through TBLPTR, which is set with core
/// instructions.

use crate::memory::{
	assemble_word,
	byte_at,
};
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
	pub const INSTRUCTION_WIDTH: u32 = 4;
	pub const OPERAND_WIDTH: u32 = 16;

	pub const CORE_INSTRUCTION: u32 = 0x0;
	pub const SHIFT_OUT_TABLAT: u32 = 0x2;
	pub const TABLE_READ: u32 = 0x8;
	pub const TABLE_READ_POST_INCREMENT: u32 = 0x9;
	pub const TABLE_READ_POST_DECREMENT: u32 = 0xa;
	pub const TABLE_READ_PRE_INCREMENT: u32 = 0xb;
	pub const TABLE_WRITE: u32 = 0xc;
	pub const TABLE_WRITE_POST_INCREMENT_2: u32 = 0xd;
	pub const TABLE_WRITE_START_PROGRAMMING_POST_INCREMENT_2: u32 = 0xe;
	pub const TABLE_WRITE_START_PROGRAMMING: u32 = 0xf;
}

use self::commands::*;

mod opcodes {
	pub const NOP: u32 = 0x0000;
	pub const MOVLW: u32 = 0x0e00;
	pub const MOVWF_TBLPTRU: u32 = 0x6ef8;
	pub const MOVWF_TBLPTRH: u32 = 0x6ef7;
	pub const MOVWF_TBLPTRL: u32 = 0x6ef6;
	pub const BSF_EECON1_EEPGD: u32 = 0x8ea6;
	pub const BCF_EECON1_EEPGD: u32 = 0x9ea6;
	pub const BSF_EECON1_CFGS: u32 = 0x8ca6;
	pub const BCF_EECON1_CFGS: u32 = 0x9ca6;
	pub const BSF_EECON1_WREN: u32 = 0x84a6;
	pub const BCF_EECON1_WREN: u32 = 0x94a6;
}

const CONFIG_ADDRESS: u64 = 0x20_0000;
const DEVICE_ID_ADDRESS: u64 = 0x3f_fffe;

// bulk erase control registers
const BULK_ERASE_HIGH: u64 = 0x3c_0005;
const BULK_ERASE_LOW: u64 = 0x3c_0004;

// P9 / P9A: programming time in flash / configuration memory
const PROGRAM_MS: u64 = 1;
const CONFIG_PROGRAM_MS: u64 = 5;
// P10: high voltage discharge
const DISCHARGE_US: u64 = 100;
// P11: bulk erase
const BULK_ERASE_MS: u64 = 5;

pub struct Pic18F1xK22<H> {
	hardware: H,
	state: SessionState,
	writing: bool,
}

impl<H: Hardware> Pic18F1xK22<H> {
	pub fn new(hardware: H, flags: Flags) -> Self {
		Pic18F1xK22 {
			hardware,
			state: SessionState::new(flags),
			writing: false,
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

	fn instruction(&mut self, instruction: u32, operand: u32) {
		trace!("PIC18F1XK22: instruction 0x{:x} operand 0x{:04x}", instruction, operand);
		self.hardware.write_mode();
		self.hardware.write_bits(instruction, INSTRUCTION_WIDTH, BitOrder::LsbFirst);
		self.hardware.write_bits(operand, OPERAND_WIDTH, BitOrder::LsbFirst);
	}

	fn read_instruction(&mut self, instruction: u32) -> u8 {
		trace!("PIC18F1XK22: instruction 0x{:x}", instruction);
		self.hardware.write_mode();
		self.hardware.write_bits(instruction, INSTRUCTION_WIDTH, BitOrder::LsbFirst);
		self.hardware.write_bits(0, 8, BitOrder::LsbFirst);
		self.hardware.read_mode();
		self.hardware.read_bits(8, BitOrder::LsbFirst) as u8
	}

	fn core_instruction(&mut self, operand: u32) {
		self.instruction(CORE_INSTRUCTION, operand);
	}

	// NOP whose 4th clock is held high for `hold_ms` (programming / erase)
	fn timed_nop(&mut self, hold_ms: u64) {
		self.hardware.write_mode();
		self.hardware.write_bits(0, 3, BitOrder::LsbFirst);
		self.hardware.write_pin(Pin::Data, false);
		self.hardware.write_pin(Pin::Clock, true);
		self.hardware.delay_ms(hold_ms);
		self.hardware.write_pin(Pin::Clock, false);
		self.hardware.delay_us(DISCHARGE_US);
		self.hardware.write_bits(0, OPERAND_WIDTH, BitOrder::LsbFirst);
	}

	fn set_table_pointer(&mut self, address: u64) {
		let upper = ((address >> 16) & 0xff) as u32;
		let high = ((address >> 8) & 0xff) as u32;
		let low = (address & 0xff) as u32;

		self.core_instruction(opcodes::MOVLW | upper);
		self.core_instruction(opcodes::MOVWF_TBLPTRU);
		self.core_instruction(opcodes::MOVLW | high);
		self.core_instruction(opcodes::MOVWF_TBLPTRH);
		self.core_instruction(opcodes::MOVLW | low);
		self.core_instruction(opcodes::MOVWF_TBLPTRL);

		self.state.address = Some(address);
	}

	// TBLPTR after enter is whatever the chip holds; writes start at 0 then
	fn table_pointer(&mut self) -> u64 {
		match self.state.address {
			Some(address) => address,
			None => {
				self.set_table_pointer(0);
				0
			},
		}
	}

	// EEPGD always, CFGS only for configuration memory
	fn select_write_access(&mut self, address: u64) {
		self.core_instruction(opcodes::BSF_EECON1_EEPGD);
		if address >= CONFIG_ADDRESS {
			self.core_instruction(opcodes::BSF_EECON1_CFGS);
		} else {
			self.core_instruction(opcodes::BCF_EECON1_CFGS);
		}
	}

	pub fn is_writing(&self) -> bool {
		self.writing
	}
}

impl<H: Hardware> PicProgrammer for Pic18F1xK22<H> {
	fn state(&self) -> &SessionState {
		&self.state
	}

	fn enter_programming_mode(&mut self) -> bool {
		if self.state.programming {
			return false;
		}

		let low_voltage = self.state.low_voltage;
		if low_voltage {
			self.hardware.set_direction(Pin::Pgm, Direction::Output);
			self.hardware.write_pin(Pin::Pgm, true);
			self.hardware.delay_us(2);
		}

		self.hardware.set_direction(Pin::Reset, Direction::Output);
		if low_voltage {
			// entered on the rising edge
			self.hardware.write_pin(Pin::Reset, false);
			self.hardware.write_pin(Pin::Reset, true);
		} else {
			self.hardware.write_pin(Pin::Reset, true);
		}
		self.hardware.delay_us(1);

		self.hardware.write_pin(Pin::Power, true);
		self.hardware.delay_ms(1);

		// TBLPTR is unknown until the first seek
		self.state.programming = true;
		self.state.extended_address = 0;
		debug!("PIC18F1XK22: entered programming mode (low voltage: {})", low_voltage);

		true
	}

	fn leave_programming_mode(&mut self) {
		self.hardware.write_pin(Pin::Clock, false);
		self.hardware.write_pin(Pin::Data, false);
		self.hardware.set_direction(Pin::Reset, Direction::Input);
		if self.state.low_voltage {
			self.hardware.write_pin(Pin::Pgm, false);
		}
		self.hardware.delay_ms(1);
		self.hardware.write_pin(Pin::Power, false);

		self.writing = false;
		self.state.reset();
		debug!("PIC18F1XK22: left programming mode");
	}

	fn read_program_word(&mut self) -> Option<u16> {
		self.state.advance(1);
		Some(self.read_instruction(TABLE_READ_POST_INCREMENT) as u16)
	}

	fn begin_writing(&mut self) {
		if self.writing {
			return;
		}
		self.writing = true;

		let address = self.table_pointer();
		self.select_write_access(address);
		self.core_instruction(opcodes::BSF_EECON1_WREN);
	}

	fn program_write_buffer(&mut self, buffer: &[u8]) {
		let len = buffer.len();
		let mut offset = 0;
		while offset < len {
			let address = self.table_pointer();
			let config_space = address >= CONFIG_ADDRESS;
			if config_space {
				// one byte at a time, duplicated into both operand bytes
				let byte = byte_at(buffer, offset, len) as u32;
				self.instruction(TABLE_WRITE_START_PROGRAMMING, (byte << 8) | byte);
				offset += 1;
				self.timed_nop(CONFIG_PROGRAM_MS);
				self.set_table_pointer(address + 1);
			} else {
				let word = assemble_word(buffer, offset, len, false);
				self.instruction(TABLE_WRITE_START_PROGRAMMING, word as u32);
				offset += 2;
				self.timed_nop(PROGRAM_MS);
				self.set_table_pointer(address + 2);
			}
		}
	}

	fn end_writing(&mut self) {
		self.core_instruction(opcodes::BCF_EECON1_EEPGD);
		self.core_instruction(opcodes::BCF_EECON1_CFGS);
		self.core_instruction(opcodes::BCF_EECON1_WREN);
		self.writing = false;
	}

	fn set_extended_address(&mut self, extended_address: u32) {
		self.state.extended_address = extended_address;
		self.set_address(0);
	}

	fn set_address(&mut self, address: u64) {
		// byte addressed
		let target = address + EXTENDED_ADDRESS_BYTE_OFFSET * self.state.extended_address as u64;
		if self.state.address != Some(target) {
			debug!("PIC18F1XK22: address 0x{:06x}", target);
			if self.writing {
				// crossing into (or out of) configuration memory changes CFGS
				self.select_write_access(target);
			}
			self.set_table_pointer(target);
		}
	}

	fn read_device_id(&mut self) -> Option<u16> {
		self.set_table_pointer(DEVICE_ID_ADDRESS);
		let low = self.read_instruction(TABLE_READ_POST_INCREMENT) as u16;
		// post decrement restores TBLPTR
		let high = self.read_instruction(TABLE_READ_POST_DECREMENT) as u16;
		let raw = (high << 8) | low;
		// revision bits <4:0>
		Some(raw >> 5)
	}

	fn erase_device(&mut self) {
		// 0x0F8F in the bulk erase control registers selects everything
		self.set_table_pointer(BULK_ERASE_HIGH);
		self.instruction(TABLE_WRITE, 0x0f0f);
		self.set_table_pointer(BULK_ERASE_LOW);
		self.instruction(TABLE_WRITE, 0x8f8f);

		self.core_instruction(opcodes::NOP);
		// erase runs while the NOP is held (ICSPDAT low)
		self.hardware.write_mode();
		self.hardware.write_bits(0, 4, BitOrder::LsbFirst);
		self.hardware.delay_ms(BULK_ERASE_MS);
		self.hardware.delay_us(DISCHARGE_US);
		self.hardware.write_bits(0, OPERAND_WIDTH, BitOrder::LsbFirst);
	}

	fn two_bytes_per_address(&self) -> bool {
		false
	}
}
