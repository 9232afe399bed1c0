/// Mid-range flash devices with 6-bit commands and 14-bit words
///
/// PIC12(L)F1822/PIC16(L)F182X Memory Programming Specification (DS41390D),
/// also the base for PIC16(L)F88X (see `pic16f88x`).
///
/// Commands are 6 bits, LSB first. Commands with data are followed by a
/// 16-bit frame: start bit (0), 14 data bits LSB first, stop bit (0).
///
/// The program counter can only be reset to 0, incremented, or set to the
/// start of configuration memory (LOAD CONFIGURATION); seeking backwards
/// means resetting and walking up again.

use std::marker::PhantomData;

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
	pub const COMMAND_WIDTH: u32 = 6;

	/// 32-bit key (LSB first) for low voltage programming; "MCHP"
	pub const KEY_SEQUENCE: u32 = 0x4d43_4850;

	pub const LOAD_CONFIGURATION: u32 = 0x00;
	pub const LOAD_PROGRAM: u32 = 0x02;
	pub const LOAD_DATA: u32 = 0x03;
	pub const READ_PROGRAM: u32 = 0x04;
	pub const READ_DATA: u32 = 0x05;
	pub const INCREMENT_ADDRESS: u32 = 0x06;
	pub const RESET_ADDRESS: u32 = 0x16;
	pub const BEGIN_INTERNAL_PROGRAMMING: u32 = 0x08;
	pub const BEGIN_EXTERNAL_PROGRAMMING: u32 = 0x18;
	pub const END_EXTERNAL_PROGRAMMING: u32 = 0x0a;
	pub const BULK_ERASE_PROGRAM: u32 = 0x09;
	pub const BULK_ERASE_DATA: u32 = 0x0b;
	pub const ROW_ERASE_PROGRAM: u32 = 0x11;
}

use self::commands::*;

// word offset of the device id inside configuration memory
const DEVICE_ID_OFFSET: u64 = 6;
// revision bits <4:0> of the device id word
const DEVICE_ID_REVISION_BITS: u32 = 5;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct MidrangeTiming {
	/// TPINT in program memory
	pub program_ms: u64,
	/// TPINT in configuration memory
	pub config_program_ms: u64,
	pub bulk_erase_program_ms: u64,
	pub bulk_erase_data_ms: u64,
	pub row_erase_ms: u64,
}

/// What differs between the devices sharing the mid-range command set
pub trait MidrangeVariant {
	const NAME: &'static str;
	const CONFIG_ADDRESS: u64;
	const TIMING: MidrangeTiming;
	/// whether RESET ADDRESS exists; otherwise the counter is reset by
	/// re-entering programming mode
	const HAS_RESET_ADDRESS: bool;

	/// put MCLR (and PGM) into programming state; PVCC follows afterwards
	fn trigger<H: Hardware + ?Sized>(hardware: &mut H, low_voltage: bool);

	/// runs once PVCC settled
	fn unlock<H: Hardware + ?Sized>(_hardware: &mut H, _low_voltage: bool) {
	}

	/// runs before the lines are returned to their idle state
	fn release<H: Hardware + ?Sized>(_hardware: &mut H, _low_voltage: bool, _programming: bool) {
	}
}

pub struct Pic12F1822Variant;

impl MidrangeVariant for Pic12F1822Variant {
	const NAME: &'static str = "PIC12F1822";
	const CONFIG_ADDRESS: u64 = 0x8000;
	const TIMING: MidrangeTiming = MidrangeTiming {
		program_ms: 3,
		config_program_ms: 5,
		bulk_erase_program_ms: 5,
		bulk_erase_data_ms: 5,
		row_erase_ms: 3,
	};
	const HAS_RESET_ADDRESS: bool = true;

	fn trigger<H: Hardware + ?Sized>(hardware: &mut H, low_voltage: bool) {
		hardware.set_direction(Pin::Reset, Direction::Output);
		// high voltage on MCLR (external circuit); in low voltage mode the
		// falling edge enters programming mode
		hardware.write_pin(Pin::Reset, true);
		if low_voltage {
			hardware.write_pin(Pin::Reset, false);
		}
	}

	fn unlock<H: Hardware + ?Sized>(hardware: &mut H, low_voltage: bool) {
		if low_voltage {
			hardware.write_mode();
			// key is followed by one extra clock
			hardware.write_bits(KEY_SEQUENCE, 32, BitOrder::LsbFirst);
			hardware.write_bit(false);
			hardware.delay_ms(1);
		}
	}
}

/// PIC12(L)F1822 and PIC16(L)F182X (same programming specification)
pub type Pic12F1822<H> = Midrange<H, Pic12F1822Variant>;

pub struct Midrange<H, V> {
	hardware: H,
	pub(super) state: SessionState,
	variant: PhantomData<V>,
}

impl<H: Hardware, V: MidrangeVariant> Midrange<H, V> {
	pub fn new(hardware: H, flags: Flags) -> Self {
		Midrange {
			hardware,
			state: SessionState::new(flags),
			variant: PhantomData,
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

	fn config_address(&self) -> u64 {
		V::CONFIG_ADDRESS
	}

	fn in_config_space(&self) -> bool {
		self.state.address.map_or(false, |a| a >= self.config_address())
	}

	fn power_up(&mut self) {
		let low_voltage = self.state.low_voltage;
		V::trigger(&mut self.hardware, low_voltage);
		// wait for high voltage to charge
		self.hardware.delay_us(1);

		self.hardware.write_pin(Pin::Power, true);
		self.hardware.delay_ms(1);

		V::unlock(&mut self.hardware, low_voltage);

		self.state.programming = true;
		self.state.address = Some(0);
	}

	fn power_down(&mut self) {
		let (low_voltage, programming) = (self.state.low_voltage, self.state.programming);
		V::release(&mut self.hardware, low_voltage, programming);

		self.hardware.write_pin(Pin::Clock, false);
		self.hardware.write_pin(Pin::Data, false);
		// MCLR back to high impedance
		self.hardware.set_direction(Pin::Reset, Direction::Input);
		// wait for the voltage to discharge
		self.hardware.delay_ms(1);
		self.hardware.write_pin(Pin::Power, false);

		self.state.programming = false;
	}

	fn command(&mut self, command: u32) {
		trace!("{}: command 0x{:02x}", V::NAME, command);
		self.hardware.write_mode();
		self.hardware.write_bits(command, COMMAND_WIDTH, BitOrder::LsbFirst);
	}

	fn load_word(&mut self, command: u32, word: u16) {
		self.command(command);
		self.hardware.write_bit(false);
		self.hardware.write_bits(word as u32, 14, BitOrder::LsbFirst);
		self.hardware.write_bit(false);
	}

	// PC jumps to the start of configuration memory; `word` is latched
	fn load_configuration(&mut self, word: u16) {
		self.load_word(LOAD_CONFIGURATION, word);
		self.state.address = Some(self.config_address());
	}

	fn load_program(&mut self, word: u16) {
		self.load_word(LOAD_PROGRAM, word);
	}

	fn read_program(&mut self) -> u16 {
		self.command(READ_PROGRAM);
		self.hardware.read_mode();
		self.hardware.read_bit();
		let word = self.hardware.read_bits(14, BitOrder::LsbFirst);
		self.hardware.read_bit();
		word as u16
	}

	pub fn increment_address(&mut self) {
		self.command(INCREMENT_ADDRESS);
		self.state.advance(1);
	}

	pub fn reset_address(&mut self) {
		if V::HAS_RESET_ADDRESS {
			self.command(RESET_ADDRESS);
			self.state.address = Some(0);
		} else if self.state.programming {
			debug!("{}: resetting address by re-entering programming mode", V::NAME);
			let extended_address = self.state.extended_address;
			self.power_down();
			self.power_up();
			self.state.extended_address = extended_address;
		}
	}

	fn begin_internal_programming(&mut self) {
		self.command(BEGIN_INTERNAL_PROGRAMMING);
		let timing = V::TIMING;
		if self.in_config_space() {
			self.hardware.delay_ms(timing.config_program_ms);
		} else {
			self.hardware.delay_ms(timing.program_ms);
		}
	}

	/// Start programming the latched data (externally timed); must be
	/// followed by `end_external_programming`.
	pub fn begin_external_programming(&mut self) {
		self.command(BEGIN_EXTERNAL_PROGRAMMING);
		self.hardware.delay_ms(1);
	}

	pub fn end_external_programming(&mut self) {
		self.command(END_EXTERNAL_PROGRAMMING);
		self.hardware.delay_us(100);
	}

	/// Load a byte for the data EEPROM at the current address.
	pub fn load_data_byte(&mut self, data: u8) {
		self.command(LOAD_DATA);
		self.hardware.write_bit(false);
		self.hardware.write_bits(data as u32, 8, BitOrder::LsbFirst);
		self.hardware.write_bits(0, 7, BitOrder::LsbFirst);
	}

	/// Program a data EEPROM byte at the current address and advance.
	pub fn program_data_byte(&mut self, data: u8) {
		self.load_data_byte(data);
		self.begin_internal_programming();
		self.increment_address();
	}

	/// Read the data EEPROM byte at the current address and advance.
	///
	/// Returns `None` if the reserved bits of the frame are not zero; the
	/// frame is always clocked out completely.
	pub fn read_data_byte(&mut self) -> Option<u8> {
		self.command(READ_DATA);
		self.hardware.read_mode();
		self.hardware.read_bit();
		let data = self.hardware.read_bits(8, BitOrder::LsbFirst);
		let reserved = self.hardware.read_bits(6, BitOrder::LsbFirst);
		self.hardware.read_bit();
		self.increment_address();

		if 0 != reserved {
			warn!("{}: invalid data memory frame (reserved bits 0x{:02x})", V::NAME, reserved);
			return None;
		}
		Some(data as u8)
	}

	pub fn erase_data_memory(&mut self) {
		self.command(BULK_ERASE_DATA);
		self.hardware.delay_ms(V::TIMING.bulk_erase_data_ms);
	}

	/// Erase the program memory row containing the current address.
	pub fn erase_row(&mut self) {
		self.command(ROW_ERASE_PROGRAM);
		self.hardware.delay_ms(V::TIMING.row_erase_ms);
	}

	fn erase_program_memory(&mut self) {
		self.command(BULK_ERASE_PROGRAM);
		self.hardware.delay_ms(V::TIMING.bulk_erase_program_ms);
	}
}

impl<H: Hardware, V: MidrangeVariant> PicProgrammer for Midrange<H, V> {
	fn state(&self) -> &SessionState {
		&self.state
	}

	fn enter_programming_mode(&mut self) -> bool {
		if self.state.programming {
			return false;
		}

		self.power_up();
		self.state.extended_address = 0;
		debug!("{}: entered programming mode (low voltage: {})", V::NAME, self.state.low_voltage);

		true
	}

	fn leave_programming_mode(&mut self) {
		self.power_down();
		self.state.reset();
		debug!("{}: left programming mode", V::NAME);
	}

	fn read_program_word(&mut self) -> Option<u16> {
		let word = self.read_program();
		self.increment_address();
		Some(word)
	}

	fn program_write_buffer(&mut self, buffer: &[u8]) {
		let len = buffer.len();
		let mut offset = 0;
		while offset < len {
			let word = assemble_word(buffer, offset, len, false);
			offset += 2;

			self.load_program(word);
			self.begin_internal_programming();
			self.increment_address();
		}
	}

	fn set_extended_address(&mut self, extended_address: u32) {
		self.state.extended_address = extended_address;
		self.set_address(0);
	}

	fn set_address(&mut self, address: u64) {
		// two bytes per address
		let target = address + (EXTENDED_ADDRESS_BYTE_OFFSET / 2) * self.state.extended_address as u64;
		let config_address = self.config_address();

		if target >= config_address && self.state.address.map_or(true, |a| a < config_address) {
			// LOAD CONFIGURATION jumps right to the start of config memory
			self.load_configuration(0x3fff);
		} else if self.state.address.map_or(true, |a| target < a) {
			self.reset_address();
		}

		while self.state.address.map_or(false, |a| a < target) {
			self.increment_address();
		}

		if self.state.address != Some(target) {
			warn!("{}: failed to seek to 0x{:04x} (at {:?})", V::NAME, target, self.state.address);
		} else {
			debug!("{}: address 0x{:04x}", V::NAME, target);
		}
	}

	fn read_device_id(&mut self) -> Option<u16> {
		self.load_configuration(0x3fff);
		for _ in 0..DEVICE_ID_OFFSET {
			self.increment_address();
		}

		let raw = self.read_program();
		Some(raw >> DEVICE_ID_REVISION_BITS)
	}

	fn erase_device(&mut self) {
		// with PC in configuration memory the bulk erase includes
		// configuration words and user ids
		self.load_configuration(0x3fff);
		self.erase_program_memory();
	}

	fn two_bytes_per_address(&self) -> bool {
		true
	}
}
