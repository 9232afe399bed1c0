/// PIC16(L)F88X
///
/// PIC16F88X Memory Programming Specification (DS41287D). Same command set
/// and framing as the PIC12F1822, but:
/// - there is no RESET ADDRESS command; the program counter is reset by
///   leaving and entering programming mode
/// - configuration memory starts at 0x2000
/// - low voltage programming uses the PGM pin instead of a key sequence

use crate::serial::{
	Direction,
	Hardware,
	Pin,
};

use super::midrange::{
	Midrange,
	MidrangeTiming,
	MidrangeVariant,
};

pub struct Pic16F88xVariant;

impl MidrangeVariant for Pic16F88xVariant {
	const NAME: &'static str = "PIC16F88X";
	const CONFIG_ADDRESS: u64 = 0x2000;
	const TIMING: MidrangeTiming = MidrangeTiming {
		program_ms: 3,
		config_program_ms: 3,
		bulk_erase_program_ms: 6,
		bulk_erase_data_ms: 6,
		row_erase_ms: 6,
	};
	const HAS_RESET_ADDRESS: bool = false;

	fn trigger<H: Hardware + ?Sized>(hardware: &mut H, low_voltage: bool) {
		if low_voltage {
			hardware.set_direction(Pin::Pgm, Direction::Output);
			hardware.write_pin(Pin::Pgm, true);
			hardware.delay_us(2);
			// rising edge on MCLR with PGM high
			hardware.set_direction(Pin::Reset, Direction::Output);
			hardware.write_pin(Pin::Reset, false);
			hardware.write_pin(Pin::Reset, true);
		} else {
			hardware.set_direction(Pin::Reset, Direction::Output);
			hardware.write_pin(Pin::Reset, true);
		}
	}

	fn release<H: Hardware + ?Sized>(hardware: &mut H, low_voltage: bool, programming: bool) {
		if low_voltage {
			hardware.write_pin(Pin::Pgm, false);
			hardware.delay_us(1);
			if programming {
				// pulse MCLR so the device leaves programming mode
				hardware.write_pin(Pin::Reset, false);
				hardware.write_pin(Pin::Reset, true);
			}
		}
	}
}

pub type Pic16F88x<H> = Midrange<H, Pic16F88xVariant>;
