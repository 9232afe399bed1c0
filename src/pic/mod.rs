/// Device family programming protocols
///
/// Every family implements `PicProgrammer`; a session is always
/// `enter_programming_mode` → any number of read / write / erase / device id
/// operations → `leave_programming_mode`. Callers must leave programming
/// mode on every path, including after failures, otherwise the target stays
/// powered with MCLR driven.
///
/// The program counter of the target can't be read back, so each
/// implementation keeps a mirror in `SessionState::address` and updates it
/// with every command that moves the counter.

use std::fmt;
use std::str;

use crate::serial::Hardware;

mod midrange;
mod pic16f184xx;
mod pic16f88x;
mod pic18f1xk22;

#[cfg(test)]
pub(crate) mod testing;

pub use self::midrange::{
	Midrange,
	MidrangeTiming,
	MidrangeVariant,
	Pic12F1822,
	Pic12F1822Variant,
};
pub use self::pic16f184xx::Pic16F184xx;
pub use self::pic16f88x::{
	Pic16F88x,
	Pic16F88xVariant,
};
pub use self::pic18f1xk22::Pic18F1xK22;

pub mod commands {
	pub use super::midrange::commands as midrange;
	pub use super::pic16f184xx::commands as pic16f184xx;
	pub use super::pic18f1xk22::commands as pic18f1xk22;
}

/// Byte offset selected by one step of the extended address
pub const EXTENDED_ADDRESS_BYTE_OFFSET: u64 = 0x1_0000;

/// Size of the write buffer handed to `program_write_buffer`
pub const WRITE_BUFFER_SIZE: usize = 32;

/// Option byte received together with the family selector
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Flags(pub u8);

impl Flags {
	pub const LOW_VOLTAGE_PROGRAMMING: u8 = 0x80;

	pub fn low_voltage() -> Self {
		Flags(Self::LOW_VOLTAGE_PROGRAMMING)
	}

	pub fn is_low_voltage(&self) -> bool {
		0 != self.0 & Self::LOW_VOLTAGE_PROGRAMMING
	}
}

impl fmt::Debug for Flags {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)?;
		if self.is_low_voltage() { write!(f, " [LVP]")?; }
		Ok(())
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SessionState {
	pub programming: bool,
	pub low_voltage: bool,
	/// mirror of the target program counter; `None` if unknown
	pub address: Option<u64>,
	pub extended_address: u32,
}

impl SessionState {
	pub fn new(flags: Flags) -> Self {
		SessionState {
			programming: false,
			low_voltage: flags.is_low_voltage(),
			address: None,
			extended_address: 0,
		}
	}

	// back to the state before the session was entered
	pub(crate) fn reset(&mut self) {
		self.programming = false;
		self.address = None;
		self.extended_address = 0;
	}

	pub(crate) fn advance(&mut self, step: u64) {
		if let Some(address) = self.address.as_mut() {
			*address += step;
		}
	}
}

pub trait PicProgrammer {
	fn state(&self) -> &SessionState;

	/// `false` if a session is already active (nothing is touched then)
	fn enter_programming_mode(&mut self) -> bool;
	/// safe to call in any state, and more than once
	fn leave_programming_mode(&mut self);

	fn begin_reading(&mut self) {
	}
	/// read at the current address and advance by one unit; `None` if the
	/// target returned an invalid frame
	fn read_program_word(&mut self) -> Option<u16>;
	fn end_reading(&mut self) {
	}

	fn begin_writing(&mut self) {
	}
	fn program_write_buffer(&mut self, buffer: &[u8]);
	fn end_writing(&mut self) {
	}

	fn set_extended_address(&mut self, extended_address: u32);
	fn set_address(&mut self, address: u64);

	fn read_device_id(&mut self) -> Option<u16>;
	fn erase_device(&mut self);

	/// whether one address holds a 16-bit word (HEX byte addresses need to
	/// be halved)
	fn two_bytes_per_address(&self) -> bool;

	fn is_programming(&self) -> bool {
		self.state().programming
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Family {
	/// PIC12(L)F1822 / PIC16(L)F182X
	Pic12F1822,
	/// PIC18F1XK22 / PIC18LF1XK22
	Pic18F1xK22,
	/// PIC16(L)F88X
	Pic16F88x,
	/// PIC16(L)F184XX
	Pic16F184xx,
}

impl Family {
	pub const ALL: [Family; 4] = [
		Family::Pic12F1822,
		Family::Pic18F1xK22,
		Family::Pic16F88x,
		Family::Pic16F184xx,
	];

	pub fn from_selector(selector: u8) -> Option<Self> {
		match selector {
			0x00 => Some(Family::Pic12F1822),
			0x01 => Some(Family::Pic18F1xK22),
			0x02 => Some(Family::Pic16F88x),
			0x03 => Some(Family::Pic16F184xx),
			_ => None,
		}
	}

	pub fn selector(self) -> u8 {
		match self {
			Family::Pic12F1822 => 0x00,
			Family::Pic18F1xK22 => 0x01,
			Family::Pic16F88x => 0x02,
			Family::Pic16F184xx => 0x03,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Family::Pic12F1822 => "pic12f1822",
			Family::Pic18F1xK22 => "pic18f1xk22",
			Family::Pic16F88x => "pic16f88x",
			Family::Pic16F184xx => "pic16f184xx",
		}
	}
}

impl fmt::Display for Family {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl str::FromStr for Family {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lower = s.trim().to_ascii_lowercase();
		let family = match lower.as_str() {
			"pic12f1822" | "pic16f182x" => Family::Pic12F1822,
			"pic18f1xk22" => Family::Pic18F1xK22,
			"pic16f88x" => Family::Pic16F88x,
			"pic16f184xx" => Family::Pic16F184xx,
			_ => {
				let selector = with_context!(("unknown device family: {:?}", s),
					Ok(lower.parse::<u8>()?)
				)?;
				match Family::from_selector(selector) {
					Some(family) => family,
					None => bail!("unknown device family selector: {}", selector),
				}
			},
		};
		Ok(family)
	}
}

/// One programmer per session, selected by `Family`
pub enum Programmer<H: Hardware> {
	Pic12F1822(Pic12F1822<H>),
	Pic18F1xK22(Pic18F1xK22<H>),
	Pic16F88x(Pic16F88x<H>),
	Pic16F184xx(Pic16F184xx<H>),
}

macro_rules! dispatch {
	($self:expr, $p:ident => $e:expr) => {
		match $self {
			Programmer::Pic12F1822($p) => $e,
			Programmer::Pic18F1xK22($p) => $e,
			Programmer::Pic16F88x($p) => $e,
			Programmer::Pic16F184xx($p) => $e,
		}
	};
}

impl<H: Hardware> Programmer<H> {
	pub fn new(family: Family, hardware: H, flags: Flags) -> Self {
		match family {
			Family::Pic12F1822 => Programmer::Pic12F1822(Pic12F1822::new(hardware, flags)),
			Family::Pic18F1xK22 => Programmer::Pic18F1xK22(Pic18F1xK22::new(hardware, flags)),
			Family::Pic16F88x => Programmer::Pic16F88x(Pic16F88x::new(hardware, flags)),
			Family::Pic16F184xx => Programmer::Pic16F184xx(Pic16F184xx::new(hardware, flags)),
		}
	}

	pub fn family(&self) -> Family {
		match self {
			Programmer::Pic12F1822(_) => Family::Pic12F1822,
			Programmer::Pic18F1xK22(_) => Family::Pic18F1xK22,
			Programmer::Pic16F88x(_) => Family::Pic16F88x,
			Programmer::Pic16F184xx(_) => Family::Pic16F184xx,
		}
	}

	pub fn hardware(&self) -> &H {
		dispatch!(self, p => p.hardware())
	}

	pub fn hardware_mut(&mut self) -> &mut H {
		dispatch!(self, p => p.hardware_mut())
	}

	pub fn into_hardware(self) -> H {
		dispatch!(self, p => p.into_hardware())
	}
}

impl<H: Hardware> PicProgrammer for Programmer<H> {
	fn state(&self) -> &SessionState {
		dispatch!(self, p => p.state())
	}

	fn enter_programming_mode(&mut self) -> bool {
		dispatch!(self, p => p.enter_programming_mode())
	}

	fn leave_programming_mode(&mut self) {
		dispatch!(self, p => p.leave_programming_mode())
	}

	fn begin_reading(&mut self) {
		dispatch!(self, p => p.begin_reading())
	}

	fn read_program_word(&mut self) -> Option<u16> {
		dispatch!(self, p => p.read_program_word())
	}

	fn end_reading(&mut self) {
		dispatch!(self, p => p.end_reading())
	}

	fn begin_writing(&mut self) {
		dispatch!(self, p => p.begin_writing())
	}

	fn program_write_buffer(&mut self, buffer: &[u8]) {
		dispatch!(self, p => p.program_write_buffer(buffer))
	}

	fn end_writing(&mut self) {
		dispatch!(self, p => p.end_writing())
	}

	fn set_extended_address(&mut self, extended_address: u32) {
		dispatch!(self, p => p.set_extended_address(extended_address))
	}

	fn set_address(&mut self, address: u64) {
		dispatch!(self, p => p.set_address(address))
	}

	fn read_device_id(&mut self) -> Option<u16> {
		dispatch!(self, p => p.read_device_id())
	}

	fn erase_device(&mut self) {
		dispatch!(self, p => p.erase_device())
	}

	fn two_bytes_per_address(&self) -> bool {
		dispatch!(self, p => p.two_bytes_per_address())
	}
}
