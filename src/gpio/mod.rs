/// Raspberry Pi (BCM283x) GPIO through `/dev/gpiomem`

use std::fmt;
use std::str;

use crate::serial::{
	Direction,
	Hardware,
	Pin,
};

mod mapped;

pub use self::mapped::Mapped;

pub const GPIOMEM_PATH: &str = "/dev/gpiomem";
const GPIOMEM_LEN: usize = 4096;

/// number of GPIO lines on the BCM283x
pub const GPIO_COUNT: u8 = 54;

// register offsets (bytes)
const GPFSEL0: usize = 0x00;
const GPSET0: usize = 0x1c;
const GPCLR0: usize = 0x28;
const GPLEV0: usize = 0x34;

const FSEL_INPUT: u32 = 0b000;
const FSEL_OUTPUT: u32 = 0b001;

/// BCM GPIO numbers of the programming lines
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PinMap {
	pub mclr: u8,
	pub clock: u8,
	pub data: u8,
	pub power: u8,
	pub pgm: u8,
}

impl Default for PinMap {
	fn default() -> Self {
		PinMap {
			mclr: 2,
			clock: 3,
			data: 4,
			power: 5,
			pgm: 6,
		}
	}
}

impl PinMap {
	pub fn gpio(&self, pin: Pin) -> u8 {
		match pin {
			Pin::Reset => self.mclr,
			Pin::Clock => self.clock,
			Pin::Data => self.data,
			Pin::Power => self.power,
			Pin::Pgm => self.pgm,
		}
	}

	fn all(&self) -> [u8; 5] {
		[self.mclr, self.clock, self.data, self.power, self.pgm]
	}
}

impl fmt::Display for PinMap {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{},{},{},{},{}", self.mclr, self.clock, self.data, self.power, self.pgm)
	}
}

/// Parses `mclr,clk,dat,pvcc,pgm`
impl str::FromStr for PinMap {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut gpios = Vec::new();
		for part in s.split(',') {
			let gpio = with_context!(("invalid GPIO number {:?}", part),
				Ok(part.trim().parse::<u8>()?)
			)?;
			ensure!(gpio < GPIO_COUNT, "GPIO {} out of range (0..{})", gpio, GPIO_COUNT);
			ensure!(!gpios.contains(&gpio), "GPIO {} used twice", gpio);
			gpios.push(gpio);
		}
		ensure!(gpios.len() == 5, "expected 5 GPIO numbers (mclr,clk,dat,pvcc,pgm), got {}", gpios.len());

		Ok(PinMap {
			mclr: gpios[0],
			clock: gpios[1],
			data: gpios[2],
			power: gpios[3],
			pgm: gpios[4],
		})
	}
}

fn fsel_location(gpio: u8) -> (usize, u32) {
	let gpio = gpio as usize;
	(GPFSEL0 + 4 * (gpio / 10), 3 * (gpio % 10) as u32)
}

fn bank_location(base: usize, gpio: u8) -> (usize, u32) {
	let gpio = gpio as usize;
	(base + 4 * (gpio / 32), 1 << (gpio % 32))
}

/// `Hardware` on the GPIO register block
pub struct Gpio {
	registers: Mapped,
	pins: PinMap,
}

impl Gpio {
	/// Map the GPIO registers; all lines start as inputs except CLK and DAT
	/// (driven LOW).
	pub fn open(pins: PinMap) -> crate::AResult<Self> {
		let registers = with_context!(("couldn't map {}", GPIOMEM_PATH),
			Ok(mapped::open_readwrite(GPIOMEM_PATH, GPIOMEM_LEN)?)
		)?;
		debug!("mapped {} ({} bytes), pins {}", GPIOMEM_PATH, registers.len(), pins);

		let mut gpio = Gpio { registers, pins };
		gpio.set_direction(Pin::Reset, Direction::Input);
		gpio.set_direction(Pin::Pgm, Direction::Input);
		for &pin in &[Pin::Power, Pin::Clock, Pin::Data] {
			gpio.write_pin(pin, false);
			gpio.set_direction(pin, Direction::Output);
		}
		Ok(gpio)
	}

	pub fn pins(&self) -> PinMap {
		self.pins
	}
}

impl Drop for Gpio {
	fn drop(&mut self) {
		// leave nothing driven
		for &gpio in self.pins.all().iter() {
			let (offset, shift) = fsel_location(gpio);
			let value = self.registers.read_register(offset);
			self.registers.write_register(offset, (value & !(0b111 << shift)) | (FSEL_INPUT << shift));
		}
	}
}

impl Hardware for Gpio {
	fn set_direction(&mut self, pin: Pin, direction: Direction) {
		let (offset, shift) = fsel_location(self.pins.gpio(pin));
		let function = match direction {
			Direction::Input => FSEL_INPUT,
			Direction::Output => FSEL_OUTPUT,
		};
		let value = self.registers.read_register(offset);
		self.registers.write_register(offset, (value & !(0b111 << shift)) | (function << shift));
	}

	fn write_pin(&mut self, pin: Pin, level: bool) {
		let base = if level { GPSET0 } else { GPCLR0 };
		let (offset, mask) = bank_location(base, self.pins.gpio(pin));
		self.registers.write_register(offset, mask);
	}

	fn read_pin(&mut self, pin: Pin) -> bool {
		let (offset, mask) = bank_location(GPLEV0, self.pins.gpio(pin));
		0 != self.registers.read_register(offset) & mask
	}
}
