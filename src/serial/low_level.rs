use super::{
	Direction,
	Hardware,
	Pin,
};

// minimum time between two edges on the link (datasheet AC specs are all
// well below this)
const EDGE_SETTLE_US: u64 = 1;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BitOrder {
	LsbFirst,
	MsbFirst,
}

pub trait BitSerial: Hardware {
	// data line becomes an input; target drives it while we clock
	fn read_mode(&mut self) {
		self.set_direction(Pin::Data, Direction::Input);
	}

	// data line becomes an output, idle LOW
	fn write_mode(&mut self) {
		self.set_direction(Pin::Data, Direction::Output);
		self.write_pin(Pin::Data, false);
	}

	// present bit, pulse CLK; the target latches on the falling edge.
	// data line is dropped afterwards so it is LOW by default.
	fn write_bit(&mut self, bit: bool) {
		self.write_pin(Pin::Data, bit);
		self.delay_us(EDGE_SETTLE_US);
		self.write_pin(Pin::Clock, true);
		self.delay_us(EDGE_SETTLE_US);
		self.write_pin(Pin::Clock, false);
		self.delay_us(EDGE_SETTLE_US);
		self.write_pin(Pin::Data, false);
	}

	// target shifts out on the rising edge; sample while CLK is high
	fn read_bit(&mut self) -> bool {
		self.write_pin(Pin::Clock, true);
		self.delay_us(EDGE_SETTLE_US);
		let bit = self.read_pin(Pin::Data);
		self.delay_us(EDGE_SETTLE_US);
		self.write_pin(Pin::Clock, false);
		self.delay_us(EDGE_SETTLE_US);
		bit
	}

	// send the `count` lowest bits of `value`
	fn write_bits(&mut self, value: u32, count: u32, order: BitOrder) {
		assert!(count <= 32);
		match order {
			BitOrder::LsbFirst => {
				for bit in 0..count {
					self.write_bit(0 != (value >> bit) & 1);
				}
			},
			BitOrder::MsbFirst => {
				for bit in (0..count).rev() {
					self.write_bit(0 != (value >> bit) & 1);
				}
			},
		}
	}

	// receive `count` bits into the lowest bits of the result
	fn read_bits(&mut self, count: u32, order: BitOrder) -> u32 {
		assert!(count <= 32);
		let mut result = 0u32;
		match order {
			BitOrder::LsbFirst => {
				for bit in 0..count {
					if self.read_bit() {
						result |= 1 << bit;
					}
				}
			},
			BitOrder::MsbFirst => {
				for _ in 0..count {
					result = (result << 1) | (self.read_bit() as u32);
				}
			},
		}
		result
	}
}

impl<H: Hardware + ?Sized> BitSerial for H {
}
