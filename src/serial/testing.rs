/// Pin-level simulated hardware for tests.
///
/// `SimHardware` records every pin change and delay, and forwards clock edges
/// to a `Target`: bits are clocked into the target on the falling CLK edge
/// while the data line is an output, and clocked out of the target on the
/// rising CLK edge while the data line is an input.

use std::collections::VecDeque;

use super::{
	Direction,
	Hardware,
	Pin,
};

pub trait Target {
	fn clock_in(&mut self, bit: bool);
	fn clock_out(&mut self) -> bool;

	// PVCC switched
	fn power(&mut self, _on: bool) {
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
	Direction(Pin, Direction),
	Level(Pin, bool),
	DelayUs(u64),
}

fn slot(pin: Pin) -> usize {
	match pin {
		Pin::Reset => 0,
		Pin::Clock => 1,
		Pin::Data => 2,
		Pin::Power => 3,
		Pin::Pgm => 4,
	}
}

pub struct SimHardware<T> {
	pub target: T,
	pub events: Vec<Event>,
	pub elapsed_us: u64,
	levels: [bool; 5],
	directions: [Direction; 5],
	sampled: bool,
}

impl<T: Target> SimHardware<T> {
	pub fn new(target: T) -> Self {
		SimHardware {
			target,
			events: Vec::new(),
			elapsed_us: 0,
			levels: [false; 5],
			directions: [Direction::Input; 5],
			sampled: false,
		}
	}

	pub fn level(&self, pin: Pin) -> bool {
		self.levels[slot(pin)]
	}

	pub fn direction(&self, pin: Pin) -> Direction {
		self.directions[slot(pin)]
	}

	// number of LOW -> HIGH transitions on `pin`
	pub fn rising_edges(&self, pin: Pin) -> usize {
		let mut level = false;
		let mut count = 0;
		for event in &self.events {
			if let Event::Level(p, l) = *event {
				if p == pin {
					if l && !level {
						count += 1;
					}
					level = l;
				}
			}
		}
		count
	}

	pub fn has_delay_us(&self, us: u64) -> bool {
		self.events.contains(&Event::DelayUs(us))
	}
}

impl<T: Target> Hardware for SimHardware<T> {
	fn set_direction(&mut self, pin: Pin, direction: Direction) {
		self.events.push(Event::Direction(pin, direction));
		self.directions[slot(pin)] = direction;
	}

	fn write_pin(&mut self, pin: Pin, level: bool) {
		self.events.push(Event::Level(pin, level));
		let previous = self.levels[slot(pin)];
		self.levels[slot(pin)] = level;

		match pin {
			Pin::Clock => {
				let data_output = Direction::Output == self.direction(Pin::Data);
				if level && !previous && !data_output {
					self.sampled = self.target.clock_out();
				} else if !level && previous && data_output {
					let bit = self.level(Pin::Data);
					self.target.clock_in(bit);
				}
			},
			Pin::Power => {
				if level != previous {
					self.target.power(level);
				}
			},
			_ => (),
		}
	}

	fn read_pin(&mut self, pin: Pin) -> bool {
		match pin {
			Pin::Data => self.sampled,
			_ => self.level(pin),
		}
	}

	fn delay_us(&mut self, us: u64) {
		self.events.push(Event::DelayUs(us));
		self.elapsed_us += us;
	}

	fn delay_ms(&mut self, ms: u64) {
		self.delay_us(ms * 1000);
	}
}

/// Echoes clocked-in bits back when the host reads.
#[derive(Default, Debug)]
pub struct Loopback {
	bits: VecDeque<bool>,
}

impl Loopback {
	pub fn bits(&self) -> Vec<bool> {
		self.bits.iter().cloned().collect()
	}

	pub fn is_empty(&self) -> bool {
		self.bits.is_empty()
	}
}

impl Target for Loopback {
	fn clock_in(&mut self, bit: bool) {
		self.bits.push_back(bit);
	}

	fn clock_out(&mut self) -> bool {
		self.bits.pop_front().unwrap_or(false)
	}
}

/// Collects bits into words for command-level chip models.
#[derive(Default, Debug)]
pub struct Shifter {
	value: u32,
	count: u32,
}

impl Shifter {
	// returns the word once `width` bits were collected
	pub fn push(&mut self, bit: bool, width: u32, msb_first: bool) -> Option<u32> {
		if msb_first {
			self.value = (self.value << 1) | (bit as u32);
		} else if bit {
			self.value |= 1 << self.count;
		}
		self.count += 1;
		if self.count == width {
			let value = self.value;
			self.clear();
			Some(value)
		} else {
			None
		}
	}

	pub fn clear(&mut self) {
		self.value = 0;
		self.count = 0;
	}
}

// bits of `value` as they appear on the wire
pub fn frame(queue: &mut VecDeque<bool>, value: u32, width: u32, msb_first: bool) {
	for i in 0..width {
		let bit = if msb_first { width - 1 - i } else { i };
		queue.push_back(0 != (value >> bit) & 1);
	}
}
