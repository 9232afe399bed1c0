use std::thread;
use std::time::{
	Duration,
	Instant,
};

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// Lines of the programming connector
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Pin {
	/// MCLR: reset / programming trigger; high impedance when idle
	Reset,
	/// ICSPCLK
	Clock,
	/// ICSPDAT; the only line that switches between drive and sense
	Data,
	/// PVCC: switches target supply (and high voltage circuit)
	Power,
	/// PGM: low-voltage programming trigger on some families
	Pgm,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Input,
	Output,
}

pub trait Hardware {
	fn set_direction(&mut self, pin: Pin, direction: Direction);
	fn write_pin(&mut self, pin: Pin, level: bool);
	fn read_pin(&mut self, pin: Pin) -> bool;

	// delays are lower bounds; never return early
	fn delay_us(&mut self, us: u64) {
		reliable_sleep(Duration::from_micros(us));
	}

	fn delay_ms(&mut self, ms: u64) {
		reliable_sleep(Duration::from_millis(ms));
	}
}

impl<'a, H: ?Sized + Hardware> Hardware for &'a mut H {
	fn set_direction(&mut self, pin: Pin, direction: Direction) {
		H::set_direction(*self, pin, direction)
	}
	fn write_pin(&mut self, pin: Pin, level: bool) {
		H::write_pin(*self, pin, level)
	}
	fn read_pin(&mut self, pin: Pin) -> bool {
		H::read_pin(*self, pin)
	}

	fn delay_us(&mut self, us: u64) {
		H::delay_us(*self, us)
	}
	fn delay_ms(&mut self, ms: u64) {
		H::delay_ms(*self, ms)
	}
}
