/// Synchronous serial link used by Microchip ICSP
///
/// Two wires: ICSPCLK is always driven by the programmer, ICSPDAT is driven
/// by the programmer while sending and by the target while receiving. Every
/// bit is one CLK pulse; the target latches data on the falling edge and
/// presents data after the rising edge.
///
/// Bit order and frame widths are defined per device family (see
/// `crate::pic`); this module only knows single bits and bit runs.
///
/// There is no acknowledge on the link: if the target misses edges or is
/// not in programming mode, nothing here can tell.

mod hardware;
mod low_level;

#[cfg(test)]
pub(crate) mod testing;

pub use self::hardware::{
	Direction,
	Hardware,
	Pin,
	reliable_sleep,
};

pub use self::low_level::{
	BitOrder,
	BitSerial,
};
