/// Command-level models of the supported chips, driven by
/// `serial::testing::SimHardware`.

use std::collections::{
	HashMap,
	VecDeque,
};

use crate::serial::testing::{
	Shifter,
	Target,
	frame,
};

use super::commands::midrange as mid;
use super::commands::pic16f184xx as enh;
use super::commands::pic18f1xk22 as p18;

#[derive(Clone, Copy, Debug)]
enum Latch {
	Program(u16),
	Data(u8),
}

/// PIC12F1822 / PIC16F182X / PIC16F88X
pub struct MidrangeChip {
	pub config_address: u32,
	pub reset_command: bool,
	pub program: HashMap<u32, u16>,
	pub data: HashMap<u32, u8>,
	pub pc: u32,
	pub commands: Vec<u32>,
	pub power_cycles: usize,
	// reserved bits sent back with READ DATA; non-zero marks a bad frame
	pub data_reserved: u32,
	shifter: Shifter,
	payload: Option<u32>,
	latch: Option<Latch>,
	out: VecDeque<bool>,
}

impl MidrangeChip {
	fn new(config_address: u32, reset_command: bool) -> Self {
		MidrangeChip {
			config_address,
			reset_command,
			program: HashMap::new(),
			data: HashMap::new(),
			pc: 0,
			commands: Vec::new(),
			power_cycles: 0,
			data_reserved: 0,
			shifter: Shifter::default(),
			payload: None,
			latch: None,
			out: VecDeque::new(),
		}
	}

	pub fn pic12f1822() -> Self {
		Self::new(0x8000, true)
	}

	pub fn pic16f88x() -> Self {
		Self::new(0x2000, false)
	}

	pub fn with_device_id(mut self, raw: u16) -> Self {
		let address = self.config_address + 6;
		self.program.insert(address, raw);
		self
	}

	pub fn word(&self, address: u32) -> u16 {
		*self.program.get(&address).unwrap_or(&0x3fff)
	}

	pub fn count(&self, command: u32) -> usize {
		self.commands.iter().filter(|&&c| c == command).count()
	}

	fn command(&mut self, command: u32) {
		self.commands.push(command);
		match command {
			mid::LOAD_CONFIGURATION | mid::LOAD_PROGRAM | mid::LOAD_DATA => {
				self.payload = Some(command);
			},
			mid::READ_PROGRAM => {
				let word = self.word(self.pc) as u32;
				self.out.clear();
				self.out.push_back(false);
				frame(&mut self.out, word, 14, false);
				self.out.push_back(false);
			},
			mid::READ_DATA => {
				let byte = *self.data.get(&self.pc).unwrap_or(&0xff) as u32;
				self.out.clear();
				self.out.push_back(false);
				frame(&mut self.out, byte, 8, false);
				frame(&mut self.out, self.data_reserved, 6, false);
				self.out.push_back(false);
			},
			mid::INCREMENT_ADDRESS => self.pc += 1,
			mid::RESET_ADDRESS => {
				assert!(self.reset_command, "RESET ADDRESS not supported by this chip");
				self.pc = 0;
			},
			mid::BEGIN_INTERNAL_PROGRAMMING | mid::BEGIN_EXTERNAL_PROGRAMMING => {
				match self.latch.take() {
					Some(Latch::Program(word)) => { self.program.insert(self.pc, word); },
					Some(Latch::Data(byte)) => { self.data.insert(self.pc, byte); },
					None => (),
				}
			},
			mid::END_EXTERNAL_PROGRAMMING => (),
			mid::BULK_ERASE_PROGRAM => {
				let config = self.config_address;
				if self.pc >= config {
					// user ids and configuration words go too, device id stays
					self.program.retain(|&a, _| a == config + 5 || a == config + 6);
				} else {
					self.program.retain(|&a, _| a >= config);
				}
			},
			mid::BULK_ERASE_DATA => self.data.clear(),
			mid::ROW_ERASE_PROGRAM => {
				let row = self.pc & !0x1f;
				self.program.retain(|&a, _| a < row || a >= row + 0x20);
			},
			_ => panic!("unknown command 0x{:02x}", command),
		}
	}

	fn load(&mut self, command: u32, payload: u32) {
		match command {
			mid::LOAD_CONFIGURATION => {
				self.pc = self.config_address;
				self.latch = Some(Latch::Program(((payload >> 1) & 0x3fff) as u16));
			},
			mid::LOAD_PROGRAM => {
				self.latch = Some(Latch::Program(((payload >> 1) & 0x3fff) as u16));
			},
			mid::LOAD_DATA => {
				assert_eq!(payload >> 9, 0, "data payload must end with zero bits");
				self.latch = Some(Latch::Data((payload >> 1) as u8));
			},
			_ => unreachable!(),
		}
	}
}

impl Target for MidrangeChip {
	fn clock_in(&mut self, bit: bool) {
		match self.payload {
			None => {
				if let Some(command) = self.shifter.push(bit, mid::COMMAND_WIDTH, false) {
					self.command(command);
				}
			},
			Some(command) => {
				if let Some(payload) = self.shifter.push(bit, 16, false) {
					self.payload = None;
					self.load(command, payload);
				}
			},
		}
	}

	fn clock_out(&mut self) -> bool {
		self.out.pop_front().unwrap_or(false)
	}

	fn power(&mut self, on: bool) {
		if on {
			self.power_cycles += 1;
			self.pc = 0;
			self.shifter.clear();
			self.payload = None;
			self.latch = None;
			self.out.clear();
		}
	}
}

/// PIC16F184XX
pub struct EnhancedChip {
	pub program: HashMap<u32, u16>,
	pub pc: u32,
	pub commands: Vec<u32>,
	shifter: Shifter,
	payload: Option<u32>,
	latch: Option<u16>,
	out: VecDeque<bool>,
}

impl EnhancedChip {
	pub fn new() -> Self {
		EnhancedChip {
			program: HashMap::new(),
			pc: 0,
			commands: Vec::new(),
			shifter: Shifter::default(),
			payload: None,
			latch: None,
			out: VecDeque::new(),
		}
	}

	pub fn with_device_id(mut self, id: u16) -> Self {
		self.program.insert(0x8006, id);
		self
	}

	pub fn word(&self, address: u32) -> u16 {
		*self.program.get(&address).unwrap_or(&0x3fff)
	}

	pub fn count(&self, command: u32) -> usize {
		self.commands.iter().filter(|&&c| c == command).count()
	}

	fn command(&mut self, command: u32) {
		self.commands.push(command);
		match command {
			enh::LOAD_DATA | enh::LOAD_PC_ADDRESS => self.payload = Some(command),
			enh::READ_DATA_INCREMENT => {
				let word = self.word(self.pc) as u32;
				self.out.clear();
				frame(&mut self.out, word << 1, 24, true);
				self.pc += 1;
			},
			enh::INCREMENT_ADDRESS => self.pc += 1,
			enh::BEGIN_INTERNAL_PROGRAMMING => {
				if let Some(word) = self.latch.take() {
					self.program.insert(self.pc, word);
				}
			},
			enh::BULK_ERASE => {
				if self.pc >= 0x8000 {
					self.program.retain(|&a, _| a == 0x8005 || a == 0x8006);
				} else {
					self.program.retain(|&a, _| a >= 0x8000);
				}
			},
			_ => panic!("unknown command 0x{:02x}", command),
		}
	}
}

impl Target for EnhancedChip {
	fn clock_in(&mut self, bit: bool) {
		match self.payload {
			None => {
				if let Some(command) = self.shifter.push(bit, enh::COMMAND_WIDTH, true) {
					self.command(command);
				}
			},
			Some(command) => {
				if let Some(payload) = self.shifter.push(bit, 24, true) {
					self.payload = None;
					match command {
						enh::LOAD_DATA => self.latch = Some(((payload >> 1) & 0x3fff) as u16),
						enh::LOAD_PC_ADDRESS => self.pc = (payload >> 1) & 0xffff,
						_ => unreachable!(),
					}
				}
			},
		}
	}

	fn clock_out(&mut self) -> bool {
		self.out.pop_front().unwrap_or(false)
	}

	fn power(&mut self, on: bool) {
		if on {
			self.pc = 0;
			self.shifter.clear();
			self.payload = None;
			self.latch = None;
			self.out.clear();
		}
	}
}

pub const EECON1_EEPGD: u8 = 0x80;
pub const EECON1_CFGS: u8 = 0x40;
pub const EECON1_WREN: u8 = 0x04;

/// PIC18F1XK22
pub struct Pic18Chip {
	pub memory: HashMap<u32, u8>,
	pub tblptr: u32,
	pub eecon1: u8,
	pub bulk_erases: usize,
	pub instructions: Vec<(u32, u32)>,
	w: u8,
	tablat: u8,
	control: HashMap<u32, u8>,
	shifter: Shifter,
	pending: Option<(u32, u32)>,
	out: VecDeque<bool>,
}

impl Pic18Chip {
	pub fn new() -> Self {
		Pic18Chip {
			memory: HashMap::new(),
			tblptr: 0,
			eecon1: 0,
			bulk_erases: 0,
			instructions: Vec::new(),
			w: 0,
			tablat: 0,
			control: HashMap::new(),
			shifter: Shifter::default(),
			pending: None,
			out: VecDeque::new(),
		}
	}

	pub fn with_device_id(mut self, raw: u16) -> Self {
		self.memory.insert(0x3f_fffe, raw as u8);
		self.memory.insert(0x3f_ffff, (raw >> 8) as u8);
		self
	}

	pub fn byte(&self, address: u32) -> u8 {
		*self.memory.get(&address).unwrap_or(&0xff)
	}

	pub fn core_instructions(&self) -> Vec<u32> {
		self.instructions.iter()
			.filter(|&&(i, _)| i == p18::CORE_INSTRUCTION)
			.map(|&(_, operand)| operand)
			.collect()
	}

	fn is_read(instruction: u32) -> bool {
		match instruction {
			p18::SHIFT_OUT_TABLAT
			| p18::TABLE_READ
			| p18::TABLE_READ_POST_INCREMENT
			| p18::TABLE_READ_POST_DECREMENT
			| p18::TABLE_READ_PRE_INCREMENT => true,
			_ => false,
		}
	}

	fn execute(&mut self, instruction: u32, operand: u32) {
		self.instructions.push((instruction, operand));
		match instruction {
			p18::CORE_INSTRUCTION => self.core(operand),
			p18::SHIFT_OUT_TABLAT => (),
			p18::TABLE_READ => self.tablat = self.byte(self.tblptr),
			p18::TABLE_READ_POST_INCREMENT => {
				self.tablat = self.byte(self.tblptr);
				self.tblptr += 1;
			},
			p18::TABLE_READ_POST_DECREMENT => {
				self.tablat = self.byte(self.tblptr);
				self.tblptr -= 1;
			},
			p18::TABLE_READ_PRE_INCREMENT => {
				self.tblptr += 1;
				self.tablat = self.byte(self.tblptr);
			},
			p18::TABLE_WRITE => {
				self.control.insert(self.tblptr, operand as u8);
			},
			p18::TABLE_WRITE_START_PROGRAMMING => self.program(operand),
			_ => panic!("unexpected instruction 0x{:x}", instruction),
		}
		if Self::is_read(instruction) {
			self.out.clear();
			frame(&mut self.out, self.tablat as u32, 8, false);
		}
	}

	fn program(&mut self, operand: u32) {
		let enabled = EECON1_WREN | EECON1_EEPGD;
		if self.eecon1 & enabled != enabled {
			return;
		}
		let config_space = self.tblptr >= 0x20_0000;
		if config_space != (0 != self.eecon1 & EECON1_CFGS) {
			return;
		}
		if config_space {
			self.memory.insert(self.tblptr, operand as u8);
		} else {
			self.memory.insert(self.tblptr & !1, operand as u8);
			self.memory.insert(self.tblptr | 1, (operand >> 8) as u8);
		}
	}

	fn core(&mut self, operand: u32) {
		match operand {
			0x0000 => {
				let erase = self.control.get(&0x3c_0005) == Some(&0x0f)
					&& self.control.get(&0x3c_0004) == Some(&0x8f);
				if erase {
					self.memory.retain(|&a, _| a >= 0x3f_fffe);
					self.bulk_erases += 1;
				}
				self.control.clear();
			},
			op if op & 0xff00 == 0x0e00 => self.w = op as u8,
			0x6ef8 => self.tblptr = (self.tblptr & 0x00_ffff) | (self.w as u32) << 16,
			0x6ef7 => self.tblptr = (self.tblptr & 0xff_00ff) | (self.w as u32) << 8,
			0x6ef6 => self.tblptr = (self.tblptr & 0xff_ff00) | self.w as u32,
			0x84a6 => self.eecon1 |= EECON1_WREN,
			0x94a6 => self.eecon1 &= !EECON1_WREN,
			0x8ea6 => self.eecon1 |= EECON1_EEPGD,
			0x9ea6 => self.eecon1 &= !EECON1_EEPGD,
			0x8ca6 => self.eecon1 |= EECON1_CFGS,
			0x9ca6 => self.eecon1 &= !EECON1_CFGS,
			_ => panic!("unexpected core instruction 0x{:04x}", operand),
		}
	}
}

impl Target for Pic18Chip {
	fn clock_in(&mut self, bit: bool) {
		match self.pending {
			None => {
				if let Some(instruction) = self.shifter.push(bit, p18::INSTRUCTION_WIDTH, false) {
					let width = if Self::is_read(instruction) { 8 } else { p18::OPERAND_WIDTH };
					self.pending = Some((instruction, width));
				}
			},
			Some((instruction, width)) => {
				if let Some(operand) = self.shifter.push(bit, width, false) {
					self.pending = None;
					self.execute(instruction, operand);
				}
			},
		}
	}

	fn clock_out(&mut self) -> bool {
		self.out.pop_front().unwrap_or(false)
	}

	fn power(&mut self, on: bool) {
		if on {
			self.shifter.clear();
			self.pending = None;
			self.out.clear();
		}
	}
}
