/// Byte `offset` of the first `len` bytes in `data`; erased flash (0xff) beyond
pub fn byte_at(data: &[u8], offset: usize, len: usize) -> u8 {
	if offset >= len || offset >= data.len() {
		0xff
	} else {
		data[offset]
	}
}

/// 16-bit word from the bytes at `offset` and `offset + 1`.
///
/// Bytes past `len` are padded with 0xff, so an odd-length chunk ends with
/// a word that leaves the missing half erased.
pub fn assemble_word(data: &[u8], offset: usize, len: usize, big_endian: bool) -> u16 {
	let b0 = byte_at(data, offset, len) as u16;
	let b1 = byte_at(data, offset + 1, len) as u16;

	if big_endian {
		(b0 << 8) | b1
	} else {
		(b1 << 8) | b0
	}
}
