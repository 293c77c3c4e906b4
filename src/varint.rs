//! Base-128 little-endian variable-length integers, plus the zigzag mapping used by `sint` kinds.

/// The most bytes a 64-bit varint may occupy.
pub const MAX_VARINT_LEN: usize = 10;

/// Why a varint failed to read. The caller attaches the byte offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarIntError {
    /// The buffer ended before a byte without the continuation bit was found.
    Truncated,
    /// More than 10 bytes, or the 10th byte carries bits past the 64th.
    Malformed,
}

/// Append the minimal encoding of `v` onto `buf`.
pub fn write(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Number of bytes [`write`] would produce for `v`.
pub fn encoded_len(v: u64) -> usize {
    // Each byte holds 7 bits; zero still takes one byte.
    let bits = 64 - (v | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Read a varint from the front of `buf`, advancing it past the bytes consumed.
///
/// Non-minimal encodings (e.g. `80 80 80 80 00` for zero) are accepted, as long as they fit in
/// 10 bytes. On error, `buf` is left untouched.
pub fn read(buf: &mut &[u8]) -> Result<u64, VarIntError> {
    let mut value = 0u64;
    for (i, &b) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN - 1 && b > 1 {
            return Err(VarIntError::Malformed);
        }
        value |= ((b & 0x7F) as u64) << (7 * i);
        if b < 0x80 {
            *buf = &buf[i + 1..];
            return Ok(value);
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        Err(VarIntError::Malformed)
    } else {
        Err(VarIntError::Truncated)
    }
}

#[inline]
pub fn zigzag_encode_32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

#[inline]
pub fn zigzag_decode_32(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

#[inline]
pub fn zigzag_encode_64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
pub fn zigzag_decode_64(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}
