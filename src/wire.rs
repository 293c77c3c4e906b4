//! The tagged record layer of the binary format.
//!
//! An encoded message is a flat sequence of records. Each record is a key varint holding
//! `(field_number << 3) | wire_type`, followed by a payload whose extent is determined by the wire
//! type alone. This module splits a buffer into records without consulting any schema; the
//! [`decode`][crate::decode] module interprets them.

use std::fmt;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{DecodeError, Error, Result};
use crate::varint::{self, VarIntError};

/// Smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest valid field number, 2^29 - 1.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers reserved for the wire format's own use.
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<u32> = 19000..=19999;

/// The 3-bit encoding family carried in every record key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WireType {
    Varint = 0,
    I64 = 1,
    Len = 2,
    StartGroup = 3,
    EndGroup = 4,
    I32 = 5,
}

impl WireType {
    pub fn from_u8(v: u8) -> Option<Self> {
        use self::WireType::*;
        Some(match v {
            0 => Varint,
            1 => I64,
            2 => Len,
            3 => StartGroup,
            4 => EndGroup,
            5 => I32,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        use self::WireType::*;
        match self {
            Varint => "varint",
            I64 => "i64",
            Len => "len",
            StartGroup => "sgroup",
            EndGroup => "egroup",
            I32 => "i32",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write a record key for the given field number and wire type.
pub fn write_key(buf: &mut Vec<u8>, number: u32, wire_type: WireType) {
    varint::write(buf, ((number as u64) << 3) | wire_type as u64);
}

/// Check that `number` may be used as a field number.
pub fn is_valid_field_number(number: u32) -> bool {
    (MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&number)
        && !RESERVED_FIELD_NUMBERS.contains(&number)
}

/// Check that `raw` is exactly one well-formed payload for `wire_type`, as it would appear after a
/// record key. Length-delimited payloads include their length prefix.
pub fn validate_payload(wire_type: WireType, raw: &[u8]) -> Result<(), &'static str> {
    match wire_type {
        WireType::Varint => {
            let mut rest = raw;
            varint::read(&mut rest).map_err(|_| "payload is not a varint")?;
            if !rest.is_empty() {
                return Err("trailing bytes after varint");
            }
        }
        WireType::I64 => {
            if raw.len() != 8 {
                return Err("fixed64 payload must be 8 bytes");
            }
        }
        WireType::I32 => {
            if raw.len() != 4 {
                return Err("fixed32 payload must be 4 bytes");
            }
        }
        WireType::Len => {
            let mut rest = raw;
            let len = varint::read(&mut rest).map_err(|_| "missing length prefix")?;
            if len != rest.len() as u64 {
                return Err("length prefix does not match payload");
            }
        }
        WireType::StartGroup | WireType::EndGroup => return Err("groups are not supported"),
    }
    Ok(())
}

/// The interpreted payload of a record.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Payload<'a> {
    Varint(u64),
    I64(u64),
    I32(u32),
    Len(&'a [u8]),
}

/// One record from an encoded message.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Record<'a> {
    pub number: u32,
    pub wire_type: WireType,
    /// Offset of the record's key within the top-level buffer.
    pub offset: usize,
    /// Offset of the first payload byte (after any length prefix) within the top-level buffer.
    pub payload_offset: usize,
    /// The bytes following the key exactly as they appeared, including any length prefix.
    pub raw: &'a [u8],
    pub payload: Payload<'a>,
}

/// Splits a buffer into [`Record`]s.
///
/// Stops yielding after the first error.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
    offset: usize,
    max_length: usize,
    errored: bool,
}

impl<'a> Parser<'a> {
    /// Parse `data`, which begins at `offset` within the top-level buffer. Length prefixes above
    /// `max_length` are rejected before any slice is taken.
    pub fn new(data: &'a [u8], offset: usize, max_length: usize) -> Parser<'a> {
        Self {
            data,
            offset,
            max_length,
            errored: false,
        }
    }

    fn read_varint(&mut self) -> Result<u64> {
        let mut rest = self.data;
        let v = varint::read(&mut rest).map_err(|e| match e {
            VarIntError::Truncated => DecodeError::Truncated {
                offset: self.offset,
                needed: self.data.len() as u64 + 1,
                remaining: self.data.len(),
            },
            VarIntError::Malformed => DecodeError::MalformedVarint {
                offset: self.offset,
            },
        })?;
        self.advance(self.data.len() - rest.len());
        Ok(v)
    }

    fn advance(&mut self, n: usize) {
        self.data = &self.data[n..];
        self.offset += n;
    }

    fn truncated(&self, needed: u64) -> Error {
        DecodeError::Truncated {
            offset: self.offset,
            needed,
            remaining: self.data.len(),
        }
        .into()
    }

    // Pull the next record off the front of the data. This does *not* set the errored flag; that's
    // up to the caller.
    fn parse_record(&mut self) -> Result<Record<'a>> {
        let offset = self.offset;
        let key = self.read_varint()?;
        let number = key >> 3;
        if number < MIN_FIELD_NUMBER as u64 || number > MAX_FIELD_NUMBER as u64 {
            return Err(DecodeError::InvalidFieldNumber { offset, number }.into());
        }
        let number = number as u32;
        let wire_type = WireType::from_u8((key & 0x7) as u8).ok_or(DecodeError::InvalidWireType {
            offset,
            value: (key & 0x7) as u8,
        })?;

        let start = self.data;
        let start_offset = self.offset;
        let (payload, payload_offset) = match wire_type {
            WireType::Varint => (Payload::Varint(self.read_varint()?), start_offset),
            WireType::I64 => {
                if self.data.len() < 8 {
                    return Err(self.truncated(8));
                }
                let v = self
                    .data
                    .read_u64::<LittleEndian>()
                    .map_err(|_| self.truncated(8))?;
                self.offset += 8;
                (Payload::I64(v), start_offset)
            }
            WireType::I32 => {
                if self.data.len() < 4 {
                    return Err(self.truncated(4));
                }
                let v = self
                    .data
                    .read_u32::<LittleEndian>()
                    .map_err(|_| self.truncated(4))?;
                self.offset += 4;
                (Payload::I32(v), start_offset)
            }
            WireType::Len => {
                let len = self.read_varint()?;
                if len > self.max_length as u64 {
                    return Err(Error::ResourceExceeded {
                        offset: start_offset,
                        declared: len,
                        limit: self.max_length,
                    });
                }
                if len > self.data.len() as u64 {
                    return Err(self.truncated(len));
                }
                let payload_offset = self.offset;
                let (bytes, rest) = self.data.split_at(len as usize);
                self.data = rest;
                self.offset += bytes.len();
                (Payload::Len(bytes), payload_offset)
            }
            WireType::StartGroup | WireType::EndGroup => {
                return Err(DecodeError::UnsupportedGroup { offset, number }.into());
            }
        };

        Ok(Record {
            number,
            wire_type,
            offset,
            payload_offset,
            raw: &start[..self.offset - start_offset],
            payload,
        })
    }
}

impl<'a> Iterator for Parser<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() || self.errored {
            return None;
        }
        let result = self.parse_record();
        if result.is_err() {
            self.errored = true;
        }
        Some(result)
    }
}
