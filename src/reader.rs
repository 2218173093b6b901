//! Abstractions over byte sources and byte order.

use std::io::{self, ErrorKind, Read, Seek};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{CursorError, CursorResult};

/// The combination of reading and seeking, used for random-access sources such as files.
///
/// This is implemented for every type that implements both [`Read`] and [`Seek`], so it only
/// exists to allow boxing such a source as a single trait object.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Read until `buffer` is full or the reader reports end-of-data, returning the bytes read.
///
/// Unlike [`Read::read_exact`] this tells the caller how much was read before the end.
pub(crate) fn fill_buffer<R: Read + ?Sized>(
    reader: &mut R,
    buffer: &mut [u8],
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Endianness
///
/// The discriminants are the two-byte markers TIFF-family headers use to announce their byte
/// order: `II` ("Intel") for little endian and `MM` ("Motorola") for big endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum Endianness {
    /// Little Endian, also known as Intel byte order
    LittleEndian = 0x4949,
    /// Big Endian, also known as Motorola byte order
    BigEndian = 0x4D4D,
}

impl Default for Endianness {
    fn default() -> Self {
        Endianness::BigEndian
    }
}

impl Endianness {
    /// Decode a `II` or `MM` byte order marker.
    pub fn from_marker(marker: [u8; 2]) -> CursorResult<Self> {
        Self::try_from(u16::from_be_bytes(marker)).map_err(|err| {
            CursorError::General(format!("unexpected byte order marker {:#06x}", err.number))
        })
    }

    /// The two-byte marker for this byte order.
    pub fn marker(self) -> [u8; 2] {
        u16::from(self).to_be_bytes()
    }

    /// Returns the opposite byte order.
    pub fn flip(self) -> Self {
        match self {
            Endianness::LittleEndian => Endianness::BigEndian,
            Endianness::BigEndian => Endianness::LittleEndian,
        }
    }

    /// Returns `true` for big endian ("Motorola") byte order.
    pub fn is_motorola(self) -> bool {
        self == Endianness::BigEndian
    }
}

/// Multi-byte reads that dispatch on the reader's byte order to the `byteorder` method of the
/// same name.
macro_rules! endian_reads {
    ($($method:ident -> $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $method(&mut self) -> CursorResult<$ty> {
                Ok(match self.endianness {
                    Endianness::LittleEndian => self.reader.$method::<LittleEndian>()?,
                    Endianness::BigEndian => self.reader.$method::<BigEndian>()?,
                })
            }
        )*
    };
}

/// Decodes primitive values from a [`Read`] in a fixed byte order.
///
/// The cursors in this crate fetch the exact number of bytes a value occupies and then decode
/// them through this reader, so a short read here indicates a logic error upstream and surfaces
/// as an IO error.
pub(crate) struct EndianAwareReader<R> {
    reader: R,
    endianness: Endianness,
}

impl<R: Read> EndianAwareReader<R> {
    pub(crate) fn new(reader: R, endianness: Endianness) -> Self {
        Self { reader, endianness }
    }

    /// Read a u8 from the cursor, advancing the internal state by 1 byte.
    pub(crate) fn read_u8(&mut self) -> CursorResult<u8> {
        Ok(self.reader.read_u8()?)
    }

    /// Read a i8 from the cursor, advancing the internal state by 1 byte.
    pub(crate) fn read_i8(&mut self) -> CursorResult<i8> {
        Ok(self.reader.read_i8()?)
    }

    endian_reads! {
        read_u16 -> u16,
        read_i16 -> i16,
        read_u24 -> u32,
        read_i24 -> i32,
        read_u32 -> u32,
        read_i32 -> i32,
        read_u64 -> u64,
        read_i64 -> i64,
        read_f32 -> f32,
        read_f64 -> f64,
    }

    /// Read a signed 16.16 fixed-point number.
    ///
    /// The 4 bytes are assembled as an `i32` in the reader's byte order; the high half is the
    /// signed integer part and the low half the fraction over 65536. For little endian this makes
    /// bytes 2..4 the integer part and bytes 0..2 the fraction, mirroring big endian exactly.
    pub(crate) fn read_s15_fixed16(&mut self) -> CursorResult<f32> {
        let raw = self.read_i32()?;
        let integer = (raw >> 16) as i16;
        let fraction = (raw & 0xFFFF) as u16;
        Ok((f64::from(integer) + f64::from(fraction) / 65536.0) as f32)
    }
}
