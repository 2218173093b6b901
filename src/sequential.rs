//! Forward-only typed reading.
//!
//! [`SequentialRead`] is the subset of cursor operations that only ever moves forward. It is
//! implemented by [`ReaderCursor`][crate::ReaderCursor] and by [`SequentialReader`], which wraps
//! any [`Read`] without caching, for formats that are parsed in a single pass.

use std::io::{self, Read};

use crate::charset::Charset;
use crate::error::{CursorError, CursorResult};
use crate::reader::{fill_buffer, EndianAwareReader, Endianness};

/// Typed reads that advance a position.
///
/// Implementors supply the raw byte movement; the typed reads are provided on top of it and
/// decode in the current [`endianness`][Self::endianness].
pub trait SequentialRead {
    /// The byte order multi-byte values are decoded with.
    fn endianness(&self) -> Endianness;

    /// Change the byte order for subsequent reads.
    fn set_endianness(&mut self, endianness: Endianness);

    /// The number of bytes consumed so far.
    fn position(&self) -> i64;

    /// Fill `dest` completely, or fail.
    fn read_into(&mut self, dest: &mut [u8]) -> CursorResult<()>;

    /// Skip `count` bytes, failing if they do not exist.
    fn skip(&mut self, count: i64) -> CursorResult<()>;

    /// Skip up to `count` bytes, returning `false` if fewer were available.
    fn try_skip(&mut self, count: i64) -> bool;

    /// Read an unsigned byte.
    fn read_u8(&mut self) -> CursorResult<u8> {
        let buffer: [u8; 1] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_u8()
    }

    /// Read a signed byte.
    fn read_i8(&mut self) -> CursorResult<i8> {
        let buffer: [u8; 1] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_i8()
    }

    /// Read an unsigned 16-bit integer.
    fn read_u16(&mut self) -> CursorResult<u16> {
        let buffer: [u8; 2] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_u16()
    }

    /// Read a signed 16-bit integer.
    fn read_i16(&mut self) -> CursorResult<i16> {
        let buffer: [u8; 2] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_i16()
    }

    /// Read an unsigned 24-bit integer.
    fn read_u24(&mut self) -> CursorResult<u32> {
        let buffer: [u8; 3] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_u24()
    }

    /// Read a signed 24-bit integer.
    fn read_i24(&mut self) -> CursorResult<i32> {
        let buffer: [u8; 3] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_i24()
    }

    /// Read an unsigned 32-bit integer.
    fn read_u32(&mut self) -> CursorResult<u32> {
        let buffer: [u8; 4] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_u32()
    }

    /// Read a signed 32-bit integer.
    fn read_i32(&mut self) -> CursorResult<i32> {
        let buffer: [u8; 4] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_i32()
    }

    /// Read an unsigned 64-bit integer.
    fn read_u64(&mut self) -> CursorResult<u64> {
        let buffer: [u8; 8] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_u64()
    }

    /// Read a signed 64-bit integer.
    fn read_i64(&mut self) -> CursorResult<i64> {
        let buffer: [u8; 8] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_i64()
    }

    /// Read an IEEE 754 single precision float.
    fn read_f32(&mut self) -> CursorResult<f32> {
        let buffer: [u8; 4] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_f32()
    }

    /// Read an IEEE 754 double precision float.
    fn read_f64(&mut self) -> CursorResult<f64> {
        let buffer: [u8; 8] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_f64()
    }

    /// Read a signed 16.16 fixed-point number.
    fn read_s15_fixed16(&mut self) -> CursorResult<f32> {
        let buffer: [u8; 4] = read_array(self)?;
        EndianAwareReader::new(&buffer[..], self.endianness()).read_s15_fixed16()
    }

    /// Read `count` bytes.
    fn read_bytes(&mut self, count: i64) -> CursorResult<Vec<u8>> {
        let length = usize::try_from(count).map_err(|_| CursorError::NegativeCount(count))?;
        let mut bytes = vec![0u8; length];
        self.read_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Read `count` bytes and decode them with `charset`.
    fn read_string(&mut self, count: i64, charset: &dyn Charset) -> CursorResult<String> {
        let bytes = self.read_bytes(count)?;
        Ok(charset.decode(&bytes))
    }

    /// Read bytes up to and including the first zero byte, consuming at most `max_length` bytes.
    ///
    /// The zero byte is not part of the result.
    fn read_null_terminated_bytes(&mut self, max_length: i64) -> CursorResult<Vec<u8>> {
        if max_length < 0 {
            return Err(CursorError::NegativeCount(max_length));
        }
        let mut bytes = Vec::new();
        while (bytes.len() as i64) < max_length {
            match self.read_u8()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        Ok(bytes)
    }

    /// Like [`read_null_terminated_bytes`][Self::read_null_terminated_bytes], decoded with
    /// `charset`.
    fn read_null_terminated_string(
        &mut self,
        max_length: i64,
        charset: &dyn Charset,
    ) -> CursorResult<String> {
        let bytes = self.read_null_terminated_bytes(max_length)?;
        Ok(charset.decode(&bytes))
    }
}

fn read_array<R, const N: usize>(reader: &mut R) -> CursorResult<[u8; N]>
where
    R: SequentialRead + ?Sized,
{
    let mut buffer = [0u8; N];
    reader.read_into(&mut buffer)?;
    Ok(buffer)
}

/// A [`SequentialRead`] over any [`Read`], with no caching and no way back.
///
/// Bytes consumed by a read that then runs out of data are gone; the position reflects them.
///
/// ```
/// use media_cursor::{Endianness, SequentialRead, SequentialReader};
///
/// let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
/// let mut reader = SequentialReader::new(&data[..], Endianness::LittleEndian);
/// assert_eq!(reader.read_u16().unwrap(), 1);
/// assert_eq!(reader.read_u32().unwrap(), 2);
/// assert!(reader.read_u8().unwrap_err().is_end_of_data());
/// ```
#[derive(Debug)]
pub struct SequentialReader<R> {
    reader: R,
    position: i64,
    endianness: Endianness,
}

impl<R: Read> SequentialReader<R> {
    /// Wrap `reader`, decoding with `endianness`.
    pub fn new(reader: R, endianness: Endianness) -> Self {
        Self {
            reader,
            position: 0,
            endianness,
        }
    }

    /// The wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Unwrap, returning the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Pass up to `count` bytes to `sink`, returning how many there were.
    fn forward<W: io::Write>(&mut self, count: u64, sink: &mut W) -> io::Result<u64> {
        let copied = io::copy(&mut (&mut self.reader).take(count), sink)?;
        self.position += copied as i64;
        Ok(copied)
    }
}

impl<R: Read> SequentialRead for SequentialReader<R> {
    fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn read_into(&mut self, dest: &mut [u8]) -> CursorResult<()> {
        let start = self.position;
        let read = fill_buffer(&mut self.reader, dest)?;
        self.position += read as i64;
        if read < dest.len() {
            return Err(CursorError::EndOfData {
                index: start,
                count: dest.len() as i64,
                available: read as i64,
            });
        }
        Ok(())
    }

    fn skip(&mut self, count: i64) -> CursorResult<()> {
        let wanted = u64::try_from(count).map_err(|_| CursorError::NegativeCount(count))?;
        let start = self.position;
        let skipped = self.forward(wanted, &mut io::sink())?;
        if skipped < wanted {
            return Err(CursorError::EndOfData {
                index: start,
                count,
                available: skipped as i64,
            });
        }
        Ok(())
    }

    fn try_skip(&mut self, count: i64) -> bool {
        let Ok(wanted) = u64::try_from(count) else {
            return false;
        };
        match self.forward(wanted, &mut io::sink()) {
            Ok(skipped) => skipped == wanted,
            Err(err) => {
                log::debug!("failed to skip {count} bytes at {}: {err}", self.position);
                false
            }
        }
    }

    /// Reads through a growing buffer, so a corrupt `count` cannot force a huge allocation.
    fn read_bytes(&mut self, count: i64) -> CursorResult<Vec<u8>> {
        let wanted = u64::try_from(count).map_err(|_| CursorError::NegativeCount(count))?;
        let start = self.position;
        let mut bytes = Vec::new();
        let read = self.forward(wanted, &mut bytes)?;
        if read < wanted {
            return Err(CursorError::EndOfData {
                index: start,
                count,
                available: read as i64,
            });
        }
        Ok(bytes)
    }
}
