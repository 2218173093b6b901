//! Windowed, endian-aware cursors over a [`BackingStream`].
//!
//! A [`ReaderCursor`] is a small value: a handle to the shared stream plus a start offset, a
//! position, an optional length and a byte order. Nested structures get their own cursor from
//! [`ReaderCursor::clone_at`], scoped exactly to the structure's extent.
//!
//! ```
//! use media_cursor::{Access, BackingStream, Endianness};
//!
//! // An atom: 4-byte big endian size, 4-byte type, payload.
//! let data = vec![0, 0, 0, 12, b'f', b'r', b'e', b'e', 1, 2, 3, 4, 0xFF];
//! let stream = BackingStream::from_bytes(data);
//! let mut reader = stream.create_reader();
//!
//! let size = reader.get_u32(Access::Sequential).unwrap() as i64;
//! assert!(reader.starts_with(&[0, 0, 0, 12]).unwrap());
//! let kind = reader.get_bytes(Access::Sequential, 4).unwrap();
//! assert_eq!(kind, b"free");
//!
//! // The payload can only see its own 4 bytes.
//! let mut payload = reader.clone_at(0, Some(size - 8), true).unwrap();
//! assert_eq!(payload.endianness(), Endianness::LittleEndian);
//! assert_eq!(payload.get_u32(Access::Sequential).unwrap(), 0x04030201);
//! assert!(payload.get_u8(Access::Sequential).unwrap_err().is_bounds());
//!
//! // The parent has not moved.
//! assert_eq!(reader.position(), 8);
//! ```

use crate::charset::Charset;
use crate::error::{CursorError, CursorResult};
use crate::reader::{EndianAwareReader, Endianness};
use crate::sequential::SequentialRead;
use crate::stream::BackingStream;

/// Where a cursor read takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read at the cursor's position, then advance the position past the bytes read.
    Sequential,
    /// Read at the given offset from the cursor's start. The position is not touched.
    Indexed(i64),
}

/// A relative, bounded view over a [`BackingStream`].
///
/// Every getter takes an [`Access`]. Sequential reads advance the position by exactly the
/// number of bytes read when they succeed and leave it unchanged when they fail.
///
/// Cloning a cursor (through [`Clone`] or [`clone_at`][Self::clone_at]) never copies bytes. The
/// clones move independently but share the stream's cache.
#[derive(Debug, Clone)]
pub struct ReaderCursor {
    stream: BackingStream,
    start_offset: i64,
    position: i64,
    length: Option<i64>,
    endianness: Endianness,
}

impl ReaderCursor {
    pub(crate) fn from_parts(
        stream: BackingStream,
        start_offset: i64,
        length: Option<i64>,
        endianness: Endianness,
    ) -> Self {
        Self {
            stream,
            start_offset,
            position: 0,
            length,
            endianness,
        }
    }

    /// The stream this cursor reads from.
    pub fn stream(&self) -> &BackingStream {
        &self.stream
    }

    /// The byte order multi-byte values are decoded with.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Change the byte order of this cursor only.
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Returns this cursor with the given byte order.
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// The position the next sequential read starts at, relative to the cursor's start.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// The absolute stream offset of this cursor's position 0.
    pub fn start_offset(&self) -> i64 {
        self.start_offset
    }

    /// The absolute stream offset the next sequential read starts at.
    ///
    /// Saturates at `i64::MAX`; no stream is that long, so such a position can never be read.
    pub fn absolute_position(&self) -> i64 {
        self.start_offset.saturating_add(self.position)
    }

    /// The explicit length of this cursor's window, if it has one.
    pub fn declared_length(&self) -> Option<i64> {
        self.length
    }

    /// The length of this cursor's window.
    ///
    /// Without an explicit length this is the stream length minus the start offset, which for a
    /// forward-only stream of unknown length means reading the whole stream (see
    /// [`BackingStream::length`]).
    pub fn length(&self) -> CursorResult<i64> {
        match self.length {
            Some(length) => Ok(length),
            None => Ok((self.stream.length()? - self.start_offset).max(0)),
        }
    }

    /// The number of bytes between the position and the end of the window.
    ///
    /// This has the same cost as [`length`][Self::length].
    pub fn remaining(&self) -> CursorResult<i64> {
        Ok((self.length()? - self.position).max(0))
    }

    /// How many of the `count` bytes at `index` can be read, within the window.
    pub fn available(&self, index: i64, count: i64) -> CursorResult<i64> {
        if index < 0 || count <= 0 {
            return Ok(0);
        }
        let count = match self.length {
            Some(length) => count.min((length - index).max(0)),
            None => count,
        };
        if count == 0 {
            return Ok(0);
        }
        match self.start_offset.checked_add(index) {
            Some(absolute) => self.stream.availability(absolute, count),
            None => Ok(0),
        }
    }

    /// Returns `true` if fewer than `count` bytes remain before the end of the window.
    ///
    /// Unlike [`remaining`][Self::remaining] this only reads as far as `count` bytes ahead.
    pub fn is_closer_to_end(&self, count: i64) -> CursorResult<bool> {
        Ok(self.available(self.position, count)? < count)
    }

    /// Move the position by `count` bytes; negative values step back.
    ///
    /// Fails if the new position would lie before the start of the window or if the bytes
    /// skipped over do not exist.
    pub fn skip(&mut self, count: i64) -> CursorResult<()> {
        let target = self
            .position
            .checked_add(count)
            .ok_or(CursorError::Overflow {
                index: self.position,
                count,
            })?;
        if count < 0 {
            if target < 0 {
                return Err(CursorError::NegativeIndex(target));
            }
        } else {
            self.ensure_available(self.position, count, true)?;
        }
        self.position = target;
        Ok(())
    }

    /// Move the position by `count` bytes, never failing.
    ///
    /// Returns `false` if the full distance could not be covered, in which case the position is
    /// left at the end of the available data (or at 0 when stepping back too far).
    pub fn try_skip(&mut self, count: i64) -> bool {
        if count < 0 {
            let target = self.position + count;
            if target < 0 {
                self.position = 0;
                return false;
            }
            self.position = target;
            return true;
        }
        match self.available(self.position, count) {
            Ok(available) => {
                self.position += available;
                available == count
            }
            Err(err) => {
                log::debug!("failed to skip {count} bytes at {}: {err}", self.position);
                false
            }
        }
    }

    /// Create a cursor over part of this one.
    ///
    /// The new cursor starts `offset` bytes after this cursor's position and spans `length`
    /// bytes, or the rest of this cursor's window when `length` is `None`. Its byte order is
    /// inherited, or the opposite one if `flip_endianness` is set. The new cursor cannot read
    /// past its own window.
    pub fn clone_at(
        &self,
        offset: i64,
        length: Option<i64>,
        flip_endianness: bool,
    ) -> CursorResult<Self> {
        let local_start = self
            .position
            .checked_add(offset)
            .ok_or(CursorError::Overflow {
                index: self.position,
                count: offset,
            })?;
        if local_start < 0 {
            return Err(CursorError::NegativeIndex(local_start));
        }

        let length = match (length, self.length) {
            (Some(length), _) if length < 0 => return Err(CursorError::NegativeCount(length)),
            (Some(length), Some(parent)) if local_start.saturating_add(length) > parent => {
                return Err(CursorError::OutOfBounds {
                    index: local_start,
                    count: length,
                    length: parent,
                })
            }
            (Some(length), _) => Some(length),
            (None, Some(parent)) if local_start > parent => {
                return Err(CursorError::OutOfBounds {
                    index: local_start,
                    count: 0,
                    length: parent,
                })
            }
            (None, Some(parent)) => Some(parent - local_start),
            (None, None) => None,
        };

        let start_offset = self
            .start_offset
            .checked_add(local_start)
            .ok_or(CursorError::Overflow {
                index: self.start_offset,
                count: local_start,
            })?;

        let endianness = if flip_endianness {
            self.endianness.flip()
        } else {
            self.endianness
        };
        Ok(Self::from_parts(
            self.stream.clone(),
            start_offset,
            length,
            endianness,
        ))
    }

    /// Fails unless all `count` bytes at `index` exist within the window.
    fn ensure_available(&self, index: i64, count: i64, is_sequential: bool) -> CursorResult<()> {
        if index < 0 {
            return Err(CursorError::NegativeIndex(index));
        }
        if count < 0 {
            return Err(CursorError::NegativeCount(count));
        }
        let end = index
            .checked_add(count)
            .ok_or(CursorError::Overflow { index, count })?;
        if let Some(length) = self.length {
            if end > length {
                return Err(CursorError::OutOfBounds {
                    index,
                    count,
                    length,
                });
            }
        }
        let absolute = self
            .start_offset
            .checked_add(index)
            .ok_or(CursorError::Overflow { index, count })?;
        let available = self.stream.availability(absolute, count)?;
        if available < count {
            return Err(self
                .stream
                .range_error(absolute, count, available, is_sequential));
        }
        Ok(())
    }

    /// Copy the bytes at `index` into `dest`, clamped to the window if `allow_partial` is set.
    fn read_at(
        &self,
        index: i64,
        dest: &mut [u8],
        is_sequential: bool,
        allow_partial: bool,
    ) -> CursorResult<usize> {
        if index < 0 {
            return Err(CursorError::NegativeIndex(index));
        }
        let count = dest.len() as i64;
        let end = index
            .checked_add(count)
            .ok_or(CursorError::Overflow { index, count })?;

        let mut wanted = dest.len();
        if let Some(length) = self.length {
            if end > length {
                if !allow_partial {
                    return Err(CursorError::OutOfBounds {
                        index,
                        count,
                        length,
                    });
                }
                wanted = (length - index).max(0) as usize;
            }
        }

        let absolute = self
            .start_offset
            .checked_add(index)
            .ok_or(CursorError::Overflow { index, count })?;
        self.stream
            .read(absolute, &mut dest[..wanted], is_sequential, allow_partial)
    }

    fn read_window(
        &mut self,
        access: Access,
        dest: &mut [u8],
        allow_partial: bool,
    ) -> CursorResult<usize> {
        match access {
            Access::Sequential => {
                let read = self.read_at(self.position, dest, true, allow_partial)?;
                self.position += read as i64;
                Ok(read)
            }
            Access::Indexed(index) => self.read_at(index, dest, false, allow_partial),
        }
    }

    fn get_array<const N: usize>(&mut self, access: Access) -> CursorResult<[u8; N]> {
        let mut buffer = [0u8; N];
        self.read_window(access, &mut buffer, false)?;
        Ok(buffer)
    }

    fn decoder<'a>(&self, buffer: &'a [u8]) -> EndianAwareReader<&'a [u8]> {
        EndianAwareReader::new(buffer, self.endianness)
    }

    /// Read an unsigned byte.
    pub fn get_u8(&mut self, access: Access) -> CursorResult<u8> {
        let buffer = self.get_array::<1>(access)?;
        self.decoder(&buffer).read_u8()
    }

    /// Read a signed byte.
    pub fn get_i8(&mut self, access: Access) -> CursorResult<i8> {
        let buffer = self.get_array::<1>(access)?;
        self.decoder(&buffer).read_i8()
    }

    /// Read an unsigned 16-bit integer.
    pub fn get_u16(&mut self, access: Access) -> CursorResult<u16> {
        let buffer = self.get_array::<2>(access)?;
        self.decoder(&buffer).read_u16()
    }

    /// Read a signed 16-bit integer.
    pub fn get_i16(&mut self, access: Access) -> CursorResult<i16> {
        let buffer = self.get_array::<2>(access)?;
        self.decoder(&buffer).read_i16()
    }

    /// Read an unsigned 24-bit integer.
    pub fn get_u24(&mut self, access: Access) -> CursorResult<u32> {
        let buffer = self.get_array::<3>(access)?;
        self.decoder(&buffer).read_u24()
    }

    /// Read a signed 24-bit integer.
    pub fn get_i24(&mut self, access: Access) -> CursorResult<i32> {
        let buffer = self.get_array::<3>(access)?;
        self.decoder(&buffer).read_i24()
    }

    /// Read an unsigned 32-bit integer.
    pub fn get_u32(&mut self, access: Access) -> CursorResult<u32> {
        let buffer = self.get_array::<4>(access)?;
        self.decoder(&buffer).read_u32()
    }

    /// Read a signed 32-bit integer.
    pub fn get_i32(&mut self, access: Access) -> CursorResult<i32> {
        let buffer = self.get_array::<4>(access)?;
        self.decoder(&buffer).read_i32()
    }

    /// Read an unsigned 64-bit integer.
    pub fn get_u64(&mut self, access: Access) -> CursorResult<u64> {
        let buffer = self.get_array::<8>(access)?;
        self.decoder(&buffer).read_u64()
    }

    /// Read a signed 64-bit integer.
    pub fn get_i64(&mut self, access: Access) -> CursorResult<i64> {
        let buffer = self.get_array::<8>(access)?;
        self.decoder(&buffer).read_i64()
    }

    /// Read an IEEE 754 single precision float.
    pub fn get_f32(&mut self, access: Access) -> CursorResult<f32> {
        let buffer = self.get_array::<4>(access)?;
        self.decoder(&buffer).read_f32()
    }

    /// Read an IEEE 754 double precision float.
    pub fn get_f64(&mut self, access: Access) -> CursorResult<f64> {
        let buffer = self.get_array::<8>(access)?;
        self.decoder(&buffer).read_f64()
    }

    /// Read a signed 16.16 fixed-point number, as used by ICC profiles and QuickTime headers.
    pub fn get_s15_fixed16(&mut self, access: Access) -> CursorResult<f32> {
        let buffer = self.get_array::<4>(access)?;
        self.decoder(&buffer).read_s15_fixed16()
    }

    /// Test a single bit. Bit `n` is bit `n % 8` (counting from the least significant) of byte
    /// `n / 8` of the window.
    pub fn get_bit(&mut self, bit_index: i64) -> CursorResult<bool> {
        if bit_index < 0 {
            return Err(CursorError::NegativeIndex(bit_index));
        }
        let byte = self.get_u8(Access::Indexed(bit_index / 8))?;
        Ok((byte >> (bit_index % 8)) & 1 == 1)
    }

    /// Fill `dest` with the bytes at `access`.
    pub fn get_bytes_into(&mut self, access: Access, dest: &mut [u8]) -> CursorResult<()> {
        self.read_window(access, dest, false)?;
        Ok(())
    }

    /// Read `count` bytes.
    ///
    /// The bytes are checked to exist before anything is allocated, so a corrupt length field
    /// produces an error rather than a huge allocation.
    pub fn get_bytes(&mut self, access: Access, count: i64) -> CursorResult<Vec<u8>> {
        let (index, is_sequential) = match access {
            Access::Sequential => (self.position, true),
            Access::Indexed(index) => (index, false),
        };
        self.ensure_available(index, count, is_sequential)?;
        let mut bytes = vec![0u8; count as usize];
        self.read_window(access, &mut bytes, false)?;
        Ok(bytes)
    }

    /// Read `count` bytes and decode them with `charset`.
    pub fn get_string(
        &mut self,
        access: Access,
        count: i64,
        charset: &dyn Charset,
    ) -> CursorResult<String> {
        let bytes = self.get_bytes(access, count)?;
        Ok(charset.decode(&bytes))
    }

    /// Read bytes up to the first zero byte, looking at no more than `max_length` bytes.
    ///
    /// The zero byte is not included in the result. Indexed access requires the whole
    /// `max_length` block to exist; sequential access reads one byte at a time and consumes the
    /// terminator. Both return the same bytes for the same data.
    pub fn get_null_terminated_bytes(
        &mut self,
        access: Access,
        max_length: i64,
    ) -> CursorResult<Vec<u8>> {
        match access {
            Access::Indexed(_) => {
                let mut bytes = self.get_bytes(access, max_length)?;
                if let Some(end) = bytes.iter().position(|byte| *byte == 0) {
                    bytes.truncate(end);
                }
                Ok(bytes)
            }
            Access::Sequential => self.read_null_terminated_bytes(max_length),
        }
    }

    /// Like [`get_null_terminated_bytes`][Self::get_null_terminated_bytes], decoded with
    /// `charset`.
    pub fn get_null_terminated_string(
        &mut self,
        access: Access,
        max_length: i64,
        charset: &dyn Charset,
    ) -> CursorResult<String> {
        let bytes = self.get_null_terminated_bytes(access, max_length)?;
        Ok(charset.decode(&bytes))
    }

    /// Returns `true` if the window begins with `pattern`.
    ///
    /// Only indexed reads are used, so the position does not change. A window shorter than the
    /// pattern does not start with it.
    pub fn starts_with(&self, pattern: &[u8]) -> CursorResult<bool> {
        let count = pattern.len() as i64;
        if self.available(0, count)? < count {
            return Ok(false);
        }
        let mut bytes = vec![0u8; pattern.len()];
        self.read_at(0, &mut bytes, false, false)?;
        Ok(bytes == pattern)
    }

    /// Read a line terminated by `\r`, `\n`, `\r\n` or the end of the window.
    ///
    /// The terminator is consumed but not returned. Returns `None` only when the position is
    /// already at the end of the window.
    pub fn read_line(&mut self) -> CursorResult<Option<String>> {
        let mut line = Vec::new();
        let mut terminated = false;
        while self.available(self.position, 1)? == 1 {
            match self.get_u8(Access::Sequential)? {
                b'\n' => {
                    terminated = true;
                    break;
                }
                b'\r' => {
                    terminated = true;
                    let next = self.position;
                    if self.available(next, 1)? == 1 && self.get_u8(Access::Indexed(next))? == b'\n'
                    {
                        self.position += 1;
                    }
                    break;
                }
                byte => line.push(byte),
            }
        }
        if line.is_empty() && !terminated {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

impl SequentialRead for ReaderCursor {
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
        self.read_window(Access::Sequential, dest, false)?;
        Ok(())
    }

    fn skip(&mut self, count: i64) -> CursorResult<()> {
        ReaderCursor::skip(self, count)
    }

    fn try_skip(&mut self, count: i64) -> bool {
        ReaderCursor::try_skip(self, count)
    }

    fn read_bytes(&mut self, count: i64) -> CursorResult<Vec<u8>> {
        self.get_bytes(Access::Sequential, count)
    }
}
