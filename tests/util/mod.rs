#![allow(dead_code)]

use std::cell::Cell;
use std::io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::rc::Rc;

use byteorder::{ByteOrder, WriteBytesExt};
use media_cursor::{BackingStream, StreamOptions};

/// A forward-only source that hands out one byte per call and is interrupted every other call.
pub(crate) struct Trickle {
    data: Vec<u8>,
    position: usize,
    interrupt: bool,
}

impl Trickle {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            position: 0,
            interrupt: false,
        }
    }
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.interrupt = !self.interrupt;
        if self.interrupt {
            return Err(ErrorKind::Interrupted.into());
        }
        if buf.is_empty() || self.position >= self.data.len() {
            return Ok(0);
        }
        buf[0] = self.data[self.position];
        self.position += 1;
        Ok(1)
    }
}

/// A forward-only source that records how many bytes have been pulled from it.
pub(crate) struct Counting {
    inner: Cursor<Vec<u8>>,
    pulled: Rc<Cell<usize>>,
}

impl Counting {
    pub(crate) fn new(data: Vec<u8>) -> (Self, Rc<Cell<usize>>) {
        let pulled = Rc::new(Cell::new(0));
        let source = Self {
            inner: Cursor::new(data),
            pulled: pulled.clone(),
        };
        (source, pulled)
    }
}

impl Read for Counting {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pulled.set(self.pulled.get() + n);
        Ok(n)
    }
}

/// A source that hands out at most two bytes per call and fails once, on call `fail_on`.
pub(crate) struct Flaky {
    inner: Cursor<Vec<u8>>,
    calls: usize,
    fail_on: usize,
}

impl Flaky {
    pub(crate) fn new(data: Vec<u8>, fail_on: usize) -> Self {
        Self {
            inner: Cursor::new(data),
            calls: 0,
            fail_on,
        }
    }
}

impl Read for Flaky {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;
        if self.calls == self.fail_on {
            return Err(io::Error::new(ErrorKind::TimedOut, "read timed out"));
        }
        let length = buf.len().min(2);
        self.inner.read(&mut buf[..length])
    }
}

impl Seek for Flaky {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// The same bytes behind every kind of source, labelled for assertion messages.
pub(crate) fn streams(data: &[u8], chunk_size: usize) -> Vec<(&'static str, BackingStream)> {
    let options = StreamOptions::default().with_chunk_size(chunk_size);
    vec![
        ("memory", BackingStream::from_bytes(data.to_vec())),
        (
            "seekable",
            BackingStream::from_file_with_options(Cursor::new(data.to_vec()), options).unwrap(),
        ),
        (
            "forward with length",
            BackingStream::from_stream_with_options(
                Cursor::new(data.to_vec()),
                Some(data.len() as u64),
                options,
            ),
        ),
        (
            "forward",
            BackingStream::from_stream_with_options(Cursor::new(data.to_vec()), None, options),
        ),
        (
            "trickle",
            BackingStream::from_stream_with_options(Trickle::new(data.to_vec()), None, options),
        ),
    ]
}

pub(crate) const IMAGE_WIDTH: u16 = 0x0100;
pub(crate) const IMAGE_DESCRIPTION: u16 = 0x010E;
pub(crate) const EXIF_IFD: u16 = 0x8769;
pub(crate) const EXPOSURE_TIME: u16 = 0x829A;

pub(crate) const DESCRIPTION: &[u8] = b"hello cursor\0";

/// A small TIFF: a header, IFD0 with three entries, an out-of-line description, and an EXIF
/// sub-IFD holding one rational.
///
/// | offset | contents                       |
/// | ------ | ------------------------------ |
/// | 0      | header                         |
/// | 8      | IFD0, 3 entries                |
/// | 50     | description, padded to 64      |
/// | 64     | EXIF IFD, 1 entry              |
/// | 82     | exposure time rational (1/250) |
pub(crate) fn tiff<B: ByteOrder>(marker: [u8; 2]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&marker);
    out.write_u16::<B>(42).unwrap();
    out.write_u32::<B>(8).unwrap();

    out.write_u16::<B>(3).unwrap();
    entry_short::<B>(&mut out, IMAGE_WIDTH, 640);
    entry::<B>(&mut out, IMAGE_DESCRIPTION, 2, DESCRIPTION.len() as u32, 50);
    entry::<B>(&mut out, EXIF_IFD, 4, 1, 64);
    out.write_u32::<B>(0).unwrap();
    assert_eq!(out.len(), 50);

    out.extend_from_slice(DESCRIPTION);
    out.push(0);
    assert_eq!(out.len(), 64);

    out.write_u16::<B>(1).unwrap();
    entry::<B>(&mut out, EXPOSURE_TIME, 5, 1, 82);
    out.write_u32::<B>(0).unwrap();
    assert_eq!(out.len(), 82);

    out.write_u32::<B>(1).unwrap();
    out.write_u32::<B>(250).unwrap();
    out
}

fn entry<B: ByteOrder>(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
    out.write_u16::<B>(tag).unwrap();
    out.write_u16::<B>(kind).unwrap();
    out.write_u32::<B>(count).unwrap();
    out.write_u32::<B>(value).unwrap();
}

fn entry_short<B: ByteOrder>(out: &mut Vec<u8>, tag: u16, value: u16) {
    out.write_u16::<B>(tag).unwrap();
    out.write_u16::<B>(3).unwrap();
    out.write_u32::<B>(1).unwrap();
    out.write_u16::<B>(value).unwrap();
    out.write_u16::<B>(0).unwrap();
}
