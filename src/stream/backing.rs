use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};

use crate::cursor::ReaderCursor;
use crate::error::{CursorError, CursorResult};
use crate::reader::{fill_buffer, Endianness, ReadSeek};
use crate::stream::StreamOptions;

enum Source {
    /// Random access; chunks can be fetched in any order.
    Seekable(Box<dyn ReadSeek>),
    /// Forward only; chunks are fetched strictly in order.
    Forward(Box<dyn Read>),
    /// Fully resident; the whole buffer is chunk 0.
    Memory,
}

impl Source {
    fn kind(&self) -> &'static str {
        match self {
            Source::Seekable(_) => "seekable",
            Source::Forward(_) => "forward",
            Source::Memory => "memory",
        }
    }
}

struct ChunkCache {
    source: Source,
    chunk_size: i64,
    chunks: HashMap<i64, Bytes>,
    /// Length known before any data was read.
    declared_length: Option<i64>,
    /// Best known length; replaced by the real length once end-of-data is observed.
    stream_length: Option<i64>,
    is_finished: bool,
    total_bytes_read: u64,
    /// Absolute offset the source will read from next, or -1 while unknown.
    source_position: i64,
    /// Chunk whose fill failed on a forward-only source. Everything after it is lost.
    failed_chunk: Option<i64>,
}

impl ChunkCache {
    fn new(source: Source, chunk_size: i64, declared_length: Option<i64>) -> Self {
        Self {
            source,
            chunk_size,
            chunks: HashMap::new(),
            declared_length,
            stream_length: declared_length,
            is_finished: false,
            total_bytes_read: 0,
            source_position: 0,
            failed_chunk: None,
        }
    }

    fn can_seek(&self) -> bool {
        !matches!(self.source, Source::Forward(_))
    }

    fn availability(&mut self, index: i64, count: i64) -> CursorResult<i64> {
        if index < 0 || count <= 0 {
            return Ok(0);
        }
        let Some(end) = index.checked_add(count) else {
            return Ok(0);
        };

        if matches!(self.source, Source::Memory) {
            return Ok(self.clamp(index, count, end));
        }

        let first_chunk = index / self.chunk_size;
        let last_chunk = (end / self.chunk_size).saturating_add(1);

        let mut chunk_index = first_chunk;
        if !self.can_seek() && !self.chunks.contains_key(&first_chunk) {
            // A forward-only source cannot be rewound, and its chunks are dense, so continue from
            // the first chunk that has not been read yet.
            chunk_index = self.chunks.len() as i64;
        }

        while chunk_index < last_chunk {
            let chunk_start = chunk_index.saturating_mul(self.chunk_size);
            if self.stream_length.is_some_and(|length| chunk_start >= length) {
                break;
            }
            if self.failed_chunk.is_some() && chunk_start >= end {
                // Only the read-ahead chunk is left, and the source can no longer supply it.
                break;
            }
            if !self.chunks.contains_key(&chunk_index) {
                self.fill_chunk(chunk_index)?;
            }
            chunk_index += 1;
        }

        Ok(self.clamp(index, count, end))
    }

    fn clamp(&self, index: i64, count: i64, end: i64) -> i64 {
        match self.stream_length {
            Some(length) if end > length => (length - index).max(0),
            _ => count,
        }
    }

    fn fill_chunk(&mut self, chunk_index: i64) -> CursorResult<()> {
        if let Some(failed) = self.failed_chunk {
            return Err(CursorError::General(format!(
                "forward source failed while filling chunk {failed}, nothing after it can be read"
            )));
        }
        if matches!(self.source, Source::Memory) {
            return Ok(());
        }

        let chunk_start = chunk_index * self.chunk_size;
        let mut buffer = BytesMut::zeroed(self.chunk_size as usize);

        // A fill that fails partway leaves the source somewhere inside the chunk.
        let position = std::mem::replace(&mut self.source_position, -1);
        let result = match &mut self.source {
            Source::Seekable(source) => {
                let seeked = if position == chunk_start {
                    Ok(position as u64)
                } else {
                    source.seek(SeekFrom::Start(chunk_start as u64))
                };
                seeked.and_then(|_| fill_buffer(source.as_mut(), &mut buffer))
            }
            Source::Forward(source) => {
                debug_assert_eq!(position, chunk_start);
                fill_buffer(source.as_mut(), &mut buffer)
            }
            Source::Memory => Ok(0),
        };
        let filled = match result {
            Ok(filled) => filled,
            Err(err) => {
                if !self.can_seek() {
                    self.failed_chunk = Some(chunk_index);
                }
                log::debug!(
                    "{} source failed while filling chunk {chunk_index}: {err}",
                    self.source.kind()
                );
                return Err(err.into());
            }
        };

        let filled_length = filled as i64;
        self.total_bytes_read += filled as u64;
        self.source_position = chunk_start + filled_length;
        buffer.truncate(filled);
        self.chunks.insert(chunk_index, buffer.freeze());
        log::trace!("filled chunk {chunk_index} with {filled} bytes");

        if filled_length < self.chunk_size {
            self.is_finished = true;
            self.stream_length = Some(chunk_start + filled_length);
            log::debug!(
                "end of data reached in chunk {chunk_index}, stream length is {}",
                chunk_start + filled_length
            );
        }
        Ok(())
    }

    fn read(
        &mut self,
        index: i64,
        dest: &mut [u8],
        is_sequential: bool,
        allow_partial: bool,
    ) -> CursorResult<usize> {
        let count = dest.len() as i64;
        let available = self.availability(index, count)?;
        if available < count && !allow_partial {
            return Err(self.range_error(index, count, available, is_sequential));
        }

        let total = available as usize;
        let mut copied = 0;
        let mut position = index;
        while copied < total {
            let chunk_index = position / self.chunk_size;
            let chunk_offset = (position % self.chunk_size) as usize;
            let chunk = self.chunks.get(&chunk_index).ok_or_else(|| {
                CursorError::General(format!("chunk {chunk_index} is not cached"))
            })?;
            let length = (total - copied).min(chunk.len().saturating_sub(chunk_offset));
            if length == 0 {
                return Err(CursorError::General(format!(
                    "chunk {chunk_index} ends before offset {chunk_offset}"
                )));
            }
            dest[copied..copied + length]
                .copy_from_slice(&chunk[chunk_offset..chunk_offset + length]);
            copied += length;
            position += length as i64;
        }
        Ok(copied)
    }

    fn range_error(
        &self,
        index: i64,
        count: i64,
        available: i64,
        is_sequential: bool,
    ) -> CursorError {
        if index < 0 {
            CursorError::NegativeIndex(index)
        } else if count < 0 {
            CursorError::NegativeCount(count)
        } else if index.checked_add(count).is_none() {
            CursorError::Overflow { index, count }
        } else if self.ended_early(is_sequential) {
            CursorError::EndOfData {
                index,
                count,
                available,
            }
        } else {
            CursorError::OutOfBounds {
                index,
                count,
                length: self.stream_length.unwrap_or(index + available),
            }
        }
    }

    /// Whether running out of data means the stream itself ended, as opposed to the caller
    /// asking for more than a length that was known up front.
    fn ended_early(&self, is_sequential: bool) -> bool {
        match self.declared_length {
            None => true,
            Some(declared) => {
                is_sequential && self.stream_length.is_some_and(|length| length < declared)
            }
        }
    }

    fn length(&mut self) -> CursorResult<i64> {
        if self.stream_length.is_none() {
            log::debug!("reading {} source to its end to learn its length", self.source.kind());
        }
        loop {
            if let Some(length) = self.stream_length {
                return Ok(length);
            }
            let next_chunk = self.chunks.len() as i64;
            self.fill_chunk(next_chunk)?;
        }
    }
}

/// A chunked, lazily filled cache over a single byte source.
///
/// This is a cheap handle: cloning it yields another handle to the same cache. It is not
/// [`Send`] or [`Sync`]; a stream and all cursors over it belong to one parse on one thread.
///
/// ```
/// use media_cursor::{Access, BackingStream, Endianness};
///
/// let stream = BackingStream::from_bytes(vec![0x4D, 0x4D, 0x00, 0x2A]);
/// let mut reader = stream.create_reader();
///
/// let marker = reader.get_bytes(Access::Sequential, 2).unwrap();
/// assert_eq!(Endianness::from_marker([marker[0], marker[1]]).unwrap(), Endianness::BigEndian);
/// assert_eq!(reader.get_u16(Access::Sequential).unwrap(), 42);
/// ```
#[derive(Clone)]
pub struct BackingStream {
    cache: Rc<RefCell<ChunkCache>>,
}

impl BackingStream {
    fn new(cache: ChunkCache) -> Self {
        Self {
            cache: Rc::new(RefCell::new(cache)),
        }
    }

    /// Create a stream over a random-access source such as a [`File`].
    ///
    /// The source's length is determined up front by seeking to its end.
    pub fn from_file<R: Read + Seek + 'static>(file: R) -> CursorResult<Self> {
        Self::from_file_with_options(file, StreamOptions::default())
    }

    /// Create a stream over a random-access source with the given options.
    pub fn from_file_with_options<R: Read + Seek + 'static>(
        mut file: R,
        options: StreamOptions,
    ) -> CursorResult<Self> {
        let end = file.seek(SeekFrom::End(0))?;
        let length = i64::try_from(end)
            .map_err(|_| CursorError::General(format!("source length {end} is too large")))?;
        let mut cache = ChunkCache::new(
            Source::Seekable(Box::new(file)),
            options.chunk_size() as i64,
            Some(length),
        );
        cache.source_position = length;
        Ok(Self::new(cache))
    }

    /// Open the file at `path` and create a stream over it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CursorResult<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Create a stream over a fully resident buffer.
    ///
    /// The buffer becomes the only chunk; nothing is copied.
    pub fn from_bytes<B: Into<Bytes>>(bytes: B) -> Self {
        let bytes: Bytes = bytes.into();
        let length = bytes.len() as i64;
        let mut cache = ChunkCache::new(Source::Memory, length, Some(length));
        cache.chunks.insert(0, bytes);
        cache.is_finished = true;
        cache.source_position = length;
        Self::new(cache)
    }

    /// Create a stream over a forward-only source.
    ///
    /// Pass `known_length` if the length is known in advance; otherwise it is learned when the
    /// source reports end-of-data.
    pub fn from_stream<R: Read + 'static>(stream: R, known_length: Option<u64>) -> Self {
        Self::from_stream_with_options(stream, known_length, StreamOptions::default())
    }

    /// Create a stream over a forward-only source with the given options.
    pub fn from_stream_with_options<R: Read + 'static>(
        stream: R,
        known_length: Option<u64>,
        options: StreamOptions,
    ) -> Self {
        let known_length = known_length.map(|length| i64::try_from(length).unwrap_or(i64::MAX));
        Self::new(ChunkCache::new(
            Source::Forward(Box::new(stream)),
            options.chunk_size() as i64,
            known_length,
        ))
    }

    /// Create a cursor over the whole stream, in big endian byte order.
    pub fn create_reader(&self) -> ReaderCursor {
        ReaderCursor::from_parts(self.clone(), 0, None, Endianness::default())
    }

    /// Create a cursor whose position 0 is `start_offset`.
    ///
    /// With `length` set the cursor can never read past `start_offset + length`; otherwise it is
    /// bounded by the stream itself.
    pub fn create_reader_at(
        &self,
        start_offset: i64,
        length: Option<i64>,
        endianness: Endianness,
    ) -> CursorResult<ReaderCursor> {
        if start_offset < 0 {
            return Err(CursorError::NegativeIndex(start_offset));
        }
        if let Some(length) = length.filter(|length| *length < 0) {
            return Err(CursorError::NegativeCount(length));
        }
        Ok(ReaderCursor::from_parts(
            self.clone(),
            start_offset,
            length,
            endianness,
        ))
    }

    /// Returns how many of the `count` bytes starting at `index` can be supplied, fetching chunks
    /// from the source as needed.
    ///
    /// Negative arguments yield 0. On a forward-only source, bytes behind the furthest point read
    /// so far are only available if they are cached; the source is never rewound.
    pub fn availability(&self, index: i64, count: i64) -> CursorResult<i64> {
        self.cache.borrow_mut().availability(index, count)
    }

    /// Copy the bytes starting at `index` into `dest`, returning how many were written.
    ///
    /// If fewer than `dest.len()` bytes exist and `allow_partial` is false this fails: with
    /// [`CursorError::EndOfData`] if the stream ended before a length known in advance (or had no
    /// known length at all), otherwise with a bounds error. `is_sequential` marks reads that
    /// consume data in order; a sequential read that runs off a stream which ended earlier than
    /// announced is reported as end-of-data rather than as out of bounds.
    pub fn read(
        &self,
        index: i64,
        dest: &mut [u8],
        is_sequential: bool,
        allow_partial: bool,
    ) -> CursorResult<usize> {
        self.cache
            .borrow_mut()
            .read(index, dest, is_sequential, allow_partial)
    }

    pub(crate) fn range_error(
        &self,
        index: i64,
        count: i64,
        available: i64,
        is_sequential: bool,
    ) -> CursorError {
        self.cache
            .borrow()
            .range_error(index, count, available, is_sequential)
    }

    /// The total length of the stream.
    ///
    /// For a forward-only source of unknown length this reads (and caches) the whole source. This
    /// is expensive and cannot be undone; use [`known_length`][Self::known_length] to avoid it.
    pub fn length(&self) -> CursorResult<i64> {
        self.cache.borrow_mut().length()
    }

    /// The length of the stream if it is already known, without reading anything.
    pub fn known_length(&self) -> Option<i64> {
        self.cache.borrow().stream_length
    }

    /// Number of bytes read from the source so far.
    pub fn total_bytes_read(&self) -> u64 {
        self.cache.borrow().total_bytes_read
    }

    /// Returns `true` unless the source is forward-only.
    pub fn can_seek(&self) -> bool {
        self.cache.borrow().can_seek()
    }

    /// Returns `true` once the source has reported end-of-data.
    pub fn is_finished(&self) -> bool {
        self.cache.borrow().is_finished
    }

    /// The number of bytes fetched per chunk. For an in-memory buffer this is its length.
    pub fn chunk_size(&self) -> i64 {
        self.cache.borrow().chunk_size
    }

    /// Number of chunks currently held in the cache.
    pub fn cached_chunks(&self) -> usize {
        self.cache.borrow().chunks.len()
    }
}

impl fmt::Debug for BackingStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cache.try_borrow() {
            Ok(cache) => f
                .debug_struct("BackingStream")
                .field("source", &cache.source.kind())
                .field("chunk_size", &cache.chunk_size)
                .field("cached_chunks", &cache.chunks.len())
                .field("stream_length", &cache.stream_length)
                .field("is_finished", &cache.is_finished)
                .field("total_bytes_read", &cache.total_bytes_read)
                .field("failed_chunk", &cache.failed_chunk)
                .finish(),
            Err(_) => f.write_str("BackingStream { <in use> }"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::{self, Cursor, ErrorKind};

    use super::*;
    use crate::cursor::Access;

    fn sequence(length: u8) -> Vec<u8> {
        (0..length).collect()
    }

    fn forward(data: Vec<u8>, known_length: Option<u64>, chunk_size: usize) -> BackingStream {
        BackingStream::from_stream_with_options(
            Cursor::new(data),
            known_length,
            StreamOptions::default().with_chunk_size(chunk_size),
        )
    }

    /// Counts every byte handed out by the wrapped reader.
    struct Counting<R> {
        inner: R,
        pulled: Rc<Cell<usize>>,
    }

    impl<R: Read> Read for Counting<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.pulled.set(self.pulled.get() + n);
            Ok(n)
        }
    }

    /// Hands out at most one byte per call, interrupting every other call.
    struct Trickle {
        data: Vec<u8>,
        position: usize,
        interrupt: bool,
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

    /// Hands out at most two bytes per call and fails once, on call `fail_on`.
    struct Flaky {
        inner: Cursor<Vec<u8>>,
        calls: usize,
        fail_on: usize,
    }

    impl Flaky {
        fn new(data: Vec<u8>, fail_on: usize) -> Self {
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
                return Err(io::Error::new(ErrorKind::Other, "connection reset"));
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

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::Other, "device unplugged"))
        }
    }

    #[test]
    fn in_memory_availability_is_arithmetic() {
        let stream = BackingStream::from_bytes(sequence(10));
        assert_eq!(stream.chunk_size(), 10);
        assert_eq!(stream.cached_chunks(), 1);
        assert!(stream.is_finished());
        assert!(stream.can_seek());

        assert_eq!(stream.availability(0, 10).unwrap(), 10);
        assert_eq!(stream.availability(5, 10).unwrap(), 5);
        assert_eq!(stream.availability(10, 1).unwrap(), 0);
        assert_eq!(stream.availability(12, 1).unwrap(), 0);
        assert_eq!(stream.availability(-1, 1).unwrap(), 0);
        assert_eq!(stream.availability(0, -1).unwrap(), 0);
        assert_eq!(stream.availability(i64::MAX, 1).unwrap(), 0);
        assert_eq!(stream.total_bytes_read(), 0);
    }

    #[test]
    fn bounds_are_exact() {
        let stream = BackingStream::from_bytes(sequence(10));
        let mut one = [0u8; 1];
        assert_eq!(stream.read(9, &mut one, false, false).unwrap(), 1);
        assert_eq!(one, [9]);

        let mut two = [0u8; 2];
        let err = stream.read(9, &mut two, false, false).unwrap_err();
        assert!(matches!(
            err,
            CursorError::OutOfBounds {
                index: 9,
                count: 2,
                length: 10
            }
        ));

        let mut all = [0u8; 10];
        assert_eq!(stream.read(0, &mut all, false, false).unwrap(), 10);
        let mut too_many = [0u8; 11];
        assert!(stream.read(0, &mut too_many, false, false).unwrap_err().is_bounds());

        assert!(matches!(
            stream.read(-1, &mut one, false, false).unwrap_err(),
            CursorError::NegativeIndex(-1)
        ));
        assert_eq!(stream.read(10, &mut [], false, false).unwrap(), 0);
    }

    #[test]
    fn empty_buffer() {
        let stream = BackingStream::from_bytes(Vec::new());
        assert_eq!(stream.length().unwrap(), 0);
        assert_eq!(stream.availability(0, 1).unwrap(), 0);
        assert_eq!(stream.read(0, &mut [], false, false).unwrap(), 0);
        assert!(stream.read(0, &mut [0u8; 1], false, false).unwrap_err().is_bounds());
    }

    #[test]
    fn truncated_stream() {
        let stream = forward(sequence(10), None, 4);
        assert!(!stream.can_seek());
        assert_eq!(stream.known_length(), None);

        assert_eq!(stream.availability(8, 4).unwrap(), 2);
        assert!(stream.is_finished());
        assert_eq!(stream.known_length(), Some(10));
        assert_eq!(stream.total_bytes_read(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(stream.read(8, &mut buf, true, true).unwrap(), 2);
        assert_eq!(&buf[..2], &[8, 9]);

        let err = stream.read(8, &mut buf, true, false).unwrap_err();
        assert!(matches!(
            err,
            CursorError::EndOfData {
                index: 8,
                count: 4,
                available: 2
            }
        ));
        // The length was never known up front, so indexed reads ran off the stream too.
        assert!(stream
            .read(8, &mut buf, false, false)
            .unwrap_err()
            .is_end_of_data());
    }

    #[test]
    fn reads_straddle_chunks() {
        let stream = forward(sequence(16), None, 4);
        let mut buf = [0u8; 4];
        stream.read(3, &mut buf, false, false).unwrap();
        assert_eq!(buf, [3, 4, 5, 6]);

        let mut long = [0u8; 10];
        stream.read(5, &mut long, false, false).unwrap();
        assert_eq!(long, [5, 6, 7, 8, 9, 10, 11, 12, 13, 14]);
    }

    #[test]
    fn forward_source_is_never_rewound() {
        let pulled = Rc::new(Cell::new(0));
        let source = Counting {
            inner: Cursor::new(sequence(20)),
            pulled: pulled.clone(),
        };
        let stream = BackingStream::from_stream_with_options(
            source,
            None,
            StreamOptions::default().with_chunk_size(4),
        );

        // Jumping ahead fills every chunk in between, plus the one after the range.
        let mut buf = [0u8; 4];
        stream.read(8, &mut buf, false, false).unwrap();
        assert_eq!(buf, [8, 9, 10, 11]);
        assert_eq!(stream.cached_chunks(), 4);
        assert_eq!(pulled.get(), 16);

        // Going back is served from the cache.
        stream.read(0, &mut buf, false, false).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(pulled.get(), 16);
        assert_eq!(stream.total_bytes_read(), 16);
    }

    #[test]
    fn seekable_source_fills_out_of_order() {
        let stream = BackingStream::from_file_with_options(
            Cursor::new(sequence(20)),
            StreamOptions::default().with_chunk_size(4),
        )
        .unwrap();
        assert_eq!(stream.known_length(), Some(20));

        let mut buf = [0u8; 4];
        stream.read(12, &mut buf, false, false).unwrap();
        assert_eq!(buf, [12, 13, 14, 15]);
        assert_eq!(stream.cached_chunks(), 2);
        assert_eq!(stream.total_bytes_read(), 8);

        let mut two = [0u8; 2];
        stream.read(0, &mut two, false, false).unwrap();
        assert_eq!(two, [0, 1]);
        assert_eq!(stream.cached_chunks(), 3);
        assert_eq!(stream.total_bytes_read(), 12);
    }

    #[test]
    fn seekable_source_far_past_the_end() {
        let stream = BackingStream::from_file_with_options(
            Cursor::new(sequence(10)),
            StreamOptions::default().with_chunk_size(4),
        )
        .unwrap();
        assert_eq!(stream.availability(100, 1).unwrap(), 0);
        assert_eq!(stream.known_length(), Some(10));
        assert_eq!(stream.total_bytes_read(), 0);

        let err = stream.read(8, &mut [0u8; 4], true, false).unwrap_err();
        assert!(matches!(err, CursorError::OutOfBounds { length: 10, .. }));
    }

    #[test]
    fn length_drains_forward_source() {
        let stream = forward(sequence(10), None, 4);
        assert_eq!(stream.known_length(), None);
        assert_eq!(stream.length().unwrap(), 10);
        assert!(stream.is_finished());
        assert_eq!(stream.total_bytes_read(), 10);
        assert_eq!(stream.cached_chunks(), 3);
    }

    #[test]
    fn stream_shorter_than_announced() {
        let stream = forward(sequence(10), Some(16), 4);
        assert_eq!(stream.known_length(), Some(16));

        let mut buf = [0u8; 4];
        let indexed = stream.read(8, &mut buf, false, false).unwrap_err();
        assert!(matches!(indexed, CursorError::OutOfBounds { length: 10, .. }));

        let sequential = stream.read(8, &mut buf, true, false).unwrap_err();
        assert!(sequential.is_end_of_data());
        assert_eq!(stream.known_length(), Some(10));
    }

    #[test]
    fn short_reads_and_interruptions_still_fill_whole_chunks() {
        let source = Trickle {
            data: sequence(9),
            position: 0,
            interrupt: false,
        };
        let stream = BackingStream::from_stream_with_options(
            source,
            None,
            StreamOptions::default().with_chunk_size(4),
        );
        let mut buf = [0u8; 5];
        stream.read(2, &mut buf, false, false).unwrap();
        assert_eq!(buf, [2, 3, 4, 5, 6]);
        assert_eq!(stream.cached_chunks(), 2);
        assert!(!stream.is_finished());
        assert_eq!(stream.length().unwrap(), 9);
    }

    #[test]
    fn io_errors_propagate() {
        let stream = BackingStream::from_stream(Broken, None);
        let err = stream.availability(0, 1).unwrap_err();
        assert!(matches!(err, CursorError::IOError(_)));
        assert_eq!(stream.cached_chunks(), 0);
    }

    #[test]
    fn seekable_source_recovers_from_a_failed_fill() {
        // The second call fails after the first half of chunk 1 has been read.
        let stream = BackingStream::from_file_with_options(
            Flaky::new(sequence(16), 2),
            StreamOptions::default().with_chunk_size(4),
        )
        .unwrap();
        let mut cursor = stream.create_reader();

        let err = cursor.get_u32(Access::Indexed(4)).unwrap_err();
        assert!(matches!(err, CursorError::IOError(_)));
        assert_eq!(stream.cached_chunks(), 0);

        assert_eq!(cursor.get_u32(Access::Indexed(4)).unwrap(), 0x04050607);
        assert_eq!(cursor.get_u32(Access::Indexed(8)).unwrap(), 0x08090A0B);
        assert_eq!(cursor.get_u32(Access::Indexed(0)).unwrap(), 0x00010203);
        assert_eq!(stream.length().unwrap(), 16);
    }

    #[test]
    fn forward_source_stays_failed_after_a_failed_fill() {
        // Chunks 0 and 1 take calls 1 to 4; the fill of chunk 2 fails on call 5.
        let stream = BackingStream::from_stream_with_options(
            Flaky::new(sequence(16), 5),
            None,
            StreamOptions::default().with_chunk_size(4),
        );
        let mut cursor = stream.create_reader();
        assert_eq!(cursor.get_u32(Access::Indexed(0)).unwrap(), 0x00010203);
        assert_eq!(stream.cached_chunks(), 2);

        let err = cursor.get_u32(Access::Indexed(8)).unwrap_err();
        assert!(matches!(err, CursorError::IOError(_)));

        // The bytes pulled before the failure are gone, so nothing past them is served.
        let retry = cursor.get_u32(Access::Indexed(8)).unwrap_err();
        assert!(matches!(retry, CursorError::General(_)), "{retry}");
        assert!(stream.length().is_err());
        assert_eq!(stream.cached_chunks(), 2);
        assert!(!stream.is_finished());

        // What was cached before the failure is still good.
        assert_eq!(cursor.get_u32(Access::Indexed(4)).unwrap(), 0x04050607);
    }

    #[test]
    fn readers_share_the_cache() {
        let stream = forward(sequence(32), None, 8);
        let mut first = stream.create_reader();
        let second = stream.create_reader_at(4, Some(8), Endianness::LittleEndian).unwrap();
        first.skip(20).unwrap();
        assert_eq!(stream.total_bytes_read(), 24);
        assert_eq!(second.stream().total_bytes_read(), 24);

        assert!(stream.create_reader_at(-1, None, Endianness::BigEndian).is_err());
        assert!(stream.create_reader_at(0, Some(-1), Endianness::BigEndian).is_err());
    }
}
