/// Default number of bytes fetched from a source per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Configuration for a [`BackingStream`][super::BackingStream].
///
/// ```
/// use media_cursor::stream::StreamOptions;
///
/// let options = StreamOptions::default().with_chunk_size(4096);
/// assert_eq!(options.chunk_size(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    chunk_size: usize,
}

impl StreamOptions {
    /// Set the chunk size. A chunk size of zero is raised to one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// The number of bytes fetched from the source per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
