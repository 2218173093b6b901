//! The chunked byte cache that cursors read through.
//!
//! A [`BackingStream`] owns exactly one source and caches what it reads from it in fixed-size
//! chunks. Any number of [`ReaderCursor`][crate::ReaderCursor]s can view the same stream; they
//! share its cache, so a structure that several nested parsers look at is only fetched once.
//!
//! ### Sources
//!
//! - [`BackingStream::from_file`] takes anything that is [`Read`][std::io::Read] +
//!   [`Seek`][std::io::Seek]. Chunks are fetched in whatever order they are requested.
//! - [`BackingStream::from_bytes`] wraps a fully resident buffer. The whole buffer is a single
//!   chunk and no copying happens.
//! - [`BackingStream::from_stream`] takes a forward-only [`Read`][std::io::Read], whose length
//!   may be unknown. Chunks are fetched strictly in order and the source is never rewound: bytes
//!   behind the furthest point read so far are served from the cache.
//!
//! ### Memory
//!
//! Chunks are never evicted. For a forward-only stream of unbounded size the cache grows with
//! everything that has been read from it.

mod backing;
mod options;

pub use backing::BackingStream;
pub use options::{StreamOptions, DEFAULT_CHUNK_SIZE};
