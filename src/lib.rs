#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod charset;
pub mod cursor;
pub mod error;
pub mod reader;
pub mod sequential;
pub mod stream;

pub use charset::{Charset, Latin1, Utf8};
pub use cursor::{Access, ReaderCursor};
pub use error::{CursorError, CursorResult};
pub use reader::Endianness;
pub use sequential::{SequentialRead, SequentialReader};
pub use stream::{BackingStream, StreamOptions};
