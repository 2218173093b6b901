//! Text decoding for string reads.

/// Turns raw bytes into text.
///
/// Decoding never fails: bytes that are invalid in the charset are replaced rather than
/// reported, since metadata strings in the wild are routinely malformed.
pub trait Charset {
    /// Decode `bytes` into a string.
    fn decode(&self, bytes: &[u8]) -> String;
}

/// UTF-8, with invalid sequences replaced by U+FFFD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Utf8;

impl Charset for Utf8 {
    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// ISO-8859-1, where every byte is the code point of the same value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latin1;

impl Charset for Latin1 {
    fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().copied().map(char::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8() {
        assert_eq!(Utf8.decode("Größe".as_bytes()), "Größe");
        assert_eq!(Utf8.decode(&[b'a', 0xFF, b'b']), "a\u{fffd}b");
        assert_eq!(Utf8.decode(&[]), "");
    }

    #[test]
    fn latin1() {
        assert_eq!(Latin1.decode(&[b'G', 0x72, 0xF6, 0xDF, 0x65]), "Größe");
        assert_eq!(Latin1.decode(&[0xA9]), "\u{a9}");
    }
}
