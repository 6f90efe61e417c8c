//! Error types for firmware image handling.
//!
//! One closed error enum covers the whole crate. Parse-time CRC findings are
//! usually recorded as notes on the report instead of being raised; the
//! variants here are what operations return when they actually stop.

use thiserror::Error;

/// Primary error type for firmware image operations.
#[derive(Debug, Error)]
pub enum FwError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A requested offset or length exceeds the image.
    #[error("Read out of range: offset 0x{offset:X} + 0x{len:X} exceeds image length 0x{image_len:X}")]
    OutOfRange {
        /// Start of the requested range.
        offset: u64,
        /// Length of the requested range.
        len: u64,
        /// Total image length.
        image_len: u64,
    },

    /// No candidate offset holds the magic pattern.
    #[error("Magic pattern not found at any candidate offset")]
    MagicNotFound,

    /// A table header signature word does not match its expected value.
    #[error("Bad signature at 0x{offset:X}: expected 0x{expected:08X}, got 0x{actual:08X}")]
    BadSignature {
        /// Signature the header should carry.
        expected: u32,
        /// Word found in the image.
        actual: u32,
        /// Absolute byte offset of the word.
        offset: u64,
    },

    /// A computed CRC disagrees with a stored one. `expected` is the stored
    /// value, `actual` the recomputed one.
    #[error("{context}: CRC mismatch: expected 0x{expected:04X}, actual 0x{actual:04X}")]
    CrcMismatch {
        /// Stored CRC.
        expected: u16,
        /// Recomputed CRC.
        actual: u16,
        /// What was being checked.
        context: String,
    },

    /// A stored CRC is the uninitialised sentinel `0xFFFF`.
    #[error("{context}: CRC is blank (0xFFFF)")]
    CrcBlank {
        /// What was being checked.
        context: String,
    },

    /// A rewrite would exceed the canonical image size.
    #[error("Rewrite exceeds size limit: needs 0x{needed:X} bytes, limit 0x{limit:X}")]
    SizeLimit {
        /// Bytes the rewritten image would occupy.
        needed: u64,
        /// Canonical size ceiling.
        limit: u64,
    },

    /// A section size is not a multiple of 4 where its CRC mode requires it.
    #[error("Section {name}: size 0x{size:X} is not dword-aligned")]
    UnalignedSection {
        /// Section display name.
        name: String,
        /// Offending size in bytes.
        size: u64,
    },

    /// An entry's type byte is not in the registry. Non-fatal during parsing;
    /// the section is still listed generically.
    #[error("Unknown section type 0x{code:04X}")]
    UnknownSectionType {
        /// Type code found in the entry.
        code: u16,
    },

    /// A fixed-layout record could not be interpreted.
    #[error("Parse failed: {message}")]
    ParseFailed {
        /// What could not be interpreted.
        message: String,
    },
}

impl FwError {
    /// Shorthand for a `ParseFailed` with a formatted message.
    pub fn parse(message: impl Into<String>) -> Self {
        FwError::ParseFailed {
            message: message.into(),
        }
    }
}

/// Result type alias for firmware operations.
pub type Result<T> = std::result::Result<T, FwError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_display() {
        let err = FwError::OutOfRange {
            offset: 0x100,
            len: 0x20,
            image_len: 0x110,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x100"));
        assert!(msg.contains("0x110"));
    }

    #[test]
    fn test_crc_mismatch_display() {
        let err = FwError::CrcMismatch {
            expected: 0xBEEF,
            actual: 0x1234,
            context: "ITOC header".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ITOC header"));
        assert!(msg.contains("BEEF"));
        assert!(msg.contains("1234"));
    }

    #[test]
    fn test_io_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FwError = io.into();
        assert!(matches!(err, FwError::Io(_)));
    }
}
