use std::fmt;
use std::io;
use thiserror::Error;

/// Where the scanner was when it ran out of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Start,
    SegmentHeader,
    SegmentBody,
    ScanData,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start of image",
            Self::SegmentHeader => "segment marker",
            Self::SegmentBody => "segment body",
            Self::ScanData => "scan data",
        };
        f.write_str(name)
    }
}

/// Structural errors raised while walking a JPEG segment stream.
///
/// Offsets are byte positions in the source stream.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("not a JPEG stream: missing SOI marker")]
    MissingStartMarker,

    #[error("invalid marker at offset {offset}: found {found:#04x}")]
    InvalidMarker { offset: u64, found: u8 },

    #[error("segment 0xFF{marker:02X} at offset {offset} has invalid length {length}")]
    InvalidLength { marker: u8, offset: u64, length: u16 },

    #[error("unexpected trailer after EOI at offset {offset}")]
    UnexpectedTrailer { offset: u64 },

    #[error("stream truncated in {state} at offset {offset}")]
    Truncated { state: ScanState, offset: u64 },

    /// Reading the source failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Writing to the sink failed. Kept apart from [`ScanError::Io`] so
    /// callers can tell a bad input from a bad output.
    #[error("failed to write selected bytes")]
    Write(#[source] io::Error),
}
