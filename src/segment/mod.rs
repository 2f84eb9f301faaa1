//! JPEG segment stream scanning.
//!
//! The scanner walks a JPEG file marker by marker without decoding any image
//! data. It copies the segments a caller selects and steps over scan data,
//! telling real markers apart from stuffed bytes and restart markers.
//!
//! - [`scan`] — run one filtered pass over a stream
//! - [`is_metadata`] — the APP1..=APP14 / COM classification used for merging

mod error;
pub mod marker;
mod scanner;

pub use error::{ScanError, ScanState};
pub use marker::is_metadata;
pub use scanner::{scan, ScanStats, TrailerPolicy};
