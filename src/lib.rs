//! # meta-swap
//!
//! Replace or strip the metadata of JPEG images without re-encoding them.
//! EXIF, XMP, IPTC, ICC profiles and comments (APP1..=APP14 and COM segments)
//! are copied from a source image onto a destination image, or removed
//! entirely. Everything else, including the entropy-coded scan data, is copied
//! byte for byte.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meta_swap::config::Config;
//! use meta_swap::pipeline::replace_metadata;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("meta-swap.json".as_ref()))?;
//!
//!     // Give `edited.jpg` the metadata of `original.jpg`
//!     replace_metadata(Path::new("edited.jpg"), Some(Path::new("original.jpg")), &config)?;
//!
//!     // Strip `upload.jpg`
//!     replace_metadata(Path::new("upload.jpg"), None, &config)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The merge works on any reader and writer:
//!
//! ```rust
//! use meta_swap::merge::merge;
//! use meta_swap::segment::TrailerPolicy;
//!
//! let donor = [0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x03, b'!', 0xFF, 0xD9];
//! let image = [0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x03, 0x00, 0xFF, 0xD9];
//!
//! let mut out = Vec::new();
//! merge(&mut out, &image[..], Some(&donor[..]), TrailerPolicy::Reject).unwrap();
//! assert_eq!(
//!     out,
//!     [0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x03, b'!', 0xFF, 0xDB, 0x00, 0x03, 0x00, 0xFF, 0xD9]
//! );
//! ```
//!
//! ## Modules
//!
//! - [`segment`] — Segment stream scanner and marker classification
//! - [`merge`] — Combine a donor's metadata with an image's structure
//! - [`pipeline`] — In-place file rewriting with a backup
//! - [`config`] — Configuration types and loading/saving

pub mod config;
pub mod merge;
pub mod pipeline;
pub mod segment;
