use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::segment::{self, marker, ScanError, ScanStats, TrailerPolicy};

/// Which input stream a merge error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// The image whose metadata is being copied.
    Donor,
    /// The image whose structure and scan data end up in the output.
    Image,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Donor => f.write_str("metadata source"),
            Self::Image => f.write_str("destination image"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to read {role}")]
    Scan {
        role: StreamRole,
        #[source]
        source: ScanError,
    },

    #[error("failed to write output")]
    Output(#[from] io::Error),
}

impl MergeError {
    /// Attribute a scan failure to `role`, unless it was the output that failed.
    fn from_scan(role: StreamRole, err: ScanError) -> Self {
        match err {
            ScanError::Write(e) => Self::Output(e),
            source => Self::Scan { role, source },
        }
    }

    /// The underlying scan error, if the failure came from one of the inputs.
    pub fn scan_error(&self) -> Option<&ScanError> {
        match self {
            Self::Scan { source, .. } => Some(source),
            Self::Output(_) => None,
        }
    }
}

/// Per-stream counters from a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// `None` when metadata was stripped rather than replaced.
    pub donor: Option<ScanStats>,
    pub image: ScanStats,
}

/// Write `image` to `sink` with its metadata replaced by that of `donor`.
///
/// The output is SOI, the donor's metadata segments in their original order,
/// every non-metadata segment and all scan data of `image`, then EOI. With no
/// donor the image's metadata is simply dropped. The donor is read to the end
/// before `image` is touched, and both are held to the same structural and
/// trailer rules.
///
/// `sink` is flushed before returning.
pub fn merge<W, I, D>(
    mut sink: W,
    image: I,
    donor: Option<D>,
    trailer: TrailerPolicy,
) -> Result<MergeStats, MergeError>
where
    W: Write,
    I: Read,
    D: Read,
{
    let is_metadata = segment::is_metadata;

    sink.write_all(&marker::SOI_PAIR)?;

    let donor_stats = match donor {
        Some(donor) => {
            let stats = segment::scan(donor, &mut sink, is_metadata, trailer)
                .map_err(|e| MergeError::from_scan(StreamRole::Donor, e))?;
            log::debug!(
                "Donor: kept {} metadata segment(s), skipped {}",
                stats.segments_kept,
                stats.segments_dropped
            );
            Some(stats)
        }
        None => None,
    };

    let image_stats = segment::scan(image, &mut sink, |m| !is_metadata(m), trailer)
        .map_err(|e| MergeError::from_scan(StreamRole::Image, e))?;
    log::debug!(
        "Image: kept {} segment(s) and {} scan byte(s), dropped {} metadata segment(s)",
        image_stats.segments_kept,
        image_stats.scan_bytes_kept,
        image_stats.segments_dropped
    );

    sink.write_all(&marker::EOI_PAIR)?;
    sink.flush()?;

    Ok(MergeStats {
        donor: donor_stats,
        image: image_stats,
    })
}

/// [`merge`] without a donor: drop all metadata from `image`.
pub fn strip<W: Write, I: Read>(
    sink: W,
    image: I,
    trailer: TrailerPolicy,
) -> Result<MergeStats, MergeError> {
    merge(sink, image, None::<io::Empty>, trailer)
}
