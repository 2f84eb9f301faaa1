use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

use super::error::{ScanError, ScanState};
use super::marker;

/// What to do with bytes that follow the EOI marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailerPolicy {
    /// Fail with [`ScanError::UnexpectedTrailer`] if anything follows EOI.
    #[default]
    Reject,
    /// Stop reading at EOI and silently drop whatever follows.
    Strip,
}

/// Counters for a single scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub segments_kept: usize,
    pub segments_dropped: usize,
    pub scan_bytes_kept: u64,
    pub scan_bytes_dropped: u64,
}

/// Read side of the scanner: a byte source with a two-byte lookahead.
struct Lookahead<R> {
    inner: R,
    buf: [u8; 2],
    len: usize,
    offset: u64,
}

impl<R: Read> Lookahead<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            buf: [0; 2],
            len: 0,
            offset: 0,
        }
    }

    /// Offset of the next unconsumed byte.
    fn offset(&self) -> u64 {
        self.offset
    }

    /// Buffer up to `want` bytes. Returns how many are buffered.
    fn fill(&mut self, want: usize) -> io::Result<usize> {
        while self.len < want {
            match self.inner.read(&mut self.buf[self.len..want]) {
                Ok(0) => break,
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(self.len)
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
        self.offset += n as u64;
    }

    fn peek_pair(&mut self, state: ScanState) -> Result<[u8; 2], ScanError> {
        if self.fill(2)? < 2 {
            return Err(ScanError::Truncated {
                state,
                offset: self.offset + self.len as u64,
            });
        }
        Ok(self.buf)
    }

    fn read_pair(&mut self, state: ScanState) -> Result<[u8; 2], ScanError> {
        let pair = self.peek_pair(state)?;
        self.consume(2);
        Ok(pair)
    }

    fn has_more(&mut self) -> io::Result<bool> {
        Ok(self.fill(1)? > 0)
    }

    /// Move exactly `n` bytes from the source into `sink`, or discard them
    /// when there is no sink.
    fn copy_exact<W: Write + ?Sized>(
        &mut self,
        n: u64,
        mut sink: Option<&mut W>,
        state: ScanState,
    ) -> Result<(), ScanError> {
        // Anything still held in the lookahead buffer goes first.
        let buffered = (self.len as u64).min(n) as usize;
        if let Some(w) = sink.as_deref_mut() {
            w.write_all(&self.buf[..buffered]).map_err(ScanError::Write)?;
        }
        self.consume(buffered);

        let mut rest = n - buffered as u64;
        let mut chunk = [0u8; 8192];
        while rest > 0 {
            let want = rest.min(chunk.len() as u64) as usize;
            let got = match self.inner.read(&mut chunk[..want]) {
                Ok(0) => {
                    return Err(ScanError::Truncated {
                        state,
                        offset: self.offset,
                    });
                }
                Ok(got) => got,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ScanError::Io(e)),
            };
            if let Some(w) = sink.as_deref_mut() {
                w.write_all(&chunk[..got]).map_err(ScanError::Write)?;
            }
            self.offset += got as u64;
            rest -= got as u64;
        }
        Ok(())
    }
}

/// Walk a complete JPEG stream segment by segment and copy the selected parts.
///
/// `select` is called once per segment with its marker byte. When it returns
/// `true`, the marker, length field and payload are written to `sink` exactly
/// as read; otherwise they are consumed and dropped. The decision taken for
/// an SOS segment also applies to the scan data that follows it. SOI and EOI
/// themselves are never written.
///
/// The source is read in small pieces, so pass a buffered reader.
///
/// # Example
///
/// ```rust
/// use meta_swap::segment::{is_metadata, scan, TrailerPolicy};
///
/// let jpeg = [
///     0xFF, 0xD8,                         // SOI
///     0xFF, 0xFE, 0x00, 0x04, b'h', b'i', // COM "hi"
///     0xFF, 0xD9,                         // EOI
/// ];
/// let mut out = Vec::new();
/// let stats = scan(&jpeg[..], &mut out, is_metadata, TrailerPolicy::Reject).unwrap();
/// assert_eq!(out, &jpeg[2..8]);
/// assert_eq!(stats.segments_kept, 1);
/// ```
pub fn scan<R, W, F>(
    source: R,
    mut sink: W,
    select: F,
    trailer: TrailerPolicy,
) -> Result<ScanStats, ScanError>
where
    R: Read,
    W: Write,
    F: Fn(u8) -> bool,
{
    let mut src = Lookahead::new(source);
    let mut stats = ScanStats::default();

    if src.read_pair(ScanState::Start)? != marker::SOI_PAIR {
        return Err(ScanError::MissingStartMarker);
    }

    loop {
        let header_offset = src.offset();
        let [prefix, code] = src.read_pair(ScanState::SegmentHeader)?;
        if prefix != marker::PREFIX {
            return Err(ScanError::InvalidMarker {
                offset: header_offset,
                found: prefix,
            });
        }
        if code == marker::EOI {
            break;
        }
        if code == marker::STUFFING || code == marker::PREFIX {
            return Err(ScanError::InvalidMarker {
                offset: header_offset + 1,
                found: code,
            });
        }

        let length_field = src.read_pair(ScanState::SegmentBody)?;
        let length = u16::from_be_bytes(length_field);
        if length < 2 {
            return Err(ScanError::InvalidLength {
                marker: code,
                offset: header_offset,
                length,
            });
        }

        let keep = select(code);
        if keep {
            sink.write_all(&[prefix, code])
                .and_then(|()| sink.write_all(&length_field))
                .map_err(ScanError::Write)?;
            stats.segments_kept += 1;
        } else {
            stats.segments_dropped += 1;
        }
        // The length field counts itself.
        src.copy_exact(
            u64::from(length - 2),
            keep.then_some(&mut sink),
            ScanState::SegmentBody,
        )?;

        if code == marker::SOS {
            skip_scan_data(&mut src, &mut sink, keep, &mut stats)?;
        }
    }

    if trailer == TrailerPolicy::Reject && src.has_more()? {
        return Err(ScanError::UnexpectedTrailer {
            offset: src.offset(),
        });
    }

    Ok(stats)
}

/// Step over entropy-coded data up to (not including) the next real marker.
fn skip_scan_data<R: Read, W: Write>(
    src: &mut Lookahead<R>,
    sink: &mut W,
    keep: bool,
    stats: &mut ScanStats,
) -> Result<(), ScanError> {
    loop {
        let [first, second] = src.peek_pair(ScanState::ScanData)?;
        if first == marker::PREFIX && marker::ends_scan_data(second) {
            return Ok(());
        }
        if keep {
            sink.write_all(&[first]).map_err(ScanError::Write)?;
            stats.scan_bytes_kept += 1;
        } else {
            stats.scan_bytes_dropped += 1;
        }
        src.consume(1);
    }
}
