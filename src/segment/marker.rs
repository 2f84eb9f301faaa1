//! JPEG marker codes used by the segment scanner.

/// Prefix byte of every marker.
pub const PREFIX: u8 = 0xFF;
/// Not a marker: a literal `0xFF` inside scan data, stuffed with a zero.
pub const STUFFING: u8 = 0x00;

pub const RST0: u8 = 0xD0;
pub const RST7: u8 = 0xD7;
/// Start of image
pub const SOI: u8 = 0xD8;
/// End of image
pub const EOI: u8 = 0xD9;
/// Start of scan
pub const SOS: u8 = 0xDA;
/// JFIF header. Structural for our purposes.
pub const APP0: u8 = 0xE0;
/// Usually EXIF or XMP.
pub const APP1: u8 = 0xE1;
/// Usually Adobe / copyright info.
pub const APP14: u8 = 0xEE;
/// Comment
pub const COM: u8 = 0xFE;

pub const SOI_PAIR: [u8; 2] = [PREFIX, SOI];
pub const EOI_PAIR: [u8; 2] = [PREFIX, EOI];

/// Whether a segment with this marker carries metadata (APP1..=APP14 or COM).
///
/// APP0 and APP15 are left alone: APP0 holds the JFIF header, which decoders
/// expect to stay with the image it describes.
pub fn is_metadata(marker: u8) -> bool {
    (APP1..=APP14).contains(&marker) || marker == COM
}

/// Restart markers only appear inside scan data and do not end it.
pub fn is_restart(marker: u8) -> bool {
    (RST0..=RST7).contains(&marker)
}

/// Whether `FF code` terminates a scan-data span.
///
/// Stuffed zeros, restart markers and `0xFF` fill bytes all stay inside
/// the span.
pub fn ends_scan_data(code: u8) -> bool {
    code != STUFFING && code != PREFIX && !is_restart(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_range() {
        for m in 0xE1..=0xEE {
            assert!(is_metadata(m), "APP marker {m:#04x} should be metadata");
        }
        assert!(is_metadata(COM));
    }

    #[test]
    fn structural_markers() {
        assert!(!is_metadata(APP0));
        assert!(!is_metadata(0xEF));
        assert!(!is_metadata(0xC0));
        assert!(!is_metadata(0xC4));
        assert!(!is_metadata(0xDB));
        assert!(!is_metadata(SOS));
    }

    #[test]
    fn scan_data_terminators() {
        assert!(!ends_scan_data(0x00));
        assert!(!ends_scan_data(0xFF));
        for rst in RST0..=RST7 {
            assert!(!ends_scan_data(rst));
        }
        assert!(ends_scan_data(0xC0));
        assert!(ends_scan_data(EOI));
        assert!(ends_scan_data(SOS));
    }
}
