//! Header probing for encoded camera images.
//!
//! Cameras send each still image as one binary frame containing a complete
//! JPEG, PNG, or BMP file.  Full pixel decoding and pose estimation happen in
//! an external collaborator; the hub itself only needs to know whether a frame
//! *looks like* an image and what its dimensions are.  This module reads just
//! enough of the header to answer that:
//!
//! | Format | Signature            | Dimensions read from           |
//! |--------|----------------------|--------------------------------|
//! | PNG    | `89 50 4E 47 ...`    | IHDR chunk (big-endian u32)    |
//! | JPEG   | `FF D8`              | first SOFn segment (BE u16)    |
//! | BMP    | `42 4D` (`"BM"`)     | DIB header (little-endian i32) |

use std::fmt;

use thiserror::Error;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Encoded image container formats recognised by [`probe_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Bmp,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Bmp => "BMP",
        })
    }
}

/// Dimensions and encoding of a probed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Reasons a buffer is not a usable encoded image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageProbeError {
    #[error("empty image buffer")]
    Empty,

    #[error("unrecognised image signature")]
    UnknownFormat,

    #[error("truncated {format} header")]
    Truncated { format: ImageFormat },

    #[error("corrupt {format} header")]
    Corrupt { format: ImageFormat },

    #[error("{format} header reports zero dimensions")]
    ZeroDimensions { format: ImageFormat },
}

/// Identifies the format of `data` and reads its dimensions.
///
/// # Errors
///
/// Returns an [`ImageProbeError`] when the buffer is empty, has no known
/// signature, or its header is truncated, corrupt, or reports a zero width or
/// height.
///
/// # Example
///
/// ```rust
/// use carehub_core::{probe_image, ImageProbeError};
///
/// assert_eq!(probe_image(b"not an image"), Err(ImageProbeError::UnknownFormat));
/// ```
pub fn probe_image(data: &[u8]) -> Result<FrameGeometry, ImageProbeError> {
    if data.is_empty() {
        return Err(ImageProbeError::Empty);
    }
    if data.starts_with(&PNG_SIGNATURE) {
        probe_png(data)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        probe_jpeg(data)
    } else if data.starts_with(b"BM") {
        probe_bmp(data)
    } else {
        Err(ImageProbeError::UnknownFormat)
    }
}

fn geometry(
    format: ImageFormat,
    width: u32,
    height: u32,
) -> Result<FrameGeometry, ImageProbeError> {
    if width == 0 || height == 0 {
        return Err(ImageProbeError::ZeroDimensions { format });
    }
    Ok(FrameGeometry {
        format,
        width,
        height,
    })
}

fn probe_png(data: &[u8]) -> Result<FrameGeometry, ImageProbeError> {
    let format = ImageFormat::Png;
    // signature(8) + chunk length(4) + "IHDR"(4) + width(4) + height(4)
    if data.len() < 24 {
        return Err(ImageProbeError::Truncated { format });
    }
    if &data[12..16] != b"IHDR" {
        return Err(ImageProbeError::Corrupt { format });
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    geometry(format, width, height)
}

fn probe_bmp(data: &[u8]) -> Result<FrameGeometry, ImageProbeError> {
    let format = ImageFormat::Bmp;
    // file header(14) + DIB size(4) + width(4) + height(4)
    if data.len() < 26 {
        return Err(ImageProbeError::Truncated { format });
    }
    let width = i32::from_le_bytes([data[18], data[19], data[20], data[21]]);
    // Negative height marks a top-down bitmap.
    let height = i32::from_le_bytes([data[22], data[23], data[24], data[25]]);
    if width < 0 {
        return Err(ImageProbeError::Corrupt { format });
    }
    geometry(format, width.unsigned_abs(), height.unsigned_abs())
}

/// SOF0..SOF15, excluding DHT (C4), JPG (C8) and DAC (CC).
fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn probe_jpeg(data: &[u8]) -> Result<FrameGeometry, ImageProbeError> {
    let format = ImageFormat::Jpeg;
    let mut i = 2;

    while i + 1 < data.len() {
        if data[i] != 0xFF {
            return Err(ImageProbeError::Corrupt { format });
        }
        let marker = data[i + 1];
        match marker {
            // Fill byte preceding a marker.
            0xFF => {
                i += 1;
                continue;
            }
            // Stand-alone markers carry no length field.
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            // End of image or start of scan before any frame header.
            0xD9 | 0xDA => return Err(ImageProbeError::Corrupt { format }),
            _ => {}
        }

        if i + 4 > data.len() {
            break;
        }
        let segment_len = usize::from(u16::from_be_bytes([data[i + 2], data[i + 3]]));
        if segment_len < 2 {
            return Err(ImageProbeError::Corrupt { format });
        }

        if is_start_of_frame(marker) {
            // FF Cn | length(2) | precision(1) | height(2) | width(2)
            if i + 9 > data.len() {
                break;
            }
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]);
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]);
            return geometry(format, u32::from(width), u32::from(height));
        }

        i += 2 + segment_len;
    }

    Err(ImageProbeError::Truncated { format })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut buf = PNG_SIGNATURE.to_vec();
        buf.extend_from_slice(&13u32.to_be_bytes());
        buf.extend_from_slice(b"IHDR");
        buf.extend_from_slice(&width.to_be_bytes());
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&[8, 2, 0, 0, 0]);
        buf
    }

    fn jpeg_header(width: u16, height: u16) -> Vec<u8> {
        let mut buf = vec![0xFF, 0xD8];
        // APP0 segment with a 16-byte body (length field counts itself)
        buf.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        buf.extend_from_slice(b"JFIF\0");
        buf.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
        // SOF0
        buf.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&width.to_be_bytes());
        buf.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        buf
    }

    fn bmp_header(width: i32, height: i32) -> Vec<u8> {
        let mut buf = b"BM".to_vec();
        buf.extend_from_slice(&[0u8; 12]);
        buf.extend_from_slice(&40u32.to_le_bytes());
        buf.extend_from_slice(&width.to_le_bytes());
        buf.extend_from_slice(&height.to_le_bytes());
        buf
    }

    #[test]
    fn test_probe_png_reads_ihdr_dimensions() {
        let geometry = probe_image(&png_header(640, 480)).unwrap();
        assert_eq!(geometry.format, ImageFormat::Png);
        assert_eq!((geometry.width, geometry.height), (640, 480));
    }

    #[test]
    fn test_probe_png_truncated() {
        let data = &png_header(640, 480)[..20];
        assert_eq!(
            probe_image(data),
            Err(ImageProbeError::Truncated {
                format: ImageFormat::Png
            })
        );
    }

    #[test]
    fn test_probe_png_missing_ihdr_is_corrupt() {
        let mut data = png_header(640, 480);
        data[12..16].copy_from_slice(b"IDAT");
        assert_eq!(
            probe_image(&data),
            Err(ImageProbeError::Corrupt {
                format: ImageFormat::Png
            })
        );
    }

    #[test]
    fn test_probe_jpeg_skips_app_segments_to_sof() {
        let geometry = probe_image(&jpeg_header(1280, 720)).unwrap();
        assert_eq!(geometry.format, ImageFormat::Jpeg);
        assert_eq!((geometry.width, geometry.height), (1280, 720));
    }

    #[test]
    fn test_probe_jpeg_soi_only_is_truncated() {
        assert_eq!(
            probe_image(&[0xFF, 0xD8]),
            Err(ImageProbeError::Truncated {
                format: ImageFormat::Jpeg
            })
        );
    }

    #[test]
    fn test_probe_jpeg_scan_before_frame_header_is_corrupt() {
        let data = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x08];
        assert_eq!(
            probe_image(&data),
            Err(ImageProbeError::Corrupt {
                format: ImageFormat::Jpeg
            })
        );
    }

    #[test]
    fn test_probe_jpeg_garbage_after_soi_is_corrupt() {
        let data = [0xFF, 0xD8, 0x12, 0x34, 0x56];
        assert!(matches!(
            probe_image(&data),
            Err(ImageProbeError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_probe_bmp_top_down_height_is_absolute() {
        let geometry = probe_image(&bmp_header(320, -240)).unwrap();
        assert_eq!(geometry.format, ImageFormat::Bmp);
        assert_eq!((geometry.width, geometry.height), (320, 240));
    }

    #[test]
    fn test_probe_zero_dimensions_rejected() {
        assert_eq!(
            probe_image(&png_header(0, 480)),
            Err(ImageProbeError::ZeroDimensions {
                format: ImageFormat::Png
            })
        );
    }

    #[test]
    fn test_probe_empty_and_unknown() {
        assert_eq!(probe_image(&[]), Err(ImageProbeError::Empty));
        assert_eq!(
            probe_image(b"hello camera"),
            Err(ImageProbeError::UnknownFormat)
        );
    }
}
