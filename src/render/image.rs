// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Header probing for embeddable images.
//!
//! Only JPEG and PNG are recognised. Nothing is decoded; the renderers embed
//! the original bytes and need only the format and pixel size.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    /// Colour components (JPEG only; 1 = grey, 3 = RGB, 4 = CMYK).
    pub components: u8,
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Identify `bytes` as a JPEG or PNG and read its dimensions.
pub fn inspect(bytes: &[u8]) -> Option<ImageInfo> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        inspect_jpeg(bytes)
    } else if bytes.starts_with(&PNG_SIGNATURE) {
        inspect_png(bytes)
    } else {
        None
    }
}

fn inspect_png(bytes: &[u8]) -> Option<ImageInfo> {
    // Signature, then the IHDR chunk: length(4) type(4) width(4) height(4)
    if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    (width > 0 && height > 0).then_some(ImageInfo {
        kind: ImageKind::Png,
        width,
        height,
        components: 0,
    })
}

fn inspect_jpeg(bytes: &[u8]) -> Option<ImageInfo> {
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            // Fill byte
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
            pos += 2;
            continue;
        }

        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let segment = bytes.get(pos + 4..pos + 2 + len)?;
            if segment.len() < 6 {
                return None;
            }
            let height = u32::from(u16::from_be_bytes([segment[1], segment[2]]));
            let width = u32::from(u16::from_be_bytes([segment[3], segment[4]]));
            let components = segment[5];
            return (width > 0 && height > 0).then_some(ImageInfo {
                kind: ImageKind::Jpeg,
                width,
                height,
                components,
            });
        }
        pos += 2 + len;
    }
    None
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Minimal JPEG header: SOI, an APP0 stub, SOF0 for 4x2 RGB, EOI.
    pub fn tiny_jpeg() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        bytes.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x02, 0x00, 0x04, 0x03, 0x01, 0x22, 0x00, 0x02,
            0x11, 0x01, 0x03, 0x11, 0x01,
        ]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    /// PNG signature and IHDR for a 3x5 image.
    pub fn tiny_png() -> Vec<u8> {
        let mut bytes = super::PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x0D]);
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&3u32.to_be_bytes());
        bytes.extend_from_slice(&5u32.to_be_bytes());
        bytes.extend_from_slice(&[0x08, 0x06, 0x00, 0x00, 0x00]);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn reads_jpeg_dimensions() {
        let info = inspect(&tiny_jpeg()).unwrap();
        assert_eq!(info.kind, ImageKind::Jpeg);
        assert_eq!((info.width, info.height, info.components), (4, 2, 3));
    }

    #[test]
    fn reads_png_dimensions() {
        let info = inspect(&tiny_png()).unwrap();
        assert_eq!(info.kind, ImageKind::Png);
        assert_eq!((info.width, info.height), (3, 5));
    }

    #[test]
    fn rejects_other_data() {
        assert!(inspect(b"GIF89a....").is_none());
        assert!(inspect(&[0xFF, 0xD8, 0x00]).is_none());
        assert!(inspect(&[]).is_none());
    }
}
