//! Pointer shape decoding.
//!
//! The duplication interface delivers pointer shapes in three formats.
//! Color shapes are 32-bit BGRA and pass through unchanged. Masked-color
//! shapes are BGRA with a per-pixel "screen" flag in the top byte; those
//! pixels become fully transparent. Monochrome shapes are a 1-bit AND
//! mask stacked above a 1-bit XOR mask and are expanded into BGRA words,
//! reproducing the classic inverted-cursor edge contrast.

use crate::error::{CaptureError, CaptureResult};

const BLACK: u32 = 0xFF00_0000;
const WHITE: u32 = 0xFFFF_FFFF;
const TRANSPARENT: u32 = 0;

/// Pointer shape format, as reported by the duplication interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorShapeKind {
    Monochrome,
    Color,
    MaskedColor,
}

impl CursorShapeKind {
    /// Map the raw DXGI_OUTDUPL_POINTER_SHAPE_TYPE value
    /// (1 = monochrome, 2 = color, 4 = masked color).
    pub fn from_dxgi(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Monochrome),
            2 => Some(Self::Color),
            4 => Some(Self::MaskedColor),
            _ => None,
        }
    }
}

/// A raw pointer shape as delivered by the capture source.
///
/// For monochrome shapes `height` is the stacked mask height, double the
/// final image height. `pitch` is the byte stride of one mask row.
#[derive(Clone, Debug)]
pub struct CursorShape {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub kind: CursorShapeKind,
    pub data: Vec<u8>,
}

/// A decoded 32-bit cursor image ready for texture upload.
#[derive(Clone, Debug)]
pub struct CursorImage {
    pub width: u32,
    pub height: u32,
    /// Byte stride of one row of `data`.
    pub pitch: u32,
    /// BGRA pixel data, `pitch * height` bytes.
    pub data: Vec<u8>,
}

/// Decode a raw pointer shape into a BGRA image.
pub fn decode_cursor_shape(shape: CursorShape) -> CaptureResult<CursorImage> {
    match shape.kind {
        CursorShapeKind::Color => decode_passthrough(shape),
        CursorShapeKind::MaskedColor => decode_masked_color(shape),
        CursorShapeKind::Monochrome => decode_monochrome(shape),
    }
}

fn check_color_layout(shape: &CursorShape) -> CaptureResult<()> {
    let required = (shape.pitch as usize)
        .checked_mul(shape.height as usize)
        .filter(|&required| shape.data.len() >= required && shape.pitch >= shape.width * 4)
        .is_some();
    if !required {
        return Err(CaptureError::InvalidCursorShape(format!(
            "{}x{} color shape with pitch {} does not fit {} bytes",
            shape.width,
            shape.height,
            shape.pitch,
            shape.data.len()
        )));
    }
    Ok(())
}

fn decode_passthrough(shape: CursorShape) -> CaptureResult<CursorImage> {
    check_color_layout(&shape)?;
    Ok(CursorImage {
        width: shape.width,
        height: shape.height,
        pitch: shape.pitch,
        data: shape.data,
    })
}

fn decode_masked_color(mut shape: CursorShape) -> CaptureResult<CursorImage> {
    check_color_layout(&shape)?;
    // A set top byte marks a "screen" pixel; it renders as fully
    // transparent. Everything else passes through unchanged.
    for pixel in shape.data.chunks_exact_mut(4) {
        if pixel[3] != 0 {
            pixel.fill(0);
        }
    }
    Ok(CursorImage {
        width: shape.width,
        height: shape.height,
        pitch: shape.pitch,
        data: shape.data,
    })
}

fn decode_monochrome(shape: CursorShape) -> CaptureResult<CursorImage> {
    let width = shape.width as usize;
    let height = (shape.height / 2) as usize;
    let pitch = shape.pitch as usize;

    let mask_bytes = pitch
        .checked_mul(height)
        .ok_or_else(|| CaptureError::InvalidCursorShape("mask size overflow".into()))?;
    if shape.data.len() < mask_bytes * 2 || pitch * 8 < width {
        return Err(CaptureError::InvalidCursorShape(format!(
            "{}x{} monochrome shape with pitch {} does not fit {} bytes",
            shape.width,
            shape.height,
            shape.pitch,
            shape.data.len()
        )));
    }

    let (and_mask, rest) = shape.data.split_at(mask_bytes);
    let xor_mask = &rest[..mask_bytes];

    let mut pixels = vec![TRANSPARENT; width * height];

    // Row-major, MSB-first scan order. The inverse case reads and writes
    // the in-progress buffer, so the order is part of the contract.
    for row in 0..height {
        for col in 0..width {
            let byte = row * pitch + col / 8;
            let bit = 7 - (col % 8);
            let and_bit = (and_mask[byte] >> bit) & 1;
            let xor_bit = (xor_mask[byte] >> bit) & 1;

            let index = row * width + col;
            match and_bit + 2 * xor_bit {
                0 => pixels[index] = BLACK,
                2 => pixels[index] = WHITE,
                1 => {} // transparent, buffer starts zeroed
                _ => {
                    // Inverse: the pixel becomes white, and black bleeds
                    // into orthogonal neighbors that are still transparent
                    // so the cursor stays visible on white backgrounds.
                    if row > 0 && pixels[index - width] == TRANSPARENT {
                        pixels[index - width] = BLACK;
                    }
                    if col > 0 && pixels[index - 1] == TRANSPARENT {
                        pixels[index - 1] = BLACK;
                    }
                    if col + 1 < width && pixels[index + 1] == TRANSPARENT {
                        pixels[index + 1] = BLACK;
                    }
                    if row + 1 < height && pixels[index + width] == TRANSPARENT {
                        pixels[index + width] = BLACK;
                    }
                    pixels[index] = WHITE;
                }
            }
        }
    }

    let mut data = Vec::with_capacity(pixels.len() * 4);
    for pixel in pixels {
        data.extend_from_slice(&pixel.to_le_bytes());
    }

    Ok(CursorImage {
        width: shape.width,
        height: height as u32,
        pitch: shape.width * 4,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(image: &CursorImage, x: usize, y: usize) -> u32 {
        let offset = y * image.pitch as usize + x * 4;
        u32::from_le_bytes(image.data[offset..offset + 4].try_into().unwrap())
    }

    fn monochrome(width: u32, pitch: u32, and_rows: &[u8], xor_rows: &[u8]) -> CursorShape {
        assert_eq!(and_rows.len(), xor_rows.len());
        let mut data = and_rows.to_vec();
        data.extend_from_slice(xor_rows);
        CursorShape {
            width,
            height: (and_rows.len() as u32 / pitch) * 2,
            pitch,
            kind: CursorShapeKind::Monochrome,
            data,
        }
    }

    #[test]
    fn color_shape_passes_through() {
        let bytes: Vec<u8> = (0..32).collect();
        let shape = CursorShape {
            width: 2,
            height: 4,
            pitch: 8,
            kind: CursorShapeKind::Color,
            data: bytes.clone(),
        };
        let image = decode_cursor_shape(shape).unwrap();
        assert_eq!(image.data, bytes);
        assert_eq!((image.width, image.height, image.pitch), (2, 4, 8));
    }

    #[test]
    fn masked_color_zeroes_flagged_pixels_only() {
        // Two pixels: first has the top byte set, second does not.
        let shape = CursorShape {
            width: 2,
            height: 1,
            pitch: 8,
            kind: CursorShapeKind::MaskedColor,
            data: vec![0x10, 0x20, 0x30, 0xFF, 0x11, 0x22, 0x33, 0x00],
        };
        let image = decode_cursor_shape(shape).unwrap();
        assert_eq!(&image.data[..4], &[0, 0, 0, 0]);
        assert_eq!(&image.data[4..], &[0x11, 0x22, 0x33, 0x00]);
    }

    #[test]
    fn monochrome_height_halves_and_black_decodes() {
        // AND = 0, XOR = 0 -> opaque black everywhere.
        let shape = monochrome(2, 1, &[0x00, 0x00], &[0x00, 0x00]);
        let image = decode_cursor_shape(shape).unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.data.len(), 2 * 2 * 4);
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(pixel(&image, x, y), BLACK);
            }
        }
    }

    #[test]
    fn monochrome_and_bit_is_transparent() {
        // AND = 1, XOR = 0 -> the desktop shows through.
        let shape = monochrome(2, 1, &[0xFF, 0xFF], &[0x00, 0x00]);
        let image = decode_cursor_shape(shape).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(pixel(&image, x, y), TRANSPARENT);
            }
        }
    }

    #[test]
    fn monochrome_xor_bit_is_white() {
        let shape = monochrome(2, 1, &[0x00, 0x00], &[0xFF, 0xFF]);
        let image = decode_cursor_shape(shape).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(pixel(&image, x, y), WHITE);
            }
        }
    }

    #[test]
    fn inverse_pixel_bleeds_black_into_transparent_neighbors() {
        // 3x2 image, everything transparent except an inverse pixel at
        // (1, 0): AND rows all ones, XOR bit set only at column 1, row 0.
        let shape = monochrome(3, 1, &[0xFF, 0xFF], &[0x40, 0x00]);
        let image = decode_cursor_shape(shape).unwrap();
        assert_eq!(pixel(&image, 1, 0), WHITE);
        assert_eq!(pixel(&image, 0, 0), BLACK);
        assert_eq!(pixel(&image, 2, 0), BLACK);
        assert_eq!(pixel(&image, 1, 1), BLACK);
        assert_eq!(pixel(&image, 0, 1), TRANSPARENT);
        assert_eq!(pixel(&image, 2, 1), TRANSPARENT);
    }

    #[test]
    fn inverse_bleed_respects_scan_order() {
        // Two adjacent inverse pixels. Visiting (0, 0) bleeds black into
        // (1, 0); visiting (1, 0) then overwrites itself with white and
        // leaves (0, 0) alone because it is no longer transparent.
        let shape = monochrome(2, 1, &[0xC0], &[0xC0]);
        let image = decode_cursor_shape(shape).unwrap();
        assert_eq!(pixel(&image, 0, 0), WHITE);
        assert_eq!(pixel(&image, 1, 0), WHITE);
    }

    #[test]
    fn inverse_pixel_at_border_skips_out_of_bounds_neighbors() {
        // Single-pixel image, inverse. No neighbor exists; only the
        // pixel itself is written.
        let shape = monochrome(1, 1, &[0x80], &[0x80]);
        let image = decode_cursor_shape(shape).unwrap();
        assert_eq!((image.width, image.height), (1, 1));
        assert_eq!(pixel(&image, 0, 0), WHITE);
    }

    #[test]
    fn monochrome_pitch_padding_bits_are_ignored() {
        // Width 2 with pitch 2: 14 pad bits per row. Pad bits are set to
        // ones and must not shear or extend the image.
        let shape = monochrome(2, 2, &[0x3F, 0xFF, 0x3F, 0xFF], &[0x3F, 0xFF, 0x3F, 0xFF]);
        let image = decode_cursor_shape(shape).unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        // First two bits of every row are AND=0, XOR=0 -> black.
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(pixel(&image, x, y), BLACK);
            }
        }
    }

    #[test]
    fn undersized_monochrome_buffer_is_rejected() {
        let shape = CursorShape {
            width: 32,
            height: 64,
            pitch: 4,
            kind: CursorShapeKind::Monochrome,
            data: vec![0; 16],
        };
        assert!(matches!(
            decode_cursor_shape(shape),
            Err(CaptureError::InvalidCursorShape(_))
        ));
    }

    #[test]
    fn shape_kind_mapping() {
        assert_eq!(CursorShapeKind::from_dxgi(1), Some(CursorShapeKind::Monochrome));
        assert_eq!(CursorShapeKind::from_dxgi(2), Some(CursorShapeKind::Color));
        assert_eq!(CursorShapeKind::from_dxgi(4), Some(CursorShapeKind::MaskedColor));
        assert_eq!(CursorShapeKind::from_dxgi(3), None);
    }
}
