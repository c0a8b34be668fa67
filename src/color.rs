//! RGB → YUV conversion matrices for the supported broadcast standards.
//!
//! The matrix is uploaded verbatim as a 48-byte GPU constant buffer; the
//! luma and chroma pixel shaders take a `dot` of each row against the
//! sampled RGB value and add the row's bias term.

/// Color standard selecting the conversion primaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Colorspace {
    Bt601,
    Bt709,
    Bt2020,
}

impl Colorspace {
    /// Map the swscale-style integer codes used by the encoder control
    /// surface (5 = SMPTE 170M, 1 = ITU-R 709, 9 = BT.2020).
    pub fn from_sws_code(code: u32) -> Option<Self> {
        match code {
            5 => Some(Self::Bt601),
            1 => Some(Self::Bt709),
            9 => Some(Self::Bt2020),
            _ => None,
        }
    }

    /// The standard actually used for conversion. BT.2020 has no
    /// wide-gamut matrix here and intentionally aliases BT.601; the
    /// caller surfaces the warning.
    pub fn effective(self) -> Self {
        match self {
            Self::Bt2020 => Self::Bt601,
            other => other,
        }
    }
}

/// Quantization range of the produced YUV samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorRange {
    Limited,
    Full,
}

impl ColorRange {
    /// Encoder control surfaces pass the range as an integer where
    /// anything above "limited" selects full range.
    pub fn from_code(code: u32) -> Self {
        if code > 1 { Self::Full } else { Self::Limited }
    }
}

/// Three conversion rows, each `(c0, c1, c2, bias)`. Matches the
/// constant-buffer layout the pixel shaders declare at register b0.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMatrix {
    pub y: [f32; 4],
    pub u: [f32; 4],
    pub v: [f32; 4],
}

// Constant buffers must be a multiple of 16 bytes.
const _: () = assert!(size_of::<ColorMatrix>() % 16 == 0);

/// Derive the full conversion matrix from the standard's luma
/// coefficients, chroma extrema, and bias terms. `cg` follows from
/// `cr + cg + cb = 1`.
pub fn make_color_matrix(
    cr: f32,
    cb: f32,
    u_max: f32,
    v_max: f32,
    add_y: f32,
    add_uv: f32,
) -> ColorMatrix {
    let cg = 1.0 - cr - cb;

    let cr_i = 1.0 - cr;
    let cb_i = 1.0 - cb;

    ColorMatrix {
        y: [cr, cg, cb, add_y],
        u: [-(cr * u_max / cb_i), -(cg * u_max / cb_i), u_max, add_uv],
        v: [v_max, -(cg * v_max / cr_i), -(cb * v_max / cr_i), add_uv],
    }
}

impl ColorMatrix {
    /// The precomputed matrix for a supported `(standard, range)` pair.
    /// BT.2020 aliases BT.601 (see [`Colorspace::effective`]).
    pub fn for_colorspace(colorspace: Colorspace, range: ColorRange) -> Self {
        match (colorspace.effective(), range) {
            (Colorspace::Bt601, ColorRange::Limited) => {
                make_color_matrix(0.299, 0.114, 0.436, 0.615, 0.0625, 0.5)
            }
            (Colorspace::Bt601, ColorRange::Full) => {
                make_color_matrix(0.299, 0.114, 0.5, 0.5, 0.0, 0.5)
            }
            (Colorspace::Bt709, ColorRange::Limited) => {
                make_color_matrix(0.2126, 0.0722, 0.436, 0.615, 0.0625, 0.5)
            }
            (Colorspace::Bt709, ColorRange::Full) => {
                make_color_matrix(0.2126, 0.0722, 0.5, 0.5, 0.0, 0.5)
            }
            (Colorspace::Bt2020, _) => unreachable!("effective() never returns Bt2020"),
        }
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::for_colorspace(Colorspace::Bt601, ColorRange::Limited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-6;

    fn assert_row(actual: [f32; 4], expected: [f32; 4]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!(
                (a - e).abs() < TOLERANCE,
                "row mismatch: {actual:?} vs {expected:?}"
            );
        }
    }

    #[test]
    fn bt601_limited_matches_reference() {
        let m = ColorMatrix::for_colorspace(Colorspace::Bt601, ColorRange::Limited);
        assert_row(m.y, [0.299, 0.587, 0.114, 0.0625]);
        assert_row(
            m.u,
            [
                -(0.299 * 0.436 / 0.886),
                -(0.587 * 0.436 / 0.886),
                0.436,
                0.5,
            ],
        );
        assert_row(
            m.v,
            [0.615, -(0.587 * 0.615 / 0.701), -(0.114 * 0.615 / 0.701), 0.5],
        );
    }

    #[test]
    fn bt601_full_matches_reference() {
        let m = ColorMatrix::for_colorspace(Colorspace::Bt601, ColorRange::Full);
        assert_row(m.y, [0.299, 0.587, 0.114, 0.0]);
        assert_row(
            m.u,
            [-(0.299 * 0.5 / 0.886), -(0.587 * 0.5 / 0.886), 0.5, 0.5],
        );
        assert_row(
            m.v,
            [0.5, -(0.587 * 0.5 / 0.701), -(0.114 * 0.5 / 0.701), 0.5],
        );
    }

    #[test]
    fn bt709_limited_matches_reference() {
        let m = ColorMatrix::for_colorspace(Colorspace::Bt709, ColorRange::Limited);
        let cg = 1.0 - 0.2126 - 0.0722;
        assert_row(m.y, [0.2126, cg, 0.0722, 0.0625]);
        assert_row(
            m.u,
            [
                -(0.2126 * 0.436 / (1.0 - 0.0722)),
                -(cg * 0.436 / (1.0 - 0.0722)),
                0.436,
                0.5,
            ],
        );
        assert_row(
            m.v,
            [
                0.615,
                -(cg * 0.615 / (1.0 - 0.2126)),
                -(0.0722 * 0.615 / (1.0 - 0.2126)),
                0.5,
            ],
        );
    }

    #[test]
    fn bt709_full_matches_reference() {
        let m = ColorMatrix::for_colorspace(Colorspace::Bt709, ColorRange::Full);
        let cg = 1.0 - 0.2126 - 0.0722;
        assert_row(m.y, [0.2126, cg, 0.0722, 0.0]);
        assert!((m.u[2] - 0.5).abs() < TOLERANCE);
        assert!((m.v[0] - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn bt2020_aliases_bt601() {
        assert_eq!(Colorspace::Bt2020.effective(), Colorspace::Bt601);
        assert_eq!(
            ColorMatrix::for_colorspace(Colorspace::Bt2020, ColorRange::Limited),
            ColorMatrix::for_colorspace(Colorspace::Bt601, ColorRange::Limited)
        );
    }

    #[test]
    fn sws_code_mapping() {
        assert_eq!(Colorspace::from_sws_code(5), Some(Colorspace::Bt601));
        assert_eq!(Colorspace::from_sws_code(1), Some(Colorspace::Bt709));
        assert_eq!(Colorspace::from_sws_code(9), Some(Colorspace::Bt2020));
        assert_eq!(Colorspace::from_sws_code(0), None);
        assert_eq!(Colorspace::from_sws_code(42), None);
    }

    #[test]
    fn range_code_mapping() {
        assert_eq!(ColorRange::from_code(0), ColorRange::Limited);
        assert_eq!(ColorRange::from_code(1), ColorRange::Limited);
        assert_eq!(ColorRange::from_code(2), ColorRange::Full);
    }
}
