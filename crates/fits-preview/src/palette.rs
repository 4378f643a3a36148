//! Color palettes and wavelength-based palette selection.
//!
//! Files named like `..._0171.fits` carry the observing wavelength in
//! angstroms. Wavelengths of the SDO/AIA channels map to their standard
//! color tables; anything else falls back to [`DEFAULT_PALETTE`].

use core::fmt;
use core::str::FromStr;

/// Entries in a palette lookup table.
pub const LUT_SIZE: usize = 256;

/// An 8-bit RGB triple.
pub type Rgb = [u8; 3];

/// SDO/AIA channels with a dedicated color table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiaChannel {
    A94,
    A131,
    A171,
    A193,
    A211,
    A304,
    A335,
    A1600,
    A1700,
    A4500,
}

impl AiaChannel {
    pub const ALL: [AiaChannel; 10] = [
        AiaChannel::A94,
        AiaChannel::A131,
        AiaChannel::A171,
        AiaChannel::A193,
        AiaChannel::A211,
        AiaChannel::A304,
        AiaChannel::A335,
        AiaChannel::A1600,
        AiaChannel::A1700,
        AiaChannel::A4500,
    ];

    pub fn from_wavelength(angstrom: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.wavelength() == angstrom)
    }

    /// Channel wavelength in angstroms.
    pub fn wavelength(self) -> u32 {
        match self {
            AiaChannel::A94 => 94,
            AiaChannel::A131 => 131,
            AiaChannel::A171 => 171,
            AiaChannel::A193 => 193,
            AiaChannel::A211 => 211,
            AiaChannel::A304 => 304,
            AiaChannel::A335 => 335,
            AiaChannel::A1600 => 1600,
            AiaChannel::A1700 => 1700,
            AiaChannel::A4500 => 4500,
        }
    }

    /// Table entry `i` on a 0..=255 scale.
    ///
    /// Each channel combines the same handful of base curves: a linear ramp,
    /// a square-root ramp, a quadratic ramp, a blend of the two, and a
    /// three-segment "red temperature" ramp.
    fn entry(self, i: f64) -> [f64; 3] {
        let c0 = i;
        let c1 = libm::sqrt(i) * libm::sqrt(255.0);
        let c2 = i * i / 255.0;
        let c3 = (c1 + c2 / 2.0) * 255.0 / (255.0 + 127.5);
        let r0 = (i * 255.0 / 176.0).min(255.0);
        let g0 = (i - 120.0).max(0.0) * 255.0 / 135.0;
        let b0 = (i - 190.0).max(0.0) * 255.0 / 65.0;
        match self {
            AiaChannel::A94 => [c2, c3, c0],
            AiaChannel::A131 => [g0, r0, r0],
            AiaChannel::A171 => [r0, c0, b0],
            AiaChannel::A193 => [c1, c0, c2],
            AiaChannel::A211 => [c1, c0, c3],
            AiaChannel::A304 => [r0, g0, b0],
            AiaChannel::A335 => [c2, c0, c1],
            AiaChannel::A1600 => [c3, c3, c2],
            AiaChannel::A1700 => [c1, c0, c0],
            AiaChannel::A4500 => [c0, c0, b0 / 2.0],
        }
    }
}

/// A named color mapping from `[0, 1]` to RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Palette {
    Aia(AiaChannel),
    Plasma,
    Viridis,
}

/// Palette used when a filename carries no usable wavelength.
pub const DEFAULT_PALETTE: Palette = Palette::Plasma;

type Anchor = (f64, [f64; 3]);

const PLASMA: [Anchor; 9] = [
    (0.000, [0.050383, 0.029803, 0.527975]),
    (0.125, [0.274191, 0.012109, 0.622722]),
    (0.250, [0.417642, 0.000564, 0.658390]),
    (0.375, [0.562738, 0.051545, 0.641509]),
    (0.500, [0.798216, 0.280197, 0.469538]),
    (0.625, [0.901000, 0.404000, 0.359000]),
    (0.750, [0.973000, 0.585000, 0.252000]),
    (0.875, [0.994000, 0.738000, 0.166000]),
    (1.000, [0.940015, 0.975158, 0.131326]),
];

const VIRIDIS: [Anchor; 9] = [
    (0.000, [0.267004, 0.004874, 0.329415]),
    (0.125, [0.283072, 0.130895, 0.449241]),
    (0.250, [0.229739, 0.322361, 0.545706]),
    (0.375, [0.172719, 0.448791, 0.557885]),
    (0.500, [0.127568, 0.566949, 0.550556]),
    (0.625, [0.157851, 0.683765, 0.501686]),
    (0.750, [0.369214, 0.788888, 0.382914]),
    (0.875, [0.678489, 0.863742, 0.189503]),
    (1.000, [0.993248, 0.906157, 0.143936]),
];

fn to_u8(x: f64) -> u8 {
    libm::round(x).clamp(0.0, 255.0) as u8
}

/// Piecewise-linear interpolation between anchor colors.
fn lerp_anchors(anchors: &[Anchor], t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let mut i = 0;
    while i + 2 < anchors.len() && anchors[i + 1].0 < t {
        i += 1;
    }
    let (t0, c0) = anchors[i];
    let (t1, c1) = anchors[i + 1];
    let frac = (t - t0) / (t1 - t0);
    let mut rgb = [0u8; 3];
    for (k, out) in rgb.iter_mut().enumerate() {
        *out = to_u8((c0[k] + frac * (c1[k] - c0[k])) * 255.0);
    }
    rgb
}

impl Palette {
    /// Name as accepted by [`Palette::from_str`].
    pub fn name(self) -> &'static str {
        match self {
            Palette::Aia(AiaChannel::A94) => "sdoaia94",
            Palette::Aia(AiaChannel::A131) => "sdoaia131",
            Palette::Aia(AiaChannel::A171) => "sdoaia171",
            Palette::Aia(AiaChannel::A193) => "sdoaia193",
            Palette::Aia(AiaChannel::A211) => "sdoaia211",
            Palette::Aia(AiaChannel::A304) => "sdoaia304",
            Palette::Aia(AiaChannel::A335) => "sdoaia335",
            Palette::Aia(AiaChannel::A1600) => "sdoaia1600",
            Palette::Aia(AiaChannel::A1700) => "sdoaia1700",
            Palette::Aia(AiaChannel::A4500) => "sdoaia4500",
            Palette::Plasma => "plasma",
            Palette::Viridis => "viridis",
        }
    }

    /// Lookup table entry `index` (`0..LUT_SIZE`).
    pub fn entry(self, index: usize) -> Rgb {
        let index = index.min(LUT_SIZE - 1);
        match self {
            Palette::Aia(channel) => channel.entry(index as f64).map(to_u8),
            Palette::Plasma => lerp_anchors(&PLASMA, index as f64 / (LUT_SIZE - 1) as f64),
            Palette::Viridis => lerp_anchors(&VIRIDIS, index as f64 / (LUT_SIZE - 1) as f64),
        }
    }

    /// The full lookup table.
    pub fn lut(self) -> [Rgb; LUT_SIZE] {
        core::array::from_fn(|i| self.entry(i))
    }

    /// Color for `t` in `[0, 1]`; out-of-range values are clamped.
    pub fn color(self, t: f64) -> Rgb {
        self.entry(lut_index(t))
    }
}

/// LUT slot for a scalar in `[0, 1]`: `floor(t * 256)`, with `1.0` in the last slot.
pub fn lut_index(t: f64) -> usize {
    if t.is_nan() || t <= 0.0 {
        return 0;
    }
    (libm::floor(t * LUT_SIZE as f64) as usize).min(LUT_SIZE - 1)
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned for an unrecognized palette name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown palette (expected plasma, viridis or sdoaia<wavelength>)")]
pub struct UnknownPalette;

impl FromStr for Palette {
    type Err = UnknownPalette;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "plasma" => return Ok(Palette::Plasma),
            "viridis" => return Ok(Palette::Viridis),
            _ => {}
        }
        let digits = lower
            .strip_prefix("sdoaia")
            .or_else(|| lower.strip_prefix("aia"))
            .ok_or(UnknownPalette)?;
        digits
            .parse()
            .ok()
            .and_then(palette_for_wavelength)
            .ok_or(UnknownPalette)
    }
}

/// Extract the wavelength from a filename containing `_NNN.fits` or
/// `_NNNN.fits`. The first such occurrence wins.
pub fn wavelength_hint(filename: &str) -> Option<u32> {
    let bytes = filename.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|&(_, &b)| b == b'_')
        .find_map(|(start, _)| {
            [4, 3].into_iter().find_map(|len| {
                let digits = bytes.get(start + 1..start + 1 + len)?;
                let rest = &bytes[start + 1 + len..];
                (digits.iter().all(u8::is_ascii_digit) && rest.starts_with(b".fits"))
                    .then(|| digits.iter().fold(0, |n, d| n * 10 + u32::from(d - b'0')))
            })
        })
}

/// The color table for a wavelength, if it is an AIA channel.
pub fn palette_for_wavelength(angstrom: u32) -> Option<Palette> {
    AiaChannel::from_wavelength(angstrom).map(Palette::Aia)
}

/// Wavelength hint of `filename` and the palette it selects.
pub fn select_palette(filename: &str) -> (Option<u32>, Palette) {
    let wavelength = wavelength_hint(filename);
    let palette = wavelength
        .and_then(palette_for_wavelength)
        .unwrap_or(DEFAULT_PALETTE);
    (wavelength, palette)
}
