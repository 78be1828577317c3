//! MARSMAP: equirectangular elevation grids packed for GPU upload.
//!
//! - Grid: `180 * res` rows by `360 * res` columns, `res` = samples per degree.
//! - Samples are signed metres relative to the reference radius, row-major,
//!   northernmost row first.
//! - Packed texel: 3 bytes, big-endian `sample + radius_offset` (24-bit).
//!
//! Decoding on the GPU side mirrors [`decode_texel`]:
//!   value = (b0 << 16) | (b1 << 8) | b2
//!   elevation = value - radius_offset
//!
//! Raw sources (see [`ElevationSourceFormat`]):
//!   BinaryI16Be : headerless stream of i16, big-endian, 2 bytes per sample
//!   Text        : one decimal integer per line

mod source;

pub use source::{
    parse_binary_i16_be, parse_text, write_binary_i16_be, write_text, ElevationSourceFormat,
};

use rayon::prelude::*;
use thiserror::Error;

/// Mean radius of Mars in metres; default offset that keeps MOLA samples non-negative.
pub const MARS_RADIUS_M: u32 = 3_396_190;

/// Bytes per packed texel.
pub const TEXEL_BYTES: usize = 3;

/// Largest value a packed texel can hold.
pub const TEXEL_MAX: u32 = (1 << 24) - 1;

#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("resolution must be between 1 and {max} samples per degree, got {resolution}")]
    Resolution { resolution: u32, max: u32 },

    /// `ElevationShapeError`: sample count does not match the grid.
    #[error(
        "expected {expected} samples ({rows} rows x {columns} columns) for resolution {resolution}, got {actual}"
    )]
    Shape {
        resolution: u32,
        rows: usize,
        columns: usize,
        expected: usize,
        actual: usize,
    },

    /// `ElevationParseError`: a text line is blank or not an integer.
    #[error("line {line}: cannot parse {content:?} as an elevation sample")]
    Parse { line: usize, content: String },

    /// `ElevationParseError`: the binary stream ends mid-sample.
    #[error("binary elevation stream has odd length {0}; expected 2 bytes per sample")]
    TruncatedBinary(usize),

    #[error("text elevation source is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("radius offset {0} does not fit in a 24-bit texel")]
    Offset(u32),

    #[error("sample {value} at index {index} does not fit in a signed 16-bit integer")]
    OutOfRange { index: usize, value: i32 },

    #[error("downsample factor {factor} must be >= 1 and divide resolution {resolution}")]
    Factor { factor: u32, resolution: u32 },
}

/// Resolution-derived dimensions of an equirectangular grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub resolution: u32,
    pub rows: usize,
    pub columns: usize,
}

impl GridShape {
    /// Upper bound that keeps `columns * 3` and the row count inside `u32`.
    pub const MAX_RESOLUTION: u32 = 1 << 16;

    pub fn new(resolution: u32) -> Result<Self, ElevationError> {
        if resolution == 0 || resolution > Self::MAX_RESOLUTION {
            return Err(ElevationError::Resolution {
                resolution,
                max: Self::MAX_RESOLUTION,
            });
        }

        Ok(Self {
            resolution,
            rows: 180 * resolution as usize,
            columns: 360 * resolution as usize,
        })
    }

    #[inline]
    pub fn cells(&self) -> usize {
        self.rows * self.columns
    }

    #[inline]
    pub fn packed_len(&self) -> usize {
        self.cells() * TEXEL_BYTES
    }

    /// Fails with [`ElevationError::Shape`] unless `len` matches the cell count.
    pub fn check(&self, len: usize) -> Result<(), ElevationError> {
        if len == self.cells() {
            Ok(())
        } else {
            Err(ElevationError::Shape {
                resolution: self.resolution,
                rows: self.rows,
                columns: self.columns,
                expected: self.cells(),
                actual: len,
            })
        }
    }
}

/// Packs one sample; the flag reports whether it had to be saturated.
#[inline]
pub fn pack_texel(sample: i32, radius_offset: u32) -> ([u8; TEXEL_BYTES], bool) {
    let raw = sample as i64 + radius_offset as i64;
    let value = raw.clamp(0, TEXEL_MAX as i64) as u32;
    let [_, b0, b1, b2] = value.to_be_bytes();
    ([b0, b1, b2], value as i64 != raw)
}

/// Reference decode matching the shader side.
#[inline]
pub fn decode_texel(texel: [u8; TEXEL_BYTES], radius_offset: u32) -> i32 {
    let value = (texel[0] as i64) << 16 | (texel[1] as i64) << 8 | texel[2] as i64;
    (value - radius_offset as i64) as i32
}

fn check_offset(radius_offset: u32) -> Result<(), ElevationError> {
    if radius_offset > TEXEL_MAX {
        return Err(ElevationError::Offset(radius_offset));
    }
    Ok(())
}

/// Writes every sample into `out` and returns how many were saturated.
fn pack_into(samples: &[i32], radius_offset: u32, out: &mut [u8]) -> usize {
    out.par_chunks_exact_mut(TEXEL_BYTES)
        .zip(samples.par_iter())
        .filter_map(|(texel, &sample)| {
            let (bytes, saturated) = pack_texel(sample, radius_offset);
            texel.copy_from_slice(&bytes);
            saturated.then_some(())
        })
        .count()
}

/// Encodes a row-major sample sequence into `3 * rows * columns` bytes.
pub fn encode(
    raw_samples: &[i32],
    resolution: u32,
    radius_offset: u32,
) -> Result<Vec<u8>, ElevationError> {
    let shape = GridShape::new(resolution)?;
    shape.check(raw_samples.len())?;
    check_offset(radius_offset)?;

    let mut packed = vec![0u8; shape.packed_len()];
    pack_into(raw_samples, radius_offset, &mut packed);
    Ok(packed)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationStats {
    pub min: i32,
    pub max: i32,
    pub mean: f64,
}

/// A validated elevation grid. Immutable once built.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    shape: GridShape,
    samples: Vec<i32>,
}

impl ElevationGrid {
    pub fn new(resolution: u32, samples: Vec<i32>) -> Result<Self, ElevationError> {
        let shape = GridShape::new(resolution)?;
        shape.check(samples.len())?;
        Ok(Self { shape, samples })
    }

    /// Parses `bytes` in the given source format and validates the shape.
    pub fn from_source(
        bytes: &[u8],
        format: ElevationSourceFormat,
        resolution: u32,
    ) -> Result<Self, ElevationError> {
        Self::new(resolution, format.parse(bytes)?)
    }

    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[inline]
    pub fn resolution(&self) -> u32 {
        self.shape.resolution
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.shape.columns
    }

    #[inline]
    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn encode(&self, radius_offset: u32) -> Result<PackedElevation, ElevationError> {
        check_offset(radius_offset)?;

        let mut bytes = vec![0u8; self.shape.packed_len()];
        let saturated = pack_into(&self.samples, radius_offset, &mut bytes);

        Ok(PackedElevation {
            shape: self.shape,
            radius_offset,
            saturated,
            bytes,
        })
    }

    pub fn stats(&self) -> ElevationStats {
        let (min, max, sum) = self
            .samples
            .par_iter()
            .map(|&s| (s, s, s as i64))
            .reduce(
                || (i32::MAX, i32::MIN, 0i64),
                |a, b| (a.0.min(b.0), a.1.max(b.1), a.2 + b.2),
            );

        ElevationStats {
            min,
            max,
            mean: sum as f64 / self.samples.len() as f64,
        }
    }

    /// Box-filters `factor x factor` blocks into a grid of `resolution / factor`.
    pub fn downsample(&self, factor: u32) -> Result<Self, ElevationError> {
        let resolution = self.shape.resolution;
        if factor == 0 || resolution % factor != 0 {
            return Err(ElevationError::Factor { factor, resolution });
        }
        if factor == 1 {
            return Ok(self.clone());
        }

        let shape = GridShape::new(resolution / factor)?;
        let f = factor as usize;
        let area = (f * f) as f64;
        let mut samples = vec![0i32; shape.cells()];

        samples
            .par_chunks_mut(shape.columns)
            .enumerate()
            .for_each(|(row, out)| {
                for (column, cell) in out.iter_mut().enumerate() {
                    let mut sum = 0i64;
                    for dy in 0..f {
                        let src = (row * f + dy) * self.shape.columns + column * f;
                        sum += self.samples[src..src + f]
                            .iter()
                            .map(|&s| s as i64)
                            .sum::<i64>();
                    }
                    *cell = (sum as f64 / area).round() as i32;
                }
            });

        Ok(Self { shape, samples })
    }
}

/// Packed texel buffer plus the parameters the decoder must agree on.
#[derive(Debug, Clone)]
pub struct PackedElevation {
    shape: GridShape,
    radius_offset: u32,
    saturated: usize,
    bytes: Vec<u8>,
}

impl PackedElevation {
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Texture width (columns).
    #[inline]
    pub fn width(&self) -> u32 {
        self.shape.columns as u32
    }

    /// Texture height (rows).
    #[inline]
    pub fn height(&self) -> u32 {
        self.shape.rows as u32
    }

    #[inline]
    pub fn radius_offset(&self) -> u32 {
        self.radius_offset
    }

    /// Number of samples clamped into the 24-bit range during encoding.
    #[inline]
    pub fn saturated(&self) -> usize {
        self.saturated
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn decode(&self, index: usize) -> i32 {
        let at = index * TEXEL_BYTES;
        decode_texel(
            [self.bytes[at], self.bytes[at + 1], self.bytes[at + 2]],
            self.radius_offset,
        )
    }

    /// Widens every texel to RGBA with opaque alpha.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = vec![u8::MAX; self.shape.cells() * 4];
        rgba.par_chunks_exact_mut(4)
            .zip(self.bytes.par_chunks_exact(TEXEL_BYTES))
            .for_each(|(dst, src)| dst[..TEXEL_BYTES].copy_from_slice(src));
        rgba
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_four_dimensions() {
        let shape = GridShape::new(4).unwrap();
        assert_eq!(shape.rows, 720);
        assert_eq!(shape.columns, 1440);
        assert_eq!(shape.cells(), 1_036_800);
        assert_eq!(shape.packed_len(), 3_110_400);

        let packed = encode(&vec![0; 1_036_800], 4, MARS_RADIUS_M).unwrap();
        assert_eq!(packed.len(), 3_110_400);
    }

    #[test]
    fn wrong_sample_count_is_a_shape_error() {
        for resolution in 1..=3 {
            let cells = GridShape::new(resolution).unwrap().cells();
            for len in [0, cells - 1, cells + 1] {
                let err = encode(&vec![0; len], resolution, MARS_RADIUS_M).unwrap_err();
                assert!(matches!(err, ElevationError::Shape { actual, .. } if actual == len));
            }
        }
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert!(matches!(
            GridShape::new(0),
            Err(ElevationError::Resolution { resolution: 0, .. })
        ));
    }

    #[test]
    fn texels_are_big_endian() {
        let (bytes, saturated) = pack_texel(0x12, 0x0A_BC00);
        assert_eq!(bytes, [0x0A, 0xBC, 0x12]);
        assert!(!saturated);
    }

    #[test]
    fn decode_recovers_samples_across_the_range() {
        let offset = MARS_RADIUS_M;
        let lo = -(offset as i32);
        let hi = TEXEL_MAX as i32 - offset as i32;
        for sample in [lo, lo + 1, -8_200, -1, 0, 1, 21_229, i16::MIN as i32, i16::MAX as i32, hi] {
            let (texel, saturated) = pack_texel(sample, offset);
            assert!(!saturated);
            assert_eq!(decode_texel(texel, offset), sample);
        }
    }

    #[test]
    fn grid_round_trip() {
        let shape = GridShape::new(1).unwrap();
        let samples: Vec<i32> = (0..shape.cells())
            .map(|i| (i as i32 % 40_000) - 20_000)
            .collect();
        let grid = ElevationGrid::new(1, samples.clone()).unwrap();
        let packed = grid.encode(MARS_RADIUS_M).unwrap();

        assert_eq!(packed.bytes().len(), shape.packed_len());
        assert_eq!(packed.saturated(), 0);
        for (i, &s) in samples.iter().enumerate().step_by(97) {
            assert_eq!(packed.decode(i), s);
        }
        assert_eq!(packed.decode(samples.len() - 1), *samples.last().unwrap());
    }

    #[test]
    fn out_of_range_samples_saturate() {
        let (low, sat_low) = pack_texel(-10, 5);
        assert_eq!(low, [0, 0, 0]);
        assert!(sat_low);

        let (high, sat_high) = pack_texel(i32::MAX, 0);
        assert_eq!(high, [0xFF, 0xFF, 0xFF]);
        assert!(sat_high);
    }

    #[test]
    fn offset_must_fit_in_a_texel() {
        let samples = vec![0; GridShape::new(1).unwrap().cells()];
        assert!(matches!(
            encode(&samples, 1, TEXEL_MAX + 1),
            Err(ElevationError::Offset(_))
        ));
    }

    #[test]
    fn rgba_widening_keeps_rgb_and_sets_alpha() {
        let mut samples = vec![0; GridShape::new(1).unwrap().cells()];
        samples[1] = 0x01_0203;
        let packed = ElevationGrid::new(1, samples).unwrap().encode(0).unwrap();
        let rgba = packed.to_rgba();

        assert_eq!(rgba.len(), packed.bytes().len() / 3 * 4);
        assert_eq!(&rgba[4..8], &[0x01, 0x02, 0x03, 0xFF]);
    }

    #[test]
    fn downsample_averages_blocks() {
        let shape = GridShape::new(2).unwrap();
        let samples: Vec<i32> = (0..shape.rows)
            .flat_map(|row| (0..shape.columns).map(move |col| (row % 2 * 10 + col % 2) as i32))
            .collect();
        let grid = ElevationGrid::new(2, samples).unwrap();

        let half = grid.downsample(2).unwrap();
        assert_eq!(half.resolution(), 1);
        assert_eq!(half.samples().len(), GridShape::new(1).unwrap().cells());
        // (0 + 1 + 10 + 11) / 4 = 5.5, rounded away from zero.
        assert!(half.samples().iter().all(|&s| s == 6));

        assert!(matches!(
            grid.downsample(3),
            Err(ElevationError::Factor { factor: 3, resolution: 2 })
        ));
    }

    #[test]
    fn stats_cover_extremes() {
        let mut samples = vec![0; GridShape::new(1).unwrap().cells()];
        samples[10] = -8_200;
        samples[20] = 21_229;
        let stats = ElevationGrid::new(1, samples).unwrap().stats();

        assert_eq!(stats.min, -8_200);
        assert_eq!(stats.max, 21_229);
        assert!((stats.mean - 13_029.0 / 64_800.0).abs() < 1e-9);
    }
}
