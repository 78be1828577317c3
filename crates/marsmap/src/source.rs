//! Raw elevation sources: headerless big-endian i16 streams and decimal text.

use crate::ElevationError;

/// On-disk layout of a raw elevation asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationSourceFormat {
    /// Signed 16-bit big-endian integers, 2 bytes per sample.
    BinaryI16Be,
    /// One decimal integer per line.
    Text,
}

impl ElevationSourceFormat {
    pub fn parse(self, bytes: &[u8]) -> Result<Vec<i32>, ElevationError> {
        match self {
            Self::BinaryI16Be => parse_binary_i16_be(bytes),
            Self::Text => parse_text(std::str::from_utf8(bytes)?),
        }
    }

    pub fn write(self, samples: &[i32]) -> Result<Vec<u8>, ElevationError> {
        match self {
            Self::BinaryI16Be => write_binary_i16_be(samples),
            Self::Text => Ok(write_text(samples).into_bytes()),
        }
    }
}

pub fn parse_binary_i16_be(bytes: &[u8]) -> Result<Vec<i32>, ElevationError> {
    if bytes.len() % 2 != 0 {
        return Err(ElevationError::TruncatedBinary(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_be_bytes([b[0], b[1]]) as i32)
        .collect())
}

/// Parses newline-delimited integers (`\n` or `\r\n`). Each line is exactly
/// an optional `-` followed by ASCII digits; blank lines, padding and `+` are
/// rejected, since a skipped line would shift every following sample.
pub fn parse_text(text: &str) -> Result<Vec<i32>, ElevationError> {
    text.lines()
        .enumerate()
        .map(|(index, line)| {
            parse_decimal(line).ok_or_else(|| ElevationError::Parse {
                line: index + 1,
                content: line.to_owned(),
            })
        })
        .collect()
}

fn parse_decimal(line: &str) -> Option<i32> {
    let digits = line.strip_prefix('-').unwrap_or(line);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    line.parse().ok()
}

pub fn write_binary_i16_be(samples: &[i32]) -> Result<Vec<u8>, ElevationError> {
    let mut out = Vec::with_capacity(samples.len() * 2);

    for (index, &value) in samples.iter().enumerate() {
        let narrow =
            i16::try_from(value).map_err(|_| ElevationError::OutOfRange { index, value })?;
        out.extend_from_slice(&narrow.to_be_bytes());
    }

    Ok(out)
}

pub fn write_text(samples: &[i32]) -> String {
    let mut out = String::with_capacity(samples.len() * 6);
    for value in samples {
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out
}
