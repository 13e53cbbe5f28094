//! Pixel file collaborators: 16-bit binary PGM in, PFM out.
//!
//! The numeric core never touches files; these helpers sit at its boundary.
//! The loader accepts the single-channel 16-bit PGM that `dcraw -D -W -6`
//! emits for raw sensor dumps and exposes the observed maximum as the white
//! calibration level. The writer serializes dense surfaces as little-endian
//! PFM, reading every sample through the surface's own view (so a
//! back-transform surface is inverse-transformed on the way out); samples
//! that are still undefined are written as -1.0 so downstream tooling can
//! spot coverage gaps.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::Array2;

use crate::error::{RawtrousError, Result};
use crate::float_trait::RawFloat;
use crate::mosaic::CfaPattern;
use crate::surface::{PixelSurface, SurfaceMode};

fn malformed(reason: impl Into<String>) -> RawtrousError {
    RawtrousError::Malformed {
        format: "pgm",
        reason: reason.into(),
    }
}

/// Read a 16-bit binary PGM (`P5`, maxval 65535) into a mosaic surface.
///
/// The black level is 0 and the white level is the brightest sample present,
/// so a raw that never reaches sensor saturation still normalizes to the
/// full [0, 1] range.
pub fn read_pgm16<F: RawFloat>(path: &Path, cfa: CfaPattern) -> Result<PixelSurface<F>> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    let mut cursor = 0usize;
    let magic = next_token(&bytes, &mut cursor).ok_or_else(|| malformed("missing magic"))?;
    if magic != b"P5" {
        return Err(malformed("not a binary PGM (expected P5)"));
    }
    let width = parse_dim(&bytes, &mut cursor, "width")?;
    let height = parse_dim(&bytes, &mut cursor, "height")?;
    let maxval = parse_dim(&bytes, &mut cursor, "maxval")?;
    if maxval != 65535 {
        return Err(malformed(format!("expected 16-bit samples, maxval {maxval}")));
    }
    // single whitespace byte separates the header from the sample data
    cursor += 1;

    // header dimensions are untrusted; never let the payload size wrap
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(2))
        .ok_or_else(|| malformed("image dimensions overflow"))?;
    let data = cursor
        .checked_add(expected)
        .and_then(|end| bytes.get(cursor..end))
        .ok_or_else(|| malformed("truncated sample data"))?;

    let mut samples = Array2::zeros((height, width));
    let mut white = 0u16;
    for (i, chunk) in data.chunks_exact(2).enumerate() {
        let v = u16::from_be_bytes([chunk[0], chunk[1]]);
        white = white.max(v);
        samples[[i / width, i % width]] = v;
    }
    PixelSurface::from_raw(samples, cfa, 0, white.max(1))
}

fn next_token<'a>(bytes: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    // skip whitespace and '#' comment lines
    loop {
        while *cursor < bytes.len() && bytes[*cursor].is_ascii_whitespace() {
            *cursor += 1;
        }
        if *cursor < bytes.len() && bytes[*cursor] == b'#' {
            while *cursor < bytes.len() && bytes[*cursor] != b'\n' {
                *cursor += 1;
            }
        } else {
            break;
        }
    }
    let start = *cursor;
    while *cursor < bytes.len() && !bytes[*cursor].is_ascii_whitespace() {
        *cursor += 1;
    }
    (*cursor > start).then(|| &bytes[start..*cursor])
}

fn parse_dim(bytes: &[u8], cursor: &mut usize, what: &str) -> Result<usize> {
    let token = next_token(bytes, cursor).ok_or_else(|| malformed(format!("missing {what}")))?;
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .ok_or_else(|| malformed(format!("invalid {what}")))
}

/// Write a dense surface as little-endian PFM, three floats per pixel.
///
/// The header is padded to a 16-byte boundary so the sample data stays
/// aligned for memory-mapped readers.
pub fn write_pfm<F: RawFloat>(surface: &PixelSurface<F>, path: &Path) -> Result<()> {
    match surface.mode() {
        SurfaceMode::Dense | SurfaceMode::DenseBackTransform => {}
        other => {
            return Err(RawtrousError::ModeMismatch {
                expected: "Dense or DenseBackTransform",
                actual: other.name(),
            })
        }
    }

    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    let header = format!("PF\n{} {}\n-1.0", surface.width(), surface.height());
    out.write_all(header.as_bytes())?;
    let mut pad = 0usize;
    while (header.len() + 1 + pad) % 16 != 0 {
        pad += 1;
    }
    out.write_all(&vec![b'0'; pad])?;
    out.write_all(b"\n")?;

    let sentinel = -1.0f32;
    for y in 0..surface.height() as isize {
        for x in 0..surface.width() as isize {
            for c in 0..3 {
                let v = surface
                    .sample(x, y, c)
                    .and_then(|v| v.to_f32())
                    .unwrap_or(sentinel);
                out.write_all(&v.to_le_bytes())?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
