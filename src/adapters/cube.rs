use serde::Serialize;

use super::parse_leading_int;
use crate::config::limits::{
    BOHR_TO_ANGSTROM, CUBE_RANGE_CEIL, CUBE_RANGE_FALLBACK_MAX, CUBE_RANGE_FLOOR,
    CUBE_RANGE_NEG_FLOOR, CUBE_RANGE_PAD_FRACTION,
};

/// Axis-aligned grid extent in angstrom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

/// Isovalue slider range for a cube grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const FALLBACK: ValueRange = ValueRange {
        min: CUBE_RANGE_FLOOR,
        max: CUBE_RANGE_FALLBACK_MAX,
    };

    /// Pull an isovalue into `[min, max]`.
    pub fn clamp(&self, isovalue: f64) -> f64 {
        if self.min > self.max {
            return self.min;
        }
        isovalue.clamp(self.min, self.max)
    }
}

fn header_lines(text: &str) -> Vec<&str> {
    text.trim().split('\n').collect()
}

/// Grid extent from the cube header: origin on line 3, voxel counts and the
/// diagonal voxel step on lines 4-6, all converted from bohr.
pub fn cube_bounds(text: &str) -> Option<CubeBounds> {
    let lines = header_lines(text);
    if lines.len() < 6 {
        return None;
    }
    let origin: Vec<&str> = lines[2].split_whitespace().collect();
    let ox = origin.get(1)?.parse::<f64>().ok()?;
    let oy = origin.get(2)?.parse::<f64>().ok()?;
    let oz = origin.get(3)?.parse::<f64>().ok()?;

    let axis = |line: &str, diag: usize| -> Option<(f64, f64)> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let n = parse_leading_int(parts.first()?)? as f64;
        let step = parts.get(diag)?.parse::<f64>().ok()?;
        Some((n, step))
    };
    let (nx, vx) = axis(lines[3], 1)?;
    let (ny, vy) = axis(lines[4], 2)?;
    let (nz, vz) = axis(lines[5], 3)?;

    Some(CubeBounds {
        x_min: ox * BOHR_TO_ANGSTROM,
        x_max: (ox + (nx - 1.0) * vx) * BOHR_TO_ANGSTROM,
        y_min: oy * BOHR_TO_ANGSTROM,
        y_max: (oy + (ny - 1.0) * vy) * BOHR_TO_ANGSTROM,
        z_min: oz * BOHR_TO_ANGSTROM,
        z_max: (oz + (nz - 1.0) * vz) * BOHR_TO_ANGSTROM,
    })
}

/// Padded value range of the volumetric data.
///
/// Values start after the six header lines and `|natoms|` atom lines. The
/// span is widened by 10% on each side; non-negative data keeps `min >= 1e-5`,
/// signed data keeps `min >= -1`, and `max` never exceeds 1.
pub fn cube_range(text: &str) -> ValueRange {
    let lines = header_lines(text);
    if lines.len() < 6 {
        return ValueRange::FALLBACK;
    }
    let Some(natoms) = lines[2]
        .split_whitespace()
        .next()
        .and_then(parse_leading_int)
    else {
        return ValueRange::FALLBACK;
    };
    let data_start = 6 + natoms.unsigned_abs() as usize;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for line in lines.iter().skip(data_start) {
        for token in line.split_whitespace() {
            if let Ok(v) = token.parse::<f64>() {
                if v.is_nan() {
                    continue;
                }
                min = min.min(v);
                max = max.max(v);
            }
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return ValueRange::FALLBACK;
    }

    let span = max - min;
    let mut lo = min - span * CUBE_RANGE_PAD_FRACTION;
    let hi = (max + span * CUBE_RANGE_PAD_FRACTION).min(CUBE_RANGE_CEIL);
    lo = if min >= 0.0 {
        lo.max(CUBE_RANGE_FLOOR)
    } else {
        lo.max(CUBE_RANGE_NEG_FLOOR)
    };
    ValueRange { min: lo, max: hi }
}
