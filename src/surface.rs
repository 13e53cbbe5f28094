//! Typed 2D pixel containers.
//!
//! A [`PixelSurface`] abstracts the four storage/interpretation modes the
//! pyramid works with:
//!
//! - **Mosaic**: one 16-bit sample per pixel, channel determined by the
//!   filter pattern; reads are normalized to [0, 1] through black/white
//!   calibration levels.
//! - **MosaicStabilized**: the same store, but reads pass through the forward
//!   variance-stabilizing transform.
//! - **Dense**: three float samples per pixel with an explicit per-sample
//!   defined flag. Coarse outputs of a decomposition can leave samples
//!   undefined where no mosaic-compatible neighbor existed.
//! - **DenseBackTransform**: a dense store whose reads pass through the
//!   unbiased inverse transform and black/white mapping, used when writing a
//!   reconstruction back out.
//!
//! The mode is fixed at creation; the only transitions are the two one-time
//! view changes ([`PixelSurface::stabilize`] and
//! [`PixelSurface::into_back_transform`]) an orchestrator performs between
//! passes, never mid-algorithm.
//!
//! Out-of-range coordinates clamp to the nearest border pixel ("sample and
//! hold"), so boundary taps of a filter degrade to edge replication instead
//! of failing. Reads return `Option<F>`: `None` means "this sample is not
//! defined here", either structurally (wrong mosaic channel) or because a
//! decomposition level could not estimate it.

use ndarray::{Array2, Array3};

use crate::error::{RawtrousError, Result};
use crate::float_trait::RawFloat;
use crate::mosaic::CfaPattern;
use crate::stabilize::{self, NoiseModel};

/// Storage/interpretation mode of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    Mosaic,
    MosaicStabilized,
    Dense,
    DenseBackTransform,
}

impl SurfaceMode {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceMode::Mosaic => "Mosaic",
            SurfaceMode::MosaicStabilized => "MosaicStabilized",
            SurfaceMode::Dense => "Dense",
            SurfaceMode::DenseBackTransform => "DenseBackTransform",
        }
    }
}

/// Mode-specific payload. The raw store is `(height, width)` u16, the dense
/// store `(height, width, 3)` floats plus a defined mask of the same shape.
#[derive(Debug, Clone)]
enum Store<F: RawFloat> {
    Mosaic {
        data: Array2<u16>,
        cfa: CfaPattern,
        black: u16,
        white: u16,
    },
    MosaicStabilized {
        data: Array2<u16>,
        cfa: CfaPattern,
        black: u16,
        white: u16,
        model: NoiseModel<F>,
    },
    Dense {
        values: Array3<F>,
        defined: Array3<bool>,
    },
    DenseBackTransform {
        values: Array3<F>,
        defined: Array3<bool>,
        model: NoiseModel<F>,
        black: F,
        white: F,
    },
}

/// A width x height pixel container with three logical channels.
#[derive(Debug, Clone)]
pub struct PixelSurface<F: RawFloat> {
    width: usize,
    height: usize,
    store: Store<F>,
}

impl<F: RawFloat> PixelSurface<F> {
    /// Wrap raw 16-bit mosaic data. `data` must be `(height, width)`;
    /// `black < white` are the calibration levels used to normalize reads
    /// into [0, 1].
    pub fn from_raw(data: Array2<u16>, cfa: CfaPattern, black: u16, white: u16) -> Result<Self> {
        if black >= white {
            return Err(RawtrousError::InvalidConfig(format!(
                "black level {black} must be below white level {white}"
            )));
        }
        let (height, width) = data.dim();
        check_nonzero_dims(width, height)?;
        Ok(Self {
            width,
            height,
            store: Store::Mosaic {
                data,
                cfa,
                black,
                white,
            },
        })
    }

    /// Allocate a dense surface with all samples defined and zero. Matches
    /// the lifecycle of pyramid buffers: created once per level, then written
    /// exactly once by a decompose/synthesize pass.
    pub fn dense(width: usize, height: usize) -> Result<Self> {
        check_nonzero_dims(width, height)?;
        Ok(Self {
            width,
            height,
            store: Store::Dense {
                values: Array3::from_elem((height, width, 3), F::zero()),
                defined: Array3::from_elem((height, width, 3), true),
            },
        })
    }

    /// One-time transition Mosaic -> MosaicStabilized: subsequent reads pass
    /// through the forward variance-stabilizing transform.
    pub fn stabilize(self, model: NoiseModel<F>) -> Result<Self> {
        match self.store {
            Store::Mosaic {
                data,
                cfa,
                black,
                white,
            } => Ok(Self {
                width: self.width,
                height: self.height,
                store: Store::MosaicStabilized {
                    data,
                    cfa,
                    black,
                    white,
                    model,
                },
            }),
            other => Err(RawtrousError::ModeMismatch {
                expected: "Mosaic",
                actual: mode_of(&other).name(),
            }),
        }
    }

    /// One-time transition Dense -> DenseBackTransform: subsequent reads pass
    /// through the unbiased inverse transform, then map [0, 1] onto
    /// `[black, white]`.
    pub fn into_back_transform(self, model: NoiseModel<F>, black: F, white: F) -> Result<Self> {
        match self.store {
            Store::Dense { values, defined } => Ok(Self {
                width: self.width,
                height: self.height,
                store: Store::DenseBackTransform {
                    values,
                    defined,
                    model,
                    black,
                    white,
                },
            }),
            other => Err(RawtrousError::ModeMismatch {
                expected: "Dense",
                actual: mode_of(&other).name(),
            }),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mode(&self) -> SurfaceMode {
        mode_of(&self.store)
    }

    /// The filter pattern, for mosaic-typed surfaces.
    pub fn cfa(&self) -> Option<CfaPattern> {
        match &self.store {
            Store::Mosaic { cfa, .. } | Store::MosaicStabilized { cfa, .. } => Some(*cfa),
            _ => None,
        }
    }

    /// Read the sample at `(x, y, channel)`, clamping coordinates to the
    /// surface borders. `None` means the sample is undefined there.
    #[inline]
    pub fn sample(&self, x: isize, y: isize, channel: usize) -> Option<F> {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        match &self.store {
            Store::Mosaic {
                data,
                cfa,
                black,
                white,
            } => {
                if channel != cfa.channel_at(x, y) {
                    return None;
                }
                Some(normalize::<F>(data[[y, x]], *black, *white))
            }
            Store::MosaicStabilized {
                data,
                cfa,
                black,
                white,
                model,
            } => {
                if channel != cfa.channel_at(x, y) {
                    return None;
                }
                let v = normalize::<F>(data[[y, x]], *black, *white);
                Some(stabilize::forward(v, model))
            }
            Store::Dense { values, defined } => {
                defined[[y, x, channel]].then(|| values[[y, x, channel]])
            }
            Store::DenseBackTransform {
                values,
                defined,
                model,
                black,
                white,
            } => {
                if !defined[[y, x, channel]] {
                    return None;
                }
                let v = stabilize::inverse(values[[y, x, channel]], model);
                Some(*black + v * (*white - *black))
            }
        }
    }

    /// Write the sample at `(x, y, channel)`. Writes to a mosaic surface at a
    /// coordinate that does not carry `channel` are dropped; the store has no
    /// room for them.
    pub fn set_sample(&mut self, x: usize, y: usize, channel: usize, value: F) {
        match &mut self.store {
            Store::Mosaic {
                data,
                cfa,
                black,
                white,
            } => {
                if channel == cfa.channel_at(x, y) {
                    data[[y, x]] = denormalize(value, *black, *white);
                }
            }
            Store::MosaicStabilized {
                data,
                cfa,
                black,
                white,
                model,
            } => {
                if channel == cfa.channel_at(x, y) {
                    let v = stabilize::inverse(value, model);
                    data[[y, x]] = denormalize(v, *black, *white);
                }
            }
            Store::Dense { values, defined } => {
                values[[y, x, channel]] = value;
                defined[[y, x, channel]] = true;
            }
            Store::DenseBackTransform {
                values,
                defined,
                model,
                black,
                white,
            } => {
                let v = (value - *black) / (*white - *black);
                values[[y, x, channel]] = stabilize::forward(v, model);
                defined[[y, x, channel]] = true;
            }
        }
    }

    /// Mark a dense sample as undefined. No-op for mosaic surfaces, where
    /// definedness is structural.
    pub fn set_undefined(&mut self, x: usize, y: usize, channel: usize) {
        match &mut self.store {
            Store::Dense { values, defined }
            | Store::DenseBackTransform {
                values, defined, ..
            } => {
                values[[y, x, channel]] = F::zero();
                defined[[y, x, channel]] = false;
            }
            _ => {}
        }
    }

    /// Mutable access to a plain dense store, for the row-parallel writers.
    pub(crate) fn dense_mut(&mut self) -> Result<(&mut Array3<F>, &mut Array3<bool>)> {
        match &mut self.store {
            Store::Dense { values, defined } => Ok((values, defined)),
            other => Err(RawtrousError::ModeMismatch {
                expected: "Dense",
                actual: mode_of(other).name(),
            }),
        }
    }

    pub(crate) fn check_same_dims(&self, other: &PixelSurface<F>) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(RawtrousError::DimensionMismatch {
                want_w: self.width,
                want_h: self.height,
                got_w: other.width,
                got_h: other.height,
            });
        }
        Ok(())
    }
}

fn check_nonzero_dims(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RawtrousError::InvalidConfig(format!(
            "surface dimensions must be non-zero, got {width}x{height}"
        )));
    }
    Ok(())
}

fn mode_of<F: RawFloat>(store: &Store<F>) -> SurfaceMode {
    match store {
        Store::Mosaic { .. } => SurfaceMode::Mosaic,
        Store::MosaicStabilized { .. } => SurfaceMode::MosaicStabilized,
        Store::Dense { .. } => SurfaceMode::Dense,
        Store::DenseBackTransform { .. } => SurfaceMode::DenseBackTransform,
    }
}

#[inline]
fn normalize<F: RawFloat>(raw: u16, black: u16, white: u16) -> F {
    let v = (raw.saturating_sub(black)) as f64 / (white - black) as f64;
    F::from_f64_c(v.min(1.0))
}

#[inline]
fn denormalize<F: RawFloat>(value: F, black: u16, white: u16) -> u16 {
    let range = (white - black) as f64;
    let v = value.to_f64().unwrap_or(0.0) * range + black as f64;
    v.round().clamp(0.0, u16::MAX as f64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn gray_mosaic(width: usize, height: usize, raw: u16) -> PixelSurface<f32> {
        let data = Array2::from_elem((height, width), raw);
        PixelSurface::from_raw(data, CfaPattern::RGGB, 0, u16::MAX).unwrap()
    }

    #[test]
    fn test_sentinel_discipline() {
        // get(x, y, channel) is None iff channel is not the mosaic channel
        let surf = gray_mosaic(6, 4, 32768);
        let cfa = CfaPattern::RGGB;
        for y in 0..4 {
            for x in 0..6 {
                for c in 0..3 {
                    let s = surf.sample(x as isize, y as isize, c);
                    if c == cfa.channel_at(x, y) {
                        assert!(s.is_some());
                    } else {
                        assert!(s.is_none());
                    }
                }
            }
        }
    }

    #[test]
    fn test_mosaic_normalization() {
        let data = Array2::from_elem((2, 2), 600u16);
        let surf: PixelSurface<f64> =
            PixelSurface::from_raw(data, CfaPattern::RGGB, 100, 1100).unwrap();
        let v = surf.sample(0, 0, 0).unwrap();
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_border_clamping() {
        // sample-and-hold: out-of-range coordinates replicate the edge
        let mut surf = PixelSurface::<f32>::dense(4, 3).unwrap();
        surf.set_sample(0, 0, 1, 0.25);
        surf.set_sample(3, 2, 1, 0.75);
        assert_eq!(surf.sample(-5, -5, 1), Some(0.25));
        assert_eq!(surf.sample(100, 100, 1), Some(0.75));
    }

    #[test]
    fn test_dense_undefined_round_trip() {
        let mut surf = PixelSurface::<f32>::dense(2, 2).unwrap();
        assert_eq!(surf.sample(1, 1, 2), Some(0.0));
        surf.set_undefined(1, 1, 2);
        assert_eq!(surf.sample(1, 1, 2), None);
        surf.set_sample(1, 1, 2, 0.5);
        assert_eq!(surf.sample(1, 1, 2), Some(0.5));
    }

    #[test]
    fn test_mode_transitions() {
        let model = NoiseModel::new(1e-4f32, 1e-6).unwrap();
        let surf = gray_mosaic(2, 2, 32768);
        let plain = surf.sample(0, 0, 0).unwrap();
        let stab = surf.stabilize(model).unwrap();
        assert_eq!(stab.mode(), SurfaceMode::MosaicStabilized);
        // stabilized read of a mid-gray raw is large: v/a ~ 0.5/1e-4
        let t = stab.sample(0, 0, 0).unwrap();
        assert!(t > plain);

        // stabilizing twice is a misuse
        assert!(stab.stabilize(model).is_err());

        let dense = PixelSurface::<f32>::dense(2, 2).unwrap();
        let bt = dense.into_back_transform(model, 0.0, 1.0).unwrap();
        assert_eq!(bt.mode(), SurfaceMode::DenseBackTransform);
        assert!(bt.into_back_transform(model, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_back_transform_round_trip() {
        let model = NoiseModel::new(1e-4f64, 1e-6).unwrap();
        let mut dense = PixelSurface::<f64>::dense(2, 2).unwrap();
        dense.set_sample(0, 0, 0, crate::stabilize::forward(0.5, &model));
        let bt = dense.into_back_transform(model, 0.0, 1.0).unwrap();
        let v = bt.sample(0, 0, 0).unwrap();
        assert!((v - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_inverted_levels() {
        let data = Array2::from_elem((2, 2), 0u16);
        assert!(PixelSurface::<f32>::from_raw(data, CfaPattern::RGGB, 10, 10).is_err());
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let empty = Array2::from_elem((0, 4), 0u16);
        assert!(PixelSurface::<f32>::from_raw(empty, CfaPattern::RGGB, 0, 100).is_err());
        assert!(PixelSurface::<f32>::dense(0, 4).is_err());
        assert!(PixelSurface::<f32>::dense(4, 0).is_err());
    }
}
