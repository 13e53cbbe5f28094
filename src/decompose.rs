//! One level of the redundant (à-trous) wavelet pyramid.
//!
//! Each level splits an input surface into a coarse approximation and a
//! detail residual for one channel, using a 5-tap binomial kernel whose taps
//! are spread by the dyadic stride `2^scale` (Starck et al., "the à-trous
//! algorithm"). Every tap is additionally weighted by the edge-aware
//! similarity kernel, so the low-pass never averages across an edge or an
//! unsampled mosaic position.
//!
//! Because mosaic surfaces carry one defined channel per pixel, the first
//! level doubles as a demosaicing interpolation; later levels see fully
//! dense inputs and reduce to an edge-aware binomial blur.
//!
//! Rows of the output are independent: every output coordinate reads only
//! the input surface of the call, so the outer loop runs on a rayon pool
//! with disjoint write sets and no locking.

use ndarray::Axis;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{RawtrousError, Result};
use crate::float_trait::RawFloat;
use crate::surface::PixelSurface;
use crate::weight::{similarity_weight, ChannelSpan, SimilarityConfig};

/// Normalized binomial analysis kernel (1, 4, 6, 4, 1) / 16.
pub const ATROUS_KERNEL: [f64; 5] = [
    1.0 / 16.0,
    4.0 / 16.0,
    6.0 / 16.0,
    4.0 / 16.0,
    1.0 / 16.0,
];

/// Progress callback: `(rows_done, rows_total)`. Purely diagnostic; the
/// operators never depend on it.
pub type ProgressFn = dyn Fn(usize, usize) + Sync;

/// Largest supported scale index. The dyadic stride is `2^scale`, so deeper
/// levels would overflow the coordinate arithmetic long after the support
/// window has outgrown any realistic sensor anyway.
pub const MAX_SCALE: usize = 30;

/// Tap/weight policy of a decomposition level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelShape {
    /// Coupled 25-tap 2D pass; richer edge detection across all channels.
    #[default]
    Coupled2d,
    /// Decoupled horizontal-then-vertical 1D passes restricted to
    /// same-channel comparison. Cheaper; sufficient for calibration.
    Separable1d,
}

/// Configuration of one decomposition level.
#[derive(Debug, Clone, Copy)]
pub struct DecomposeConfig<F: RawFloat> {
    pub shape: KernelShape,
    pub similarity: SimilarityConfig<F>,
}

impl<F: RawFloat> Default for DecomposeConfig<F> {
    fn default() -> Self {
        Self {
            shape: KernelShape::default(),
            similarity: SimilarityConfig::default(),
        }
    }
}

impl<F: RawFloat> DecomposeConfig<F> {
    pub fn validate(&self) -> Result<()> {
        self.similarity.validate()
    }
}

/// Outcome of one decomposition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecomposeStats {
    /// Output coordinates left undefined because no mosaic-compatible,
    /// similar-enough neighbor existed within the support window.
    pub undefined: usize,
}

impl DecomposeStats {
    /// True when a coordinate could not be estimated. Callers doing
    /// iterative mosaic fill-in use this to detect patterns that never
    /// converge to full coverage.
    pub fn incomplete(&self) -> bool {
        self.undefined > 0
    }
}

/// Split `input` into `coarse` and `detail` for one channel at one scale.
///
/// `coarse` and `detail` must be dense surfaces of the input's dimensions;
/// both are fully written for the given channel. Where no defined neighbor
/// contributes, the coarse sample is left undefined and the detail is zero.
/// Where the input sample itself is undefined (unsampled mosaic position),
/// the detail is zero as well: there is no residual for a sample that never
/// existed, and reconstruction must not invent one.
pub fn decompose<F: RawFloat>(
    input: &PixelSurface<F>,
    coarse: &mut PixelSurface<F>,
    detail: &mut PixelSurface<F>,
    channel: usize,
    scale: usize,
    config: &DecomposeConfig<F>,
    progress: Option<&ProgressFn>,
) -> Result<DecomposeStats> {
    config.validate()?;
    if channel >= 3 {
        return Err(RawtrousError::ChannelOutOfRange(channel));
    }
    if scale > MAX_SCALE {
        return Err(RawtrousError::InvalidConfig(format!(
            "scale {scale} exceeds the supported maximum {MAX_SCALE}"
        )));
    }
    input.check_same_dims(coarse)?;
    input.check_same_dims(detail)?;

    let stride = 1isize << scale;
    let kernel = kernel_taps::<F>();

    match config.shape {
        KernelShape::Coupled2d => {
            decompose_coupled(input, coarse, detail, channel, stride, &kernel, config, progress)
        }
        KernelShape::Separable1d => {
            decompose_separable(input, coarse, detail, channel, stride, &kernel, config, progress)
        }
    }
}

fn kernel_taps<F: RawFloat>() -> [F; 5] {
    let mut taps = [F::zero(); 5];
    for (t, &k) in taps.iter_mut().zip(ATROUS_KERNEL.iter()) {
        *t = F::from_f64_c(k);
    }
    taps
}

#[allow(clippy::too_many_arguments)]
fn decompose_coupled<F: RawFloat>(
    input: &PixelSurface<F>,
    coarse: &mut PixelSurface<F>,
    detail: &mut PixelSurface<F>,
    channel: usize,
    stride: isize,
    kernel: &[F; 5],
    config: &DecomposeConfig<F>,
    progress: Option<&ProgressFn>,
) -> Result<DecomposeStats> {
    let width = input.width();
    let height = input.height();
    let (cvals, cdef) = coarse.dense_mut()?;
    let (dvals, ddef) = detail.dense_mut()?;

    let counter = AtomicUsize::new(0);
    let undefined = cvals
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(cdef.axis_iter_mut(Axis(0)))
        .zip(dvals.axis_iter_mut(Axis(0)))
        .zip(ddef.axis_iter_mut(Axis(0)))
        .enumerate()
        .map(|(y, (((mut crow, mut cdrow), mut drow), mut ddrow))| {
            let mut row_undefined = 0usize;
            let cy = y as isize;
            for x in 0..width {
                let cx = x as isize;
                let mut sum = F::zero();
                let mut wgt = F::zero();
                for (j, &kj) in kernel.iter().enumerate() {
                    let yy = cy + stride * (j as isize - 2);
                    for (i, &ki) in kernel.iter().enumerate() {
                        let xx = cx + stride * (i as isize - 2);
                        let w = ki
                            * kj
                            * similarity_weight(
                                input,
                                cx,
                                cy,
                                channel,
                                input,
                                xx,
                                yy,
                                &config.similarity,
                            );
                        if w > F::zero() {
                            if let Some(px) = input.sample(xx, yy, channel) {
                                sum += w * px;
                                wgt += w;
                            }
                        }
                    }
                }
                if wgt <= F::zero() {
                    crow[[x, channel]] = F::zero();
                    cdrow[[x, channel]] = false;
                    drow[[x, channel]] = F::zero();
                    ddrow[[x, channel]] = true;
                    row_undefined += 1;
                } else {
                    let est = sum / wgt;
                    crow[[x, channel]] = est;
                    cdrow[[x, channel]] = true;
                    drow[[x, channel]] = match input.sample(cx, cy, channel) {
                        Some(center) => center - est,
                        None => F::zero(),
                    };
                    ddrow[[x, channel]] = true;
                }
            }
            report(progress, &counter, height);
            row_undefined
        })
        .sum::<usize>();

    Ok(DecomposeStats { undefined })
}

#[allow(clippy::too_many_arguments)]
fn decompose_separable<F: RawFloat>(
    input: &PixelSurface<F>,
    coarse: &mut PixelSurface<F>,
    detail: &mut PixelSurface<F>,
    channel: usize,
    stride: isize,
    kernel: &[F; 5],
    config: &DecomposeConfig<F>,
    progress: Option<&ProgressFn>,
) -> Result<DecomposeStats> {
    let width = input.width();
    let height = input.height();
    let total = 2 * height;
    let counter = AtomicUsize::new(0);

    // the decoupled variant compares within the filtered channel only
    let sim = SimilarityConfig {
        span: ChannelSpan::Single,
        ..config.similarity
    };

    // pass 1: horizontal taps from the input into a scratch surface
    let mut tmp = PixelSurface::<F>::dense(width, height)?;
    {
        let (tvals, tdef) = tmp.dense_mut()?;
        tvals
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(tdef.axis_iter_mut(Axis(0)))
            .enumerate()
            .for_each(|(y, (mut trow, mut tdrow))| {
                let cy = y as isize;
                for x in 0..width {
                    let cx = x as isize;
                    let mut sum = F::zero();
                    let mut wgt = F::zero();
                    for (i, &ki) in kernel.iter().enumerate() {
                        let xx = cx + stride * (i as isize - 2);
                        let w = ki * similarity_weight(input, cx, cy, channel, input, xx, cy, &sim);
                        if w > F::zero() {
                            if let Some(px) = input.sample(xx, cy, channel) {
                                sum += w * px;
                                wgt += w;
                            }
                        }
                    }
                    if wgt <= F::zero() {
                        trow[[x, channel]] = F::zero();
                        tdrow[[x, channel]] = false;
                    } else {
                        trow[[x, channel]] = sum / wgt;
                        tdrow[[x, channel]] = true;
                    }
                }
                report(progress, &counter, total);
            });
    }

    // pass 2: vertical taps from the scratch surface
    let (cvals, cdef) = coarse.dense_mut()?;
    let (dvals, ddef) = detail.dense_mut()?;
    let undefined = cvals
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(cdef.axis_iter_mut(Axis(0)))
        .zip(dvals.axis_iter_mut(Axis(0)))
        .zip(ddef.axis_iter_mut(Axis(0)))
        .enumerate()
        .map(|(y, (((mut crow, mut cdrow), mut drow), mut ddrow))| {
            let mut row_undefined = 0usize;
            let cy = y as isize;
            for x in 0..width {
                let cx = x as isize;
                let mut sum = F::zero();
                let mut wgt = F::zero();
                for (j, &kj) in kernel.iter().enumerate() {
                    let yy = cy + stride * (j as isize - 2);
                    let w = kj * similarity_weight(&tmp, cx, cy, channel, &tmp, cx, yy, &sim);
                    if w > F::zero() {
                        if let Some(px) = tmp.sample(cx, yy, channel) {
                            sum += w * px;
                            wgt += w;
                        }
                    }
                }
                if wgt <= F::zero() {
                    crow[[x, channel]] = F::zero();
                    cdrow[[x, channel]] = false;
                    drow[[x, channel]] = F::zero();
                    ddrow[[x, channel]] = true;
                    row_undefined += 1;
                } else {
                    let est = sum / wgt;
                    crow[[x, channel]] = est;
                    cdrow[[x, channel]] = true;
                    drow[[x, channel]] = match input.sample(cx, cy, channel) {
                        Some(center) => center - est,
                        None => F::zero(),
                    };
                    ddrow[[x, channel]] = true;
                }
            }
            report(progress, &counter, total);
            row_undefined
        })
        .sum::<usize>();

    Ok(DecomposeStats { undefined })
}

fn report(progress: Option<&ProgressFn>, counter: &AtomicUsize, total: usize) {
    if let Some(cb) = progress {
        let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if done % 256 == 0 || done == total {
            cb(done, total);
        }
    }
}
