//! One-shot noise calibration over a raw mosaic.
//!
//! Runs three decoupled decomposition levels per channel, takes the
//! high-frequency residual `raw - coarse2` at every sampled mosaic position,
//! and estimates the noise standard deviation as a function of local
//! brightness: samples are bucketed by their coarse (level-0) brightness and
//! each bucket's sigma is the median absolute residual divided by 0.6745,
//! the MAD-to-sigma constant for a zero-mean Gaussian. The resulting curve
//! is what a two-parameter model `sigma^2 ~ a*signal + b` gets fitted to.
//!
//! The profiler runs on the *un-stabilized* raw: it measures the very noise
//! the stabilizing transform will later flatten.

use log::warn;
use std::io::{self, Write};

use crate::decompose::{decompose, DecomposeConfig, KernelShape, ProgressFn};
use crate::error::{RawtrousError, Result};
use crate::float_trait::RawFloat;
use crate::mosaic::CfaPattern;
use crate::surface::{PixelSurface, SurfaceMode};
use crate::weight::SimilarityConfig;

/// Number of brightness buckets of the calibration curve.
pub const BRIGHTNESS_BINS: usize = 200;

/// Number of decomposition levels the residual is taken against.
const PROFILE_LEVELS: usize = 3;

/// MAD-to-sigma conversion for a zero-mean Gaussian.
const MAD_TO_SIGMA: f64 = 0.6745;

/// One brightness bucket of the calibration curve, per channel.
#[derive(Debug, Clone, Copy)]
pub struct NoiseBin<F: RawFloat> {
    /// Brightness midpoint of the bucket, in normalized [0, 1].
    pub brightness: F,
    /// Robust noise standard deviation estimate per channel; zero where the
    /// bucket had no samples.
    pub sigma: [F; 3],
    /// Samples that fell into the bucket, per channel.
    pub count: [usize; 3],
    /// Fraction of the total sigma mass below this bucket, per channel.
    pub cdf: [F; 3],
}

/// The calibration output: one row per brightness bucket.
#[derive(Debug, Clone)]
pub struct NoiseCurve<F: RawFloat> {
    pub bins: Vec<NoiseBin<F>>,
}

impl<F: RawFloat> NoiseCurve<F> {
    /// Write the curve as a whitespace-separated table, one bucket per line:
    /// brightness, sigma x3, count x3, cdf x3. Suitable for external curve
    /// fitting or gnuplot.
    pub fn write_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for bin in &self.bins {
            writeln!(
                out,
                "{:.6} {:.6} {:.6} {:.6} {} {} {} {:.6} {:.6} {:.6}",
                bin.brightness,
                bin.sigma[0],
                bin.sigma[1],
                bin.sigma[2],
                bin.count[0],
                bin.count[1],
                bin.count[2],
                bin.cdf[0],
                bin.cdf[1],
                bin.cdf[2],
            )?;
        }
        Ok(())
    }
}

/// Decomposition settings used for calibration: the cheap decoupled passes,
/// channel weights from the filter pattern, and no range term (steepness 0
/// leaves only defined-sample gating, so the residual measures the noise
/// rather than what an edge stopper left of it).
pub fn profiler_decompose_config<F: RawFloat>(cfa: &CfaPattern) -> DecomposeConfig<F> {
    DecomposeConfig {
        shape: KernelShape::Separable1d,
        similarity: SimilarityConfig {
            steepness: F::zero(),
            ..SimilarityConfig::for_pattern(cfa)
        },
    }
}

/// Estimate the per-brightness noise curve of a raw mosaic surface.
pub fn noise_profile<F: RawFloat>(
    raw: &PixelSurface<F>,
    progress: Option<&ProgressFn>,
) -> Result<NoiseCurve<F>> {
    if raw.mode() != SurfaceMode::Mosaic {
        return Err(RawtrousError::ModeMismatch {
            expected: "Mosaic",
            actual: raw.mode().name(),
        });
    }
    let width = raw.width();
    let height = raw.height();
    let config = profiler_decompose_config::<F>(&raw.cfa().unwrap_or_default());

    // three decomposition levels; the detail surfaces are scratch, only the
    // coarse chain matters here
    let mut levels: Vec<PixelSurface<F>> = Vec::with_capacity(PROFILE_LEVELS);
    let mut detail = PixelSurface::dense(width, height)?;
    for scale in 0..PROFILE_LEVELS {
        let mut coarse = PixelSurface::dense(width, height)?;
        for channel in 0..3 {
            let stats = if scale == 0 {
                decompose(raw, &mut coarse, &mut detail, channel, scale, &config, progress)?
            } else {
                decompose(
                    &levels[scale - 1],
                    &mut coarse,
                    &mut detail,
                    channel,
                    scale,
                    &config,
                    progress,
                )?
            };
            if stats.incomplete() {
                warn!(
                    "filter pattern not filled after decomposition level {} (channel {}, {} samples undefined)",
                    scale, channel, stats.undefined
                );
            }
        }
        levels.push(coarse);
    }
    let coarse0 = &levels[0];
    let coarse2 = &levels[PROFILE_LEVELS - 1];

    // bucket |raw - coarse2| by coarse0 brightness, per channel
    let mut buckets: Vec<[Vec<F>; 3]> = (0..BRIGHTNESS_BINS)
        .map(|_| [Vec::new(), Vec::new(), Vec::new()])
        .collect();
    for y in 0..height as isize {
        for x in 0..width as isize {
            for c in 0..3 {
                let Some(v) = raw.sample(x, y, c) else {
                    continue;
                };
                // coverage gaps propagate as undefined; skip, never crash
                let (Some(brightness), Some(smooth)) =
                    (coarse0.sample(x, y, c), coarse2.sample(x, y, c))
                else {
                    continue;
                };
                let bin = bucket_of(brightness);
                buckets[bin][c].push((v - smooth).abs());
            }
        }
    }

    // robust sigma per bucket, then the cumulative fraction of sigma mass
    let mut bins = Vec::with_capacity(BRIGHTNESS_BINS);
    let mut sigma_sum = [F::zero(); 3];
    for bucket in &mut buckets {
        let mut sigma = [F::zero(); 3];
        let mut count = [0usize; 3];
        for c in 0..3 {
            count[c] = bucket[c].len();
            if count[c] > 0 {
                sigma[c] = median_of_slice(&mut bucket[c]) / F::from_f64_c(MAD_TO_SIGMA);
                sigma_sum[c] += sigma[c];
            }
        }
        bins.push((sigma, count));
    }

    let mut running = [F::zero(); 3];
    let curve = bins
        .into_iter()
        .enumerate()
        .map(|(i, (sigma, count))| {
            let mut cdf = [F::zero(); 3];
            for c in 0..3 {
                if sigma_sum[c] > F::zero() {
                    cdf[c] = running[c] / sigma_sum[c];
                }
                running[c] += sigma[c];
            }
            NoiseBin {
                brightness: F::from_f64_c((i as f64 + 0.5) / BRIGHTNESS_BINS as f64),
                sigma,
                count,
                cdf,
            }
        })
        .collect();

    Ok(NoiseCurve { bins: curve })
}

#[inline]
fn bucket_of<F: RawFloat>(brightness: F) -> usize {
    let b = brightness.to_f64().unwrap_or(0.0) * BRIGHTNESS_BINS as f64;
    (b.max(0.0) as usize).min(BRIGHTNESS_BINS - 1)
}

/// Median via quickselect; the absolute residuals have no NaNs by
/// construction.
fn median_of_slice<F: RawFloat>(data: &mut [F]) -> F {
    let len = data.len();
    let mid = len / 2;
    let (_, &mut median, _) = data.select_nth_unstable_by(mid, |a, b| {
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    });
    if len % 2 == 1 {
        median
    } else {
        // even length: average with the largest element of the lower half
        let prev = data[..mid]
            .iter()
            .fold(F::neg_infinity(), |a, &b| if b > a { b } else { a });
        (prev + median) / F::from_f64_c(2.0)
    }
}
