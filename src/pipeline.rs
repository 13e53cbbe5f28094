//! Full decompose/reconstruct pipeline.
//!
//! Wires the pyramid together the way a denoising run uses it: stabilize the
//! raw input, decompose over increasing scales, then reconstruct from the
//! coarsest level back down, injecting each level's detail through the
//! adaptive shrinkage. Sequencing is strict: level `s + 1` only ever reads a
//! fully written level-`s` coarse surface, and synthesis at level `s` waits
//! for the complete reconstruction of level `s + 1`.

use log::warn;

use crate::decompose::{decompose, DecomposeConfig, KernelShape, ProgressFn, MAX_SCALE};
use crate::error::{RawtrousError, Result};
use crate::float_trait::RawFloat;
use crate::mosaic::CfaPattern;
use crate::stabilize::NoiseModel;
use crate::surface::PixelSurface;
use crate::synthesize::{synthesize, SynthesizeConfig};
use crate::weight::{SimilarityConfig, WeightMode};

/// Configuration of a full denoising run.
#[derive(Debug, Clone, Copy)]
pub struct DenoiseConfig<F: RawFloat> {
    /// Number of pyramid levels (scales `0..levels`).
    pub levels: usize,
    /// Similarity kernel settings for the stabilized domain. The default
    /// noise floor of 2 assumes the ~unit noise variance the stabilizing
    /// transform produces.
    pub similarity: SimilarityConfig<F>,
    pub synthesize: SynthesizeConfig<F>,
}

impl<F: RawFloat> Default for DenoiseConfig<F> {
    fn default() -> Self {
        Self {
            levels: 3,
            similarity: SimilarityConfig {
                noise_floor: F::from_f64_c(2.0),
                ..Default::default()
            },
            synthesize: SynthesizeConfig::default(),
        }
    }
}

impl<F: RawFloat> DenoiseConfig<F> {
    /// Default run configuration with similarity channel weights derived
    /// from the filter pattern instead of the Bayer-shaped `[1, 2, 1]`.
    pub fn for_pattern(cfa: &CfaPattern) -> Self {
        Self {
            similarity: SimilarityConfig {
                noise_floor: F::from_f64_c(2.0),
                ..SimilarityConfig::for_pattern(cfa)
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.levels == 0 || self.levels > MAX_SCALE + 1 {
            return Err(RawtrousError::InvalidConfig(format!(
                "pyramid depth must lie in 1..={}, got {}",
                MAX_SCALE + 1,
                self.levels
            )));
        }
        self.similarity.validate()?;
        self.synthesize.validate()
    }
}

/// Decompose a (stabilized) input over `levels` scales.
///
/// Returns the coarse surfaces, finest first, and the matching detail
/// surfaces. Scale 0 runs with the hardened binary weight so that noise
/// cannot leak into the finest coarse estimate; later scales use the soft
/// stopper.
pub fn build_pyramid<F: RawFloat>(
    input: &PixelSurface<F>,
    levels: usize,
    similarity: &SimilarityConfig<F>,
    progress: Option<&ProgressFn>,
) -> Result<(Vec<PixelSurface<F>>, Vec<PixelSurface<F>>)> {
    let width = input.width();
    let height = input.height();
    let mut coarses: Vec<PixelSurface<F>> = Vec::with_capacity(levels);
    let mut details: Vec<PixelSurface<F>> = Vec::with_capacity(levels);

    for scale in 0..levels {
        let config = DecomposeConfig {
            shape: KernelShape::Coupled2d,
            similarity: SimilarityConfig {
                mode: if scale == 0 {
                    WeightMode::Hard
                } else {
                    WeightMode::Soft
                },
                ..*similarity
            },
        };
        let mut coarse = PixelSurface::dense(width, height)?;
        let mut detail = PixelSurface::dense(width, height)?;
        for channel in 0..3 {
            let level_input: &PixelSurface<F> = if scale == 0 {
                input
            } else {
                &coarses[scale - 1]
            };
            let stats = decompose(
                level_input,
                &mut coarse,
                &mut detail,
                channel,
                scale,
                &config,
                progress,
            )?;
            if stats.incomplete() {
                warn!(
                    "decomposition level {} left {} samples undefined (channel {})",
                    scale, stats.undefined, channel
                );
            }
        }
        coarses.push(coarse);
        details.push(detail);
    }
    Ok((coarses, details))
}

/// Denoise a raw mosaic surface.
///
/// Consumes the raw surface (it becomes the stabilized view), runs the full
/// pyramid, and returns the dense reconstruction, still in the stabilized
/// domain. Apply [`PixelSurface::into_back_transform`] before writing it
/// out.
pub fn denoise<F: RawFloat>(
    raw: PixelSurface<F>,
    model: NoiseModel<F>,
    config: &DenoiseConfig<F>,
    progress: Option<&ProgressFn>,
) -> Result<PixelSurface<F>> {
    config.validate()?;
    let stabilized = raw.stabilize(model)?;
    let (mut coarses, details) = build_pyramid(
        &stabilized,
        config.levels,
        &config.similarity,
        progress,
    )?;

    // reconstruct coarsest-first; the last coarse surface becomes the output
    let mut output = coarses.pop().ok_or_else(|| {
        RawtrousError::InvalidConfig("denoise needs at least one pyramid level".into())
    })?;
    for scale in (0..config.levels).rev() {
        for channel in 0..3 {
            synthesize(
                &mut output,
                &details[scale],
                channel,
                scale,
                &config.synthesize,
            )?;
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mosaic::CfaPattern;
    use crate::synthesize::ShrinkThreshold;
    use ndarray::Array2;
    use rand::prelude::*;
    use rand_distr::{Distribution, Normal};

    const A: f64 = 7.34335232069023e-05;
    const B: f64 = 3.47619065786586e-07;

    #[test]
    fn test_denoise_rejects_dense_input() {
        let model = NoiseModel::new(A as f32, B as f32).unwrap();
        let surf = PixelSurface::<f32>::dense(8, 8).unwrap();
        let cfg = DenoiseConfig::default();
        assert!(denoise(surf, model, &cfg, None).is_err());
    }

    #[test]
    fn test_denoise_rejects_degenerate_depths() {
        let zero = DenoiseConfig::<f32> {
            levels: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        // deeper than the dyadic stride can represent
        let too_deep = DenoiseConfig::<f32> {
            levels: 100,
            ..Default::default()
        };
        assert!(too_deep.validate().is_err());
    }

    #[test]
    fn test_for_pattern_matches_bayer_default() {
        let cfg = DenoiseConfig::<f32>::for_pattern(&CfaPattern::RGGB);
        assert_eq!(cfg.similarity.channel_weights, [1.0, 2.0, 1.0]);
        assert_eq!(cfg.similarity.noise_floor, 2.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_flat_input_reconstructs_flat() {
        let model = NoiseModel::new(A, B).unwrap();
        let data = Array2::from_elem((16, 16), 30000u16);
        let raw = PixelSurface::<f64>::from_raw(data, CfaPattern::RGGB, 0, u16::MAX).unwrap();
        let expected = 30000.0 / u16::MAX as f64;

        let cfg = DenoiseConfig {
            levels: 2,
            ..Default::default()
        };
        let out = denoise(raw, model, &cfg, None).unwrap();
        let bt = out.into_back_transform(model, 0.0, 1.0).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                for c in 0..3 {
                    let v = bt.sample(x, y, c).unwrap();
                    assert!(
                        (v - expected).abs() < 1e-3,
                        "flat field drifted at ({x},{y},{c}): {v}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_denoise_reduces_noise_energy() {
        let model = NoiseModel::new(1e-3f64, 1e-6).unwrap();
        let (w, h) = (64, 64);
        let base = 0.4f64;
        let sigma = (1e-3 * base + 1e-6f64).sqrt();
        let mut rng = StdRng::seed_from_u64(77);
        let normal = Normal::new(0.0, sigma).unwrap();
        let mut data = Array2::zeros((h, w));
        for y in 0..h {
            for x in 0..w {
                let v = (base + normal.sample(&mut rng)).clamp(0.0, 1.0);
                data[[y, x]] = (v * u16::MAX as f64).round() as u16;
            }
        }
        let raw = PixelSurface::<f64>::from_raw(data, CfaPattern::RGGB, 0, u16::MAX).unwrap();

        let cfg = DenoiseConfig::default();
        let out = denoise(raw, model, &cfg, None).unwrap();
        let bt = out.into_back_transform(model, 0.0, 1.0).unwrap();

        // residual variance of the reconstruction against the true flat field
        let mut sum_sq = 0.0;
        let mut n = 0usize;
        for y in 0..h as isize {
            for x in 0..w as isize {
                for c in 0..3 {
                    if let Some(v) = bt.sample(x, y, c) {
                        sum_sq += (v - base) * (v - base);
                        n += 1;
                    }
                }
            }
        }
        let residual_var = sum_sq / n as f64;
        assert!(
            residual_var < sigma * sigma * 0.5,
            "denoising should at least halve the noise variance: {residual_var} vs {}",
            sigma * sigma
        );
    }

    #[test]
    fn test_fixed_zero_threshold_keeps_detail() {
        // with thrs = 0 and boost = 1 the pyramid is a partition of unity:
        // reconstruction equals the level-0 interpolation of the input
        let model = NoiseModel::new(A, B).unwrap();
        let mut data = Array2::zeros((16, 16));
        for y in 0..16usize {
            for x in 0..16usize {
                data[[y, x]] = (10000 + 500 * ((x + 2 * y) % 9)) as u16;
            }
        }
        let raw = PixelSurface::<f64>::from_raw(data, CfaPattern::RGGB, 0, u16::MAX).unwrap();
        let stabilized = raw.clone().stabilize(model).unwrap();

        let cfg = DenoiseConfig {
            levels: 3,
            synthesize: SynthesizeConfig {
                threshold: ShrinkThreshold::Fixed(0.0),
                boost: 1.0,
            },
            ..Default::default()
        };
        let out = denoise(raw, model, &cfg, None).unwrap();

        // at every sampled mosaic position the reconstruction must carry
        // the stabilized input value exactly (telescoping sum of details)
        for y in 0..16isize {
            for x in 0..16isize {
                for c in 0..3 {
                    if let Some(v) = stabilized.sample(x, y, c) {
                        let r = out.sample(x, y, c).unwrap();
                        assert!(
                            (r - v).abs() < 1e-9,
                            "lossless reconstruction failed at ({x},{y},{c})"
                        );
                    }
                }
            }
        }
    }
}
