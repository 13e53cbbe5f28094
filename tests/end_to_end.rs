//! End-to-end scenarios through the public API.

use ndarray::Array2;
use rawtrous::{
    decompose, denoise, noise_profile, synthesize, CfaPattern, DecomposeConfig, DenoiseConfig,
    NoiseModel, PixelSurface, ShrinkThreshold, SimilarityConfig, SynthesizeConfig,
};

#[test]
fn mid_gray_mosaic_reconstructs_exactly() {
    // all samples mid-gray: one decompose at scale 0 followed by a
    // zero-threshold synthesize must reproduce the dense mid-gray image
    let data = Array2::from_elem((4, 4), 100u16);
    let raw = PixelSurface::<f64>::from_raw(data, CfaPattern::RGGB, 0, 200).unwrap();

    let mut coarse = PixelSurface::dense(4, 4).unwrap();
    let mut detail = PixelSurface::dense(4, 4).unwrap();
    let dcfg = DecomposeConfig::default();
    let scfg = SynthesizeConfig {
        threshold: ShrinkThreshold::Fixed(0.0),
        boost: 1.0,
    };
    for channel in 0..3 {
        let stats = decompose(&raw, &mut coarse, &mut detail, channel, 0, &dcfg, None).unwrap();
        assert!(!stats.incomplete());
        synthesize(&mut coarse, &detail, channel, 0, &scfg).unwrap();
    }
    for y in 0..4 {
        for x in 0..4 {
            for c in 0..3 {
                let v = coarse.sample(x, y, c).unwrap();
                assert!((v - 0.5).abs() < 1e-12, "drift at ({x},{y},{c}): {v}");
            }
        }
    }
}

#[test]
fn outlier_stays_inside_support_window() {
    let mut data = Array2::from_elem((24, 24), 20000u16);
    data[[12, 12]] = u16::MAX;
    let raw = PixelSurface::<f32>::from_raw(data, CfaPattern::RGGB, 0, u16::MAX).unwrap();
    let base = 20000.0 / u16::MAX as f32;

    let cfg = DecomposeConfig {
        similarity: SimilarityConfig {
            steepness: 0.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut coarse = PixelSurface::dense(24, 24).unwrap();
    let mut detail = PixelSurface::dense(24, 24).unwrap();
    for channel in 0..3 {
        decompose(&raw, &mut coarse, &mut detail, channel, 0, &cfg, None).unwrap();
    }
    for y in 0..24i32 {
        for x in 0..24i32 {
            if (x - 12).abs() <= 2 && (y - 12).abs() <= 2 {
                continue;
            }
            for c in 0..3 {
                if let Some(v) = coarse.sample(x as isize, y as isize, c) {
                    assert!((v - base).abs() < 1e-5, "leak at ({x},{y},{c}): {v}");
                }
            }
        }
    }
}

#[test]
fn denoise_output_is_fully_defined() {
    let model = NoiseModel::new(7.34e-5f32, 3.48e-7).unwrap();
    let data = Array2::from_shape_fn((32, 32), |(y, x)| (12000 + 137 * ((x + y) % 16)) as u16);
    let raw = PixelSurface::<f32>::from_raw(data, CfaPattern::RGGB, 0, u16::MAX).unwrap();

    let out = denoise(raw, model, &DenoiseConfig::default(), None).unwrap();
    let bt = out.into_back_transform(model, 0.0, 1.0).unwrap();
    for y in 0..32 {
        for x in 0..32 {
            for c in 0..3 {
                let v = bt.sample(x, y, c).expect("reconstruction has coverage gap");
                assert!(v.is_finite());
            }
        }
    }
}

#[test]
fn profile_covers_every_sampled_position() {
    let data = Array2::from_shape_fn((48, 48), |(y, x)| (10000 + 400 * ((x * y) % 37)) as u16);
    let raw = PixelSurface::<f64>::from_raw(data, CfaPattern::RGGB, 0, u16::MAX).unwrap();
    let curve = noise_profile(&raw, None).unwrap();

    let total: usize = curve
        .bins
        .iter()
        .map(|b| b.count.iter().sum::<usize>())
        .sum();
    assert_eq!(total, 48 * 48);
    for bin in &curve.bins {
        for c in 0..3 {
            assert!(bin.sigma[c] >= 0.0 && bin.sigma[c].is_finite());
        }
    }
}
