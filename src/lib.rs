//! Noise-aware multiresolution wavelet engine for raw mosaiced sensor data.
//!
//! Decomposes a raw frame into an a-trous wavelet pyramid with
//! edge-avoiding bilateral weights, shrinks detail coefficients with a
//! BayesShrink-style adaptive threshold, and can profile a sensor's
//! signal-dependent noise from a single frame. All heavy loops run
//! row-parallel over rayon.

pub mod decompose;
pub mod error;
pub mod float_trait;
pub mod io;
pub mod mosaic;
pub mod pipeline;
pub mod profile;
pub mod stabilize;
pub mod surface;
pub mod synthesize;
pub mod weight;

// Re-export commonly used types at the crate root
pub use decompose::{decompose, DecomposeConfig, DecomposeStats, KernelShape, ProgressFn, MAX_SCALE};
pub use error::{RawtrousError, Result};
pub use float_trait::RawFloat;
pub use mosaic::CfaPattern;
pub use pipeline::{build_pyramid, denoise, DenoiseConfig};
pub use profile::{noise_profile, NoiseBin, NoiseCurve};
pub use stabilize::NoiseModel;
pub use surface::{PixelSurface, SurfaceMode};
pub use synthesize::{synthesize, ShrinkThreshold, SynthesizeConfig};
pub use weight::{similarity_weight, ChannelSpan, SimilarityConfig, WeightMode};
