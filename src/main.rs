//! Command-line frontend: profile sensor noise, dump wavelet pyramids, or
//! denoise a raw frame end to end.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;

use rawtrous::{
    build_pyramid, denoise, io::read_pgm16, io::write_pfm, noise_profile, CfaPattern,
    DenoiseConfig, NoiseModel, ProgressFn, ShrinkThreshold, SimilarityConfig,
};

#[derive(Parser)]
#[command(name = "rawtrous", version, about = "Noise-aware wavelet toolkit for raw sensor frames")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ModelArgs {
    /// Sensor gain (slope of the variance-vs-brightness line).
    #[arg(long, default_value_t = 7.34335232069023e-5)]
    gain: f64,
    /// Variance offset (read noise floor).
    #[arg(long, default_value_t = 3.47619065786586e-7)]
    offset: f64,
}

impl ModelArgs {
    fn model(&self) -> anyhow::Result<NoiseModel<f32>> {
        Ok(NoiseModel::new(self.gain as f32, self.offset as f32)?)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Estimate the sensor noise curve from a single raw frame.
    Profile {
        /// 16-bit binary PGM as produced by `dcraw -D -W -6`.
        input: PathBuf,
    },
    /// Decompose a raw frame and write each pyramid level as PFM.
    Decompose {
        input: PathBuf,
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, default_value_t = 5)]
        levels: usize,
        /// Output files are written as `<prefix>-coarse<s>.pfm` and
        /// `<prefix>-detail<s>.pfm`.
        #[arg(long, default_value = "pyramid")]
        prefix: String,
    },
    /// Denoise a raw frame and write the result as PFM.
    Denoise {
        input: PathBuf,
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, default_value_t = 3)]
        levels: usize,
        /// Fixed shrink threshold; omit to adapt per band.
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(short, long, default_value = "denoised.pfm")]
        output: PathBuf,
    },
}

fn stderr_progress(done: usize, total: usize) {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r{done}/{total}");
    if done == total {
        let _ = writeln!(err);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let progress: &ProgressFn = &stderr_progress;

    match cli.command {
        Command::Profile { input } => {
            let raw = read_pgm16::<f32>(&input, CfaPattern::RGGB)
                .with_context(|| format!("reading {}", input.display()))?;
            info!("profiling {}x{} frame", raw.width(), raw.height());
            let curve = noise_profile(&raw, Some(progress))?;
            let stdout = std::io::stdout();
            curve.write_table(&mut stdout.lock())?;
        }
        Command::Decompose {
            input,
            model,
            levels,
            prefix,
        } => {
            let model = model.model()?;
            let raw = read_pgm16::<f32>(&input, CfaPattern::RGGB)
                .with_context(|| format!("reading {}", input.display()))?;
            info!(
                "decomposing {}x{} frame into {levels} levels",
                raw.width(),
                raw.height()
            );
            let stabilized = raw.stabilize(model)?;
            // stabilized samples carry ~unit noise variance, so a floor of 2
            // absorbs the expected squared difference of two noisy samples
            let similarity = SimilarityConfig {
                noise_floor: 2.0,
                ..SimilarityConfig::for_pattern(&CfaPattern::RGGB)
            };
            let (coarses, details) =
                build_pyramid(&stabilized, levels, &similarity, Some(progress))?;
            for (scale, (coarse, detail)) in coarses.into_iter().zip(details).enumerate() {
                let back = coarse.into_back_transform(model, 0.0, 1.0)?;
                write_pfm(&back, &PathBuf::from(format!("{prefix}-coarse{scale}.pfm")))?;
                write_pfm(&detail, &PathBuf::from(format!("{prefix}-detail{scale}.pfm")))?;
            }
        }
        Command::Denoise {
            input,
            model,
            levels,
            threshold,
            output,
        } => {
            let model = model.model()?;
            let raw = read_pgm16::<f32>(&input, CfaPattern::RGGB)
                .with_context(|| format!("reading {}", input.display()))?;
            info!(
                "denoising {}x{} frame, {levels} levels",
                raw.width(),
                raw.height()
            );
            let mut config = DenoiseConfig::<f32> {
                levels,
                ..DenoiseConfig::for_pattern(&CfaPattern::RGGB)
            };
            if let Some(t) = threshold {
                config.synthesize.threshold = ShrinkThreshold::Fixed(t);
            }
            let result = denoise(raw, model, &config, Some(progress))?;
            let back = result.into_back_transform(model, 0.0, 1.0)?;
            write_pfm(&back, &output)
                .with_context(|| format!("writing {}", output.display()))?;
        }
    }
    Ok(())
}
