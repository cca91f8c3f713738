mod args;
mod config;

use anyhow::{Context, Result};
use args::ExportArgs;
use boxconv_core::{export_model, trace_forward, Conv2d, Tensor};
use clap::Parser;
use config::ExportSettings;
use log::{debug, info, LevelFilter};
use rand::{rngs::StdRng, SeedableRng};

fn main() -> Result<()> {
    init_logging(LevelFilter::Info)?;
    let args = ExportArgs::parse();
    let settings = resolve_settings(&args)?;
    run_export(&settings)
}

/// Initialize logging once, respecting `RUST_LOG` when set.
fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    // Logger may already be installed when tests drive main twice.
    let _ = builder.try_init();
    Ok(())
}

/// Merge the optional settings file with command-line overrides.
fn resolve_settings(args: &ExportArgs) -> Result<ExportSettings> {
    let mut settings = match args.config.as_ref() {
        Some(path) => ExportSettings::load_from_path(path)?,
        None => ExportSettings::default(),
    };

    if let Some(output) = args.output.as_ref() {
        settings.output = output.clone();
    }
    if let Some(opset) = args.opset {
        settings.opset = opset;
    }
    if let Some(seed) = args.seed {
        settings.seed = Some(seed);
    }
    if let Some(height) = args.height {
        settings.height = height;
    }
    if let Some(width) = args.width {
        settings.width = width;
    }

    Ok(settings)
}

/// The one-shot run: build the fixed operator, trace one forward pass over a
/// random input, and write the ONNX artifact.
fn run_export(settings: &ExportSettings) -> Result<()> {
    let mut conv = Conv2d::box_sum_3x3().context("failed to build box-sum operator")?;
    conv.eval();

    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let input = Tensor::randn([1usize, 1, settings.height, settings.width], &mut rng)
        .context("failed to generate input tensor")?;

    let (output, trace) = trace_forward(&conv, &input)?;
    debug!(
        "traced forward pass: input {:?} -> output {:?}",
        input.dims(),
        output.dims()
    );

    export_model(&trace, &settings.output, settings.opset)
        .with_context(|| format!("failed to export {}", settings.output.display()))?;
    info!(
        "exported {} (opset {}, input {}x{})",
        settings.output.display(),
        settings.opset,
        settings.height,
        settings.width
    );
    Ok(())
}
