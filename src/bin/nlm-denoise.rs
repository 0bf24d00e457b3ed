use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use nlm_denoise::filters::nlm::{DEFAULT_K, DEFAULT_PATCH_RADIUS, DEFAULT_RADIUS};
use nlm_denoise::io::{load_buffer, write_outputs, JobPaths, DEFAULT_INPUT_EXT};
use nlm_denoise::{denoise, FilterParameters};

#[derive(Parser, Debug)]
#[command(name = "nlm-denoise")]
#[command(about = "Variance-aware non-local means denoiser for Monte-Carlo renders")]
struct Cli {
    /// Color image (or any path with the same base name); `<name>_variance.<ext>` must exist next to it
    input: PathBuf,

    /// Search window radius r
    #[arg(short = 'r', long = "radius", default_value_t = DEFAULT_RADIUS)]
    radius: usize,

    /// Patch radius f
    #[arg(short = 'f', long = "patch-radius", default_value_t = DEFAULT_PATCH_RADIUS)]
    patch_radius: usize,

    /// Damping constant k
    #[arg(short = 'k', default_value_t = DEFAULT_K)]
    k: f32,

    /// Extension of the color and variance inputs
    #[arg(long, default_value = DEFAULT_INPUT_EXT)]
    color_ext: String,

    /// Output path (default: `<name>_denoised.png`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the denoised linear buffer next to the output as OpenEXR
    #[arg(long)]
    save_linear: bool,

    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Log per-offset progress
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "info,nlm_denoise=debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .try_init();

    let params = FilterParameters::new(cli.radius, cli.patch_radius, cli.k)?;

    let mut paths = JobPaths::from_input(&cli.input, &cli.color_ext);
    if let Some(output) = cli.output.clone() {
        paths.output = output;
    }

    let color = load_buffer(&paths.color).context("loading color image")?;
    let variance = load_buffer(&paths.variance).context("loading variance image")?;

    info!("Denoising '{}'", paths.color.display());
    let start = Instant::now();
    let denoised = match cli.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("building thread pool")?
            .install(|| denoise(color.view(), variance.view(), &params))?,
        None => denoise(color.view(), variance.view(), &params)?,
    };
    let secs = start.elapsed().as_secs_f64();
    info!(
        "Finished denoising in {} seconds ({:.2} minutes)",
        secs.round(),
        secs / 60.0
    );

    let written = write_outputs(denoised.view(), &paths, cli.save_linear)
        .with_context(|| format!("writing {}", paths.output.display()))?;
    for path in written {
        info!("Wrote {}", path.display());
    }

    Ok(())
}
