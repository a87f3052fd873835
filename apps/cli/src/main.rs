mod dump;
mod source;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use cap_texture_converter::{DeviceOptions, TextureConverter, create_device};
use clap::Parser;

/// Resamples a frame on the GPU and repacks it into raw B, G, R bytes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Image to convert. A generated test card is used when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output width
    #[arg(short, long, default_value_t = 640)]
    width: u32,

    /// Output height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Use the GPU backend's debug and validation layers
    #[arg(long)]
    gpu_debug: bool,

    /// Directory the converted bytes are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(path) => {
            println!("Wrote '{}'", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<PathBuf> {
    if cli.gpu_debug {
        tracing::info!("Using GPU debug layers");
    }
    tracing::info!(
        "Using a target width and height of {} x {}",
        cli.width,
        cli.height
    );

    let gpu = create_device(&DeviceOptions {
        debug: cli.gpu_debug,
        ..Default::default()
    })
    .await
    .context("Failed to open a GPU device")?;

    let info = gpu.adapter_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU ready");
    if !gpu.supports_conversion() {
        tracing::warn!("Adapter does not report R8Uint storage support, conversion will likely fail");
    }

    let mut converter = TextureConverter::new(&gpu.device, &gpu.queue, cli.width, cli.height)
        .context("Failed to create texture converter")?;

    let frame = match &cli.input {
        Some(path) => source::load_image(&gpu.device, &gpu.queue, path)?,
        None => source::test_card(&gpu.device, &gpu.queue),
    };

    let mut bytes = Vec::new();
    converter
        .process_input(&frame, &mut bytes)
        .context("Failed to convert frame")?;

    dump::write_raw(&cli.output_dir, &bytes, converter.dimensions())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["cap-texconv"]).unwrap();
        assert_eq!(cli.width, 640);
        assert_eq!(cli.height, 480);
        assert!(!cli.gpu_debug);
        assert!(cli.input.is_none());
    }

    #[test]
    fn rejects_non_numeric_width() {
        assert!(Cli::try_parse_from(["cap-texconv", "--width", "wide"]).is_err());
    }

    #[test]
    fn short_width_flag() {
        let cli = Cli::try_parse_from(["cap-texconv", "-w", "1280", "--height", "720"]).unwrap();
        assert_eq!((cli.width, cli.height), (1280, 720));
    }
}
