use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use docmark::config::{Config, LogFormat};
use docmark::{WatermarkConfig, Watermarker};

/// Docmark - stamp a text watermark onto images, PDF, DOCX and XLSX files
#[derive(Parser, Debug)]
#[command(name = "docmark")]
#[command(version, about, long_about = None)]
struct Args {
    /// Files to watermark
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for watermarked output
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Watermark text
    #[arg(long)]
    text: Option<String>,

    /// Opacity from 0.0 to 1.0
    #[arg(long)]
    opacity: Option<f32>,

    /// Font size in points or pixels
    #[arg(long)]
    font_size: Option<u32>,

    /// Text color as #RGB or #RRGGBB
    #[arg(long)]
    color: Option<String>,

    /// Clockwise rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<f32>,

    /// center, top-left, top-right, bottom-left, bottom-right or diagonal
    #[arg(long)]
    position: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Args {
    /// Command-line values win over the config file.
    fn apply_overrides(&self, config: &mut Config) {
        let settings = &mut config.watermark;
        if let Some(text) = &self.text {
            settings.text = text.clone();
        }
        if let Some(opacity) = self.opacity {
            settings.opacity = opacity;
        }
        if let Some(font_size) = self.font_size {
            settings.font_size = font_size;
        }
        if let Some(color) = &self.color {
            settings.color = color.clone();
        }
        if let Some(rotation) = self.rotation {
            settings.rotation_degrees = rotation;
        }
        if let Some(position) = &self.position {
            settings.position = position.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    args.apply_overrides(&mut config);
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;
    Ok(config)
}

/// Watermark one file and move the result into place. A failure never
/// leaves a partial output file behind.
fn process_input(
    watermarker: &Watermarker,
    input: &Path,
    output_dir: &Path,
    config: &WatermarkConfig,
) -> Result<PathBuf> {
    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid input path {}", input.display()))?;
    let bytes =
        fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let output = watermarker.watermark(file_name, &bytes, config)?;

    let target = output_dir.join(&output.file_name);
    let partial = output_dir.join(format!(".{}.partial", output.file_name));
    let written = fs::write(&partial, &output.bytes).and_then(|_| fs::rename(&partial, &target));
    if let Err(e) = written {
        let _ = fs::remove_file(&partial);
        return Err(e).with_context(|| format!("Failed to write {}", target.display()));
    }

    tracing::info!(
        input = %input.display(),
        output = %target.display(),
        kind = output.kind.as_str(),
        failed_units = output.report.failed,
        "Wrote watermarked file"
    );
    Ok(target)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = docmark::logging::init_subscriber(config.logging.format, &config.logging.level)
    {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let watermark = match config.watermark.to_config() {
        Ok(watermark) => watermark,
        Err(e) => {
            tracing::error!(error = %e, "Invalid watermark settings");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::create_dir_all(&args.output_dir) {
        tracing::error!(
            output_dir = %args.output_dir.display(),
            error = %e,
            "Failed to create output directory"
        );
        return ExitCode::FAILURE;
    }

    let watermarker = Watermarker::from_config(&config);
    let mut failures = 0usize;
    for input in &args.inputs {
        if let Err(e) = process_input(&watermarker, input, &args.output_dir, &watermark) {
            failures += 1;
            tracing::error!(
                input = %input.display(),
                error = %format!("{:#}", e),
                "Failed to watermark file"
            );
        }
    }

    tracing::info!(
        files = args.inputs.len(),
        failures,
        font_source = watermarker.fonts().source().as_str(),
        "Finished"
    );

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
