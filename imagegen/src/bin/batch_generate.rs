use std::{path::PathBuf, time::Duration};

use clap::Parser;
use color_eyre::{Result, eyre::ensure};
use imagegen::{batch, credential::ApiKey, image_model::Gemini};

/// Generate multiple images from a JSON configuration file, one request at a time.
///
/// Example config:
///
///   {"images": [{"name": "icon", "prompt": "App icon...", "aspect_ratio": "1:1"}],
///    "defaults": {"image_size": "2K"}}
#[derive(clap::Parser)]
struct Cli {
    /// Path to JSON configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for generated images
    #[arg(short, long, default_value = "./generated")]
    output_dir: PathBuf,

    /// Delay between requests in seconds
    #[arg(short, long, default_value = "2.0", value_parser = parse_delay)]
    delay: Duration,

    /// Also write the summary as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn parse_delay(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid delay: {secs}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    imagegen::init_logging();
    let Cli {
        config,
        output_dir,
        delay,
        report: report_path,
    } = Cli::parse();

    let gemini = Gemini::new(ApiKey::from_env()?);

    println!("Starting batch generation...");
    println!("Config: {}", config.display());
    println!("Output directory: {}", output_dir.display());

    let report = batch::run(&gemini, &config, &output_dir, delay).await?;

    println!("\n{report}");
    if let Some(path) = report_path {
        report.write_json(&path)?;
        println!("\nReport written to: {}", path.display());
    }

    ensure!(
        report.failed == 0,
        "{} of {} image(s) failed",
        report.failed,
        report.total
    );
    Ok(())
}
