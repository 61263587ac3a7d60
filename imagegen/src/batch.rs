//! Sequential batch generation driven by a JSON config.
//!
//! ```json
//! {
//!     "images": [
//!         {"name": "icon", "prompt": "App icon...", "aspect_ratio": "1:1"},
//!         {"name": "banner", "prompt": "Website banner...", "aspect_ratio": "16:9"}
//!     ],
//!     "defaults": {"image_size": "2K"}
//! }
//! ```
//!
//! Jobs run one after the other, in config order, with a fixed delay between
//! requests. A failing job is recorded in the [`BatchReport`] and never stops
//! the rest of the batch.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, ensure},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::{
    image_model::{self, AspectRatio, GenerationRequest, ImageApi, ImageSize},
    preview,
};

pub const DEFAULT_FORMAT: &str = "png";
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);
pub const NO_PROMPT: &str = "No prompt defined";
pub const NO_IMAGE: &str = "No image in response";

#[derive(Debug, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub images: Vec<BatchJobSpec>,
    #[serde(default)]
    pub defaults: JobOptions,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BatchJobSpec {
    pub name: Option<String>,
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub options: JobOptions,
}

/// The fields a job may inherit from `defaults`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct JobOptions {
    pub aspect_ratio: Option<AspectRatio>,
    pub image_size: Option<ImageSize>,
    pub input_image: Option<PathBuf>,
    /// File extension of the output, without the dot.
    pub format: Option<String>,
}

impl JobOptions {
    /// Fields set on `self` win, the rest are taken from `defaults`.
    pub fn merged_over(self, defaults: &JobOptions) -> JobOptions {
        JobOptions {
            aspect_ratio: self.aspect_ratio.or(defaults.aspect_ratio),
            image_size: self.image_size.or(defaults.image_size),
            input_image: self.input_image.or_else(|| defaults.input_image.clone()),
            format: self.format.or_else(|| defaults.format.clone()),
        }
    }
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        ensure!(path.exists(), "Config file not found: {}", path.display());
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("Couldn't read config {}", path.display()))?;
        serde_json::from_str(&text)
            .wrap_err_with(|| format!("Invalid batch config {}", path.display()))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub generated: Vec<GeneratedImage>,
    pub errors: Vec<FailedJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    pub name: String,
    pub path: PathBuf,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub name: String,
    pub error: String,
}

impl BatchReport {
    fn record_success(&mut self, name: String, path: PathBuf, prompt: String) {
        self.success += 1;
        self.generated.push(GeneratedImage { name, path, prompt });
    }

    fn record_failure(&mut self, name: String, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push(FailedJob {
            name,
            error: error.into(),
        });
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .wrap_err_with(|| format!("Couldn't write report to {}", path.display()))
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "BATCH GENERATION SUMMARY")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total: {}", self.total)?;
        writeln!(f, "Success: {}", self.success)?;
        write!(f, "Failed: {}", self.failed)?;

        if !self.generated.is_empty() {
            write!(f, "\n\nGenerated images:")?;
            for item in &self.generated {
                write!(f, "\n  - {}: {}", item.name, item.path.display())?;
            }
        }

        if !self.errors.is_empty() {
            write!(f, "\n\nErrors:")?;
            for item in &self.errors {
                write!(f, "\n  - {}: {}", item.name, item.error)?;
            }
        }
        Ok(())
    }
}

pub async fn run(
    api: &dyn ImageApi,
    config_path: &Path,
    output_dir: &Path,
    delay: Duration,
) -> Result<BatchReport> {
    let config = BatchConfig::load(config_path)?;
    run_config(api, config, output_dir, delay).await
}

pub async fn run_config(
    api: &dyn ImageApi,
    config: BatchConfig,
    output_dir: &Path,
    delay: Duration,
) -> Result<BatchReport> {
    let BatchConfig { images, defaults } = config;

    if images.is_empty() {
        warn!("No images defined in configuration");
        return Ok(BatchReport::default());
    }

    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Couldn't create output dir {}", output_dir.display()))?;

    let total = images.len();
    let mut report = BatchReport {
        total,
        ..Default::default()
    };

    for (idx, job) in (1..).zip(images) {
        let BatchJobSpec {
            name,
            prompt,
            options,
        } = job;
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("image_{idx}"));

        let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) else {
            warn!("[{idx}/{total}] Skipping '{name}': {NO_PROMPT}");
            report.record_failure(name, NO_PROMPT);
            continue;
        };

        let options = options.merged_over(&defaults);
        let format = options.format.as_deref().unwrap_or(DEFAULT_FORMAT);
        let output_file = output_dir.join(format!("{name}.{format}"));

        info!("[{idx}/{total}] Generating: {name}");
        info!("  Prompt: {}", preview(&prompt, 80));

        match generate_job(api, &prompt, options, &output_file).await {
            Ok(true) => {
                info!("  Success: {}", output_file.display());
                report.record_success(name, output_file, prompt);
            }
            Ok(false) => {
                warn!("  Failed: No image generated");
                report.record_failure(name, NO_IMAGE);
            }
            Err(e) => {
                error!("  Error: {e:#}");
                report.record_failure(name, format!("{e:#}"));
            }
        }

        if idx < total {
            info!("  Waiting {:.1}s before next request...", delay.as_secs_f64());
            sleep(delay).await;
        }
    }

    Ok(report)
}

async fn generate_job(
    api: &dyn ImageApi,
    prompt: &str,
    options: JobOptions,
    output_file: &Path,
) -> Result<bool> {
    let request = GenerationRequest::try_new(prompt)?
        .with_input_image(options.input_image)
        .with_aspect_ratio(options.aspect_ratio)
        .with_image_size(options.image_size);
    let result = image_model::generate(api, &request, output_file).await?;
    Ok(result.success)
}
