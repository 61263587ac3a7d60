use std::{
    fs,
    path::{Path, PathBuf},
    pin::Pin,
};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use color_eyre::{
    Result,
    eyre::{WrapErr as _, ensure, eyre},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

pub mod gemini;
pub use gemini::Gemini;

use gemini::gemini_api::{RequestBody, ResponseBody};

#[cfg(test)]
pub(crate) mod fake;

/// Width:height of the generated image.
#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
)]
pub enum AspectRatio {
    #[strum(to_string = "1:1")]
    #[value(name = "1:1")]
    #[serde(rename = "1:1")]
    Ratio1x1,
    #[strum(to_string = "16:9")]
    #[value(name = "16:9")]
    #[serde(rename = "16:9")]
    Ratio16x9,
    #[strum(to_string = "9:16")]
    #[value(name = "9:16")]
    #[serde(rename = "9:16")]
    Ratio9x16,
    #[strum(to_string = "4:3")]
    #[value(name = "4:3")]
    #[serde(rename = "4:3")]
    Ratio4x3,
    #[strum(to_string = "3:4")]
    #[value(name = "3:4")]
    #[serde(rename = "3:4")]
    Ratio3x4,
    #[strum(to_string = "5:4")]
    #[value(name = "5:4")]
    #[serde(rename = "5:4")]
    Ratio5x4,
    #[strum(to_string = "4:5")]
    #[value(name = "4:5")]
    #[serde(rename = "4:5")]
    Ratio4x5,
}

/// Output resolution tier.
#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
)]
pub enum ImageSize {
    #[strum(to_string = "2K")]
    #[value(name = "2K")]
    #[serde(rename = "2K")]
    Standard,
    #[strum(to_string = "4K")]
    #[value(name = "4K")]
    #[serde(rename = "4K")]
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Image to transform instead of generating from scratch.
    pub input_image: Option<PathBuf>,
    pub aspect_ratio: Option<AspectRatio>,
    pub image_size: Option<ImageSize>,
}

impl GenerationRequest {
    pub fn try_new(prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        ensure!(!prompt.trim().is_empty(), "The prompt must not be empty");
        Ok(Self {
            prompt,
            input_image: None,
            aspect_ratio: None,
            image_size: None,
        })
    }

    pub fn with_input_image(mut self, path: Option<PathBuf>) -> Self {
        self.input_image = path;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<AspectRatio>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_image_size(mut self, image_size: Option<ImageSize>) -> Self {
        self.image_size = image_size;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    /// True iff an image was found in the response and written to `output_path`.
    pub success: bool,
    pub output_path: PathBuf,
    pub text_response: Option<String>,
}

/// A backend that answers one `generateContent` call.
pub trait ImageApi {
    fn generate_content<'a>(
        &'a self,
        body: &'a RequestBody,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseBody>> + Send + 'a>>;
}

/// Sends one request and stores the returned image at `output_path`.
///
/// Transport failures, API errors and a response without candidates are
/// returned as `Err`. A response that simply carries no image yields
/// `Ok` with `success == false` and nothing written.
pub async fn generate(
    api: &dyn ImageApi,
    request: &GenerationRequest,
    output_path: &Path,
) -> Result<GenerationResult> {
    let body = RequestBody::from_request(request)?;
    let response = api.generate_content(&body).await?;

    let Some(candidate) = response.candidates.first() else {
        let dump = serde_json::to_string_pretty(&response)?;
        error!("No candidates in response:\n{dump}");
        return Err(eyre!("No candidates in response"));
    };
    let parts = candidate
        .content
        .as_ref()
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();

    let mut result = GenerationResult {
        success: false,
        output_path: output_path.to_path_buf(),
        text_response: None,
    };
    let mut image = None;

    for part in parts {
        if let Some(text) = &part.text {
            info!("Model response: {text}");
            result.text_response = Some(text.clone());
        }

        if let Some(data) = part
            .inline_data
            .as_ref()
            .map(|d| d.data.as_str())
            .filter(|d| !d.is_empty())
        {
            let bytes = BASE64
                .decode(data)
                .wrap_err("Image data in response is not valid base64")?;
            image = Some(bytes);
        }
    }

    match image {
        Some(bytes) => {
            save_image(&bytes, output_path)?;
            result.success = true;
        }
        None => {
            warn!("No image was generated in the response");
            warn!("Response parts: {}", serde_json::to_string_pretty(parts)?);
        }
    }

    Ok(result)
}

fn save_image(bytes: &[u8], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Couldn't create directory {}", parent.display()))?;
    }
    fs::write(output_path, bytes)
        .wrap_err_with(|| format!("Couldn't write image to {}", output_path.display()))?;
    info!("Image saved to: {}", output_path.display());
    Ok(())
}
