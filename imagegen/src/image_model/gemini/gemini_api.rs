use std::{fs, path::Path, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use color_eyre::{
    Result,
    eyre::{WrapErr as _, ensure},
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    credential::ApiKey,
    image_model::{AspectRatio, GenerationRequest, ImageSize},
};

mod error;
pub use error::GeminiApiError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    InlineData { inline_data: Blob },
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Blob {
    pub mime_type: &'static str,
    /// base64
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
}

impl RequestBody {
    /// Reads and encodes the input image, if there is one.
    pub fn from_request(req: &GenerationRequest) -> Result<Self> {
        let mut parts = Vec::with_capacity(2);
        if let Some(path) = &req.input_image {
            parts.push(RequestPart::InlineData {
                inline_data: load_image(path)?,
            });
        }
        parts.push(RequestPart::Text {
            text: req.prompt.clone(),
        });

        let image_config = (req.aspect_ratio.is_some() || req.image_size.is_some()).then_some(
            ImageConfig {
                aspect_ratio: req.aspect_ratio,
                image_size: req.image_size,
            },
        );

        Ok(Self {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Text, Modality::Image],
                image_config,
            },
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default, alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

/// Unknown extensions are labelled as png.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/png",
    }
}

pub fn load_image(path: &Path) -> Result<Blob> {
    ensure!(path.is_file(), "Image file not found: {}", path.display());
    let bytes =
        fs::read(path).wrap_err_with(|| format!("Couldn't read image {}", path.display()))?;
    Ok(Blob {
        mime_type: mime_type_for(path),
        data: BASE64.encode(bytes),
    })
}

pub async fn generate_content(
    body: &RequestBody,
    endpoint: &str,
    api_key: &ApiKey,
    client: &reqwest::Client,
) -> Result<ResponseBody> {
    debug!(
        "POST {endpoint} with {} part(s), generation config: {:?}",
        body.contents.iter().map(|c| c.parts.len()).sum::<usize>(),
        body.generation_config
    );

    let resp = client
        .post(endpoint)
        .query(&[("key", api_key.as_str())])
        .timeout(REQUEST_TIMEOUT)
        .json(body)
        .send()
        .await
        .wrap_err("Network error")?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp
            .text()
            .await
            .wrap_err_with(|| format!("Couldn't read the body of the {status} response"))?;
        return Err(GeminiApiError::from_response(status.as_u16(), &text).into());
    }

    resp.json::<ResponseBody>()
        .await
        .wrap_err("Couldn't decode the API response")
}
