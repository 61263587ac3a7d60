use std::{
    collections::VecDeque,
    pin::Pin,
    sync::Mutex,
};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use color_eyre::{Result, eyre::eyre};
use serde_json::{Value, json};

use super::{
    ImageApi,
    gemini::gemini_api::{RequestBody, ResponseBody},
};

/// Replays canned responses in order and records every request body.
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<VecDeque<Result<ResponseBody>>>,
    requests: Mutex<Vec<Value>>,
}

impl FakeApi {
    pub fn new(responses: impl IntoIterator<Item = Result<ResponseBody>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    pub fn image_response(bytes: &[u8], text: Option<&str>) -> ResponseBody {
        let mut parts = vec![];
        if let Some(text) = text {
            parts.push(json!({ "text": text }));
        }
        parts.push(json!({
            "inlineData": { "mimeType": "image/png", "data": BASE64.encode(bytes) }
        }));
        serde_json::from_value(json!({ "candidates": [{ "content": { "parts": parts } }] }))
            .expect("valid response json")
    }

    pub fn text_response(text: &str) -> ResponseBody {
        serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .expect("valid response json")
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

impl ImageApi for FakeApi {
    fn generate_content<'a>(
        &'a self,
        body: &'a RequestBody,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseBody>> + Send + 'a>> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(body).expect("request body serializes"));
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(eyre!("FakeApi ran out of responses")));
        Box::pin(async move { next })
    }
}
