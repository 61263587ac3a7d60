use std::pin::Pin;

use color_eyre::Result;

use crate::{credential::ApiKey, image_model::ImageApi};

pub mod gemini_api;
use gemini_api::{RequestBody, ResponseBody};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const MODEL: &str = "gemini-3-pro-image-preview";

#[derive(Clone)]
pub struct Gemini {
    api_key: ApiKey,
    base_url: String,
    client: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The key is not part of this url, it is attached as a query parameter.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{MODEL}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl ImageApi for Gemini {
    fn generate_content<'a>(
        &'a self,
        body: &'a RequestBody,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseBody>> + Send + 'a>> {
        Box::pin(async move {
            gemini_api::generate_content(body, &self.endpoint(), &self.api_key, &self.client).await
        })
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::ensure;
    use expect_test::expect;
    use tempfile::tempdir;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    use super::*;
    use crate::image_model::{GenerationRequest, generate, gemini::gemini_api::GeminiApiError};

    /// Answers exactly one HTTP request with `status` and a JSON `body`.
    /// The task resolves to the request line it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> Result<(String, JoinHandle<Result<String>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let handle = tokio::spawn(answer_one(listener, status, body));
        Ok((base_url, handle))
    }

    async fn answer_one(listener: TcpListener, status: &str, body: &str) -> Result<String> {
        let (mut stream, _) = listener.accept().await?;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = stream.read(&mut chunk).await?;
            ensure!(n > 0, "connection closed before the headers ended");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < head_end + content_length {
            let n = stream.read(&mut chunk).await?;
            ensure!(n > 0, "connection closed before the body ended");
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(head.lines().next().unwrap_or_default().to_string())
    }

    fn prompt_body(prompt: &str) -> RequestBody {
        RequestBody::from_request(&GenerationRequest::try_new(prompt).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn server_error_is_returned_with_pretty_details() -> Result<()> {
        let (base_url, server) = serve_once(
            "500 Internal Server Error",
            r#"{"error":{"code":500,"message":"boom"}}"#,
        )
        .await?;
        let gemini = Gemini::new(ApiKey::new("k")).with_base_url(base_url);

        let err = gemini.generate_content(&prompt_body("x")).await.unwrap_err();
        server.await??;

        match err.downcast_ref::<GeminiApiError>() {
            Some(GeminiApiError::Server { status, details }) => {
                assert_eq!(*status, 500);
                assert!(details.contains("\n  \"error\": {"), "{details}");
                assert!(details.contains("\"message\": \"boom\""), "{details}");
            }
            other => panic!("unexpected error: {other:?} / {err:#}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn key_is_sent_url_encoded_as_query_parameter() -> Result<()> {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"no"}]}}]}"#,
        )
        .await?;
        let gemini = Gemini::new(ApiKey::new("k&y")).with_base_url(base_url);

        gemini.generate_content(&prompt_body("x")).await?;
        let request_line = server.await??;

        assert_eq!(
            request_line,
            "POST /models/gemini-3-pro-image-preview:generateContent?key=k%26y HTTP/1.1"
        );
        Ok(())
    }

    #[tokio::test]
    async fn text_only_answer_writes_no_file() -> Result<()> {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"no"}]}}]}"#,
        )
        .await?;
        let gemini = Gemini::new(ApiKey::new("k")).with_base_url(base_url);
        let dir = tempdir()?;
        let out = dir.path().join("out.png");

        let result = generate(&gemini, &GenerationRequest::try_new("x")?, &out).await?;
        server.await??;

        assert!(!result.success);
        assert_eq!(result.text_response.as_deref(), Some("no"));
        assert!(!out.exists());
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        drop(listener);
        let gemini = Gemini::new(ApiKey::new("k")).with_base_url(base_url);

        let err = gemini.generate_content(&prompt_body("x")).await.unwrap_err();

        assert_eq!(err.to_string(), "Network error");
        Ok(())
    }

    #[test]
    fn endpoint_url() {
        let gemini = Gemini::new(ApiKey::new("k"));
        expect![[r#"https://generativelanguage.googleapis.com/v1beta/models/gemini-3-pro-image-preview:generateContent"#]]
            .assert_eq(&gemini.endpoint());

        let local = Gemini::new(ApiKey::new("k")).with_base_url("http://localhost:8080/");
        assert_eq!(
            local.endpoint(),
            "http://localhost:8080/models/gemini-3-pro-image-preview:generateContent"
        );
    }
}
