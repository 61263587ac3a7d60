use std::fmt;

use color_eyre::{Result, Section as _, eyre::eyre};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// The Gemini API key. Read once at startup and handed to the client.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_env() -> Result<Self> {
        Self::from_var(API_KEY_VAR)
    }

    pub fn from_var(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self(key)),
            _ => Err(eyre!("{var} environment variable is not set")
                .suggestion(format!("Set it with: export {var}='your-api-key'"))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
