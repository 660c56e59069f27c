//! Endpoint resolution for OpenAI-compatible chat services.
//!
//! Values are looked up in the environment, primary names first and legacy
//! aliases second:
//!
//! | value    | primary            | legacy           | default              |
//! |----------|--------------------|------------------|----------------------|
//! | base URL | `OPENAI_BASE_URL`  | `SAVI_API_BASE`  | none (not configured)|
//! | API key  | `OPENAI_API_KEY`   | `SAVI_API_KEY`   | none                 |
//! | model    | `OPENAI_MODEL`     | `SAVI_MODEL`     | `gpt-4o`             |
//! | path     | `SAVI_API_PATH`    |                  | `/chat/completions`  |

use serde::{Deserialize, Serialize};

/// Default model when neither `OPENAI_MODEL` nor `SAVI_MODEL` is set.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default request path appended to a bare base URL.
pub const DEFAULT_API_PATH: &str = "/chat/completions";

/// Default client-side request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Resolved connection settings for a chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Full URL of the completions route, empty when unconfigured.
    pub url: String,
    /// Request path joined onto a bare base URL.
    #[serde(default = "default_api_path")]
    pub api_path: String,
    /// Bearer token, if any.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_path: DEFAULT_API_PATH.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EndpointConfig {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings through an arbitrary variable lookup.
    ///
    /// Empty values count as unset, so an exported-but-blank primary
    /// variable still falls through to its legacy alias.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base = get("OPENAI_BASE_URL")
            .or_else(|| get("SAVI_API_BASE"))
            .unwrap_or_default();
        let path = get("SAVI_API_PATH").unwrap_or_else(|| DEFAULT_API_PATH.to_string());

        Self {
            url: join_endpoint(&base, &path),
            api_path: path,
            api_key: get("OPENAI_API_KEY").or_else(|| get("SAVI_API_KEY")),
            model: get("OPENAI_MODEL")
                .or_else(|| get("SAVI_MODEL"))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Override the endpoint URL (base or full completions route).
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.url = join_endpoint(base, &self.api_path);
        self
    }

    /// Override the bearer token.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Override the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Whether an endpoint URL is available. Absent ⇒ synthetic mode.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }
}

fn default_api_path() -> String {
    DEFAULT_API_PATH.to_string()
}

/// Join a base URL and request path.
///
/// A base that already names the completions route is used verbatim.
fn join_endpoint(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.is_empty() {
        return String::new();
    }
    if base.ends_with("/chat/completions") {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
