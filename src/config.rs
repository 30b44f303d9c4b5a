//! API endpoints configuration and client wiring.

use anyhow::{Context, Result};
use log::debug;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use std::fmt;

use crate::{
    http::{ApiClient, ReqwestTransport, RetryConfig},
    runtime::Runtime,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Environment variable holding the members API bearer token.
pub const MEMBERS_TOKEN_VAR: &str = "ADMINAPI_MEMBERS_TOKEN";

const API_PREFIX: &str = "api";

/// Base URLs for the backends this client talks to.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub api_base_url: String,
    pub members_api_url: Option<String>,
    pub members_api_token: Option<String>,
}

impl ApiConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            members_api_url: None,
            members_api_token: None,
        }
    }

    pub fn with_members(mut self, url: impl Into<String>, token: Option<String>) -> Self {
        self.members_api_url = Some(url.into());
        self.members_api_token = token;
        self
    }

    /// Resolves an endpoint against the main API.
    ///
    /// `"/events"`, `"events"`, `"/api/events"` and `"api/events"` all map to
    /// `{base}/api/events`. The prefix is matched as a whole path segment, so
    /// `"/apiary"` maps to `{base}/api/apiary` rather than being treated as
    /// already prefixed.
    pub fn build_api_url(&self, endpoint: &str) -> String {
        let path = endpoint.trim();
        let path = path.strip_prefix('/').unwrap_or(path);

        let first_segment = path.split(['/', '?', '#']).next().unwrap_or_default();
        if first_segment == API_PREFIX {
            join_url(&self.api_base_url, &format!("/{}", path))
        } else {
            join_url(&self.api_base_url, &format!("/{}/{}", API_PREFIX, path))
        }
    }

    /// Resolves an endpoint against the members API. No `/api` prefix is
    /// added. Returns `None` when no members URL is configured.
    pub fn build_members_api_url(&self, endpoint: &str) -> Option<String> {
        let base = self.members_api_url.as_deref()?;
        let path = endpoint.trim();
        let path = path.strip_prefix('/').unwrap_or(path);
        Some(join_url(base, &format!("/{}", path)))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_base_url", &self.api_base_url)
            .field("members_api_url", &self.members_api_url)
            .field(
                "members_api_token",
                &self.members_api_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Strips one trailing slash from `base` and appends `path`.
fn join_url(base: &str, path: &str) -> String {
    let base = base.strip_suffix('/').unwrap_or(base);
    format!("{}{}", base, path)
}

/// Masks all but the edges of a secret for log output.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

/// Everything a command needs: the runtime and a ready API client.
pub struct Config<R: Runtime> {
    pub runtime: R,
    pub api: ApiClient<ReqwestTransport>,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, api_url: Option<String>, members_url: Option<String>) -> Result<Self> {
        let mut api_config =
            ApiConfig::new(api_url.unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()));

        if let Some(members_url) = members_url {
            let token = runtime.env_var(MEMBERS_TOKEN_VAR).ok().filter(|t| !t.is_empty());
            if let Some(token) = &token {
                debug!(
                    "Using {} for members API authentication: {}",
                    MEMBERS_TOKEN_VAR,
                    mask_secret(token)
                );
            }
            api_config = api_config.with_members(members_url, token);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!("adminapi/", env!("ADMINAPI_VERSION")))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        let api = ApiClient::new(
            ReqwestTransport::new(client),
            api_config,
            RetryConfig::default(),
        );

        Ok(Self { runtime, api })
    }
}
