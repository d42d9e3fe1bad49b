//! Immutable capture metadata for one stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Reasons a captured stream is rejected at enqueue time.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream URL is empty")]
    EmptyUrl,
    #[error("invalid stream URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported URL scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),
    #[error("invalid page URL {url:?}: {source}")]
    InvalidPageUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// What the browser saw when it captured the stream. Never mutated after the
/// job is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
    /// Request headers observed on the captured request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    /// Display name chosen by the user; wins over `title` for file naming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

impl StreamDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            page_url: None,
            user_agent: None,
            captured_at: Utc::now(),
            headers: BTreeMap::new(),
            cookies: None,
            custom_name: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    /// Checks that the stream can be handed to the download tool.
    pub fn validate(&self) -> Result<(), StreamError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(StreamError::EmptyUrl);
        }
        let parsed = Url::parse(url).map_err(|source| StreamError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(StreamError::UnsupportedScheme(other.to_string())),
        }
        if let Some(page) = self.page_url.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Url::parse(page).map_err(|source| StreamError::InvalidPageUrl {
                url: page.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Name used for the output file: custom name, then page title, then "video".
    pub fn display_name(&self) -> &str {
        [self.custom_name.as_deref(), self.title.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("video")
    }

    /// `scheme://host[:port]` of the originating page, if known.
    pub fn page_origin(&self) -> Option<String> {
        let page = Url::parse(self.page_url.as_deref()?.trim()).ok()?;
        let origin = page.origin();
        if !origin.is_tuple() {
            return None;
        }
        Some(origin.ascii_serialization())
    }
}
