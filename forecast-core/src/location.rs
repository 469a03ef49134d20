use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Works out where the caller is when no place was given.
#[async_trait]
pub trait LocationResolver: Send + Sync + std::fmt::Debug {
    /// A place name a weather provider can look up.
    async fn current_location(&self) -> Result<String>;
}

/// IP geolocation through ipinfo.io.
#[derive(Debug, Clone)]
pub struct IpInfoLocator {
    token: String,
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    region: Option<String>,
}

impl IpInfoLocator {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, "https://ipinfo.io")
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self { token, base_url: base_url.into(), http: Client::new() }
    }
}

#[async_trait]
impl LocationResolver for IpInfoLocator {
    async fn current_location(&self) -> Result<String> {
        let url = format!("{}/json", self.base_url.trim_end_matches('/'));

        let res = self
            .http
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .context("Failed to send request to ipinfo.io")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("ipinfo.io request failed with status {status}"));
        }

        let parsed: IpInfoResponse =
            res.json().await.context("Failed to parse ipinfo.io JSON")?;

        let place = non_empty(parsed.city)
            .or_else(|| non_empty(parsed.region))
            .unwrap_or_else(|| "Unknown".to_string());
        tracing::debug!(place = %place, "Resolved current location");
        Ok(place)
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Explicit place if given, otherwise the resolver's answer.
pub async fn place_or_current(place: Option<&str>, locator: &dyn LocationResolver) -> Result<String> {
    match place.map(str::trim).filter(|p| !p.is_empty()) {
        Some(place) => Ok(place.to_string()),
        None => locator.current_location().await,
    }
}
