use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::{
    icons::IconFetcher,
    model::TaxonomyEntry,
    provider::truncate_body,
    taxonomy::TaxonomySource,
};

const SITE_URL: &str = "https://openweathermap.org";

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b([^>]*)>(.*?)</table>").expect("valid regex"));
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)class\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid regex"));
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// The icon table on OpenWeather's "weather conditions" page.
#[derive(Debug, Clone)]
pub struct OpenWeatherConditionsPage {
    base_url: String,
    http: Client,
}

impl Default for OpenWeatherConditionsPage {
    fn default() -> Self {
        Self::with_base_url(SITE_URL)
    }
}

impl OpenWeatherConditionsPage {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: Client::new() }
    }

    async fn fetch_page(&self) -> Result<String> {
        let url = format!("{}/weather-conditions", self.base_url.trim_end_matches('/'));

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to send request to OpenWeather (weather conditions page)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather conditions page body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather conditions page request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl TaxonomySource for OpenWeatherConditionsPage {
    async fn scrape_taxonomy(&self) -> Result<Vec<TaxonomyEntry>> {
        let html = self.fetch_page().await?;
        parse_conditions_table(&html)
    }
}

/// Rows of the first `<table class="table">`: icon code from the first
/// cell, title-cased description from the last. Rows with fewer than
/// three cells are skipped.
pub fn parse_conditions_table(html: &str) -> Result<Vec<TaxonomyEntry>> {
    let table = TABLE_RE
        .captures_iter(html)
        .find(|caps| {
            CLASS_RE.captures(&caps[1]).is_some_and(|class| {
                class[1].split_whitespace().any(|c| c.eq_ignore_ascii_case("table"))
            })
        })
        .map(|caps| caps[2].to_string())
        .ok_or_else(|| anyhow!("No <table class=\"table\"> found on conditions page"))?;

    let entries = ROW_RE
        .captures_iter(&table)
        .filter_map(|row| {
            let cells: Vec<String> =
                CELL_RE.captures_iter(&row[1]).map(|c| cell_text(&c[1])).collect();
            if cells.len() < 3 {
                return None;
            }
            let icon_code: String = cells[0].chars().take(3).collect();
            let description = title_case(&cells[cells.len() - 1]);
            Some(TaxonomyEntry { icon_code, description })
        })
        .collect();

    Ok(entries)
}

fn cell_text(inner: &str) -> String {
    let text = TAG_RE.replace_all(inner, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Condition icons served at `img/wn/<code>@2x.png`.
#[derive(Debug, Clone)]
pub struct OpenWeatherIcons {
    base_url: String,
    http: Client,
}

impl Default for OpenWeatherIcons {
    fn default() -> Self {
        Self::with_base_url(SITE_URL)
    }
}

impl OpenWeatherIcons {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: Client::new() }
    }
}

#[async_trait]
impl IconFetcher for OpenWeatherIcons {
    async fn fetch_icon_bytes(&self, icon_code: &str) -> Result<Vec<u8>> {
        let url = format!("{}/img/wn/{icon_code}@2x.png", self.base_url.trim_end_matches('/'));

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request for icon {icon_code}"))?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Icon request for {icon_code} failed with status {status}"));
        }

        let bytes = res
            .bytes()
            .await
            .with_context(|| format!("Failed to read icon {icon_code} body"))?;
        Ok(bytes.to_vec())
    }
}
