use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    model::{Coordinates, HistoryRecord},
    provider::truncate_body,
};

const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Hourly temperature archive from Open-Meteo. Needs no API key.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    base_url: String,
    http: Client,
}

impl Default for HistoryClient {
    fn default() -> Self {
        Self::with_base_url(ARCHIVE_URL)
    }
}

impl HistoryClient {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), http: Client::new() }
    }

    /// Hourly °F temperatures at `coordinates` from `start` to `end`, inclusive.
    pub async fn hourly_temperatures(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryRecord>> {
        if start > end {
            bail!("History start date {start} is after end date {end}");
        }

        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();
        let start_date = start.format("%Y-%m-%d").to_string();
        let end_date = end.format("%Y-%m-%d").to_string();

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
                ("hourly", "temperature_2m"),
                ("temperature_unit", "fahrenheit"),
                ("windspeed_unit", "mph"),
            ])
            .send()
            .await
            .context("Failed to send request to Open-Meteo (archive)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read Open-Meteo response body")?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow!("Open-Meteo rate limit reached. Please try again later."));
        }
        if !status.is_success() {
            return Err(anyhow!(
                "Open-Meteo request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: ArchiveResponse =
            serde_json::from_str(&body).context("Failed to parse Open-Meteo JSON")?;

        let records = build_history(parsed.hourly)?;
        tracing::info!(%start, %end, records = records.len(), "Fetched temperature history");
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: ArchiveHourly,
}

#[derive(Debug, Deserialize)]
struct ArchiveHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
}

fn build_history(hourly: ArchiveHourly) -> Result<Vec<HistoryRecord>> {
    if hourly.time.len() != hourly.temperature_2m.len() {
        tracing::warn!(
            times = hourly.time.len(),
            temperatures = hourly.temperature_2m.len(),
            "Archive series differ in length"
        );
    }

    hourly
        .time
        .into_iter()
        .zip(hourly.temperature_2m)
        .map(|(stamp, temperature_f)| -> Result<HistoryRecord> {
            // `2021-01-01T13:00`
            let (date, time) = stamp
                .split_once('T')
                .with_context(|| format!("Unexpected archive timestamp: {stamp}"))?;
            Ok(HistoryRecord { date: date.to_string(), time: format!("{time}:00"), temperature_f })
        })
        .collect()
}
