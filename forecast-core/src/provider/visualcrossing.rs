use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::{
    location::{LocationResolver, place_or_current},
    model::{
        Coordinates, Dataset, Day, DayRecord, HOURS_PER_DAY, HourlyRecord, MAX_FORECAST_DAYS,
        Temperature,
    },
    provider::truncate_body,
};

const TIMELINE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

/// Hourly multi-day forecast from the Visual Crossing timeline API.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    api_key: String,
    base_url: String,
    http: Client,
    locator: Arc<dyn LocationResolver>,
}

impl ForecastClient {
    pub fn new(api_key: String, locator: Arc<dyn LocationResolver>) -> Self {
        Self::with_base_url(api_key, locator, TIMELINE_URL)
    }

    pub fn with_base_url(
        api_key: String,
        locator: Arc<dyn LocationResolver>,
        base_url: impl Into<String>,
    ) -> Self {
        Self { api_key, base_url: base_url.into(), http: Client::new(), locator }
    }

    /// Forecast for `place`, or for the caller's location when `None`.
    pub async fn forecast(&self, place: Option<&str>) -> Result<Dataset> {
        let location = place_or_current(place, self.locator.as_ref()).await?;

        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid forecast base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Forecast base URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .push(&location);

        let res = self
            .http
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("contentType", "json"),
                ("unitGroup", "metric"),
            ])
            .send()
            .await
            .context("Failed to send request to Visual Crossing (timeline)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read Visual Crossing response body")?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow!("Visual Crossing rate limit reached. Please try again later."));
        }
        if !status.is_success() {
            return Err(anyhow!(
                "Visual Crossing request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: VcResponse =
            serde_json::from_str(&body).context("Failed to parse Visual Crossing JSON")?;

        let dataset = build_dataset(parsed)?;
        tracing::info!(location = %location, days = dataset.days().len(), "Fetched forecast");
        Ok(dataset)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VcResponse {
    resolved_address: String,
    longitude: f64,
    latitude: f64,
    days: Vec<VcDay>,
}

#[derive(Debug, Deserialize)]
struct VcDay {
    datetime: String,
    tempmin: f64,
    tempmax: f64,
    #[serde(default)]
    hours: Vec<VcHour>,
}

#[derive(Debug, Deserialize)]
struct VcHour {
    datetime: String,
    temp: f64,
    humidity: f64,
    #[serde(default)]
    conditions: String,
}

fn build_dataset(resp: VcResponse) -> Result<Dataset> {
    let coordinates = Coordinates { longitude: resp.longitude, latitude: resp.latitude };

    let days = resp
        .days
        .into_iter()
        .take(MAX_FORECAST_DAYS)
        .map(|day| -> Result<DayRecord> {
            if day.hours.len() != HOURS_PER_DAY {
                tracing::warn!(date = %day.datetime, hours = day.hours.len(), "Unexpected hour count");
            }
            let hours = day
                .hours
                .into_iter()
                .take(HOURS_PER_DAY)
                .map(|h| {
                    HourlyRecord::new(
                        h.datetime,
                        Temperature::from_celsius(h.temp),
                        h.humidity.round().clamp(0.0, 100.0) as u8,
                        h.conditions,
                    )
                })
                .collect();

            Ok(DayRecord {
                location: resp.resolved_address.clone(),
                coordinates,
                day: Day {
                    date: us_date(&day.datetime)?,
                    min_temp: Temperature::from_celsius(day.tempmin),
                    max_temp: Temperature::from_celsius(day.tempmax),
                    hours,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Dataset::new(days))
}

/// `YYYY-MM-DD` -> `MM/DD/YYYY`
pub(crate) fn us_date(iso: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .with_context(|| format!("Unexpected date format: {iso}"))?;
    Ok(date.format("%m/%d/%Y").to_string())
}
