use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    location::{LocationResolver, place_or_current},
    model::WeatherReport,
    provider::{truncate_body, visualcrossing::us_date},
};

const CURRENT_URL: &str = "http://api.weatherapi.com/v1/current.json";

/// Current conditions from weatherapi.com.
#[derive(Debug, Clone)]
pub struct CurrentWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
    locator: Arc<dyn LocationResolver>,
}

impl CurrentWeatherClient {
    pub fn new(api_key: String, locator: Arc<dyn LocationResolver>) -> Self {
        Self::with_base_url(api_key, locator, CURRENT_URL)
    }

    pub fn with_base_url(
        api_key: String,
        locator: Arc<dyn LocationResolver>,
        base_url: impl Into<String>,
    ) -> Self {
        Self { api_key, base_url: base_url.into(), http: Client::new(), locator }
    }

    pub async fn current(&self, place: Option<&str>) -> Result<WeatherReport> {
        let location = place_or_current(place, self.locator.as_ref()).await?;

        let res = self
            .http
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str()), ("q", location.as_str())])
            .send()
            .await
            .context("Failed to send request to WeatherAPI.com (current)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read WeatherAPI current response body")?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow::anyhow!("WeatherAPI rate limit reached. Please try again later."));
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "WeatherAPI current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: WaResponse =
            serde_json::from_str(&body).context("Failed to parse WeatherAPI current JSON")?;

        report_from(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    /// `YYYY-MM-DD HH:MM`
    last_updated: String,
    temp_f: f64,
    feelslike_f: f64,
    wind_mph: f64,
    wind_dir: String,
    humidity: u8,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

fn report_from(parsed: WaResponse) -> Result<WeatherReport> {
    let day = parsed.current.last_updated.split_whitespace().next().unwrap_or_default();

    Ok(WeatherReport {
        location_name: parsed.location.name,
        date: us_date(day)?,
        condition: parsed.current.condition.text,
        temperature_f: parsed.current.temp_f,
        feels_like_f: parsed.current.feelslike_f,
        wind_mph: parsed.current.wind_mph,
        wind_dir: parsed.current.wind_dir,
        humidity_pct: parsed.current.humidity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::tests::FixedLocation;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, query_param},
    };

    fn body() -> serde_json::Value {
        json!({
            "location": {"name": "Boston", "country": "USA"},
            "current": {
                "last_updated": "2024-06-01 14:30",
                "temp_f": 71.1,
                "feelslike_f": 70.0,
                "wind_mph": 9.4,
                "wind_dir": "WSW",
                "humidity": 48,
                "condition": {"text": "Partly cloudy"}
            }
        })
    }

    #[tokio::test]
    async fn current_report_uses_located_place() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "Boston"))
            .and(query_param("key", "WA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body()))
            .mount(&server)
            .await;

        let client = CurrentWeatherClient::with_base_url(
            "WA".into(),
            Arc::new(FixedLocation("Boston")),
            format!("{}/v1/current.json", server.uri()),
        );
        let report = client.current(None).await.unwrap();

        assert_eq!(report.location_name, "Boston");
        assert_eq!(report.date, "06/01/2024");
        assert_eq!(report.condition, "Partly cloudy");
        assert_eq!(report.wind_dir, "WSW");
        assert_eq!(report.humidity_pct, 48);
    }

    #[tokio::test]
    async fn error_status_includes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("API key is invalid"))
            .mount(&server)
            .await;

        let client = CurrentWeatherClient::with_base_url(
            "bad".into(),
            Arc::new(FixedLocation("Boston")),
            server.uri(),
        );
        let err = client.current(Some("Boston")).await.unwrap_err();
        assert!(err.to_string().contains("API key is invalid"));
    }
}
