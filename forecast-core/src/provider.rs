use crate::{
    Config,
    location::{IpInfoLocator, LocationResolver},
    provider::{visualcrossing::ForecastClient, weatherapi::CurrentWeatherClient},
};
use std::sync::Arc;

pub mod openmeteo;
pub mod openweather;
pub mod visualcrossing;
pub mod weatherapi;

/// Services that need an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// Visual Crossing timeline API (hourly forecast).
    VisualCrossing,
    /// weatherapi.com (current conditions).
    WeatherApi,
    /// ipinfo.io (IP geolocation).
    IpInfo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::VisualCrossing => "visualcrossing",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::IpInfo => "ipinfo",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::VisualCrossing, ProviderId::WeatherApi, ProviderId::IpInfo]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "visualcrossing" => Ok(ProviderId::VisualCrossing),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "ipinfo" => Ok(ProviderId::IpInfo),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: visualcrossing, weatherapi, ipinfo."
            )),
        }
    }
}

fn required_key(config: &Config, id: ProviderId) -> anyhow::Result<String> {
    config.provider_api_key(id).map(str::to_owned).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `forecast configure {id}` and enter your API key."
        )
    })
}

/// Location lookup shared by both weather clients.
pub fn locator_from_config(config: &Config) -> anyhow::Result<Arc<dyn LocationResolver>> {
    let token = required_key(config, ProviderId::IpInfo)?;
    Ok(Arc::new(IpInfoLocator::new(token)))
}

pub fn forecast_client_from_config(
    config: &Config,
    locator: Arc<dyn LocationResolver>,
) -> anyhow::Result<ForecastClient> {
    let api_key = required_key(config, ProviderId::VisualCrossing)?;
    Ok(ForecastClient::new(api_key, locator))
}

pub fn current_client_from_config(
    config: &Config,
    locator: Arc<dyn LocationResolver>,
) -> anyhow::Result<CurrentWeatherClient> {
    let api_key = required_key(config, ProviderId::WeatherApi)?;
    Ok(CurrentWeatherClient::new(api_key, locator))
}

/// Shared by the HTTP clients when echoing an error body.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
