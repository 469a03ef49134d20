use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use forecast_core::{
    Config, ConditionPipeline, IconFileSink, JsonFileStore, MatchPolicy, PipelineReport,
    ProviderId, WeatherReport,
    annotate::load_forecast,
    history::store_history,
    model::{Coordinates, wind_direction_name},
    provider::{
        self,
        openmeteo::HistoryClient,
        openweather::{OpenWeatherConditionsPage, OpenWeatherIcons},
    },
    store::HISTORY_DOCUMENT,
};
use inquire::Password;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Forecast conditions with canonical weather icons")]
pub struct Cli {
    /// Log debug output from the pipeline.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key for a provider: visualcrossing, weatherapi or ipinfo.
    Configure {
        provider: String,
    },

    /// Print a short report of the current weather.
    Report {
        /// Place name; the current location if omitted.
        place: Option<String>,
    },

    /// Fetch the hourly forecast, canonicalize conditions and attach icons.
    Forecast {
        /// Place name; the current location if omitted.
        place: Option<String>,

        /// Leave conditions unresolved when the best match scores below this (0-100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        min_score: Option<u8>,

        /// Directory for the forecast and conditions documents.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Icon codes fetched in parallel.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Download archived hourly temperatures (°F) for the forecast's location.
    History {
        /// Place name; the stored forecast's location, else the current one, if omitted.
        place: Option<String>,

        /// First day of the archive (YYYY-MM-DD).
        #[arg(long, default_value = "2020-12-31")]
        start: NaiveDate,

        /// Last day of the archive (YYYY-MM-DD).
        #[arg(long, default_value = "2023-07-01")]
        end: NaiveDate,

        /// Directory for the history document.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Report { place } => report(place.as_deref()).await,
            Command::Forecast { place, min_score, data_dir, concurrency } => {
                forecast(place.as_deref(), min_score, data_dir, concurrency).await
            }
            Command::History { place, start, end, data_dir } => {
                history(place.as_deref(), start, end, data_dir).await
            }
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.save()?;
    println!("Saved API key for {id} to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn report(place: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let locator = provider::locator_from_config(&config)?;
    let client = provider::current_client_from_config(&config, locator)?;

    let report = client.current(place).await?;
    print_report(&report);
    Ok(())
}

async fn forecast(
    place: Option<&str>,
    min_score: Option<u8>,
    data_dir: Option<PathBuf>,
    concurrency: Option<usize>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let locator = provider::locator_from_config(&config)?;
    let client = provider::forecast_client_from_config(&config, locator)?;

    let data_dir = data_dir_or_default(&config, data_dir)?;
    let policy = min_score.map(|min_score| MatchPolicy { min_score }).unwrap_or(config.matching);

    let mut dataset = client.forecast(place).await?;

    let store = JsonFileStore::new(&data_dir);
    let icon_files = IconFileSink::beside(&store);
    let icon_dir = icon_files.dir().to_path_buf();
    let pipeline = ConditionPipeline::new(
        Arc::new(OpenWeatherConditionsPage::default()),
        Arc::new(OpenWeatherIcons::default()),
        Arc::new(store),
    )
    .with_policy(policy)
    .with_concurrency(concurrency.unwrap_or(config.icons.concurrency))
    .with_icon_files(icon_files);

    let report = pipeline.run(&mut dataset).await?;
    print_pipeline_report(&report, &data_dir, &icon_dir);
    Ok(())
}

async fn history(
    place: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = JsonFileStore::new(data_dir_or_default(&config, data_dir)?);

    let coordinates = match place {
        None => stored_coordinates(&store),
        Some(_) => None,
    };
    let coordinates = match coordinates {
        Some(c) => c,
        None => {
            let locator = provider::locator_from_config(&config)?;
            let client = provider::forecast_client_from_config(&config, locator)?;
            client
                .forecast(place)
                .await?
                .coordinates()
                .context("Forecast returned no days to take coordinates from")?
        }
    };

    let records = HistoryClient::default().hourly_temperatures(coordinates, start, end).await?;
    store_history(&store, &records)?;

    println!(
        "Stored {} hourly temperatures ({start} to {end}) at {}, {} in {}",
        records.len(),
        coordinates.latitude,
        coordinates.longitude,
        store.document_path(HISTORY_DOCUMENT).display()
    );
    Ok(())
}

fn stored_coordinates(store: &JsonFileStore) -> Option<Coordinates> {
    match load_forecast(store) {
        Ok(dataset) => dataset.coordinates(),
        Err(err) => {
            tracing::debug!(error = %err, "No stored forecast to take coordinates from");
            None
        }
    }
}

fn data_dir_or_default(config: &Config, data_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir),
        None => config.resolved_data_dir(),
    }
}

fn print_report(r: &WeatherReport) {
    let wind_name = wind_direction_name(&r.wind_dir).unwrap_or("");
    println!();
    println!("Weather Report for {}    [Last Updated: {}]", r.location_name, r.date);
    println!();
    println!("  Temperature:       {}°F, but feels like {}°F", r.temperature_f, r.feels_like_f);
    println!("  Wind Speed:        {} mph", r.wind_mph);
    println!("  Wind Direction:    {} ({wind_name})", r.wind_dir);
    println!("  Weather Condition: {}", r.condition);
    println!("  Humidity:          {}%", r.humidity_pct);
}

fn print_pipeline_report(report: &PipelineReport, data_dir: &Path, icon_dir: &Path) {
    println!(
        "Annotated {} hourly records over {} days ({} unresolved).",
        report.records, report.days, report.unresolved
    );

    println!("Conditions in forecast:");
    for (description, code) in &report.resolved {
        println!("  {code}  {description}");
    }
    if !report.missing.is_empty() {
        println!("Conditions never matched:");
        for (description, code) in &report.missing {
            println!("  {code}  {description}");
        }
    }
    if !report.is_complete() {
        println!("Incomplete: some icons could not be fetched:");
        for failure in &report.asset_failures {
            println!("  {failure}");
        }
    }
    if report.icon_files > 0 {
        println!("Wrote {} icon files to {}", report.icon_files, icon_dir.display());
    }
    println!("Documents written to {}", data_dir.display());
}
