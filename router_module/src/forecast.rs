//! Daily weather forecast from OpenWeatherMap, rendered as a carousel.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::channel::{Action, CarouselColumn, OutboundMessage};
use crate::config::WeatherConfig;
use crate::error::{read_success_body, ExternalService, RouterError};

/// Number of days rendered into the carousel.
pub const FORECAST_DAYS: usize = 8;

/// Offset used for the displayed timestamps (UTC+9).
const DISPLAY_OFFSET_SECS: i32 = 9 * 3600;

const ICON_URL_PREFIX: &str = "https://openweathermap.org/img/w/";
const DETAIL_LABEL: &str = "View detail";
const ALT_TEXT: &str = "Weather forecast";

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    pub timestamp: i64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub description: String,
    pub icon: String,
}

#[derive(Clone)]
pub struct ForecastClient {
    client: Client,
    config: WeatherConfig,
}

impl fmt::Debug for ForecastClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastClient")
            .field("api_base_url", &self.config.api_base_url)
            .field("location", &self.config.location)
            .finish_non_exhaustive()
    }
}

impl ForecastClient {
    pub fn new(client: Client, config: WeatherConfig) -> Self {
        Self { client, config }
    }

    pub fn detail_url(&self) -> &str {
        &self.config.detail_url
    }

    pub async fn fetch_daily(&self) -> Result<Vec<ForecastEntry>, RouterError> {
        let url = format!("{}/data/2.5/forecast/daily", self.config.api_base_url);
        debug!("fetching forecast for {}", self.config.location);

        let count = FORECAST_DAYS.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", self.config.location.as_str()),
                ("units", "metric"),
                ("cnt", count.as_str()),
                ("appid", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|err| RouterError::network(ExternalService::Weather, err))?;

        let body = read_success_body(ExternalService::Weather, response).await?;
        parse_forecast_response(&body)
    }
}

pub fn parse_forecast_response(body: &str) -> Result<Vec<ForecastEntry>, RouterError> {
    let response: DailyForecastResponse =
        serde_json::from_str(body).map_err(|err| RouterError::parse(ExternalService::Weather, err))?;

    Ok(response
        .list
        .into_iter()
        .map(|day| {
            let (description, icon) = day
                .weather
                .into_iter()
                .next()
                .map(|weather| (weather.description, weather.icon))
                .unwrap_or_default();
            ForecastEntry {
                timestamp: day.dt,
                temp_min: day.temp.min,
                temp_max: day.temp.max,
                description,
                icon,
            }
        })
        .collect())
}

/// Builds the carousel from the first `FORECAST_DAYS` entries. Fewer entries is an error.
pub fn build_forecast_carousel(
    entries: &[ForecastEntry],
    detail_url: &str,
) -> Result<OutboundMessage, RouterError> {
    if entries.len() < FORECAST_DAYS {
        return Err(RouterError::ForecastIncomplete {
            expected: FORECAST_DAYS,
            actual: entries.len(),
        });
    }

    let columns = entries[..FORECAST_DAYS]
        .iter()
        .map(|entry| forecast_column(entry, detail_url))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OutboundMessage::carousel(ALT_TEXT, columns))
}

fn forecast_column(entry: &ForecastEntry, detail_url: &str) -> Result<CarouselColumn, RouterError> {
    Ok(CarouselColumn {
        thumbnail_image_url: format!("{}{}.png", ICON_URL_PREFIX, entry.icon),
        title: format_display_time(entry.timestamp)?,
        text: format!(
            "{}\nmax {:.2}℃ / min {:.2}℃",
            entry.description, entry.temp_max, entry.temp_min
        ),
        actions: vec![Action::Uri {
            label: DETAIL_LABEL.to_string(),
            uri: detail_url.to_string(),
        }],
    })
}

fn format_display_time(timestamp: i64) -> Result<String, RouterError> {
    let offset = FixedOffset::east_opt(DISPLAY_OFFSET_SECS)
        .ok_or_else(|| RouterError::parse(ExternalService::Weather, "invalid display offset"))?;
    let utc = DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        RouterError::parse(
            ExternalService::Weather,
            format!("timestamp out of range: {}", timestamp),
        )
    })?;
    Ok(utc.with_timezone(&offset).format("%Y/%m/%d %H:%M").to_string())
}

// ============================================================================
// OpenWeatherMap API types
// ============================================================================

#[derive(Debug, Deserialize)]
struct DailyForecastResponse {
    #[serde(default)]
    list: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    dt: i64,
    temp: DailyTemperature,
    #[serde(default)]
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct DailyTemperature {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}
