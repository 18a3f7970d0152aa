//! Client for the OpenWeatherMap current-weather endpoint.
//!
//! Lookups never return `Err`: failures become [`WeatherOutcome::Error`]
//! values so the model and the interface can both render them, and a broken
//! weather call can never take down the turn it happened in.

use std::env;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const OPENWEATHER_HOST: &str = "https://api.openweathermap.org";

const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
const HOST_ENV: &str = "OPENWEATHER_HOST";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: i64,
}

/// Current conditions for one location, temperatures in whole degrees Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub country: String,
    pub temperature: i64,
    pub feels_like: i64,
    pub humidity: i64,
    pub pressure: i64,
    pub weather: String,
    pub description: String,
    /// URL of the condition icon, ready to display
    pub icon: String,
    pub wind: Wind,
    pub clouds: i64,
    pub visibility: i64,
}

/// What a lookup produced: a report, or an error message fit to show the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherOutcome {
    Report(WeatherReport),
    Error { error: String },
}

impl WeatherOutcome {
    pub fn error<S: Into<String>>(message: S) -> Self {
        WeatherOutcome::Error {
            error: message.into(),
        }
    }

    pub fn as_report(&self) -> Option<&WeatherReport> {
        match self {
            WeatherOutcome::Report(report) => Some(report),
            WeatherOutcome::Error { .. } => None,
        }
    }

    pub fn as_error(&self) -> Option<&str> {
        match self {
            WeatherOutcome::Report(_) => None,
            WeatherOutcome::Error { error } => Some(error),
        }
    }
}

pub struct WeatherClient {
    client: Client,
    host: String,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new<S: Into<String>>(host: S, api_key: Option<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            host: host.into(),
            api_key,
        })
    }

    /// Build a client from `OPENWEATHER_API_KEY` (and optionally
    /// `OPENWEATHER_HOST`). A missing key is not an error here; it surfaces
    /// per lookup, so the rest of the toolbox works without one.
    pub fn from_env() -> reqwest::Result<Self> {
        let host = env::var(HOST_ENV).unwrap_or_else(|_| OPENWEATHER_HOST.to_string());
        let api_key = env::var(API_KEY_ENV).ok();
        WeatherClient::new(host, api_key)
    }

    /// Fetch current weather for a city, optionally narrowed by country code.
    pub async fn lookup(&self, city: &str, country: Option<&str>) -> WeatherOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return WeatherOutcome::error(format!(
                "Weather lookups are not configured: set {} to enable them",
                API_KEY_ENV
            ));
        };

        let query = match country {
            Some(country) => format!("{},{}", city, country),
            None => city.to_string(),
        };
        debug!(%query, "fetching weather");

        let url = format!("{}/data/2.5/weather", self.host.trim_end_matches('/'));
        let response = match self
            .client
            .get(&url)
            .query(&[("q", query.as_str()), ("APPID", api_key), ("units", "metric")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return WeatherOutcome::error(format!("Could not reach the weather service: {}", e))
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return WeatherOutcome::error(not_found_message(city, country));
        }
        if !status.is_success() {
            // The API wraps errors as {"cod": ..., "message": ...}
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("message")?.as_str().map(str::to_string));
            return match detail {
                Some(message) => {
                    WeatherOutcome::error(format!("Weather data fetch failed: {}", message))
                }
                None => WeatherOutcome::error(format!("Weather data fetch failed: {}", status)),
            };
        }

        match response.json::<ApiPayload>().await {
            Ok(payload) => report_from_payload(payload),
            Err(e) => {
                WeatherOutcome::error(format!("Weather service sent an unreadable payload: {}", e))
            }
        }
    }
}

fn not_found_message(city: &str, country: Option<&str>) -> String {
    match country {
        Some(country) => format!(
            "Could not find weather for \"{},{}\". Check the city spelling and the country code.",
            city, country
        ),
        None => format!(
            "Could not find weather for \"{0}\". Check the spelling, or add a country code like \"{0},GB\".",
            city
        ),
    }
}

fn report_from_payload(payload: ApiPayload) -> WeatherOutcome {
    let Some(condition) = payload.weather.into_iter().next() else {
        return WeatherOutcome::error("Weather service returned no conditions for this location");
    };

    WeatherOutcome::Report(WeatherReport {
        location: payload.name,
        country: payload.sys.country,
        temperature: payload.main.temp.round() as i64,
        feels_like: payload.main.feels_like.round() as i64,
        humidity: payload.main.humidity,
        pressure: payload.main.pressure,
        weather: condition.main,
        description: condition.description,
        icon: icon_url(&condition.icon),
        wind: Wind {
            speed: payload.wind.speed,
            deg: payload.wind.deg,
        },
        clouds: payload.clouds.all,
        visibility: payload.visibility,
    })
}

fn icon_url(code: &str) -> String {
    format!("https://openweathermap.org/img/wn/{}@2x.png", code)
}

// The slice of the upstream response we actually use.

#[derive(Deserialize)]
struct ApiPayload {
    name: String,
    sys: ApiSys,
    main: ApiMain,
    weather: Vec<ApiCondition>,
    wind: ApiWind,
    clouds: ApiClouds,
    #[serde(default)]
    visibility: i64,
}

#[derive(Deserialize)]
struct ApiSys {
    #[serde(default)]
    country: String,
}

#[derive(Deserialize)]
struct ApiMain {
    temp: f64,
    feels_like: f64,
    humidity: i64,
    pressure: i64,
}

#[derive(Deserialize)]
struct ApiCondition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Deserialize)]
struct ApiWind {
    speed: f64,
    #[serde(default)]
    deg: i64,
}

#[derive(Deserialize)]
struct ApiClouds {
    all: i64,
}
