//! Weather Source
//!
//! Current conditions and a short forecast from an OpenWeatherMap-compatible
//! API. Both documents are parsed loosely as JSON values: only the current
//! temperature and the forecast list are required, every other field falls
//! back to a placeholder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::Value;

use super::http::HttpFetch;
use super::LineSource;
use crate::error::PollError;
use crate::paginate::DisplayLine;

const PLACEHOLDER: &str = "N/A";

/// Location and API parameters shared by both endpoints
#[derive(Clone, Debug)]
pub struct WeatherQuery {
    /// API root, e.g. `http://api.openweathermap.org/data/2.5`
    pub base_url: String,
    /// Latitude
    pub lat: String,
    /// Longitude
    pub lon: String,
    /// Language for descriptions
    pub lang: String,
    /// Unit system (`metric`, `imperial`, `standard`)
    pub units: String,
    /// API key
    pub app_id: String,
}

impl Default for WeatherQuery {
    fn default() -> Self {
        Self {
            base_url: "http://api.openweathermap.org/data/2.5".to_string(),
            lat: "48.522659".to_string(),
            lon: "9.05222".to_string(),
            lang: "de".to_string(),
            units: "metric".to_string(),
            app_id: String::new(),
        }
    }
}

impl WeatherQuery {
    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{endpoint}?lat={}&lon={}&lang={}&units={}&appid={}",
            self.base_url.trim_end_matches('/'),
            self.lat,
            self.lon,
            self.lang,
            self.units,
            self.app_id
        )
    }

    /// URL of the current-weather document
    #[must_use]
    pub fn current_url(&self) -> String {
        self.url("weather")
    }

    /// URL of the 5-day/3-hour forecast document
    #[must_use]
    pub fn forecast_url(&self) -> String {
        self.url("forecast")
    }
}

/// Current conditions followed by the first few forecast entries
pub struct WeatherSource {
    query: WeatherQuery,
    forecast_entries: usize,
    http: Arc<dyn HttpFetch>,
}

impl WeatherSource {
    /// Create a weather source showing `forecast_entries` forecast slots
    pub fn new(query: WeatherQuery, forecast_entries: usize, http: Arc<dyn HttpFetch>) -> Self {
        Self {
            query,
            forecast_entries,
            http,
        }
    }

    async fn document(&self, url: &str) -> Result<Value, PollError> {
        let body = self.http.get(url).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn current(&self) -> Result<Vec<DisplayLine>, PollError> {
        let doc = self.document(&self.query.current_url()).await?;
        format_current(&doc)
    }

    async fn forecast(&self) -> Result<Vec<DisplayLine>, PollError> {
        let doc = self.document(&self.query.forecast_url()).await?;
        format_forecast(&doc, self.forecast_entries)
    }
}

#[async_trait]
impl LineSource for WeatherSource {
    fn name(&self) -> &str {
        "weather"
    }

    async fn fetch(&self) -> Result<Vec<DisplayLine>, PollError> {
        match (self.current().await, self.forecast().await) {
            (Ok(mut current), Ok(forecast)) => {
                current.extend(forecast);
                Ok(current)
            }
            (Ok(current), Err(e)) => {
                tracing::warn!(error = %e, "Weather forecast unavailable");
                Ok(current)
            }
            (Err(e), Ok(forecast)) => {
                tracing::warn!(error = %e, "Current weather unavailable");
                Ok(forecast)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }
}

/// Render a JSON scalar the way it appears in the document
fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

fn description(doc: &Value) -> String {
    doc.pointer("/weather/0/description")
        .and_then(Value::as_str)
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

/// Format a unix timestamp as local `HH:MM`
#[must_use]
pub(crate) fn clock_time(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map_or_else(
            || PLACEHOLDER.to_string(),
            |t| t.with_timezone(&Local).format("%H:%M").to_string(),
        )
}

fn format_current(doc: &Value) -> Result<Vec<DisplayLine>, PollError> {
    let temperature = doc
        .pointer("/main/temp")
        .ok_or_else(|| PollError::Parse("current weather lacks main.temp".to_string()))?;

    Ok(vec![
        format!("Temperatur: {}°C", scalar(Some(temperature))),
        format!("Luftfeuchte: {}%", scalar(doc.pointer("/main/humidity"))),
        format!("Luftdruck: {}hPa", scalar(doc.pointer("/main/pressure"))),
        description(doc),
        format!("Wind-Richtung: {}°", scalar(doc.pointer("/wind/deg"))),
        format!("Wind-Speed: {}km/h", scalar(doc.pointer("/wind/speed"))),
        format!("Sunrise: {}", clock_time(doc.pointer("/sys/sunrise"))),
        format!("Sunset : {}", clock_time(doc.pointer("/sys/sunset"))),
    ])
}

fn format_forecast(doc: &Value, entries: usize) -> Result<Vec<DisplayLine>, PollError> {
    let list = doc
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| PollError::Parse("forecast lacks list".to_string()))?;

    let mut lines = Vec::with_capacity(entries * 4);
    for entry in list.iter().take(entries) {
        lines.push(scalar(entry.get("dt_txt")));
        lines.push(format!("Temperatur: {}°C", scalar(entry.pointer("/main/temp"))));
        lines.push(format!("Luftdruck: {}hPa", scalar(entry.pointer("/main/pressure"))));
        lines.push(description(entry));
    }
    Ok(lines)
}
