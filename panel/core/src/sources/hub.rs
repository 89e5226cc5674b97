//! Home-Automation Hub Source
//!
//! Reads thermostat temperatures through the hub's XML API:
//!
//! - `devicelist.cgi` lists every device with its `name` and `ise_id`
//! - `state.cgi?device_id=<ise_id>` lists the device's datapoints
//!
//! A device contributes one line if it has an `ACTUAL_TEMPERATURE` datapoint
//! and nothing otherwise. A failing device is skipped without affecting the
//! others.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::http::HttpFetch;
use super::LineSource;
use crate::error::PollError;
use crate::paginate::DisplayLine;

const TEMPERATURE_DATAPOINT: &str = "ACTUAL_TEMPERATURE";

/// Device entry from `devicelist.cgi`
#[derive(Clone, Debug, PartialEq, Eq)]
struct Device {
    name: String,
    ise_id: String,
}

/// Temperature datapoint from `state.cgi`
#[derive(Clone, Debug, PartialEq)]
struct Reading {
    value: f64,
    unit: String,
}

/// Thermostat temperatures from the hub
pub struct HubSource {
    base_url: String,
    http: Arc<dyn HttpFetch>,
}

impl HubSource {
    /// Create a source for the XML API rooted at `base_url`
    ///
    /// `base_url` is the API directory, e.g. `http://ccu2/config/xmlapi/`.
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpFetch>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url, http }
    }

    fn device_list_url(&self) -> String {
        format!("{}devicelist.cgi", self.base_url)
    }

    fn state_url(&self, ise_id: &str) -> String {
        format!("{}state.cgi?device_id={ise_id}", self.base_url)
    }

    async fn read_device(&self, device: &Device) -> Result<Option<DisplayLine>, PollError> {
        let body = self.http.get(&self.state_url(&device.ise_id)).await?;
        let reading = parse_temperature(&body)?;
        Ok(reading.map(|r| format_device_line(&device.name, r.value, &r.unit)))
    }
}

#[async_trait]
impl LineSource for HubSource {
    fn name(&self) -> &str {
        "hub"
    }

    async fn fetch(&self) -> Result<Vec<DisplayLine>, PollError> {
        let body = self.http.get(&self.device_list_url()).await?;
        let devices = parse_devices(&body)?;
        tracing::debug!(count = devices.len(), "Hub device list");

        let mut lines = Vec::new();
        for device in &devices {
            match self.read_device(device).await {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    device = %device.name,
                    ise_id = %device.ise_id,
                    error = %e,
                    "Skipping hub device"
                ),
            }
        }
        Ok(lines)
    }
}

/// Format one thermostat line: name right-aligned to 12, value to 1dp
#[must_use]
pub fn format_device_line(name: &str, value: f64, unit: &str) -> DisplayLine {
    format!("{name:>12}: {value:.1}{unit}")
}

fn xml_error(e: impl std::fmt::Display) -> PollError {
    PollError::Parse(format!("hub xml: {e}"))
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, PollError> {
    match element.try_get_attribute(name).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

/// Decode a hub response; the hub answers in ISO-8859-1 when not UTF-8
fn decode_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => body.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Collect every `<device>` with an `ise_id`
fn parse_devices(body: &[u8]) -> Result<Vec<Device>, PollError> {
    let xml = decode_body(body);
    let mut reader = Reader::from_str(&xml);
    let mut devices = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"device" => {
                if let Some(ise_id) = attribute(&e, "ise_id")? {
                    let name = attribute(&e, "name")?.unwrap_or_else(|| ise_id.clone());
                    devices.push(Device { name, ise_id });
                } else {
                    tracing::debug!("Hub device without ise_id");
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(devices)
}

/// Find the first `ACTUAL_TEMPERATURE` datapoint of a device state document
fn parse_temperature(body: &[u8]) -> Result<Option<Reading>, PollError> {
    let xml = decode_body(body);
    let mut reader = Reader::from_str(&xml);

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"datapoint" => {
                if attribute(&e, "type")?.as_deref() == Some(TEMPERATURE_DATAPOINT) {
                    let raw = attribute(&e, "value")?.unwrap_or_default();
                    let value = raw
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| PollError::Parse(format!("bad temperature value {raw:?}")))?;
                    let unit = attribute(&e, "valueunit")?.unwrap_or_default();
                    return Ok(Some(Reading { value, unit }));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}
