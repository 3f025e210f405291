use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StudioError};

/// Bucket holding every studio measurement stream
pub const DEFAULT_BUCKET: &str = "Studio";

/// Window bounds offered by the dashboard inputs, in days before now
pub const MIN_START_DAYS: u32 = 1;
pub const MAX_START_DAYS: u32 = 60;
pub const DEFAULT_START_DAYS: u32 = 7;
pub const MIN_STOP_DAYS: u32 = 0;
pub const MAX_STOP_DAYS: u32 = 59;
pub const DEFAULT_STOP_DAYS: u32 = 0;

/// Field names the DHT22 final query always keeps
pub const DHT22_BASE_FIELDS: [&str; 2] = ["temperature", "humidity"];

/// Accepted spellings of a CO₂ field, in priority order
pub const CO2_ALIASES: [&str; 5] = ["co2", "co2_ppm", "co2ppm", "co2_level", "co2_concentration"];

/// Sensors publishing into the studio bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    #[serde(rename = "DHT22", alias = "dht22")]
    Dht22,
    #[serde(rename = "BH1750", alias = "bh1750")]
    Bh1750,
}

impl Sensor {
    pub const ALL: [Sensor; 2] = [Sensor::Dht22, Sensor::Bh1750];

    /// Measurement stream the sensor writes to
    pub fn measurement(&self) -> &'static str {
        match self {
            Sensor::Dht22 => "studio-dht22",
            Sensor::Bh1750 => "studio-bh1750",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sensor::Dht22 => "DHT22",
            Sensor::Bh1750 => "BH1750",
        }
    }

    /// Whether the final query is narrowed by a discovered field allowlist
    pub fn discovers_fields(&self) -> bool {
        matches!(self, Sensor::Dht22)
    }
}

impl Default for Sensor {
    fn default() -> Self {
        Sensor::Dht22
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Sensor {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        Sensor::ALL
            .into_iter()
            .find(|sensor| sensor.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StudioError::UnknownSensor(s.to_string()))
    }
}

/// Relative query window, both ends counted in whole days before now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowDays")]
pub struct TimeWindow {
    start_days: u32,
    stop_days: u32,
}

/// Unchecked wire form of [`TimeWindow`]
#[derive(Deserialize)]
struct WindowDays {
    start_days: u32,
    stop_days: u32,
}

impl TryFrom<WindowDays> for TimeWindow {
    type Error = StudioError;

    fn try_from(days: WindowDays) -> Result<Self> {
        TimeWindow::new(days.start_days, days.stop_days)
    }
}

impl TimeWindow {
    /// Build a window, rejecting out-of-range offsets and empty or inverted ranges
    pub fn new(start_days: u32, stop_days: u32) -> Result<Self> {
        let invalid = |reason: String| StudioError::InvalidWindow {
            start: start_days,
            stop: stop_days,
            reason,
        };

        if !(MIN_START_DAYS..=MAX_START_DAYS).contains(&start_days) {
            return Err(invalid(format!(
                "start must be between {} and {} days",
                MIN_START_DAYS, MAX_START_DAYS
            )));
        }
        if !(MIN_STOP_DAYS..=MAX_STOP_DAYS).contains(&stop_days) {
            return Err(invalid(format!(
                "stop must be between {} and {} days",
                MIN_STOP_DAYS, MAX_STOP_DAYS
            )));
        }
        if start_days <= stop_days {
            return Err(invalid("start must lie further in the past than stop".to_string()));
        }

        Ok(Self { start_days, stop_days })
    }

    pub fn start_days(&self) -> u32 {
        self.start_days
    }

    pub fn stop_days(&self) -> u32 {
        self.stop_days
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self {
            start_days: DEFAULT_START_DAYS,
            stop_days: DEFAULT_STOP_DAYS,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}d..-{}d", self.start_days, self.stop_days)
    }
}

/// One reading as returned by the store: a field value at an instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub time: DateTime<Utc>,
    pub field: String,
    pub value: f64,
}

impl RawRecord {
    pub fn new(time: DateTime<Utc>, field: impl Into<String>, value: f64) -> Self {
        Self {
            time,
            field: field.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_parsing() {
        assert_eq!("DHT22".parse::<Sensor>().unwrap(), Sensor::Dht22);
        assert_eq!("bh1750".parse::<Sensor>().unwrap(), Sensor::Bh1750);
        assert_eq!(" Dht22 ".parse::<Sensor>().unwrap(), Sensor::Dht22);
        assert!(matches!(
            "SCD30".parse::<Sensor>(),
            Err(StudioError::UnknownSensor(name)) if name == "SCD30"
        ));
    }

    #[test]
    fn test_sensor_measurements() {
        assert_eq!(Sensor::Dht22.measurement(), "studio-dht22");
        assert_eq!(Sensor::Bh1750.measurement(), "studio-bh1750");
        assert!(Sensor::Dht22.discovers_fields());
        assert!(!Sensor::Bh1750.discovers_fields());
    }

    #[test]
    fn test_sensor_serde_uses_labels() {
        let json = serde_json::to_string(&Sensor::Bh1750).unwrap();
        assert_eq!(json, "\"BH1750\"");
        let sensor: Sensor = serde_json::from_str("\"dht22\"").unwrap();
        assert_eq!(sensor, Sensor::Dht22);
    }

    #[test]
    fn test_window_accepts_valid_range() {
        let window = TimeWindow::new(7, 0).unwrap();
        assert_eq!(window.start_days(), 7);
        assert_eq!(window.stop_days(), 0);
        assert_eq!(window, TimeWindow::default());
        assert_eq!(window.to_string(), "-7d..-0d");
    }

    #[test]
    fn test_window_rejects_inverted_and_empty_ranges() {
        assert!(matches!(
            TimeWindow::new(3, 5),
            Err(StudioError::InvalidWindow { start: 3, stop: 5, .. })
        ));
        assert!(matches!(
            TimeWindow::new(4, 4),
            Err(StudioError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_window_deserialization_is_validated() {
        let window: TimeWindow =
            serde_json::from_str(r#"{"start_days":14,"stop_days":2}"#).unwrap();
        assert_eq!(window, TimeWindow::new(14, 2).unwrap());

        let inverted = serde_json::from_str::<TimeWindow>(r#"{"start_days":2,"stop_days":14}"#);
        assert!(inverted.unwrap_err().to_string().contains("Invalid time window"));
        assert!(serde_json::from_str::<TimeWindow>(r#"{"start_days":90,"stop_days":0}"#).is_err());
    }

    #[test]
    fn test_window_rejects_out_of_bounds() {
        assert!(TimeWindow::new(0, 0).is_err());
        assert!(TimeWindow::new(61, 0).is_err());
        assert!(TimeWindow::new(60, 60).is_err());
        assert!(TimeWindow::new(60, 59).is_ok());
        assert!(TimeWindow::new(1, 0).is_ok());
    }
}
