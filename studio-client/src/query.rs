use std::fmt;

use studio_common::{Sensor, TimeWindow};

/// Flux query selecting one sensor's readings over a relative window
#[derive(Debug, Clone, PartialEq)]
pub struct FluxQuery {
    bucket: String,
    sensor: Sensor,
    window: TimeWindow,
    fields: Option<Vec<String>>,
}

impl FluxQuery {
    pub fn new(bucket: impl Into<String>, sensor: Sensor, window: TimeWindow) -> Self {
        Self {
            bucket: bucket.into(),
            sensor,
            window,
            fields: None,
        }
    }

    /// Restrict the query to the given field names
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// Render the query text
    pub fn build(&self) -> String {
        let mut flux = format!(
            "from(bucket: {})\n    |> range(start: -{}d, stop: -{}d)\n    |> filter(fn: (r) => r._measurement == {})",
            flux_string(&self.bucket),
            self.window.start_days(),
            self.window.stop_days(),
            flux_string(self.sensor.measurement()),
        );

        if let Some(fields) = &self.fields {
            let set = fields
                .iter()
                .map(|field| flux_string(field))
                .collect::<Vec<_>>()
                .join(", ");
            flux.push_str(&format!(
                "\n    |> filter(fn: (r) => contains(value: r._field, set: [{}]))",
                set
            ));
        }

        flux
    }
}

impl fmt::Display for FluxQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Quote a value as a Flux string literal
fn flux_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            // `${` opens an interpolation in Flux strings
            '$' if chars.peek() == Some(&'{') => quoted.push_str("\\$"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
