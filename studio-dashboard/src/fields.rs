use std::collections::BTreeSet;

use studio_common::{RawRecord, CO2_ALIASES, DHT22_BASE_FIELDS};

/// Distinct field names present in a batch, sorted
pub fn discover_fields(records: &[RawRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.field.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// First CO₂ alias, in alias priority order, that appears among `fields`
pub fn detect_co2_field<S: AsRef<str>>(fields: &[S]) -> Option<&'static str> {
    CO2_ALIASES
        .iter()
        .copied()
        .find(|alias| fields.iter().any(|field| field.as_ref() == *alias))
}

/// Field allowlist for the DHT22 final query
pub fn allowed_fields(co2_field: Option<&str>) -> Vec<String> {
    let mut fields: Vec<String> = DHT22_BASE_FIELDS.iter().map(|f| f.to_string()).collect();
    fields.extend(co2_field.map(str::to_string));
    fields
}
