//! InfluxDB access for the studio dashboard
//!
//! This crate builds Flux queries for the studio measurement streams, runs them
//! against the InfluxDB HTTP API, and flattens the annotated CSV response into
//! plain `(time, field, value)` records.

pub mod error;
pub mod query;
pub mod response;
pub mod fetcher;

pub use crate::error::{ClientError, ClientResult};
pub use crate::fetcher::{InfluxFetcher, RecordSource};
pub use crate::query::FluxQuery;
