//! Presentation driver
//!
//! Each input change runs the whole pipeline from scratch through
//! [`Dashboard::on_input_changed`]. Nothing is remembered between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use studio_client::{FluxQuery, RecordSource};
use studio_common::{
    ConflictPolicy, DashboardConfig, Result as StudioResult, Sensor, TimeWindow,
    DEFAULT_START_DAYS, DEFAULT_STOP_DAYS,
};

use crate::error::DashboardResult;
use crate::fields::{allowed_fields, detect_co2_field, discover_fields};
use crate::pivot::{pivot, PivotTable};

pub const DASHBOARD_TITLE: &str = "Studio Sensor Dashboard";

/// User inputs for one interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub sensor: Sensor,
    pub start_days: u32,
    pub stop_days: u32,
}

impl Selection {
    pub fn new(sensor: Sensor, start_days: u32, stop_days: u32) -> Self {
        Self {
            sensor,
            start_days,
            stop_days,
        }
    }

    pub fn window(&self) -> StudioResult<TimeWindow> {
        TimeWindow::new(self.start_days, self.stop_days)
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(Sensor::default(), DEFAULT_START_DAYS, DEFAULT_STOP_DAYS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    AwaitingInput,
    Querying,
    Empty,
    Displaying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub level: BannerLevel,
    pub message: String,
}

/// Line chart of one table column against the table's timestamps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x: Vec<DateTime<Utc>>,
    pub y: Vec<Option<f64>>,
}

impl ChartSpec {
    pub fn from_column(table: &PivotTable, column: &str) -> Option<Self> {
        let (x, y) = table.series(column)?.into_iter().unzip();
        Some(Self {
            title: column.to_string(),
            x,
            y,
        })
    }

    /// Filled points in the series
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.y.iter().flatten().copied()
    }
}

/// One piece of output, in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Block {
    Subheader(String),
    FieldList(Vec<String>),
    Banner(Banner),
    Table(PivotTable),
    Chart(ChartSpec),
}

/// Everything one interaction shows, independent of any UI runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderInstruction {
    pub title: String,
    pub selection: Selection,
    pub state: ViewState,
    pub blocks: Vec<Block>,
}

impl RenderInstruction {
    pub fn table(&self) -> Option<&PivotTable> {
        self.blocks.iter().find_map(|block| match block {
            Block::Table(table) => Some(table),
            _ => None,
        })
    }

    pub fn charts(&self) -> impl Iterator<Item = &ChartSpec> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Chart(chart) => Some(chart),
            _ => None,
        })
    }

    pub fn banners(&self) -> impl Iterator<Item = &Banner> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Banner(banner) => Some(banner),
            _ => None,
        })
    }

    pub fn field_list(&self) -> Option<&[String]> {
        self.blocks.iter().find_map(|block| match block {
            Block::FieldList(fields) => Some(fields.as_slice()),
            _ => None,
        })
    }
}

/// Accumulates blocks while the pipeline runs and logs state changes
struct ViewBuilder {
    selection: Selection,
    state: ViewState,
    blocks: Vec<Block>,
}

impl ViewBuilder {
    fn new(selection: Selection) -> Self {
        Self {
            selection,
            state: ViewState::AwaitingInput,
            blocks: Vec::new(),
        }
    }

    fn transition(&mut self, next: ViewState) {
        debug!(sensor = %self.selection.sensor, from = ?self.state, to = ?next, "view transition");
        self.state = next;
    }

    fn subheader(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Subheader(text.into()));
    }

    fn banner(&mut self, level: BannerLevel, message: impl Into<String>) {
        self.blocks.push(Block::Banner(Banner {
            level,
            message: message.into(),
        }));
    }

    fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    fn finish(mut self, state: ViewState) -> RenderInstruction {
        self.transition(state);
        RenderInstruction {
            title: DASHBOARD_TITLE.to_string(),
            selection: self.selection,
            state: self.state,
            blocks: self.blocks,
        }
    }
}

/// Pipeline driver over a record source
pub struct Dashboard<S> {
    source: S,
    bucket: String,
    conflict_policy: ConflictPolicy,
}

impl<S: RecordSource> Dashboard<S> {
    pub fn new(source: S, bucket: impl Into<String>, conflict_policy: ConflictPolicy) -> Self {
        Self {
            source,
            bucket: bucket.into(),
            conflict_policy,
        }
    }

    pub fn from_config(source: S, config: &DashboardConfig) -> Self {
        Self::new(source, config.store.bucket.clone(), config.pivot.conflict_policy)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    /// Run the full pipeline for `selection`
    ///
    /// An empty result is a normal outcome reported through the instruction's
    /// `Empty` state. Invalid windows, store failures and pivot conflicts are errors.
    pub async fn on_input_changed(&self, selection: &Selection) -> DashboardResult<RenderInstruction> {
        let window = selection.window()?;
        let sensor = selection.sensor;
        let mut view = ViewBuilder::new(*selection);
        view.transition(ViewState::Querying);
        view.subheader(format!("Fields detected in sensor {}", sensor));

        let base_query = FluxQuery::new(self.bucket.as_str(), sensor, window);
        let final_query = if sensor.discovers_fields() {
            let discovery = self.source.fetch(&base_query.build()).await?;
            if discovery.is_empty() {
                view.banner(
                    BannerLevel::Error,
                    format!("No {} data in the selected range.", sensor),
                );
                return Ok(view.finish(ViewState::Empty));
            }

            let fields = discover_fields(&discovery);
            let co2_field = detect_co2_field(fields.as_slice());
            debug!(?fields, ?co2_field, "discovered fields");
            view.push(Block::FieldList(fields));
            match co2_field {
                Some(alias) => view.banner(
                    BannerLevel::Success,
                    format!("CO₂ field detected as: {}", alias),
                ),
                None => view.banner(BannerLevel::Warning, "No CO₂ field detected in this sensor."),
            }

            base_query.with_fields(allowed_fields(co2_field))
        } else {
            base_query
        };

        let records = self.source.fetch(&final_query.build()).await?;
        if records.is_empty() {
            view.banner(BannerLevel::Error, "No data found in this range.");
            return Ok(view.finish(ViewState::Empty));
        }

        let table = pivot(&records, self.conflict_policy)?;
        info!(
            sensor = %sensor,
            window = %window,
            rows = table.row_count(),
            columns = table.column_count(),
            "rendering sensor data"
        );

        let charts: Vec<ChartSpec> = table
            .columns()
            .iter()
            .filter_map(|column| ChartSpec::from_column(&table, column))
            .collect();

        view.subheader("Data table");
        view.push(Block::Table(table));
        view.subheader("Charts");
        for chart in charts {
            view.push(Block::Chart(chart));
        }

        Ok(view.finish(ViewState::Displaying))
    }
}
