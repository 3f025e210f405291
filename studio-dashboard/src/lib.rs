//! Studio sensor dashboard
//!
//! Turns a sensor and time window selection into a render instruction: the
//! detected fields, status banners, a table pivoted by timestamp, and one line
//! chart per field. Front ends (terminal, static HTML, the axum server) only
//! draw what the instruction describes.

pub mod error;
pub mod fields;
pub mod pivot;
pub mod driver;
pub mod render;
pub mod server;

pub use crate::driver::{
    Banner, BannerLevel, Block, ChartSpec, Dashboard, RenderInstruction, Selection, ViewState,
};
pub use crate::error::{DashboardError, DashboardResult};
pub use crate::pivot::{pivot, PivotRow, PivotTable};
