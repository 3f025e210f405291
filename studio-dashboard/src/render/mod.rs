//! Front-end renderers for a [`RenderInstruction`](crate::RenderInstruction)

pub mod export;
pub mod html;
pub mod terminal;

pub use export::{export_csv_file, write_csv};
pub use html::{escape_html, HtmlRenderer, PageContent};
pub use terminal::render_text;

use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
