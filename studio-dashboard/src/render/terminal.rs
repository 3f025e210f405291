use std::fmt::Write;

use tabled::builder::Builder;
use tabled::settings::Style;

use super::format_time;
use crate::driver::{BannerLevel, Block, ChartSpec, RenderInstruction};
use crate::pivot::PivotTable;

const EMPTY_CELL: &str = "-";

fn banner_prefix(level: BannerLevel) -> &'static str {
    match level {
        BannerLevel::Success => "✓",
        BannerLevel::Info => "ℹ",
        BannerLevel::Warning => "⚠",
        BannerLevel::Error => "✗",
    }
}

/// Render an instruction as plain text for a terminal
pub fn render_text(instruction: &RenderInstruction) -> String {
    let mut out = String::new();
    let selection = &instruction.selection;
    let _ = writeln!(out, "{}", instruction.title);
    let _ = writeln!(
        out,
        "Sensor: {}  Range: -{}d .. -{}d",
        selection.sensor, selection.start_days, selection.stop_days
    );

    for block in &instruction.blocks {
        out.push('\n');
        match block {
            Block::Subheader(text) => {
                let _ = writeln!(out, "{}", text);
                let _ = writeln!(out, "{}", "=".repeat(text.chars().count()));
            }
            Block::FieldList(fields) => {
                for field in fields {
                    let _ = writeln!(out, "  - {}", field);
                }
            }
            Block::Banner(banner) => {
                let _ = writeln!(out, "{} {}", banner_prefix(banner.level), banner.message);
            }
            Block::Table(table) => {
                let _ = writeln!(out, "{}", render_table(table));
            }
            Block::Chart(chart) => {
                let _ = writeln!(out, "{}", chart_summary(chart));
            }
        }
    }

    out
}

fn render_table(table: &PivotTable) -> String {
    let mut builder = Builder::default();
    let mut header = Vec::with_capacity(table.column_count() + 1);
    header.push("_time".to_string());
    header.extend(table.columns().iter().cloned());
    builder.push_record(header);

    for row in table.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(format_time(&row.time));
        record.extend(row.values.iter().map(|value| match value {
            Some(v) => v.to_string(),
            None => EMPTY_CELL.to_string(),
        }));
        builder.push_record(record);
    }

    let mut rendered = builder.build();
    rendered.with(Style::rounded());
    rendered.to_string()
}

fn chart_summary(chart: &ChartSpec) -> String {
    let points = chart.values().count();
    if points == 0 {
        return format!("{}: no points", chart.title);
    }
    let min = chart.values().fold(f64::INFINITY, f64::min);
    let max = chart.values().fold(f64::NEG_INFINITY, f64::max);
    let last = chart.values().last().unwrap_or(f64::NAN);
    format!(
        "{}: {} points, min {}, max {}, last {}",
        chart.title, points, min, max, last
    )
}
