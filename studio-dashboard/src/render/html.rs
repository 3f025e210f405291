//! Single-page HTML rendering
//!
//! The page carries the input form, the banners, the pivoted table and one
//! Plotly line chart per column. Bootstrap and Plotly.js are loaded from CDN.

use serde_json::json;

use studio_common::{Sensor, MAX_START_DAYS, MAX_STOP_DAYS, MIN_START_DAYS, MIN_STOP_DAYS};

use super::format_time;
use crate::driver::{BannerLevel, Block, ChartSpec, RenderInstruction, Selection, DASHBOARD_TITLE};
use crate::pivot::PivotTable;

const BOOTSTRAP_CSS: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css";
const PLOTLY_JS: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// What the page body shows below the form
#[derive(Debug)]
pub enum PageContent<'a> {
    Instruction(&'a RenderInstruction),
    Error {
        selection: Selection,
        message: String,
    },
}

impl PageContent<'_> {
    fn selection(&self) -> Selection {
        match self {
            PageContent::Instruction(instruction) => instruction.selection,
            PageContent::Error { selection, .. } => *selection,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    title: String,
    form_action: String,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self {
            title: DASHBOARD_TITLE.to_string(),
            form_action: "/".to_string(),
        }
    }
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form_action<S: Into<String>>(mut self, action: S) -> Self {
        self.form_action = action.into();
        self
    }

    /// Render the full page
    pub fn render_page(&self, content: &PageContent<'_>) -> String {
        let mut html = String::new();
        html.push_str(&self.generate_html_head());
        html.push_str(&format!(
            r#"<body>
    <div class="container py-4">
        <h1 class="mb-4">{}</h1>
"#,
            escape_html(&self.title)
        ));
        html.push_str(&self.generate_form(&content.selection()));

        match content {
            PageContent::Instruction(instruction) => {
                html.push_str(&self.generate_blocks(instruction));
            }
            PageContent::Error { message, .. } => {
                html.push_str(&alert(BannerLevel::Error, message));
            }
        }

        html.push_str(
            r#"    </div>
</body>
</html>
"#,
        );
        html
    }

    fn generate_html_head(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <link href="{}" rel="stylesheet">
    <script src="{}"></script>
</head>
"#,
            escape_html(&self.title),
            BOOTSTRAP_CSS,
            PLOTLY_JS
        )
    }

    fn generate_form(&self, selection: &Selection) -> String {
        let options: String = Sensor::ALL
            .iter()
            .map(|sensor| {
                let selected = if *sensor == selection.sensor { " selected" } else { "" };
                format!(
                    r#"                    <option value="{0}"{1}>{0}</option>
"#,
                    sensor.label(),
                    selected
                )
            })
            .collect();

        format!(
            r#"        <form method="get" action="{action}" class="row g-3 mb-4" onchange="this.submit()">
            <div class="col-md-4">
                <label for="sensor" class="form-label">Sensor</label>
                <select id="sensor" name="sensor" class="form-select">
{options}                </select>
            </div>
            <div class="col-md-4">
                <label for="start" class="form-label">Start (days ago)</label>
                <input id="start" name="start" type="number" class="form-control" min="{start_min}" max="{start_max}" value="{start}">
            </div>
            <div class="col-md-4">
                <label for="stop" class="form-label">Stop (days ago)</label>
                <input id="stop" name="stop" type="number" class="form-control" min="{stop_min}" max="{stop_max}" value="{stop}">
            </div>
        </form>
"#,
            action = escape_html(&self.form_action),
            options = options,
            start_min = MIN_START_DAYS,
            start_max = MAX_START_DAYS,
            start = selection.start_days,
            stop_min = MIN_STOP_DAYS,
            stop_max = MAX_STOP_DAYS,
            stop = selection.stop_days,
        )
    }

    fn generate_blocks(&self, instruction: &RenderInstruction) -> String {
        let mut html = String::new();
        let mut chart_idx = 0;

        for block in &instruction.blocks {
            match block {
                Block::Subheader(text) => {
                    html.push_str(&format!("        <h3 class=\"mt-4\">{}</h3>\n", escape_html(text)));
                }
                Block::FieldList(fields) => {
                    html.push_str("        <ul class=\"list-inline\">\n");
                    for field in fields {
                        html.push_str(&format!(
                            "            <li class=\"list-inline-item\"><code>{}</code></li>\n",
                            escape_html(field)
                        ));
                    }
                    html.push_str("        </ul>\n");
                }
                Block::Banner(banner) => html.push_str(&alert(banner.level, &banner.message)),
                Block::Table(table) => html.push_str(&generate_table(table)),
                Block::Chart(chart) => {
                    html.push_str(&generate_chart(chart, chart_idx));
                    chart_idx += 1;
                }
            }
        }

        html
    }
}

fn alert(level: BannerLevel, message: &str) -> String {
    let class = match level {
        BannerLevel::Success => "alert-success",
        BannerLevel::Info => "alert-info",
        BannerLevel::Warning => "alert-warning",
        BannerLevel::Error => "alert-danger",
    };
    format!(
        "        <div class=\"alert {}\" role=\"alert\">{}</div>\n",
        class,
        escape_html(message)
    )
}

fn generate_table(table: &PivotTable) -> String {
    let mut html = String::from(
        r#"        <div class="table-responsive">
            <table class="table table-sm table-striped">
                <thead>
                    <tr><th>_time</th>"#,
    );
    for column in table.columns() {
        html.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    html.push_str("</tr>\n                </thead>\n                <tbody>\n");

    for row in table.rows() {
        html.push_str(&format!("                    <tr><td>{}</td>", format_time(&row.time)));
        for value in &row.values {
            match value {
                Some(v) => html.push_str(&format!("<td>{}</td>", v)),
                None => html.push_str("<td></td>"),
            }
        }
        html.push_str("</tr>\n");
    }

    html.push_str("                </tbody>\n            </table>\n        </div>\n");
    html
}

fn generate_chart(chart: &ChartSpec, idx: usize) -> String {
    let x: Vec<String> = chart.x.iter().map(format_time).collect();
    let trace = json!([{
        "x": x,
        "y": chart.y,
        "type": "scatter",
        "mode": "lines",
        "name": chart.title,
    }]);
    let layout = json!({
        "title": { "text": chart.title },
        "margin": { "t": 40 },
    });

    format!(
        r#"        <div id="chart-{idx}" class="mb-4"></div>
        <script>
            Plotly.newPlot("chart-{idx}", {trace}, {layout}, {{"responsive": true}});
        </script>
"#,
        idx = idx,
        trace = script_json(&trace),
        layout = script_json(&layout),
    )
}

/// JSON safe to place inside a `<script>` element
fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Banner, ViewState};
    use crate::pivot::pivot;
    use chrono::{TimeZone, Utc};
    use studio_common::{ConflictPolicy, RawRecord};

    fn lux_instruction() -> RenderInstruction {
        let records: Vec<RawRecord> = (0..3)
            .map(|hour| {
                RawRecord::new(
                    Utc.with_ymd_and_hms(2024, 5, 2, 10 + hour, 0, 0).unwrap(),
                    "lux",
                    100.0 + f64::from(hour),
                )
            })
            .collect();
        let table = pivot(&records, ConflictPolicy::Reject).unwrap();
        let chart = ChartSpec::from_column(&table, "lux").unwrap();
        RenderInstruction {
            title: DASHBOARD_TITLE.to_string(),
            selection: Selection::new(Sensor::Bh1750, 14, 2),
            state: ViewState::Displaying,
            blocks: vec![
                Block::Subheader("Data table".to_string()),
                Block::Table(table),
                Block::Subheader("Charts".to_string()),
                Block::Chart(chart),
            ],
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"co2" & 'lux'</b>"#),
            "&lt;b&gt;&quot;co2&quot; &amp; &#39;lux&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("CO₂"), "CO₂");
    }

    #[test]
    fn test_page_has_form_with_bounds() {
        let instruction = lux_instruction();
        let html = HtmlRenderer::new().render_page(&PageContent::Instruction(&instruction));

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<option value="BH1750" selected>BH1750</option>"#));
        assert!(html.contains(r#"<option value="DHT22">DHT22</option>"#));
        assert!(html.contains(r#"min="1" max="60" value="14""#));
        assert!(html.contains(r#"min="0" max="59" value="2""#));
        assert!(html.contains(r#"onchange="this.submit()""#));
    }

    #[test]
    fn test_page_renders_table_and_charts() {
        let instruction = lux_instruction();
        let html = HtmlRenderer::new().render_page(&PageContent::Instruction(&instruction));

        assert!(html.contains("<th>_time</th><th>lux</th>"));
        assert!(html.contains("<tr><td>2024-05-02T10:00:00Z</td><td>100</td></tr>"));
        assert_eq!(html.matches("Plotly.newPlot(").count(), 1);
        assert!(html.contains(r#"Plotly.newPlot("chart-0", [{"#));
        assert!(html.contains(r#""y":[100.0,101.0,102.0]"#));
    }

    #[test]
    fn test_banner_and_error_page_are_escaped() {
        let mut instruction = lux_instruction();
        instruction.blocks = vec![Block::Banner(Banner {
            level: BannerLevel::Warning,
            message: "<script>alert(1)</script>".to_string(),
        })];
        let html = HtmlRenderer::new().render_page(&PageContent::Instruction(&instruction));
        assert!(html.contains(r#"<div class="alert alert-warning" role="alert">&lt;script&gt;"#));
        assert!(!html.contains("<script>alert(1)"));

        let html = HtmlRenderer::new().render_page(&PageContent::Error {
            selection: Selection::default(),
            message: "Invalid time window -3d..-5d".to_string(),
        });
        assert!(html.contains("alert-danger"));
        assert!(html.contains("Invalid time window -3d..-5d"));
        assert!(html.contains(r#"<option value="DHT22" selected>DHT22</option>"#));
    }

    #[test]
    fn test_chart_json_cannot_close_script() {
        let chart = ChartSpec {
            title: "</script><b>".to_string(),
            x: Vec::new(),
            y: Vec::new(),
        };
        let html = generate_chart(&chart, 3);
        assert!(html.contains("chart-3"));
        assert!(!html.contains("</script><b>"));
        assert!(html.contains(r#"<\/script><b>"#));
    }
}
