use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use studio_client::{FluxQuery, InfluxFetcher};
use studio_common::{
    DashboardConfig, Sensor, TimeWindow, DEFAULT_BUCKET, DEFAULT_START_DAYS, DEFAULT_STOP_DAYS,
};
use studio_dashboard::render::{export_csv_file, render_text, HtmlRenderer, PageContent};
use studio_dashboard::server::{self, AppState};
use studio_dashboard::{Dashboard, Selection};

#[derive(Parser)]
#[command(name = "studio-dash")]
#[command(about = "Studio sensor dashboard for InfluxDB")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $STUDIO_DASH_CONFIG or ./studio-dash.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SelectionArgs {
    /// Sensor to display
    #[arg(short, long, default_value = "DHT22")]
    sensor: Sensor,

    /// Range start, in days ago
    #[arg(long, default_value_t = DEFAULT_START_DAYS)]
    start: u32,

    /// Range stop, in days ago
    #[arg(long, default_value_t = DEFAULT_STOP_DAYS)]
    stop: u32,
}

impl SelectionArgs {
    fn selection(&self) -> Selection {
        Selection::new(self.sensor, self.start, self.stop)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Query the store once and print the dashboard
    Show {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Also write the dashboard page to this HTML file
        #[arg(long)]
        html: Option<PathBuf>,

        /// Also export the pivoted table to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Run the web dashboard
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Print the Flux query for a selection without contacting the store
    Query {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Restrict the query to these fields
        #[arg(short, long = "field")]
        fields: Vec<String>,

        /// Bucket to read from
        #[arg(long, default_value = DEFAULT_BUCKET)]
        bucket: String,
    },
}

/// Log filter used when `RUST_LOG` is unset
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "studio_dashboard=info,studio_client=info,tower_http=info",
        1 => "studio_dashboard=debug,studio_client=debug,tower_http=debug",
        _ => "studio_dashboard=trace,studio_client=trace,tower_http=debug",
    }
}

fn init_tracing(verbose: u8) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    let config = DashboardConfig::load(path).context("Failed to load configuration")?;
    debug!("Using configuration: {:?}", config);
    Ok(config)
}

async fn show(
    config: DashboardConfig,
    selection: Selection,
    html: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let dashboard = Dashboard::from_config(InfluxFetcher::new(config.store.clone()), &config);
    let instruction = dashboard
        .on_input_changed(&selection)
        .await
        .context("Failed to render dashboard")?;

    print!("{}", render_text(&instruction));

    if let Some(path) = html {
        let page = HtmlRenderer::new().render_page(&PageContent::Instruction(&instruction));
        std::fs::write(&path, page)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote dashboard page to {}", path.display());
    }

    if let Some(path) = csv {
        match instruction.table() {
            Some(table) => export_csv_file(table, &path)
                .with_context(|| format!("Failed to export {}", path.display()))?,
            None => info!("No table to export, skipping {}", path.display()),
        }
    }

    Ok(())
}

async fn serve(config: DashboardConfig, bind: Option<SocketAddr>) -> Result<()> {
    let bind = bind.unwrap_or(config.server.bind);
    let dashboard = Dashboard::from_config(InfluxFetcher::new(config.store.clone()), &config);
    let state = AppState::new(dashboard, HtmlRenderer::new());
    server::serve(bind, state).await.context("Server error")
}

fn query(selection: SelectionArgs, fields: Vec<String>, bucket: String) -> Result<()> {
    let window = TimeWindow::new(selection.start, selection.stop)?;
    let mut query = FluxQuery::new(bucket, selection.sensor, window);
    if !fields.is_empty() {
        query = query.with_fields(fields);
    }
    println!("{}", query.build());
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Show {
            selection,
            html,
            csv,
        } => {
            let config = load_config(cli.config.as_deref())?;
            show(config, selection.selection(), html, csv).await
        }
        Commands::Serve { bind } => {
            let config = load_config(cli.config.as_deref())?;
            serve(config, bind).await
        }
        Commands::Query {
            selection,
            fields,
            bucket,
        } => query(selection, fields, bucket),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
