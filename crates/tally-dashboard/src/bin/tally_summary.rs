//! Load a citation dataset, apply chart filters, and print what the dashboard
//! would show.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tally_dashboard::citation::parse_timestamp;
use tally_dashboard::{Chart, Dashboard, DashboardConfig, Hotspot, NormalizeConfig, Row, Totals};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tally-summary",
    version,
    about = "Cross-filtered summary of a parking-citation dataset"
)]
struct Cli {
    /// CSV or JSON citation files.
    #[arg(required = true)]
    data: Vec<PathBuf>,

    /// Dashboard settings (YAML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep only these zip codes. May be repeated or comma-separated.
    #[arg(long = "zip", value_delimiter = ',')]
    zips: Vec<String>,

    /// Keep only these issuing agencies. May be repeated or comma-separated.
    #[arg(long = "agency", value_delimiter = ',')]
    agencies: Vec<String>,

    /// Keep only these violation descriptions. May be repeated.
    #[arg(long = "ticket-type")]
    ticket_types: Vec<String>,

    /// Start of the time window (inclusive).
    #[arg(long, value_parser = parse_time)]
    from: Option<NaiveDateTime>,

    /// End of the time window (exclusive).
    #[arg(long, value_parser = parse_time)]
    to: Option<NaiveDateTime>,

    /// Rows listed for zips and hotspots. Defaults to the config's hotspot rows.
    #[arg(long)]
    top: Option<usize>,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Load rows as-is, skipping agency and description cleanup.
    #[arg(long)]
    no_normalize: bool,
}

fn parse_time(s: &str) -> std::result::Result<NaiveDateTime, String> {
    if let Ok(day) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return Ok(day.and_time(chrono::NaiveTime::MIN));
    }
    parse_timestamp(s).map_err(|e| e.reason)
}

#[derive(Debug, Serialize)]
struct Summary {
    records: usize,
    visible: usize,
    totals: Totals,
    period: [String; 2],
    filtered_charts: Vec<&'static str>,
    top_zips: Vec<Row>,
    hotspots: Vec<Hotspot>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if cli.no_normalize {
        config.normalize = None;
    } else if config.normalize.is_none() {
        config.normalize = Some(NormalizeConfig::default());
    }
    if let Some(top) = cli.top {
        config.hotspot_rows = top;
    }

    let (mut dash, stats) = Dashboard::from_paths(&cli.data, &config).context("loading citations")?;
    tracing::info!(
        records = stats.records_loaded,
        sources = stats.sources_read,
        with_coordinates = stats.with_coordinates,
        ms = stats.load_time_ms,
        "dataset ready"
    );

    apply_filters(&mut dash, &cli)?;

    let summary = summarize(&dash, config.hotspot_rows)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_text(&summary);
    }
    Ok(())
}

fn apply_filters(dash: &mut Dashboard, cli: &Cli) -> Result<()> {
    if !cli.zips.is_empty() {
        dash.select_zips(cli.zips.iter().map(String::as_str))?;
    }
    if !cli.agencies.is_empty() {
        dash.select_agencies(cli.agencies.iter().map(String::as_str))?;
    }
    if !cli.ticket_types.is_empty() {
        dash.select_ticket_types(cli.ticket_types.iter().map(String::as_str))?;
    }
    if cli.from.is_some() || cli.to.is_some() {
        let (first, last) = dash.time_domain();
        let from = cli.from.unwrap_or(first);
        let to = match cli.to {
            Some(to) => to,
            None => last
                .checked_add_signed(TimeDelta::seconds(1))
                .context("time domain ends at the latest representable timestamp")?,
        };
        if from >= to {
            bail!("--from {from} is not before --to {to}");
        }
        dash.select_time(from, to)?;
    }
    Ok(())
}

fn summarize(dash: &Dashboard, top: usize) -> Result<Summary> {
    let mut top_zips = dash.zip_rows()?;
    top_zips.sort_by(|a, b| b.tickets.cmp(&a.tickets));
    top_zips.retain(|r| r.tickets > 0);
    top_zips.truncate(top);

    let (first, last) = dash.time_domain();
    Ok(Summary {
        records: dash.crossfilter().size(),
        visible: dash.visible_count(),
        totals: dash.totals()?,
        period: [first.to_string(), last.to_string()],
        filtered_charts: Chart::ALL
            .into_iter()
            .filter(|c| dash.reset_flag(*c))
            .map(Chart::id)
            .collect(),
        top_zips,
        hotspots: dash.hotspots()?,
    })
}

fn print_text(s: &Summary) {
    println!("tickets: {} of {}", s.totals.tickets, s.records);
    println!("revenue: {:.2}", s.totals.revenue);
    println!("period: {} .. {}", s.period[0], s.period[1]);
    if !s.filtered_charts.is_empty() {
        println!("filtered: {}", s.filtered_charts.join(", "));
    }
    println!("top zips:");
    for row in &s.top_zips {
        println!("  {:<8} {:>6}", row.label, row.tickets);
    }
    println!("hotspots:");
    for h in &s.hotspots {
        println!(
            "  {:>6}  {} ({}) {}",
            h.tickets, h.location, h.zip, h.description
        );
    }
}
