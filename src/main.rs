use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod calendar;
mod config;
mod detect;
mod error;
mod export;
mod loader;
mod models;
mod pipeline;
mod report;
mod resolver;
mod trend;

use config::Settings;
use models::ImportRecord;
use pipeline::{DetectorKind, TrendRequest, View, ViewOutcome};
use resolver::ProviderMap;

#[derive(Parser)]
#[command(name = "provider-insight")]
#[command(about = "Daily provider import counts: trends and threshold alerts", long_about = None)]
struct Cli {
    /// TOML settings file (thresholds, exclusion lists)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct Inputs {
    /// Provider map with ProviderId and ProviderName columns
    #[arg(long)]
    providers: Option<PathBuf>,
    /// Import files named after their date, with ProviderId and ImportCount columns
    #[arg(long, num_args = 1..)]
    imports: Vec<PathBuf>,
    /// Holiday list with a date column
    #[arg(long)]
    holidays: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Skip writing spreadsheet exports
    #[arg(long)]
    no_export: bool,
}

#[derive(Args)]
struct Analysis {
    /// Alert threshold in percent; overrides the configured value
    #[arg(long)]
    threshold: Option<f64>,
    /// Only include these provider labels (repeatable)
    #[arg(long)]
    allow: Vec<String>,
    #[arg(long, value_enum, default_value_t = DetectorKind::DayOverDay)]
    detector: DetectorKind,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-provider imports for a single day
    Day {
        #[command(flatten)]
        inputs: Inputs,
        /// Day to show (YYYY-MM-DD); defaults to the latest date
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Monday to Friday only, with a latest-day summary
    Workdays {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        analysis: Analysis,
        /// Keep holiday dates instead of excluding them
        #[arg(long)]
        keep_holidays: bool,
    },
    /// Saturday and Sunday only
    Weekends {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        analysis: Analysis,
    },
    /// Every date
    All {
        #[command(flatten)]
        inputs: Inputs,
        #[command(flatten)]
        analysis: Analysis,
    },
}

struct Session {
    records: Vec<ImportRecord>,
    holidays: BTreeSet<NaiveDate>,
    notices: Vec<models::Notice>,
}

fn load_session(inputs: &Inputs, settings: &Settings) -> anyhow::Result<Session> {
    let providers = match &inputs.providers {
        Some(path) => loader::load_provider_map(path)
            .with_context(|| format!("failed to read provider map {}", path.display()))?,
        None => ProviderMap::default(),
    };

    let loaded = loader::load_imports(&inputs.imports, &providers, &settings.excluded_provider_ids)
        .context("failed to read import files")?;
    let records = resolver::exclude_labels(loaded.records, &settings.excluded_providers);
    let mut notices = loaded.notices;

    let holidays = match &inputs.holidays {
        Some(path) => {
            let (holidays, holiday_notices) = loader::load_holidays(path)
                .with_context(|| format!("failed to read holiday file {}", path.display()))?;
            notices.extend(holiday_notices);
            holidays
        }
        None => BTreeSet::new(),
    };

    Ok(Session {
        records,
        holidays,
        notices,
    })
}

fn trend_command(
    inputs: &Inputs,
    analysis: Analysis,
    view: View,
    exclude_holidays: bool,
    settings: Settings,
) -> anyhow::Result<(ViewOutcome, Vec<models::Notice>)> {
    let settings = settings.with_threshold(analysis.threshold)?;
    let session = load_session(inputs, &settings)?;
    let request = TrendRequest {
        view,
        detector: analysis.detector,
        allow: analysis.allow,
        exclude_holidays,
    };
    let outcome = pipeline::trend_view(&session.records, &request, &session.holidays, &settings);
    Ok((outcome, session.notices))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    let (inputs, (mut outcome, mut notices)) = match cli.command {
        Commands::Day { inputs, date } => {
            let session = load_session(&inputs, &settings)?;
            let outcome = pipeline::single_day_view(&session.records, date, &settings);
            (inputs, (outcome, session.notices))
        }
        Commands::Workdays {
            inputs,
            analysis,
            keep_holidays,
        } => {
            let result = trend_command(&inputs, analysis, View::Workdays, !keep_holidays, settings)?;
            (inputs, result)
        }
        Commands::Weekends { inputs, analysis } => {
            let result = trend_command(&inputs, analysis, View::Weekends, false, settings)?;
            (inputs, result)
        }
        Commands::All { inputs, analysis } => {
            let result = trend_command(&inputs, analysis, View::All, false, settings)?;
            (inputs, result)
        }
    };
    notices.append(&mut outcome.notices);
    outcome.notices = notices;

    match cli.format {
        OutputFormat::Text => print!("{}", report::build_report(&outcome)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("failed to serialize view")?
        ),
    }

    if inputs.no_export {
        return Ok(());
    }
    std::fs::create_dir_all(&inputs.out_dir)
        .with_context(|| format!("failed to create {}", inputs.out_dir.display()))?;
    let written = export::export_outcome(&inputs.out_dir, &outcome).context("export failed")?;
    if written.is_empty() {
        warn!(view = outcome.view.slug(), "nothing to export");
    }
    for path in written {
        info!(path = %path.display(), "export written");
        if cli.format == OutputFormat::Text {
            println!("Export written to {}.", path.display());
        }
    }

    Ok(())
}
