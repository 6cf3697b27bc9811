//! Train and predict subcommands.
//!
//! The core library returns plain data; everything printed to the terminal
//! (tables, the overflow warning, the occupancy chart) is built here.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tracing::{info, warn};

use shelter_forecast::features::{DISTANCE_RANGE, RAINFALL_RANGE, TEMPERATURE_RANGE};
use shelter_forecast::{
    CsvDataset, EvaluationMetrics, FeatureVector, ForecastConfig, ModelCache, ScenarioEvaluator,
    ScenarioResult, TrainedModel,
};

/// Character width of the longest chart bar's axis.
pub const CHART_WIDTH: usize = 40;

// ============================================================================
// Arguments
// ============================================================================

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty table output
    #[default]
    Table,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

/// Configuration overrides shared by every command that fits a model
#[derive(Args, Debug, Clone, Default)]
pub struct FitArgs {
    /// Forecast configuration JSON; missing fields use defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seed for the train/test split and bootstrap sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of trees in the forest
    #[arg(short = 'n', long)]
    pub estimators: Option<usize>,
}

impl FitArgs {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve(&self) -> Result<ForecastConfig> {
        let mut config = match &self.config {
            Some(path) => ForecastConfig::from_json(path)?,
            None => ForecastConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.estimators {
            config.n_estimators = n;
        }
        config.validate()?;
        Ok(config)
    }

    fn is_set(&self) -> bool {
        self.config.is_some() || self.seed.is_some() || self.estimators.is_some()
    }
}

/// Arguments for the train command
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Historical records CSV
    #[arg(short, long)]
    pub data: PathBuf,

    #[command(flatten)]
    pub fit: FitArgs,

    /// Write the fitted model to this JSON file
    #[arg(short, long)]
    pub save: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the predict command
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["data", "model"])))]
pub struct PredictArgs {
    /// Historical records CSV to fit the model on
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Model previously written by `train --save`
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    #[command(flatten)]
    pub fit: FitArgs,

    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Scenario inputs; defaults are the baseline scenario
#[derive(Args, Debug, Clone, Copy)]
pub struct ScenarioArgs {
    /// Expected rainfall in mm, 0 to 500
    #[arg(long, value_parser = parse_rainfall, default_value_t = FeatureVector::default().rainfall_mm)]
    pub rainfall: f64,

    /// Mean temperature in °C, -50 to 60
    #[arg(
        long,
        value_parser = parse_temperature,
        allow_negative_numbers = true,
        default_value_t = FeatureVector::default().temperature_c
    )]
    pub temperature: f64,

    /// Site vulnerability index, 0 to 10
    #[arg(
        long,
        value_parser = clap::value_parser!(u8).range(0..=10),
        default_value_t = FeatureVector::default().vulnerability_index
    )]
    pub vulnerability: u8,

    /// Previous extreme events at the site, 0 to 20
    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(0..=20),
        default_value_t = FeatureVector::default().past_events
    )]
    pub past_events: u32,

    /// Distance to the nearest city in km, 0 to 500
    #[arg(long, value_parser = parse_distance, default_value_t = FeatureVector::default().distance_to_city_km)]
    pub distance: f64,

    /// Maximum shelter capacity in people, 1 to 1000
    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(1..=1000),
        default_value_t = FeatureVector::default().shelter_capacity
    )]
    pub capacity: u32,
}

impl From<ScenarioArgs> for FeatureVector {
    fn from(args: ScenarioArgs) -> Self {
        FeatureVector {
            rainfall_mm: args.rainfall,
            temperature_c: args.temperature,
            vulnerability_index: args.vulnerability,
            past_events: args.past_events,
            distance_to_city_km: args.distance,
            shelter_capacity: args.capacity,
        }
    }
}

fn bounded(s: &str, (min, max): (f64, f64)) -> std::result::Result<f64, String> {
    let value: f64 = s.trim().parse().map_err(|_| format!("`{s}` is not a number"))?;
    if !value.is_finite() || value < min || value > max {
        return Err(format!("{value} is not in [{min}, {max}]"));
    }
    Ok(value)
}

fn parse_rainfall(s: &str) -> std::result::Result<f64, String> {
    bounded(s, RAINFALL_RANGE)
}

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    bounded(s, TEMPERATURE_RANGE)
}

fn parse_distance(s: &str) -> std::result::Result<f64, String> {
    bounded(s, DISTANCE_RANGE)
}

// ============================================================================
// Display Structs
// ============================================================================

/// Metric display row for tables
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Result display row for tables
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Item")]
    item: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Everything `predict` reports about one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    /// Scenario that was evaluated.
    pub scenario: FeatureVector,
    /// Occupancy, overflow flag and supplies.
    pub result: ScenarioResult,
    /// Predicted occupancy divided by capacity.
    pub capacity_utilization: f64,
    /// Held-out scores of the model used.
    pub model_metrics: EvaluationMetrics,
}

impl PredictionReport {
    /// Bundle a scenario with its outcome.
    pub fn new(scenario: FeatureVector, result: ScenarioResult, model_metrics: EvaluationMetrics) -> Self {
        let capacity_utilization = result.capacity_utilization(scenario.shelter_capacity);
        PredictionReport { scenario, result, capacity_utilization, model_metrics }
    }
}

/// One bar of the occupancy-versus-capacity chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartBar {
    /// Bar label.
    pub label: &'static str,
    /// People represented.
    pub value: u64,
    /// Filled cells out of `width`.
    pub cells: usize,
}

/// Occupancy and capacity bars scaled to the chart's upper bound.
pub fn chart_bars(result: &ScenarioResult, capacity: u32, width: usize) -> [ChartBar; 2] {
    let upper = result.chart_upper_bound(capacity);
    let cells = |v: u64| {
        if upper > 0.0 {
            ((v as f64 / upper) * width as f64).round() as usize
        } else {
            0
        }
    };
    [
        ChartBar { label: "Estimated occupancy", value: result.predicted_people, cells: cells(result.predicted_people) },
        ChartBar { label: "Shelter capacity", value: u64::from(capacity), cells: cells(u64::from(capacity)) },
    ]
}

// ============================================================================
// Rendering
// ============================================================================

/// Held-out metrics in the requested format.
pub fn render_metrics(metrics: &EvaluationMetrics, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(metrics)?,
        OutputFormat::Compact => format!(
            "r2={} mae={:.3} mse={:.3} train={} test={}",
            metrics.r2_label(3),
            metrics.mae,
            metrics.mse,
            metrics.n_train,
            metrics.n_test
        ),
        OutputFormat::Table => {
            let rows = vec![
                MetricRow { metric: "R²", value: metrics.r2_label(3) },
                MetricRow { metric: "MAE", value: format!("{:.3}", metrics.mae) },
                MetricRow { metric: "MSE", value: format!("{:.3}", metrics.mse) },
                MetricRow { metric: "RMSE", value: format!("{:.3}", metrics.rmse()) },
                MetricRow { metric: "Training records", value: metrics.n_train.to_string() },
                MetricRow { metric: "Held-out records", value: metrics.n_test.to_string() },
            ];
            let mut out = String::new();
            writeln!(out, "{}", "Model Evaluation (held-out set)".bold().cyan())?;
            write!(out, "{}", Table::new(rows).with(Style::rounded()))?;
            out
        }
    })
}

/// Scenario outcome in the requested format.
pub fn render_prediction(report: &PredictionReport, format: OutputFormat) -> Result<String> {
    let r = &report.result;
    let capacity = report.scenario.shelter_capacity;

    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Compact => format!(
            "people={} capacity={} exceeded={} water_l={:.1} meals={} kits={}",
            r.predicted_people,
            capacity,
            r.capacity_exceeded,
            r.resources.water_liters,
            r.resources.meals,
            r.resources.medical_kits
        ),
        OutputFormat::Table => {
            let mut out = String::new();
            writeln!(out, "{}", "Shelter Occupancy Forecast".bold().cyan())?;
            writeln!(out, "{}", "=".repeat(50))?;

            if r.capacity_exceeded {
                writeln!(
                    out,
                    "{} Predicted occupancy ({} people) exceeds shelter capacity ({} people). \
                     Consider expanding capacity or opening additional shelters.",
                    "[WARN]".yellow().bold(),
                    r.predicted_people,
                    capacity
                )?;
            } else {
                writeln!(out, "{} Predicted occupancy is within shelter capacity.", "[OK]".green().bold())?;
            }

            let rows = vec![
                ResultRow { item: "Predicted people", value: r.predicted_people.to_string() },
                ResultRow { item: "Water (liters/day)", value: format!("{:.1}", r.resources.water_liters) },
                ResultRow { item: "Meals (per day)", value: r.resources.meals.to_string() },
                ResultRow { item: "Medical kits", value: r.resources.medical_kits.to_string() },
                ResultRow {
                    item: "Capacity utilization",
                    value: format!("{:.0}%", report.capacity_utilization * 100.0),
                },
            ];
            writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;

            writeln!(out, "{}", "Estimated occupancy vs shelter capacity".bold())?;
            let [occupancy, shelter] = chart_bars(r, capacity, CHART_WIDTH);
            let occupancy_bar = if r.capacity_exceeded {
                "█".repeat(occupancy.cells).red()
            } else {
                "█".repeat(occupancy.cells).yellow()
            };
            writeln!(out, "  {:<20} {} {}", occupancy.label, occupancy_bar, occupancy.value)?;
            writeln!(out, "  {:<20} {} {}", shelter.label, "█".repeat(shelter.cells).green(), shelter.value)?;

            let m = &report.model_metrics;
            write!(
                out,
                "{}",
                format!("Model: R²={} MAE={:.3} MSE={:.3}", m.r2_label(3), m.mae, m.mse).dimmed()
            )?;
            out
        }
    })
}

// ============================================================================
// Commands
// ============================================================================

/// Execute the train command
pub fn execute_train(args: TrainArgs) -> Result<()> {
    let config = args.fit.resolve()?;
    let dataset = CsvDataset::from_path(&args.data)
        .with_context(|| format!("failed to load records from {}", args.data.display()))?;
    let model = TrainedModel::fit_dataset(&dataset, &config)?;

    println!("{}", render_metrics(model.metrics(), args.format)?);

    if let Some(path) = &args.save {
        model.save_json(path)?;
        if args.format == OutputFormat::Table {
            println!("{} Model saved to {}", "[OK]".green().bold(), path.display());
        }
    }
    Ok(())
}

/// Execute the predict command
pub fn execute_predict(args: PredictArgs) -> Result<()> {
    let report = build_report(&args)?;
    println!("{}", render_prediction(&report, args.format)?);
    Ok(())
}

/// Load or fit the model named by `args` and evaluate its scenario.
pub fn build_report(args: &PredictArgs) -> Result<PredictionReport> {
    let model = load_or_fit(args)?;
    let evaluator = ScenarioEvaluator::new(model);

    let scenario = FeatureVector::from(args.scenario);
    let result = evaluator.evaluate(&scenario)?;
    info!(
        "Scenario evaluated: {} people for capacity {}",
        result.predicted_people, scenario.shelter_capacity
    );

    Ok(PredictionReport::new(scenario, result, *evaluator.metrics()))
}

fn load_or_fit(args: &PredictArgs) -> Result<Arc<TrainedModel>> {
    if let Some(path) = &args.model {
        if args.fit.is_set() {
            warn!("--config, --seed and --estimators are ignored when --model is given");
        }
        let model = TrainedModel::load_json(path)
            .with_context(|| format!("failed to load model from {}", path.display()))?;
        return Ok(Arc::new(model));
    }

    let data = args.data.as_ref().context("either --data or --model is required")?;
    let config = args.fit.resolve()?;
    let dataset = CsvDataset::from_path(data)
        .with_context(|| format!("failed to load records from {}", data.display()))?;
    Ok(ModelCache::new().get_or_fit(&dataset, &config)?)
}

// ============================================================================
// Tests
// ============================================================================
