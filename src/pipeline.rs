use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::calendar::{Locale, MonthParity};
use crate::dates::{self, Strategy, DATE_COLUMN};
use crate::dimension::{self, DateRow};
use crate::error::Result;
use crate::export::{self, CsvSink, ExportReport, HtmlSink, Sink};
use crate::join::{self, FactRow, InvalidDatePolicy};
use crate::loader;
use crate::metrics::{self, BranchMetrics, BranchRanking, CustomerMetrics, GroupSummary, Kpis};
use crate::metrics::{ParityComparison, PeriodSummary, Window};
use crate::models::{Branch, Customer};
use crate::settings::{shellexpand_path, Settings};
use crate::tables;

/// Length of the trailing window for the branch ranking.
pub const RECENT_MONTHS: u32 = 6;

/// Paths and policies for one run. Built from settings, overridden by flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub locale: Locale,
    pub invalid_dates: InvalidDatePolicy,
    pub html: bool,
    pub recent_months: u32,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            data_dir: PathBuf::from(shellexpand_path(&settings.data_dir)),
            output_dir: PathBuf::from(shellexpand_path(&settings.output_dir)),
            locale: settings.locale,
            invalid_dates: settings.invalid_dates,
            html: settings.html,
            recent_months: RECENT_MONTHS,
        }
    }

    pub fn with_data_dir(mut self, dir: Option<String>) -> Self {
        if let Some(d) = dir {
            self.data_dir = PathBuf::from(shellexpand_path(&d));
        }
        self
    }

    pub fn with_output_dir(mut self, dir: Option<String>) -> Self {
        if let Some(d) = dir {
            self.output_dir = PathBuf::from(shellexpand_path(&d));
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Stage reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Done(String),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub status: StageStatus,
}

impl StageReport {
    fn done(stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Done(detail.into()),
        }
    }

    fn skipped(stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped(detail.into()),
        }
    }

    fn failed(stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Failed(detail.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, StageStatus::Failed(_))
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            StageStatus::Done(d) => write!(f, "{}: {d}", self.stage),
            StageStatus::Skipped(d) => write!(f, "{}: skipped ({d})", self.stage),
            StageStatus::Failed(d) => write!(f, "{}: FAILED ({d})", self.stage),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Everything computed from one load of the inputs.
pub struct Analysis {
    pub locale: Locale,
    pub facts: Vec<FactRow>,
    pub customers: Vec<Customer>,
    pub branches: Vec<Branch>,
    pub dates: Vec<DateRow>,
    pub weekday: Vec<GroupSummary<u32>>,
    pub parity: Vec<GroupSummary<MonthParity>>,
    pub recent_window: Option<Window>,
    pub recent_branches: Vec<BranchRanking>,
    pub periods: Vec<PeriodSummary>,
    pub branch_metrics: Vec<BranchMetrics>,
    pub customer_metrics: Vec<CustomerMetrics>,
    pub kpis: Kpis,
    pub parity_test: ParityComparison,
}

/// Load, normalize, join and aggregate. Missing inputs abort the run;
/// data problems are tolerated and reported per stage.
pub fn analyze(config: &PipelineConfig) -> Result<(Analysis, Vec<StageReport>)> {
    let mut stages = Vec::new();

    let dataset = loader::load_dataset(&config.data_dir)?;
    stages.push(StageReport::done(
        "load",
        format!(
            "{} transactions, {} accounts, {} customers, {} branches, {} rows skipped",
            dataset.transactions.len(),
            dataset.accounts.len(),
            dataset.customers.len(),
            dataset.branches.len(),
            dataset.skipped_rows
        ),
    ));

    let mut transactions = dataset.transactions;
    let raw: Vec<&str> = transactions.iter().map(|t| t.raw_date.as_str()).collect();
    let normalized = dates::normalize(&raw, DATE_COLUMN);
    for (t, ts) in transactions.iter_mut().zip(normalized.values.iter()) {
        t.timestamp = *ts;
    }
    let date_detail = format!(
        "{}/{} parsed ({})",
        normalized.parsed,
        normalized.total(),
        normalized.strategy
    );
    stages.push(if normalized.strategy == Strategy::Failed && normalized.total() > 0 {
        StageReport::failed("dates", date_detail)
    } else {
        StageReport::done("dates", date_detail)
    });

    let (transactions, dropped) = join::filter_valid_dates(transactions, config.invalid_dates);
    let (facts, join_report) = join::build_fact_table(
        transactions,
        &dataset.accounts,
        &dataset.customers,
        &dataset.branches,
    );
    stages.push(StageReport::done(
        "join",
        format!(
            "{} fact rows, {} dropped for invalid dates, {} unknown accounts, \
             {} without customer, {} without branch, {} duplicate keys",
            join_report.rows,
            dropped,
            join_report.unmatched_accounts,
            join_report.unmatched_customers,
            join_report.unmatched_branches,
            join_report.duplicate_keys
        ),
    ));

    let (recent_window, recent_branches) =
        metrics::rank_branches_recent(&facts, config.recent_months);
    let periods = metrics::by_period(&facts);
    let branch_metrics = metrics::branch_metrics(&facts);
    let customer_metrics = metrics::customer_metrics(&facts);
    stages.push(StageReport::done(
        "metrics",
        format!(
            "{} periods, {} branches, {} customers",
            periods.len(),
            branch_metrics.len(),
            customer_metrics.len()
        ),
    ));

    let timestamps: Vec<Option<NaiveDateTime>> =
        facts.iter().map(|f| f.transaction.timestamp).collect();
    let date_rows = dimension::dimension_for(&timestamps, config.locale);
    stages.push(if date_rows.is_empty() {
        warn!("no valid dates; date dimension is empty");
        StageReport::skipped("dimension", "no valid dates")
    } else {
        StageReport::done("dimension", format!("{} days", date_rows.len()))
    });

    let analysis = Analysis {
        locale: config.locale,
        weekday: metrics::by_weekday(&facts),
        parity: metrics::by_month_parity(&facts),
        kpis: metrics::kpis(&facts),
        parity_test: metrics::compare_parity(&facts),
        facts,
        customers: dataset.customers,
        branches: dataset.branches,
        dates: date_rows,
        recent_window,
        recent_branches,
        periods,
        branch_metrics,
        customer_metrics,
    };
    Ok((analysis, stages))
}

pub struct RunSummary {
    pub analysis: Analysis,
    pub stages: Vec<StageReport>,
    pub export: ExportReport,
}

impl RunSummary {
    pub fn is_ok(&self) -> bool {
        self.export.is_ok() && !self.stages.iter().any(StageReport::is_failed)
    }
}

/// Full run: analyze, then write every output table.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    info!(
        data_dir = %config.data_dir.display(),
        output_dir = %config.output_dir.display(),
        "pipeline started"
    );
    let (analysis, mut stages) = analyze(config)?;

    let tables = tables::build_all(&analysis);
    let mut sinks: Vec<&dyn Sink> = vec![&CsvSink];
    if config.html {
        sinks.push(&HtmlSink);
    }
    let export = export::export_tables(&tables, &config.output_dir, &sinks);
    stages.push(if export.is_ok() {
        StageReport::done("export", format!("{} files written", export.written.len()))
    } else {
        StageReport::failed(
            "export",
            format!(
                "{} written, {} failed",
                export.written.len(),
                export.failures.len()
            ),
        )
    });

    info!("pipeline finished");
    Ok(RunSummary {
        analysis,
        stages,
        export,
    })
}
