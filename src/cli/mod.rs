pub mod check;
pub mod demo;
pub mod fix_dates;
pub mod init;
pub mod report;
pub mod run;
pub mod status;

use clap::{Parser, Subcommand};

use crate::calendar::Locale;
use crate::join::InvalidDatePolicy;

#[derive(Parser)]
#[command(
    name = "banvic",
    version,
    about = "Star schema and business metrics from the BanVic bank extracts."
)]
pub struct Cli {
    /// Log debug details (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save default directories and policies.
    Init {
        /// Directory holding the raw extracts (default: ~/Documents/banvic/dados/raw)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Directory for generated tables (default: ~/Documents/banvic/dados/processed)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
        /// Language of weekday, month and parity labels
        #[arg(long, value_enum)]
        locale: Option<Locale>,
        /// What to do with transactions whose date cannot be parsed
        #[arg(long = "invalid-dates", value_enum)]
        invalid_dates: Option<InvalidDatePolicy>,
    },
    /// Run the full pipeline and write every output table.
    Run {
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
        /// Also write an HTML table per output
        #[arg(long)]
        html: bool,
    },
    /// Print an analysis to the terminal without writing files.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
        #[arg(long = "data-dir", global = true)]
        data_dir: Option<String>,
    },
    /// Inspect the input files: presence, row counts, headers and date samples.
    Check {
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Rewrite a CSV with its date column normalized, dropping unparseable rows.
    FixDates {
        /// CSV file to repair
        file: String,
        /// Date column name
        #[arg(long, default_value = crate::dates::DATE_COLUMN)]
        column: String,
        /// Output path (default: <stem>_corrigido.csv next to the input)
        #[arg(long)]
        output: Option<String>,
    },
    /// Write a small deterministic sample dataset.
    Demo {
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show the active settings and what the directories contain.
    Status,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum ReportCommands {
    /// Headline indicators and the month-parity comparison.
    Kpis,
    /// Volume and approval by day of the week.
    Weekday,
    /// Even versus odd months.
    Parity,
    /// Branch ranking over the last six months.
    Branches,
    /// Monthly evolution.
    Periods,
    /// Customer segments by volume quartile.
    Segments,
    /// Per-branch statistics and size class.
    Agencies,
}
