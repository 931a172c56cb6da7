use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{BanvicError, Result};
use crate::fmt::{count, money, percent};
use crate::pipeline::{self, PipelineConfig, StageStatus};
use crate::settings::load_settings;

pub fn run(data_dir: Option<String>, output_dir: Option<String>, html: bool) -> Result<()> {
    let settings = load_settings();
    let mut config = PipelineConfig::from_settings(&settings)
        .with_data_dir(data_dir)
        .with_output_dir(output_dir);
    config.html |= html;

    let summary = pipeline::run(&config)?;

    for stage in &summary.stages {
        let line = stage.to_string();
        match stage.status {
            StageStatus::Done(_) => println!("  {} {line}", "✓".green()),
            StageStatus::Skipped(_) => println!("  {} {line}", "-".yellow()),
            StageStatus::Failed(_) => println!("  {} {line}", "✗".red()),
        }
    }

    let mut table = Table::new();
    table.set_header(vec!["File", "Rows", "SHA-256"]);
    for f in &summary.export.written {
        table.add_row(vec![
            Cell::new(&f.file),
            Cell::new(count(f.rows)),
            Cell::new(&f.sha256[..12]),
        ]);
    }
    println!("\nWrote to {}\n{table}", config.output_dir.display());

    let k = &summary.analysis.kpis;
    println!(
        "{} transactions, volume {}, approval {}",
        count(k.stats.count),
        money(k.stats.volume()),
        percent(k.stats.approval_rate())
    );

    for (file, err) in &summary.export.failures {
        eprintln!("{} {file}: {err}", "Failed".red().bold());
    }
    if !summary.export.is_ok() {
        return Err(BanvicError::Other(format!(
            "{} output file(s) could not be written",
            summary.export.failures.len()
        )));
    }
    Ok(())
}
