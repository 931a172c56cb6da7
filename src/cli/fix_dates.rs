use std::path::PathBuf;

use colored::Colorize;

use crate::dates::{repair_csv_dates, repaired_path};
use crate::error::{BanvicError, Result};
use crate::fmt::count;
use crate::settings::shellexpand_path;

pub fn run(file: &str, column: &str, output: Option<String>) -> Result<()> {
    let input = PathBuf::from(shellexpand_path(file));
    if !input.is_file() {
        return Err(BanvicError::MissingInput {
            table: file.to_string(),
            dir: input
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        });
    }
    let output = output
        .map(|o| PathBuf::from(shellexpand_path(&o)))
        .unwrap_or_else(|| repaired_path(&input));

    let report = repair_csv_dates(&input, column, &output)?;
    println!("Original rows:  {}", count(report.original));
    println!("Valid rows:     {}", count(report.valid));
    if report.removed > 0 {
        println!("Removed rows:   {}", count(report.removed).yellow());
    } else {
        println!("Removed rows:   0");
    }
    println!("{} {}", "Wrote".green().bold(), output.display());
    Ok(())
}
