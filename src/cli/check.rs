use std::collections::BTreeMap;
use std::sync::OnceLock;

use colored::Colorize;
use comfy_table::{Cell, Table};
use regex::Regex;

use crate::dates::{self, DATE_COLUMN};
use crate::error::Result;
use crate::loader::{locate, RawTable, ACCOUNTS, ALL_SCHEMAS, TRANSACTIONS};
use crate::pipeline::PipelineConfig;
use crate::settings::load_settings;

const SAMPLE_SIZE: usize = 5;

/// Recognizable layouts of a raw date value, checked in order.
fn date_shapes() -> &'static [(&'static str, Regex)] {
    static SHAPES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    SHAPES.get_or_init(|| {
        [
            ("iso + UTC", r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} UTC$"),
            ("iso + fraction + UTC", r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d+ UTC$"),
            (
                "iso + offset",
                r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(\.\d+)?([+-]\d{2}:?\d{2}|Z)$",
            ),
            ("iso datetime", r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(\.\d+)?$"),
            ("iso date", r"^\d{4}-\d{2}-\d{2}$"),
            ("dd/mm/yyyy", r"^\d{2}/\d{2}/\d{4}( \d{2}:\d{2}(:\d{2})?)?$"),
        ]
        .into_iter()
        .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (name, re)))
        .collect()
    })
}

pub fn classify_date(raw: &str) -> &'static str {
    let s = raw.trim();
    if s.is_empty() {
        return "empty";
    }
    date_shapes()
        .iter()
        .find(|(_, re)| re.is_match(s))
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}

pub fn run(data_dir: Option<String>) -> Result<()> {
    let config = PipelineConfig::from_settings(&load_settings()).with_data_dir(data_dir);
    println!("Checking {}\n", config.data_dir.display());

    let mut table = Table::new();
    table.set_header(vec!["Table", "File", "Rows", "Missing columns"]);
    let mut problems = 0usize;
    for schema in ALL_SCHEMAS {
        let Some(path) = locate(&config.data_dir, schema) else {
            let optional = schema.table == ACCOUNTS.table;
            let label = if optional {
                "(optional, not found)".yellow()
            } else {
                "not found".red()
            };
            if !optional {
                problems += 1;
            }
            table.add_row(vec![
                Cell::new(schema.table),
                Cell::new(label),
                Cell::new(""),
                Cell::new(""),
            ]);
            continue;
        };
        let raw = RawTable::read(&path)?;
        let missing: Vec<&str> = schema
            .columns
            .iter()
            .filter(|c| c.required && raw.column_index(c.aliases).is_none())
            .map(|c| c.aliases[0])
            .collect();
        if !missing.is_empty() {
            problems += 1;
        }
        let file = raw
            .source
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(schema.table),
            Cell::new(file),
            Cell::new(raw.rows.len()),
            Cell::new(if missing.is_empty() {
                "-".green()
            } else {
                missing.join(", ").red()
            }),
        ]);
        println!("{} {}", format!("{}:", schema.table).bold(), raw.headers.join(", "));
    }
    println!("\n{table}");

    if let Some(path) = locate(&config.data_dir, &TRANSACTIONS) {
        check_dates(&RawTable::read(&path)?);
    }

    if problems > 0 {
        println!("\n{}", format!("{problems} problem(s) found").red().bold());
    } else {
        println!("\n{}", "All inputs present".green().bold());
    }
    Ok(())
}

fn check_dates(raw: &RawTable) {
    let Some(idx) = TRANSACTIONS
        .columns
        .iter()
        .find(|c| c.key == "date")
        .and_then(|c| raw.column_index(c.aliases))
    else {
        return;
    };
    let values: Vec<&str> = raw
        .rows
        .iter()
        .map(|r| r.get(idx).map(String::as_str).unwrap_or(""))
        .collect();

    let mut shapes: BTreeMap<&str, usize> = BTreeMap::new();
    for v in &values {
        *shapes.entry(classify_date(v)).or_default() += 1;
    }
    println!("\n{}", format!("{DATE_COLUMN} samples").bold());
    for v in values.iter().take(SAMPLE_SIZE) {
        println!("  {v:<36} {}", classify_date(v).dimmed());
    }

    let mut table = Table::new();
    table.set_header(vec!["Layout", "Rows"]);
    for (shape, n) in &shapes {
        table.add_row(vec![Cell::new(shape), Cell::new(n)]);
    }
    println!("{table}");

    let normalized = dates::normalize(&values, DATE_COLUMN);
    println!(
        "Parsed {}/{} with strategy: {}",
        normalized.parsed,
        normalized.total(),
        normalized.strategy
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_date() {
        assert_eq!(classify_date("2024-01-15 10:00:00 UTC"), "iso + UTC");
        assert_eq!(classify_date("2024-01-15 10:00:00.123 UTC"), "iso + fraction + UTC");
        assert_eq!(classify_date("2024-01-15T10:00:00-03:00"), "iso + offset");
        assert_eq!(classify_date("2024-01-15T10:00:00Z"), "iso + offset");
        assert_eq!(classify_date("2024-01-15 10:00:00"), "iso datetime");
        assert_eq!(classify_date("2024-01-15"), "iso date");
        assert_eq!(classify_date("15/01/2024"), "dd/mm/yyyy");
        assert_eq!(classify_date("15/01/2024 10:30"), "dd/mm/yyyy");
        assert_eq!(classify_date("  "), "empty");
        assert_eq!(classify_date("ontem"), "unknown");
    }
}
