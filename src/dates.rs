//! Date normalization for the transaction-date column.
//!
//! Extracts mix several textual layouts (`2024-03-10 12:00:00 UTC`,
//! `2024-03-10 12:00:00.123456 UTC`, ISO 8601 with offsets, `10/03/2024`).
//! Parsing runs three strategies in order and keeps the first one that parses
//! at least one value:
//!
//! 1. a format inferred from the first non-empty value, applied to all rows;
//! 2. each entry of [`EXPLICIT_FORMATS`], applied to all rows;
//! 3. mixed mode, where every value may match any candidate format.
//!
//! Offsets and `UTC` suffixes are dropped: the wall-clock time as written is
//! kept and never converted to another zone.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::{BanvicError, Result};
use crate::export::write_atomic;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header of the transaction-date column in the bank extracts.
pub const DATE_COLUMN: &str = "data_transacao";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Rfc3339,
    /// Naive date-time pattern. Literal suffixes such as ` UTC` are part of it.
    DateTime(&'static str),
    /// Pattern ending in a numeric offset, which is parsed and discarded.
    WithOffset(&'static str),
    Date(&'static str),
}

impl DateFormat {
    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        match self {
            Self::Rfc3339 => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()),
            Self::DateTime(fmt) => NaiveDateTime::parse_from_str(s, fmt).ok(),
            Self::WithOffset(fmt) => DateTime::parse_from_str(s, fmt)
                .ok()
                .map(|dt| dt.naive_local()),
            Self::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            Self::Rfc3339 => "rfc3339",
            Self::DateTime(fmt) | Self::WithOffset(fmt) | Self::Date(fmt) => fmt,
        }
    }
}

/// Every layout the normalizer knows, in inference priority order.
pub const CANDIDATE_FORMATS: &[DateFormat] = &[
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S%.f UTC"),
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    DateFormat::WithOffset("%Y-%m-%d %H:%M:%S%.f%:z"),
    DateFormat::WithOffset("%Y-%m-%d %H:%M:%S%.f%z"),
    DateFormat::Rfc3339,
    DateFormat::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    DateFormat::DateTime("%d/%m/%Y %H:%M:%S"),
    DateFormat::DateTime("%d/%m/%Y %H:%M"),
    DateFormat::Date("%Y-%m-%d"),
    DateFormat::Date("%d/%m/%Y"),
];

pub const EXPLICIT_FORMATS: &[DateFormat] = &[
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S UTC"),
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S%.f UTC"),
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S"),
    DateFormat::Date("%Y-%m-%d"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Inferred(DateFormat),
    Explicit(DateFormat),
    Mixed,
    /// Nothing parsed.
    Failed,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inferred(d) => write!(f, "inferred {}", d.pattern()),
            Self::Explicit(d) => write!(f, "format {}", d.pattern()),
            Self::Mixed => write!(f, "mixed"),
            Self::Failed => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub values: Vec<Option<NaiveDateTime>>,
    pub strategy: Strategy,
    pub parsed: usize,
}

impl Normalized {
    pub fn total(&self) -> usize {
        self.values.len()
    }
}

/// Parse a single value with any candidate format.
pub fn parse_any(raw: &str) -> Option<NaiveDateTime> {
    CANDIDATE_FORMATS.iter().find_map(|f| f.parse(raw))
}

fn infer_format<S: AsRef<str>>(raw: &[S]) -> Option<DateFormat> {
    let first = raw.iter().map(|s| s.as_ref().trim()).find(|s| !s.is_empty())?;
    CANDIDATE_FORMATS.iter().find(|f| f.parse(first).is_some()).copied()
}

fn apply<S: AsRef<str>>(raw: &[S], format: DateFormat) -> (Vec<Option<NaiveDateTime>>, usize) {
    let values: Vec<_> = raw.iter().map(|s| format.parse(s.as_ref())).collect();
    let parsed = values.iter().filter(|v| v.is_some()).count();
    (values, parsed)
}

/// Normalize a column of raw date strings.
pub fn normalize<S: AsRef<str>>(raw: &[S], column: &str) -> Normalized {
    let total = raw.len();
    let result = run_strategies(raw);
    if result.parsed == 0 && total > 0 {
        warn!(column, total, "no dates could be parsed");
    } else {
        info!(
            column,
            parsed = result.parsed,
            total,
            strategy = %result.strategy,
            "dates normalized"
        );
    }
    result
}

fn run_strategies<S: AsRef<str>>(raw: &[S]) -> Normalized {
    if let Some(format) = infer_format(raw) {
        let (values, parsed) = apply(raw, format);
        if parsed > 0 {
            return Normalized {
                values,
                strategy: Strategy::Inferred(format),
                parsed,
            };
        }
    }
    debug!("format inference failed, trying explicit formats");

    for format in EXPLICIT_FORMATS {
        let (values, parsed) = apply(raw, *format);
        if parsed > 0 {
            return Normalized {
                values,
                strategy: Strategy::Explicit(*format),
                parsed,
            };
        }
    }
    debug!("explicit formats failed, trying mixed mode");

    let values: Vec<_> = raw.iter().map(|s| parse_any(s.as_ref())).collect();
    let parsed = values.iter().filter(|v| v.is_some()).count();
    let strategy = if parsed > 0 {
        Strategy::Mixed
    } else {
        Strategy::Failed
    };
    Normalized {
        values,
        strategy,
        parsed,
    }
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// CSV date repair
// ---------------------------------------------------------------------------

pub struct RepairReport {
    pub original: usize,
    pub valid: usize,
    pub removed: usize,
}

/// Default output path for a repaired file: `<stem>_corrigido.csv` beside the input.
pub fn repaired_path(input: &Path) -> std::path::PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dados".to_string());
    input.with_file_name(format!("{stem}_corrigido.csv"))
}

/// Rewrite `input` with `column` normalized to [`TIMESTAMP_FORMAT`], dropping
/// rows whose date cannot be parsed in any known layout.
pub fn repair_csv_dates(input: &Path, column: &str, output: &Path) -> Result<RepairReport> {
    let file = std::fs::File::open(input)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let headers = rdr.headers()?.clone();
    let idx = headers
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(column))
        .ok_or_else(|| BanvicError::Schema {
            table: input.display().to_string(),
            column: column.to_string(),
        })?;

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&headers)?;
    let mut original = 0usize;
    let mut valid = 0usize;
    for result in rdr.records() {
        let record = result?;
        original += 1;
        let Some(ts) = record.get(idx).and_then(parse_any) else {
            continue;
        };
        let fixed = format_timestamp(&ts);
        let row: Vec<&str> = record
            .iter()
            .enumerate()
            .map(|(i, f)| if i == idx { fixed.as_str() } else { f })
            .collect();
        wtr.write_record(&row)?;
        valid += 1;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| BanvicError::Other(e.to_string()))?;
    write_atomic(output, &bytes)?;

    Ok(RepairReport {
        original,
        valid,
        removed: original - valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn ymd(ts: NaiveDateTime) -> (i32, u32, u32) {
        (ts.year(), ts.month(), ts.day())
    }

    #[test]
    fn test_calendar_fields_match_source() {
        let cases = [
            ("2024-03-10 12:00:00 UTC", (2024, 3, 10)),
            ("2024-03-10 12:00:00.123456 UTC", (2024, 3, 10)),
            ("2023-12-31 23:59:59", (2023, 12, 31)),
            ("2023-12-31T23:59:59Z", (2023, 12, 31)),
            ("2022-02-28", (2022, 2, 28)),
            ("05/07/2021", (2021, 7, 5)),
            ("05/07/2021 08:15", (2021, 7, 5)),
            ("05/07/2021 08:15:30", (2021, 7, 5)),
        ];
        for (raw, expected) in cases {
            let ts = parse_any(raw).unwrap_or_else(|| panic!("failed to parse {raw}"));
            assert_eq!(ymd(ts), expected, "{raw}");
        }
    }

    #[test]
    fn test_day_first_without_seconds() {
        let n = normalize(&["10/03/2024 12:00", "11/03/2024 13:30"], "d");
        assert_eq!(n.parsed, 2);
        assert_eq!(n.strategy, Strategy::Inferred(DateFormat::DateTime("%d/%m/%Y %H:%M")));
        let ts = n.values[1].unwrap();
        assert_eq!(ymd(ts), (2024, 3, 11));
        assert_eq!((ts.hour(), ts.minute()), (13, 30));
    }

    #[test]
    fn test_fractional_seconds_same_date() {
        let with = normalize(&["2024-03-10 12:00:00.123456 UTC"], "d");
        let without = normalize(&["2024-03-10 12:00:00 UTC"], "d");
        let a = with.values[0].unwrap();
        let b = without.values[0].unwrap();
        assert_eq!(a.date(), b.date());
        assert_eq!(a.hour(), 12);
    }

    #[test]
    fn test_offset_is_stripped_not_converted() {
        let ts = parse_any("2024-03-10T23:30:00-03:00").unwrap();
        assert_eq!(ymd(ts), (2024, 3, 10));
        assert_eq!(ts.hour(), 23);
        let ts = parse_any("2024-03-10 23:30:00+00:00").unwrap();
        assert_eq!(ts.hour(), 23);
    }

    #[test]
    fn test_inferred_strategy_for_uniform_column() {
        let raw = ["2024-01-15 10:00:00 UTC", "2024-01-16 11:30:00.5 UTC", ""];
        let n = normalize(&raw, "data_transacao");
        assert!(matches!(n.strategy, Strategy::Inferred(_)));
        assert_eq!(n.parsed, 2);
        assert_eq!(n.total(), 3);
        assert!(n.values[2].is_none());
    }

    #[test]
    fn test_inferred_format_applies_to_all_rows() {
        let raw = ["2024-01-15", "15/02/2024"];
        let n = normalize(&raw, "d");
        assert_eq!(n.strategy, Strategy::Inferred(DateFormat::Date("%Y-%m-%d")));
        assert_eq!(n.parsed, 1);
        assert!(n.values[1].is_none());
    }

    #[test]
    fn test_explicit_formats_after_failed_inference() {
        let raw = ["garbage", "2024-01-15 10:00:00 UTC"];
        let n = normalize(&raw, "d");
        assert_eq!(
            n.strategy,
            Strategy::Explicit(DateFormat::DateTime("%Y-%m-%d %H:%M:%S UTC"))
        );
        assert_eq!(n.parsed, 1);
    }

    #[test]
    fn test_mixed_mode_as_last_resort() {
        let raw = ["garbage", "15/02/2024", "2024-02-16T10:00:00Z"];
        let n = normalize(&raw, "d");
        assert_eq!(n.strategy, Strategy::Mixed);
        assert_eq!(n.parsed, 2);
        assert!(n.values[0].is_none());
    }

    #[test]
    fn test_all_unparseable() {
        let n = normalize(&["nope", "13/13/2024", ""], "d");
        assert_eq!(n.strategy, Strategy::Failed);
        assert_eq!(n.parsed, 0);
        assert!(n.values.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_empty_input() {
        let raw: [&str; 0] = [];
        let n = normalize(&raw, "d");
        assert_eq!(n.total(), 0);
        assert_eq!(n.parsed, 0);
    }

    #[test]
    fn test_repair_csv_dates_drops_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("transacoes.csv");
        std::fs::write(
            &input,
            "cod_transacao,data_transacao,valor_transacao\n\
             1,2024-03-10 12:00:00.123456 UTC,10.5\n\
             2,not a date,20\n\
             3,2024-03-11 08:15:00 UTC,30\n",
        )
        .unwrap();
        let output = repaired_path(&input);
        assert!(output.ends_with("transacoes_corrigido.csv"));
        let report = repair_csv_dates(&input, "data_transacao", &output).unwrap();
        assert_eq!(report.original, 3);
        assert_eq!(report.valid, 2);
        assert_eq!(report.removed, 1);
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("1,2024-03-10 12:00:00,10.5"));
        assert!(content.contains("3,2024-03-11 08:15:00,30"));
        assert!(!content.contains("not a date"));
    }

    #[test]
    fn test_repair_csv_dates_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("t.csv");
        std::fs::write(&input, "a,b\n1,2\n").unwrap();
        let err = repair_csv_dates(&input, "data_transacao", &dir.path().join("o.csv"));
        assert!(matches!(err, Err(BanvicError::Schema { .. })));
    }
}
