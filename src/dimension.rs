use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::calendar::{CalendarAttrs, Locale};

/// One calendar day of the date dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRow {
    pub attrs: CalendarAttrs,
    pub weekday_name: &'static str,
    pub month_name: &'static str,
    pub parity_label: &'static str,
}

impl DateRow {
    fn new(date: NaiveDate, locale: Locale) -> Self {
        let attrs = CalendarAttrs::from_date(date);
        Self {
            weekday_name: locale.weekday_name(attrs.weekday),
            month_name: locale.month_name(attrs.month),
            parity_label: attrs.parity.label(locale),
            attrs,
        }
    }

    /// `YYYY-MM`
    pub fn year_month(&self) -> String {
        format!("{:04}-{:02}", self.attrs.year, self.attrs.month)
    }

    pub fn is_business_day(&self) -> bool {
        !self.attrs.is_weekend
    }
}

/// One row per day from `min` to `max`, both inclusive.
pub fn build_date_dimension(min: NaiveDate, max: NaiveDate, locale: Locale) -> Vec<DateRow> {
    if max < min {
        return Vec::new();
    }
    let rows: Vec<DateRow> = min
        .iter_days()
        .take_while(|d| *d <= max)
        .map(|d| DateRow::new(d, locale))
        .collect();
    info!(
        rows = rows.len(),
        from = %min,
        to = %max,
        "date dimension built"
    );
    rows
}

/// Date dimension spanning the valid timestamps; empty without any.
pub fn dimension_for(timestamps: &[Option<NaiveDateTime>], locale: Locale) -> Vec<DateRow> {
    let days = timestamps.iter().flatten().map(|ts| ts.date());
    let (Some(min), Some(max)) = (days.clone().min(), days.max()) else {
        return Vec::new();
    };
    build_date_dimension(min, max, locale)
}

/// Days between two dates, both included.
pub fn span_days(min: NaiveDate, max: NaiveDate) -> i64 {
    (max - min).num_days() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_contiguous_without_gaps_or_duplicates() {
        let (min, max) = (d(2023, 12, 20), d(2024, 3, 5));
        let rows = build_date_dimension(min, max, Locale::PtBr);
        assert_eq!(rows.len() as i64, span_days(min, max));
        assert_eq!(rows.first().unwrap().attrs.date, min);
        assert_eq!(rows.last().unwrap().attrs.date, max);
        for pair in rows.windows(2) {
            assert_eq!(pair[0].attrs.date.succ_opt(), Some(pair[1].attrs.date));
        }
        let unique: HashSet<NaiveDate> = rows.iter().map(|r| r.attrs.date).collect();
        assert_eq!(unique.len(), rows.len());
    }

    #[test]
    fn test_leap_day_included() {
        let rows = build_date_dimension(d(2024, 2, 27), d(2024, 3, 1), Locale::En);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2].attrs.date, d(2024, 2, 29));
    }

    #[test]
    fn test_single_day_and_reversed_range() {
        assert_eq!(build_date_dimension(d(2024, 1, 1), d(2024, 1, 1), Locale::PtBr).len(), 1);
        assert!(build_date_dimension(d(2024, 1, 2), d(2024, 1, 1), Locale::PtBr).is_empty());
    }

    #[test]
    fn test_localized_fields() {
        // 2024-02-03 was a Saturday
        let rows = build_date_dimension(d(2024, 2, 3), d(2024, 2, 3), Locale::PtBr);
        let r = &rows[0];
        assert_eq!(r.weekday_name, "Sábado");
        assert_eq!(r.month_name, "Fevereiro");
        assert_eq!(r.parity_label, "Par");
        assert_eq!(r.year_month(), "2024-02");
        assert!(!r.is_business_day());

        let rows = build_date_dimension(d(2024, 2, 5), d(2024, 2, 5), Locale::En);
        assert_eq!(rows[0].weekday_name, "Monday");
        assert_eq!(rows[0].parity_label, "Even");
        assert!(rows[0].is_business_day());
    }

    #[test]
    fn test_dimension_for_timestamps() {
        let ts = |y, m, day| d(y, m, day).and_hms_opt(8, 0, 0);
        let rows = dimension_for(&[ts(2024, 1, 10), None, ts(2024, 1, 1)], Locale::PtBr);
        assert_eq!(rows.len(), 10);
        assert!(dimension_for(&[None, None], Locale::PtBr).is_empty());
        assert!(dimension_for(&[], Locale::PtBr).is_empty());
    }
}
