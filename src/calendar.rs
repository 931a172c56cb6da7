use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Language for weekday, month and parity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Locale {
    #[default]
    PtBr,
    En,
}

const WEEKDAYS_EN: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const WEEKDAYS_PT: [&str; 7] = [
    "Segunda-feira",
    "Terça-feira",
    "Quarta-feira",
    "Quinta-feira",
    "Sexta-feira",
    "Sábado",
    "Domingo",
];

const MONTHS_EN: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTHS_PT: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

impl Locale {
    pub fn weekday_name(&self, weekday: Weekday) -> &'static str {
        let idx = weekday.num_days_from_monday() as usize;
        match self {
            Self::PtBr => WEEKDAYS_PT[idx],
            Self::En => WEEKDAYS_EN[idx],
        }
    }

    /// `month` is 1-based; out-of-range values yield an empty name.
    pub fn month_name(&self, month: u32) -> &'static str {
        let table = match self {
            Self::PtBr => &MONTHS_PT,
            Self::En => &MONTHS_EN,
        };
        month
            .checked_sub(1)
            .and_then(|i| table.get(i as usize))
            .copied()
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MonthParity {
    Even,
    Odd,
}

impl MonthParity {
    pub fn of(month: u32) -> Self {
        if month % 2 == 0 {
            Self::Even
        } else {
            Self::Odd
        }
    }

    pub fn label(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::Even, Locale::PtBr) => "Par",
            (Self::Odd, Locale::PtBr) => "Ímpar",
            (Self::Even, Locale::En) => "Even",
            (Self::Odd, Locale::En) => "Odd",
        }
    }
}

/// Calendar attributes derived from a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarAttrs {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub weekday: Weekday,
    pub quarter: u32,
    pub iso_week: u32,
    pub day_of_year: u32,
    pub semester: u32,
    pub is_weekend: bool,
    pub parity: MonthParity,
}

impl CalendarAttrs {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month();
        let quarter = (month - 1) / 3 + 1;
        let weekday = date.weekday();
        Self {
            date,
            year: date.year(),
            month,
            day: date.day(),
            weekday,
            quarter,
            iso_week: date.iso_week().week(),
            day_of_year: date.ordinal(),
            semester: (quarter + 1) / 2,
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            parity: MonthParity::of(month),
        }
    }

    /// 1 = Monday .. 7 = Sunday.
    pub fn weekday_number(&self) -> u32 {
        self.weekday.number_from_monday()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrs_for_known_day() {
        // 2024-03-10 was a Sunday
        let a = CalendarAttrs::from_date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!((a.year, a.month, a.day), (2024, 3, 10));
        assert_eq!(a.weekday, Weekday::Sun);
        assert_eq!(a.weekday_number(), 7);
        assert!(a.is_weekend);
        assert_eq!(a.quarter, 1);
        assert_eq!(a.semester, 1);
        assert_eq!(a.day_of_year, 70);
        assert_eq!(a.iso_week, 10);
        assert_eq!(a.parity, MonthParity::Odd);
    }

    #[test]
    fn test_quarter_and_semester_boundaries() {
        let q = |m| CalendarAttrs::from_date(NaiveDate::from_ymd_opt(2023, m, 1).unwrap());
        assert_eq!((q(3).quarter, q(3).semester), (1, 1));
        assert_eq!((q(4).quarter, q(4).semester), (2, 1));
        assert_eq!((q(7).quarter, q(7).semester), (3, 2));
        assert_eq!((q(12).quarter, q(12).semester), (4, 2));
    }

    #[test]
    fn test_locale_names() {
        assert_eq!(Locale::PtBr.weekday_name(Weekday::Tue), "Terça-feira");
        assert_eq!(Locale::En.weekday_name(Weekday::Sat), "Saturday");
        assert_eq!(Locale::PtBr.month_name(3), "Março");
        assert_eq!(Locale::En.month_name(12), "December");
        assert_eq!(Locale::En.month_name(0), "");
        assert_eq!(Locale::En.month_name(13), "");
    }

    #[test]
    fn test_parity_labels() {
        assert_eq!(MonthParity::of(2), MonthParity::Even);
        assert_eq!(MonthParity::of(1).label(Locale::PtBr), "Ímpar");
        assert_eq!(MonthParity::of(2).label(Locale::PtBr), "Par");
        assert_eq!(MonthParity::of(11).label(Locale::En), "Odd");
    }
}
