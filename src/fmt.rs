fn group_thousands(int_part: &str, sep: char) -> String {
    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(sep);
        }
        grouped.push(c);
    }
    grouped.chars().rev().collect()
}

/// Format a float as a real amount with Brazilian separators: R$ 1.234,56
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let grouped = group_thousands(int_part, '.');

    if negative {
        format!("-R$ {grouped},{dec_part}")
    } else {
        format!("R$ {grouped},{dec_part}")
    }
}

/// Integer count with `.` thousands separators: 12.345
pub fn count(n: usize) -> String {
    group_thousands(&n.to_string(), '.')
}

/// Percentage with one decimal and a comma: 87,5%
pub fn percent(val: f64) -> String {
    format!("{:.1}%", val).replace('.', ",")
}

/// Plain decimal for machine-readable output: two places, `.` separator.
pub fn decimal(val: f64) -> String {
    format!("{:.2}", val)
}

pub fn opt_decimal(val: Option<f64>) -> String {
    val.map(decimal).unwrap_or_default()
}
