use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Months, NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::calendar::MonthParity;
use crate::error::{BanvicError, Result};
use crate::join::FactRow;

pub const SEGMENT_LABELS: &[&str] = &["Bronze", "Prata", "Ouro", "Diamante"];
pub const BRANCH_CLASS_LABELS: &[&str] = &["Pequeno Porte", "Médio Porte", "Grande Porte"];

/// Upper bounds of the fixed value categories; the first bin includes 0.
const VALUE_BINS: &[(f64, &str)] = &[
    (100.0, "Até R$ 100"),
    (500.0, "R$ 101-500"),
    (1000.0, "R$ 501-1000"),
    (5000.0, "R$ 1001-5000"),
    (f64::INFINITY, "Acima de R$ 5000"),
];

/// Month-parity mean differences above this percentage count as significant.
const PARITY_SIGNIFICANCE_PCT: f64 = 10.0;

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Running count/sum/approved tally for one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub count: usize,
    pub sum: f64,
    pub approved: usize,
}

impl Aggregate {
    fn push(&mut self, row: &FactRow) {
        self.count += 1;
        self.sum += row.transaction.amount;
        if row.transaction.status.is_approved() {
            self.approved += 1;
        }
    }

    pub fn of(rows: &[FactRow]) -> Self {
        let mut agg = Self::default();
        for row in rows {
            agg.push(row);
        }
        agg
    }

    pub fn volume(&self) -> f64 {
        round2(self.sum)
    }

    /// Ticket size: mean amount, rounded to cents.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            round2(self.sum / self.count as f64)
        }
    }

    /// Share of approved transactions, as a percentage with one decimal.
    pub fn approval_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            round1(self.approved as f64 / self.count as f64 * 100.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary<K> {
    pub key: K,
    pub stats: Aggregate,
}

/// Group rows by `key` in ascending key order. Rows whose key is `None` are left out.
pub fn group_by<K: Ord>(
    rows: &[FactRow],
    key: impl Fn(&FactRow) -> Option<K>,
) -> Vec<GroupSummary<K>> {
    let mut groups: BTreeMap<K, Aggregate> = BTreeMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            groups.entry(k).or_default().push(row);
        }
    }
    groups
        .into_iter()
        .map(|(key, stats)| GroupSummary { key, stats })
        .collect()
}

/// Groups keyed by weekday number, 1 = Monday .. 7 = Sunday.
pub fn by_weekday(rows: &[FactRow]) -> Vec<GroupSummary<u32>> {
    group_by(rows, |r| r.calendar().map(|c| c.weekday_number()))
}

pub fn by_month_parity(rows: &[FactRow]) -> Vec<GroupSummary<MonthParity>> {
    group_by(rows, |r| r.calendar().map(|c| c.parity))
}

pub fn approved_only(rows: &[FactRow]) -> Vec<FactRow> {
    rows.iter()
        .filter(|r| r.transaction.status.is_approved())
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Quantile with linear interpolation between closest ranks.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(quantile_sorted(&sorted(values), 0.5))
}

/// Sample standard deviation; `None` below two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Edges at quantiles `0, 1/q, .., 1`.
pub fn quantile_edges(values: &[f64], q: usize) -> Vec<f64> {
    if values.is_empty() || q == 0 {
        return Vec::new();
    }
    let s = sorted(values);
    (0..=q)
        .map(|i| quantile_sorted(&s, i as f64 / q as f64))
        .collect()
}

/// Equal-frequency binning: one label per value, `labels.len()` buckets in
/// ascending order. The first bucket includes its lowest edge, the others are
/// open on the left. Duplicate edges are an error.
pub fn qcut(values: &[f64], labels: &[&'static str]) -> Result<Vec<&'static str>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    let edges = quantile_edges(values, labels.len());
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(BanvicError::Binning(format!(
            "bin edges must be unique: {edges:?}"
        )));
    }
    Ok(values
        .iter()
        .map(|v| {
            let idx = edges[1..]
                .iter()
                .position(|upper| *v <= *upper)
                .unwrap_or(labels.len() - 1);
            labels[idx]
        })
        .collect())
}

/// Fixed value category of a single amount; negative amounts have none.
pub fn value_category(amount: f64) -> Option<&'static str> {
    if amount.is_nan() || amount < 0.0 {
        return None;
    }
    VALUE_BINS
        .iter()
        .find(|(upper, _)| amount <= *upper)
        .map(|(_, label)| *label)
}

// ---------------------------------------------------------------------------
// Trailing window and branch ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// `[max timestamp - months, max timestamp]`, or `None` without valid dates.
pub fn trailing_window(rows: &[FactRow], months: u32) -> Option<Window> {
    let end = rows.iter().filter_map(|r| r.transaction.timestamp).max()?;
    let start = end.checked_sub_months(Months::new(months))?;
    Some(Window { start, end })
}

pub fn rows_in_window(rows: &[FactRow], window: &Window) -> Vec<FactRow> {
    rows.iter()
        .filter(|r| {
            r.transaction
                .timestamp
                .is_some_and(|ts| ts >= window.start && ts <= window.end)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchRanking {
    pub rank: usize,
    pub code: String,
    pub name: Option<String>,
    pub stats: Aggregate,
}

/// Rank branches by transaction count (then volume, then code) over the
/// trailing `months` window.
pub fn rank_branches_recent(rows: &[FactRow], months: u32) -> (Option<Window>, Vec<BranchRanking>) {
    let Some(window) = trailing_window(rows, months) else {
        return (None, Vec::new());
    };
    let recent = rows_in_window(rows, &window);
    let names = branch_names(&recent);
    let mut ranking: Vec<BranchRanking> = group_by(&recent, |r| r.branch_code.clone())
        .into_iter()
        .map(|g| BranchRanking {
            rank: 0,
            name: names.get(&g.key).cloned(),
            code: g.key,
            stats: g.stats,
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.stats
            .count
            .cmp(&a.stats.count)
            .then(b.stats.sum.total_cmp(&a.stats.sum))
            .then_with(|| a.code.cmp(&b.code))
    });
    for (i, r) in ranking.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    (Some(window), ranking)
}

fn branch_names(rows: &[FactRow]) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    for row in rows {
        if let (Some(code), Some(name)) = (&row.branch_code, row.branch_name()) {
            names.entry(code.clone()).or_insert_with(|| name.to_string());
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Period analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSummary {
    pub year: i32,
    pub month: u32,
    pub stats: Aggregate,
    pub active_customers: usize,
    pub active_branches: usize,
}

pub fn by_period(rows: &[FactRow]) -> Vec<PeriodSummary> {
    let mut periods: BTreeMap<(i32, u32), (Aggregate, BTreeSet<String>, BTreeSet<String>)> =
        BTreeMap::new();
    for row in rows {
        let Some(cal) = row.calendar() else { continue };
        let entry = periods.entry((cal.year, cal.month)).or_default();
        entry.0.push(row);
        if let Some(c) = &row.customer_id {
            entry.1.insert(c.clone());
        }
        if let Some(b) = &row.branch_code {
            entry.2.insert(b.clone());
        }
    }
    periods
        .into_iter()
        .map(|((year, month), (stats, customers, branches))| PeriodSummary {
            year,
            month,
            stats,
            active_customers: customers.len(),
            active_branches: branches.len(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Branch metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BranchMetrics {
    pub code: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub stats: Aggregate,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    /// Volume tertile; `None` when the tertiles cannot be separated.
    pub class: Option<&'static str>,
}

pub fn branch_metrics(rows: &[FactRow]) -> Vec<BranchMetrics> {
    let mut amounts: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut cities: BTreeMap<String, String> = BTreeMap::new();
    for row in rows {
        let Some(code) = &row.branch_code else { continue };
        amounts
            .entry(code.clone())
            .or_default()
            .push(row.transaction.amount);
        if let Some(city) = row.branch.as_ref().and_then(|b| b.city.clone()) {
            cities.entry(code.clone()).or_insert(city);
        }
    }
    let names = branch_names(rows);

    let mut metrics: Vec<BranchMetrics> = group_by(rows, |r| r.branch_code.clone())
        .into_iter()
        .map(|g| {
            let values = amounts.get(&g.key).map(Vec::as_slice).unwrap_or(&[]);
            BranchMetrics {
                name: names.get(&g.key).cloned(),
                city: cities.get(&g.key).cloned(),
                median: median(values).map(round2),
                std_dev: std_dev(values).map(round2),
                code: g.key,
                stats: g.stats,
                class: None,
            }
        })
        .collect();

    let volumes: Vec<f64> = metrics.iter().map(|m| m.stats.volume()).collect();
    match qcut(&volumes, BRANCH_CLASS_LABELS) {
        Ok(labels) => {
            for (m, label) in metrics.iter_mut().zip(labels) {
                m.class = Some(label);
            }
        }
        Err(e) => warn!(error = %e, "branch classification skipped"),
    }
    metrics
}

// ---------------------------------------------------------------------------
// Customer metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub id: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub stats: Aggregate,
    pub branches_used: usize,
    /// Volume quartile; `None` when the quartiles cannot be separated.
    pub segment: Option<&'static str>,
}

pub fn customer_metrics(rows: &[FactRow]) -> Vec<CustomerMetrics> {
    let mut branches: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    let mut details: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for row in rows {
        let Some(id) = &row.customer_id else { continue };
        let used = branches.entry(id.clone()).or_default();
        if let Some(b) = &row.branch_code {
            used.insert(b.clone());
        }
        details.entry(id.clone()).or_insert_with(|| {
            (
                row.customer_name(),
                row.customer.as_ref().and_then(|c| c.city.clone()),
            )
        });
    }

    let mut metrics: Vec<CustomerMetrics> = group_by(rows, |r| r.customer_id.clone())
        .into_iter()
        .map(|g| {
            let (name, city) = details.get(&g.key).cloned().unwrap_or_default();
            CustomerMetrics {
                branches_used: branches.get(&g.key).map_or(0, HashSet::len),
                id: g.key,
                name,
                city,
                stats: g.stats,
                segment: None,
            }
        })
        .collect();

    let volumes: Vec<f64> = metrics.iter().map(|m| m.stats.volume()).collect();
    match qcut(&volumes, SEGMENT_LABELS) {
        Ok(labels) => {
            for (m, label) in metrics.iter_mut().zip(labels) {
                m.segment = Some(label);
            }
        }
        Err(e) => warn!(error = %e, "customer segmentation skipped"),
    }
    metrics
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: &'static str,
    pub customers: usize,
    pub transactions: usize,
    pub volume: f64,
    pub mean_volume: f64,
    pub mean_ticket: f64,
}

/// Roll customer metrics up per segment, in label order.
pub fn segment_summary(customers: &[CustomerMetrics]) -> Vec<SegmentSummary> {
    SEGMENT_LABELS
        .iter()
        .filter_map(|label| {
            let members: Vec<&CustomerMetrics> = customers
                .iter()
                .filter(|c| c.segment == Some(*label))
                .collect();
            if members.is_empty() {
                return None;
            }
            let n = members.len() as f64;
            let volume: f64 = members.iter().map(|c| c.stats.sum).sum();
            let tickets: f64 = members.iter().map(|c| c.stats.mean()).sum();
            Some(SegmentSummary {
                segment: label,
                customers: members.len(),
                transactions: members.iter().map(|c| c.stats.count).sum(),
                volume: round2(volume),
                mean_volume: round2(volume / n),
                mean_ticket: round2(tickets / n),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// KPIs and the month-parity hypothesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub stats: Aggregate,
    pub customers: usize,
    pub branches: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
}

pub fn kpis(rows: &[FactRow]) -> Kpis {
    let customers: HashSet<&str> = rows.iter().filter_map(|r| r.customer_id.as_deref()).collect();
    let branches: HashSet<&str> = rows.iter().filter_map(|r| r.branch_code.as_deref()).collect();
    let days = rows.iter().filter_map(|r| r.transaction.timestamp.map(|t| t.date()));
    Kpis {
        stats: Aggregate::of(rows),
        customers: customers.len(),
        branches: branches.len(),
        first_day: days.clone().min(),
        last_day: days.max(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParityComparison {
    pub even_mean: f64,
    pub odd_mean: f64,
    /// `(even - odd) / odd` in percent; `None` when the odd mean is zero.
    pub difference_pct: Option<f64>,
    pub significant: bool,
}

pub fn compare_parity(rows: &[FactRow]) -> ParityComparison {
    let groups = by_month_parity(rows);
    let mean_of = |p: MonthParity| {
        groups
            .iter()
            .find(|g| g.key == p)
            .map_or(0.0, |g| g.stats.mean())
    };
    let even_mean = mean_of(MonthParity::Even);
    let odd_mean = mean_of(MonthParity::Odd);
    let difference_pct = if odd_mean != 0.0 {
        Some(round1((even_mean - odd_mean) / odd_mean * 100.0))
    } else {
        None
    };
    ParityComparison {
        even_mean,
        odd_mean,
        significant: difference_pct.is_some_and(|d| d.abs() > PARITY_SIGNIFICANCE_PCT),
        difference_pct,
    }
}
