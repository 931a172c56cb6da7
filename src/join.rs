use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calendar::CalendarAttrs;
use crate::models::{Account, Branch, Customer, Transaction};

/// What happens to transactions whose date could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidDatePolicy {
    /// Remove them from the fact table.
    #[default]
    Drop,
    /// Keep them with empty calendar fields.
    Keep,
}

/// One row of the fact table: a transaction with its joined reference data.
#[derive(Debug, Clone)]
pub struct FactRow {
    pub transaction: Transaction,
    pub customer_id: Option<String>,
    pub branch_code: Option<String>,
    pub customer: Option<Customer>,
    pub branch: Option<Branch>,
}

impl FactRow {
    pub fn calendar(&self) -> Option<CalendarAttrs> {
        self.transaction
            .timestamp
            .map(|ts| CalendarAttrs::from_date(ts.date()))
    }

    pub fn customer_name(&self) -> Option<String> {
        self.customer.as_ref().and_then(Customer::display_name)
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.branch.as_ref().and_then(|b| b.name.as_deref())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JoinReport {
    pub rows: usize,
    pub unmatched_accounts: usize,
    pub unmatched_customers: usize,
    pub unmatched_branches: usize,
    /// Reference rows ignored because their key was already seen.
    pub duplicate_keys: usize,
}

/// Apply the invalid-date policy. Returns the kept rows and how many were dropped.
pub fn filter_valid_dates(
    transactions: Vec<Transaction>,
    policy: InvalidDatePolicy,
) -> (Vec<Transaction>, usize) {
    match policy {
        InvalidDatePolicy::Keep => (transactions, 0),
        InvalidDatePolicy::Drop => {
            let before = transactions.len();
            let kept: Vec<_> = transactions
                .into_iter()
                .filter(|t| t.timestamp.is_some())
                .collect();
            let dropped = before - kept.len();
            if dropped > 0 {
                warn!(dropped, "transactions without a valid date removed");
            }
            (kept, dropped)
        }
    }
}

/// First occurrence of each key wins; later duplicates are counted.
fn index_by<'a, T>(
    items: &'a [T],
    table: &str,
    key: impl Fn(&'a T) -> &'a str,
) -> (HashMap<&'a str, &'a T>, usize) {
    let mut map = HashMap::with_capacity(items.len());
    let mut duplicates = 0usize;
    for item in items {
        let k = key(item);
        if map.contains_key(k) {
            duplicates += 1;
        } else {
            map.insert(k, item);
        }
    }
    if duplicates > 0 {
        warn!(table, duplicates, "duplicate keys ignored");
    }
    (map, duplicates)
}

/// Left-join transactions to accounts, customers and branches.
///
/// Every input transaction yields exactly one fact row. Keys found through
/// the account take precedence over keys carried on the transaction itself.
pub fn build_fact_table(
    transactions: Vec<Transaction>,
    accounts: &[Account],
    customers: &[Customer],
    branches: &[Branch],
) -> (Vec<FactRow>, JoinReport) {
    let (account_idx, dup_a) = index_by(accounts, "contas", |a| a.number.as_str());
    let (customer_idx, dup_c) = index_by(customers, "clientes", |c| c.id.as_str());
    let (branch_idx, dup_b) = index_by(branches, "agencias", |b| b.code.as_str());

    let mut report = JoinReport {
        duplicate_keys: dup_a + dup_c + dup_b,
        ..Default::default()
    };

    let rows: Vec<FactRow> = transactions
        .into_iter()
        .map(|t| {
            let account = t.account.as_deref().and_then(|n| account_idx.get(n));
            if t.account.is_some() && account.is_none() {
                report.unmatched_accounts += 1;
            }
            let customer_id = account
                .and_then(|a| a.customer_id.clone())
                .or_else(|| t.customer_id.clone());
            let branch_code = account
                .and_then(|a| a.branch_code.clone())
                .or_else(|| t.branch_code.clone());

            let customer = customer_id
                .as_deref()
                .and_then(|id| customer_idx.get(id))
                .map(|c| (*c).clone());
            if customer.is_none() {
                report.unmatched_customers += 1;
            }
            let branch = branch_code
                .as_deref()
                .and_then(|code| branch_idx.get(code))
                .map(|b| (*b).clone());
            if branch.is_none() {
                report.unmatched_branches += 1;
            }

            FactRow {
                transaction: t,
                customer_id,
                branch_code,
                customer,
                branch,
            }
        })
        .collect();

    report.rows = rows.len();
    info!(
        rows = report.rows,
        unmatched_customers = report.unmatched_customers,
        unmatched_branches = report.unmatched_branches,
        "fact table joined"
    );
    (rows, report)
}
