use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{BanvicError, Result};
use crate::models::{Account, Branch, Customer, Status, Transaction};

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

pub struct ColumnSpec {
    pub key: &'static str,
    /// Accepted header names, matched case-insensitively.
    pub aliases: &'static [&'static str],
    pub required: bool,
}

const fn req(key: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec {
        key,
        aliases,
        required: true,
    }
}

const fn opt(key: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec {
        key,
        aliases,
        required: false,
    }
}

pub struct TableSchema {
    pub table: &'static str,
    /// File stems searched in the data directory, in order.
    pub stems: &'static [&'static str],
    pub columns: &'static [ColumnSpec],
}

pub const TRANSACTIONS: TableSchema = TableSchema {
    table: "transacoes",
    stems: &["transacoes", "tb_transacoes"],
    columns: &[
        req("id", &["cod_transacao", "transacao_id", "id_transacao"]),
        req("amount", &["valor_transacao", "valor"]),
        req("date", &["data_transacao", "data"]),
        opt("account", &["num_conta", "conta_id"]),
        opt("status", &["status", "status_transacao"]),
        opt("kind", &["nome_transacao", "tipo_transacao"]),
        opt("customer", &["cod_cliente", "cliente_id"]),
        opt("branch", &["cod_agencia", "agencia_id"]),
    ],
};

pub const ACCOUNTS: TableSchema = TableSchema {
    table: "contas",
    stems: &["contas", "tb_contas"],
    columns: &[
        req("number", &["num_conta", "conta_id"]),
        opt("customer", &["cod_cliente", "cliente_id"]),
        opt("branch", &["cod_agencia", "agencia_id"]),
    ],
};

pub const CUSTOMERS: TableSchema = TableSchema {
    table: "clientes",
    stems: &["clientes", "tb_clientes"],
    columns: &[
        req("id", &["cod_cliente", "cliente_id"]),
        opt("name", &["nome_cliente", "nome"]),
        opt("first_name", &["primeiro_nome"]),
        opt("last_name", &["ultimo_nome"]),
        opt("address", &["endereco", "endereco_cliente"]),
        opt("city", &["cidade_cliente", "cidade"]),
        opt("kind", &["tipo_cliente"]),
    ],
};

pub const BRANCHES: TableSchema = TableSchema {
    table: "agencias",
    stems: &["agencias", "tb_agencias"],
    columns: &[
        req("code", &["cod_agencia", "agencia_id"]),
        opt("name", &["nome", "nome_agencia"]),
        opt("address", &["endereco", "endereco_agencia"]),
        opt("city", &["cidade", "cidade_agencia"]),
        opt("state", &["uf", "estado"]),
        opt("kind", &["tipo_agencia"]),
    ],
};

pub const ALL_SCHEMAS: &[&TableSchema] = &[&TRANSACTIONS, &ACCOUNTS, &CUSTOMERS, &BRANCHES];

const EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an amount in either `1,234.56` or `R$ 1.234,56` notation.
/// Parenthesized values are negative. Returns `None` for anything else.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw
        .replace('"', "")
        .replace("R$", "")
        .replace('$', "")
        .replace(char::is_whitespace, "");
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return parse_amount(inner).map(|v| -v.abs());
    }

    let commas = s.matches(',').count();
    let dots = s.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) | (0, 1) => s,
        (0, _) => s.replace('.', ""),
        (_, 0) => {
            let decimals = s.rsplit(',').next().map_or(0, str::len);
            if commas == 1 && decimals != 3 {
                s.replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        _ => {
            if s.rfind(',') > s.rfind('.') {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
    };
    normalized.parse().ok().filter(|v: &f64| v.is_finite())
}

/// Trim a key and drop the `.0` that float-typed exports append to integer ids.
pub fn normalize_key(raw: &str) -> String {
    let s = raw.trim();
    match s.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.chars().all(|c| c.is_ascii_digit()) => int.to_string(),
        _ => s.to_string(),
    }
}

/// Excel serial day number to `YYYY-MM-DD HH:MM:SS`.
#[cfg(any(feature = "excel", test))]
pub fn excel_serial_to_timestamp(serial: f64) -> Option<String> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    let ts = base.checked_add_signed(chrono::Duration::seconds(seconds))?;
    Some(crate::dates::format_timestamp(&ts))
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Headers of date columns, whose numeric Excel cells are day serials.
#[cfg(any(feature = "excel", test))]
fn is_date_header(raw: &str) -> bool {
    let header = clean_header(raw);
    ALL_SCHEMAS
        .iter()
        .flat_map(|schema| schema.columns.iter())
        .filter(|c| c.key == "date")
        .any(|c| c.aliases.contains(&header.as_str()))
}

/// Find the first file matching one of the schema's stems.
pub fn locate(dir: &Path, schema: &TableSchema) -> Option<PathBuf> {
    for stem in schema.stems {
        for ext in EXTENSIONS {
            let path = dir.join(format!("{stem}.{ext}"));
            if path.is_file() {
                return Some(path);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Raw tables
// ---------------------------------------------------------------------------

/// A file read as text cells, header row separated.
pub struct RawTable {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn read(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let mut rows = match ext.as_str() {
            "csv" | "txt" => read_csv_rows(path)?,
            "xlsx" | "xls" | "xlsm" => read_excel_rows(path)?,
            _ => return Err(BanvicError::UnsupportedFile(path.display().to_string())),
        };
        if rows.is_empty() {
            return Ok(Self {
                source: path.to_path_buf(),
                headers: Vec::new(),
                rows,
            });
        }
        let headers = rows.remove(0);
        Ok(Self {
            source: path.to_path_buf(),
            headers,
            rows,
        })
    }

    pub fn column_index(&self, aliases: &[&str]) -> Option<usize> {
        let cleaned: Vec<String> = self.headers.iter().map(|h| clean_header(h)).collect();
        aliases
            .iter()
            .find_map(|alias| cleaned.iter().position(|h| h == alias))
    }

    /// Resolve a schema against the headers. Fails on a missing required column.
    pub fn columns(&self, schema: &TableSchema) -> Result<ColumnMap> {
        let mut idx = HashMap::new();
        for spec in schema.columns {
            match self.column_index(spec.aliases) {
                Some(i) => {
                    idx.insert(spec.key, i);
                }
                None if spec.required => {
                    return Err(BanvicError::Schema {
                        table: schema.table.to_string(),
                        column: spec.aliases[0].to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(ColumnMap { idx })
    }
}

pub struct ColumnMap {
    idx: HashMap<&'static str, usize>,
}

impl ColumnMap {
    /// Trimmed, non-empty cell value.
    pub fn get<'a>(&self, row: &'a [String], key: &str) -> Option<&'a str> {
        let i = *self.idx.get(key)?;
        let v = row.get(i)?.trim();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    }

    fn owned(&self, row: &[String], key: &str) -> Option<String> {
        self.get(row, key).map(str::to_string)
    }

    fn key(&self, row: &[String], key: &str) -> Option<String> {
        self.get(row, key).map(normalize_key)
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[cfg(feature = "excel")]
fn read_excel_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| BanvicError::Excel(format!("{}: {e}", path.display())))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| BanvicError::Excel(format!("{}: {e}", path.display())))?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut date_columns: Vec<bool> = Vec::new();
    for row in range.rows() {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| cell_text(cell, date_columns.get(i).copied().unwrap_or(false)))
            .collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        if rows.is_empty() {
            date_columns = cells.iter().map(|h| is_date_header(h)).collect();
        }
        rows.push(cells);
    }
    Ok(rows)
}

/// Text of one Excel cell. Numbers in a date column are day serials.
#[cfg(feature = "excel")]
fn cell_text(cell: &calamine::Data, is_date: bool) -> String {
    use calamine::Data;

    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if is_date => {
            excel_serial_to_timestamp(*f).unwrap_or_else(|| f.to_string())
        }
        Data::Int(i) if is_date => {
            excel_serial_to_timestamp(*i as f64).unwrap_or_else(|| i.to_string())
        }
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_timestamp(dt.as_f64()).unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}

#[cfg(not(feature = "excel"))]
fn read_excel_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    Err(BanvicError::UnsupportedFile(format!(
        "{} (built without the `excel` feature)",
        path.display()
    )))
}

// ---------------------------------------------------------------------------
// Typed loaders
// ---------------------------------------------------------------------------

pub struct Loaded<T> {
    pub records: Vec<T>,
    /// Rows dropped for a missing key or an unparseable amount.
    pub skipped: usize,
}

fn load_with<T>(
    path: &Path,
    schema: &TableSchema,
    mut build: impl FnMut(&ColumnMap, &[String]) -> Option<T>,
) -> Result<Loaded<T>> {
    let raw = RawTable::read(path)?;
    let cols = raw.columns(schema)?;
    let mut records = Vec::with_capacity(raw.rows.len());
    let mut skipped = 0usize;
    for row in &raw.rows {
        match build(&cols, row.as_slice()) {
            Some(r) => records.push(r),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(table = schema.table, skipped, "rows skipped while loading");
    }
    info!(
        table = schema.table,
        rows = records.len(),
        file = %path.display(),
        "table loaded"
    );
    Ok(Loaded { records, skipped })
}

pub fn load_transactions(path: &Path) -> Result<Loaded<Transaction>> {
    load_with(path, &TRANSACTIONS, |c, row| {
        Some(Transaction {
            id: c.key(row, "id")?,
            account: c.key(row, "account"),
            amount: parse_amount(c.get(row, "amount")?)?,
            raw_date: c.owned(row, "date").unwrap_or_default(),
            timestamp: None,
            status: c
                .get(row, "status")
                .map(Status::parse)
                .unwrap_or_else(|| Status::Other(String::new())),
            kind: c.owned(row, "kind"),
            customer_id: c.key(row, "customer"),
            branch_code: c.key(row, "branch"),
        })
    })
}

pub fn load_accounts(path: &Path) -> Result<Loaded<Account>> {
    load_with(path, &ACCOUNTS, |c, row| {
        Some(Account {
            number: c.key(row, "number")?,
            customer_id: c.key(row, "customer"),
            branch_code: c.key(row, "branch"),
        })
    })
}

pub fn load_customers(path: &Path) -> Result<Loaded<Customer>> {
    load_with(path, &CUSTOMERS, |c, row| {
        Some(Customer {
            id: c.key(row, "id")?,
            name: c.owned(row, "name"),
            first_name: c.owned(row, "first_name"),
            last_name: c.owned(row, "last_name"),
            address: c.owned(row, "address"),
            city: c.owned(row, "city"),
            kind: c.owned(row, "kind"),
        })
    })
}

pub fn load_branches(path: &Path) -> Result<Loaded<Branch>> {
    load_with(path, &BRANCHES, |c, row| {
        Some(Branch {
            code: c.key(row, "code")?,
            name: c.owned(row, "name"),
            address: c.owned(row, "address"),
            city: c.owned(row, "city"),
            state: c.owned(row, "state"),
            kind: c.owned(row, "kind"),
        })
    })
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

pub struct Dataset {
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
    pub customers: Vec<Customer>,
    pub branches: Vec<Branch>,
    pub skipped_rows: usize,
}

fn require(dir: &Path, schema: &TableSchema) -> Result<PathBuf> {
    locate(dir, schema).ok_or_else(|| BanvicError::MissingInput {
        table: schema.table.to_string(),
        dir: dir.display().to_string(),
    })
}

/// Load every input table from `dir`. Accounts are optional.
pub fn load_dataset(dir: &Path) -> Result<Dataset> {
    let transactions = load_transactions(&require(dir, &TRANSACTIONS)?)?;
    let customers = load_customers(&require(dir, &CUSTOMERS)?)?;
    let branches = load_branches(&require(dir, &BRANCHES)?)?;
    let accounts = match locate(dir, &ACCOUNTS) {
        Some(path) => load_accounts(&path)?,
        None => {
            info!("no accounts file; using keys carried by transactions");
            Loaded {
                records: Vec::new(),
                skipped: 0,
            }
        }
    };

    Ok(Dataset {
        skipped_rows: transactions.skipped
            + customers.skipped
            + branches.skipped
            + accounts.skipped,
        transactions: transactions.records,
        accounts: accounts.records,
        customers: customers.records,
        branches: branches.records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1234.56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("R$ 1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("10,5"), Some(10.5));
        assert_eq!(parse_amount("1,234"), Some(1234.0));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
        assert_eq!(parse_amount("  -42.50  "), Some(-42.5));
        assert_eq!(parse_amount("\"500.00\""), Some(500.0));
    }

    #[test]
    fn test_date_headers() {
        assert!(is_date_header("data_transacao"));
        assert!(is_date_header("\u{feff} Data "));
        assert!(!is_date_header("valor_transacao"));
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_excel_serials_in_date_column_become_timestamps() {
        use calamine::Data;

        assert_eq!(cell_text(&Data::Float(45667.5), true), "2025-01-10 12:00:00");
        assert_eq!(cell_text(&Data::Int(45292), true), "2024-01-01 00:00:00");
        assert_eq!(cell_text(&Data::Float(45667.0), false), "45667");
        assert_eq!(cell_text(&Data::Float(12.5), false), "12.5");
        assert_eq!(cell_text(&Data::String(" 10/03/2024 ".into()), true), "10/03/2024");

        let raw = [cell_text(&Data::Float(45667.5), true)];
        let n = crate::dates::normalize(&raw, "data_transacao");
        assert_eq!(n.parsed, 1);
    }

    #[test]
    fn test_parse_amount_parenthesized_negatives() {
        assert_eq!(parse_amount("(500.00)"), Some(-500.0));
        assert_eq!(parse_amount("(1,234.56)"), Some(-1234.56));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key(" 12 "), "12");
        assert_eq!(normalize_key("12.0"), "12");
        assert_eq!(normalize_key("AG-01.0"), "AG-01.0");
        assert_eq!(normalize_key(".0"), ".0");
    }

    #[test]
    fn test_excel_serial_to_timestamp() {
        assert_eq!(
            excel_serial_to_timestamp(45667.0).as_deref(),
            Some("2025-01-10 00:00:00")
        );
        assert_eq!(
            excel_serial_to_timestamp(45667.5).as_deref(),
            Some("2025-01-10 12:00:00")
        );
    }

    #[test]
    fn test_locate_prefers_plain_stem_and_accepts_tb_prefix() {
        let dir = tempfile::tempdir().unwrap();
        assert!(locate(dir.path(), &CUSTOMERS).is_none());
        write(dir.path(), "tb_clientes.csv", "cliente_id\n1\n");
        assert!(locate(dir.path(), &CUSTOMERS).unwrap().ends_with("tb_clientes.csv"));
        write(dir.path(), "clientes.csv", "cod_cliente\n1\n");
        assert!(locate(dir.path(), &CUSTOMERS).unwrap().ends_with("clientes.csv"));
    }

    #[test]
    fn test_load_transactions_with_bom_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "transacoes.csv",
            "\u{feff}Cod_Transacao,num_conta,data_transacao,nome_transacao,valor_transacao,status\n\
             1,100.0,2024-01-15 10:00:00 UTC,Pix,150.25,Aprovada\n\
             2,101,2024-01-16 10:00:00 UTC,Saque,abc,Negada\n\
             ,102,2024-01-17 10:00:00 UTC,Pix,10,Aprovada\n",
        );
        let loaded = load_transactions(&path).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.skipped, 2);
        let t = &loaded.records[0];
        assert_eq!(t.id, "1");
        assert_eq!(t.account.as_deref(), Some("100"));
        assert_eq!(t.amount, 150.25);
        assert_eq!(t.raw_date, "2024-01-15 10:00:00 UTC");
        assert!(t.timestamp.is_none());
        assert_eq!(t.status, Status::Approved);
        assert_eq!(t.kind.as_deref(), Some("Pix"));
    }

    #[test]
    fn test_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "agencias.csv", "nome,cidade\nCentro,Recife\n");
        let err = load_branches(&path).err().unwrap();
        assert!(matches!(err, BanvicError::Schema { .. }));
        assert!(err.to_string().contains("cod_agencia"), "got: {err}");
    }

    #[test]
    fn test_load_dataset_without_accounts() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "tb_transacoes.csv",
            "transacao_id,cliente_id,agencia_id,data_transacao,valor,status\n\
             1,7,3,2024-02-01,99.9,Aprovada\n",
        );
        write(dir.path(), "tb_clientes.csv", "cliente_id,nome_cliente\n7,Ana\n");
        write(dir.path(), "tb_agencias.csv", "agencia_id,nome_agencia,uf\n3,Centro,PE\n");
        let ds = load_dataset(dir.path()).unwrap();
        assert_eq!(ds.transactions.len(), 1);
        assert!(ds.accounts.is_empty());
        assert_eq!(ds.transactions[0].customer_id.as_deref(), Some("7"));
        assert_eq!(ds.branches[0].state.as_deref(), Some("PE"));
        assert_eq!(ds.customers[0].name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_load_dataset_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "transacoes.csv",
            "cod_transacao,data_transacao,valor_transacao\n1,2024-01-01,1\n",
        );
        let err = load_dataset(dir.path()).err().unwrap();
        match err {
            BanvicError::MissingInput { table, .. } => assert_eq!(table, "clientes"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "transacoes.json", "{}");
        assert!(matches!(
            RawTable::read(&path),
            Err(BanvicError::UnsupportedFile(_))
        ));
    }
}
