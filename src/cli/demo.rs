use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{BanvicError, Result};
use crate::export::{write_atomic, CsvSink, Sink, Table};
use crate::pipeline::PipelineConfig;
use crate::settings::load_settings;

const TRANSACTION_COUNT: usize = 720;

/// Every `n`-th transaction gets a date nobody can parse.
const BAD_DATE_EVERY: usize = 97;

struct DemoBranch {
    code: &'static str,
    name: &'static str,
    address: &'static str,
    city: &'static str,
    uf: &'static str,
    kind: &'static str,
}

const BRANCHES: &[DemoBranch] = &[
    DemoBranch {
        code: "1",
        name: "Agência Matriz",
        address: "Av. Paulista, 1000",
        city: "São Paulo",
        uf: "SP",
        kind: "Física",
    },
    DemoBranch {
        code: "2",
        name: "Agência Tatuapé",
        address: "Rua Tuiuti, 515",
        city: "São Paulo",
        uf: "SP",
        kind: "Física",
    },
    DemoBranch {
        code: "3",
        name: "Agência Campinas",
        address: "Av. Brasil, 77",
        city: "Campinas",
        uf: "SP",
        kind: "Física",
    },
    DemoBranch {
        code: "4",
        name: "Agência Osasco",
        address: "Rua da Estação, 12",
        city: "Osasco",
        uf: "SP",
        kind: "Física",
    },
    DemoBranch {
        code: "5",
        name: "Agência Digital",
        address: "Av. Faria Lima, 2400",
        city: "São Paulo",
        uf: "SP",
        kind: "Digital",
    },
    DemoBranch {
        code: "6",
        name: "Agência Porto Alegre",
        address: "Rua dos Andradas, 901",
        city: "Porto Alegre",
        uf: "RS",
        kind: "Física",
    },
];

const FIRST_NAMES: &[&str] = &[
    "Ana", "Bruno", "Carla", "Diego", "Elisa", "Fábio", "Gabriela", "Heitor", "Isabela", "João",
    "Larissa", "Marcos", "Natália", "Otávio", "Paula", "Rafael",
];

const LAST_NAMES: &[&str] = &[
    "Silva", "Souza", "Oliveira", "Pereira", "Costa", "Rodrigues", "Almeida", "Nascimento", "Lima",
];

const CITIES: &[&str] = &["São Paulo", "Campinas", "Osasco", "Santo André", "Porto Alegre"];

const CUSTOMER_COUNT: usize = 32;

/// Transaction kinds with typical amount ranges (min, max).
const KINDS: &[(&str, f64, f64)] = &[
    ("Pix - Realizado", 5.0, 1500.0),
    ("Pix - Recebido", 5.0, 2500.0),
    ("Compra Débito", 8.0, 600.0),
    ("Saque", 20.0, 1000.0),
    ("Depósito em espécie", 50.0, 4000.0),
    ("TED - Recebido", 500.0, 12000.0),
    ("Pagamento de boleto", 30.0, 3000.0),
];

/// Fixed seed so the sample is identical on every run.
const SEED: u64 = 20_240_115;

fn amount(rng: &mut StdRng, min: f64, max: f64) -> f64 {
    (rng.gen_range(min..max) * 100.0).round() / 100.0
}

fn s(v: impl ToString) -> String {
    v.to_string()
}

fn branches_table() -> Table {
    let mut t = Table::new(
        "agencias",
        &["cod_agencia", "nome", "endereco", "cidade", "uf", "tipo_agencia"],
    );
    for b in BRANCHES {
        t.push(vec![s(b.code), s(b.name), s(b.address), s(b.city), s(b.uf), s(b.kind)]);
    }
    t
}

fn customers_table() -> Table {
    let mut t = Table::new(
        "clientes",
        &["cod_cliente", "primeiro_nome", "ultimo_nome", "endereco", "cidade", "tipo_cliente"],
    );
    for i in 0..CUSTOMER_COUNT {
        t.push(vec![
            s(i + 1),
            s(FIRST_NAMES[i % FIRST_NAMES.len()]),
            s(LAST_NAMES[(i * 7) % LAST_NAMES.len()]),
            format!("Rua {}, {}", LAST_NAMES[i % LAST_NAMES.len()], 10 + i * 3),
            s(CITIES[i % CITIES.len()]),
            s(if i % 5 == 4 { "PJ" } else { "PF" }),
        ]);
    }
    t
}

/// One account per customer, plus a second one for every fourth customer.
fn accounts() -> Vec<(String, usize, &'static str)> {
    let mut out = Vec::new();
    for i in 0..CUSTOMER_COUNT {
        let branch = BRANCHES[(i * 5 + i / 7) % BRANCHES.len()].code;
        out.push((format!("{}", 10_000 + i), i + 1, branch));
        if i % 4 == 3 {
            let other = BRANCHES[(i + 2) % BRANCHES.len()].code;
            out.push((format!("{}", 20_000 + i), i + 1, other));
        }
    }
    out
}

fn accounts_table(accounts: &[(String, usize, &str)]) -> Table {
    let mut t = Table::new("contas", &["num_conta", "cod_cliente", "cod_agencia"]);
    for (number, customer, branch) in accounts {
        t.push(vec![number.clone(), s(customer), s(branch)]);
    }
    t
}

fn transactions_table(accounts: &[(String, usize, &str)]) -> Result<Table> {
    let mut t = Table::new(
        "transacoes",
        &[
            "cod_transacao",
            "num_conta",
            "data_transacao",
            "nome_transacao",
            "valor_transacao",
            "status",
        ],
    );
    let start = NaiveDate::from_ymd_opt(2023, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| BanvicError::Other("invalid demo start date".to_string()))?;
    let mut rng = StdRng::seed_from_u64(SEED);

    for i in 0..TRANSACTION_COUNT {
        // ~two years of activity, in chronological order
        let offset = Duration::minutes((i as i64) * 1_460 + rng.gen_range(0..1_400));
        let ts = start + offset;
        let date = if i % BAD_DATE_EVERY == BAD_DATE_EVERY - 1 {
            "data indisponível".to_string()
        } else if i % 5 == 0 {
            format!("{}.{:06} UTC", ts.format("%Y-%m-%d %H:%M:%S"), rng.gen_range(0..1_000_000))
        } else {
            format!("{} UTC", ts.format("%Y-%m-%d %H:%M:%S"))
        };

        let (kind, min, max) = KINDS[rng.gen_range(0..KINDS.len())];
        let account = &accounts[rng.gen_range(0..accounts.len())].0;
        let status = if i % 23 == 11 {
            "Cancelada"
        } else if i % 9 == 4 {
            "Negada"
        } else {
            "Aprovada"
        };
        t.push(vec![
            s(i + 1),
            account.clone(),
            date,
            s(kind),
            format!("{:.2}", amount(&mut rng, min, max)),
            s(status),
        ]);
    }
    Ok(t)
}

fn write_table(dir: &Path, table: &Table) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", table.name));
    write_atomic(&path, &CsvSink.render(table)?)?;
    Ok(path)
}

/// Write the sample extracts into `dir`. Returns the written paths.
pub fn write_demo(dir: &Path) -> Result<Vec<PathBuf>> {
    let accounts = accounts();
    let tables = [
        branches_table(),
        customers_table(),
        accounts_table(&accounts),
        transactions_table(&accounts)?,
    ];
    tables.iter().map(|t| write_table(dir, t)).collect()
}

pub fn run(data_dir: Option<String>) -> Result<()> {
    let config = PipelineConfig::from_settings(&load_settings()).with_data_dir(data_dir);
    let written = write_demo(&config.data_dir)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    println!(
        "{} {} transactions, {} customers, {} branches. Try `banvic run`.",
        "Demo data ready:".green().bold(),
        TRANSACTION_COUNT,
        CUSTOMER_COUNT,
        BRANCHES.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_dataset;

    #[test]
    fn test_demo_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_demo(a.path()).unwrap();
        write_demo(b.path()).unwrap();
        for name in ["agencias", "clientes", "contas", "transacoes"] {
            let file = format!("{name}.csv");
            assert_eq!(
                std::fs::read(a.path().join(&file)).unwrap(),
                std::fs::read(b.path().join(&file)).unwrap(),
                "{file}"
            );
        }
    }

    #[test]
    fn test_demo_loads() {
        let dir = tempfile::tempdir().unwrap();
        write_demo(dir.path()).unwrap();
        let ds = load_dataset(dir.path()).unwrap();
        assert_eq!(ds.transactions.len(), TRANSACTION_COUNT);
        assert_eq!(ds.customers.len(), CUSTOMER_COUNT);
        assert_eq!(ds.branches.len(), BRANCHES.len());
        assert_eq!(ds.accounts.len(), CUSTOMER_COUNT + CUSTOMER_COUNT / 4);
        assert_eq!(ds.skipped_rows, 0);
    }
}
