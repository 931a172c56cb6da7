//! Conversion of analysis results into the output tables.

use crate::calendar::Locale;
use crate::dates::format_timestamp;
use crate::export::Table;
use crate::fmt::{decimal, opt_decimal};
use crate::metrics::{value_category, Aggregate};
use crate::pipeline::Analysis;

pub const FACTS: &str = "fato_transacoes";
pub const DIM_DATES: &str = "dim_datas";
pub const DIM_CUSTOMERS: &str = "dim_clientes";
pub const DIM_BRANCHES: &str = "dim_agencias";
pub const BY_WEEKDAY: &str = "resumo_dias_semana";
pub const BY_PARITY: &str = "resumo_meses_tipo";
pub const RECENT_BRANCHES: &str = "resumo_agencias_6m";
pub const BY_PERIOD: &str = "analise_periodo";
pub const BRANCH_METRICS: &str = "metricas_agencia";
pub const CUSTOMER_METRICS: &str = "metricas_cliente";

pub const TABLE_NAMES: &[&str] = &[
    FACTS,
    DIM_DATES,
    DIM_CUSTOMERS,
    DIM_BRANCHES,
    BY_WEEKDAY,
    BY_PARITY,
    RECENT_BRANCHES,
    BY_PERIOD,
    BRANCH_METRICS,
    CUSTOMER_METRICS,
];

const STAT_HEADERS: &[&str] = &[
    "qtd_transacoes",
    "volume_total",
    "ticket_medio",
    "qtd_aprovadas",
    "taxa_aprovacao",
];

fn headers(leading: &[&'static str], trailing: &[&'static str]) -> Vec<&'static str> {
    leading
        .iter()
        .chain(STAT_HEADERS)
        .chain(trailing)
        .copied()
        .collect()
}

fn stat_cells(stats: &Aggregate) -> Vec<String> {
    vec![
        stats.count.to_string(),
        decimal(stats.volume()),
        decimal(stats.mean()),
        stats.approved.to_string(),
        format!("{:.1}", stats.approval_rate()),
    ]
}

fn opt(v: Option<&str>) -> String {
    v.unwrap_or_default().to_string()
}

fn flag(b: bool) -> String {
    b.to_string()
}

/// Every output table in [`TABLE_NAMES`] order.
pub fn build_all(a: &Analysis) -> Vec<Table> {
    vec![
        facts(a),
        dim_dates(a),
        dim_customers(a),
        dim_branches(a),
        by_weekday(a),
        by_parity(a),
        recent_branches(a),
        by_period(a),
        branch_metrics(a),
        customer_metrics(a),
    ]
}

pub fn facts(a: &Analysis) -> Table {
    let locale = a.locale;
    let mut t = Table::new(
        FACTS,
        &[
            "cod_transacao",
            "num_conta",
            "data_transacao",
            "nome_transacao",
            "valor_transacao",
            "status",
            "aprovada",
            "categoria_valor",
            "cod_cliente",
            "nome_cliente",
            "endereco_cliente",
            "cidade_cliente",
            "tipo_cliente",
            "cod_agencia",
            "nome_agencia",
            "endereco_agencia",
            "cidade_agencia",
            "uf_agencia",
            "tipo_agencia",
            "ano",
            "mes",
            "dia",
            "dia_semana_num",
            "dia_semana",
            "nome_mes",
            "trimestre",
            "semana_ano",
            "tipo_mes",
            "fim_de_semana",
        ],
    );
    for row in &a.facts {
        let tx = &row.transaction;
        let customer = row.customer.as_ref();
        let branch = row.branch.as_ref();
        let mut cells = vec![
            tx.id.clone(),
            opt(tx.account.as_deref()),
            tx.timestamp.as_ref().map(format_timestamp).unwrap_or_default(),
            opt(tx.kind.as_deref()),
            decimal(tx.amount),
            tx.status.label().to_string(),
            flag(tx.status.is_approved()),
            opt(value_category(tx.amount)),
            opt(row.customer_id.as_deref()),
            row.customer_name().unwrap_or_default(),
            opt(customer.and_then(|c| c.address.as_deref())),
            opt(customer.and_then(|c| c.city.as_deref())),
            opt(customer.and_then(|c| c.kind.as_deref())),
            opt(row.branch_code.as_deref()),
            opt(row.branch_name()),
            opt(branch.and_then(|b| b.address.as_deref())),
            opt(branch.and_then(|b| b.city.as_deref())),
            opt(branch.and_then(|b| b.state.as_deref())),
            opt(branch.and_then(|b| b.kind.as_deref())),
        ];
        match row.calendar() {
            Some(c) => cells.extend([
                c.year.to_string(),
                c.month.to_string(),
                c.day.to_string(),
                c.weekday_number().to_string(),
                locale.weekday_name(c.weekday).to_string(),
                locale.month_name(c.month).to_string(),
                c.quarter.to_string(),
                c.iso_week.to_string(),
                c.parity.label(locale).to_string(),
                flag(c.is_weekend),
            ]),
            None => cells.extend(std::iter::repeat(String::new()).take(10)),
        }
        t.push(cells);
    }
    t
}

pub fn dim_dates(a: &Analysis) -> Table {
    let mut t = Table::new(
        DIM_DATES,
        &[
            "data",
            "ano",
            "mes",
            "dia",
            "dia_semana_num",
            "dia_semana",
            "nome_mes",
            "trimestre",
            "semana_ano",
            "dia_ano",
            "semestre",
            "ano_mes",
            "fim_de_semana",
            "dia_util",
            "mes_par",
            "tipo_mes",
        ],
    );
    for d in &a.dates {
        let c = &d.attrs;
        t.push(vec![
            c.date.format("%Y-%m-%d").to_string(),
            c.year.to_string(),
            c.month.to_string(),
            c.day.to_string(),
            c.weekday_number().to_string(),
            d.weekday_name.to_string(),
            d.month_name.to_string(),
            c.quarter.to_string(),
            c.iso_week.to_string(),
            c.day_of_year.to_string(),
            c.semester.to_string(),
            d.year_month(),
            flag(c.is_weekend),
            flag(d.is_business_day()),
            flag(c.month % 2 == 0),
            d.parity_label.to_string(),
        ]);
    }
    t
}

pub fn dim_customers(a: &Analysis) -> Table {
    let mut t = Table::new(
        DIM_CUSTOMERS,
        &[
            "cod_cliente",
            "nome_cliente",
            "primeiro_nome",
            "ultimo_nome",
            "endereco_cliente",
            "cidade_cliente",
            "tipo_cliente",
        ],
    );
    for c in &a.customers {
        t.push(vec![
            c.id.clone(),
            c.display_name().unwrap_or_default(),
            opt(c.first_name.as_deref()),
            opt(c.last_name.as_deref()),
            opt(c.address.as_deref()),
            opt(c.city.as_deref()),
            opt(c.kind.as_deref()),
        ]);
    }
    t
}

pub fn dim_branches(a: &Analysis) -> Table {
    let mut t = Table::new(
        DIM_BRANCHES,
        &[
            "cod_agencia",
            "nome_agencia",
            "endereco_agencia",
            "cidade_agencia",
            "uf_agencia",
            "tipo_agencia",
        ],
    );
    for b in &a.branches {
        t.push(vec![
            b.code.clone(),
            opt(b.name.as_deref()),
            opt(b.address.as_deref()),
            opt(b.city.as_deref()),
            opt(b.state.as_deref()),
            opt(b.kind.as_deref()),
        ]);
    }
    t
}

/// Localized name for a weekday number, 1 = Monday.
pub fn weekday_label(locale: Locale, number: u32) -> &'static str {
    chrono::Weekday::try_from(number.saturating_sub(1) as u8)
        .map(|w| locale.weekday_name(w))
        .unwrap_or("")
}

pub fn by_weekday(a: &Analysis) -> Table {
    let mut t = Table::new(BY_WEEKDAY, &headers(&["dia_semana_num", "dia_semana"], &[]));
    for g in &a.weekday {
        let mut cells = vec![g.key.to_string(), weekday_label(a.locale, g.key).to_string()];
        cells.extend(stat_cells(&g.stats));
        t.push(cells);
    }
    t
}

pub fn by_parity(a: &Analysis) -> Table {
    let mut t = Table::new(BY_PARITY, &headers(&["tipo_mes"], &[]));
    for g in &a.parity {
        let mut cells = vec![g.key.label(a.locale).to_string()];
        cells.extend(stat_cells(&g.stats));
        t.push(cells);
    }
    t
}

pub fn recent_branches(a: &Analysis) -> Table {
    let mut t = Table::new(
        RECENT_BRANCHES,
        &headers(
            &["ranking", "cod_agencia", "nome_agencia"],
            &["periodo_inicio", "periodo_fim"],
        ),
    );
    let (start, end) = a
        .recent_window
        .map(|w| (format_timestamp(&w.start), format_timestamp(&w.end)))
        .unwrap_or_default();
    for r in &a.recent_branches {
        let mut cells = vec![r.rank.to_string(), r.code.clone(), opt(r.name.as_deref())];
        cells.extend(stat_cells(&r.stats));
        cells.push(start.clone());
        cells.push(end.clone());
        t.push(cells);
    }
    t
}

pub fn by_period(a: &Analysis) -> Table {
    let mut t = Table::new(
        BY_PERIOD,
        &headers(
            &["ano", "mes", "ano_mes", "nome_mes"],
            &["clientes_ativos", "agencias_ativas"],
        ),
    );
    for p in &a.periods {
        let mut cells = vec![
            p.year.to_string(),
            p.month.to_string(),
            format!("{:04}-{:02}", p.year, p.month),
            a.locale.month_name(p.month).to_string(),
        ];
        cells.extend(stat_cells(&p.stats));
        cells.push(p.active_customers.to_string());
        cells.push(p.active_branches.to_string());
        t.push(cells);
    }
    t
}

pub fn branch_metrics(a: &Analysis) -> Table {
    let mut t = Table::new(
        BRANCH_METRICS,
        &headers(
            &["cod_agencia", "nome_agencia", "cidade_agencia"],
            &["mediana_valor", "desvio_padrao_valor", "porte"],
        ),
    );
    for m in &a.branch_metrics {
        let mut cells = vec![m.code.clone(), opt(m.name.as_deref()), opt(m.city.as_deref())];
        cells.extend(stat_cells(&m.stats));
        cells.push(opt_decimal(m.median));
        cells.push(opt_decimal(m.std_dev));
        cells.push(opt(m.class));
        t.push(cells);
    }
    t
}

pub fn customer_metrics(a: &Analysis) -> Table {
    let mut t = Table::new(
        CUSTOMER_METRICS,
        &headers(
            &["cod_cliente", "nome_cliente", "cidade_cliente"],
            &["agencias_utilizadas", "segmento"],
        ),
    );
    for m in &a.customer_metrics {
        let mut cells = vec![m.id.clone(), opt(m.name.as_deref()), opt(m.city.as_deref())];
        cells.extend(stat_cells(&m.stats));
        cells.push(m.branches_used.to_string());
        cells.push(opt(m.segment));
        t.push(cells);
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::InvalidDatePolicy;
    use crate::pipeline::{analyze, PipelineConfig, RECENT_MONTHS};
    use std::path::Path;

    fn analysis(dir: &Path, locale: Locale) -> Analysis {
        std::fs::write(
            dir.join("transacoes.csv"),
            "cod_transacao,cod_cliente,cod_agencia,data_transacao,valor_transacao,status\n\
             1,1,7,2024-01-15 10:00:00 UTC,100,Aprovada\n\
             2,2,7,2024-02-15 10:00:00 UTC,100,Negada\n",
        )
        .unwrap();
        std::fs::write(dir.join("clientes.csv"), "cod_cliente,nome\n1,Ana\n2,Bruno\n").unwrap();
        std::fs::write(dir.join("agencias.csv"), "cod_agencia,nome\n7,Centro\n").unwrap();
        let cfg = PipelineConfig {
            data_dir: dir.to_path_buf(),
            output_dir: dir.join("out"),
            locale,
            invalid_dates: InvalidDatePolicy::Drop,
            html: false,
            recent_months: RECENT_MONTHS,
        };
        analyze(&cfg).unwrap().0
    }

    #[test]
    fn test_build_all_order_and_widths() {
        let dir = tempfile::tempdir().unwrap();
        let tables = build_all(&analysis(dir.path(), Locale::PtBr));
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, TABLE_NAMES);
        for t in &tables {
            for row in &t.rows {
                assert_eq!(row.len(), t.headers.len(), "{}", t.name);
            }
        }
    }

    #[test]
    fn test_parity_table_rows() {
        let dir = tempfile::tempdir().unwrap();
        let t = by_parity(&analysis(dir.path(), Locale::PtBr));
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0][..3], ["Par", "1", "100.00"]);
        assert_eq!(t.rows[1][..3], ["Ímpar", "1", "100.00"]);
    }

    #[test]
    fn test_fact_row_fields() {
        let dir = tempfile::tempdir().unwrap();
        let t = facts(&analysis(dir.path(), Locale::En));
        let col = |name: &str| t.headers.iter().position(|h| h == name).unwrap();
        let row = &t.rows[0];
        assert_eq!(row[col("data_transacao")], "2024-01-15 10:00:00");
        assert_eq!(row[col("nome_cliente")], "Ana");
        assert_eq!(row[col("nome_agencia")], "Centro");
        assert_eq!(row[col("dia_semana")], "Monday");
        assert_eq!(row[col("tipo_mes")], "Odd");
        assert_eq!(row[col("categoria_valor")], "Até R$ 100");
        assert_eq!(row[col("aprovada")], "true");
        assert_eq!(t.rows[1][col("status")], "Negada");
    }

    #[test]
    fn test_weekday_labels() {
        assert_eq!(weekday_label(Locale::PtBr, 1), "Segunda-feira");
        assert_eq!(weekday_label(Locale::En, 7), "Sunday");
        assert_eq!(weekday_label(Locale::En, 8), "");
    }
}
