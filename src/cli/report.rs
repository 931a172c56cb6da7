use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::ReportCommands;
use crate::dates::format_timestamp;
use crate::dimension::span_days;
use crate::error::Result;
use crate::fmt::{count, money, percent};
use crate::metrics::{self, Aggregate, SEGMENT_LABELS};
use crate::pipeline::{analyze, Analysis, PipelineConfig};
use crate::settings::load_settings;
use crate::tables::weekday_label;

const STAT_HEADERS: [&str; 4] = ["Transações", "Volume", "Ticket médio", "Aprovação"];

fn stat_cells(stats: &Aggregate) -> Vec<Cell> {
    vec![
        Cell::new(count(stats.count)),
        Cell::new(money(stats.volume())),
        Cell::new(money(stats.mean())),
        Cell::new(percent(stats.approval_rate())),
    ]
}

fn table_with(leading: &[&str]) -> Table {
    let mut table = Table::new();
    let mut header: Vec<&str> = leading.to_vec();
    header.extend(STAT_HEADERS);
    table.set_header(header);
    table
}

pub fn dispatch(cmd: ReportCommands, data_dir: Option<String>) -> Result<()> {
    let config = PipelineConfig::from_settings(&load_settings()).with_data_dir(data_dir);
    let (analysis, _) = analyze(&config)?;
    if analysis.facts.is_empty() {
        println!("No transactions to report.");
        return Ok(());
    }
    match cmd {
        ReportCommands::Kpis => kpis(&analysis),
        ReportCommands::Weekday => weekday(&analysis),
        ReportCommands::Parity => parity(&analysis),
        ReportCommands::Branches => branches(&analysis),
        ReportCommands::Periods => periods(&analysis),
        ReportCommands::Segments => segments(&analysis),
        ReportCommands::Agencies => agencies(&analysis),
    }
    Ok(())
}

fn kpis(a: &Analysis) {
    let k = &a.kpis;
    let mut table = Table::new();
    table.set_header(vec!["Indicador", "Valor"]);
    table.add_row(vec![Cell::new("Transações"), Cell::new(count(k.stats.count))]);
    table.add_row(vec![Cell::new("Volume total"), Cell::new(money(k.stats.volume()))]);
    table.add_row(vec![Cell::new("Ticket médio"), Cell::new(money(k.stats.mean()))]);
    table.add_row(vec![Cell::new("Aprovadas"), Cell::new(count(k.stats.approved))]);
    table.add_row(vec![
        Cell::new("Taxa de aprovação"),
        Cell::new(percent(k.stats.approval_rate())),
    ]);
    table.add_row(vec![Cell::new("Clientes"), Cell::new(count(k.customers))]);
    table.add_row(vec![Cell::new("Agências"), Cell::new(count(k.branches))]);
    if let (Some(first), Some(last)) = (k.first_day, k.last_day) {
        table.add_row(vec![
            Cell::new("Período"),
            Cell::new(format!("{first} a {last} ({} dias)", span_days(first, last))),
        ]);
    }
    println!("Indicadores\n{table}");

    let p = &a.parity_test;
    let verdict = match p.difference_pct {
        Some(_) if p.significant => "diferença significativa".yellow().bold(),
        Some(_) => "sem diferença significativa".green(),
        None => "sem dados suficientes".dimmed(),
    };
    println!(
        "\nMeses pares: {}  Meses ímpares: {}  Diferença: {}  ({verdict})",
        money(p.even_mean),
        money(p.odd_mean),
        p.difference_pct.map(percent).unwrap_or_else(|| "—".to_string()),
    );
}

fn weekday(a: &Analysis) {
    let mut table = table_with(&["Dia"]);
    for g in &a.weekday {
        let mut row = vec![Cell::new(weekday_label(a.locale, g.key))];
        row.extend(stat_cells(&g.stats));
        table.add_row(row);
    }
    println!("Transações por dia da semana\n{table}");
}

fn parity(a: &Analysis) {
    let mut table = table_with(&["Tipo de mês"]);
    for g in &a.parity {
        let mut row = vec![Cell::new(g.key.label(a.locale))];
        row.extend(stat_cells(&g.stats));
        table.add_row(row);
    }
    println!("Meses pares vs ímpares\n{table}");

    let approved = metrics::approved_only(&a.facts);
    let mut table = table_with(&["Tipo de mês"]);
    for g in metrics::by_month_parity(&approved) {
        let mut row = vec![Cell::new(g.key.label(a.locale))];
        row.extend(stat_cells(&g.stats));
        table.add_row(row);
    }
    println!("\nSomente aprovadas\n{table}");
}

fn branches(a: &Analysis) {
    let Some(window) = a.recent_window else {
        println!("No dated transactions.");
        return;
    };
    let mut table = table_with(&["#", "Agência", "Nome"]);
    for r in &a.recent_branches {
        let mut row = vec![
            Cell::new(r.rank),
            Cell::new(&r.code),
            Cell::new(r.name.as_deref().unwrap_or("")),
        ];
        row.extend(stat_cells(&r.stats));
        table.add_row(row);
    }
    println!(
        "Agências de {} a {}\n{table}",
        format_timestamp(&window.start),
        format_timestamp(&window.end)
    );
}

fn periods(a: &Analysis) {
    let mut table = Table::new();
    table.set_header(
        ["Mês"]
            .into_iter()
            .chain(STAT_HEADERS)
            .chain(["Clientes", "Agências"])
            .collect::<Vec<_>>(),
    );
    for p in &a.periods {
        let mut row = vec![Cell::new(format!("{:04}-{:02}", p.year, p.month))];
        row.extend(stat_cells(&p.stats));
        row.push(Cell::new(p.active_customers));
        row.push(Cell::new(p.active_branches));
        table.add_row(row);
    }
    println!("Evolução mensal\n{table}");
}

fn segments(a: &Analysis) {
    let summary = metrics::segment_summary(&a.customer_metrics);
    if summary.is_empty() {
        println!("Customers could not be segmented (too few distinct volumes).");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        "Segmento",
        "Clientes",
        "Transações",
        "Volume",
        "Volume médio",
        "Ticket médio",
    ]);
    for s in &summary {
        table.add_row(vec![
            Cell::new(s.segment),
            Cell::new(count(s.customers)),
            Cell::new(count(s.transactions)),
            Cell::new(money(s.volume)),
            Cell::new(money(s.mean_volume)),
            Cell::new(money(s.mean_ticket)),
        ]);
    }
    println!("Segmentos de clientes ({})\n{table}", SEGMENT_LABELS.join(" < "));
}

fn agencies(a: &Analysis) {
    let mut table = Table::new();
    table.set_header(
        ["Agência", "Nome", "Cidade"]
            .into_iter()
            .chain(STAT_HEADERS)
            .chain(["Mediana", "Desvio padrão", "Porte"])
            .collect::<Vec<_>>(),
    );
    for m in &a.branch_metrics {
        let mut row = vec![
            Cell::new(&m.code),
            Cell::new(m.name.as_deref().unwrap_or("")),
            Cell::new(m.city.as_deref().unwrap_or("")),
        ];
        row.extend(stat_cells(&m.stats));
        row.push(Cell::new(m.median.map(money).unwrap_or_default()));
        row.push(Cell::new(m.std_dev.map(money).unwrap_or_default()));
        row.push(Cell::new(m.class.unwrap_or("—")));
        table.add_row(row);
    }
    println!("Métricas por agência\n{table}");
}
