use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{BanvicError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

/// A named output table of text cells, independent of any file format.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// An output format. Sinks only render bytes; writing is shared.
pub trait Sink {
    fn extension(&self) -> &'static str;
    fn render(&self, table: &Table) -> Result<Vec<u8>>;
}

/// Comma-separated, UTF-8 with BOM so spreadsheet tools pick the encoding.
pub struct CsvSink;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl Sink for CsvSink {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn render(&self, table: &Table) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());
        wtr.write_record(&table.headers)?;
        for row in &table.rows {
            wtr.write_record(row)?;
        }
        wtr.into_inner()
            .map_err(|e| BanvicError::Other(e.to_string()))
    }
}

/// One unstyled HTML table per file.
pub struct HtmlSink;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl Sink for HtmlSink {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, table: &Table) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let title = escape_html(&table.name);
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html><head><meta charset=\"utf-8\"><title>{title}</title></head>")?;
        writeln!(out, "<body>\n<table>\n<thead><tr>")?;
        for h in &table.headers {
            writeln!(out, "<th>{}</th>", escape_html(h))?;
        }
        writeln!(out, "</tr></thead>\n<tbody>")?;
        for row in &table.rows {
            write!(out, "<tr>")?;
            for cell in row {
                write!(out, "<td>{}</td>", escape_html(cell))?;
            }
            writeln!(out, "</tr>")?;
        }
        writeln!(out, "</tbody>\n</table>\n</body></html>")?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `bytes` to a temporary file beside `path`, then rename it into place.
/// The previous file stays intact if anything fails before the rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| BanvicError::Export {
        path: path.display().to_string(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub file: String,
    pub table: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<WrittenFile>,
    /// File name and error for every table that could not be written.
    pub failures: Vec<(String, BanvicError)>,
}

impl ExportReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write every table through every sink into `dir`, then the manifest.
///
/// A failing file does not stop the others; failures are collected in the
/// report.
pub fn export_tables(tables: &[Table], dir: &Path, sinks: &[&dyn Sink]) -> ExportReport {
    let mut report = ExportReport::default();
    if let Err(e) = std::fs::create_dir_all(dir) {
        report.failures.push((dir.display().to_string(), e.into()));
        return report;
    }

    for sink in sinks {
        for table in tables {
            let file = format!("{}.{}", table.name, sink.extension());
            let path = dir.join(&file);
            let result = sink
                .render(table)
                .and_then(|bytes| write_atomic(&path, &bytes).map(|_| bytes));
            match result {
                Ok(bytes) => {
                    info!(file = %file, rows = table.rows.len(), "table written");
                    report.written.push(WrittenFile {
                        file,
                        table: table.name.clone(),
                        rows: table.rows.len(),
                        sha256: sha256_hex(&bytes),
                    });
                }
                Err(e) => {
                    warn!(file = %file, error = %e, "failed to write table");
                    report.failures.push((file, e));
                }
            }
        }
    }

    if let Err(e) = write_manifest(dir, &report.written) {
        report.failures.push((MANIFEST_FILE.to_string(), e));
    }
    report
}

#[derive(Serialize)]
struct Manifest<'a> {
    generator: String,
    files: &'a [WrittenFile],
}

/// No timestamps: the manifest only changes when an output changes.
pub fn write_manifest(dir: &Path, files: &[WrittenFile]) -> Result<PathBuf> {
    let manifest = Manifest {
        generator: format!("banvic {}", env!("CARGO_PKG_VERSION")),
        files,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = dir.join(MANIFEST_FILE);
    write_atomic(&path, format!("{json}\n").as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new("resumo", &["grupo", "valor"]);
        t.push(vec!["Par".to_string(), "100.00".to_string()]);
        t.push(vec!["a, \"b\"".to_string(), "<1>".to_string()]);
        t
    }

    #[test]
    fn test_csv_has_bom_and_quotes() {
        let bytes = CsvSink.render(&sample()).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "grupo,valor\nPar,100.00\n\"a, \"\"b\"\"\",<1>\n");
    }

    #[test]
    fn test_html_escapes_cells() {
        let html = String::from_utf8(HtmlSink.render(&sample()).unwrap()).unwrap();
        assert!(html.contains("<th>grupo</th>"));
        assert!(html.contains("<td>&lt;1&gt;</td>"));
        assert!(html.contains("a, &quot;b&quot;"));
        assert_eq!(escape_html("d'Ávila & <co>"), "d&#39;Ávila &amp; &lt;co&gt;");
    }

    #[test]
    fn test_write_atomic_creates_dirs_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_export_writes_tables_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let report = export_tables(&[sample()], dir.path(), &[&CsvSink, &HtmlSink]);
        assert!(report.is_ok());
        assert_eq!(report.written.len(), 2);
        assert!(dir.path().join("resumo.csv").is_file());
        assert!(dir.path().join("resumo.html").is_file());

        let manifest = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(value["files"][0]["file"], "resumo.csv");
        assert_eq!(value["files"][0]["rows"], 2);
        let csv = std::fs::read(dir.path().join("resumo.csv")).unwrap();
        assert_eq!(value["files"][0]["sha256"], sha256_hex(&csv));
    }

    #[test]
    fn test_export_is_byte_identical_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        export_tables(&[sample()], dir.path(), &[&CsvSink]);
        let first = std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap();
        export_tables(&[sample()], dir.path(), &[&CsvSink]);
        let second = std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(first, second);
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn extension(&self) -> &'static str {
            "bin"
        }

        fn render(&self, _table: &Table) -> Result<Vec<u8>> {
            Err(BanvicError::Other("boom".to_string()))
        }
    }

    #[test]
    fn test_failures_are_collected_and_others_written() {
        let dir = tempfile::tempdir().unwrap();
        let report = export_tables(&[sample()], dir.path(), &[&FailingSink, &CsvSink]);
        assert!(!report.is_ok());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "resumo.bin");
        assert!(dir.path().join("resumo.csv").is_file());
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
