use thiserror::Error;

#[derive(Error, Debug)]
pub enum BanvicError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input file not found: {table} (looked in {dir})")]
    MissingInput { table: String, dir: String },

    #[error("Table '{table}' is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("Binning error: {0}")]
    Binning(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Failed to write {path}: {reason}")]
    Export { path: String, reason: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BanvicError>;
