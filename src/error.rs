use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("{source_name} is missing required column(s): {}", .columns.join(", "))]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },

    #[error("Unsupported file type for {0}: expected .csv, .xlsx, .xlsm, .xls or .ods")]
    UnsupportedFormat(String),

    #[error("No worksheet found in {0}")]
    EmptyWorkbook(String),

    #[error("Alert threshold {value}% is below the minimum of {min}%")]
    InvalidThreshold { value: f64, min: f64 },

    #[error("Invalid configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet read error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Spreadsheet write error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InsightError>;
