use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("sheet '{sheet}' not found in {path} (available: {})", .available.join(", "))]
    SheetNotFound {
        path: PathBuf,
        sheet: String,
        available: Vec<String>,
    },

    #[error("workbook {0} contains no sheets")]
    NoSheets(PathBuf),

    #[error("{path}: expected a header on row {row}, but the sheet ends before it")]
    MissingHeader { path: PathBuf, row: usize },

    #[error("{path}: required column '{field}' not found (accepted headers: {})", .accepted.join(", "))]
    MissingColumn {
        path: PathBuf,
        field: &'static str,
        accepted: Vec<&'static str>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("totals table has no {0} column")]
    MissingColumn(&'static str),
}
