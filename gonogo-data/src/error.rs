//! Export error type. Everything the exporter can fail on funnels into
//! ExportError so the app boundary handles one kind of failure.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no main-block trials recorded, nothing to export")]
    NoMainTrials,
}

pub type ExportResult<T> = Result<T, ExportError>;
