pub mod error;
pub mod export;

pub use error::{ExportError, ExportResult};
pub use export::{ExportRow, data_file_name, derive_rows, export_session, export_session_with_fallback};
