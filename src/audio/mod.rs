pub mod export;

pub use export::{mix_and_export, ExportError, EXPORT_EXTENSION};
