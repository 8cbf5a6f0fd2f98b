// Document export. Only CSV is produced today.

pub mod csv;

pub use crate::csv::{csv_filename, generate_csv, write_csv};
