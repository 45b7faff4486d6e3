// File I/O operations

pub mod csv;

pub use crate::csv::CsvStore;
