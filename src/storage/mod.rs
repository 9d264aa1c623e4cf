pub mod csv_export;

pub use csv_export::{CsvExporter, Exporter, output_path};
