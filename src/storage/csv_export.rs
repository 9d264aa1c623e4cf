use crate::model::{ExportError, ResultDataset, TransactionRecord, YearMonth};
use csv::Writer;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const FIXED_COLUMNS: &[&str] = &[
    "region_code",
    "province_name",
    "district_name",
    "deal_date",
    "deal_amount",
    "exclusive_area",
    "floor",
    "build_year",
    "apartment_name",
];

pub trait Exporter {
    /// Writes the dataset and returns the number of rows written.
    fn export(&self, dataset: &ResultDataset, path: &Path) -> Result<usize, ExportError>;
}

pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// `<dir>/apt_trade_<start>_<end>.csv`
pub fn output_path(dir: &Path, start: YearMonth, end: YearMonth) -> PathBuf {
    dir.join(format!("apt_trade_{}_{}.csv", start, end))
}

/// Column names: the fixed ones, then every source field in first-seen order.
pub fn columns(records: &[TransactionRecord]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut source_columns = Vec::new();
    for record in records {
        for (name, _) in &record.source.fields {
            if seen.insert(name.as_str()) {
                source_columns.push(name.clone());
            }
        }
    }

    FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(source_columns)
        .collect()
}

impl Exporter for CsvExporter {
    /// Rows go to `<path>.tmp` first and the file is renamed into place once
    /// complete, so a failed run never leaves a truncated CSV at `path`.
    fn export(&self, dataset: &ResultDataset, path: &Path) -> Result<usize, ExportError> {
        let total = dataset.len();
        let io_error = |source: std::io::Error| ExportError::Io {
            path: path.to_path_buf(),
            rows: total,
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let tmp = path.with_extension("csv.tmp");
        let written = match write_csv(dataset, &tmp, path) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(e));
        }

        info!("Exported {} rows to {}", written, path.display());
        Ok(written)
    }
}

/// Writes the whole dataset to `file`. Errors name `target`.
fn write_csv(dataset: &ResultDataset, file: &Path, target: &Path) -> Result<usize, ExportError> {
    let total = dataset.len();
    let io_error = |rows: usize, source: std::io::Error| ExportError::Io {
        path: target.to_path_buf(),
        rows,
        source,
    };
    let csv_error = |rows: usize, source: csv::Error| ExportError::Csv {
        path: target.to_path_buf(),
        rows,
        source,
    };

    let mut writer = Writer::from_path(file).map_err(|e| csv_error(total, e))?;
    let header = columns(&dataset.records);
    writer
        .write_record(&header)
        .map_err(|e| csv_error(total, e))?;

    let source_columns = &header[FIXED_COLUMNS.len()..];
    let mut written = 0;
    for record in &dataset.records {
        writer
            .write_record(row(record, source_columns))
            .map_err(|e| csv_error(total - written, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| io_error(total - written, e))?;
    Ok(written)
}

fn row(record: &TransactionRecord, source_columns: &[String]) -> Vec<String> {
    let mut cells = vec![
        record.region_code.clone(),
        record.province_name.clone().unwrap_or_default(),
        record.district_name.clone().unwrap_or_default(),
        record
            .deal_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        opt(record.deal_amount),
        opt(record.exclusive_area),
        opt(record.floor),
        opt(record.build_year),
        record.apartment_name.clone(),
    ];
    cells.extend(
        source_columns
            .iter()
            .map(|name| record.source.get(name).unwrap_or_default().to_string()),
    );
    cells
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
