// Core structs: RegionCode, YearMonth, TransactionRecord, ResultDataset
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// One 시군구 entry of the region reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCode {
    pub code: String,
    pub province_name: String,
    pub district_name: String,
}

impl RegionCode {
    pub fn new(code: &str, province_name: &str, district_name: &str) -> Self {
        Self {
            code: code.to_string(),
            province_name: province_name.to_string(),
            district_name: district_name.to_string(),
        }
    }
}

/// A calendar month, rendered as `YYYYMM` (the API's `DEAL_YMD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// Moves `n` months back in time.
    pub fn minus_months(self, n: u32) -> Self {
        let total = self.year as i64 * 12 + (self.month as i64 - 1) - n as i64;
        Self {
            year: total.div_euclid(12) as i32,
            month: total.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("expected YYYYMM, got '{}'", s));
        }
        let year: i32 = s[..4].parse().map_err(|_| format!("bad year in '{}'", s))?;
        let month: u32 = s[4..].parse().map_err(|_| format!("bad month in '{}'", s))?;
        Self::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
    }
}

/// Ordered, gap-free months, oldest first.
pub type PeriodWindow = Vec<YearMonth>;

/// One `<item>` of an API response, fields kept in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTransaction {
    pub fields: Vec<(String, String)>,
}

impl RawTransaction {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, name: &str, value: &str) {
        self.fields.push((name.to_string(), value.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// 시군구 code the row belongs to (join key).
    pub region_code: String,
    pub deal_date: Option<NaiveDate>,
    /// 거래금액 in 만원 (10,000 KRW).
    pub deal_amount: Option<i64>,
    /// 전용면적 in m².
    pub exclusive_area: Option<f64>,
    pub floor: Option<i32>,
    pub build_year: Option<i32>,
    pub apartment_name: String,
    pub province_name: Option<String>,
    pub district_name: Option<String>,
    pub source: RawTransaction,
}

/// A (region, period) pair that could not be collected.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedLookup {
    pub region_code: String,
    pub period: YearMonth,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResultDataset {
    pub records: Vec<TransactionRecord>,
    pub failures: Vec<FailedLookup>,
}

impl ResultDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PUBLIC_DATA_SERVICE_KEY is not set (add it to the environment or .env)")]
    MissingServiceKey,
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("cannot read config file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("region table {path}: {reason}")]
    RegionTable { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },
    #[error("malformed response: {0}")]
    Parse(String),
}

/// Result codes that mean the service key itself is unusable.
const FATAL_API_CODES: &[&str] = &["20", "22", "30", "31", "32"];

impl LookupError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LookupError::Http(_) | LookupError::Timeout | LookupError::Parse(_) => true,
            LookupError::Status(code) => *code == 429 || *code >= 500,
            LookupError::Api { code, .. } => !FATAL_API_CODES.contains(&code.as_str()),
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Timeout
        } else if let Some(status) = e.status() {
            LookupError::Status(status.as_u16())
        } else {
            LookupError::Http(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write {path} ({rows} rows not exported): {source}")]
    Io {
        path: PathBuf,
        rows: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error writing {path} ({rows} rows not exported): {source}")]
    Csv {
        path: PathBuf,
        rows: usize,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] LookupError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_formats_and_parses() {
        let ym: YearMonth = "202401".parse().unwrap();
        assert_eq!(ym, YearMonth::new(2024, 1).unwrap());
        assert_eq!(ym.to_string(), "202401");
        assert!("202413".parse::<YearMonth>().is_err());
        assert!("2024-1".parse::<YearMonth>().is_err());
    }

    #[test]
    fn year_month_rolls_over_years() {
        let jan = YearMonth::new(2024, 1).unwrap();
        assert_eq!(jan.prev().to_string(), "202312");
        assert_eq!(jan.prev().next(), jan);
        assert_eq!(jan.minus_months(13).to_string(), "202212");
        assert_eq!(jan.minus_months(0), jan);
    }

    #[test]
    fn lookup_error_retry_policy() {
        assert!(LookupError::Timeout.is_retryable());
        assert!(LookupError::Status(503).is_retryable());
        assert!(!LookupError::Status(404).is_retryable());
        let bad_key = LookupError::Api {
            code: "30".into(),
            message: "SERVICE_KEY_IS_NOT_REGISTERED_ERROR".into(),
        };
        assert!(!bad_key.is_retryable());
    }
}
