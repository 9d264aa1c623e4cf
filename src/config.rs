use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SERVICE_KEY_VAR: &str = "PUBLIC_DATA_SERVICE_KEY";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_API_BASE_URL: &str =
    "https://apis.data.go.kr/1613000/RTMSDataSvcAptTrade/getRTMSDataSvcAptTrade";
/// Ten years of monthly lookups per region.
pub const MAX_MONTHS_BACK: u32 = 120;

/// Optional settings read from the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub months_back: Option<u32>,
    pub include_current_month: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub region_table: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub rows_per_page: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub request_delay_ms: Option<u64>,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub months_back: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub region_table: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub service_key: String,
    pub rows_per_page: u32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Number of (region, period) lookups in flight at once.
    pub concurrency: usize,
    pub request_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub months_back: u32,
    pub include_current_month: bool,
    pub output_dir: PathBuf,
    pub region_table: PathBuf,
    pub api: ApiConfig,
    pub collect: CollectConfig,
}

/// Loads the configuration: defaults < config file < environment < CLI.
///
/// A missing default `config.json` is fine; a missing file that was asked
/// for explicitly is an error. `env` looks up a variable by name.
pub fn load_config<F>(
    path: Option<&Path>,
    env: F,
    overrides: &Overrides,
) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match path {
        Some(p) => read_file_config(p)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            read_file_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => FileConfig::default(),
    };
    resolve(file, env, overrides)
}

pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Merges the layers.
pub fn resolve<F>(
    file: FileConfig,
    env: F,
    overrides: &Overrides,
) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let service_key = env(SERVICE_KEY_VAR)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingServiceKey)?;

    let months_back = match overrides.months_back {
        Some(n) => n,
        None => env_parse(&env, "APT_MONTHS_BACK")?
            .or(file.months_back)
            .unwrap_or(4),
    };
    if months_back == 0 || months_back > MAX_MONTHS_BACK {
        return Err(ConfigError::InvalidValue {
            key: "months_back".into(),
            value: months_back.to_string(),
        });
    }

    let include_current_month = env_bool(&env, "APT_INCLUDE_CURRENT_MONTH")?
        .or(file.include_current_month)
        .unwrap_or(true);

    let output_dir = overrides
        .output_dir
        .clone()
        .or_else(|| env("APT_OUTPUT_DIR").map(PathBuf::from))
        .or(file.output_dir)
        .unwrap_or_else(|| PathBuf::from("output"));

    let region_table = overrides
        .region_table
        .clone()
        .or_else(|| env("APT_REGION_TABLE").map(PathBuf::from))
        .or(file.region_table)
        .unwrap_or_else(|| PathBuf::from("data/region_codes.csv"));

    let base_url = env("APT_API_BASE_URL")
        .or(file.api_base_url)
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

    let concurrency = env_parse(&env, "APT_CONCURRENCY")?
        .or(file.concurrency)
        .unwrap_or(1);
    if concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            key: "concurrency".into(),
            value: "0".into(),
        });
    }

    Ok(AppConfig {
        months_back,
        include_current_month,
        output_dir,
        region_table,
        api: ApiConfig {
            base_url,
            service_key,
            rows_per_page: file.rows_per_page.unwrap_or(1000),
            timeout_seconds: file.timeout_seconds.unwrap_or(30),
            max_retries: env_parse(&env, "APT_MAX_RETRIES")?
                .or(file.max_retries)
                .unwrap_or(3),
            retry_backoff_ms: file.retry_backoff_ms.unwrap_or(500),
        },
        collect: CollectConfig {
            concurrency,
            request_delay_ms: env_parse(&env, "APT_REQUEST_DELAY_MS")?
                .or(file.request_delay_ms)
                .unwrap_or(0),
        },
    })
}

fn env_parse<T, F>(env: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = env(key) else {
        return Ok(None);
    };
    let parsed: Option<T> = raw.trim().parse().ok();
    match parsed {
        Some(value) => Ok(Some(value)),
        None => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn env_bool<F>(env: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match env(key).as_deref().map(str::trim) {
        None => Ok(None),
        Some("1") | Some("true") | Some("yes") => Ok(Some(true)),
        Some("0") | Some("false") | Some("no") => Ok(Some(false)),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}
