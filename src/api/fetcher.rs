use crate::api::traits::TransactionSource;
use crate::config::ApiConfig;
use crate::model::{LookupError, RawTransaction, YearMonth};
use crate::parser::{MolitParser, Parser, ResponsePage};

use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Client for the MOLIT apartment trade API on data.go.kr.
pub struct MolitClient {
    client: Client,
    config: ApiConfig,
    parser: MolitParser,
}

impl MolitClient {
    pub fn new(config: ApiConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(concat!("apt-trade-collector/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            parser: MolitParser::new(),
        })
    }

    async fn fetch_page(
        &self,
        region_code: &str,
        period: YearMonth,
        page_no: u32,
    ) -> Result<ResponsePage, LookupError> {
        let deal_ymd = period.to_string();
        let page = page_no.to_string();
        let rows = self.config.rows_per_page.to_string();

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("serviceKey", self.config.service_key.as_str()),
                ("LAWD_CD", region_code),
                ("DEAL_YMD", deal_ymd.as_str()),
                ("pageNo", page.as_str()),
                ("numOfRows", rows.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        self.parser.parse(&body)
    }

    /// Walks all pages of one (region, month) lookup.
    async fn fetch_all_pages(
        &self,
        region_code: &str,
        period: YearMonth,
    ) -> Result<Vec<RawTransaction>, LookupError> {
        let mut collected = Vec::new();
        let mut page_no = 1;

        loop {
            let page = self.fetch_page(region_code, period, page_no).await?;
            let received = page.items.len();
            collected.extend(page.items);
            debug!(
                region = region_code,
                period = %period,
                page = page_no,
                received,
                total = page.total_count,
                "page fetched"
            );

            if received == 0 || collected.len() >= page.total_count {
                break;
            }
            page_no += 1;
        }

        Ok(collected)
    }
}

#[async_trait::async_trait]
impl TransactionSource for MolitClient {
    async fn fetch(
        &self,
        region_code: &str,
        period: YearMonth,
    ) -> Result<Vec<RawTransaction>, LookupError> {
        let mut attempts = 0;
        loop {
            match self.fetch_all_pages(region_code, period).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_retryable() && attempts < self.config.max_retries => {
                    attempts += 1;
                    let delay = backoff_delay(self.config.retry_backoff_ms, attempts);
                    warn!(
                        region = region_code,
                        period = %period,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying lookup"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff with up to 50% random jitter.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let backoff = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let jitter = if backoff > 1 {
        rand::rng().random_range(0..=backoff / 2)
    } else {
        0
    };
    Duration::from_millis(backoff.saturating_add(jitter))
}
