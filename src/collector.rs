use crate::api::TransactionSource;
use crate::config::CollectConfig;
use crate::model::{FailedLookup, RegionCode, ResultDataset, TransactionRecord, YearMonth};
use crate::normalizer::normalize_all;

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Drives one lookup per (region, period) pair and assembles the dataset.
pub struct Collector<S> {
    source: S,
    config: CollectConfig,
}

impl<S: TransactionSource> Collector<S> {
    pub fn new(source: S, config: CollectConfig) -> Self {
        Self { source, config }
    }

    /// Region-major iteration over all pairs. A failed pair is logged and
    /// recorded; it never aborts the run. Records come back in pair order
    /// whatever the concurrency level.
    pub async fn collect(&self, regions: &[RegionCode], periods: &[YearMonth]) -> ResultDataset {
        let mut dataset = ResultDataset::default();
        if regions.is_empty() || periods.is_empty() {
            return dataset;
        }

        let pairs: Vec<(&RegionCode, YearMonth)> = regions
            .iter()
            .flat_map(|region| periods.iter().map(move |period| (region, *period)))
            .collect();
        let total = pairs.len();
        info!(
            "Collecting {} region(s) x {} month(s) = {} lookups",
            regions.len(),
            periods.len(),
            total
        );

        let delay = Duration::from_millis(self.config.request_delay_ms);
        let results: Vec<_> = stream::iter(pairs.into_iter().enumerate())
            .map(|(idx, (region, period))| async move {
                let result = self.source.fetch(&region.code, period).await;
                match &result {
                    Ok(rows) => info!(
                        "[{}/{}] {} {} {}: {} rows",
                        idx + 1,
                        total,
                        region.code,
                        region.district_name,
                        period,
                        rows.len()
                    ),
                    Err(e) => warn!(
                        "[{}/{}] {} {} {}: lookup failed: {}",
                        idx + 1,
                        total,
                        region.code,
                        region.district_name,
                        period,
                        e
                    ),
                }
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                (region, period, result)
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (region, period, result) in results {
            match result {
                Ok(rows) => dataset.records.extend(normalize_all(rows, &region.code)),
                Err(e) => dataset.failures.push(FailedLookup {
                    region_code: region.code.clone(),
                    period,
                    error: e.to_string(),
                }),
            }
        }

        enrich(&mut dataset.records, regions);
        info!(
            "Collection finished: {} rows, {} failed lookups",
            dataset.len(),
            dataset.failures.len()
        );
        dataset
    }
}

/// Attaches province/district names by region code. Unmatched codes get
/// `None` for both.
pub fn enrich(records: &mut [TransactionRecord], regions: &[RegionCode]) {
    let by_code: HashMap<&str, &RegionCode> =
        regions.iter().map(|r| (r.code.as_str(), r)).collect();

    for record in records.iter_mut() {
        match by_code.get(record.region_code.as_str()) {
            Some(region) => {
                record.province_name = Some(region.province_name.clone());
                record.district_name = Some(region.district_name.clone());
            }
            None => {
                record.province_name = None;
                record.district_name = None;
            }
        }
    }
}
