use crate::model::{ResultDataset, TransactionRecord};
use std::collections::BTreeMap;
use tracing::{info, warn};

const UNKNOWN_PROVINCE: &str = "unknown";

/// Deal amount statistics for one province, in 만원.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvinceStats {
    pub province: String,
    pub count: usize,
    pub avg_price: f64,
    pub std_dev: f64,
}

/// Trait defining the interface for a dataset analyzer.
pub trait Analyzer {
    fn calculate_stats(&self, records: &[TransactionRecord]) -> Vec<ProvinceStats>;
    fn log_summary(&self, dataset: &ResultDataset);
}

pub struct AnalyzerImpl;

impl AnalyzerImpl {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnalyzerImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for AnalyzerImpl {
    /// Groups by province (sorted by name) and computes mean and population
    /// standard deviation of the deal amount. Rows without an amount count
    /// towards `count` but not towards the price figures.
    fn calculate_stats(&self, records: &[TransactionRecord]) -> Vec<ProvinceStats> {
        let mut groups: BTreeMap<&str, (usize, Vec<f64>)> = BTreeMap::new();
        for record in records {
            let province = record.province_name.as_deref().unwrap_or(UNKNOWN_PROVINCE);
            let entry = groups.entry(province).or_default();
            entry.0 += 1;
            if let Some(amount) = record.deal_amount {
                entry.1.push(amount as f64);
            }
        }

        groups
            .into_iter()
            .map(|(province, (count, prices))| {
                let (avg_price, std_dev) = mean_and_std_dev(&prices);
                ProvinceStats {
                    province: province.to_string(),
                    count,
                    avg_price,
                    std_dev,
                }
            })
            .collect()
    }

    fn log_summary(&self, dataset: &ResultDataset) {
        info!("Total transactions: {}", dataset.len());
        for stats in self.calculate_stats(&dataset.records) {
            info!(
                "{}: {} rows | avg = {:.0} 만원, std_dev = {:.0}",
                stats.province, stats.count, stats.avg_price, stats.std_dev
            );
        }
        if !dataset.failures.is_empty() {
            warn!("{} lookups failed:", dataset.failures.len());
            for failure in &dataset.failures {
                warn!("  {} {}: {}", failure.region_code, failure.period, failure.error);
            }
        }
    }
}

fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let count = values.len() as f64;
    let avg = values.iter().sum::<f64>() / count;
    let std_dev = (values.iter().map(|p| (p - avg).powi(2)).sum::<f64>() / count).sqrt();
    (avg, std_dev)
}
