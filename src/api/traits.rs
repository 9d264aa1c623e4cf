use crate::model::{LookupError, RawTransaction, YearMonth};

/// Lookup of the sale transactions of one region for one month.
#[async_trait::async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch(
        &self,
        region_code: &str,
        period: YearMonth,
    ) -> Result<Vec<RawTransaction>, LookupError>;
}
