pub mod fetcher;
pub mod traits;

pub use fetcher::MolitClient;
pub use traits::TransactionSource;
