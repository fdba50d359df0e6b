pub mod auth;
pub mod kis;

pub use auth::{AuthContext, TokenResponse, TokenSource};
pub use kis::KisClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::BarSeries;

/// Market-data seam. Errors are surfaced as `Err`, never folded into an
/// empty series; callers decide whether to skip a code for the pass.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn daily_bars(
        &mut self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BarSeries>;

    async fn current_price(&mut self, code: &str) -> Result<f64>;
}
