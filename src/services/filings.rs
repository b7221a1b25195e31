use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::models::{Filing, FilingRecord};
use crate::pocketbase::{FILINGS, Filter, ListQuery, RecordService};

#[derive(Clone)]
pub struct FilingService {
    records: Arc<dyn RecordService>,
}

impl FilingService {
    pub fn new(records: Arc<dyn RecordService>) -> Self {
        Self { records }
    }

    pub async fn try_filings_for_ticker(&self, ticker_id: &str) -> Result<Vec<Filing>> {
        let query = ListQuery::new()
            .filter(Filter::eq("ticker", ticker_id))
            .sort("-date");
        self.records
            .full_list(FILINGS, &query)
            .await?
            .into_iter()
            .map(|r| -> Result<Filing> { Ok(serde_json::from_value(r)?) })
            .collect()
    }

    /// Newest first. Empty on failure.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn filings_for_ticker(&self, ticker_id: &str) -> Vec<Filing> {
        self.try_filings_for_ticker(ticker_id).await.unwrap_or_else(|e| {
            warn!("Error fetching filings: {}", e);
            Vec::new()
        })
    }

    /// Filings for any of `ticker_ids`, newest first, with the ticker's
    /// symbol and name attached. No call is made for an empty set.
    pub async fn try_filings_for_tickers(&self, ticker_ids: &[String]) -> Result<Vec<Filing>> {
        let Some(filter) = Filter::any_eq("ticker", ticker_ids) else {
            return Ok(Vec::new());
        };

        let query = ListQuery::new().filter(filter).sort("-date").expand("ticker");
        self.records
            .full_list(FILINGS, &query)
            .await?
            .into_iter()
            .map(|r| -> Result<Filing> {
                Ok(serde_json::from_value::<FilingRecord>(r)?.into_filing())
            })
            .collect()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn filings_for_tickers(&self, ticker_ids: &[String]) -> Vec<Filing> {
        self.try_filings_for_tickers(ticker_ids).await.unwrap_or_else(|e| {
            warn!("Error fetching filings for tickers: {}", e);
            Vec::new()
        })
    }
}
