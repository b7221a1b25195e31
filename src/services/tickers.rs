use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Ticker, WatchlistEntry};
use crate::pocketbase::{Filter, ListQuery, RecordService, TICKERS, USERS_TICKERS};

/// Ticker catalogue and per-user watchlist rows.
#[derive(Clone)]
pub struct TickerService {
    records: Arc<dyn RecordService>,
}

/// `None` and `""` both mean "no user".
fn present(user_id: Option<&str>) -> Option<&str> {
    user_id.filter(|id| !id.is_empty())
}

fn decode<T: serde::de::DeserializeOwned>(records: Vec<Value>) -> Result<Vec<T>> {
    Ok(records
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<_, _>>()?)
}

impl TickerService {
    pub fn new(records: Arc<dyn RecordService>) -> Self {
        Self { records }
    }

    pub async fn try_available_tickers(&self) -> Result<Vec<Ticker>> {
        let query = ListQuery::new().sort("symbol");
        let mut tickers: Vec<Ticker> = decode(self.records.full_list(TICKERS, &query).await?)?;
        // the service sorts by collation; keep byte order regardless
        tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(tickers)
    }

    /// All tickers, ascending by symbol. Empty on failure.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn available_tickers(&self) -> Vec<Ticker> {
        self.try_available_tickers().await.unwrap_or_else(|e| {
            warn!("Error fetching tickers: {}", e);
            Vec::new()
        })
    }

    pub async fn try_user_tickers(&self, user_id: Option<&str>) -> Result<Vec<Ticker>> {
        let Some(user_id) = present(user_id) else {
            return Ok(Vec::new());
        };

        let query = ListQuery::new()
            .filter(Filter::eq("user", user_id))
            .expand("ticker");
        let entries: Vec<WatchlistEntry> = decode(self.records.full_list(USERS_TICKERS, &query).await?)?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let ticker = entry.expand.and_then(|e| e.ticker);
                if ticker.is_none() {
                    debug!("Watchlist entry {} has no resolvable ticker", entry.id);
                }
                ticker
            })
            .collect())
    }

    /// Tickers on `user_id`'s watchlist. Empty for no user or on failure.
    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn user_tickers(&self, user_id: Option<&str>) -> Vec<Ticker> {
        self.try_user_tickers(user_id).await.unwrap_or_else(|e| {
            warn!("Error fetching user tickers: {}", e);
            Vec::new()
        })
    }

    fn entry_filter(user_id: &str, ticker_id: &str) -> Filter {
        Filter::eq("user", user_id).and(Filter::eq("ticker", ticker_id))
    }

    /// Create the watchlist row unless one already exists for the pair.
    pub async fn try_add_user_ticker(&self, user_id: &str, ticker_id: &str) -> Result<()> {
        match self
            .records
            .first_list_item(USERS_TICKERS, &Self::entry_filter(user_id, ticker_id))
            .await
        {
            Ok(_) => {
                debug!("{} already watches {}", user_id, ticker_id);
                return Ok(());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.records
            .create(USERS_TICKERS, &json!({ "user": user_id, "ticker": ticker_id }))
            .await?;
        Ok(())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn add_user_ticker(&self, user_id: Option<&str>, ticker_id: &str) -> bool {
        let Some(user_id) = present(user_id) else {
            return false;
        };
        match self.try_add_user_ticker(user_id, ticker_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error adding user ticker: {}", e);
                false
            }
        }
    }

    pub async fn try_remove_user_ticker(&self, user_id: &str, ticker_id: &str) -> Result<()> {
        let record = self
            .records
            .first_list_item(USERS_TICKERS, &Self::entry_filter(user_id, ticker_id))
            .await?;
        let entry: WatchlistEntry = serde_json::from_value(record)?;
        self.records.delete(USERS_TICKERS, &entry.id).await
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub async fn remove_user_ticker(&self, user_id: Option<&str>, ticker_id: &str) -> bool {
        let Some(user_id) = present(user_id) else {
            return false;
        };
        match self.try_remove_user_ticker(user_id, ticker_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error removing user ticker: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pocketbase::memory::MemoryRecords;

    fn seeded() -> Arc<MemoryRecords> {
        let pb = MemoryRecords::new();
        pb.insert(TICKERS, json!({"id": "t3", "symbol": "TSLA", "name": "Tesla, Inc."}));
        pb.insert(TICKERS, json!({"id": "t1", "symbol": "AAPL", "name": "Apple Inc."}));
        pb.insert(TICKERS, json!({"id": "t2", "symbol": "MSFT", "name": "Microsoft Corporation"}));
        Arc::new(pb)
    }

    #[tokio::test]
    async fn test_available_tickers_sorted_by_symbol() {
        let svc = TickerService::new(seeded());
        let symbols: Vec<String> = svc.available_tickers().await.into_iter().map(|t| t.symbol).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "TSLA"]);
    }

    #[tokio::test]
    async fn test_available_tickers_empty_on_failure() {
        let pb = seeded();
        pb.fail(TICKERS, "list");
        let svc = TickerService::new(pb);
        assert!(svc.available_tickers().await.is_empty());
    }

    #[tokio::test]
    async fn test_user_tickers_without_user_makes_no_call() {
        let pb = seeded();
        let svc = TickerService::new(pb.clone());
        assert!(svc.user_tickers(None).await.is_empty());
        assert!(svc.user_tickers(Some("")).await.is_empty());
        assert_eq!(pb.call_count(), 0);
    }

    #[tokio::test]
    async fn test_user_tickers_drops_unresolved_entries() {
        let pb = seeded();
        pb.insert(USERS_TICKERS, json!({"id": "w1", "user": "u1", "ticker": "t2"}));
        pb.insert(USERS_TICKERS, json!({"id": "w2", "user": "u1", "ticker": "gone"}));
        pb.insert(USERS_TICKERS, json!({"id": "w3", "user": "u2", "ticker": "t1"}));

        let svc = TickerService::new(pb);
        let tickers = svc.user_tickers(Some("u1")).await;
        assert_eq!(tickers, vec![Ticker::new("t2", "MSFT", "Microsoft Corporation")]);
    }

    #[tokio::test]
    async fn test_add_is_idempotent_per_pair() {
        let pb = seeded();
        let svc = TickerService::new(pb.clone());

        assert!(svc.add_user_ticker(Some("u1"), "t1").await);
        assert!(svc.add_user_ticker(Some("u1"), "t1").await);
        assert_eq!(pb.records(USERS_TICKERS).len(), 1);

        assert!(!svc.add_user_ticker(None, "t1").await);
    }

    #[tokio::test]
    async fn test_remove_user_ticker() {
        let pb = seeded();
        pb.insert(USERS_TICKERS, json!({"id": "w1", "user": "u1", "ticker": "t1"}));
        let svc = TickerService::new(pb.clone());

        assert!(svc.remove_user_ticker(Some("u1"), "t1").await);
        assert!(pb.records(USERS_TICKERS).is_empty());

        // nothing left to remove
        assert!(!svc.remove_user_ticker(Some("u1"), "t1").await);
    }

    #[tokio::test]
    async fn test_add_reports_failure() {
        let pb = seeded();
        pb.fail(USERS_TICKERS, "create");
        let svc = TickerService::new(pb);
        assert!(!svc.add_user_ticker(Some("u1"), "t1").await);
    }
}
