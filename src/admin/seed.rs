//! Sample tickers and filings for a fresh record service.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::models::{NewFiling, Ticker};
use crate::pocketbase::{FILINGS, Filter, ListQuery, RecordService, TICKERS};
use crate::store::mock;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SeedTicker {
    pub symbol: String,
    pub name: String,
}

/// A filing keyed by ticker symbol; linked to the ticker id at seed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFiling {
    pub symbol: String,
    pub filing_type: String,
    pub date: NaiveDate,
    pub title: String,
    pub summary: String,
    pub url: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedStats {
    pub tickers_created: usize,
    pub tickers_existing: usize,
    pub filings_created: usize,
    pub errors: usize,
}

pub fn default_tickers() -> Vec<SeedTicker> {
    mock::TICKERS
        .iter()
        .chain([("V", "Visa Inc."), ("WMT", "Walmart Inc.")].iter())
        .map(|(symbol, name)| SeedTicker {
            symbol: symbol.to_string(),
            name: name.to_string(),
        })
        .collect()
}

/// The bundled sample filings, keyed by symbol.
pub fn default_filings() -> Vec<SeedFiling> {
    mock::FILINGS
        .iter()
        .map(|f| SeedFiling {
            symbol: f.symbol.to_string(),
            filing_type: f.kind.to_string(),
            date: f.date(),
            title: f.title.to_string(),
            summary: f.summary.to_string(),
            url: f.url.to_string(),
        })
        .collect()
}

/// Find the ticker with `symbol`, creating it when absent and renaming it when
/// the stored name differs. Returns the record id and whether it was created.
async fn upsert_ticker(records: &dyn RecordService, ticker: &SeedTicker) -> crate::error::Result<(String, bool)> {
    let query = ListQuery::new().filter(Filter::eq("symbol", &ticker.symbol));
    let existing = records.full_list(TICKERS, &query).await?;

    if let Some(record) = existing.into_iter().next() {
        let found: Ticker = serde_json::from_value(record)?;
        if found.name != ticker.name {
            records
                .update(TICKERS, &found.id, &json!({ "name": ticker.name }))
                .await?;
            info!("Renamed ticker {}: {:?} → {:?}", ticker.symbol, found.name, ticker.name);
        }
        return Ok((found.id, false));
    }

    let created = records
        .create(TICKERS, &json!({ "symbol": ticker.symbol, "name": ticker.name }))
        .await?;
    let created: Ticker = serde_json::from_value(created)?;
    Ok((created.id, true))
}

/// Seed tickers, then filings linked to them. Individual failures are logged
/// and counted; the run keeps going.
pub async fn seed(records: &dyn RecordService, tickers: &[SeedTicker], filings: &[SeedFiling]) -> SeedStats {
    let mut stats = SeedStats::default();
    let mut ids: BTreeMap<String, String> = BTreeMap::new();

    info!("Seeding {} tickers…", tickers.len());
    for ticker in tickers {
        match upsert_ticker(records, ticker).await {
            Ok((id, true)) => {
                info!("Created ticker: {}", ticker.symbol);
                stats.tickers_created += 1;
                ids.insert(ticker.symbol.clone(), id);
            }
            Ok((id, false)) => {
                info!("Ticker {} already exists, using existing record", ticker.symbol);
                stats.tickers_existing += 1;
                ids.insert(ticker.symbol.clone(), id);
            }
            Err(e) => {
                warn!("Error creating ticker {}: {}", ticker.symbol, e);
                stats.errors += 1;
            }
        }
    }

    info!("Seeding {} filings…", filings.len());
    for filing in filings {
        let Some(ticker_id) = ids.get(&filing.symbol) else {
            warn!("Skipping filing '{}': unknown ticker {}", filing.title, filing.symbol);
            stats.errors += 1;
            continue;
        };

        let body = NewFiling {
            ticker: ticker_id.clone(),
            filing_type: filing.filing_type.clone(),
            date: filing.date,
            title: filing.title.clone(),
            summary: filing.summary.clone(),
            url: filing.url.clone(),
        };

        let created = match serde_json::to_value(&body) {
            Ok(value) => records.create(FILINGS, &value).await,
            Err(e) => Err(e.into()),
        };
        match created {
            Ok(_) => {
                info!("Created filing: {} for {}", filing.title, filing.symbol);
                stats.filings_created += 1;
            }
            Err(e) => {
                warn!("Error creating filing {}: {}", filing.title, e);
                stats.errors += 1;
            }
        }
    }

    stats
}
