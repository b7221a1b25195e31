//! Reactive watchlist state.
//!
//! State lives in a `watch` channel: every action mutates it through the
//! sender, so subscribers are notified on the same task as the mutation, and
//! each action hands back the resulting snapshot.
//!
//! Add and remove are optimistic: the local change is applied first and
//! reverted if the record service rejects it. Overlapping add/remove calls for
//! the same ticker are not sequenced against each other, so a rollback may
//! undo a change made by a later call.

pub mod mock;

use std::collections::BTreeMap;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{PbError, Result};
use crate::models::{Filing, Ticker};
use crate::services::Services;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchlistState {
    pub selected_tickers: Vec<Ticker>,
    pub available_tickers: Vec<Ticker>,
    /// Filings keyed by ticker id.
    pub filings: BTreeMap<String, Vec<Filing>>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub use_mock_data: bool,
    /// The selection is the bundled placeholder shown for an empty
    /// watchlist, not the user's own rows.
    pub sample_watchlist: bool,
}

impl WatchlistState {
    pub fn is_selected(&self, ticker_id: &str) -> bool {
        self.selected_tickers.iter().any(|t| t.id == ticker_id)
    }

    pub fn data_source(&self) -> DataSource {
        if self.use_mock_data {
            DataSource::Mock
        } else {
            DataSource::Remote
        }
    }

    fn symbol_of<'a>(&'a self, ticker_id: &'a str) -> &'a str {
        self.selected_tickers
            .iter()
            .chain(self.available_tickers.iter())
            .find(|t| t.id == ticker_id)
            .map(|t| t.symbol.as_str())
            .unwrap_or(ticker_id)
    }

    /// Select the bundled sample watchlist and its filings.
    fn show_sample_watchlist(&mut self) {
        self.selected_tickers = mock::default_watchlist();
        self.filings = self
            .selected_tickers
            .iter()
            .map(|t| (t.id.clone(), sample_filings(&t.id, &t.symbol)))
            .collect();
    }
}

/// Where the store reads its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Remote,
    Mock,
}

/// Sample filings for `symbol`, re-keyed to `ticker_id`.
fn sample_filings(ticker_id: &str, symbol: &str) -> Vec<Filing> {
    mock::filings_for_symbol(symbol)
        .into_iter()
        .map(|mut f| {
            f.ticker = ticker_id.to_string();
            f
        })
        .collect()
}

pub struct WatchlistStore {
    services: Services,
    mock_fallback: bool,
    state: watch::Sender<WatchlistState>,
}

impl WatchlistStore {
    pub fn new(services: Services, config: &StoreConfig) -> Self {
        let (state, _) = watch::channel(WatchlistState::default());
        Self {
            services,
            mock_fallback: config.mock_fallback,
            state,
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn subscribe(&self) -> watch::Receiver<WatchlistState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> WatchlistState {
        self.state.borrow().clone()
    }

    pub fn data_source(&self) -> DataSource {
        self.state.borrow().data_source()
    }

    fn update(&self, f: impl FnOnce(&mut WatchlistState)) -> WatchlistState {
        self.state.send_modify(f);
        self.snapshot()
    }

    fn signed_in_user(&self) -> Result<String> {
        self.services
            .auth
            .current_user()
            .map(|u| u.id)
            .ok_or_else(|| PbError::Auth("Not signed in".into()))
    }

    /// Load the ticker catalogue and, with a session, the user's watchlist.
    pub async fn init(&self) -> WatchlistState {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });

        match self.services.tickers.try_available_tickers().await {
            Ok(tickers) if !tickers.is_empty() => {
                info!("Loaded {} tickers", tickers.len());
                self.update(|s| s.available_tickers = tickers);
            }
            Ok(_) if !self.mock_fallback => {
                info!("Ticker collection is empty");
            }
            Err(e) if !self.mock_fallback => {
                warn!("Error loading tickers: {}", e);
                self.update(|s| s.error = Some("Failed to load tickers".into()));
            }
            result => {
                match result {
                    Err(e) => self.log_fallback("tickers", &e),
                    Ok(_) => info!("No tickers available, using sample data"),
                }
                self.update(|s| {
                    s.use_mock_data = true;
                    s.available_tickers = mock::tickers();
                });
            }
        }

        if let Some(user) = self.services.auth.current_user() {
            self.load_watchlist(&user.id).await;
        }

        self.update(|s| s.is_loading = false)
    }

    async fn load_watchlist(&self, user_id: &str) {
        if self.data_source() == DataSource::Mock {
            self.update(WatchlistState::show_sample_watchlist);
            return;
        }

        match self.services.tickers.try_user_tickers(Some(user_id)).await {
            Ok(tickers) if !tickers.is_empty() => {
                let ids: Vec<String> = tickers.iter().map(|t| t.id.clone()).collect();
                self.update(|s| s.selected_tickers = tickers);
                self.fetch_filings_for_tickers(&ids).await;
            }
            Ok(_) if self.mock_fallback => {
                // still remote: the first add replaces the placeholder
                info!("Watchlist for {} is empty, showing sample watchlist", user_id);
                self.update(|s| {
                    s.show_sample_watchlist();
                    s.sample_watchlist = true;
                });
            }
            Ok(_) => debug!("Watchlist for {} is empty", user_id),
            Err(e) if self.mock_fallback => {
                self.log_fallback("watchlist", &e);
                self.update(|s| {
                    s.use_mock_data = true;
                    s.show_sample_watchlist();
                });
            }
            Err(e) => {
                warn!("Error loading watchlist: {}", e);
                self.update(|s| s.error = Some("Failed to load your watchlist".into()));
            }
        }
    }

    fn log_fallback(&self, what: &str, e: &PbError) {
        if e.is_unavailable() {
            warn!("Record service unavailable while loading {}, using sample data: {}", what, e);
        } else {
            warn!("Error loading {}, using sample data: {}", what, e);
        }
    }

    fn sample_filings_for(&self, ticker_ids: &[String]) -> BTreeMap<String, Vec<Filing>> {
        let state = self.state.borrow();
        ticker_ids
            .iter()
            .map(|id| (id.clone(), sample_filings(id, state.symbol_of(id))))
            .collect()
    }

    /// Fetch filings for `ticker_ids`, merge them into state and return them
    /// grouped by ticker id. Every requested id gets a key.
    pub async fn fetch_filings_for_tickers(&self, ticker_ids: &[String]) -> BTreeMap<String, Vec<Filing>> {
        if ticker_ids.is_empty() {
            return BTreeMap::new();
        }

        let grouped = if self.data_source() == DataSource::Mock {
            self.sample_filings_for(ticker_ids)
        } else {
            match self.services.filings.try_filings_for_tickers(ticker_ids).await {
                Ok(filings) => {
                    let mut grouped: BTreeMap<String, Vec<Filing>> =
                        ticker_ids.iter().map(|id| (id.clone(), Vec::new())).collect();
                    for filing in filings {
                        if let Some(bucket) = grouped.get_mut(&filing.ticker) {
                            bucket.push(filing);
                        }
                    }
                    grouped
                }
                Err(e) if self.mock_fallback => {
                    self.log_fallback("filings", &e);
                    self.update(|s| s.use_mock_data = true);
                    self.sample_filings_for(ticker_ids)
                }
                Err(e) => {
                    warn!("Error fetching filings: {}", e);
                    self.update(|s| s.error = Some("Failed to load filings".into()));
                    return BTreeMap::new();
                }
            }
        };

        let merged = grouped.clone();
        self.update(|s| s.filings.extend(merged));
        grouped
    }

    /// Append `ticker` to the watchlist and persist it. Already-selected
    /// tickers are left alone. In remote mode a sample placeholder selection
    /// is replaced, and restored if the add fails.
    pub async fn add_ticker(&self, ticker: Ticker) -> WatchlistState {
        let remote = self.data_source() == DataSource::Remote;
        let mut placeholder = None;
        let appended = self.state.send_if_modified(|s| {
            if s.is_selected(&ticker.id) {
                return false;
            }
            if remote && s.sample_watchlist {
                placeholder = Some((
                    std::mem::take(&mut s.selected_tickers),
                    std::mem::take(&mut s.filings),
                ));
                s.sample_watchlist = false;
            }
            s.selected_tickers.push(ticker.clone());
            true
        });
        if !appended {
            debug!("{} is already on the watchlist", ticker.symbol);
            return self.snapshot();
        }

        if self.data_source() == DataSource::Mock {
            let filings = sample_filings(&ticker.id, &ticker.symbol);
            return self.update(|s| {
                s.filings.insert(ticker.id.clone(), filings);
            });
        }

        let persisted = match self.signed_in_user() {
            Ok(user_id) => self.services.tickers.try_add_user_ticker(&user_id, &ticker.id).await,
            Err(e) => Err(e),
        };

        match persisted {
            Ok(()) => {
                info!("Added {} to watchlist", ticker.symbol);
                self.fetch_filings_for_tickers(std::slice::from_ref(&ticker.id)).await;
                self.snapshot()
            }
            Err(e) => {
                warn!("Error adding {}: {}", ticker.symbol, e);
                self.update(|s| {
                    s.selected_tickers.retain(|t| t.id != ticker.id);
                    s.filings.remove(&ticker.id);
                    if let Some((tickers, filings)) = placeholder {
                        if s.selected_tickers.is_empty() {
                            s.selected_tickers = tickers;
                            s.filings = filings;
                            s.sample_watchlist = true;
                        }
                    }
                    s.error = Some(format!("Failed to add {} to your watchlist", ticker.symbol));
                })
            }
        }
    }

    /// Drop `ticker_id` from the watchlist and persist the removal. On failure
    /// the ticker and its filings go back where they were.
    pub async fn remove_ticker(&self, ticker_id: &str) -> WatchlistState {
        let mut removed = None;
        let mut placeholder = false;
        self.state.send_if_modified(|s| {
            let Some(index) = s.selected_tickers.iter().position(|t| t.id == ticker_id) else {
                return false;
            };
            let ticker = s.selected_tickers.remove(index);
            let filings = s.filings.remove(ticker_id);
            removed = Some((index, ticker, filings));
            placeholder = s.sample_watchlist;
            true
        });
        let Some((index, ticker, filings)) = removed else {
            debug!("{} is not on the watchlist", ticker_id);
            return self.snapshot();
        };

        // sample rows were never persisted
        if self.data_source() == DataSource::Mock || placeholder {
            return self.snapshot();
        }

        let persisted = match self.signed_in_user() {
            Ok(user_id) => self.services.tickers.try_remove_user_ticker(&user_id, ticker_id).await,
            Err(e) => Err(e),
        };

        match persisted {
            Ok(()) => {
                info!("Removed {} from watchlist", ticker.symbol);
                self.snapshot()
            }
            Err(e) => {
                warn!("Error removing {}: {}", ticker.symbol, e);
                self.update(move |s| {
                    s.error = Some(format!("Failed to remove {} from your watchlist", ticker.symbol));
                    if let Some(filings) = filings {
                        s.filings.insert(ticker.id.clone(), filings);
                    }
                    if !s.is_selected(&ticker.id) {
                        let at = index.min(s.selected_tickers.len());
                        s.selected_tickers.insert(at, ticker);
                    }
                })
            }
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn reset(&self) -> WatchlistState {
        self.update(|s| *s = WatchlistState::default())
    }
}
