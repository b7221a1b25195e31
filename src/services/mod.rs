//! Access layer over the record service.
//!
//! Each service offers fallible `try_*` calls plus façades that never fail:
//! errors are logged and turned into an empty list, `false` or an
//! `AuthOutcome::Failure`.

pub mod auth;
pub mod filings;
pub mod tickers;

use std::sync::Arc;

use crate::pocketbase::RecordService;

pub use self::auth::{AuthOutcome, AuthService, AuthState};
pub use self::filings::FilingService;
pub use self::tickers::TickerService;

/// The three access-layer services sharing one record service (and session).
#[derive(Clone)]
pub struct Services {
    pub tickers: TickerService,
    pub filings: FilingService,
    pub auth: AuthService,
}

impl Services {
    pub fn new(records: Arc<dyn RecordService>) -> Self {
        Self {
            tickers: TickerService::new(records.clone()),
            filings: FilingService::new(records.clone()),
            auth: AuthService::new(records),
        }
    }
}
