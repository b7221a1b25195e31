pub mod filter;
pub mod http_client;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::admin::schema::CollectionDef;
use crate::error::Result;
use crate::models::AuthSession;

pub use self::filter::Filter;
pub use self::http_client::PocketBaseClient;

// ── Collections ───────────────────────────────────────────────────────────────

pub const TICKERS: &str = "tickers";
pub const FILINGS: &str = "filings";
pub const USERS_TICKERS: &str = "users_tickers";
pub const USERS: &str = "users";

// ── Queries ───────────────────────────────────────────────────────────────────

/// List/filter parameters: `filter`, `sort` (`-` prefix for descending), `expand`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub expand: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn sort(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }

    pub fn expand(mut self, relation: &str) -> Self {
        self.expand = Some(relation.to_string());
        self
    }
}

// ── Record service trait ──────────────────────────────────────────────────────

/// Remote record store over named collections.
///
/// Records are untyped JSON; the access layer maps them onto models. The
/// implementation owns the auth session and attaches it to every call.
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Every record matching `query`, across all pages.
    async fn full_list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Value>>;

    /// First record matching `filter`; `PbError::NotFound` when none does.
    async fn first_list_item(&self, collection: &str, filter: &Filter) -> Result<Value>;

    async fn create(&self, collection: &str, body: &Value) -> Result<Value>;

    async fn update(&self, collection: &str, id: &str, body: &Value) -> Result<Value>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Authenticate a record of an auth collection and keep the session.
    async fn auth_with_password(
        &self,
        collection: &str,
        identity: &str,
        password: &str,
    ) -> Result<AuthSession>;

    fn auth_session(&self) -> Option<AuthSession>;

    fn clear_auth(&self);
}

/// Collection management, available to the administrative principal only.
#[async_trait]
pub trait CollectionAdmin: Send + Sync {
    async fn admin_auth_with_password(&self, email: &str, password: &str) -> Result<()>;

    async fn list_collections(&self) -> Result<Vec<CollectionDef>>;

    async fn get_collection(&self, id_or_name: &str) -> Result<CollectionDef>;

    async fn create_collection(&self, collection: &CollectionDef) -> Result<CollectionDef>;

    /// Partial update; only the keys present in `patch` change.
    async fn update_collection(&self, id_or_name: &str, patch: &Value) -> Result<CollectionDef>;
}
