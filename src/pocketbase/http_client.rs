use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::admin::schema::CollectionDef;
use crate::config::PocketBaseConfig;
use crate::error::{PbError, Result};
use crate::models::{AuthSession, User};

use super::{CollectionAdmin, Filter, ListQuery, RecordService};

/// Page size used when walking full lists.
const FULL_LIST_BATCH: usize = 500;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    #[serde(default)]
    total_pages: i64,
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UserAuthResponse {
    token: String,
    record: User,
}

#[derive(Debug, Deserialize)]
struct AdminAuthResponse {
    token: String,
    admin: AdminRecord,
}

#[derive(Debug, Clone, Deserialize)]
struct AdminRecord {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    code: u16,
    #[serde(default)]
    message: String,
}

/// Whoever the client is currently acting as.
#[derive(Debug, Clone)]
enum Principal {
    User(AuthSession),
    Admin { token: String, email: String },
}

impl Principal {
    fn token(&self) -> &str {
        match self {
            Self::User(session) => &session.token,
            Self::Admin { token, .. } => token,
        }
    }
}

/// HTTP client for a PocketBase-style record service.
pub struct PocketBaseClient {
    inner: Client,
    base_url: Url,
    principal: Mutex<Option<Principal>>,
}

impl PocketBaseClient {
    pub fn new(config: &PocketBaseConfig) -> anyhow::Result<Self> {
        let inner = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = Url::parse(&config.url)
            .with_context(|| format!("Invalid record service URL '{}'", config.url))?;

        Ok(Self {
            inner,
            base_url,
            principal: Mutex::new(None),
        })
    }

    /// `{base}/api/{segments...}`
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            path.pop_if_empty().push("api").extend(segments);
        }
        Ok(url)
    }

    fn records_url(&self, collection: &str, query: &ListQuery, page: usize, per_page: usize) -> Result<Url> {
        let mut url = self.endpoint(&["collections", collection, "records"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("perPage", &per_page.to_string());
            if let Some(filter) = &query.filter {
                pairs.append_pair("filter", filter);
            }
            if let Some(sort) = &query.sort {
                pairs.append_pair("sort", sort);
            }
            if let Some(expand) = &query.expand {
                pairs.append_pair("expand", expand);
            }
        }
        Ok(url)
    }

    fn principal(&self) -> Option<Principal> {
        self.principal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_principal(&self, principal: Option<Principal>) {
        *self
            .principal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = principal;
    }

    /// Email of the administrative principal, if one is signed in.
    pub fn admin_email(&self) -> Option<String> {
        match self.principal()? {
            Principal::Admin { email, .. } => Some(email),
            Principal::User(_) => None,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match self.principal() {
            Some(p) => request.header(AUTHORIZATION, p.token()),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!("Record service responded {}", status);
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let preview: String = body.chars().take(MAX_LOG_BODY_CHARS).collect();
        debug!("Record service error {}: {}", status, preview);
        Err(PbError::from_response(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let text = self.send(request).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Ping `/api/health`; returns the service's status message.
    pub async fn health(&self) -> Result<String> {
        let url = self.endpoint(&["health"])?;
        let health: HealthResponse = self.send_json(self.inner.get(url)).await?;
        if health.code != 200 {
            return Err(PbError::Api {
                status: health.code,
                message: health.message,
            });
        }
        Ok(health.message)
    }
}

#[async_trait]
impl RecordService for PocketBaseClient {
    async fn full_list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut page = 1usize;

        loop {
            let url = self.records_url(collection, query, page, FULL_LIST_BATCH)?;
            debug!("GET {}", url);

            let batch: ListPage<Value> = self.send_json(self.inner.get(url)).await?;
            let n = batch.items.len();
            all.extend(batch.items);

            if n < FULL_LIST_BATCH || page as i64 >= batch.total_pages {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    async fn first_list_item(&self, collection: &str, filter: &Filter) -> Result<Value> {
        let query = ListQuery::new().filter(filter.clone());
        let url = self.records_url(collection, &query, 1, 1)?;
        debug!("GET {}", url);

        let page: ListPage<Value> = self.send_json(self.inner.get(url)).await?;
        page.items
            .into_iter()
            .next()
            .ok_or_else(|| PbError::NotFound(format!("no {} record matches {}", collection, filter)))
    }

    async fn create(&self, collection: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(&["collections", collection, "records"])?;
        debug!("POST {}", url);
        self.send_json(self.inner.post(url).json(body)).await
    }

    async fn update(&self, collection: &str, id: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(&["collections", collection, "records", id])?;
        debug!("PATCH {}", url);
        self.send_json(self.inner.patch(url).json(body)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let url = self.endpoint(&["collections", collection, "records", id])?;
        debug!("DELETE {}", url);
        self.send(self.inner.delete(url)).await?;
        Ok(())
    }

    async fn auth_with_password(
        &self,
        collection: &str,
        identity: &str,
        password: &str,
    ) -> Result<AuthSession> {
        let url = self.endpoint(&["collections", collection, "auth-with-password"])?;
        let body = json!({ "identity": identity, "password": password });

        let auth: UserAuthResponse = self
            .send_json(self.inner.post(url).json(&body))
            .await
            .map_err(|e| match e {
                // A plain 400 here means the credentials were rejected.
                PbError::Api { status: 400, message } => PbError::Auth(message),
                other => other,
            })?;

        let session = AuthSession {
            token: auth.token,
            user: auth.record,
        };
        self.set_principal(Some(Principal::User(session.clone())));
        Ok(session)
    }

    fn auth_session(&self) -> Option<AuthSession> {
        match self.principal()? {
            Principal::User(session) if !session.token.is_empty() => Some(session),
            _ => None,
        }
    }

    fn clear_auth(&self) {
        self.set_principal(None);
    }
}

#[async_trait]
impl CollectionAdmin for PocketBaseClient {
    async fn admin_auth_with_password(&self, email: &str, password: &str) -> Result<()> {
        let url = self.endpoint(&["admins", "auth-with-password"])?;
        let body = json!({ "identity": email, "password": password });

        let auth: AdminAuthResponse = self
            .send_json(self.inner.post(url).json(&body))
            .await
            .map_err(|e| match e {
                PbError::Api { status: 400, message } => PbError::Auth(message),
                other => other,
            })?;

        self.set_principal(Some(Principal::Admin {
            token: auth.token,
            email: auth.admin.email,
        }));
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionDef>> {
        let mut all = Vec::new();
        let mut page = 1usize;

        loop {
            let mut url = self.endpoint(&["collections"])?;
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("perPage", &FULL_LIST_BATCH.to_string());

            let batch: ListPage<CollectionDef> = self.send_json(self.inner.get(url)).await?;
            let n = batch.items.len();
            all.extend(batch.items);

            if n < FULL_LIST_BATCH || page as i64 >= batch.total_pages {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    async fn get_collection(&self, id_or_name: &str) -> Result<CollectionDef> {
        let url = self.endpoint(&["collections", id_or_name])?;
        self.send_json(self.inner.get(url)).await
    }

    async fn create_collection(&self, collection: &CollectionDef) -> Result<CollectionDef> {
        let url = self.endpoint(&["collections"])?;
        self.send_json(self.inner.post(url).json(collection)).await
    }

    async fn update_collection(&self, id_or_name: &str, patch: &Value) -> Result<CollectionDef> {
        let url = self.endpoint(&["collections", id_or_name])?;
        self.send_json(self.inner.patch(url).json(patch)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> PocketBaseClient {
        let config = PocketBaseConfig {
            url: url.to_string(),
            ..PocketBaseConfig::default()
        };
        PocketBaseClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_paths() {
        let pb = client("http://127.0.0.1:8090");
        assert_eq!(
            pb.endpoint(&["collections", "tickers", "records"]).unwrap().as_str(),
            "http://127.0.0.1:8090/api/collections/tickers/records"
        );

        let nested = client("https://example.com/pb/");
        assert_eq!(
            nested.endpoint(&["health"]).unwrap().as_str(),
            "https://example.com/pb/api/health"
        );
    }

    #[test]
    fn test_records_url_encodes_query() {
        let pb = client("http://127.0.0.1:8090");
        let query = ListQuery::new()
            .filter(Filter::eq("user", "u1"))
            .sort("-date")
            .expand("ticker");
        let url = pb.records_url("users_tickers", &query, 2, 500).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("page".to_string(), "2".to_string()));
        assert_eq!(pairs[1], ("perPage".to_string(), "500".to_string()));
        assert_eq!(pairs[2], ("filter".to_string(), r#"user = "u1""#.to_string()));
        assert_eq!(pairs[3], ("sort".to_string(), "-date".to_string()));
        assert_eq!(pairs[4], ("expand".to_string(), "ticker".to_string()));
    }

    #[test]
    fn test_session_starts_anonymous() {
        let pb = client("http://127.0.0.1:8090");
        assert!(pb.auth_session().is_none());
        assert!(pb.admin_email().is_none());

        pb.set_principal(Some(Principal::Admin {
            token: "tok".into(),
            email: "admin@tickersage.com".into(),
        }));
        assert!(pb.auth_session().is_none());
        assert_eq!(pb.admin_email().as_deref(), Some("admin@tickersage.com"));

        pb.clear_auth();
        assert!(pb.admin_email().is_none());
    }
}
