//! In-memory record service used by unit tests.
//!
//! Understands the subset of the filter language the crate emits
//! (`field = "v"` clauses joined by `&&` or `||`), single-field sort and
//! single-relation expand.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::admin::schema::CollectionDef;
use crate::error::{ApiErrorBody, FieldError, PbError, Result};
use crate::models::{AuthSession, User};

use super::{CollectionAdmin, Filter, ListQuery, RecordService, USERS};

#[derive(Default)]
struct Inner {
    records: BTreeMap<String, Vec<Value>>,
    collections: BTreeMap<String, CollectionDef>,
    passwords: BTreeMap<String, String>,
    session: Option<AuthSession>,
    failing: HashSet<(String, &'static str)>,
    unavailable: bool,
    next_id: usize,
}

#[derive(Default)]
pub struct MemoryRecords {
    inner: Mutex<Inner>,
    calls: AtomicUsize,
    /// Minimum password length enforced on `users` creation (0 = none).
    pub min_password_len: usize,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_password_len(min_password_len: usize) -> Self {
        Self {
            min_password_len,
            ..Self::default()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Insert a record with a known id.
    pub fn insert(&self, collection: &str, record: Value) {
        self.lock()
            .records
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.lock().records.get(collection).cloned().unwrap_or_default()
    }

    pub fn insert_user(&self, id: &str, email: &str, password: &str) {
        self.insert(USERS, json!({"id": id, "email": email, "name": ""}));
        self.lock().passwords.insert(email.to_string(), password.to_string());
    }

    pub fn insert_collection(&self, collection: CollectionDef) {
        self.lock().collections.insert(collection.name.clone(), collection);
    }

    pub fn collection(&self, name: &str) -> Option<CollectionDef> {
        self.lock().collections.get(name).cloned()
    }

    /// Make `op` (`list`, `first`, `create`, `update`, `delete`, `collection`)
    /// on `collection` fail with an API error.
    pub fn fail(&self, collection: &str, op: &'static str) {
        self.lock().failing.insert((collection.to_string(), op));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn login_as(&self, id: &str) {
        self.lock().session = Some(AuthSession {
            token: format!("token-{}", id),
            user: User {
                id: id.to_string(),
                email: String::new(),
                name: String::new(),
            },
        });
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, collection: &str, op: &'static str) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.lock();
        if inner.unavailable {
            return Err(PbError::Api {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        if inner.failing.contains(&(collection.to_string(), op)) {
            return Err(PbError::Api {
                status: 500,
                message: format!("{} {} failed", op, collection),
            });
        }
        Ok(inner)
    }
}

fn field_str<'a>(record: &'a Value, field: &str) -> &'a str {
    record.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn clause_matches(record: &Value, clause: &str) -> bool {
    let Some((field, value)) = clause.split_once(" = ") else {
        return false;
    };
    let value = value.trim().trim_matches('"').replace("\\\"", "\"");
    field_str(record, field.trim()) == value
}

fn matches(record: &Value, filter: &str) -> bool {
    filter.split(" || ").any(|alt| alt.split(" && ").all(|c| clause_matches(record, c)))
}

fn expand(inner: &Inner, record: &mut Value, relation: &str) {
    let target_id = field_str(record, relation).to_string();
    let target_collection = match relation {
        "ticker" => "tickers",
        "user" => USERS,
        other => other,
    };
    let found = inner
        .records
        .get(target_collection)
        .and_then(|rs| rs.iter().find(|r| field_str(r, "id") == target_id))
        .cloned();

    if let (Some(found), Some(obj)) = (found, record.as_object_mut()) {
        let mut expanded = Map::new();
        expanded.insert(relation.to_string(), found);
        obj.insert("expand".into(), Value::Object(expanded));
    }
}

#[async_trait]
impl RecordService for MemoryRecords {
    async fn full_list(&self, collection: &str, query: &ListQuery) -> Result<Vec<Value>> {
        let inner = self.enter(collection, "list")?;
        let mut out: Vec<Value> = inner
            .records
            .get(collection)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|r| query.filter.as_deref().is_none_or(|f| matches(r, f)))
            .collect();

        if let Some(sort) = &query.sort {
            let (field, desc) = match sort.strip_prefix('-') {
                Some(f) => (f, true),
                None => (sort.as_str(), false),
            };
            out.sort_by(|a, b| field_str(a, field).cmp(field_str(b, field)));
            if desc {
                out.reverse();
            }
        }

        if let Some(relation) = &query.expand {
            for record in out.iter_mut() {
                expand(&inner, record, relation);
            }
        }
        Ok(out)
    }

    async fn first_list_item(&self, collection: &str, filter: &Filter) -> Result<Value> {
        let inner = self.enter(collection, "first")?;
        inner
            .records
            .get(collection)
            .and_then(|rs| rs.iter().find(|r| matches(r, filter.as_str())))
            .cloned()
            .ok_or_else(|| PbError::NotFound(format!("{} {}", collection, filter)))
    }

    async fn create(&self, collection: &str, body: &Value) -> Result<Value> {
        let mut inner = self.enter(collection, "create")?;

        if collection == USERS {
            let password = field_str(body, "password");
            if password.len() < self.min_password_len {
                let mut data = BTreeMap::new();
                data.insert(
                    "password".to_string(),
                    FieldError {
                        code: "validation_length_out_of_range".into(),
                        message: Some(format!(
                            "The length must be between {} and 72.",
                            self.min_password_len
                        )),
                    },
                );
                return Err(PbError::Validation(ApiErrorBody {
                    code: 400,
                    message: "Failed to create record.".into(),
                    data,
                }));
            }
            let email = field_str(body, "email").to_string();
            inner.passwords.insert(email, password.to_string());
        }

        inner.next_id += 1;
        let mut record = body.clone();
        if let Some(obj) = record.as_object_mut() {
            obj.insert("id".into(), json!(format!("rec{}", inner.next_id)));
            obj.remove("password");
            obj.remove("passwordConfirm");
        }
        inner
            .records
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, body: &Value) -> Result<Value> {
        let mut inner = self.enter(collection, "update")?;
        let record = inner
            .records
            .get_mut(collection)
            .and_then(|rs| rs.iter_mut().find(|r| field_str(r, "id") == id))
            .ok_or_else(|| PbError::NotFound(id.to_string()))?;

        if let (Some(dst), Some(src)) = (record.as_object_mut(), body.as_object()) {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut inner = self.enter(collection, "delete")?;
        let records = inner.records.entry(collection.to_string()).or_default();
        let before = records.len();
        records.retain(|r| field_str(r, "id") != id);
        if records.len() == before {
            return Err(PbError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn auth_with_password(
        &self,
        collection: &str,
        identity: &str,
        password: &str,
    ) -> Result<AuthSession> {
        let mut inner = self.enter(collection, "auth")?;
        if inner.passwords.get(identity).map(String::as_str) != Some(password) {
            return Err(PbError::Auth("Failed to authenticate.".into()));
        }
        let user: User = inner
            .records
            .get(collection)
            .and_then(|rs| rs.iter().find(|r| field_str(r, "email") == identity))
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| PbError::Auth("Failed to authenticate.".into()))?;

        let session = AuthSession {
            token: format!("token-{}", user.id),
            user,
        };
        inner.session = Some(session.clone());
        Ok(session)
    }

    fn auth_session(&self) -> Option<AuthSession> {
        self.lock().session.clone()
    }

    fn clear_auth(&self) {
        self.lock().session = None;
    }
}

#[async_trait]
impl CollectionAdmin for MemoryRecords {
    async fn admin_auth_with_password(&self, _email: &str, password: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if password.is_empty() {
            return Err(PbError::Auth("Failed to authenticate.".into()));
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionDef>> {
        let inner = self.enter("_collections", "list")?;
        Ok(inner.collections.values().cloned().collect())
    }

    async fn get_collection(&self, id_or_name: &str) -> Result<CollectionDef> {
        let inner = self.enter(id_or_name, "collection")?;
        inner
            .collections
            .values()
            .find(|c| c.name == id_or_name || c.id.as_deref() == Some(id_or_name))
            .cloned()
            .ok_or_else(|| PbError::NotFound(id_or_name.to_string()))
    }

    async fn create_collection(&self, collection: &CollectionDef) -> Result<CollectionDef> {
        let mut inner = self.enter(&collection.name, "create")?;
        let mut created = collection.clone();
        inner.next_id += 1;
        created.id = Some(format!("col{}", inner.next_id));
        inner.collections.insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn update_collection(&self, id_or_name: &str, patch: &Value) -> Result<CollectionDef> {
        let mut inner = self.enter(id_or_name, "update")?;
        let existing = inner
            .collections
            .values_mut()
            .find(|c| c.name == id_or_name || c.id.as_deref() == Some(id_or_name))
            .ok_or_else(|| PbError::NotFound(id_or_name.to_string()))?;

        let mut merged = serde_json::to_value(&*existing)?;
        if let (Some(dst), Some(src)) = (merged.as_object_mut(), patch.as_object()) {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        *existing = serde_json::from_value(merged)?;
        Ok(existing.clone())
    }
}
