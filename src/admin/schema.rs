//! Collection definitions: fields, indexes and access rules.
//!
//! Rules are filter expressions over the request context. `None` (null)
//! locks the action to admins, `""` opens it to everyone.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::pocketbase::{FILINGS, TICKERS, USERS, USERS_TICKERS};

pub const PUBLIC: &str = "";
pub const AUTHENTICATED: &str = "@request.auth.id != ''";
pub const OWNER_BY_USER_FIELD: &str = "@request.auth.id = user";
pub const OWNER_BY_ID: &str = "@request.auth.id = id";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub schema: Vec<FieldDef>,
    #[serde(default)]
    pub indexes: Vec<String>,
    pub list_rule: Option<String>,
    pub view_rule: Option<String>,
    pub create_rule: Option<String>,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

fn default_kind() -> String {
    "base".to_string()
}

/// `pb_schema.json` layout: `{"collections": [...]}`
#[derive(Debug, Deserialize)]
struct SchemaFile {
    collections: Vec<CollectionDef>,
}

impl FieldDef {
    pub fn new(name: &str, kind: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            required,
            ..Self::default()
        }
    }

    /// Single relation to `collection`; the name is resolved to an id when applied.
    pub fn relation(name: &str, collection: &str, cascade_delete: bool) -> Self {
        let mut options = Map::new();
        options.insert("collectionId".into(), json!(collection));
        options.insert("maxSelect".into(), json!(1));
        options.insert("cascadeDelete".into(), json!(cascade_delete));
        Self {
            options,
            ..Self::new(name, "relation", true)
        }
    }
}

impl CollectionDef {
    pub fn base(name: &str, schema: Vec<FieldDef>) -> Self {
        Self {
            name: name.to_string(),
            kind: default_kind(),
            schema,
            ..Self::default()
        }
    }

    pub fn with_rules(mut self, read: &str, write: &str) -> Self {
        self.list_rule = Some(read.to_string());
        self.view_rule = Some(read.to_string());
        self.create_rule = Some(write.to_string());
        self.update_rule = Some(write.to_string());
        self.delete_rule = Some(write.to_string());
        self
    }

    pub fn with_index(mut self, index: &str) -> Self {
        self.indexes.push(index.to_string());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.schema.iter().find(|f| f.name == name)
    }

    /// Rewrite relation targets given by collection name into collection ids.
    pub fn resolve_relations(&mut self, ids_by_name: &BTreeMap<String, String>) {
        for field in self.schema.iter_mut().filter(|f| f.kind == "relation") {
            let target = field.options.get("collectionId").and_then(Value::as_str);
            if let Some(id) = target.and_then(|name| ids_by_name.get(name)) {
                field.options.insert("collectionId".into(), json!(id));
            }
        }
    }

    /// The access rules as `(action, rule)` pairs, for reporting.
    pub fn rules(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("list", self.list_rule.as_deref()),
            ("view", self.view_rule.as_deref()),
            ("create", self.create_rule.as_deref()),
            ("update", self.update_rule.as_deref()),
            ("delete", self.delete_rule.as_deref()),
        ]
    }
}

/// Built-in definitions for the application's own collections.
///
/// Order matters: relation targets come before the collections pointing at them.
pub fn default_collections() -> Vec<CollectionDef> {
    vec![
        CollectionDef::base(
            TICKERS,
            vec![
                FieldDef {
                    unique: true,
                    ..FieldDef::new("symbol", "text", true)
                },
                FieldDef::new("name", "text", true),
            ],
        )
        .with_rules(PUBLIC, AUTHENTICATED)
        .with_index("CREATE UNIQUE INDEX idx_tickers_symbol ON tickers (symbol)"),
        CollectionDef::base(
            FILINGS,
            vec![
                FieldDef::relation("ticker", TICKERS, true),
                FieldDef::new("type", "text", true),
                FieldDef::new("date", "date", true),
                FieldDef::new("title", "text", true),
                FieldDef::new("summary", "text", false),
                FieldDef::new("url", "url", false),
            ],
        )
        .with_rules(PUBLIC, AUTHENTICATED)
        .with_index("CREATE INDEX idx_filings_ticker ON filings (ticker)"),
        CollectionDef::base(
            USERS_TICKERS,
            vec![
                FieldDef::relation("user", USERS, true),
                FieldDef::relation("ticker", TICKERS, true),
            ],
        )
        .with_rules(OWNER_BY_USER_FIELD, OWNER_BY_USER_FIELD)
        .with_index("CREATE UNIQUE INDEX idx_users_tickers_pair ON users_tickers (user, ticker)"),
    ]
}

/// Read collection definitions from a `pb_schema.json`-style file.
pub fn load_schema_file(path: &Path) -> Result<Vec<CollectionDef>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {:?}", path))?;
    let file: SchemaFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse schema file {:?}", path))?;
    Ok(file.collections)
}
