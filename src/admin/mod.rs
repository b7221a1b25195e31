//! Provisioning against the record service as the administrative principal.
//!
//! ## Commands
//!
//! `apply_schema`: create-or-update each collection definition. A
//!   `NotFound` from the lookup means create; anything else found is updated
//!   in place. One bad collection does not stop the others.
//!
//! `setup_users`: open self-registration on `users` and add the `name` field.
//!
//! `check_schema`: fetch `users` for inspection.

pub mod schema;
pub mod seed;

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::AdminConfig;
use crate::pocketbase::{CollectionAdmin, USERS};

use self::schema::{CollectionDef, FieldDef, OWNER_BY_ID, PUBLIC};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub errors: usize,
}

/// Sign in as the configured admin.
pub async fn authenticate(admin: &dyn CollectionAdmin, config: &AdminConfig) -> Result<()> {
    let password = config.require_password()?;
    info!("Authenticating as admin {}", config.email);
    admin
        .admin_auth_with_password(&config.email, password)
        .await
        .with_context(|| format!("Admin authentication failed for {}", config.email))?;
    info!("Successfully authenticated as admin");
    Ok(())
}

async fn apply_one(admin: &dyn CollectionAdmin, collection: &CollectionDef) -> Result<bool> {
    match admin.get_collection(&collection.name).await {
        Ok(existing) => {
            info!("Collection {} already exists, updating…", collection.name);
            let target = existing.id.as_deref().unwrap_or(&collection.name);
            let mut patch = serde_json::to_value(collection)?;
            if let Some(obj) = patch.as_object_mut() {
                obj.remove("id");
            }
            admin.update_collection(target, &patch).await?;
            Ok(false)
        }
        Err(e) if e.is_not_found() => {
            info!("Creating collection {}…", collection.name);
            admin.create_collection(collection).await?;
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

/// Create or update every collection, in order.
pub async fn apply_schema(admin: &dyn CollectionAdmin, collections: &[CollectionDef]) -> Result<ApplyStats> {
    let mut ids: BTreeMap<String, String> = admin
        .list_collections()
        .await
        .context("Failed to list collections")?
        .into_iter()
        .filter_map(|c| c.id.map(|id| (c.name, id)))
        .collect();

    let mut stats = ApplyStats::default();

    for collection in collections {
        let mut collection = collection.clone();
        collection.resolve_relations(&ids);

        match apply_one(admin, &collection).await {
            Ok(created) => {
                if created {
                    stats.created += 1;
                } else {
                    stats.updated += 1;
                }
                // later collections may point at this one
                if let Ok(CollectionDef { id: Some(id), .. }) =
                    admin.get_collection(&collection.name).await
                {
                    ids.insert(collection.name.clone(), id);
                }
                info!("Collection {} processed successfully", collection.name);
            }
            Err(e) => {
                warn!("Error processing collection {}: {:#}", collection.name, e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

/// Allow self-registration with email + password and make sure `users` has a
/// `name` field. Returns the updated collection.
pub async fn setup_users(admin: &dyn CollectionAdmin) -> Result<CollectionDef> {
    let users = find_users(admin).await?;
    info!("Found users collection: {}", users.id.as_deref().unwrap_or("?"));

    let mut schema = users.schema.clone();
    if users.field("name").is_none() {
        info!("Adding name field to users collection");
        schema.push(FieldDef::new("name", "text", false));
    } else {
        info!("Name field already exists in users collection");
    }

    let mut options = users.options.clone();
    options.insert("allowEmailAuth".into(), json!(true));
    options.insert("allowOAuth2Auth".into(), json!(false));
    options.insert("allowUsernameAuth".into(), json!(false));
    options.insert("requireEmail".into(), json!(true));
    options.insert("minPasswordLength".into(), json!(8));

    let patch = json!({
        "schema": schema,
        "listRule": PUBLIC,
        "viewRule": PUBLIC,
        "createRule": PUBLIC,
        "updateRule": OWNER_BY_ID,
        "deleteRule": OWNER_BY_ID,
        "options": Value::Object(options),
    });

    let target = users.id.as_deref().unwrap_or(USERS);
    let updated = admin
        .update_collection(target, &patch)
        .await
        .context("Failed to update users collection")?;
    info!("Users collection configured successfully");
    Ok(updated)
}

/// Fetch the `users` collection for inspection.
pub async fn check_schema(admin: &dyn CollectionAdmin) -> Result<CollectionDef> {
    find_users(admin).await
}

async fn find_users(admin: &dyn CollectionAdmin) -> Result<CollectionDef> {
    let collections = admin
        .list_collections()
        .await
        .context("Failed to list collections")?;
    info!("Found {} collections", collections.len());

    let available: Vec<String> = collections.iter().map(|c| c.name.clone()).collect();
    collections
        .into_iter()
        .find(|c| c.name == USERS)
        .ok_or_else(|| anyhow!("Users collection not found. Available: {}", available.join(", ")))
}

/// Human-readable summary of a collection's rules and fields.
pub fn describe_collection(collection: &CollectionDef) -> Vec<String> {
    let mut lines = vec![
        format!("ID   : {}", collection.id.as_deref().unwrap_or("—")),
        format!("Name : {}", collection.name),
        format!("Type : {}", collection.kind),
        String::new(),
        "Permissions:".to_string(),
    ];

    for (action, rule) in collection.rules() {
        let shown = match rule {
            None => "(admins only)".to_string(),
            Some("") => "(empty)".to_string(),
            Some(r) => r.to_string(),
        };
        lines.push(format!("  - {:<6}: {}", action, shown));
    }

    lines.push(String::new());
    lines.push("Fields:".to_string());
    if collection.schema.is_empty() {
        lines.push("  No schema fields found".to_string());
    }
    for field in &collection.schema {
        lines.push(format!(
            "  - {} ({}){}",
            field.name,
            field.kind,
            if field.required { " required" } else { "" }
        ));
    }
    lines
}
