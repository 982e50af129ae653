//! Shared type definitions for the database layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::CrmDb;
use crate::merge;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),
}

/// Extensibility hook invoked on the surviving account after attributes are
/// copied and before the duplicate is deleted. An `Err` aborts the merge and
/// rolls the transaction back.
pub type AccountMergeHook<'a> = &'a dyn Fn(&CrmDb, &DbAccount, &DbAccount) -> Result<(), String>;

/// Contact counterpart of [`AccountMergeHook`].
pub type ContactMergeHook<'a> = &'a dyn Fn(&CrmDb, &DbContact, &DbContact) -> Result<(), String>;

/// A row from the `accounts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbAccount {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub toll_free_phone: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
    pub rating: Option<i32>,
    pub access: Option<String>,
    pub assigned_to: Option<String>,
    pub background_info: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// JSON object of preset-driven custom fields.
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DbAccount {
    /// A fresh account with a generated id and current timestamps.
    pub fn new(name: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: None,
            phone: None,
            fax: None,
            toll_free_phone: None,
            website: None,
            category: None,
            rating: None,
            access: None,
            assigned_to: None,
            background_info: None,
            tags: Vec::new(),
            metadata: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Attribute names that never participate in a merge.
    pub fn ignored_merge_attributes() -> &'static [&'static str] {
        merge::ACCOUNT_IGNORED_ATTRIBUTES
    }

    /// The attributes a merge considers: everything except the permanent
    /// ignore list.
    pub fn merge_attributes(&self) -> Map<String, Value> {
        let mut attrs = merge::attribute_map(self);
        for ignored in Self::ignored_merge_attributes() {
            attrs.remove(*ignored);
        }
        attrs
    }

    /// Accounts must carry a name.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("account name must not be blank".to_string());
        }
        Ok(())
    }
}

/// A row from the `contacts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbContact {
    pub id: String,
    pub account_id: Option<String>,
    pub lead_id: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub alt_email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub fax: Option<String>,
    pub blog: Option<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub born_on: Option<String>,
    pub do_not_call: bool,
    pub access: Option<String>,
    pub assigned_to: Option<String>,
    pub background_info: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// JSON object of preset-driven custom fields.
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DbContact {
    /// A fresh contact with a generated id and current timestamps.
    pub fn new(first_name: &str, last_name: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: None,
            lead_id: None,
            first_name: first_name.to_string(),
            last_name: if last_name.is_empty() {
                None
            } else {
                Some(last_name.to_string())
            },
            title: None,
            source: None,
            department: None,
            email: None,
            alt_email: None,
            phone: None,
            mobile: None,
            fax: None,
            blog: None,
            linkedin: None,
            facebook: None,
            twitter: None,
            born_on: None,
            do_not_call: false,
            access: None,
            assigned_to: None,
            background_info: None,
            tags: Vec::new(),
            metadata: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Attribute names that never participate in a merge.
    pub fn ignored_merge_attributes() -> &'static [&'static str] {
        merge::CONTACT_IGNORED_ATTRIBUTES
    }

    /// The attributes a merge considers: everything except the permanent
    /// ignore list.
    pub fn merge_attributes(&self) -> Map<String, Value> {
        let mut attrs = merge::attribute_map(self);
        for ignored in Self::ignored_merge_attributes() {
            attrs.remove(*ignored);
        }
        attrs
    }

    /// Contacts must carry a first name.
    pub fn validate(&self) -> Result<(), String> {
        if self.first_name.trim().is_empty() {
            return Err("contact first name must not be blank".to_string());
        }
        Ok(())
    }
}

/// A row from the `emails` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbEmail {
    pub id: String,
    pub mediator_id: String,
    pub mediator_type: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
}

/// A row from the `comments` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbComment {
    pub id: String,
    pub commentable_id: String,
    pub commentable_type: String,
    pub author: Option<String>,
    pub body: String,
    pub created_at: String,
}

/// A row from the `addresses` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbAddress {
    pub id: String,
    pub addressable_id: String,
    pub addressable_type: String,
    pub address_type: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,
    pub created_at: String,
}

/// A row from the `tasks` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbTask {
    pub id: String,
    pub asset_id: Option<String>,
    pub asset_type: Option<String>,
    pub name: String,
    pub due_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

/// A row from the `opportunities` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbOpportunity {
    pub id: String,
    pub account_id: Option<String>,
    pub name: String,
    pub stage: Option<String>,
    pub amount: Option<f64>,
    pub probability: Option<i32>,
    pub closes_on: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `account_aliases` table: a deleted account's identifier
/// redirecting to its surviving successor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbAccountAlias {
    pub destroyed_account_id: String,
    pub account_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `contact_aliases` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbContactAlias {
    pub destroyed_contact_id: String,
    pub contact_id: String,
    pub created_at: String,
    pub updated_at: String,
}
