//! Record-type abstraction shared by the polymorphic association tables.
//!
//! Emails, comments, addresses, and tasks are owned through an
//! (owner id, owner type) pair so that one table serves both accounts and
//! contacts. The type tag is stored as a lowercase string.

use serde::{Deserialize, Serialize};

/// The kind of record that can own associations and be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Account,
    Contact,
}

impl EntityType {
    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Account => "account",
            EntityType::Contact => "contact",
        }
    }
}
