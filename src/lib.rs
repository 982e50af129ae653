//! crmlite — an embedded, SQLite-backed working store for CRM records.
//!
//! The database holds accounts and contacts together with their owned
//! records (emails, comments, addresses, tasks, opportunities). The
//! centerpiece is the duplicate-record merge: consolidating two records of
//! the same type into one survivor with per-attribute precedence,
//! association re-parenting, tag union, and alias bookkeeping for the
//! deleted record's identifier. See [`db::CrmDb::merge_accounts`] and
//! [`db::CrmDb::merge_contacts`].

pub mod db;
pub mod entity;
pub mod helpers;
pub mod merge;
mod migrations;
