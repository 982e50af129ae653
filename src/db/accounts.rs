use chrono::Utc;
use rusqlite::params;
use serde_json::Value;

use super::*;
use crate::entity::EntityType;
use crate::merge;

impl CrmDb {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert or update an account.
    pub fn upsert_account(&self, account: &DbAccount) -> Result<(), DbError> {
        let tags = serde_json::to_string(&account.tags).unwrap_or_else(|_| "[]".to_string());
        self.conn.execute(
            "INSERT INTO accounts (
                id, name, email, phone, fax, toll_free_phone, website, category,
                rating, access, assigned_to, background_info, tags, metadata,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                fax = excluded.fax,
                toll_free_phone = excluded.toll_free_phone,
                website = excluded.website,
                category = excluded.category,
                rating = excluded.rating,
                access = excluded.access,
                assigned_to = excluded.assigned_to,
                background_info = excluded.background_info,
                tags = excluded.tags,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at",
            params![
                account.id,
                account.name,
                account.email,
                account.phone,
                account.fax,
                account.toll_free_phone,
                account.website,
                account.category,
                account.rating,
                account.access,
                account.assigned_to,
                account.background_info,
                tags,
                account.metadata,
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an account by ID.
    pub fn get_account(&self, id: &str) -> Result<Option<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, phone, fax, toll_free_phone, website, category,
                    rating, access, assigned_to, background_info, tags, metadata,
                    created_at, updated_at
             FROM accounts
             WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![id], Self::map_account_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get an account by name (case-insensitive).
    pub fn get_account_by_name(&self, name: &str) -> Result<Option<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, phone, fax, toll_free_phone, website, category,
                    rating, access, assigned_to, background_info, tags, metadata,
                    created_at, updated_at
             FROM accounts
             WHERE LOWER(name) = LOWER(?1)",
        )?;

        let mut rows = stmt.query_map(params![name], Self::map_account_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get all accounts, ordered by name.
    pub fn get_all_accounts(&self) -> Result<Vec<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, phone, fax, toll_free_phone, website, category,
                    rating, access, assigned_to, background_info, tags, metadata,
                    created_at, updated_at
             FROM accounts ORDER BY name",
        )?;
        let rows = stmt.query_map([], Self::map_account_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete an account and its owned records. Contacts and opportunities
    /// that pointed at it are detached, aliases that redirected to it are
    /// dropped. Wrapped in a transaction for atomicity.
    pub fn delete_account(&self, account_id: &str) -> Result<(), DbError> {
        let _account = self
            .get_account(account_id)?
            .ok_or_else(|| DbError::RecordNotFound(format!("account {account_id}")))?;

        self.with_transaction(|tx| {
            tx.delete_owned_records(account_id, EntityType::Account)
                .map_err(|e| e.to_string())?;
            tx.conn
                .execute(
                    "UPDATE contacts SET account_id = NULL WHERE account_id = ?1",
                    params![account_id],
                )
                .map_err(|e| e.to_string())?;
            tx.conn
                .execute(
                    "UPDATE opportunities SET account_id = NULL WHERE account_id = ?1",
                    params![account_id],
                )
                .map_err(|e| e.to_string())?;
            tx.conn
                .execute(
                    "DELETE FROM account_aliases WHERE account_id = ?1",
                    params![account_id],
                )
                .map_err(|e| e.to_string())?;
            tx.conn
                .execute("DELETE FROM accounts WHERE id = ?1", params![account_id])
                .map_err(|e| e.to_string())?;
            Ok(())
        })
        .map_err(DbError::Transaction)
    }

    pub(crate) fn map_account_row(row: &rusqlite::Row) -> rusqlite::Result<DbAccount> {
        let tags_raw: String = row.get(12)?;
        Ok(DbAccount {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            fax: row.get(4)?,
            toll_free_phone: row.get(5)?,
            website: row.get(6)?,
            category: row.get(7)?,
            rating: row.get(8)?,
            access: row.get(9)?,
            assigned_to: row.get(10)?,
            background_info: row.get(11)?,
            tags: serde_json::from_str(&tags_raw).unwrap_or_default(),
            metadata: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }

    // =========================================================================
    // Account merge
    // =========================================================================

    /// Merge a duplicate account into a master account.
    ///
    /// The master keeps every attribute it has a value for; the duplicate
    /// fills the blanks. `ignored_attributes` are excluded from copying on
    /// top of the permanent ignore list. Tag lists are unioned, every owned
    /// record is re-parented onto the master, and an alias row keeps the
    /// duplicate's id resolving to the master. The whole operation runs in
    /// one transaction.
    ///
    /// Returns `Ok(false)` without side effects for a self-merge, and
    /// `Ok(false)` after rolling back when the merged master fails
    /// validation. Any other failure rolls back and propagates.
    pub fn merge_accounts(
        &self,
        duplicate_id: &str,
        master_id: &str,
        ignored_attributes: &[&str],
        hook: Option<AccountMergeHook>,
    ) -> Result<bool, DbError> {
        if duplicate_id == master_id {
            return Ok(false);
        }
        let duplicate = self
            .get_account(duplicate_id)?
            .ok_or_else(|| DbError::RecordNotFound(format!("account {duplicate_id}")))?;
        let master = self
            .get_account(master_id)?
            .ok_or_else(|| DbError::RecordNotFound(format!("account {master_id}")))?;

        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match self.merge_accounts_in_tx(&duplicate, &master, ignored_attributes, hook) {
            Ok(true) => {
                self.conn.execute_batch("COMMIT")?;
                log::info!("Merged account {} into {}", duplicate.id, master.id);
                Ok(true)
            }
            Ok(false) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Ok(false)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    fn merge_accounts_in_tx(
        &self,
        duplicate: &DbAccount,
        master: &DbAccount,
        ignored_attributes: &[&str],
        hook: Option<AccountMergeHook>,
    ) -> Result<bool, DbError> {
        // Resolve the exclusion set once, then let the duplicate fill the
        // master's blanks.
        let excluded = merge::resolve_exclusions(merge::ACCOUNT_IGNORED_ATTRIBUTES, ignored_attributes);
        let master_attrs = merge::attribute_map(master);
        let duplicate_attrs = merge::attribute_map(duplicate);
        let precedence = merge::default_precedence(&duplicate_attrs, &master_attrs, &excluded);
        let merged_attrs = merge::merged_attribute_values(&master_attrs, &duplicate_attrs, &precedence);
        let mut merged: DbAccount = serde_json::from_value(Value::Object(merged_attrs))
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        merged.tags = merge::union_tags(&master.tags, &duplicate.tags);
        merged.updated_at = Utc::now().to_rfc3339();

        // Re-parent every owned collection.
        self.reparent_owned_records(&duplicate.id, &merged.id, EntityType::Account)?;
        self.conn.execute(
            "UPDATE contacts SET account_id = ?2 WHERE account_id = ?1",
            params![duplicate.id, merged.id],
        )?;
        self.conn.execute(
            "UPDATE opportunities SET account_id = ?2 WHERE account_id = ?1",
            params![duplicate.id, merged.id],
        )?;

        // Aliases already redirecting to the duplicate now redirect to the
        // master, then the duplicate's own id gets its alias row.
        self.repoint_account_aliases(&duplicate.id, &merged.id)?;
        self.upsert_account_alias(&duplicate.id, &merged.id)?;

        if let Some(hook) = hook {
            hook(self, &merged, duplicate).map_err(DbError::Transaction)?;
        }

        if let Err(reason) = merged.validate() {
            log::warn!("Account merge aborted, master failed validation: {reason}");
            return Ok(false);
        }
        self.upsert_account(&merged)?;

        self.conn
            .execute("DELETE FROM accounts WHERE id = ?1", params![duplicate.id])?;
        Ok(true)
    }
}
