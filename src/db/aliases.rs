use chrono::Utc;
use rusqlite::params;

use super::*;

impl CrmDb {
    // =========================================================================
    // Account aliases
    // =========================================================================

    /// Ensure exactly one alias row maps a destroyed account id to its
    /// survivor.
    pub fn upsert_account_alias(
        &self,
        destroyed_account_id: &str,
        account_id: &str,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO account_aliases (destroyed_account_id, account_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(destroyed_account_id) DO UPDATE SET
                account_id = excluded.account_id,
                updated_at = excluded.updated_at",
            params![destroyed_account_id, account_id, now],
        )?;
        Ok(())
    }

    /// Fetch the alias row for a destroyed account id.
    pub fn get_account_alias(
        &self,
        destroyed_account_id: &str,
    ) -> Result<Option<DbAccountAlias>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT destroyed_account_id, account_id, created_at, updated_at
             FROM account_aliases
             WHERE destroyed_account_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![destroyed_account_id], |row| {
            Ok(DbAccountAlias {
                destroyed_account_id: row.get(0)?,
                account_id: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Rewrite aliases whose survivor is about to disappear in a merge, so
    /// chains keep resolving after repeated merges. Returns the number of
    /// rows repointed.
    pub(crate) fn repoint_account_aliases(
        &self,
        from_account_id: &str,
        into_account_id: &str,
    ) -> Result<usize, DbError> {
        let now = Utc::now().to_rfc3339();
        let repointed = self.conn.execute(
            "UPDATE account_aliases SET account_id = ?2, updated_at = ?3
             WHERE account_id = ?1",
            params![from_account_id, into_account_id, now],
        )?;
        Ok(repointed)
    }

    /// Get an account by id, chasing the alias table when the id belonged to
    /// a merged-away record. Chains are flattened at merge time, so a single
    /// hop suffices.
    pub fn get_account_resolving_alias(&self, id: &str) -> Result<Option<DbAccount>, DbError> {
        if let Some(account) = self.get_account(id)? {
            return Ok(Some(account));
        }
        match self.get_account_alias(id)? {
            Some(alias) => self.get_account(&alias.account_id),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Contact aliases
    // =========================================================================

    /// Ensure exactly one alias row maps a destroyed contact id to its
    /// survivor.
    pub fn upsert_contact_alias(
        &self,
        destroyed_contact_id: &str,
        contact_id: &str,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO contact_aliases (destroyed_contact_id, contact_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(destroyed_contact_id) DO UPDATE SET
                contact_id = excluded.contact_id,
                updated_at = excluded.updated_at",
            params![destroyed_contact_id, contact_id, now],
        )?;
        Ok(())
    }

    /// Fetch the alias row for a destroyed contact id.
    pub fn get_contact_alias(
        &self,
        destroyed_contact_id: &str,
    ) -> Result<Option<DbContactAlias>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT destroyed_contact_id, contact_id, created_at, updated_at
             FROM contact_aliases
             WHERE destroyed_contact_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![destroyed_contact_id], |row| {
            Ok(DbContactAlias {
                destroyed_contact_id: row.get(0)?,
                contact_id: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Contact counterpart of [`CrmDb::repoint_account_aliases`].
    pub(crate) fn repoint_contact_aliases(
        &self,
        from_contact_id: &str,
        into_contact_id: &str,
    ) -> Result<usize, DbError> {
        let now = Utc::now().to_rfc3339();
        let repointed = self.conn.execute(
            "UPDATE contact_aliases SET contact_id = ?2, updated_at = ?3
             WHERE contact_id = ?1",
            params![from_contact_id, into_contact_id, now],
        )?;
        Ok(repointed)
    }

    /// Get a contact by id, chasing the alias table when the id belonged to
    /// a merged-away record.
    pub fn get_contact_resolving_alias(&self, id: &str) -> Result<Option<DbContact>, DbError> {
        if let Some(contact) = self.get_contact(id)? {
            return Ok(Some(contact));
        }
        match self.get_contact_alias(id)? {
            Some(alias) => self.get_contact(&alias.contact_id),
            None => Ok(None),
        }
    }
}
