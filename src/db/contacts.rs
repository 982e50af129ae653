use chrono::Utc;
use rusqlite::params;
use serde_json::Value;

use super::*;
use crate::entity::EntityType;
use crate::merge;

impl CrmDb {
    // =========================================================================
    // Contacts
    // =========================================================================

    /// Insert or update a contact.
    pub fn upsert_contact(&self, contact: &DbContact) -> Result<(), DbError> {
        let tags = serde_json::to_string(&contact.tags).unwrap_or_else(|_| "[]".to_string());
        self.conn.execute(
            "INSERT INTO contacts (
                id, account_id, lead_id, first_name, last_name, title, source,
                department, email, alt_email, phone, mobile, fax, blog, linkedin,
                facebook, twitter, born_on, do_not_call, access, assigned_to,
                background_info, tags, metadata, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                       ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)
             ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                lead_id = excluded.lead_id,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                title = excluded.title,
                source = excluded.source,
                department = excluded.department,
                email = excluded.email,
                alt_email = excluded.alt_email,
                phone = excluded.phone,
                mobile = excluded.mobile,
                fax = excluded.fax,
                blog = excluded.blog,
                linkedin = excluded.linkedin,
                facebook = excluded.facebook,
                twitter = excluded.twitter,
                born_on = excluded.born_on,
                do_not_call = excluded.do_not_call,
                access = excluded.access,
                assigned_to = excluded.assigned_to,
                background_info = excluded.background_info,
                tags = excluded.tags,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at",
            params![
                contact.id,
                contact.account_id,
                contact.lead_id,
                contact.first_name,
                contact.last_name,
                contact.title,
                contact.source,
                contact.department,
                contact.email,
                contact.alt_email,
                contact.phone,
                contact.mobile,
                contact.fax,
                contact.blog,
                contact.linkedin,
                contact.facebook,
                contact.twitter,
                contact.born_on,
                contact.do_not_call as i32,
                contact.access,
                contact.assigned_to,
                contact.background_info,
                tags,
                contact.metadata,
                contact.created_at,
                contact.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a contact by ID.
    pub fn get_contact(&self, id: &str) -> Result<Option<DbContact>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, lead_id, first_name, last_name, title, source,
                    department, email, alt_email, phone, mobile, fax, blog, linkedin,
                    facebook, twitter, born_on, do_not_call, access, assigned_to,
                    background_info, tags, metadata, created_at, updated_at
             FROM contacts
             WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![id], Self::map_contact_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get the contacts attached to an account, ordered by last then first
    /// name.
    pub fn get_contacts_for_account(&self, account_id: &str) -> Result<Vec<DbContact>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, lead_id, first_name, last_name, title, source,
                    department, email, alt_email, phone, mobile, fax, blog, linkedin,
                    facebook, twitter, born_on, do_not_call, access, assigned_to,
                    background_info, tags, metadata, created_at, updated_at
             FROM contacts
             WHERE account_id = ?1
             ORDER BY last_name, first_name",
        )?;
        let rows = stmt.query_map(params![account_id], Self::map_contact_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Get all contacts, ordered by last then first name.
    pub fn get_all_contacts(&self) -> Result<Vec<DbContact>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, lead_id, first_name, last_name, title, source,
                    department, email, alt_email, phone, mobile, fax, blog, linkedin,
                    facebook, twitter, born_on, do_not_call, access, assigned_to,
                    background_info, tags, metadata, created_at, updated_at
             FROM contacts ORDER BY last_name, first_name",
        )?;
        let rows = stmt.query_map([], Self::map_contact_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete a contact and its owned records. Join rows and aliases that
    /// referenced it are dropped. Wrapped in a transaction for atomicity.
    pub fn delete_contact(&self, contact_id: &str) -> Result<(), DbError> {
        let _contact = self
            .get_contact(contact_id)?
            .ok_or_else(|| DbError::RecordNotFound(format!("contact {contact_id}")))?;

        self.with_transaction(|tx| {
            tx.delete_owned_records(contact_id, EntityType::Contact)
                .map_err(|e| e.to_string())?;
            tx.conn
                .execute(
                    "DELETE FROM contact_opportunities WHERE contact_id = ?1",
                    params![contact_id],
                )
                .map_err(|e| e.to_string())?;
            tx.conn
                .execute(
                    "DELETE FROM contact_aliases WHERE contact_id = ?1",
                    params![contact_id],
                )
                .map_err(|e| e.to_string())?;
            tx.conn
                .execute("DELETE FROM contacts WHERE id = ?1", params![contact_id])
                .map_err(|e| e.to_string())?;
            Ok(())
        })
        .map_err(DbError::Transaction)
    }

    pub(crate) fn map_contact_row(row: &rusqlite::Row) -> rusqlite::Result<DbContact> {
        let tags_raw: String = row.get(22)?;
        Ok(DbContact {
            id: row.get(0)?,
            account_id: row.get(1)?,
            lead_id: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            title: row.get(5)?,
            source: row.get(6)?,
            department: row.get(7)?,
            email: row.get(8)?,
            alt_email: row.get(9)?,
            phone: row.get(10)?,
            mobile: row.get(11)?,
            fax: row.get(12)?,
            blog: row.get(13)?,
            linkedin: row.get(14)?,
            facebook: row.get(15)?,
            twitter: row.get(16)?,
            born_on: row.get(17)?,
            do_not_call: row.get::<_, i32>(18)? != 0,
            access: row.get(19)?,
            assigned_to: row.get(20)?,
            background_info: row.get(21)?,
            tags: serde_json::from_str(&tags_raw).unwrap_or_default(),
            metadata: row.get(23)?,
            created_at: row.get(24)?,
            updated_at: row.get(25)?,
        })
    }

    // =========================================================================
    // Contact merge
    // =========================================================================

    /// Merge a duplicate contact into a master contact.
    ///
    /// Same contract as [`CrmDb::merge_accounts`]: precedence-resolved
    /// attribute copy (the belongs-to `account_id`/`lead_id` links merge as
    /// ordinary attributes), tag union, re-parenting of owned records and
    /// opportunity join rows, alias bookkeeping, optional hook, one
    /// transaction.
    pub fn merge_contacts(
        &self,
        duplicate_id: &str,
        master_id: &str,
        ignored_attributes: &[&str],
        hook: Option<ContactMergeHook>,
    ) -> Result<bool, DbError> {
        if duplicate_id == master_id {
            return Ok(false);
        }
        let duplicate = self
            .get_contact(duplicate_id)?
            .ok_or_else(|| DbError::RecordNotFound(format!("contact {duplicate_id}")))?;
        let master = self
            .get_contact(master_id)?
            .ok_or_else(|| DbError::RecordNotFound(format!("contact {master_id}")))?;

        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match self.merge_contacts_in_tx(&duplicate, &master, ignored_attributes, hook) {
            Ok(true) => {
                self.conn.execute_batch("COMMIT")?;
                log::info!("Merged contact {} into {}", duplicate.id, master.id);
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

    fn merge_contacts_in_tx(
        &self,
        duplicate: &DbContact,
        master: &DbContact,
        ignored_attributes: &[&str],
        hook: Option<ContactMergeHook>,
    ) -> Result<bool, DbError> {
        let excluded = merge::resolve_exclusions(merge::CONTACT_IGNORED_ATTRIBUTES, ignored_attributes);
        let master_attrs = merge::attribute_map(master);
        let duplicate_attrs = merge::attribute_map(duplicate);
        let precedence = merge::default_precedence(&duplicate_attrs, &master_attrs, &excluded);
        let merged_attrs = merge::merged_attribute_values(&master_attrs, &duplicate_attrs, &precedence);
        let mut merged: DbContact = serde_json::from_value(Value::Object(merged_attrs))
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        merged.tags = merge::union_tags(&master.tags, &duplicate.tags);
        merged.updated_at = Utc::now().to_rfc3339();

        self.reparent_owned_records(&duplicate.id, &merged.id, EntityType::Contact)?;
        self.conn.execute(
            "UPDATE contact_opportunities SET contact_id = ?2 WHERE contact_id = ?1",
            params![duplicate.id, merged.id],
        )?;

        self.repoint_contact_aliases(&duplicate.id, &merged.id)?;
        self.upsert_contact_alias(&duplicate.id, &merged.id)?;

        if let Some(hook) = hook {
            hook(self, &merged, duplicate).map_err(DbError::Transaction)?;
        }

        if let Err(reason) = merged.validate() {
            log::warn!("Contact merge aborted, master failed validation: {reason}");
            return Ok(false);
        }
        self.upsert_contact(&merged)?;

        self.conn
            .execute("DELETE FROM contacts WHERE id = ?1", params![duplicate.id])?;
        Ok(true)
    }
}
