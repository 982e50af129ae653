use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::*;
use crate::entity::EntityType;

impl CrmDb {
    // =========================================================================
    // Owned records: emails, comments, addresses, tasks
    // =========================================================================

    /// Record an email against an account or contact.
    pub fn add_email(
        &self,
        owner: EntityType,
        owner_id: &str,
        subject: Option<&str>,
        body: Option<&str>,
    ) -> Result<DbEmail, DbError> {
        let email = DbEmail {
            id: Uuid::new_v4().to_string(),
            mediator_id: owner_id.to_string(),
            mediator_type: owner.as_str().to_string(),
            subject: subject.map(str::to_string),
            body: body.map(str::to_string),
            sent_at: None,
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO emails (id, mediator_id, mediator_type, subject, body, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                email.id,
                email.mediator_id,
                email.mediator_type,
                email.subject,
                email.body,
                email.sent_at,
                email.created_at,
            ],
        )?;
        Ok(email)
    }

    /// Emails owned by a record, newest first.
    pub fn get_emails_for(&self, owner: EntityType, owner_id: &str) -> Result<Vec<DbEmail>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mediator_id, mediator_type, subject, body, sent_at, created_at
             FROM emails
             WHERE mediator_id = ?1 AND mediator_type = ?2
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner_id, owner.as_str()], |row| {
            Ok(DbEmail {
                id: row.get(0)?,
                mediator_id: row.get(1)?,
                mediator_type: row.get(2)?,
                subject: row.get(3)?,
                body: row.get(4)?,
                sent_at: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record a comment against an account or contact.
    pub fn add_comment(
        &self,
        owner: EntityType,
        owner_id: &str,
        author: Option<&str>,
        body: &str,
    ) -> Result<DbComment, DbError> {
        let comment = DbComment {
            id: Uuid::new_v4().to_string(),
            commentable_id: owner_id.to_string(),
            commentable_type: owner.as_str().to_string(),
            author: author.map(str::to_string),
            body: body.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO comments (id, commentable_id, commentable_type, author, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id,
                comment.commentable_id,
                comment.commentable_type,
                comment.author,
                comment.body,
                comment.created_at,
            ],
        )?;
        Ok(comment)
    }

    /// Comments owned by a record, newest first.
    pub fn get_comments_for(
        &self,
        owner: EntityType,
        owner_id: &str,
    ) -> Result<Vec<DbComment>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, commentable_id, commentable_type, author, body, created_at
             FROM comments
             WHERE commentable_id = ?1 AND commentable_type = ?2
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner_id, owner.as_str()], |row| {
            Ok(DbComment {
                id: row.get(0)?,
                commentable_id: row.get(1)?,
                commentable_type: row.get(2)?,
                author: row.get(3)?,
                body: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record an address against an account or contact.
    pub fn add_address(
        &self,
        owner: EntityType,
        owner_id: &str,
        address_type: Option<&str>,
        street1: Option<&str>,
        city: Option<&str>,
    ) -> Result<DbAddress, DbError> {
        let address = DbAddress {
            id: Uuid::new_v4().to_string(),
            addressable_id: owner_id.to_string(),
            addressable_type: owner.as_str().to_string(),
            address_type: address_type.map(str::to_string),
            street1: street1.map(str::to_string),
            street2: None,
            city: city.map(str::to_string),
            state: None,
            zipcode: None,
            country: None,
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO addresses (
                id, addressable_id, addressable_type, address_type,
                street1, street2, city, state, zipcode, country, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                address.id,
                address.addressable_id,
                address.addressable_type,
                address.address_type,
                address.street1,
                address.street2,
                address.city,
                address.state,
                address.zipcode,
                address.country,
                address.created_at,
            ],
        )?;
        Ok(address)
    }

    /// Addresses owned by a record.
    pub fn get_addresses_for(
        &self,
        owner: EntityType,
        owner_id: &str,
    ) -> Result<Vec<DbAddress>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, addressable_id, addressable_type, address_type,
                    street1, street2, city, state, zipcode, country, created_at
             FROM addresses
             WHERE addressable_id = ?1 AND addressable_type = ?2
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![owner_id, owner.as_str()], |row| {
            Ok(DbAddress {
                id: row.get(0)?,
                addressable_id: row.get(1)?,
                addressable_type: row.get(2)?,
                address_type: row.get(3)?,
                street1: row.get(4)?,
                street2: row.get(5)?,
                city: row.get(6)?,
                state: row.get(7)?,
                zipcode: row.get(8)?,
                country: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record a task against an account or contact.
    pub fn add_task(
        &self,
        owner: EntityType,
        owner_id: &str,
        name: &str,
        due_at: Option<&str>,
    ) -> Result<DbTask, DbError> {
        let task = DbTask {
            id: Uuid::new_v4().to_string(),
            asset_id: Some(owner_id.to_string()),
            asset_type: Some(owner.as_str().to_string()),
            name: name.to_string(),
            due_at: due_at.map(str::to_string),
            completed_at: None,
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO tasks (id, asset_id, asset_type, name, due_at, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                task.asset_id,
                task.asset_type,
                task.name,
                task.due_at,
                task.completed_at,
                task.created_at,
            ],
        )?;
        Ok(task)
    }

    /// Tasks owned by a record.
    pub fn get_tasks_for(&self, owner: EntityType, owner_id: &str) -> Result<Vec<DbTask>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, asset_id, asset_type, name, due_at, completed_at, created_at
             FROM tasks
             WHERE asset_id = ?1 AND asset_type = ?2
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![owner_id, owner.as_str()], |row| {
            Ok(DbTask {
                id: row.get(0)?,
                asset_id: row.get(1)?,
                asset_type: row.get(2)?,
                name: row.get(3)?,
                due_at: row.get(4)?,
                completed_at: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Opportunities
    // =========================================================================

    /// Create an opportunity, optionally attached to an account.
    pub fn add_opportunity(
        &self,
        account_id: Option<&str>,
        name: &str,
        stage: Option<&str>,
        amount: Option<f64>,
    ) -> Result<DbOpportunity, DbError> {
        let now = Utc::now().to_rfc3339();
        let opportunity = DbOpportunity {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.map(str::to_string),
            name: name.to_string(),
            stage: stage.map(str::to_string),
            amount,
            probability: None,
            closes_on: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.conn.execute(
            "INSERT INTO opportunities (
                id, account_id, name, stage, amount, probability, closes_on,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                opportunity.id,
                opportunity.account_id,
                opportunity.name,
                opportunity.stage,
                opportunity.amount,
                opportunity.probability,
                opportunity.closes_on,
                opportunity.created_at,
                opportunity.updated_at,
            ],
        )?;
        Ok(opportunity)
    }

    /// Opportunities attached to an account.
    pub fn get_opportunities_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<DbOpportunity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, name, stage, amount, probability, closes_on,
                    created_at, updated_at
             FROM opportunities
             WHERE account_id = ?1
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![account_id], Self::map_opportunity_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Link a contact to an opportunity. Links are plain join rows and are
    /// not de-duplicated.
    pub fn link_contact_opportunity(
        &self,
        contact_id: &str,
        opportunity_id: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO contact_opportunities (contact_id, opportunity_id) VALUES (?1, ?2)",
            params![contact_id, opportunity_id],
        )?;
        Ok(())
    }

    /// Opportunities linked to a contact through the join table.
    pub fn get_opportunities_for_contact(
        &self,
        contact_id: &str,
    ) -> Result<Vec<DbOpportunity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT o.id, o.account_id, o.name, o.stage, o.amount, o.probability,
                    o.closes_on, o.created_at, o.updated_at
             FROM opportunities o
             JOIN contact_opportunities co ON co.opportunity_id = o.id
             WHERE co.contact_id = ?1
             ORDER BY o.created_at",
        )?;
        let rows = stmt.query_map(params![contact_id], Self::map_opportunity_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_opportunity_row(row: &rusqlite::Row) -> rusqlite::Result<DbOpportunity> {
        Ok(DbOpportunity {
            id: row.get(0)?,
            account_id: row.get(1)?,
            name: row.get(2)?,
            stage: row.get(3)?,
            amount: row.get(4)?,
            probability: row.get(5)?,
            closes_on: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    // =========================================================================
    // Re-parenting and cascade deletes
    // =========================================================================

    /// Move every owned record (emails, comments, addresses, tasks) from one
    /// owner to another of the same type. Children are moved as-is, never
    /// de-duplicated. Returns the number of rows moved.
    pub(crate) fn reparent_owned_records(
        &self,
        from_id: &str,
        into_id: &str,
        owner: EntityType,
    ) -> Result<usize, DbError> {
        let owner_type = owner.as_str();
        let mut moved = 0;
        moved += self.conn.execute(
            "UPDATE emails SET mediator_id = ?2
             WHERE mediator_id = ?1 AND mediator_type = ?3",
            params![from_id, into_id, owner_type],
        )?;
        moved += self.conn.execute(
            "UPDATE comments SET commentable_id = ?2
             WHERE commentable_id = ?1 AND commentable_type = ?3",
            params![from_id, into_id, owner_type],
        )?;
        moved += self.conn.execute(
            "UPDATE addresses SET addressable_id = ?2
             WHERE addressable_id = ?1 AND addressable_type = ?3",
            params![from_id, into_id, owner_type],
        )?;
        moved += self.conn.execute(
            "UPDATE tasks SET asset_id = ?2
             WHERE asset_id = ?1 AND asset_type = ?3",
            params![from_id, into_id, owner_type],
        )?;
        Ok(moved)
    }

    /// Delete every owned record for an owner. Used by the cascade deletes.
    pub(crate) fn delete_owned_records(
        &self,
        owner_id: &str,
        owner: EntityType,
    ) -> Result<(), DbError> {
        let owner_type = owner.as_str();
        self.conn.execute(
            "DELETE FROM emails WHERE mediator_id = ?1 AND mediator_type = ?2",
            params![owner_id, owner_type],
        )?;
        self.conn.execute(
            "DELETE FROM comments WHERE commentable_id = ?1 AND commentable_type = ?2",
            params![owner_id, owner_type],
        )?;
        self.conn.execute(
            "DELETE FROM addresses WHERE addressable_id = ?1 AND addressable_type = ?2",
            params![owner_id, owner_type],
        )?;
        self.conn.execute(
            "DELETE FROM tasks WHERE asset_id = ?1 AND asset_type = ?2",
            params![owner_id, owner_type],
        )?;
        Ok(())
    }
}
