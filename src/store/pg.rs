//! PostgreSQL adapter for [`TicketStore`].
//!
//! JSONB columns (team rosters, custom-field payloads, form configuration)
//! round-trip through `serde_json::Value` in private row structs. The
//! credential primitives are single `UPDATE ... WHERE <guard>` statements, so
//! the database is the arbiter under concurrent scans, with no application-level
//! locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{
    BaseFieldsConfig, CustomLink, EventForm, EventFormDraft, FormStats, NewRegistration,
    Registration, RegistrationPatch, ScanHistoryEntry,
};

use super::{IssueOutcome, StoreError, TicketStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize {what}: {e}")))
}

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: String,
    form_id: Option<i32>,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    organization: Option<String>,
    group_size: i32,
    team_members: serde_json::Value,
    custom_field_data: serde_json::Value,
    scans: i32,
    max_scans: i32,
    scan_policy: String,
    has_qr: bool,
    qr_code_data: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl RegistrationRow {
    fn into_registration(self) -> Result<Registration, sqlx::Error> {
        Ok(Registration {
            id: self.id,
            form_id: self.form_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            organization: self.organization,
            group_size: self.group_size,
            team_members: serde_json::from_value(self.team_members)
                .map_err(|e| decode_err(format!("bad team_members payload: {e}")))?,
            custom_field_data: serde_json::from_value(self.custom_field_data)
                .map_err(|e| decode_err(format!("bad custom_field_data payload: {e}")))?,
            scans: self.scans,
            max_scans: self.max_scans,
            scan_policy: self.scan_policy.parse().map_err(decode_err)?,
            has_qr: self.has_qr,
            qr_code_data: self.qr_code_data,
            status: self.status.parse().map_err(decode_err)?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventFormRow {
    id: i32,
    title: String,
    banner_url: Option<String>,
    custom_links: serde_json::Value,
    custom_fields: serde_json::Value,
    base_fields: serde_json::Value,
    scan_policy: String,
    is_published: bool,
    success_title: Option<String>,
    success_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventFormRow {
    fn into_form(self) -> Result<EventForm, sqlx::Error> {
        let custom_links: Vec<CustomLink> = serde_json::from_value(self.custom_links)
            .map_err(|e| decode_err(format!("bad custom_links payload: {e}")))?;
        let custom_fields = serde_json::from_value(self.custom_fields)
            .map_err(|e| decode_err(format!("bad custom_fields payload: {e}")))?;
        let base_fields: BaseFieldsConfig = serde_json::from_value(self.base_fields)
            .map_err(|e| decode_err(format!("bad base_fields payload: {e}")))?;

        Ok(EventForm {
            id: self.id,
            title: self.title,
            banner_url: self.banner_url,
            custom_links,
            custom_fields,
            base_fields,
            scan_policy: self.scan_policy.parse().map_err(decode_err)?,
            is_published: self.is_published,
            success_title: self.success_title,
            success_message: self.success_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total_registrations: i64,
    qr_issued: i64,
    attended: i64,
    pending: i64,
    total_scans: i64,
    total_attendees: i64,
}

const REGISTRATION_COLUMNS: &str = "id, form_id, name, email, phone, organization, group_size, \
     team_members, custom_field_data, scans, max_scans, scan_policy, has_qr, qr_code_data, \
     status, created_at";

const FORM_COLUMNS: &str = "id, title, banner_url, custom_links, custom_fields, base_fields, \
     scan_policy, is_published, success_title, success_message, created_at, updated_at";

#[async_trait]
impl TicketStore for PgStore {
    async fn insert_registration(
        &self,
        new: &NewRegistration,
    ) -> Result<Registration, StoreError> {
        let team_members = to_json("team_members", &new.team_members)?;
        let custom_field_data = to_json("custom_field_data", &new.custom_field_data)?;

        let sql = format!(
            "INSERT INTO registrations \
                 (id, form_id, name, email, phone, organization, group_size, team_members, \
                  custom_field_data, max_scans, scan_policy) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        let result = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(&new.id)
            .bind(new.form_id)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.phone)
            .bind(&new.organization)
            .bind(new.group_size)
            .bind(&team_members)
            .bind(&custom_field_data)
            .bind(new.max_scans)
            .bind(new.scan_policy.as_str())
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => Ok(row.into_registration()?),
            Err(sqlx::Error::Database(db))
                if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                Err(StoreError::DuplicateTicketId)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn registration(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1");
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RegistrationRow::into_registration)
            .transpose()
            .map_err(Into::into)
    }

    async fn list_registrations(
        &self,
        form_id: Option<i32>,
    ) -> Result<Vec<Registration>, StoreError> {
        let rows = match form_id {
            Some(form_id) => {
                let sql = format!(
                    "SELECT {REGISTRATION_COLUMNS} FROM registrations \
                     WHERE form_id = $1 ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, RegistrationRow>(&sql)
                    .bind(form_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {REGISTRATION_COLUMNS} FROM registrations ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, RegistrationRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(|r| r.into_registration().map_err(Into::into))
            .collect()
    }

    async fn update_registration(
        &self,
        id: &str,
        patch: &RegistrationPatch,
    ) -> Result<Option<Registration>, StoreError> {
        let team_members = patch
            .team_members
            .as_ref()
            .map(|m| to_json("team_members", m))
            .transpose()?;
        let custom_field_data = patch
            .custom_field_data
            .as_ref()
            .map(|d| to_json("custom_field_data", d))
            .transpose()?;

        let sql = format!(
            "UPDATE registrations SET \
                 name = COALESCE($2, name), \
                 email = COALESCE($3, email), \
                 phone = COALESCE($4, phone), \
                 organization = COALESCE($5, organization), \
                 group_size = COALESCE($6, group_size), \
                 team_members = COALESCE($7, team_members), \
                 custom_field_data = COALESCE($8, custom_field_data) \
             WHERE id = $1 \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.email)
            .bind(&patch.phone)
            .bind(&patch.organization)
            .bind(patch.group_size)
            .bind(team_members)
            .bind(custom_field_data)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RegistrationRow::into_registration)
            .transpose()
            .map_err(Into::into)
    }

    async fn delete_registration(&self, id: &str) -> Result<bool, StoreError> {
        // History rows first, then the registration, in one transaction.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM scan_history WHERE ticket_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn issue_credential(
        &self,
        id: &str,
        qr_data: &str,
    ) -> Result<IssueOutcome, StoreError> {
        let sql = format!(
            "UPDATE registrations \
                SET has_qr = TRUE, status = 'active', qr_code_data = $2 \
              WHERE id = $1 AND NOT has_qr \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(id)
            .bind(qr_data)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(IssueOutcome::Issued(row.into_registration()?));
        }

        // The guard failed: distinguish "already issued" from "no such ticket".
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM registrations WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if exists {
            Ok(IssueOutcome::AlreadyIssued)
        } else {
            Ok(IssueOutcome::NotFound)
        }
    }

    async fn revoke_credential(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        let sql = format!(
            "UPDATE registrations \
                SET has_qr = FALSE, status = 'pending', qr_code_data = NULL, scans = 0 \
              WHERE id = $1 \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RegistrationRow::into_registration)
            .transpose()
            .map_err(Into::into)
    }

    async fn consume_scan(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        let sql = format!(
            "UPDATE registrations \
                SET scans = scans + 1, \
                    status = CASE \
                                 WHEN scan_policy = 'one-shot' THEN 'checked-in' \
                                 WHEN scans + 1 >= max_scans THEN 'exhausted' \
                                 ELSE 'active' \
                             END \
              WHERE id = $1 AND has_qr AND scans < max_scans \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RegistrationRow::into_registration)
            .transpose()
            .map_err(Into::into)
    }

    async fn append_scan(&self, ticket_id: &str, valid: bool) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO scan_history (ticket_id, valid) VALUES ($1, $2)")
            .bind(ticket_id)
            .bind(valid)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn scan_history(&self, ticket_id: &str) -> Result<Vec<ScanHistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, ScanHistoryRow>(
            "SELECT id, ticket_id, scanned_at, valid FROM scan_history \
             WHERE ticket_id = $1 ORDER BY scanned_at DESC, id DESC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ScanHistoryRow::into_entry).collect())
    }

    async fn insert_form(&self, draft: &EventFormDraft) -> Result<EventForm, StoreError> {
        let custom_links = to_json("custom_links", &draft.custom_links)?;
        let custom_fields = to_json("custom_fields", &draft.custom_fields)?;
        let base_fields = to_json("base_fields", &draft.base_fields)?;

        let sql = format!(
            "INSERT INTO event_forms \
                 (title, banner_url, custom_links, custom_fields, base_fields, scan_policy, \
                  success_title, success_message) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {FORM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, EventFormRow>(&sql)
            .bind(&draft.title)
            .bind(&draft.banner_url)
            .bind(&custom_links)
            .bind(&custom_fields)
            .bind(&base_fields)
            .bind(draft.scan_policy.as_str())
            .bind(&draft.success_title)
            .bind(&draft.success_message)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into_form()?)
    }

    async fn update_form(
        &self,
        id: i32,
        draft: &EventFormDraft,
    ) -> Result<Option<EventForm>, StoreError> {
        let custom_links = to_json("custom_links", &draft.custom_links)?;
        let custom_fields = to_json("custom_fields", &draft.custom_fields)?;
        let base_fields = to_json("base_fields", &draft.base_fields)?;

        let sql = format!(
            "UPDATE event_forms SET \
                 title = $2, banner_url = $3, custom_links = $4, custom_fields = $5, \
                 base_fields = $6, scan_policy = $7, success_title = $8, success_message = $9, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {FORM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, EventFormRow>(&sql)
            .bind(id)
            .bind(&draft.title)
            .bind(&draft.banner_url)
            .bind(&custom_links)
            .bind(&custom_fields)
            .bind(&base_fields)
            .bind(draft.scan_policy.as_str())
            .bind(&draft.success_title)
            .bind(&draft.success_message)
            .fetch_optional(&self.pool)
            .await?;

        row.map(EventFormRow::into_form)
            .transpose()
            .map_err(Into::into)
    }

    async fn form(&self, id: i32) -> Result<Option<EventForm>, StoreError> {
        let sql = format!("SELECT {FORM_COLUMNS} FROM event_forms WHERE id = $1");
        let row = sqlx::query_as::<_, EventFormRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(EventFormRow::into_form)
            .transpose()
            .map_err(Into::into)
    }

    async fn list_forms(&self) -> Result<Vec<EventForm>, StoreError> {
        let sql = format!("SELECT {FORM_COLUMNS} FROM event_forms ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, EventFormRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|r| r.into_form().map_err(Into::into))
            .collect()
    }

    async fn published_form(&self) -> Result<Option<EventForm>, StoreError> {
        let sql = format!("SELECT {FORM_COLUMNS} FROM event_forms WHERE is_published");
        let row = sqlx::query_as::<_, EventFormRow>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        row.map(EventFormRow::into_form)
            .transpose()
            .map_err(Into::into)
    }

    async fn publish_form(&self, id: i32) -> Result<bool, StoreError> {
        // Both flips commit together, so readers of `published_form` see the
        // old form or the new one, never zero or two. The currently published
        // row is cleared first to satisfy the partial unique index.
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE event_forms SET is_published = FALSE WHERE is_published AND id <> $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result =
            sqlx::query("UPDATE event_forms SET is_published = TRUE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_form(&self, id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM event_forms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn form_stats(&self, form_id: i32) -> Result<FormStats, StoreError> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*)                                    AS total_registrations, \
                    COUNT(*) FILTER (WHERE has_qr)              AS qr_issued, \
                    COUNT(*) FILTER (WHERE scans > 0)           AS attended, \
                    COUNT(*) FILTER (WHERE status = 'pending')  AS pending, \
                    COALESCE(SUM(scans), 0)::BIGINT             AS total_scans, \
                    COALESCE(SUM(group_size), 0)::BIGINT        AS total_attendees \
               FROM registrations \
              WHERE form_id = $1",
        )
        .bind(form_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(FormStats {
            total_registrations: row.total_registrations,
            qr_issued: row.qr_issued,
            attended: row.attended,
            pending: row.pending,
            total_scans: row.total_scans,
            total_attendees: row.total_attendees,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScanHistoryRow {
    id: i64,
    ticket_id: String,
    scanned_at: DateTime<Utc>,
    valid: bool,
}

impl ScanHistoryRow {
    fn into_entry(self) -> ScanHistoryEntry {
        ScanHistoryEntry {
            id: self.id,
            ticket_id: self.ticket_id,
            scanned_at: self.scanned_at,
            valid: self.valid,
        }
    }
}
