//! Persistence port for registrations, forms, and scan history.
//!
//! The [`TicketStore`] trait is the contract the verification engine and the
//! HTTP handlers are written against. Adapters must make the credential
//! primitives (`issue_credential`, `consume_scan`) single conditional
//! mutations: the guard and the write happen in one step, so concurrent
//! callers can never interleave a read-modify-write on the same ticket.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    EventForm, EventFormDraft, FormStats, NewRegistration, Registration, RegistrationPatch,
    ScanHistoryEntry,
};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod pg;

pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Ticket id already taken; callers regenerate and retry.
    #[error("ticket id already exists")]
    DuplicateTicketId,

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Result of the conditional issue mutation.
#[derive(Debug)]
pub enum IssueOutcome {
    /// Credential attached; the post-mutation row.
    Issued(Registration),
    /// The guard failed: the registration already carries a credential.
    AlreadyIssued,
    /// No registration with that id.
    NotFound,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    // -- registrations --------------------------------------------------------

    /// Insert a new registration. Fails with [`StoreError::DuplicateTicketId`]
    /// when the generated id collides.
    async fn insert_registration(&self, new: &NewRegistration)
        -> Result<Registration, StoreError>;

    async fn registration(&self, id: &str) -> Result<Option<Registration>, StoreError>;

    /// List registrations, optionally restricted to one form, newest first.
    async fn list_registrations(
        &self,
        form_id: Option<i32>,
    ) -> Result<Vec<Registration>, StoreError>;

    /// Apply a partial edit. Returns the updated row, or `None` if the id is
    /// unknown.
    async fn update_registration(
        &self,
        id: &str,
        patch: &RegistrationPatch,
    ) -> Result<Option<Registration>, StoreError>;

    /// Remove a registration and its scan history. Returns `false` if the id
    /// is unknown.
    async fn delete_registration(&self, id: &str) -> Result<bool, StoreError>;

    // -- credential state machine ---------------------------------------------

    /// Attach a QR credential, guarded on `has_qr = false` in the same
    /// mutation.
    async fn issue_credential(&self, id: &str, qr_data: &str)
        -> Result<IssueOutcome, StoreError>;

    /// Return the registration to its pre-issuance state: credential cleared,
    /// scan count reset. Idempotent. `None` if the id is unknown.
    async fn revoke_credential(&self, id: &str) -> Result<Option<Registration>, StoreError>;

    /// Atomically consume one scan if the ticket has a credential and budget
    /// remaining, recomputing the status in the same mutation. Returns the
    /// post-mutation row, or `None` when the guard failed for any reason
    /// (unknown id, unissued, or budget spent); callers classify afterwards.
    async fn consume_scan(&self, id: &str) -> Result<Option<Registration>, StoreError>;

    // -- scan history ---------------------------------------------------------

    /// Append one audit row. Best-effort relative to the scan decision.
    async fn append_scan(&self, ticket_id: &str, valid: bool) -> Result<(), StoreError>;

    async fn scan_history(&self, ticket_id: &str) -> Result<Vec<ScanHistoryEntry>, StoreError>;

    // -- forms ----------------------------------------------------------------

    async fn insert_form(&self, draft: &EventFormDraft) -> Result<EventForm, StoreError>;

    async fn update_form(
        &self,
        id: i32,
        draft: &EventFormDraft,
    ) -> Result<Option<EventForm>, StoreError>;

    async fn form(&self, id: i32) -> Result<Option<EventForm>, StoreError>;

    async fn list_forms(&self) -> Result<Vec<EventForm>, StoreError>;

    /// The single form currently accepting public submissions, if any.
    async fn published_form(&self) -> Result<Option<EventForm>, StoreError>;

    /// Publish one form and unpublish every other, atomically from the
    /// perspective of `published_form`. Returns `false` if the id is unknown.
    async fn publish_form(&self, id: i32) -> Result<bool, StoreError>;

    /// Delete a form. Registrations created from it survive with their
    /// `form_id` cleared. Returns `false` if the id is unknown.
    async fn delete_form(&self, id: i32) -> Result<bool, StoreError>;

    /// Aggregate counters over one form's registrations.
    async fn form_stats(&self, form_id: i32) -> Result<FormStats, StoreError>;
}
