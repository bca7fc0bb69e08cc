//! Ticket verification engine.
//!
//! The authoritative decision of whether a presented code grants entry, and
//! the only mutator of a registration's scan state. All transitions go
//! through the store's conditional-update primitives, so two gates scanning
//! the same ticket at once race on the database row, not in process memory.
//!
//! A denied scan is a successful decision, not an error: `scan` only returns
//! `Err` when the store itself fails, and callers surface that distinction to
//! the gate UI (HTTP 200 `valid:false` versus 500).

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;

use crate::models::{NewRegistration, Registration, ScanPolicy};
use crate::store::{IssueOutcome, StoreError, TicketStore};

pub const TICKET_PREFIX: &str = "REG";
const TICKET_ID_ATTEMPTS: usize = 50;

pub const MSG_INVALID_TICKET: &str = "Invalid ticket ID. Registration not found.";
pub const MSG_NOT_ISSUED: &str = "QR code not generated for this registration yet.";
pub const MSG_ALREADY_SCANNED: &str = "Already scanned. This ticket has already been used.";
pub const MSG_CHECKED_IN: &str = "Checked in successfully.";

/// A short human-readable ticket identifier: fixed prefix plus zero-padded
/// random digits. Collisions are expected at this width and handled by
/// [`insert_with_fresh_id`].
pub fn new_ticket_id() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{TICKET_PREFIX}{n:04}")
}

/// Insert a registration under a freshly generated id, regenerating on
/// collision. Gives up after a bounded number of attempts so a nearly full id
/// space degrades into an error instead of a spin.
pub async fn insert_with_fresh_id(
    store: &dyn TicketStore,
    mut new: NewRegistration,
) -> Result<Registration, StoreError> {
    for _ in 0..TICKET_ID_ATTEMPTS {
        new.id = new_ticket_id();
        match store.insert_registration(&new).await {
            Err(StoreError::DuplicateTicketId) => continue,
            other => return other,
        }
    }

    tracing::error!("exhausted ticket id attempts, id space nearly full");
    Err(StoreError::DuplicateTicketId)
}

/// The engine's answer to one verification attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
}

impl ScanOutcome {
    fn granted(registration: Registration) -> Self {
        let message = match registration.scan_policy {
            ScanPolicy::OneShot => MSG_CHECKED_IN.to_string(),
            ScanPolicy::Budgeted => {
                let remaining = registration.max_scans - registration.scans;
                match remaining {
                    0 => "Entry granted. No entries remaining.".to_string(),
                    1 => "Entry granted. 1 entry remaining.".to_string(),
                    n => format!("Entry granted. {n} entries remaining."),
                }
            }
        };
        Self {
            valid: true,
            message,
            registration: Some(registration),
        }
    }

    fn denied(message: impl Into<String>, registration: Option<Registration>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            registration,
        }
    }
}

#[derive(Clone)]
pub struct TicketVerifier {
    store: Arc<dyn TicketStore>,
}

impl TicketVerifier {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Decide one gate scan.
    ///
    /// The happy path is a single conditional increment; only when the guard
    /// fails does the engine read the row to classify the denial. History
    /// recording follows the registration's policy: budgeted tickets log only
    /// granted entries, one-shot tickets additionally log repeat and
    /// premature presentations as invalid attempts.
    pub async fn scan(&self, ticket_id: &str) -> Result<ScanOutcome, StoreError> {
        if let Some(registration) = self.store.consume_scan(ticket_id).await? {
            self.record(ticket_id, true).await;
            tracing::info!(ticket_id, scans = registration.scans, "entry granted");
            return Ok(ScanOutcome::granted(registration));
        }

        let Some(registration) = self.store.registration(ticket_id).await? else {
            tracing::info!(ticket_id, "scan for unknown ticket");
            return Ok(ScanOutcome::denied(MSG_INVALID_TICKET, None));
        };

        if !registration.has_qr {
            if registration.scan_policy == ScanPolicy::OneShot {
                self.record(ticket_id, false).await;
            }
            return Ok(ScanOutcome::denied(MSG_NOT_ISSUED, Some(registration)));
        }

        match registration.scan_policy {
            ScanPolicy::Budgeted => {
                let message = format!(
                    "Maximum entries reached. All {} entries have been used.",
                    registration.max_scans
                );
                Ok(ScanOutcome::denied(message, Some(registration)))
            }
            ScanPolicy::OneShot => {
                self.record(ticket_id, false).await;
                Ok(ScanOutcome::denied(MSG_ALREADY_SCANNED, Some(registration)))
            }
        }
    }

    /// Attach a credential to a pending registration.
    pub async fn issue(&self, id: &str, qr_data: &str) -> Result<IssueOutcome, StoreError> {
        self.store.issue_credential(id, qr_data).await
    }

    /// Return a registration to its pre-issuance state.
    pub async fn revoke(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        self.store.revoke_credential(id).await
    }

    /// Remove a registration and its scan history.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete_registration(id).await
    }

    // History is auditing, not part of the scan's consistency boundary: a
    // failed append is logged and the decision stands.
    async fn record(&self, ticket_id: &str, valid: bool) {
        if let Err(error) = self.store.append_scan(ticket_id, valid).await {
            tracing::warn!(ticket_id, ?error, "failed to append scan history");
        }
    }
}
