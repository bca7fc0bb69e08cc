//! Outbound notification boundary.
//!
//! Ticket emails are fire-and-forget relative to the HTTP response: issuance
//! reports success as soon as the credential is stored, and a delivery
//! failure never rolls it back. SMTP wiring lives behind this trait.

use async_trait::async_trait;

use crate::models::Registration;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the ticket for a freshly issued credential.
    async fn send_ticket(&self, registration: &Registration, verify_url: &str);
}

/// Logs instead of delivering; stands in until an SMTP sender is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_ticket(&self, registration: &Registration, verify_url: &str) {
        tracing::info!(
            ticket_id = %registration.id,
            email = registration.email.as_deref().unwrap_or("<none>"),
            verify_url,
            "ticket issued; email delivery not configured"
        );
    }
}
