use std::sync::Arc;

use crate::auth::AdminSessions;
use crate::config::Config;
use crate::notify::Mailer;
use crate::store::TicketStore;
use crate::ticket::TicketVerifier;

/// Shared application state handed to every handler. Built once in `main`
/// (or a test harness) and cloned per request; the store handle is injected,
/// never a process-wide global.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TicketStore>,
    pub verifier: TicketVerifier,
    pub sessions: AdminSessions,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn TicketStore>, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        Self {
            verifier: TicketVerifier::new(store.clone()),
            store,
            sessions: AdminSessions::new(),
            mailer,
            config: Arc::new(config),
        }
    }
}
