//! In-memory [`TicketStore`] adapter.
//!
//! Backs the integration tests (and local demos) without a PostgreSQL
//! instance. One mutex guards all state, which makes every conditional
//! mutation exactly as atomic as the SQL adapter's single-statement updates.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{
    EventForm, EventFormDraft, FormStats, NewRegistration, Registration, RegistrationPatch,
    RegistrationStatus, ScanHistoryEntry,
};

use super::{IssueOutcome, StoreError, TicketStore};

#[derive(Default)]
struct Inner {
    registrations: BTreeMap<String, Registration>,
    forms: BTreeMap<i32, EventForm>,
    history: Vec<ScanHistoryEntry>,
    next_form_id: i32,
    next_scan_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_registration(
        &self,
        new: &NewRegistration,
    ) -> Result<Registration, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.registrations.contains_key(&new.id) {
            return Err(StoreError::DuplicateTicketId);
        }

        let registration = Registration {
            id: new.id.clone(),
            form_id: new.form_id,
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            organization: new.organization.clone(),
            group_size: new.group_size,
            team_members: new.team_members.clone(),
            custom_field_data: new.custom_field_data.clone(),
            scans: 0,
            max_scans: new.max_scans,
            scan_policy: new.scan_policy,
            has_qr: false,
            qr_code_data: None,
            status: RegistrationStatus::Pending,
            created_at: Utc::now(),
        };
        inner
            .registrations
            .insert(registration.id.clone(), registration.clone());

        Ok(registration)
    }

    async fn registration(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.registrations.get(id).cloned())
    }

    async fn list_registrations(
        &self,
        form_id: Option<i32>,
    ) -> Result<Vec<Registration>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<Registration> = inner
            .registrations
            .values()
            .filter(|r| form_id.is_none() || r.form_id == form_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(out)
    }

    async fn update_registration(
        &self,
        id: &str,
        patch: &RegistrationPatch,
    ) -> Result<Option<Registration>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(reg) = inner.registrations.get_mut(id) else {
            return Ok(None);
        };

        if let Some(name) = &patch.name {
            reg.name = Some(name.clone());
        }
        if let Some(email) = &patch.email {
            reg.email = Some(email.clone());
        }
        if let Some(phone) = &patch.phone {
            reg.phone = Some(phone.clone());
        }
        if let Some(organization) = &patch.organization {
            reg.organization = Some(organization.clone());
        }
        if let Some(group_size) = patch.group_size {
            reg.group_size = group_size;
        }
        if let Some(team_members) = &patch.team_members {
            reg.team_members = team_members.clone();
        }
        if let Some(custom_field_data) = &patch.custom_field_data {
            reg.custom_field_data = custom_field_data.clone();
        }

        Ok(Some(reg.clone()))
    }

    async fn delete_registration(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.registrations.remove(id).is_some();
        if removed {
            inner.history.retain(|entry| entry.ticket_id != id);
        }

        Ok(removed)
    }

    async fn issue_credential(
        &self,
        id: &str,
        qr_data: &str,
    ) -> Result<IssueOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(reg) = inner.registrations.get_mut(id) else {
            return Ok(IssueOutcome::NotFound);
        };
        if reg.has_qr {
            return Ok(IssueOutcome::AlreadyIssued);
        }

        reg.has_qr = true;
        reg.qr_code_data = Some(qr_data.to_string());
        reg.status = RegistrationStatus::derive(true, reg.scans, reg.max_scans, reg.scan_policy);

        Ok(IssueOutcome::Issued(reg.clone()))
    }

    async fn revoke_credential(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(reg) = inner.registrations.get_mut(id) else {
            return Ok(None);
        };

        reg.has_qr = false;
        reg.qr_code_data = None;
        reg.scans = 0;
        reg.status = RegistrationStatus::Pending;

        Ok(Some(reg.clone()))
    }

    async fn consume_scan(&self, id: &str) -> Result<Option<Registration>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(reg) = inner.registrations.get_mut(id) else {
            return Ok(None);
        };
        if !reg.has_qr || reg.scans >= reg.max_scans {
            return Ok(None);
        }

        reg.scans += 1;
        reg.status = RegistrationStatus::derive(true, reg.scans, reg.max_scans, reg.scan_policy);

        Ok(Some(reg.clone()))
    }

    async fn append_scan(&self, ticket_id: &str, valid: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_scan_id += 1;
        let entry = ScanHistoryEntry {
            id: inner.next_scan_id,
            ticket_id: ticket_id.to_string(),
            scanned_at: Utc::now(),
            valid,
        };
        inner.history.push(entry);

        Ok(())
    }

    async fn scan_history(&self, ticket_id: &str) -> Result<Vec<ScanHistoryEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<ScanHistoryEntry> = inner
            .history
            .iter()
            .filter(|entry| entry.ticket_id == ticket_id)
            .cloned()
            .collect();
        out.reverse();

        Ok(out)
    }

    async fn insert_form(&self, draft: &EventFormDraft) -> Result<EventForm, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_form_id += 1;
        let now = Utc::now();
        let form = EventForm {
            id: inner.next_form_id,
            title: draft.title.clone(),
            banner_url: draft.banner_url.clone(),
            custom_links: draft.custom_links.clone(),
            custom_fields: draft.custom_fields.clone(),
            base_fields: draft.base_fields.clone(),
            scan_policy: draft.scan_policy,
            is_published: false,
            success_title: draft.success_title.clone(),
            success_message: draft.success_message.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.forms.insert(form.id, form.clone());

        Ok(form)
    }

    async fn update_form(
        &self,
        id: i32,
        draft: &EventFormDraft,
    ) -> Result<Option<EventForm>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(form) = inner.forms.get_mut(&id) else {
            return Ok(None);
        };

        form.title = draft.title.clone();
        form.banner_url = draft.banner_url.clone();
        form.custom_links = draft.custom_links.clone();
        form.custom_fields = draft.custom_fields.clone();
        form.base_fields = draft.base_fields.clone();
        form.scan_policy = draft.scan_policy;
        form.success_title = draft.success_title.clone();
        form.success_message = draft.success_message.clone();
        form.updated_at = Utc::now();

        Ok(Some(form.clone()))
    }

    async fn form(&self, id: i32) -> Result<Option<EventForm>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.forms.get(&id).cloned())
    }

    async fn list_forms(&self) -> Result<Vec<EventForm>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<EventForm> = inner.forms.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(out)
    }

    async fn published_form(&self) -> Result<Option<EventForm>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.forms.values().find(|f| f.is_published).cloned())
    }

    async fn publish_form(&self, id: i32) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.forms.contains_key(&id) {
            return Ok(false);
        }

        let now = Utc::now();
        for form in inner.forms.values_mut() {
            form.is_published = form.id == id;
            if form.id == id {
                form.updated_at = now;
            }
        }

        Ok(true)
    }

    async fn delete_form(&self, id: i32) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.forms.remove(&id).is_none() {
            return Ok(false);
        }

        for reg in inner.registrations.values_mut() {
            if reg.form_id == Some(id) {
                reg.form_id = None;
            }
        }

        Ok(true)
    }

    async fn form_stats(&self, form_id: i32) -> Result<FormStats, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut stats = FormStats {
            total_registrations: 0,
            qr_issued: 0,
            attended: 0,
            pending: 0,
            total_scans: 0,
            total_attendees: 0,
        };
        for reg in inner
            .registrations
            .values()
            .filter(|r| r.form_id == Some(form_id))
        {
            stats.total_registrations += 1;
            if reg.has_qr {
                stats.qr_issued += 1;
            }
            if reg.scans > 0 {
                stats.attended += 1;
            }
            if reg.status == RegistrationStatus::Pending {
                stats.pending += 1;
            }
            stats.total_scans += i64::from(reg.scans);
            stats.total_attendees += i64::from(reg.group_size);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::ScanPolicy;

    fn new_registration(id: &str, max_scans: i32) -> NewRegistration {
        NewRegistration {
            id: id.to_string(),
            form_id: None,
            name: Some("Ada".to_string()),
            email: None,
            phone: None,
            organization: None,
            group_size: max_scans,
            team_members: vec![],
            custom_field_data: BTreeMap::new(),
            max_scans,
            scan_policy: ScanPolicy::Budgeted,
        }
    }

    fn draft(title: &str) -> EventFormDraft {
        EventFormDraft {
            title: title.to_string(),
            banner_url: None,
            custom_links: vec![],
            custom_fields: vec![],
            base_fields: Default::default(),
            scan_policy: ScanPolicy::Budgeted,
            success_title: None,
            success_message: None,
        }
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        store
            .insert_registration(&new_registration("REG0001", 1))
            .await
            .unwrap();
        let err = store
            .insert_registration(&new_registration("REG0001", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTicketId));
    }

    #[tokio::test]
    async fn publishing_flips_exactly_one_form() {
        let store = MemoryStore::new();
        let a = store.insert_form(&draft("Form A")).await.unwrap();
        let b = store.insert_form(&draft("Form B")).await.unwrap();

        assert!(store.publish_form(a.id).await.unwrap());
        assert_eq!(store.published_form().await.unwrap().unwrap().id, a.id);

        assert!(store.publish_form(b.id).await.unwrap());
        let published = store.published_form().await.unwrap().unwrap();
        assert_eq!(published.id, b.id);

        let still_published: Vec<i32> = store
            .list_forms()
            .await
            .unwrap()
            .into_iter()
            .filter(|f| f.is_published)
            .map(|f| f.id)
            .collect();
        assert_eq!(still_published, vec![b.id]);
    }

    #[tokio::test]
    async fn publishing_an_unknown_form_changes_nothing() {
        let store = MemoryStore::new();
        let a = store.insert_form(&draft("Form A")).await.unwrap();
        store.publish_form(a.id).await.unwrap();

        assert!(!store.publish_form(999).await.unwrap());
        assert_eq!(store.published_form().await.unwrap().unwrap().id, a.id);
    }

    #[tokio::test]
    async fn consume_scan_refuses_without_credential() {
        let store = MemoryStore::new();
        store
            .insert_registration(&new_registration("REG0002", 2))
            .await
            .unwrap();
        assert!(store.consume_scan("REG0002").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_registration_drops_its_history() {
        let store = MemoryStore::new();
        store
            .insert_registration(&new_registration("REG0003", 1))
            .await
            .unwrap();
        store.append_scan("REG0003", true).await.unwrap();
        assert_eq!(store.scan_history("REG0003").await.unwrap().len(), 1);

        assert!(store.delete_registration("REG0003").await.unwrap());
        assert!(store.scan_history("REG0003").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_form_keeps_registrations_unassociated() {
        let store = MemoryStore::new();
        let form = store.insert_form(&draft("Form A")).await.unwrap();
        let mut new = new_registration("REG0004", 1);
        new.form_id = Some(form.id);
        store.insert_registration(&new).await.unwrap();

        assert!(store.delete_form(form.id).await.unwrap());
        let reg = store.registration("REG0004").await.unwrap().unwrap();
        assert_eq!(reg.form_id, None);
    }
}
