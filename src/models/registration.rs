use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a ticket's scan budget is derived and spent.
///
/// `Budgeted` lets every group member enter separately: the budget equals the
/// group size and the ticket moves through `active` to `exhausted`. `OneShot`
/// admits the whole party on a single check-in and marks the ticket
/// `checked-in` immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPolicy {
    Budgeted,
    OneShot,
}

impl ScanPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPolicy::Budgeted => "budgeted",
            ScanPolicy::OneShot => "one-shot",
        }
    }

    /// Scan ceiling for a new registration under this policy.
    pub fn max_scans_for(&self, group_size: i32) -> i32 {
        match self {
            ScanPolicy::Budgeted => group_size.max(1),
            ScanPolicy::OneShot => 1,
        }
    }
}

impl FromStr for ScanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "budgeted" => Ok(ScanPolicy::Budgeted),
            "one-shot" => Ok(ScanPolicy::OneShot),
            other => Err(format!("unknown scan policy '{other}'")),
        }
    }
}

impl fmt::Display for ScanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a registration.
///
/// Always derivable from `(has_qr, scans, max_scans, scan_policy)` via
/// [`RegistrationStatus::derive`]; stores persist the derived value alongside
/// the counters but must never let them disagree. `Invalid` is reserved for
/// ticket identifiers with no matching registration and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationStatus {
    Pending,
    Active,
    CheckedIn,
    Exhausted,
    Invalid,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Active => "active",
            RegistrationStatus::CheckedIn => "checked-in",
            RegistrationStatus::Exhausted => "exhausted",
            RegistrationStatus::Invalid => "invalid",
        }
    }

    /// Recompute the status implied by the credential flag and scan counters.
    pub fn derive(has_qr: bool, scans: i32, max_scans: i32, policy: ScanPolicy) -> Self {
        if !has_qr {
            return RegistrationStatus::Pending;
        }
        if scans >= max_scans {
            return match policy {
                ScanPolicy::Budgeted => RegistrationStatus::Exhausted,
                ScanPolicy::OneShot => RegistrationStatus::CheckedIn,
            };
        }
        RegistrationStatus::Active
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "active" => Ok(RegistrationStatus::Active),
            "checked-in" => Ok(RegistrationStatus::CheckedIn),
            "exhausted" => Ok(RegistrationStatus::Exhausted),
            "invalid" => Ok(RegistrationStatus::Invalid),
            other => Err(format!("unknown registration status '{other}'")),
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One person on a team roster. Storage keeps contact details optional; the
/// submission rules decide what the roster must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Reference to a file an attendee uploaded with their submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub file_name: String,
    pub url: String,
}

/// A submitted custom-field value: either plain text or an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomFieldValue {
    File(FileRef),
    Text(String),
}

impl CustomFieldValue {
    /// Whether the value carries any content at all.
    pub fn is_empty(&self) -> bool {
        match self {
            CustomFieldValue::Text(s) => s.trim().is_empty(),
            CustomFieldValue::File(f) => f.url.trim().is_empty(),
        }
    }
}

/// One attendee or team submission, carrying a scan budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub form_id: Option<i32>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub group_size: i32,
    pub team_members: Vec<TeamMember>,
    pub custom_field_data: BTreeMap<String, CustomFieldValue>,
    pub scans: i32,
    pub max_scans: i32,
    pub scan_policy: ScanPolicy,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
    pub qr_code_data: Option<String>,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a registration. New rows always start unissued with a
/// zero scan count and `pending` status.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub id: String,
    pub form_id: Option<i32>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub group_size: i32,
    pub team_members: Vec<TeamMember>,
    pub custom_field_data: BTreeMap<String, CustomFieldValue>,
    pub max_scans: i32,
    pub scan_policy: ScanPolicy,
}

/// Partial admin edit. Absent fields are left untouched; edits are
/// admin-trusted and bypass the submission rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub group_size: Option<i32>,
    #[serde(default)]
    pub team_members: Option<Vec<TeamMember>>,
    #[serde(default)]
    pub custom_field_data: Option<BTreeMap<String, CustomFieldValue>>,
}

impl RegistrationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.organization.is_none()
            && self.group_size.is_none()
            && self.team_members.is_none()
            && self.custom_field_data.is_none()
    }
}
