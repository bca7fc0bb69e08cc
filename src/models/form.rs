use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::registration::ScanPolicy;

/// Admin-authored registration form template. Mutated only by admin edits;
/// registration traffic reads it but never writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventForm {
    pub id: i32,
    pub title: String,
    pub banner_url: Option<String>,
    pub custom_links: Vec<CustomLink>,
    pub custom_fields: Vec<CustomFieldDefinition>,
    pub base_fields: BaseFieldsConfig,
    pub scan_policy: ScanPolicy,
    pub is_published: bool,
    pub success_title: Option<String>,
    pub success_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a form. Ids and timestamps are store-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFormDraft {
    pub title: String,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub custom_links: Vec<CustomLink>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDefinition>,
    #[serde(default)]
    pub base_fields: BaseFieldsConfig,
    #[serde(default = "default_scan_policy")]
    pub scan_policy: ScanPolicy,
    #[serde(default)]
    pub success_title: Option<String>,
    #[serde(default)]
    pub success_message: Option<String>,
}

fn default_scan_policy() -> ScanPolicy {
    ScanPolicy::Budgeted
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomLink {
    pub label: String,
    pub url: String,
}

/// The closed set of custom-field types. Each variant carries the constraint
/// parameters it needs, so the rules engine can match exhaustively instead of
/// branching on a type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Textarea,
    Url,
    Photo,
    #[serde(rename_all = "camelCase")]
    Payment { payment_url: String },
}

/// An admin-defined form field beyond the base set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDefinition {
    pub id: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub help_text: Option<String>,
}

/// Per-base-field presentation and requiredness knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseFieldConfig {
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    pub enabled: bool,
    pub required: bool,
}

impl BaseFieldConfig {
    fn new(label: &str, enabled: bool, required: bool) -> Self {
        Self {
            label: label.to_string(),
            placeholder: None,
            help_text: None,
            enabled,
            required,
        }
    }
}

/// Group-size knobs: the shared config plus the selectable range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSizeConfig {
    #[serde(flatten)]
    pub field: BaseFieldConfig,
    pub min: i32,
    pub max: i32,
}

/// Team-roster knobs: roster cap plus fee metadata shown on the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMembersConfig {
    pub label: String,
    pub max_team_members: u32,
    #[serde(default)]
    pub fee_per_member: Option<Decimal>,
    #[serde(default)]
    pub fee_note: Option<String>,
}

/// Which well-known registrant attributes a form collects, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseFieldsConfig {
    pub name: BaseFieldConfig,
    pub email: BaseFieldConfig,
    pub phone: BaseFieldConfig,
    pub organization: BaseFieldConfig,
    pub group_size: GroupSizeConfig,
    pub team_members: TeamMembersConfig,
}

impl Default for BaseFieldsConfig {
    fn default() -> Self {
        Self {
            name: BaseFieldConfig::new("Full name", true, true),
            email: BaseFieldConfig::new("Email address", true, true),
            phone: BaseFieldConfig::new("Phone number", true, false),
            organization: BaseFieldConfig::new("Organization", true, false),
            group_size: GroupSizeConfig {
                field: BaseFieldConfig::new("Group size", true, false),
                min: 1,
                max: 4,
            },
            team_members: TeamMembersConfig {
                label: "Team members".to_string(),
                max_team_members: 4,
                fee_per_member: None,
                fee_note: None,
            },
        }
    }
}

/// Aggregate counters for one form's registrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStats {
    pub total_registrations: i64,
    pub qr_issued: i64,
    pub attended: i64,
    pub pending: i64,
    pub total_scans: i64,
    pub total_attendees: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_kind_round_trips_with_type_tag() {
        let def: CustomFieldDefinition = serde_json::from_str(
            r#"{"id":"tx-ref","type":"payment","paymentUrl":"https://pay.example/evt","label":"Payment proof","required":true}"#,
        )
        .unwrap();
        assert_eq!(
            def.kind,
            FieldKind::Payment {
                payment_url: "https://pay.example/evt".to_string()
            }
        );

        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], serde_json::json!("payment"));
        assert_eq!(json["paymentUrl"], serde_json::json!("https://pay.example/evt"));
    }

    #[test]
    fn plain_field_kinds_need_no_extra_parameters() {
        let def: CustomFieldDefinition =
            serde_json::from_str(r#"{"id":"notes","type":"textarea","label":"Notes"}"#).unwrap();
        assert_eq!(def.kind, FieldKind::Textarea);
        assert!(!def.required);
    }

    #[test]
    fn base_fields_default_keeps_the_roster_cap() {
        let base = BaseFieldsConfig::default();
        assert!(base.name.enabled && base.name.required);
        assert_eq!(base.group_size.min, 1);
        assert_eq!(base.group_size.max, 4);
        assert_eq!(base.team_members.max_team_members, 4);
    }

    #[test]
    fn draft_defaults_to_budgeted_policy() {
        let draft: EventFormDraft = serde_json::from_str(r#"{"title":"Hackathon"}"#).unwrap();
        assert_eq!(draft.scan_policy, ScanPolicy::Budgeted);
        assert!(draft.custom_fields.is_empty());
    }
}
