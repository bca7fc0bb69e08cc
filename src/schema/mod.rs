//! Submission rules derived from form configuration.
//!
//! A form's base-field knobs and custom-field definitions are compiled into a
//! [`RegistrationRules`] value, and submissions are accepted or rejected
//! against it with one human-readable message per failing field. The same
//! `(base_fields, custom_fields)` pair always compiles to the same ruleset,
//! so callers may cache the result keyed on the pair.
//!
//! Disabled base fields are absent from the ruleset entirely; nothing is
//! validated that the configuration does not name. The one exception is the
//! team roster, which is always required: every registration must identify
//! at least one human.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{
    BaseFieldsConfig, CustomFieldDefinition, CustomFieldValue, FieldKind, TeamMember,
};

const MIN_TEXT_LEN: usize = 2;
const MIN_PHONE_DIGITS: usize = 7;

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

fn is_email_shaped(value: &str) -> bool {
    EMAIL_SHAPE.is_match(value.trim())
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(|c| c.is_ascii_digit()).count()
}

fn is_url_shaped(value: &str) -> bool {
    url::Url::parse(value.trim()).is_ok()
}

/// Field-keyed validation failures, ordered by field key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.insert(key.into(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{key}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// A public registration submission, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSubmission {
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
    pub team_members: Vec<TeamMember>,
    #[serde(default)]
    pub custom_field_data: BTreeMap<String, CustomFieldValue>,
}

/// One compiled rule. Base-field rules carry their knobs; custom rules carry
/// the whole definition so the value check can match on the field kind.
#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Name { label: String, required: bool },
    Email { label: String, required: bool },
    Phone { label: String, required: bool },
    Organization { label: String, required: bool },
    GroupSize { label: String, required: bool, min: i32, max: i32 },
    TeamRoster { max_members: usize },
    Custom(CustomFieldDefinition),
}

/// The validation ruleset for one form configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRules {
    rules: Vec<Rule>,
}

impl RegistrationRules {
    /// Compile the ruleset. Base rules come first in a fixed order, then the
    /// unconditional roster rule, then custom rules in authored order, so a
    /// custom field reusing a base key overrides the base message (last
    /// applied wins).
    pub fn build(base: &BaseFieldsConfig, custom: &[CustomFieldDefinition]) -> Self {
        let mut rules = Vec::new();

        if base.name.enabled {
            rules.push(Rule::Name {
                label: base.name.label.clone(),
                required: base.name.required,
            });
        }
        if base.email.enabled {
            rules.push(Rule::Email {
                label: base.email.label.clone(),
                required: base.email.required,
            });
        }
        if base.phone.enabled {
            rules.push(Rule::Phone {
                label: base.phone.label.clone(),
                required: base.phone.required,
            });
        }
        if base.organization.enabled {
            rules.push(Rule::Organization {
                label: base.organization.label.clone(),
                required: base.organization.required,
            });
        }
        if base.group_size.field.enabled {
            rules.push(Rule::GroupSize {
                label: base.group_size.field.label.clone(),
                required: base.group_size.field.required,
                min: base.group_size.min,
                max: base.group_size.max,
            });
        }

        rules.push(Rule::TeamRoster {
            max_members: base.team_members.max_team_members as usize,
        });

        rules.extend(custom.iter().cloned().map(Rule::Custom));

        Self { rules }
    }

    /// Check a submission, collecting one message per failing field.
    pub fn validate(&self, submission: &RegistrationSubmission) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for rule in &self.rules {
            match rule {
                Rule::Name { label, required } => check_min_len(
                    &mut errors,
                    "name",
                    label,
                    *required,
                    submission.name.as_deref(),
                ),
                Rule::Organization { label, required } => check_min_len(
                    &mut errors,
                    "organization",
                    label,
                    *required,
                    submission.organization.as_deref(),
                ),
                Rule::Email { label, required } => {
                    match present(submission.email.as_deref()) {
                        Some(value) if !is_email_shaped(value) => {
                            errors.insert("email", format!("{label} must be a valid email address."));
                        }
                        Some(_) => {}
                        None if *required => {
                            errors.insert("email", format!("{label} is required."));
                        }
                        None => {}
                    }
                }
                Rule::Phone { label, required } => {
                    match present(submission.phone.as_deref()) {
                        Some(value) if digit_count(value) < MIN_PHONE_DIGITS => {
                            errors.insert(
                                "phone",
                                format!("{label} must contain at least {MIN_PHONE_DIGITS} digits."),
                            );
                        }
                        Some(_) => {}
                        None if *required => {
                            errors.insert("phone", format!("{label} is required."));
                        }
                        None => {}
                    }
                }
                Rule::GroupSize {
                    label,
                    required,
                    min,
                    max,
                } => match submission.group_size {
                    Some(size) if size < *min || size > *max => {
                        errors.insert(
                            "groupSize",
                            format!("{label} must be between {min} and {max}."),
                        );
                    }
                    Some(_) => {}
                    None if *required => {
                        errors.insert("groupSize", format!("{label} is required."));
                    }
                    None => {}
                },
                Rule::TeamRoster { max_members } => {
                    check_roster(&mut errors, &submission.team_members, *max_members);
                }
                Rule::Custom(def) => {
                    check_custom(&mut errors, def, submission.custom_field_data.get(&def.id));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_min_len(
    errors: &mut ValidationErrors,
    key: &str,
    label: &str,
    required: bool,
    value: Option<&str>,
) {
    match present(value) {
        Some(value) if value.chars().count() < MIN_TEXT_LEN => {
            errors.insert(key, format!("{label} must be at least {MIN_TEXT_LEN} characters."));
        }
        Some(_) => {}
        None if required => {
            errors.insert(key, format!("{label} is required."));
        }
        None => {}
    }
}

fn check_roster(errors: &mut ValidationErrors, members: &[TeamMember], max_members: usize) {
    if members.is_empty() {
        errors.insert("teamMembers", "At least one team member is required.");
        return;
    }
    if members.len() > max_members {
        errors.insert(
            "teamMembers",
            format!("At most {max_members} team members are allowed."),
        );
        return;
    }
    if members.iter().any(|m| m.name.trim().is_empty()) {
        errors.insert("teamMembers", "Every team member needs a name.");
        return;
    }

    let any_reachable = members.iter().any(|m| {
        m.email.as_deref().is_some_and(is_email_shaped)
            && m.phone
                .as_deref()
                .is_some_and(|p| digit_count(p) >= MIN_PHONE_DIGITS)
    });
    if !any_reachable {
        errors.insert(
            "teamMembers",
            "At least one team member needs a valid email address and phone number.",
        );
    }
}

fn check_custom(
    errors: &mut ValidationErrors,
    def: &CustomFieldDefinition,
    value: Option<&CustomFieldValue>,
) {
    let value = value.filter(|v| !v.is_empty());
    let Some(value) = value else {
        if def.required {
            errors.insert(def.id.clone(), format!("{} is required.", def.label));
        }
        return;
    };

    match &def.kind {
        FieldKind::Text | FieldKind::Textarea => {}
        FieldKind::Email => {
            if !text_value(value).is_some_and(is_email_shaped) {
                errors.insert(
                    def.id.clone(),
                    format!("{} must be a valid email address.", def.label),
                );
            }
        }
        FieldKind::Phone => {
            if !text_value(value).is_some_and(|v| digit_count(v) >= MIN_PHONE_DIGITS) {
                errors.insert(
                    def.id.clone(),
                    format!("{} must contain at least {MIN_PHONE_DIGITS} digits.", def.label),
                );
            }
        }
        FieldKind::Url => {
            if !text_value(value).is_some_and(is_url_shaped) {
                errors.insert(def.id.clone(), format!("{} must be a valid URL.", def.label));
            }
        }
        // Any non-empty reference counts: an upload or a plain text pointer.
        FieldKind::Photo => {}
        FieldKind::Payment { .. } => {}
    }
}

fn text_value(value: &CustomFieldValue) -> Option<&str> {
    match value {
        CustomFieldValue::Text(s) => Some(s.as_str()),
        CustomFieldValue::File(_) => None,
    }
}

/// Form-save validation for custom-field definitions: payment fields must
/// carry a usable payment link, and every field needs an id.
pub fn validate_field_definitions(fields: &[CustomFieldDefinition]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for def in fields {
        if def.id.trim().is_empty() {
            errors.insert("customFields", "Every custom field needs an id.");
            continue;
        }
        if let FieldKind::Payment { payment_url } = &def.kind {
            if payment_url.trim().is_empty() {
                errors.insert(
                    def.id.clone(),
                    format!("{} needs a payment link URL.", def.label),
                );
            } else if !is_url_shaped(payment_url) {
                errors.insert(
                    def.id.clone(),
                    format!("{} payment link must be a valid URL.", def.label),
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
