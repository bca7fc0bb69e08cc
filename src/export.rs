//! Registration export projections.
//!
//! Pure read-side formatting over registrations already fetched from the
//! store. CSV and JSON are produced here; spreadsheet and PDF writers live
//! outside this service, so those formats are recognized but refused.

use std::fmt::Write as _;
use std::str::FromStr;

use thiserror::Error;

use crate::models::Registration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Pdf,
    Xlsx,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "pdf" => Ok(ExportFormat::Pdf),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown export format '{0}'")]
    UnknownFormat(String),

    #[error("export format '{0}' is not supported by this server")]
    Unsupported(&'static str),

    #[error("failed to serialize registrations: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A finished projection, ready to stream as a download.
#[derive(Debug)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: &'static str,
}

pub fn export(registrations: &[Registration], format: ExportFormat) -> Result<Export, ExportError> {
    match format {
        ExportFormat::Csv => Ok(Export {
            bytes: to_csv(registrations).into_bytes(),
            content_type: "text/csv; charset=utf-8",
            file_name: "registrations.csv",
        }),
        ExportFormat::Json => Ok(Export {
            bytes: serde_json::to_vec_pretty(registrations)?,
            content_type: "application/json",
            file_name: "registrations.json",
        }),
        ExportFormat::Pdf => Err(ExportError::Unsupported("pdf")),
        ExportFormat::Xlsx => Err(ExportError::Unsupported("xlsx")),
    }
}

const CSV_HEADER: &str = "Ticket ID,Name,Email,Phone,Organization,Group Size,Team Members,\
Scans,Max Scans,Status,Created At";

fn to_csv(registrations: &[Registration]) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');

    for reg in registrations {
        let team = reg
            .team_members
            .iter()
            .map(|m| match m.email.as_deref() {
                Some(email) => format!("{} <{}>", m.name, email),
                None => m.name.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");

        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(&reg.id),
            csv_field(reg.name.as_deref().unwrap_or("")),
            csv_field(reg.email.as_deref().unwrap_or("")),
            csv_field(reg.phone.as_deref().unwrap_or("")),
            csv_field(reg.organization.as_deref().unwrap_or("")),
            reg.group_size,
            csv_field(&team),
            reg.scans,
            reg.max_scans,
            reg.status,
            reg.created_at.to_rfc3339(),
        );
    }

    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::models::{RegistrationStatus, ScanPolicy, TeamMember};

    fn registration(id: &str, name: &str) -> Registration {
        Registration {
            id: id.to_string(),
            form_id: Some(1),
            name: Some(name.to_string()),
            email: Some("ada@example.org".to_string()),
            phone: None,
            organization: None,
            group_size: 2,
            team_members: vec![TeamMember {
                name: "Ada".to_string(),
                email: Some("ada@example.org".to_string()),
                phone: None,
            }],
            custom_field_data: BTreeMap::new(),
            scans: 0,
            max_scans: 2,
            scan_policy: ScanPolicy::Budgeted,
            has_qr: false,
            qr_code_data: None,
            status: RegistrationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn csv_has_a_header_and_one_row_per_registration() {
        let regs = vec![registration("REG0001", "Ada"), registration("REG0002", "Grace")];
        let export = export(&regs, ExportFormat::Csv).unwrap();
        let text = String::from_utf8(export.bytes).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Ticket ID,"));
        assert!(lines[1].contains("REG0001"));
        assert!(lines[2].contains("REG0002"));
        assert_eq!(export.content_type, "text/csv; charset=utf-8");
    }

    #[test]
    fn csv_fields_with_commas_and_quotes_are_escaped() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn json_export_round_trips() {
        let regs = vec![registration("REG0001", "Ada")];
        let export = export(&regs, ExportFormat::Json).unwrap();
        let parsed: Vec<Registration> = serde_json::from_slice(&export.bytes).unwrap();
        assert_eq!(parsed[0].id, "REG0001");
    }

    #[test]
    fn format_parsing_is_case_insensitive() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "parquet".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat(_))
        ));
    }

    #[test]
    fn spreadsheet_formats_are_refused() {
        assert!(matches!(
            export(&[], ExportFormat::Xlsx),
            Err(ExportError::Unsupported("xlsx"))
        ));
        assert!(matches!(
            export(&[], ExportFormat::Pdf),
            Err(ExportError::Unsupported("pdf"))
        ));
    }
}
