//! CSV bulk import of student identities.
//!
//! Each non-blank line is `username,email,display name`. Rows are handled
//! independently: a rejected row is reported and the next row is processed.

use crate::error::{ServiceError, ServiceResult};
use crate::model::{NewIdentity, Role, STUDENT_CLASS_ATTR};
use crate::store::{generate_password, IdentityStore};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Row { line_no: usize, row: ImportRow },
    Blank,
    /// Fewer than three fields. Skipped without being reported as an error.
    Malformed { line_no: usize, field_count: usize },
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported_count: usize,
    pub errors: Vec<String>,
    /// 1-based line numbers of rows skipped for having fewer than three fields.
    pub skipped_lines: Vec<usize>,
}

pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                buf.push('"');
                chars.next();
                continue;
            }
            in_quotes = !in_quotes;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(std::mem::take(&mut buf));
            continue;
        }
        buf.push(ch);
    }
    out.push(buf);
    out
}

pub fn parse_line(line_no: usize, raw: &str) -> ParsedLine {
    let line = raw.trim();
    if line.is_empty() {
        return ParsedLine::Blank;
    }
    let fields = parse_csv_record(line);
    if fields.len() < 3 {
        return ParsedLine::Malformed {
            line_no,
            field_count: fields.len(),
        };
    }
    ParsedLine::Row {
        line_no,
        row: ImportRow {
            username: fields[0].clone(),
            email: fields[1].clone(),
            display_name: fields[2].clone(),
        },
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Keeps ASCII letters, digits and ` _.-@`.
pub fn sanitize_username(raw: &str) -> String {
    let kept: String = strip_tags(raw)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-' | '@'))
        .collect();
    collapse_whitespace(&kept)
}

pub fn sanitize_text(raw: &str) -> String {
    collapse_whitespace(&strip_tags(raw))
}

/// Returns `None` unless the input looks like `local@domain.tld`.
pub fn sanitize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (local, domain) = trimmed.split_once('@')?;
    let local: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(*c))
        .collect();
    if local.is_empty() {
        return None;
    }
    if domain.contains("..") {
        return None;
    }
    let labels: Vec<String> = domain
        .split('.')
        .map(|label| {
            label
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect::<String>()
                .trim_matches('-')
                .to_string()
        })
        .filter(|label| !label.is_empty())
        .collect();
    if labels.len() < 2 {
        return None;
    }
    let email = format!("{}@{}", local, labels.join("."));
    if email.len() < 6 {
        return None;
    }
    Some(email)
}

pub struct BulkImportProcessor<'a> {
    identities: &'a dyn IdentityStore,
    email_domain: String,
}

impl<'a> BulkImportProcessor<'a> {
    pub fn new(identities: &'a dyn IdentityStore, email_domain: &str) -> Self {
        BulkImportProcessor {
            identities,
            email_domain: email_domain.trim().trim_start_matches('@').to_string(),
        }
    }

    pub fn import_csv(&self, text: &str, class_name: &str) -> ServiceResult<ImportReport> {
        let class_name = class_name.trim();
        if text.trim().is_empty() {
            return Err(ServiceError::Validation("csv data must not be empty".to_string()));
        }
        if class_name.is_empty() {
            return Err(ServiceError::Validation("select a class".to_string()));
        }

        let mut report = ImportReport::default();
        for (idx, raw) in text.split('\n').enumerate() {
            match parse_line(idx + 1, raw) {
                ParsedLine::Blank => {}
                ParsedLine::Malformed {
                    line_no,
                    field_count,
                } => {
                    tracing::debug!(line_no, field_count, "import row skipped");
                    report.skipped_lines.push(line_no);
                }
                ParsedLine::Row { line_no, row } => match self.import_row(&row, class_name) {
                    Ok(id) => {
                        tracing::debug!(line_no, identity_id = id, "import row created");
                        report.imported_count += 1;
                    }
                    Err(e) => {
                        tracing::warn!(line_no, error = %e, "import row rejected");
                        report.errors.push(e.to_string());
                    }
                },
            }
        }

        tracing::info!(
            class = class_name,
            imported = report.imported_count,
            errors = report.errors.len(),
            skipped = report.skipped_lines.len(),
            "csv import finished"
        );
        Ok(report)
    }

    fn import_row(&self, row: &ImportRow, class_name: &str) -> ServiceResult<i64> {
        let username = sanitize_username(&row.username);
        let raw_email = row.email.trim();
        let email = if raw_email.is_empty() && !username.is_empty() {
            sanitize_email(&format!("{}@{}", username.replace(' ', "."), self.email_domain))
        } else {
            sanitize_email(raw_email)
        };
        let display_name = sanitize_text(&row.display_name);

        let creation_failed = |reason: String| ServiceError::IdentityCreationFailed {
            username: username.clone(),
            reason,
        };

        let username_taken = !username.is_empty() && self.identities.username_exists(&username)?;
        let email_taken = match &email {
            Some(e) => self.identities.email_exists(e)?,
            None => false,
        };
        if username_taken || email_taken {
            return Err(ServiceError::DuplicateIdentity {
                username: username.clone(),
                email: email.clone().unwrap_or_else(|| raw_email.to_string()),
            });
        }
        if username.is_empty() {
            return Err(creation_failed(
                "cannot create a user with an empty login name".to_string(),
            ));
        }
        let Some(email) = email else {
            return Err(creation_failed(format!("invalid email address: {}", raw_email)));
        };

        let id = self
            .identities
            .create_identity(&NewIdentity {
                username: username.clone(),
                email,
                password: generate_password(),
                display_name,
                role: Role::Student,
            })
            .map_err(|e| creation_failed(format!("{:#}", e)))?;
        self.identities
            .set_attribute(id, STUDENT_CLASS_ATTR, class_name)
            .map_err(|e| creation_failed(format!("{:#}", e)))?;
        Ok(id)
    }
}
