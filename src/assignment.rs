use crate::error::{ServiceError, ServiceResult};
use crate::model::{Identity, Role, STUDENT_CLASS_ATTR};
use crate::registry::escape_html;
use crate::store::{IdentityFilter, IdentityStore};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

/// Placeholder substituted with the viewer's greeting in page content.
pub const GREETING_PLACEHOLDER: &str = "[student_greeting]";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEntry {
    #[serde(flatten)]
    pub identity: Identity,
    pub class_name: Option<String>,
}

pub struct StudentAssignmentService<'a> {
    conn: &'a Connection,
    identities: &'a dyn IdentityStore,
}

impl<'a> StudentAssignmentService<'a> {
    pub fn new(conn: &'a Connection, identities: &'a dyn IdentityStore) -> Self {
        StudentAssignmentService { conn, identities }
    }

    fn require_identity(&self, student_id: i64) -> ServiceResult<Identity> {
        self.identities
            .get(student_id)?
            .ok_or_else(|| ServiceError::not_found("user", student_id))
    }

    /// Overwrites the assignment. The class is not checked against the registry.
    pub fn assign(&self, student_id: i64, class_name: &str) -> ServiceResult<()> {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err(ServiceError::Validation(
                "class name must not be empty".to_string(),
            ));
        }
        self.require_identity(student_id)?;
        self.identities
            .set_attribute(student_id, STUDENT_CLASS_ATTR, class_name)?;
        tracing::info!(student_id, class = class_name, "student assigned");
        Ok(())
    }

    pub fn unassign(&self, student_id: i64) -> ServiceResult<()> {
        self.require_identity(student_id)?;
        self.identities
            .delete_attribute(student_id, STUDENT_CLASS_ATTR)?;
        tracing::info!(student_id, "student removed from class");
        Ok(())
    }

    pub fn get_assignment(&self, student_id: i64) -> ServiceResult<Option<String>> {
        Ok(self
            .identities
            .get_attribute(student_id, STUDENT_CLASS_ATTR)?
            .filter(|s| !s.is_empty()))
    }

    /// Page of the class with exactly this name, if the class exists and has one.
    pub fn resolve_class_page(&self, class_name: &str) -> ServiceResult<Option<i64>> {
        let page: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT page_id FROM student_classes WHERE name = ?",
                [class_name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(page.flatten())
    }

    /// Profile class field: an empty value clears the assignment.
    pub fn save_profile_class(&self, student_id: i64, value: &str) -> ServiceResult<Option<String>> {
        let value = value.trim();
        if value.is_empty() {
            self.unassign(student_id)?;
            Ok(None)
        } else {
            self.assign(student_id, value)?;
            Ok(Some(value.to_string()))
        }
    }

    /// Student-role identities with their current class, ordered by username.
    pub fn list_students(&self) -> ServiceResult<Vec<StudentEntry>> {
        let students = self.identities.list(&IdentityFilter::role(Role::Student))?;
        let mut out = Vec::with_capacity(students.len());
        for identity in students {
            let class_name = self.get_assignment(identity.id)?;
            out.push(StudentEntry {
                identity,
                class_name,
            });
        }
        Ok(out)
    }

    pub fn render_greeting(&self, identity: Option<&Identity>) -> ServiceResult<String> {
        let Some(identity) = identity else {
            return Ok("<p>Log in to see your personal welcome message.</p>".to_string());
        };
        let mut greeting = String::from("<div class=\"student-greeting\">");
        greeting.push_str(&format!(
            "<h2>Hello {}!</h2>",
            escape_html(&identity.display_name)
        ));
        match self.get_assignment(identity.id)? {
            Some(class_name) => greeting.push_str(&format!(
                "<p>Welcome back to class <strong>{}</strong>.</p>",
                escape_html(&class_name)
            )),
            None => greeting.push_str(
                "<p>You have not been assigned to a class yet. Please contact your teacher.</p>",
            ),
        }
        greeting.push_str("</div>");
        Ok(greeting)
    }

    /// Replaces every greeting placeholder in `content`.
    pub fn render_content(&self, identity: Option<&Identity>, content: &str) -> ServiceResult<String> {
        if !content.contains(GREETING_PLACEHOLDER) {
            return Ok(content.to_string());
        }
        let greeting = self.render_greeting(identity)?;
        Ok(content.replace(GREETING_PLACEHOLDER, &greeting))
    }
}

/// Registration requires a class choice.
pub fn validate_registration_class(value: Option<&str>) -> ServiceResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ServiceError::Validation("select a class".to_string())),
    }
}
