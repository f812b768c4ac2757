use crate::assignment::GREETING_PLACEHOLDER;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{ClassRecord, Identity, NewPage, PageStatus, Role, STUDENT_CLASS_ATTR};
use crate::store::{ContentStore, IdentityFilter, IdentityStore};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

const STEP_DELETE_PAGE: &str = "delete_page";
const STEP_CLEAR_ASSIGNMENTS: &str = "clear_assignments";
const STEP_DELETE_RECORD: &str = "delete_record";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    #[serde(flatten)]
    pub record: ClassRecord,
    pub student_count: usize,
    pub page_url: Option<String>,
    pub edit_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassView {
    #[serde(flatten)]
    pub record: ClassRecord,
    pub page_url: Option<String>,
    pub edit_url: Option<String>,
    pub students: Vec<Identity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub class_id: String,
    pub name: String,
    pub page_deleted: bool,
    pub cleared_student_ids: Vec<i64>,
}

/// Class records in the `student_classes` table plus the page each one owns.
pub struct ClassRegistry<'a> {
    conn: &'a Connection,
    content: &'a dyn ContentStore,
    identities: &'a dyn IdentityStore,
}

fn record_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ClassRecord> {
    Ok(ClassRecord {
        id: r.get(0)?,
        name: r.get(1)?,
        page_ref: r.get(2)?,
        created_at: r.get(3)?,
    })
}

impl<'a> ClassRegistry<'a> {
    pub fn new(
        conn: &'a Connection,
        content: &'a dyn ContentStore,
        identities: &'a dyn IdentityStore,
    ) -> Self {
        ClassRegistry {
            conn,
            content,
            identities,
        }
    }

    pub fn find_by_name(&self, name: &str) -> ServiceResult<Option<ClassRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, page_id, created_at FROM student_classes WHERE name = ?",
                [name],
                record_from_row,
            )
            .optional()?)
    }

    pub fn find_by_id(&self, id: &str) -> ServiceResult<Option<ClassRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, page_id, created_at FROM student_classes WHERE id = ?",
                [id],
                record_from_row,
            )
            .optional()?)
    }

    /// Creates the class page first and the record second. A record is only
    /// written once its page exists.
    pub fn create_class(&self, name: &str) -> ServiceResult<ClassRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation(
                "class name must not be empty".to_string(),
            ));
        }
        if self.find_by_name(name)?.is_some() {
            return Err(ServiceError::DuplicateName(name.to_string()));
        }

        let page_id = self
            .content
            .create_page(&NewPage {
                title: name.to_string(),
                body: class_page_body(name),
                status: PageStatus::Publish,
            })
            .map_err(|e| ServiceError::Content(format!("{:#}", e)))?;

        let record = ClassRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            page_ref: Some(page_id),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.conn.execute(
            "INSERT INTO student_classes(id, name, page_id, created_at) VALUES(?, ?, ?, ?)",
            (&record.id, &record.name, record.page_ref, &record.created_at),
        ) {
            // The page must not outlive a record that was never written.
            if let Err(cleanup) = self.content.delete_page(page_id, true) {
                tracing::warn!(page_id, error = %cleanup, "orphaned class page left behind");
            }
            if ServiceError::is_constraint_violation(&e) {
                return Err(ServiceError::DuplicateName(record.name));
            }
            return Err(e.into());
        }

        tracing::info!(class = %record.name, class_id = %record.id, page_id, "class created");
        Ok(record)
    }

    /// Ordered cascade: page, then assignments, then record. Stops at the
    /// first failing step; completed steps stay applied.
    pub fn delete_class(&self, id: &str) -> ServiceResult<DeleteReport> {
        let record = self
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::not_found("class", id))?;
        let mut completed: Vec<&'static str> = Vec::new();

        let mut page_deleted = false;
        if let Some(page_id) = record.page_ref {
            match self.content.delete_page(page_id, true) {
                Ok(removed) => page_deleted = removed,
                Err(e) => {
                    return Err(cascade_failed(STEP_DELETE_PAGE, &completed, e.to_string()))
                }
            }
        }
        completed.push(STEP_DELETE_PAGE);

        let assigned = self
            .identities
            .list(&IdentityFilter::attribute(STUDENT_CLASS_ATTR, &record.name))
            .map_err(|e| cascade_failed(STEP_CLEAR_ASSIGNMENTS, &completed, e.to_string()))?;
        let mut cleared = Vec::with_capacity(assigned.len());
        for identity in &assigned {
            self.identities
                .delete_attribute(identity.id, STUDENT_CLASS_ATTR)
                .map_err(|e| {
                    cascade_failed(STEP_CLEAR_ASSIGNMENTS, &completed, e.to_string())
                })?;
            cleared.push(identity.id);
        }
        completed.push(STEP_CLEAR_ASSIGNMENTS);

        self.conn
            .execute("DELETE FROM student_classes WHERE id = ?", [&record.id])
            .map_err(|e| cascade_failed(STEP_DELETE_RECORD, &completed, e.to_string()))?;

        tracing::info!(
            class = %record.name,
            class_id = %record.id,
            page_deleted,
            cleared = cleared.len(),
            "class deleted"
        );
        Ok(DeleteReport {
            class_id: record.id,
            name: record.name,
            page_deleted,
            cleared_student_ids: cleared,
        })
    }

    /// Sorted by name, byte order.
    pub fn list_classes(&self) -> ServiceResult<Vec<ClassRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, page_id, created_at FROM student_classes ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_classes_with_counts(&self) -> ServiceResult<Vec<ClassSummary>> {
        let mut out = Vec::new();
        for record in self.list_classes()? {
            let student_count = self
                .identities
                .list(&IdentityFilter::attribute(STUDENT_CLASS_ATTR, &record.name))?
                .len();
            let (page_url, edit_url) = self.page_urls(record.page_ref)?;
            out.push(ClassSummary {
                record,
                student_count,
                page_url,
                edit_url,
            });
        }
        Ok(out)
    }

    pub fn view_class(&self, name: &str) -> ServiceResult<ClassView> {
        let record = self
            .find_by_name(name)?
            .ok_or_else(|| ServiceError::not_found("class", name))?;
        let students = self.identities.list(
            &IdentityFilter::attribute(STUDENT_CLASS_ATTR, &record.name).with_role(Role::Student),
        )?;
        let (page_url, edit_url) = self.page_urls(record.page_ref)?;
        Ok(ClassView {
            record,
            page_url,
            edit_url,
            students,
        })
    }

    fn page_urls(&self, page_ref: Option<i64>) -> ServiceResult<(Option<String>, Option<String>)> {
        let Some(page_id) = page_ref else {
            return Ok((None, None));
        };
        Ok((
            self.content.canonical_url(page_id)?,
            self.content.edit_url(page_id)?,
        ))
    }
}

fn cascade_failed(step: &'static str, completed: &[&'static str], message: String) -> ServiceError {
    tracing::error!(step, ?completed, %message, "class deletion stopped");
    ServiceError::CascadeFailed {
        step,
        completed: completed.to_vec(),
        message,
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Welcome page seeded for a new class.
pub fn class_page_body(class_name: &str) -> String {
    let name = escape_html(class_name);
    format!(
        r#"<div class="student-class-welcome">
    <h1>Welcome to class {name}</h1>

    {placeholder}

    <p>Here you will find all information and materials for your class.</p>

    <div class="class-navigation">
        <h3>What can you do here?</h3>
        <ul>
            <li>Follow your lessons and progress</li>
            <li>Download study materials</li>
            <li>Read announcements from your teacher</li>
            <li>Get in touch with your classmates</li>
        </ul>
    </div>

    <div class="class-info">
        <h3>Class information</h3>
        <p><strong>Class:</strong> {name}</p>
    </div>
</div>"#,
        name = name,
        placeholder = GREETING_PLACEHOLDER,
    )
}
