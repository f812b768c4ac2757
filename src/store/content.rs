use super::ContentStore;
use crate::model::NewPage;
use anyhow::{bail, Context};
use rusqlite::{Connection, OptionalExtension};

pub struct SqliteContentStore<'a> {
    conn: &'a Connection,
    base_url: String,
}

impl<'a> SqliteContentStore<'a> {
    pub fn new(conn: &'a Connection, base_url: &str) -> Self {
        SqliteContentStore {
            conn,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn live_slug(&self, id: i64) -> anyhow::Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT slug FROM pages WHERE id = ? AND trashed = 0",
                [id],
                |r| r.get(0),
            )
            .optional()?)
    }

    fn unique_slug(&self, title: &str) -> anyhow::Result<String> {
        let base = slugify(title);
        let mut candidate = base.clone();
        let mut n = 2;
        loop {
            let taken: Option<i64> = self
                .conn
                .query_row("SELECT 1 FROM pages WHERE slug = ?", [&candidate], |r| {
                    r.get(0)
                })
                .optional()?;
            if taken.is_none() {
                return Ok(candidate);
            }
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
    }
}

impl ContentStore for SqliteContentStore<'_> {
    fn create_page(&self, page: &NewPage) -> anyhow::Result<i64> {
        if page.title.trim().is_empty() {
            bail!("page title must not be empty");
        }
        let slug = self.unique_slug(&page.title)?;
        self.conn
            .execute(
                "INSERT INTO pages(title, slug, body, status, trashed, created_at)
                 VALUES(?, ?, ?, ?, 0, ?)",
                (
                    &page.title,
                    &slug,
                    &page.body,
                    page.status.as_str(),
                    chrono::Utc::now().to_rfc3339(),
                ),
            )
            .context("insert page")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_page(&self, id: i64, hard: bool) -> anyhow::Result<bool> {
        let changed = if hard {
            self.conn.execute("DELETE FROM pages WHERE id = ?", [id])?
        } else {
            self.conn
                .execute("UPDATE pages SET trashed = 1 WHERE id = ?", [id])?
        };
        Ok(changed > 0)
    }

    fn canonical_url(&self, id: i64) -> anyhow::Result<Option<String>> {
        Ok(self
            .live_slug(id)?
            .map(|slug| format!("{}/{}/", self.base_url, slug)))
    }

    fn edit_url(&self, id: i64) -> anyhow::Result<Option<String>> {
        Ok(self
            .live_slug(id)?
            .map(|_| format!("{}/admin/pages/{}/edit", self.base_url, id)))
    }
}

/// Lowercase ASCII slug; runs of anything else become a single dash.
pub fn slugify(title: &str) -> String {
    let mut out = String::new();
    let mut dash = false;
    for ch in title.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "page".to_string()
    } else {
        out
    }
}
