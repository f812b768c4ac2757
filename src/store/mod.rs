//! Collaborator interfaces for the host platform's user and content stores.
//!
//! The services only talk to these traits. The SQLite implementations keep
//! both stores inside the workspace database so the daemon can run on its own.

mod content;
mod identity;

pub use content::SqliteContentStore;
pub use identity::{generate_password, SqliteIdentityStore};

use crate::model::{Identity, NewIdentity, NewPage, Role};

#[derive(Debug, Clone, Default)]
pub struct IdentityFilter {
    pub role: Option<Role>,
    /// Exact `(key, value)` attribute match.
    pub attribute: Option<(String, String)>,
}

impl IdentityFilter {
    pub fn role(role: Role) -> Self {
        IdentityFilter {
            role: Some(role),
            attribute: None,
        }
    }

    pub fn attribute(key: &str, value: &str) -> Self {
        IdentityFilter {
            role: None,
            attribute: Some((key.to_string(), value.to_string())),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

pub trait IdentityStore {
    fn create_identity(&self, new: &NewIdentity) -> anyhow::Result<i64>;
    fn username_exists(&self, username: &str) -> anyhow::Result<bool>;
    fn email_exists(&self, email: &str) -> anyhow::Result<bool>;
    fn get(&self, id: i64) -> anyhow::Result<Option<Identity>>;
    fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Identity>>;
    fn set_role(&self, id: i64, role: Role) -> anyhow::Result<()>;
    fn update_display_name(&self, id: i64, display_name: &str) -> anyhow::Result<()>;
    fn get_attribute(&self, id: i64, key: &str) -> anyhow::Result<Option<String>>;
    fn set_attribute(&self, id: i64, key: &str, value: &str) -> anyhow::Result<()>;
    fn delete_attribute(&self, id: i64, key: &str) -> anyhow::Result<()>;
    /// Ordered by username.
    fn list(&self, filter: &IdentityFilter) -> anyhow::Result<Vec<Identity>>;
}

pub trait ContentStore {
    fn create_page(&self, page: &NewPage) -> anyhow::Result<i64>;
    /// `hard` removes the page; otherwise it is moved to the trash.
    /// Returns false when there was no such page.
    fn delete_page(&self, id: i64, hard: bool) -> anyhow::Result<bool>;
    /// `None` when the page does not exist or is trashed.
    fn canonical_url(&self, id: i64) -> anyhow::Result<Option<String>>;
    fn edit_url(&self, id: i64) -> anyhow::Result<Option<String>>;
}
