use crate::db;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

const KEY_BASE_URL: &str = "site.baseUrl";
const KEY_HOME_URL: &str = "site.homeUrl";
const KEY_EMAIL_DOMAIN: &str = "import.emailDomain";

pub const DEFAULT_BASE_URL: &str = "http://localhost";
pub const DEFAULT_EMAIL_DOMAIN: &str = "example.org";

/// Site-level settings stored in the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    /// Prefix for page URLs.
    pub base_url: String,
    /// Redirect target for students without a usable class page.
    pub home_url: String,
    /// Domain for generated import emails.
    pub email_domain: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        SiteSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            home_url: format!("{}/", DEFAULT_BASE_URL),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
        }
    }
}

fn get_str(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    Ok(db::settings_get_json(conn, key)?
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .filter(|s| !s.trim().is_empty()))
}

impl SiteSettings {
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        let defaults = SiteSettings::default();
        let base_url = get_str(conn, KEY_BASE_URL)?.unwrap_or(defaults.base_url);
        let home_url =
            get_str(conn, KEY_HOME_URL)?.unwrap_or_else(|| format!("{}/", base_url.trim_end_matches('/')));
        let email_domain = get_str(conn, KEY_EMAIL_DOMAIN)?.unwrap_or(defaults.email_domain);
        Ok(SiteSettings {
            base_url,
            home_url,
            email_domain,
        })
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        db::settings_set_json(conn, KEY_BASE_URL, &json!(self.base_url))?;
        db::settings_set_json(conn, KEY_HOME_URL, &json!(self.home_url))?;
        db::settings_set_json(conn, KEY_EMAIL_DOMAIN, &json!(self.email_domain))?;
        Ok(())
    }
}
