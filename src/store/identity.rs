use super::{IdentityFilter, IdentityStore};
use crate::model::{Identity, NewIdentity, Role};
use anyhow::{anyhow, bail, Context};
use rand::Rng;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()";
const PASSWORD_LEN: usize = 12;

pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LEN)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}

/// Argon2id with a random salt, stored as a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

struct IdentityRow {
    id: i64,
    username: String,
    email: String,
    display_name: String,
    role: String,
    registered_at: String,
}

impl IdentityRow {
    fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(IdentityRow {
            id: r.get(0)?,
            username: r.get(1)?,
            email: r.get(2)?,
            display_name: r.get(3)?,
            role: r.get(4)?,
            registered_at: r.get(5)?,
        })
    }

    fn into_identity(self) -> anyhow::Result<Identity> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| anyhow!("identity {}: {}", self.id, e))?;
        Ok(Identity {
            id: self.id,
            username: self.username,
            email: self.email,
            display_name: self.display_name,
            role,
            registered_at: self.registered_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "i.id, i.username, i.email, i.display_name, i.role, i.registered_at";

pub struct SqliteIdentityStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteIdentityStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteIdentityStore { conn }
    }

    fn fetch_one(&self, sql: &str, key: Value) -> anyhow::Result<Option<Identity>> {
        self.conn
            .query_row(sql, [key], IdentityRow::from_row)
            .optional()?
            .map(IdentityRow::into_identity)
            .transpose()
    }
}

impl IdentityStore for SqliteIdentityStore<'_> {
    fn create_identity(&self, new: &NewIdentity) -> anyhow::Result<i64> {
        if new.username.trim().is_empty() {
            bail!("username must not be empty");
        }
        if self.username_exists(&new.username)? {
            bail!("username {} is already registered", new.username);
        }
        if !new.email.is_empty() && self.email_exists(&new.email)? {
            bail!("email {} is already registered", new.email);
        }
        let display_name = if new.display_name.trim().is_empty() {
            new.username.clone()
        } else {
            new.display_name.clone()
        };
        let password_hash = hash_password(&new.password)?;
        self.conn
            .execute(
                "INSERT INTO identities(username, email, password_hash, display_name, role, registered_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    &new.username,
                    &new.email,
                    password_hash,
                    display_name,
                    new.role.as_str(),
                    chrono::Utc::now().to_rfc3339(),
                ),
            )
            .context("insert identity")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn username_exists(&self, username: &str) -> anyhow::Result<bool> {
        let hit: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM identities WHERE username = ?",
                [username],
                |r| r.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    fn email_exists(&self, email: &str) -> anyhow::Result<bool> {
        if email.is_empty() {
            return Ok(false);
        }
        let hit: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM identities WHERE lower(email) = lower(?)",
                [email],
                |r| r.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    fn get(&self, id: i64) -> anyhow::Result<Option<Identity>> {
        self.fetch_one(
            &format!("SELECT {} FROM identities i WHERE i.id = ?", SELECT_COLUMNS),
            Value::Integer(id),
        )
    }

    fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Identity>> {
        self.fetch_one(
            &format!(
                "SELECT {} FROM identities i WHERE i.username = ?",
                SELECT_COLUMNS
            ),
            Value::Text(username.to_string()),
        )
    }

    fn set_role(&self, id: i64, role: Role) -> anyhow::Result<()> {
        let changed = self.conn.execute(
            "UPDATE identities SET role = ? WHERE id = ?",
            (role.as_str(), id),
        )?;
        if changed == 0 {
            bail!("identity {} does not exist", id);
        }
        Ok(())
    }

    fn update_display_name(&self, id: i64, display_name: &str) -> anyhow::Result<()> {
        let changed = self.conn.execute(
            "UPDATE identities SET display_name = ? WHERE id = ?",
            (display_name, id),
        )?;
        if changed == 0 {
            bail!("identity {} does not exist", id);
        }
        Ok(())
    }

    fn get_attribute(&self, id: i64, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM identity_attributes WHERE identity_id = ? AND key = ?",
                (id, key),
                |r| r.get(0),
            )
            .optional()?)
    }

    fn set_attribute(&self, id: i64, key: &str, value: &str) -> anyhow::Result<()> {
        self.conn
            .execute(
                "INSERT INTO identity_attributes(identity_id, key, value) VALUES(?, ?, ?)
                 ON CONFLICT(identity_id, key) DO UPDATE SET value = excluded.value",
                (id, key, value),
            )
            .with_context(|| format!("set {} on identity {}", key, id))?;
        Ok(())
    }

    fn delete_attribute(&self, id: i64, key: &str) -> anyhow::Result<()> {
        self.conn.execute(
            "DELETE FROM identity_attributes WHERE identity_id = ? AND key = ?",
            (id, key),
        )?;
        Ok(())
    }

    fn list(&self, filter: &IdentityFilter) -> anyhow::Result<Vec<Identity>> {
        let mut sql = format!("SELECT {} FROM identities i", SELECT_COLUMNS);
        let mut params: Vec<Value> = Vec::new();
        if let Some((key, value)) = &filter.attribute {
            sql.push_str(
                " JOIN identity_attributes a ON a.identity_id = i.id AND a.key = ? AND a.value = ?",
            );
            params.push(Value::Text(key.clone()));
            params.push(Value::Text(value.clone()));
        }
        if let Some(role) = filter.role {
            sql.push_str(" WHERE i.role = ?");
            params.push(Value::Text(role.as_str().to_string()));
        }
        sql.push_str(" ORDER BY i.username");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), IdentityRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(IdentityRow::into_identity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn new_identity(username: &str, email: &str, role: Role) -> NewIdentity {
        NewIdentity {
            username: username.to_string(),
            email: email.to_string(),
            password: generate_password(),
            display_name: String::new(),
            role,
        }
    }

    #[test]
    fn generated_passwords_are_twelve_chars() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_salted_argon2id_phc() {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert!(a.starts_with("$argon2id$"), "{}", a);
        assert_ne!(a, b);

        let parsed = PasswordHash::new(&a).unwrap();
        assert!(Argon2::default()
            .verify_password(b"secret", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong", &parsed)
            .is_err());
    }

    #[test]
    fn stored_hash_is_phc_not_plaintext() {
        let conn = db::open_in_memory();
        let store = SqliteIdentityStore::new(&conn);
        let mut new = new_identity("hana", "hana@x.com", Role::Student);
        new.password = "pa55word".to_string();
        let id = store.create_identity(&new).unwrap();
        let stored: String = conn
            .query_row(
                "SELECT password_hash FROM identities WHERE id = ?",
                [id],
                |r| r.get(0),
            )
            .unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("pa55word"));
    }

    #[test]
    fn create_rejects_duplicate_username_and_email() {
        let conn = db::open_in_memory();
        let store = SqliteIdentityStore::new(&conn);
        let id = store
            .create_identity(&new_identity("alice", "alice@x.com", Role::Student))
            .unwrap();
        assert!(store
            .create_identity(&new_identity("alice", "other@x.com", Role::Student))
            .is_err());
        assert!(store
            .create_identity(&new_identity("alice2", "ALICE@x.com", Role::Student))
            .is_err());

        let got = store.get(id).unwrap().expect("identity");
        assert_eq!(got.display_name, "alice");
        assert_eq!(got.role, Role::Student);
    }

    #[test]
    fn list_filters_by_role_and_attribute() {
        let conn = db::open_in_memory();
        let store = SqliteIdentityStore::new(&conn);
        let bob = store
            .create_identity(&new_identity("bob", "bob@x.com", Role::Student))
            .unwrap();
        let amy = store
            .create_identity(&new_identity("amy", "amy@x.com", Role::Student))
            .unwrap();
        let teach = store
            .create_identity(&new_identity("teach", "t@x.com", Role::Teacher))
            .unwrap();
        store.set_attribute(bob, "student_class", "3A").unwrap();
        store.set_attribute(amy, "student_class", "3A").unwrap();
        store.set_attribute(teach, "student_class", "3A").unwrap();

        let all = store
            .list(&IdentityFilter::attribute("student_class", "3A"))
            .unwrap();
        assert_eq!(all.len(), 3);

        let students = store
            .list(&IdentityFilter::attribute("student_class", "3A").with_role(Role::Student))
            .unwrap();
        let names: Vec<_> = students.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "bob"]);

        store.delete_attribute(bob, "student_class").unwrap();
        assert_eq!(store.get_attribute(bob, "student_class").unwrap(), None);
    }
}
