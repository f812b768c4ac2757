use crate::assignment::StudentAssignmentService;
use crate::error::ServiceResult;
use crate::model::{Identity, Role};
use crate::store::ContentStore;

/// Post-login destination. Both login hooks go through `student_destination`
/// so they always agree.
pub struct LoginRedirectResolver<'a> {
    assignments: &'a StudentAssignmentService<'a>,
    content: &'a dyn ContentStore,
    home_url: &'a str,
}

impl<'a> LoginRedirectResolver<'a> {
    pub fn new(
        assignments: &'a StudentAssignmentService<'a>,
        content: &'a dyn ContentStore,
        home_url: &'a str,
    ) -> Self {
        LoginRedirectResolver {
            assignments,
            content,
            home_url,
        }
    }

    /// Class page URL for a student, or the home URL when the student has no
    /// class, the class is gone, or it has no live page.
    fn student_destination(&self, identity: &Identity) -> ServiceResult<String> {
        let Some(class_name) = self.assignments.get_assignment(identity.id)? else {
            return Ok(self.home_url.to_string());
        };
        let Some(page_id) = self.assignments.resolve_class_page(&class_name)? else {
            tracing::debug!(user = %identity.username, class = %class_name, "class has no page");
            return Ok(self.home_url.to_string());
        };
        Ok(self
            .content
            .canonical_url(page_id)?
            .unwrap_or_else(|| self.home_url.to_string()))
    }

    /// Login redirect filter. Non-students keep `default_url`.
    pub fn resolve_redirect(&self, identity: &Identity, default_url: &str) -> ServiceResult<String> {
        if identity.role != Role::Student {
            return Ok(default_url.to_string());
        }
        self.student_destination(identity)
    }

    /// Fallback hook for platforms that override the filter. Only returns a
    /// URL when it differs from the home URL.
    pub fn forced_redirect(&self, identity: &Identity) -> ServiceResult<Option<String>> {
        if identity.role != Role::Student {
            return Ok(None);
        }
        let url = self.student_destination(identity)?;
        if url == self.home_url {
            Ok(None)
        } else {
            Ok(Some(url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{NewIdentity, STUDENT_CLASS_ATTR};
    use crate::registry::ClassRegistry;
    use crate::store::{IdentityStore, SqliteContentStore, SqliteIdentityStore};

    const HOME: &str = "https://s.test/";

    fn identity(store: &SqliteIdentityStore<'_>, username: &str, role: Role) -> Identity {
        let id = store
            .create_identity(&NewIdentity {
                username: username.to_string(),
                email: format!("{}@x.com", username),
                password: "pw".to_string(),
                display_name: username.to_string(),
                role,
            })
            .unwrap();
        store.get(id).unwrap().unwrap()
    }

    #[test]
    fn non_students_pass_through() {
        let conn = db::open_in_memory();
        let content = SqliteContentStore::new(&conn, "https://s.test");
        let ids = SqliteIdentityStore::new(&conn);
        let svc = StudentAssignmentService::new(&conn, &ids);
        let resolver = LoginRedirectResolver::new(&svc, &content, HOME);

        let admin = identity(&ids, "root", Role::Administrator);
        let teacher = identity(&ids, "teach", Role::Teacher);
        ids.set_attribute(teacher.id, STUDENT_CLASS_ATTR, "3A").unwrap();
        for who in [&admin, &teacher] {
            assert_eq!(
                resolver.resolve_redirect(who, "https://s.test/wp-admin").unwrap(),
                "https://s.test/wp-admin"
            );
            assert_eq!(resolver.forced_redirect(who).unwrap(), None);
        }
    }

    #[test]
    fn student_goes_to_class_page() {
        let conn = db::open_in_memory();
        let content = SqliteContentStore::new(&conn, "https://s.test");
        let ids = SqliteIdentityStore::new(&conn);
        ClassRegistry::new(&conn, &content, &ids)
            .create_class("3A")
            .unwrap();
        let svc = StudentAssignmentService::new(&conn, &ids);
        let resolver = LoginRedirectResolver::new(&svc, &content, HOME);

        let alice = identity(&ids, "alice", Role::Student);
        svc.assign(alice.id, "3A").unwrap();
        assert_eq!(
            resolver.resolve_redirect(&alice, "ignored").unwrap(),
            "https://s.test/3a/"
        );
        assert_eq!(
            resolver.forced_redirect(&alice).unwrap().as_deref(),
            Some("https://s.test/3a/")
        );
    }

    #[test]
    fn student_falls_back_to_home() {
        let conn = db::open_in_memory();
        let content = SqliteContentStore::new(&conn, "https://s.test");
        let ids = SqliteIdentityStore::new(&conn);
        let reg = ClassRegistry::new(&conn, &content, &ids);
        let trashed = reg.create_class("Trashed").unwrap();
        content.delete_page(trashed.page_ref.unwrap(), false).unwrap();
        let svc = StudentAssignmentService::new(&conn, &ids);
        let resolver = LoginRedirectResolver::new(&svc, &content, HOME);

        let unassigned = identity(&ids, "u", Role::Student);
        let dangling = identity(&ids, "d", Role::Student);
        let stale = identity(&ids, "s", Role::Student);
        svc.assign(dangling.id, "Gone").unwrap();
        svc.assign(stale.id, "Trashed").unwrap();

        for who in [&unassigned, &dangling, &stale] {
            assert_eq!(resolver.resolve_redirect(who, "ignored").unwrap(), HOME);
            assert_eq!(resolver.forced_redirect(who).unwrap(), None);
        }
    }
}
