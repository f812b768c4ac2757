mod common;

use common::Sidecar;
use serde_json::json;

#[test]
fn login_redirect_sends_students_to_their_class_page() {
    let mut sc = Sidecar::with_workspace("classroomd-login-redirect");
    let admin = sc.create_identity("admin", "administrator");
    sc.ok("classes.create", json!({ "actorId": admin, "name": "3A" }));

    let reg = sc.ok(
        "registration.submit",
        json!({ "username": "alice", "email": "alice@x.com", "studentClass": "3A" }),
    );
    let alice = reg["userId"].as_i64().expect("userId");
    assert_eq!(reg["className"], json!("3A"));

    let redirect = sc.ok(
        "auth.loginRedirect",
        json!({ "userId": alice, "defaultUrl": "http://localhost/dashboard" }),
    );
    assert_eq!(redirect["redirectUrl"], json!("http://localhost/3a/"));
    let forced = sc.ok("auth.forcedRedirect", json!({ "userId": alice }));
    assert_eq!(forced["redirectUrl"], json!("http://localhost/3a/"));

    // Non-students keep the requested destination.
    let admin_redirect = sc.ok(
        "auth.loginRedirect",
        json!({ "userId": admin, "defaultUrl": "http://localhost/dashboard" }),
    );
    assert_eq!(admin_redirect["redirectUrl"], json!("http://localhost/dashboard"));
    let admin_forced = sc.ok("auth.forcedRedirect", json!({ "userId": admin }));
    assert!(admin_forced["redirectUrl"].is_null());

    // A class name with no registry entry falls back to home.
    sc.ok(
        "students.assign",
        json!({ "actorId": admin, "studentId": alice, "className": "Ghost" }),
    );
    let fallback = sc.ok("auth.loginRedirect", json!({ "userId": alice }));
    assert_eq!(fallback["redirectUrl"], json!("http://localhost/"));
    let no_forced = sc.ok("auth.forcedRedirect", json!({ "userId": alice }));
    assert!(no_forced["redirectUrl"].is_null());
}

#[test]
fn role_change_moves_identity_into_student_redirects() {
    let mut sc = Sidecar::with_workspace("classroomd-role-change");
    let admin = sc.create_identity("admin", "administrator");
    let tina = sc.create_identity_by(admin, "tina", "teacher");
    sc.ok("classes.create", json!({ "actorId": admin, "name": "1B" }));
    sc.ok(
        "students.assign",
        json!({ "actorId": admin, "studentId": tina, "className": "1B" }),
    );

    let before = sc.ok("auth.loginRedirect", json!({ "userId": tina, "defaultUrl": "/x" }));
    assert_eq!(before["redirectUrl"], json!("/x"));

    let updated = sc.ok(
        "identities.update",
        json!({ "actorId": admin, "userId": tina, "role": "subscriber" }),
    );
    assert_eq!(updated["identity"]["role"], json!("student"));
    let after = sc.ok("auth.loginRedirect", json!({ "userId": tina, "defaultUrl": "/x" }));
    assert_eq!(after["redirectUrl"], json!("http://localhost/1b/"));
}

#[test]
fn registration_requires_a_class() {
    let mut sc = Sidecar::with_workspace("classroomd-registration");

    assert_eq!(
        sc.err_code(
            "registration.submit",
            json!({ "username": "bob", "email": "bob@x.com" })
        ),
        "bad_params"
    );
    assert_eq!(
        sc.err_code(
            "registration.submit",
            json!({ "username": "bob", "email": "bob@x.com", "studentClass": "  " })
        ),
        "bad_params"
    );

    // Nothing was created by the rejected submissions.
    assert_eq!(
        sc.err_code("identities.get", json!({ "username": "bob" })),
        "not_found"
    );
}

#[test]
fn greeting_placeholder_renders_per_viewer() {
    let mut sc = Sidecar::with_workspace("classroomd-greeting");
    let alice = sc.create_identity("alice", "student");

    let anon = sc.ok(
        "content.render",
        json!({ "userId": null, "content": "<p>Hi</p>[student_greeting]" }),
    );
    let html = anon["html"].as_str().unwrap_or("");
    assert!(html.starts_with("<p>Hi</p>"), "{}", html);
    assert!(html.contains("Log in to see your personal welcome message."), "{}", html);

    let unassigned = sc.ok("content.greeting", json!({ "userId": alice }));
    let html = unassigned["html"].as_str().unwrap_or("");
    assert!(html.contains("Hello alice!"), "{}", html);
    assert!(html.contains("You have not been assigned"), "{}", html);

    let admin = sc.create_identity("admin", "administrator");
    sc.ok(
        "students.profile.update",
        json!({ "actorId": admin, "studentId": alice, "studentClass": "2C" }),
    );
    let rendered = sc.ok(
        "content.render",
        json!({ "userId": alice, "content": "[student_greeting]|[student_greeting]" }),
    );
    let html = rendered["html"].as_str().unwrap_or("");
    assert_eq!(
        html.matches("Welcome back to class <strong>2C</strong>").count(),
        2
    );
    assert!(!html.contains("[student_greeting]"));

    // Saving the profile with an empty class clears the assignment.
    let cleared = sc.ok(
        "students.profile.update",
        json!({ "actorId": admin, "studentId": alice, "studentClass": "" }),
    );
    assert!(cleared["className"].is_null());
}
