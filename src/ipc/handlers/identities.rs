use crate::assignment::{validate_registration_class, StudentAssignmentService};
use crate::error::ServiceError;
use crate::import::{sanitize_email, sanitize_text, sanitize_username};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_optional_str, get_required_id, get_required_str, load_identity, require_actor,
    require_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewIdentity, Role};
use crate::store::{generate_password, IdentityFilter, IdentityStore, SqliteIdentityStore};
use serde_json::{json, Value};

/// Validates and creates an identity. Duplicates are reported the same way
/// bulk import reports them.
fn register_identity(
    identities: &SqliteIdentityStore<'_>,
    params: &Value,
    role: Role,
) -> Result<i64, HandlerErr> {
    let username = sanitize_username(&get_required_str(params, "username")?);
    if username.is_empty() {
        return Err(HandlerErr::bad_params("username has no valid characters"));
    }
    let raw_email = get_required_str(params, "email")?;
    let email = sanitize_email(&raw_email)
        .ok_or_else(|| HandlerErr::bad_params(format!("invalid email address: {}", raw_email)))?;
    if identities.username_exists(&username)? || identities.email_exists(&email)? {
        return Err(ServiceError::DuplicateIdentity { username, email }.into());
    }
    let password = get_optional_str(params, "password")
        .filter(|p| !p.is_empty())
        .unwrap_or_else(generate_password);
    let display_name = sanitize_text(&get_optional_str(params, "displayName").unwrap_or_default());

    let id = identities
        .create_identity(&NewIdentity {
            username: username.clone(),
            email,
            password,
            display_name,
            role,
        })
        .map_err(|e| ServiceError::IdentityCreationFailed {
            username: username.clone(),
            reason: format!("{:#}", e),
        })?;
    tracing::info!(identity_id = id, username = %username, role = %role, "identity created");
    Ok(id)
}

fn handle_identities_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);

    let role = match get_optional_str(&req.params, "role") {
        Some(r) => r.parse::<Role>().map_err(HandlerErr::bad_params)?,
        None => Role::Student,
    };
    if role != Role::Student {
        // Only the very first administrator may be created without an actor.
        let bootstrap = role == Role::Administrator
            && identities
                .list(&IdentityFilter::role(Role::Administrator))?
                .is_empty();
        if bootstrap {
            tracing::warn!("creating initial administrator without an actor");
        } else {
            require_actor(&identities, &req.params, Role::can_edit_users)?;
        }
    }
    let id = register_identity(&identities, &req.params, role)?;
    Ok(json!({ "userId": id, "identity": load_identity(&identities, id)? }))
}

fn handle_identities_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    let assignments = StudentAssignmentService::new(conn, &identities);

    let identity = match get_optional_str(&req.params, "username") {
        Some(username) => identities
            .find_by_username(username.trim())?
            .ok_or_else(|| ServiceError::not_found("user", username.trim()))?,
        None => load_identity(&identities, get_required_id(&req.params, "userId")?)?,
    };
    Ok(json!({
        "identity": identity,
        "className": assignments.get_assignment(identity.id)?,
    }))
}

fn handle_identities_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_edit_users)?;

    let user_id = get_required_id(&req.params, "userId")?;
    load_identity(&identities, user_id)?;
    let role = get_optional_str(&req.params, "role")
        .map(|r| r.parse::<Role>().map_err(HandlerErr::bad_params))
        .transpose()?;
    let display_name = get_optional_str(&req.params, "displayName").map(|d| sanitize_text(&d));
    if let Some(role) = role {
        identities.set_role(user_id, role)?;
    }
    if let Some(display_name) = display_name.filter(|d| !d.is_empty()) {
        identities.update_display_name(user_id, &display_name)?;
    }
    Ok(json!({ "identity": load_identity(&identities, user_id)? }))
}

/// Self registration: the class field is required and the new identity is a
/// student assigned to that class.
fn handle_registration_submit(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    let assignments = StudentAssignmentService::new(conn, &identities);

    let class_name = validate_registration_class(
        get_optional_str(&req.params, "studentClass").as_deref(),
    )?;
    let id = register_identity(&identities, &req.params, Role::Student)?;
    assignments.assign(id, &class_name)?;
    Ok(json!({ "userId": id, "className": class_name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "identities.create" => handle_identities_create(state, req),
        "identities.get" => handle_identities_get(state, req),
        "identities.update" => handle_identities_update(state, req),
        "registration.submit" => handle_registration_submit(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
