use crate::assignment::StudentAssignmentService;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_id, load_identity, require_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::Identity;
use crate::store::SqliteIdentityStore;
use serde_json::{json, Value};

/// `userId` absent or null means the viewer is not logged in.
fn viewer(identities: &SqliteIdentityStore<'_>, params: &Value) -> Result<Option<Identity>, HandlerErr> {
    match params.get("userId") {
        None | Some(Value::Null) => Ok(None),
        Some(_) => Ok(Some(load_identity(
            identities,
            get_required_id(params, "userId")?,
        )?)),
    }
}

fn handle_greeting(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    let assignments = StudentAssignmentService::new(conn, &identities);

    let who = viewer(&identities, &req.params)?;
    Ok(json!({ "html": assignments.render_greeting(who.as_ref())? }))
}

fn handle_render(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    let assignments = StudentAssignmentService::new(conn, &identities);

    let who = viewer(&identities, &req.params)?;
    let content = get_optional_str(&req.params, "content").unwrap_or_default();
    Ok(json!({ "html": assignments.render_content(who.as_ref(), &content)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "content.greeting" => handle_greeting(state, req),
        "content.render" => handle_render(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
