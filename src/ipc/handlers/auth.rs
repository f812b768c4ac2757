use crate::assignment::StudentAssignmentService;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_id, load_identity, require_conn};
use crate::ipc::types::{AppState, Request};
use crate::redirect::LoginRedirectResolver;
use crate::settings::SiteSettings;
use crate::store::{SqliteContentStore, SqliteIdentityStore};
use serde_json::{json, Value};

fn handle_login_redirect(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let settings = SiteSettings::load(conn)?;
    let identities = SqliteIdentityStore::new(conn);
    let content = SqliteContentStore::new(conn, &settings.base_url);
    let assignments = StudentAssignmentService::new(conn, &identities);
    let resolver = LoginRedirectResolver::new(&assignments, &content, &settings.home_url);

    let user = load_identity(&identities, get_required_id(&req.params, "userId")?)?;
    let default_url =
        get_optional_str(&req.params, "defaultUrl").unwrap_or_else(|| settings.home_url.clone());
    let url = resolver.resolve_redirect(&user, &default_url)?;
    tracing::info!(user = %user.username, redirect = %url, "login redirect resolved");
    Ok(json!({ "redirectUrl": url }))
}

fn handle_forced_redirect(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let settings = SiteSettings::load(conn)?;
    let identities = SqliteIdentityStore::new(conn);
    let content = SqliteContentStore::new(conn, &settings.base_url);
    let assignments = StudentAssignmentService::new(conn, &identities);
    let resolver = LoginRedirectResolver::new(&assignments, &content, &settings.home_url);

    let user = load_identity(&identities, get_required_id(&req.params, "userId")?)?;
    Ok(json!({ "redirectUrl": resolver.forced_redirect(&user)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "auth.loginRedirect" => handle_login_redirect(state, req),
        "auth.forcedRedirect" => handle_forced_redirect(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
