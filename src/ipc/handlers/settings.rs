use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, require_actor, require_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::settings::SiteSettings;
use crate::store::SqliteIdentityStore;
use serde_json::{json, Value};

fn handle_settings_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    Ok(json!(SiteSettings::load(conn)?))
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;

    let mut settings = SiteSettings::load(conn)?;
    let apply = |key: &str, slot: &mut String| -> Result<(), HandlerErr> {
        if let Some(v) = get_optional_str(&req.params, key) {
            let v = v.trim().to_string();
            if v.is_empty() {
                return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
            }
            *slot = v;
        }
        Ok(())
    };
    apply("baseUrl", &mut settings.base_url)?;
    apply("homeUrl", &mut settings.home_url)?;
    apply("emailDomain", &mut settings.email_domain)?;
    settings.save(conn)?;
    tracing::info!(?settings, "settings updated");
    Ok(json!(settings))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_settings_get(state, req),
        "settings.update" => handle_settings_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
