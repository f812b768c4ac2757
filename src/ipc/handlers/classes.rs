use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, require_actor, require_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::registry::ClassRegistry;
use crate::settings::SiteSettings;
use crate::store::{ContentStore, SqliteContentStore, SqliteIdentityStore};
use serde_json::{json, Value};

fn handle_classes_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "classes": [] }));
    };
    let settings = SiteSettings::load(conn)?;
    let identities = SqliteIdentityStore::new(conn);
    let content = SqliteContentStore::new(conn, &settings.base_url);
    let registry = ClassRegistry::new(conn, &content, &identities);

    let classes = registry.list_classes_with_counts()?;
    Ok(json!({ "classes": classes }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;

    let settings = SiteSettings::load(conn)?;
    let content = SqliteContentStore::new(conn, &settings.base_url);
    let registry = ClassRegistry::new(conn, &content, &identities);

    let name = get_optional_str(&req.params, "name").unwrap_or_default();
    let record = registry.create_class(&name)?;
    let page_url = match record.page_ref {
        Some(page_id) => content.canonical_url(page_id)?,
        None => None,
    };
    Ok(json!({
        "classId": record.id,
        "class": record,
        "pageUrl": page_url,
    }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;

    let settings = SiteSettings::load(conn)?;
    let content = SqliteContentStore::new(conn, &settings.base_url);
    let registry = ClassRegistry::new(conn, &content, &identities);

    let class_id = get_required_str(&req.params, "classId")?;
    let report = registry.delete_class(&class_id)?;
    Ok(json!(report))
}

fn handle_classes_view(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;

    let settings = SiteSettings::load(conn)?;
    let content = SqliteContentStore::new(conn, &settings.base_url);
    let registry = ClassRegistry::new(conn, &content, &identities);

    let name = get_required_str(&req.params, "name")?;
    Ok(json!(registry.view_class(&name)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_classes_list(state, req),
        "classes.create" => handle_classes_create(state, req),
        "classes.delete" => handle_classes_delete(state, req),
        "classes.view" => handle_classes_view(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
