use crate::import::BulkImportProcessor;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, require_actor, require_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::settings::SiteSettings;
use crate::store::SqliteIdentityStore;
use serde_json::{json, Value};

fn handle_import_csv(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;
    let settings = SiteSettings::load(conn)?;

    let csv = get_optional_str(&req.params, "csv").unwrap_or_default();
    let class_name = get_optional_str(&req.params, "className").unwrap_or_default();
    let importer = BulkImportProcessor::new(&identities, &settings.email_domain);
    Ok(json!(importer.import_csv(&csv, &class_name)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "import.csv" => handle_import_csv(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
