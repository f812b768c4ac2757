use super::error::HandlerErr;
use super::types::AppState;
use crate::error::ServiceError;
use crate::model::{Identity, Role};
use crate::store::IdentityStore;
use rusqlite::Connection;
use serde_json::Value;

pub fn require_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Accepts a JSON number or a numeric string.
pub fn get_required_id(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    let v = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    let parsed = match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(id) if id > 0 => Ok(id),
        _ => Err(HandlerErr::bad_params(format!("{} must be a positive integer", key))),
    }
}

pub fn load_identity(identities: &dyn IdentityStore, id: i64) -> Result<Identity, HandlerErr> {
    identities
        .get(id)?
        .ok_or_else(|| ServiceError::not_found("user", id).into())
}

/// Resolves `params.actorId` and rejects it unless `allowed(role)` holds.
/// Runs before any handler touches state.
pub fn require_actor(
    identities: &dyn IdentityStore,
    params: &Value,
    allowed: fn(Role) -> bool,
) -> Result<Identity, HandlerErr> {
    let unauthorized = |msg: &str| -> HandlerErr {
        ServiceError::Unauthorized(msg.to_string()).into()
    };
    let actor_id = get_required_id(params, "actorId").map_err(|_| unauthorized("missing actorId"))?;
    let actor = identities
        .get(actor_id)?
        .ok_or_else(|| unauthorized("unknown actor"))?;
    if !allowed(actor.role) {
        tracing::warn!(actor = %actor.username, role = %actor.role, "admin operation rejected");
        return Err(unauthorized("insufficient permissions"));
    }
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let p = json!({ "a": 7, "b": " 8 ", "c": -1, "d": "x" });
        assert_eq!(get_required_id(&p, "a").unwrap(), 7);
        assert_eq!(get_required_id(&p, "b").unwrap(), 8);
        assert_eq!(get_required_id(&p, "c").unwrap_err().code, "bad_params");
        assert!(get_required_id(&p, "d").is_err());
        assert!(get_required_id(&p, "missing").is_err());
    }

    #[test]
    fn required_str_rejects_blank() {
        let p = json!({ "name": "  ", "other": " 3A " });
        assert!(get_required_str(&p, "name").is_err());
        assert_eq!(get_required_str(&p, "other").unwrap(), "3A");
    }
}
