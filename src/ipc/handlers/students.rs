use crate::assignment::StudentAssignmentService;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_optional_str, get_required_id, get_required_str, load_identity, require_actor,
    require_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::store::SqliteIdentityStore;
use serde_json::{json, Value};

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;
    let assignments = StudentAssignmentService::new(conn, &identities);

    Ok(json!({ "students": assignments.list_students()? }))
}

fn handle_students_assign(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;
    let assignments = StudentAssignmentService::new(conn, &identities);

    let student_id = get_required_id(&req.params, "studentId")?;
    let class_name = get_required_str(&req.params, "className")?;
    assignments.assign(student_id, &class_name)?;
    Ok(json!({ "studentId": student_id, "className": class_name }))
}

fn handle_students_unassign(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_manage_classes)?;
    let assignments = StudentAssignmentService::new(conn, &identities);

    let student_id = get_required_id(&req.params, "studentId")?;
    assignments.unassign(student_id)?;
    Ok(json!({ "studentId": student_id, "className": null }))
}

fn handle_assignment_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    let assignments = StudentAssignmentService::new(conn, &identities);

    let student_id = get_required_id(&req.params, "studentId")?;
    load_identity(&identities, student_id)?;
    Ok(json!({
        "studentId": student_id,
        "className": assignments.get_assignment(student_id)?,
    }))
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let identities = SqliteIdentityStore::new(conn);
    require_actor(&identities, &req.params, Role::can_edit_users)?;
    let assignments = StudentAssignmentService::new(conn, &identities);

    let student_id = get_required_id(&req.params, "studentId")?;
    let value = get_optional_str(&req.params, "studentClass").unwrap_or_default();
    let class_name = assignments.save_profile_class(student_id, &value)?;
    Ok(json!({ "studentId": student_id, "className": class_name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.assign" => handle_students_assign(state, req),
        "students.unassign" => handle_students_unassign(state, req),
        "students.assignment.get" => handle_assignment_get(state, req),
        "students.profile.update" => handle_profile_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
