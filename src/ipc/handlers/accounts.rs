use crate::error::{ServiceError, ServiceResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{get_opt_str, get_required_str, get_str};
use crate::ipc::types::{Ctx, Request};
use crate::service::accounts::{self, NewFaculty, NewStudent};
use serde_json::json;

pub const METHODS: &[&str] = &[
    "accounts.registerStudent",
    "accounts.registerFaculty",
    "accounts.delete",
    "accounts.lookup",
    "students.list",
    "faculty.list",
];

fn register_student(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let input = NewStudent {
        username: get_str(params, "username"),
        password: get_str(params, "password"),
        password_confirm: get_str(params, "passwordConfirm"),
        first_name: get_str(params, "firstName"),
        last_name: get_str(params, "lastName"),
        email: get_str(params, "email"),
        roll_no: get_str(params, "rollNo"),
        course: get_str(params, "course"),
        class_section: get_str(params, "classSection"),
        avatar_ref: get_opt_str(params, "avatar").map(str::to_string),
    };
    let registered = accounts::register_student(ctx.conn, ctx.cfg, &input)?;
    Ok(json!(registered))
}

fn register_faculty(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let input = NewFaculty {
        username: get_str(params, "username"),
        password: get_str(params, "password"),
        password_confirm: get_str(params, "passwordConfirm"),
        first_name: get_str(params, "firstName"),
        last_name: get_str(params, "lastName"),
        email: get_str(params, "email"),
        department: get_str(params, "department"),
        avatar_ref: get_opt_str(params, "avatar").map(str::to_string),
    };
    let registered = accounts::register_faculty(ctx.conn, ctx.cfg, &input)?;
    Ok(json!(registered))
}

fn delete_account(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let user_id = get_required_str(params, "userId")?;
    accounts::delete_account(ctx.conn, &user_id)?;
    Ok(json!({ "ok": true }))
}

fn lookup(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let username = get_required_str(params, "username")?;
    let identity = accounts::find_identity_by_username(ctx.conn, &username)?
        .ok_or(ServiceError::NotFound("account"))?;
    Ok(json!({ "identity": identity }))
}

fn list_students(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let students = accounts::list_students(ctx.conn, get_opt_str(params, "classSection"))?;
    Ok(json!({ "students": students }))
}

fn list_faculty(ctx: &Ctx) -> ServiceResult<serde_json::Value> {
    let faculty = accounts::list_faculty(ctx.conn)?;
    Ok(json!({ "faculty": faculty }))
}

pub fn try_handle(ctx: &Ctx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "accounts.registerStudent" => register_student(ctx, &req.params),
        "accounts.registerFaculty" => register_faculty(ctx, &req.params),
        "accounts.delete" => delete_account(ctx, &req.params),
        "accounts.lookup" => lookup(ctx, &req.params),
        "students.list" => list_students(ctx, &req.params),
        "faculty.list" => list_faculty(ctx),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
