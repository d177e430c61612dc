use crate::error::{ServiceError, ServiceResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::get_opt_str;
use crate::ipc::types::{Ctx, Request};
use crate::service::dashboards;
use serde_json::json;

pub const METHODS: &[&str] = &["dashboard.student", "dashboard.faculty", "dashboard.admin"];

fn student(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let caller = ctx.caller.ok_or(ServiceError::Unauthenticated)?;
    let dash = dashboards::student_dashboard(
        ctx.conn,
        ctx.cfg,
        caller,
        get_opt_str(params, "studentId"),
        get_opt_str(params, "academicYear"),
        get_opt_str(params, "semester"),
    )?;
    Ok(json!(dash))
}

fn faculty(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let caller = ctx.caller.ok_or(ServiceError::Unauthenticated)?;
    let dash = dashboards::faculty_dashboard(
        ctx.conn,
        caller,
        get_opt_str(params, "subjectId"),
        get_opt_str(params, "date"),
    )?;
    Ok(json!(dash))
}

fn admin(ctx: &Ctx) -> ServiceResult<serde_json::Value> {
    Ok(json!(dashboards::reporting_summary(ctx.conn)?))
}

pub fn try_handle(ctx: &Ctx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "dashboard.student" => student(ctx, &req.params),
        "dashboard.faculty" => faculty(ctx, &req.params),
        "dashboard.admin" => admin(ctx),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
