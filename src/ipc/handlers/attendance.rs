use crate::error::{ServiceError, ServiceResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{get_opt_str, get_str};
use crate::ipc::types::{Ctx, Request};
use crate::service::ledger::{self, StudentMark};
use crate::service::{format_date, parse_date};
use serde_json::json;

pub const METHODS: &[&str] = &["attendance.mark", "attendance.roster", "attendance.daywise"];

/// `marks` is `[{ "studentId": "...", "present": true }, ...]`. A missing
/// `present` counts as absent, the way an unticked checkbox does.
fn parse_marks(params: &serde_json::Value) -> ServiceResult<Vec<StudentMark>> {
    let Some(items) = params.get("marks").and_then(|v| v.as_array()) else {
        return Err(ServiceError::MissingRequiredField("marks"));
    };
    let mut marks = Vec::with_capacity(items.len());
    for item in items {
        let student_id = item
            .get("studentId")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ServiceError::MissingRequiredField("studentId"))?;
        let present = match item.get("present") {
            None | Some(serde_json::Value::Null) => false,
            Some(v) => v.as_bool().ok_or_else(|| ServiceError::InvalidValue {
                field: "present",
                reason: "present must be a boolean".to_string(),
            })?,
        };
        marks.push(StudentMark {
            student_id: student_id.to_string(),
            present,
        });
    }
    Ok(marks)
}

fn mark(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let caller = ctx.caller.ok_or(ServiceError::Unauthenticated)?;
    let marks = parse_marks(params)?;
    let outcome = ledger::mark_attendance(
        ctx.conn,
        caller,
        &get_str(params, "subjectId"),
        &get_str(params, "date"),
        &marks,
    )?;
    Ok(json!(outcome))
}

fn roster(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let caller = ctx.caller.ok_or(ServiceError::Unauthenticated)?;
    let subject = ledger::require_subject(ctx.conn, &get_str(params, "subjectId"))?;
    ledger::ensure_owns_subject(ctx.conn, caller, &subject)?;
    let date = format_date(parse_date("date", &get_str(params, "date"))?);
    let roster = ledger::roster(ctx.conn, &subject, &date)?;
    Ok(json!({
        "subject": subject,
        "date": date,
        "students": roster,
    }))
}

fn daywise(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let date = get_str(params, "date");
    let entries = ledger::daywise(ctx.conn, &date, get_opt_str(params, "subjectId"))?;
    Ok(json!({
        "date": date.trim(),
        "students": entries,
    }))
}

pub fn try_handle(ctx: &Ctx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.mark" => mark(ctx, &req.params),
        "attendance.roster" => roster(ctx, &req.params),
        "attendance.daywise" => daywise(ctx, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
