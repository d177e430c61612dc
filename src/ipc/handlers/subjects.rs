use crate::error::ServiceResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{get_opt_str, get_required_str, get_str};
use crate::ipc::types::{Ctx, Request};
use crate::service::catalog::{self, NewSubject};
use serde_json::json;

pub const METHODS: &[&str] = &["subjects.create", "subjects.list", "subjects.delete"];

fn create(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let input = NewSubject {
        course_name: get_str(params, "courseName"),
        course_code: get_str(params, "courseCode"),
        short_name: get_str(params, "shortName"),
        faculty_id: get_str(params, "facultyId"),
        academic_year: get_str(params, "academicYear"),
        semester: get_str(params, "semester"),
        class_section: get_str(params, "classSection"),
    };
    let subject = catalog::create_subject(ctx.conn, &input)?;
    Ok(json!({ "subject": subject }))
}

fn list(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let subjects = catalog::list_subjects(ctx.conn, get_opt_str(params, "facultyId"))?;
    Ok(json!({ "subjects": subjects }))
}

fn delete(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let subject_id = get_required_str(params, "subjectId")?;
    catalog::delete_subject(ctx.conn, &subject_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(ctx: &Ctx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.create" => create(ctx, &req.params),
        "subjects.list" => list(ctx, &req.params),
        "subjects.delete" => delete(ctx, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
