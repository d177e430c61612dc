use crate::error::{ServiceError, ServiceResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{get_opt_str, get_str};
use crate::ipc::types::{Ctx, Request};
use crate::model::Role;
use crate::service::{accounts, session};
use serde_json::json;

pub const METHODS: &[&str] = &["session.login", "session.logout", "session.whoami"];

fn login(ctx: &Ctx, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let outcome = session::login(
        ctx.conn,
        &get_str(params, "username"),
        &get_str(params, "password"),
    )?;
    Ok(json!(outcome))
}

fn logout(ctx: &Ctx, req: &Request) -> ServiceResult<serde_json::Value> {
    let token = get_opt_str(&req.params, "token").or(req.token.as_deref());
    if let Some(t) = token {
        session::logout(ctx.conn, t)?;
    }
    Ok(json!({ "ok": true }))
}

/// The caller's identity plus whichever profile belongs to it.
fn whoami(ctx: &Ctx) -> ServiceResult<serde_json::Value> {
    let caller = ctx.caller.ok_or(ServiceError::Unauthenticated)?;
    let identity = accounts::get_identity(ctx.conn, &caller.user_id)?
        .ok_or(ServiceError::NotFound("account"))?;
    let profile = match caller.role {
        Role::Student => json!(accounts::student_for_user(ctx.conn, &caller.user_id)?),
        Role::Faculty => json!(accounts::faculty_for_user(ctx.conn, &caller.user_id)?),
        Role::Admin => serde_json::Value::Null,
    };
    Ok(json!({ "identity": identity, "profile": profile }))
}

pub fn try_handle(ctx: &Ctx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "session.login" => login(ctx, &req.params),
        "session.logout" => logout(ctx, req),
        "session.whoami" => whoami(ctx),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
