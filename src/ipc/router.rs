use super::error::{err, service_err};
use super::handlers;
use super::types::{AppState, Ctx, Request};
use crate::service::guard;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    log::debug!("request {} -> {}", &req.id, &req.method);

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if !handlers::is_known_method(&req.method) {
        return err(
            &req.id,
            "not_implemented",
            format!("unknown method: {}", req.method),
            None,
        );
    }

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let caller = match guard::check(conn, &req.method, req.token.as_deref()) {
        Ok(c) => c,
        Err(e) => return service_err(&req.id, &e),
    };
    let ctx = Ctx {
        conn,
        cfg: &state.cfg,
        caller: caller.as_ref(),
    };

    if let Some(resp) = handlers::accounts::try_handle(&ctx, &req) {
        return resp;
    }
    if let Some(resp) = handlers::session::try_handle(&ctx, &req) {
        return resp;
    }
    if let Some(resp) = handlers::subjects::try_handle(&ctx, &req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(&ctx, &req) {
        return resp;
    }
    if let Some(resp) = handlers::dashboards::try_handle(&ctx, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
