use serde_json::json;

use crate::error::{ServiceError, ServiceResult};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn service_err(id: &str, e: &ServiceError) -> serde_json::Value {
    if let ServiceError::Db(inner) = e {
        log::error!("Request {} hit a database error: {}", id, inner);
    }
    err(id, e.code(), e.to_string(), e.details())
}

pub fn respond(id: &str, result: ServiceResult<serde_json::Value>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => service_err(id, &e),
    }
}
