use crate::error::{ServiceError, ServiceResult};

/// String parameter, or empty when absent. Blank checks happen in the
/// service layer so both transports report the same missing field.
pub fn get_str(params: &serde_json::Value, key: &str) -> String {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn get_opt_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn get_required_str(
    params: &serde_json::Value,
    key: &'static str,
) -> ServiceResult<String> {
    get_opt_str(params, key)
        .map(|s| s.to_string())
        .ok_or(ServiceError::MissingRequiredField(key))
}
