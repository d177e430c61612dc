/*!
Operations shared by the IPC sidecar and the HTTP server.

Everything here takes a plain `&Connection`; the transports own the
connection and the error envelope.
*/
pub mod accounts;
pub mod catalog;
pub mod dashboards;
pub mod guard;
pub mod ledger;
pub mod session;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

pub const DATE_FMT: &str = "%Y-%m-%d";

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Trims `value` and fails if nothing is left.
pub(crate) fn required(field: &'static str, value: &str) -> ServiceResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(ServiceError::MissingRequiredField(field));
    }
    Ok(t.to_string())
}

pub fn parse_date(field: &'static str, value: &str) -> ServiceResult<NaiveDate> {
    let t = required(field, value)?;
    NaiveDate::parse_from_str(&t, DATE_FMT).map_err(|_| ServiceError::InvalidValue {
        field,
        reason: format!("{:?} is not a YYYY-MM-DD date", t),
    })
}

pub(crate) fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

/// Maps a UNIQUE constraint failure on `column` to `DuplicateField`. Covers
/// the window between the pre-insert check and the insert.
pub(crate) fn unique_violation(e: rusqlite::Error, column: &str, field: &'static str) -> ServiceError {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(column) {
            return ServiceError::DuplicateField(field);
        }
    }
    ServiceError::Db(e)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_days_only() {
        assert_eq!(
            parse_date("date", " 2024-01-10 ").map(format_date).ok(),
            Some("2024-01-10".to_string())
        );
        assert!(matches!(
            parse_date("date", ""),
            Err(ServiceError::MissingRequiredField("date"))
        ));
        assert!(matches!(
            parse_date("date", "10/01/2024"),
            Err(ServiceError::InvalidValue { field: "date", .. })
        ));
    }
}
