//! Role-based access check run before each operation.
//!
//! Both transports name operations by their IPC method name, so the policy
//! lives in one table.

use rusqlite::Connection;

use super::session::{self, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Access {
    Open,
    Roles(&'static [Role]),
}

const STAFF: &[Role] = &[Role::Admin, Role::Faculty];
const ADMIN: &[Role] = &[Role::Admin];
const FACULTY: &[Role] = &[Role::Faculty];
const STUDENT_OR_ADMIN: &[Role] = &[Role::Student, Role::Admin];
const ANY: &[Role] = &[Role::Admin, Role::Faculty, Role::Student];

pub fn access_for(operation: &str) -> Access {
    match operation {
        "subjects.create" | "subjects.list" | "students.list" | "faculty.list" => {
            Access::Roles(STAFF)
        }
        "attendance.mark" | "attendance.roster" | "attendance.daywise" => Access::Roles(STAFF),
        "subjects.delete" | "accounts.delete" | "accounts.lookup" | "dashboard.admin" => {
            Access::Roles(ADMIN)
        }
        "dashboard.faculty" => Access::Roles(FACULTY),
        "dashboard.student" => Access::Roles(STUDENT_OR_ADMIN),
        "session.whoami" => Access::Roles(ANY),
        _ => Access::Open,
    }
}

/// Resolves the session behind `token` and checks it against the policy for
/// `operation`. Open operations still resolve a caller when a token is given.
pub fn check(
    conn: &Connection,
    operation: &str,
    token: Option<&str>,
) -> ServiceResult<Option<Caller>> {
    let caller = match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => session::resolve(conn, t)?,
        None => None,
    };

    match access_for(operation) {
        Access::Open => Ok(caller),
        Access::Roles(allowed) => {
            let Some(caller) = caller else {
                log::debug!("{} refused: no valid session.", operation);
                return Err(ServiceError::Unauthenticated);
            };
            if !allowed.contains(&caller.role) {
                log::debug!("{} refused for {} {:?}.", operation, caller.role, caller.username);
                return Err(ServiceError::Forbidden(caller.role.to_string()));
            }
            Ok(Some(caller))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cfg;
    use crate::service::{accounts, test_support};

    #[test]
    fn open_operations_need_no_session() {
        let conn = test_support::conn();
        assert_eq!(check(&conn, "accounts.registerStudent", None).expect("open"), None);
        assert_eq!(access_for("session.login"), Access::Open);
    }

    #[test]
    fn role_claim_gates_operations() {
        let conn = test_support::conn();
        let cfg = Cfg::default();
        accounts::ensure_default_admin(&conn, &cfg).expect("admin");
        test_support::student(&conn, "alice", "R1");
        test_support::faculty(&conn, "prof");

        let student = session::login(&conn, "alice", "Tr1cky-Walrus").expect("login");
        let faculty = session::login(&conn, "prof", "Tr1cky-Walrus").expect("login");
        let admin = session::login(&conn, &cfg.default_admin_uname, &cfg.default_admin_password)
            .expect("login");

        assert!(matches!(
            check(&conn, "attendance.mark", None),
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(
            check(&conn, "attendance.mark", Some("bogus")),
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(
            check(&conn, "attendance.mark", Some(&student.token)),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(check(&conn, "attendance.mark", Some(&faculty.token)).is_ok());
        assert!(check(&conn, "attendance.mark", Some(&admin.token)).is_ok());

        assert!(check(&conn, "dashboard.student", Some(&student.token)).is_ok());
        assert!(matches!(
            check(&conn, "dashboard.student", Some(&faculty.token)),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            check(&conn, "dashboard.admin", Some(&faculty.token)),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
