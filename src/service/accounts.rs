//! Identities and their role profiles.
//!
//! Registration creates the identity and its profile in one transaction, so
//! a failure on the profile insert leaves no orphan account behind.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{new_id, now_stamp, required, unique_violation};
use crate::config::Cfg;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{
    FacultyProfile, Identity, Role, StudentProfile, DEFAULT_CLASS_SECTION,
    DEFAULT_FACULTY_AVATAR, DEFAULT_STUDENT_AVATAR,
};
use crate::passwords;

const STUDENT_COLS: &str =
    "id, user_id, first_name, last_name, email, roll_no, course, class_section, avatar_ref";
const FACULTY_COLS: &str =
    "id, user_id, first_name, last_name, username, email, department, avatar_ref";

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub roll_no: String,
    pub course: String,
    /// Blank means the default section.
    pub class_section: String,
    pub avatar_ref: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewFaculty {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub avatar_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registered {
    pub user_id: String,
    pub profile_id: String,
    pub role: Role,
}

pub(crate) fn row_to_student(r: &Row) -> rusqlite::Result<StudentProfile> {
    Ok(StudentProfile {
        id: r.get(0)?,
        user_id: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
        email: r.get(4)?,
        roll_no: r.get(5)?,
        course: r.get(6)?,
        class_section: r.get(7)?,
        avatar_ref: r.get(8)?,
    })
}

pub(crate) fn row_to_faculty(r: &Row) -> rusqlite::Result<FacultyProfile> {
    Ok(FacultyProfile {
        id: r.get(0)?,
        user_id: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
        username: r.get(4)?,
        email: r.get(5)?,
        department: r.get(6)?,
        avatar_ref: r.get(7)?,
    })
}

fn row_to_identity(r: &Row) -> rusqlite::Result<Identity> {
    let role: String = r.get(3)?;
    Ok(Identity {
        id: r.get(0)?,
        username: r.get(1)?,
        email: r.get(2)?,
        role: role.parse().unwrap_or_default(),
        created_at: r.get(4)?,
    })
}

/// Account fields after the shared registration checks.
struct CheckedAccount {
    username: String,
    password: String,
    email: String,
}

fn username_exists(conn: &Connection, username: &str) -> ServiceResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM users WHERE username = ?", [username], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn value_taken(conn: &Connection, table: &str, column: &str, value: &str) -> ServiceResult<bool> {
    Ok(conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE {} = ?", table, column),
            [value],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn check_account(
    conn: &Connection,
    cfg: &Cfg,
    username: &str,
    password: &str,
    password_confirm: &str,
    email: &str,
) -> ServiceResult<CheckedAccount> {
    let username = required("username", username)?;
    if password.is_empty() {
        return Err(ServiceError::MissingRequiredField("password"));
    }
    if password_confirm.is_empty() {
        return Err(ServiceError::MissingRequiredField("password_confirm"));
    }
    let email = required("email", email)?;

    if username_exists(conn, &username)? {
        return Err(ServiceError::DuplicateUsername);
    }
    if password != password_confirm {
        return Err(ServiceError::PasswordMismatch);
    }
    let violations = passwords::strength_violations(password, &username, cfg.min_password_length);
    if !violations.is_empty() {
        return Err(ServiceError::WeakPassword(violations));
    }

    Ok(CheckedAccount {
        username,
        password: password.to_string(),
        email,
    })
}

fn insert_identity(
    conn: &Connection,
    username: &str,
    password: &str,
    email: &str,
    role: Role,
) -> ServiceResult<String> {
    let id = new_id();
    let hash = passwords::hash_password(password)?;
    conn.execute(
        "INSERT INTO users(id, username, password_hash, email, role, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, username, &hash, email, role.as_str(), now_stamp()),
    )
    .map_err(|e| match unique_violation(e, "users.username", "username") {
        ServiceError::DuplicateField(_) => ServiceError::DuplicateUsername,
        other => other,
    })?;
    Ok(id)
}

pub fn register_student(
    conn: &Connection,
    cfg: &Cfg,
    input: &NewStudent,
) -> ServiceResult<Registered> {
    let account = check_account(
        conn,
        cfg,
        &input.username,
        &input.password,
        &input.password_confirm,
        &input.email,
    )?;
    let last_name = required("last_name", &input.last_name)?;
    let roll_no = required("roll_no", &input.roll_no)?;
    let course = required("course", &input.course)?;
    let first_name = input.first_name.trim().to_string();
    let class_section = match input.class_section.trim() {
        "" => DEFAULT_CLASS_SECTION.to_string(),
        s => s.to_string(),
    };
    let avatar_ref = input
        .avatar_ref
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STUDENT_AVATAR)
        .to_string();

    if value_taken(conn, "students", "roll_no", &roll_no)? {
        return Err(ServiceError::DuplicateField("roll_no"));
    }
    if value_taken(conn, "students", "email", &account.email)? {
        return Err(ServiceError::DuplicateField("email"));
    }

    let tx = conn.unchecked_transaction()?;
    let user_id = insert_identity(
        &tx,
        &account.username,
        &account.password,
        &account.email,
        Role::Student,
    )?;
    let profile_id = new_id();
    tx.execute(
        &format!("INSERT INTO students({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)", STUDENT_COLS),
        (
            &profile_id,
            &user_id,
            &first_name,
            &last_name,
            &account.email,
            &roll_no,
            &course,
            &class_section,
            &avatar_ref,
        ),
    )
    .map_err(|e| match unique_violation(e, "students.roll_no", "roll_no") {
        ServiceError::Db(e) => unique_violation(e, "students.email", "email"),
        other => other,
    })?;
    tx.commit()?;

    log::info!(
        "Registered student {:?} (roll {}) as user {}.",
        &account.username,
        &roll_no,
        &user_id
    );
    Ok(Registered {
        user_id,
        profile_id,
        role: Role::Student,
    })
}

pub fn register_faculty(
    conn: &Connection,
    cfg: &Cfg,
    input: &NewFaculty,
) -> ServiceResult<Registered> {
    let account = check_account(
        conn,
        cfg,
        &input.username,
        &input.password,
        &input.password_confirm,
        &input.email,
    )?;
    let first_name = required("first_name", &input.first_name)?;
    let last_name = required("last_name", &input.last_name)?;
    let department = required("department", &input.department)?;
    let avatar_ref = input
        .avatar_ref
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FACULTY_AVATAR)
        .to_string();

    if value_taken(conn, "faculty", "username", &account.username)? {
        return Err(ServiceError::DuplicateField("username"));
    }
    if value_taken(conn, "faculty", "email", &account.email)? {
        return Err(ServiceError::DuplicateField("email"));
    }

    let tx = conn.unchecked_transaction()?;
    let user_id = insert_identity(
        &tx,
        &account.username,
        &account.password,
        &account.email,
        Role::Faculty,
    )?;
    let profile_id = new_id();
    tx.execute(
        &format!("INSERT INTO faculty({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?)", FACULTY_COLS),
        (
            &profile_id,
            &user_id,
            &first_name,
            &last_name,
            &account.username,
            &account.email,
            &department,
            &avatar_ref,
        ),
    )
    .map_err(|e| unique_violation(e, "faculty.email", "email"))?;
    tx.commit()?;

    log::info!(
        "Registered faculty {:?} ({}) as user {}.",
        &account.username,
        &department,
        &user_id
    );
    Ok(Registered {
        user_id,
        profile_id,
        role: Role::Faculty,
    })
}

/// Makes sure the configured admin account exists. An admin whose stored
/// password no longer matches the configured one is left alone.
pub fn ensure_default_admin(conn: &Connection, cfg: &Cfg) -> ServiceResult<()> {
    log::trace!("Checking existence of default admin {:?}...", &cfg.default_admin_uname);
    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT role, password_hash FROM users WHERE username = ?",
            [&cfg.default_admin_uname],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    match existing {
        None => {
            log::info!(
                "Default admin ({}) doesn't exist; inserting.",
                &cfg.default_admin_uname
            );
            insert_identity(
                conn,
                &cfg.default_admin_uname,
                &cfg.default_admin_password,
                &cfg.default_admin_email,
                Role::Admin,
            )?;
        }
        Some((role, _)) if role != Role::Admin.as_str() => {
            log::warn!(
                "Default admin name {:?} belongs to a {} account; not promoting it.",
                &cfg.default_admin_uname,
                &role
            );
        }
        Some((_, hash)) => {
            if !passwords::verify_password(&cfg.default_admin_password, &hash) {
                log::warn!(
                    "Default admin ({}) not using default password.",
                    &cfg.default_admin_uname
                );
            } else {
                log::trace!("Default admin password check OK.");
            }
        }
    }
    Ok(())
}

pub fn get_identity(conn: &Connection, user_id: &str) -> ServiceResult<Option<Identity>> {
    Ok(conn
        .query_row(
            "SELECT id, username, email, role, created_at FROM users WHERE id = ?",
            [user_id],
            row_to_identity,
        )
        .optional()?)
}

pub fn find_identity_by_username(
    conn: &Connection,
    username: &str,
) -> ServiceResult<Option<Identity>> {
    Ok(conn
        .query_row(
            "SELECT id, username, email, role, created_at FROM users WHERE username = ?",
            [username],
            row_to_identity,
        )
        .optional()?)
}

/// Removes an account; its profile, owned subjects, ledger rows and sessions
/// go with it through the foreign-key cascades.
pub fn delete_account(conn: &Connection, user_id: &str) -> ServiceResult<()> {
    let n = conn.execute("DELETE FROM users WHERE id = ?", [user_id])?;
    if n == 0 {
        return Err(ServiceError::NotFound("account"));
    }
    log::info!("Deleted account {}.", user_id);
    Ok(())
}

pub fn student_for_user(conn: &Connection, user_id: &str) -> ServiceResult<Option<StudentProfile>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM students WHERE user_id = ?", STUDENT_COLS),
            [user_id],
            row_to_student,
        )
        .optional()?)
}

pub fn get_student(conn: &Connection, student_id: &str) -> ServiceResult<Option<StudentProfile>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLS),
            [student_id],
            row_to_student,
        )
        .optional()?)
}

pub fn faculty_for_user(conn: &Connection, user_id: &str) -> ServiceResult<Option<FacultyProfile>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM faculty WHERE user_id = ?", FACULTY_COLS),
            [user_id],
            row_to_faculty,
        )
        .optional()?)
}

pub fn get_faculty(conn: &Connection, faculty_id: &str) -> ServiceResult<Option<FacultyProfile>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM faculty WHERE id = ?", FACULTY_COLS),
            [faculty_id],
            row_to_faculty,
        )
        .optional()?)
}

/// Students ordered by roll number, optionally limited to one class section.
pub fn list_students(
    conn: &Connection,
    class_section: Option<&str>,
) -> ServiceResult<Vec<StudentProfile>> {
    let students = match class_section {
        Some(section) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM students WHERE class_section = ? ORDER BY roll_no",
                STUDENT_COLS
            ))?;
            let rows = stmt.query_map([section], row_to_student)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM students ORDER BY roll_no",
                STUDENT_COLS
            ))?;
            let rows = stmt.query_map([], row_to_student)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(students)
}

pub fn list_faculty(conn: &Connection) -> ServiceResult<Vec<FacultyProfile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM faculty ORDER BY last_name, first_name",
        FACULTY_COLS
    ))?;
    let rows = stmt.query_map([], row_to_faculty)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::count_rows;
    use crate::service::test_support::{self, faculty_input, student_input};
    use pretty_assertions::assert_eq;

    #[test]
    fn student_registration_creates_identity_and_linked_profile() {
        let conn = test_support::conn();
        let reg = register_student(&conn, &Cfg::default(), &student_input("alice", "R1"))
            .expect("register");

        assert_eq!(count_rows(&conn, "users").expect("count"), 1);
        assert_eq!(count_rows(&conn, "students").expect("count"), 1);

        let profile = student_for_user(&conn, &reg.user_id)
            .expect("query")
            .expect("profile");
        assert_eq!(profile.id, reg.profile_id);
        let identity = get_identity(&conn, &profile.user_id)
            .expect("query")
            .expect("identity");
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.role, Role::Student);
        assert_eq!(profile.avatar_ref, DEFAULT_STUDENT_AVATAR);
    }

    #[test]
    fn duplicate_username_never_creates_second_identity() {
        let conn = test_support::conn();
        test_support::student(&conn, "alice", "R1");

        let err = register_student(&conn, &Cfg::default(), &student_input("alice", "R2"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateUsername));

        let err = register_faculty(&conn, &Cfg::default(), &faculty_input("alice")).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateUsername));

        assert_eq!(count_rows(&conn, "users").expect("count"), 1);
    }

    #[test]
    fn password_checks_run_in_order() {
        let conn = test_support::conn();

        let mut input = student_input("bob", "R2");
        input.password_confirm = "something-else".into();
        assert!(matches!(
            register_student(&conn, &Cfg::default(), &input),
            Err(ServiceError::PasswordMismatch)
        ));

        let mut input = student_input("bob", "R2");
        input.password = "1234".into();
        input.password_confirm = "1234".into();
        match register_student(&conn, &Cfg::default(), &input) {
            Err(ServiceError::WeakPassword(reasons)) => assert_eq!(reasons.len(), 2),
            other => panic!("expected weak password, got {:?}", other),
        }
        assert_eq!(count_rows(&conn, "users").expect("count"), 0);
    }

    #[test]
    fn duplicate_roll_no_rolls_back_nothing_partial() {
        let conn = test_support::conn();
        test_support::student(&conn, "alice", "R1");

        let err = register_student(&conn, &Cfg::default(), &student_input("carol", "R1"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateField("roll_no")));
        assert_eq!(count_rows(&conn, "users").expect("count"), 1);
        assert!(find_identity_by_username(&conn, "carol")
            .expect("query")
            .is_none());
    }

    #[test]
    fn missing_fields_are_named() {
        let conn = test_support::conn();
        let mut input = student_input("dave", "R4");
        input.course = "   ".into();
        assert!(matches!(
            register_student(&conn, &Cfg::default(), &input),
            Err(ServiceError::MissingRequiredField("course"))
        ));

        let mut input = faculty_input("erin");
        input.department.clear();
        assert!(matches!(
            register_faculty(&conn, &Cfg::default(), &input),
            Err(ServiceError::MissingRequiredField("department"))
        ));
    }

    #[test]
    fn blank_class_section_gets_default() {
        let conn = test_support::conn();
        let mut input = student_input("frank", "R5");
        input.class_section = String::new();
        let reg = register_student(&conn, &Cfg::default(), &input).expect("register");
        let p = get_student(&conn, &reg.profile_id)
            .expect("query")
            .expect("profile");
        assert_eq!(p.class_section, DEFAULT_CLASS_SECTION);
    }

    #[test]
    fn stored_password_is_an_argon2_phc_string() {
        let conn = test_support::conn();
        let reg = register_student(&conn, &Cfg::default(), &student_input("gina", "R6"))
            .expect("register");
        let stored: String = conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?",
                [&reg.user_id],
                |r| r.get(0),
            )
            .expect("hash");
        assert!(stored.starts_with("$argon2id$"), "{}", stored);
        assert!(passwords::verify_password("Tr1cky-Walrus", &stored));
        assert!(!passwords::verify_password("Tr1cky-Walrus?", &stored));
    }

    #[test]
    fn default_admin_is_created_once() {
        let conn = test_support::conn();
        let cfg = Cfg::default();
        ensure_default_admin(&conn, &cfg).expect("first");
        ensure_default_admin(&conn, &cfg).expect("second");
        let admin = find_identity_by_username(&conn, &cfg.default_admin_uname)
            .expect("query")
            .expect("admin");
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(count_rows(&conn, "users").expect("count"), 1);
    }

    #[test]
    fn deleting_faculty_account_cascades() {
        let conn = test_support::conn();
        let fac = test_support::faculty(&conn, "prof");
        test_support::subject(&conn, &fac.profile_id, "MATH101");

        delete_account(&conn, &fac.user_id).expect("delete");
        assert_eq!(count_rows(&conn, "faculty").expect("count"), 0);
        assert_eq!(count_rows(&conn, "subjects").expect("count"), 0);
        assert!(matches!(
            delete_account(&conn, &fac.user_id),
            Err(ServiceError::NotFound("account"))
        ));
    }
}
