//! The attendance ledger: one row per (student, subject, date).
//!
//! Marking is an upsert keyed by that triple. Re-marking overwrites the
//! `present` flag in place and re-submitting identical flags writes nothing.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::session::Caller;
use super::{accounts, catalog, format_date, new_id, now_stamp, parse_date, required};
use crate::error::{ServiceError, ServiceResult};
use crate::model::{display_name, AttendanceRecord, Role, Subject};

#[derive(Debug, Clone, PartialEq)]
pub struct StudentMark {
    pub student_id: String,
    pub present: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MarkOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayStatus {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    pub roll_no: String,
    pub display_name: String,
    /// `None` until the student has been marked for this subject and date.
    pub present: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaywiseEntry {
    pub student_id: String,
    pub roll_no: String,
    pub display_name: String,
    pub status: DayStatus,
}

/// A faculty member may only mark or view the roster of subjects they own;
/// admins may do either for any subject.
pub(crate) fn ensure_owns_subject(
    conn: &Connection,
    caller: &Caller,
    subject: &Subject,
) -> ServiceResult<()> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Faculty => {
            let owns = accounts::faculty_for_user(conn, &caller.user_id)?
                .map(|f| f.id == subject.faculty_id)
                .unwrap_or(false);
            if owns {
                Ok(())
            } else {
                Err(ServiceError::Forbidden(caller.role.to_string()))
            }
        }
        Role::Student => Err(ServiceError::Forbidden(caller.role.to_string())),
    }
}

pub(crate) fn require_subject(conn: &Connection, subject_id: &str) -> ServiceResult<Subject> {
    let subject_id = required("subject", subject_id)?;
    catalog::get_subject(conn, &subject_id)?.ok_or(ServiceError::ReferencedEntityNotFound {
        entity: "subject",
        id: subject_id,
    })
}

pub fn mark_attendance(
    conn: &Connection,
    caller: &Caller,
    subject_id: &str,
    date: &str,
    marks: &[StudentMark],
) -> ServiceResult<MarkOutcome> {
    let subject = require_subject(conn, subject_id)?;
    let date = format_date(parse_date("date", date)?);
    ensure_owns_subject(conn, caller, &subject)?;

    let mut outcome = MarkOutcome::default();
    let tx = conn.unchecked_transaction()?;
    for mark in marks {
        let section: Option<String> = tx
            .query_row(
                "SELECT class_section FROM students WHERE id = ?",
                [&mark.student_id],
                |r| r.get(0),
            )
            .optional()?;
        // Returning early drops `tx`, which rolls back earlier students' rows.
        match section {
            None => {
                return Err(ServiceError::ReferencedEntityNotFound {
                    entity: "student",
                    id: mark.student_id.clone(),
                })
            }
            Some(section) if section != subject.class_section => {
                return Err(ServiceError::InvalidValue {
                    field: "studentId",
                    reason: format!(
                        "student {} is in {}, not {}",
                        mark.student_id, section, subject.class_section
                    ),
                })
            }
            Some(_) => {}
        }

        let existing: Option<bool> = tx
            .query_row(
                "SELECT present FROM attendance_records
                 WHERE student_id = ? AND subject_id = ? AND date = ?",
                (&mark.student_id, &subject.id, &date),
                |r| Ok(r.get::<_, i64>(0)? != 0),
            )
            .optional()?;
        match existing {
            Some(p) if p == mark.present => {
                outcome.unchanged += 1;
                continue;
            }
            Some(_) => outcome.updated += 1,
            None => outcome.inserted += 1,
        }

        tx.execute(
            "INSERT INTO attendance_records(id, student_id, subject_id, date, present, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, subject_id, date) DO UPDATE SET
               present = excluded.present,
               updated_at = excluded.updated_at",
            (
                new_id(),
                &mark.student_id,
                &subject.id,
                &date,
                mark.present as i64,
                now_stamp(),
            ),
        )?;
    }
    tx.commit()?;

    log::info!(
        "Attendance for {} on {} by {:?}: {} new, {} changed, {} unchanged.",
        &subject.course_code,
        &date,
        &caller.username,
        outcome.inserted,
        outcome.updated,
        outcome.unchanged
    );
    Ok(outcome)
}

/// Ledger rows for one subject on one date.
pub fn records_on(
    conn: &Connection,
    subject_id: &str,
    date: &str,
) -> ServiceResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, subject_id, date, present
         FROM attendance_records
         WHERE subject_id = ? AND date = ?
         ORDER BY student_id",
    )?;
    let rows = stmt.query_map((subject_id, date), |r| {
        Ok(AttendanceRecord {
            id: r.get(0)?,
            student_id: r.get(1)?,
            subject_id: r.get(2)?,
            date: r.get(3)?,
            present: r.get::<_, i64>(4)? != 0,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// One `present` flag per ledger row for the student in the subject.
pub fn presence_flags(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
) -> ServiceResult<Vec<bool>> {
    let mut stmt = conn.prepare(
        "SELECT present FROM attendance_records
         WHERE student_id = ? AND subject_id = ?
         ORDER BY date",
    )?;
    let rows = stmt.query_map((student_id, subject_id), |r| Ok(r.get::<_, i64>(0)? != 0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// The students of the subject's class section with their mark for `date`.
pub fn roster(conn: &Connection, subject: &Subject, date: &str) -> ServiceResult<Vec<RosterEntry>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.roll_no, s.first_name, s.last_name, r.present
         FROM students s
         LEFT JOIN attendance_records r
           ON r.student_id = s.id AND r.subject_id = ? AND r.date = ?
         WHERE s.class_section = ?
         ORDER BY s.roll_no",
    )?;
    let rows = stmt.query_map((&subject.id, date, &subject.class_section), |r| {
        let first: String = r.get(2)?;
        let last: String = r.get(3)?;
        Ok(RosterEntry {
            student_id: r.get(0)?,
            roll_no: r.get(1)?,
            display_name: display_name(&first, &last),
            present: r.get::<_, Option<i64>>(4)?.map(|v| v != 0),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Classifies every student for `date`. No record means absent; without a
/// subject filter any present record that day counts.
pub fn daywise(
    conn: &Connection,
    date: &str,
    subject_id: Option<&str>,
) -> ServiceResult<Vec<DaywiseEntry>> {
    let date = format_date(parse_date("date", date)?);
    let subject_id = subject_id.map(str::trim).filter(|s| !s.is_empty());

    let mut stmt = conn.prepare(
        "SELECT s.id, s.roll_no, s.first_name, s.last_name,
                (SELECT MAX(r.present) FROM attendance_records r
                  WHERE r.student_id = s.id
                    AND r.date = ?1
                    AND (?2 IS NULL OR r.subject_id = ?2))
         FROM students s
         ORDER BY s.roll_no",
    )?;
    let rows = stmt.query_map((&date, subject_id), |r| {
        let first: String = r.get(2)?;
        let last: String = r.get(3)?;
        let status = match r.get::<_, Option<i64>>(4)? {
            Some(v) if v != 0 => DayStatus::Present,
            _ => DayStatus::Absent,
        };
        Ok(DaywiseEntry {
            student_id: r.get(0)?,
            roll_no: r.get(1)?,
            display_name: display_name(&first, &last),
            status,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cfg;
    use crate::db::count_rows;
    use crate::service::{session, test_support};
    use pretty_assertions::assert_eq;

    fn faculty_caller(conn: &Connection, username: &str) -> (Caller, String) {
        let reg = test_support::faculty(conn, username);
        let out = session::login(conn, username, "Tr1cky-Walrus").expect("login");
        let caller = session::resolve(conn, &out.token)
            .expect("resolve")
            .expect("caller");
        (caller, reg.profile_id)
    }

    fn mark(student_id: &str, present: bool) -> StudentMark {
        StudentMark {
            student_id: student_id.to_string(),
            present,
        }
    }

    #[test]
    fn remarking_same_triple_keeps_one_row_with_latest_value() {
        let conn = test_support::conn();
        let alice = test_support::student(&conn, "alice", "R1");
        let (caller, faculty_id) = faculty_caller(&conn, "prof");
        let math = test_support::subject(&conn, &faculty_id, "Math101");

        let first = mark_attendance(
            &conn,
            &caller,
            &math.id,
            "2024-01-10",
            &[mark(&alice.profile_id, true)],
        )
        .expect("first mark");
        assert_eq!(first, MarkOutcome { inserted: 1, updated: 0, unchanged: 0 });

        let second = mark_attendance(
            &conn,
            &caller,
            &math.id,
            "2024-01-10",
            &[mark(&alice.profile_id, false)],
        )
        .expect("re-mark");
        assert_eq!(second, MarkOutcome { inserted: 0, updated: 1, unchanged: 0 });

        let rows = records_on(&conn, &math.id, "2024-01-10").expect("records");
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].present);
        assert_eq!(count_rows(&conn, "attendance_records").expect("count"), 1);
    }

    #[test]
    fn resubmitting_identical_form_changes_nothing() {
        let conn = test_support::conn();
        let alice = test_support::student(&conn, "alice", "R1");
        let bob = test_support::student(&conn, "bobby", "R2");
        let (caller, faculty_id) = faculty_caller(&conn, "prof");
        let math = test_support::subject(&conn, &faculty_id, "Math101");
        let form = [mark(&alice.profile_id, true), mark(&bob.profile_id, false)];

        mark_attendance(&conn, &caller, &math.id, "2024-01-10", &form).expect("first");
        let before = records_on(&conn, &math.id, "2024-01-10").expect("records");
        let again = mark_attendance(&conn, &caller, &math.id, "2024-01-10", &form).expect("again");

        assert_eq!(again, MarkOutcome { inserted: 0, updated: 0, unchanged: 2 });
        assert_eq!(records_on(&conn, &math.id, "2024-01-10").expect("records"), before);
    }

    #[test]
    fn unknown_student_rolls_back_whole_form() {
        let conn = test_support::conn();
        let alice = test_support::student(&conn, "alice", "R1");
        let (caller, faculty_id) = faculty_caller(&conn, "prof");
        let math = test_support::subject(&conn, &faculty_id, "Math101");

        let err = mark_attendance(
            &conn,
            &caller,
            &math.id,
            "2024-01-10",
            &[mark(&alice.profile_id, true), mark("ghost", true)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ReferencedEntityNotFound { entity: "student", .. }
        ));
        assert_eq!(count_rows(&conn, "attendance_records").expect("count"), 0);
    }

    #[test]
    fn faculty_cannot_mark_someone_elses_subject() {
        let conn = test_support::conn();
        let alice = test_support::student(&conn, "alice", "R1");
        let (_, owner_id) = faculty_caller(&conn, "prof");
        let (other, _) = faculty_caller(&conn, "other");
        let math = test_support::subject(&conn, &owner_id, "Math101");

        let err = mark_attendance(
            &conn,
            &other,
            &math.id,
            "2024-01-10",
            &[mark(&alice.profile_id, true)],
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn student_from_another_section_rolls_back_whole_form() {
        let conn = test_support::conn();
        let alice = test_support::student(&conn, "alice", "R1");
        let mut input = test_support::student_input("bobby", "R2");
        input.class_section = "Class B".to_string();
        let bob = accounts::register_student(&conn, &Cfg::default(), &input)
            .expect("register");
        let (caller, faculty_id) = faculty_caller(&conn, "prof");
        let math = test_support::subject(&conn, &faculty_id, "Math101");

        let err = mark_attendance(
            &conn,
            &caller,
            &math.id,
            "2024-01-10",
            &[mark(&alice.profile_id, true), mark(&bob.profile_id, true)],
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidValue { field: "studentId", .. }));
        assert_eq!(count_rows(&conn, "attendance_records").expect("count"), 0);
    }

    #[test]
    fn only_the_owner_or_an_admin_may_see_a_subject() {
        let conn = test_support::conn();
        let (owner, owner_id) = faculty_caller(&conn, "prof");
        let (other, _) = faculty_caller(&conn, "other");
        let math = test_support::subject(&conn, &owner_id, "Math101");

        assert!(ensure_owns_subject(&conn, &owner, &math).is_ok());
        assert!(matches!(
            ensure_owns_subject(&conn, &other, &math),
            Err(ServiceError::Forbidden(_))
        ));

        let cfg = Cfg::default();
        accounts::ensure_default_admin(&conn, &cfg).expect("admin");
        let out = session::login(&conn, &cfg.default_admin_uname, &cfg.default_admin_password)
            .expect("admin login");
        let admin = session::resolve(&conn, &out.token)
            .expect("resolve")
            .expect("caller");
        assert!(ensure_owns_subject(&conn, &admin, &math).is_ok());
    }

    #[test]
    fn bad_subject_or_date_is_rejected() {
        let conn = test_support::conn();
        let (caller, _) = faculty_caller(&conn, "prof");
        assert!(matches!(
            mark_attendance(&conn, &caller, "nope", "2024-01-10", &[]),
            Err(ServiceError::ReferencedEntityNotFound { entity: "subject", .. })
        ));
        assert!(matches!(
            mark_attendance(&conn, &caller, "", "2024-01-10", &[]),
            Err(ServiceError::MissingRequiredField("subject"))
        ));
    }

    #[test]
    fn daywise_defaults_unmarked_students_to_absent() {
        let conn = test_support::conn();
        let alice = test_support::student(&conn, "alice", "R1");
        let bob = test_support::student(&conn, "bobby", "R2");
        let (caller, faculty_id) = faculty_caller(&conn, "prof");
        let math = test_support::subject(&conn, &faculty_id, "Math101");
        mark_attendance(
            &conn,
            &caller,
            &math.id,
            "2024-01-10",
            &[mark(&alice.profile_id, true)],
        )
        .expect("mark");

        let day = daywise(&conn, "2024-01-10", None).expect("daywise");
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].student_id, alice.profile_id);
        assert_eq!(day[0].status, DayStatus::Present);
        assert_eq!(day[1].student_id, bob.profile_id);
        assert_eq!(day[1].status, DayStatus::Absent);

        let other_day = daywise(&conn, "2024-01-11", Some(&math.id)).expect("daywise");
        assert!(other_day.iter().all(|e| e.status == DayStatus::Absent));
    }

    #[test]
    fn roster_distinguishes_unmarked_from_absent() {
        let conn = test_support::conn();
        let alice = test_support::student(&conn, "alice", "R1");
        test_support::student(&conn, "bobby", "R2");
        let (caller, faculty_id) = faculty_caller(&conn, "prof");
        let math = test_support::subject(&conn, &faculty_id, "Math101");
        mark_attendance(
            &conn,
            &caller,
            &math.id,
            "2024-01-10",
            &[mark(&alice.profile_id, false)],
        )
        .expect("mark");

        let r = roster(&conn, &math, "2024-01-10").expect("roster");
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].present, Some(false));
        assert_eq!(r[1].present, None);
    }
}
