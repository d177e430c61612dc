use rusqlite::{Connection, OptionalExtension, Row};

use super::{accounts, new_id, required};
use crate::error::{ServiceError, ServiceResult};
use crate::model::Subject;

const SUBJECT_COLS: &str =
    "id, course_name, course_code, short_name, faculty_id, academic_year, semester, class_section";

#[derive(Debug, Clone, Default)]
pub struct NewSubject {
    pub course_name: String,
    pub course_code: String,
    pub short_name: String,
    pub faculty_id: String,
    pub academic_year: String,
    pub semester: String,
    pub class_section: String,
}

pub(crate) fn row_to_subject(r: &Row) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        course_name: r.get(1)?,
        course_code: r.get(2)?,
        short_name: r.get(3)?,
        faculty_id: r.get(4)?,
        academic_year: r.get(5)?,
        semester: r.get(6)?,
        class_section: r.get(7)?,
    })
}

pub fn create_subject(conn: &Connection, input: &NewSubject) -> ServiceResult<Subject> {
    let subject = Subject {
        id: new_id(),
        course_name: required("course_name", &input.course_name)?,
        course_code: required("course_code", &input.course_code)?,
        short_name: required("short_name", &input.short_name)?,
        faculty_id: required("faculty", &input.faculty_id)?,
        academic_year: required("academic_year", &input.academic_year)?,
        semester: required("semester", &input.semester)?,
        class_section: required("student_class", &input.class_section)?,
    };

    if accounts::get_faculty(conn, &subject.faculty_id)?.is_none() {
        return Err(ServiceError::ReferencedEntityNotFound {
            entity: "faculty",
            id: subject.faculty_id,
        });
    }

    conn.execute(
        &format!("INSERT INTO subjects({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?)", SUBJECT_COLS),
        (
            &subject.id,
            &subject.course_name,
            &subject.course_code,
            &subject.short_name,
            &subject.faculty_id,
            &subject.academic_year,
            &subject.semester,
            &subject.class_section,
        ),
    )?;
    log::info!(
        "Registered subject {} ({}) for faculty {}.",
        &subject.course_code,
        &subject.course_name,
        &subject.faculty_id
    );
    Ok(subject)
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> ServiceResult<Option<Subject>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM subjects WHERE id = ?", SUBJECT_COLS),
            [subject_id],
            row_to_subject,
        )
        .optional()?)
}

pub fn list_subjects(conn: &Connection, faculty_id: Option<&str>) -> ServiceResult<Vec<Subject>> {
    let subjects = match faculty_id {
        Some(fid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM subjects WHERE faculty_id = ? ORDER BY course_code",
                SUBJECT_COLS
            ))?;
            let rows = stmt.query_map([fid], row_to_subject)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM subjects ORDER BY course_code",
                SUBJECT_COLS
            ))?;
            let rows = stmt.query_map([], row_to_subject)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(subjects)
}

/// Subjects a class section takes in one academic year and semester.
pub fn subjects_for_term(
    conn: &Connection,
    academic_year: &str,
    semester: &str,
    class_section: &str,
) -> ServiceResult<Vec<Subject>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM subjects
         WHERE academic_year = ? AND semester = ? AND class_section = ?
         ORDER BY course_code",
        SUBJECT_COLS
    ))?;
    let rows = stmt.query_map((academic_year, semester, class_section), row_to_subject)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Ledger rows for the subject are removed by the cascade.
pub fn delete_subject(conn: &Connection, subject_id: &str) -> ServiceResult<()> {
    let n = conn.execute("DELETE FROM subjects WHERE id = ?", [subject_id])?;
    if n == 0 {
        return Err(ServiceError::NotFound("subject"));
    }
    log::info!("Deleted subject {}.", subject_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support;

    fn math(faculty_id: &str) -> NewSubject {
        NewSubject {
            course_name: "Mathematics I".into(),
            course_code: "Math101".into(),
            short_name: "M1".into(),
            faculty_id: faculty_id.into(),
            academic_year: "2024-2025".into(),
            semester: "3".into(),
            class_section: "Class A".into(),
        }
    }

    #[test]
    fn subject_requires_existing_faculty() {
        let conn = test_support::conn();
        let err = create_subject(&conn, &math("no-such-faculty")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ReferencedEntityNotFound { entity: "faculty", .. }
        ));
    }

    #[test]
    fn subject_requires_every_field() {
        let conn = test_support::conn();
        let fac = test_support::faculty(&conn, "prof");
        let mut input = math(&fac.profile_id);
        input.semester = " ".into();
        assert!(matches!(
            create_subject(&conn, &input),
            Err(ServiceError::MissingRequiredField("semester"))
        ));
    }

    #[test]
    fn term_filter_matches_year_semester_and_section() {
        let conn = test_support::conn();
        let fac = test_support::faculty(&conn, "prof");
        create_subject(&conn, &math(&fac.profile_id)).expect("math");
        let mut other = math(&fac.profile_id);
        other.course_code = "Phys201".into();
        other.semester = "4".into();
        create_subject(&conn, &other).expect("physics");

        let found = subjects_for_term(&conn, "2024-2025", "3", "Class A").expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].course_code, "Math101");

        assert_eq!(
            list_subjects(&conn, Some(&fac.profile_id)).expect("list").len(),
            2
        );
        assert!(subjects_for_term(&conn, "2024-2025", "3", "Class B")
            .expect("query")
            .is_empty());
    }
}
