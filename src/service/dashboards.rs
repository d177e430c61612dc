use rusqlite::Connection;
use serde::Serialize;

use super::ledger::{self, RosterEntry};
use super::session::Caller;
use super::{accounts, catalog, format_date, parse_date, today};
use crate::calc;
use crate::config::Cfg;
use crate::db::count_rows;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{AttendanceRecord, FacultyProfile, Role, StudentProfile, Subject};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub sr_no: usize,
    pub subject_id: String,
    pub course_name: String,
    pub short_name: String,
    pub course_code: String,
    pub attended: usize,
    pub delivered: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student: StudentProfile,
    pub academic_year: String,
    pub semester: String,
    pub class_section: String,
    pub courses: Vec<CourseRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyDashboard {
    pub faculty: FacultyProfile,
    pub subjects: Vec<Subject>,
    pub selected_subject: Option<String>,
    pub selected_date: String,
    pub roster: Vec<RosterEntry>,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingSummary {
    pub total_attendance_records: i64,
    pub total_students: i64,
    pub total_subjects: i64,
    pub total_faculties: i64,
    pub students: Vec<StudentProfile>,
    pub subjects: Vec<Subject>,
    pub faculties: Vec<FacultyProfile>,
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Per-subject attendance percentages for one student in one term.
pub fn student_attendance(
    conn: &Connection,
    cfg: &Cfg,
    student: StudentProfile,
    academic_year: Option<&str>,
    semester: Option<&str>,
) -> ServiceResult<StudentDashboard> {
    let academic_year = non_blank(academic_year)
        .unwrap_or(cfg.default_academic_year.as_str())
        .to_string();
    let semester = non_blank(semester)
        .unwrap_or(cfg.default_semester.as_str())
        .to_string();
    let class_section = student.class_section.clone();

    let subjects = catalog::subjects_for_term(conn, &academic_year, &semester, &class_section)?;
    let mut courses = Vec::with_capacity(subjects.len());
    for (idx, subject) in subjects.into_iter().enumerate() {
        let tally = calc::attendance_tally(ledger::presence_flags(conn, &student.id, &subject.id)?);
        courses.push(CourseRow {
            sr_no: idx + 1,
            subject_id: subject.id,
            course_name: subject.course_name,
            short_name: subject.short_name,
            course_code: subject.course_code,
            attended: tally.attended,
            delivered: tally.delivered,
            percent: tally.percent,
        });
    }

    Ok(StudentDashboard {
        student,
        academic_year,
        semester,
        class_section,
        courses,
    })
}

/// Students see their own figures; admins name the student they want.
pub fn student_dashboard(
    conn: &Connection,
    cfg: &Cfg,
    caller: &Caller,
    student_id: Option<&str>,
    academic_year: Option<&str>,
    semester: Option<&str>,
) -> ServiceResult<StudentDashboard> {
    let student = match (caller.role, non_blank(student_id)) {
        (Role::Admin, Some(id)) => accounts::get_student(conn, id)?
            .ok_or(ServiceError::NotFound("student profile"))?,
        (Role::Admin, None) => return Err(ServiceError::MissingRequiredField("studentId")),
        _ => accounts::student_for_user(conn, &caller.user_id)?
            .ok_or(ServiceError::NotFound("student profile"))?,
    };
    student_attendance(conn, cfg, student, academic_year, semester)
}

pub fn faculty_dashboard(
    conn: &Connection,
    caller: &Caller,
    subject_id: Option<&str>,
    date: Option<&str>,
) -> ServiceResult<FacultyDashboard> {
    let faculty = accounts::faculty_for_user(conn, &caller.user_id)?
        .ok_or(ServiceError::NotFound("faculty profile"))?;
    let subjects = catalog::list_subjects(conn, Some(&faculty.id))?;
    let selected_date = match non_blank(date) {
        Some(d) => format_date(parse_date("date", d)?),
        None => format_date(today()),
    };

    let mut roster = Vec::new();
    let mut records = Vec::new();
    let selected_subject = non_blank(subject_id).map(str::to_string);
    if let Some(sid) = selected_subject.as_deref() {
        let subject = ledger::require_subject(conn, sid)?;
        ledger::ensure_owns_subject(conn, caller, &subject)?;
        roster = ledger::roster(conn, &subject, &selected_date)?;
        records = ledger::records_on(conn, &subject.id, &selected_date)?;
    }

    Ok(FacultyDashboard {
        faculty,
        subjects,
        selected_subject,
        selected_date,
        roster,
        records,
    })
}

pub fn reporting_summary(conn: &Connection) -> ServiceResult<ReportingSummary> {
    Ok(ReportingSummary {
        total_attendance_records: count_rows(conn, "attendance_records")?,
        total_students: count_rows(conn, "students")?,
        total_subjects: count_rows(conn, "subjects")?,
        total_faculties: count_rows(conn, "faculty")?,
        students: accounts::list_students(conn, None)?,
        subjects: catalog::list_subjects(conn, None)?,
        faculties: accounts::list_faculty(conn)?,
    })
}
