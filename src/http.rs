/*!
URL-encoded form endpoints over the service layer.

Responses are JSON; the session token travels in `x-session-token` or an
`Authorization: Bearer` header.
*/
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Cfg;
use crate::error::{ServiceError, ServiceResult};
use crate::service::accounts::{self, NewFaculty, NewStudent};
use crate::service::catalog::{self, NewSubject};
use crate::service::ledger::{self, StudentMark};
use crate::service::session::{self, Caller};
use crate::service::{dashboards, guard};

pub const TOKEN_HEADER: &str = "x-session-token";

pub struct HttpState {
    pub conn: Mutex<Connection>,
    pub cfg: Cfg,
}

type Shared = Arc<HttpState>;

pub enum HttpError {
    Service(ServiceError),
    /// The blocking task running the request panicked or was cancelled.
    Worker(tokio::task::JoinError),
}

impl From<ServiceError> for HttpError {
    fn from(e: ServiceError) -> Self {
        HttpError::Service(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let e = match self {
            HttpError::Service(e) => e,
            HttpError::Worker(e) => {
                log::error!("Request worker failed: {}", e);
                let error = json!({ "code": "internal", "message": "request worker failed" });
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error })))
                    .into_response();
            }
        };
        let status = match &e {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidCredentials | ServiceError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Db(e) => {
                log::error!("Database error while serving request: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Hashing(e) => {
                log::error!("Password hashing failed while serving request: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };
        let mut error = json!({
            "code": e.code(),
            "message": e.to_string(),
        });
        if let Some(d) = e.details() {
            error["details"] = d;
        }
        (status, Json(json!({ "error": error }))).into_response()
    }
}

type HttpResult<T> = Result<Json<T>, HttpError>;

fn token_from(headers: &HeaderMap) -> Option<String> {
    if let Some(v) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(v.trim().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Runs `f` under the store lock once the role guard for `operation` passed.
/// rusqlite calls block, so the lock and the work happen on tokio's blocking
/// pool rather than on a runtime worker.
async fn guarded<T, F>(
    state: &Shared,
    headers: &HeaderMap,
    operation: &'static str,
    f: F,
) -> HttpResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection, &Cfg, Option<&Caller>) -> ServiceResult<T> + Send + 'static,
{
    log::debug!("http {}", operation);
    let state = Arc::clone(state);
    let token = token_from(headers);
    let result = tokio::task::spawn_blocking(move || {
        let conn = state.conn.lock().unwrap_or_else(|p| p.into_inner());
        let caller = guard::check(&conn, operation, token.as_deref())?;
        f(&conn, &state.cfg, caller.as_ref())
    })
    .await
    .map_err(HttpError::Worker)?;
    Ok(Json(result?))
}

fn require_caller(caller: Option<&Caller>) -> ServiceResult<&Caller> {
    caller.ok_or(ServiceError::Unauthenticated)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StudentForm {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub roll_no: String,
    pub course: String,
    pub class_name: String,
    pub avatar: Option<String>,
}

impl From<StudentForm> for NewStudent {
    fn from(f: StudentForm) -> Self {
        NewStudent {
            username: f.username,
            password: f.password,
            password_confirm: f.password_confirm,
            first_name: f.first_name,
            last_name: f.last_name,
            email: f.email,
            roll_no: f.roll_no,
            course: f.course,
            class_section: f.class_name,
            avatar_ref: f.avatar,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FacultyForm {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub avatar: Option<String>,
}

impl From<FacultyForm> for NewFaculty {
    fn from(f: FacultyForm) -> Self {
        NewFaculty {
            username: f.username,
            password: f.password,
            password_confirm: f.password_confirm,
            first_name: f.first_name,
            last_name: f.last_name,
            email: f.email,
            department: f.department,
            avatar_ref: f.avatar,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubjectForm {
    pub course_name: String,
    pub course_code: String,
    pub short_name: String,
    pub faculty: String,
    pub academic_year: String,
    pub semester: String,
    pub student_class: String,
}

impl From<SubjectForm> for NewSubject {
    fn from(f: SubjectForm) -> Self {
        NewSubject {
            course_name: f.course_name,
            course_code: f.course_code,
            short_name: f.short_name,
            faculty_id: f.faculty,
            academic_year: f.academic_year,
            semester: f.semester,
            class_section: f.student_class,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FacultyQuery {
    pub subject: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StudentQuery {
    pub student_id: Option<String>,
    pub academic_year: Option<String>,
    pub semester: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DaywiseQuery {
    pub date: String,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
struct Health {
    version: &'static str,
}

/// The marking form: repeated `student_ids` plus a `present_<id>` checkbox
/// for each student ticked present. `subject`/`date` may come from the form
/// or the query string.
fn marks_from_form(pairs: &[(String, String)]) -> (Option<String>, Option<String>, Vec<StudentMark>) {
    let mut subject = None;
    let mut date = None;
    let mut ids: Vec<String> = Vec::new();
    let mut ticked: Vec<&str> = Vec::new();

    for (k, v) in pairs {
        match k.as_str() {
            "subject" => subject = Some(v.clone()),
            "date" => date = Some(v.clone()),
            "student_ids" => {
                let id = v.trim();
                if !id.is_empty() && !ids.iter().any(|x| x == id) {
                    ids.push(id.to_string());
                }
            }
            other => {
                if let Some(id) = other.strip_prefix("present_") {
                    ticked.push(id);
                }
            }
        }
    }

    let marks = ids
        .into_iter()
        .map(|id| {
            let present = ticked.contains(&id.as_str());
            StudentMark {
                student_id: id,
                present,
            }
        })
        .collect();
    (subject, date, marks)
}

async fn health() -> Json<Health> {
    Json(Health {
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn register_student(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<StudentForm>,
) -> HttpResult<accounts::Registered> {
    guarded(&state, &headers, "accounts.registerStudent", move |conn, cfg, _| {
        accounts::register_student(conn, cfg, &form.into())
    })
    .await
}

async fn register_faculty(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<FacultyForm>,
) -> HttpResult<accounts::Registered> {
    guarded(&state, &headers, "accounts.registerFaculty", move |conn, cfg, _| {
        accounts::register_faculty(conn, cfg, &form.into())
    })
    .await
}

async fn register_subject(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<SubjectForm>,
) -> HttpResult<crate::model::Subject> {
    guarded(&state, &headers, "subjects.create", move |conn, _, _| {
        catalog::create_subject(conn, &form.into())
    })
    .await
}

async fn login(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> HttpResult<session::LoginOutcome> {
    guarded(&state, &headers, "session.login", move |conn, _, _| {
        session::login(conn, &form.username, &form.password)
    })
    .await
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> HttpResult<serde_json::Value> {
    let token = token_from(&headers);
    guarded(&state, &headers, "session.logout", move |conn, _, _| {
        if let Some(t) = token {
            session::logout(conn, &t)?;
        }
        Ok(json!({ "ok": true }))
    })
    .await
}

async fn admin_dashboard(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> HttpResult<dashboards::ReportingSummary> {
    guarded(&state, &headers, "dashboard.admin", move |conn, _, _| {
        dashboards::reporting_summary(conn)
    })
    .await
}

async fn faculty_dashboard(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<FacultyQuery>,
) -> HttpResult<dashboards::FacultyDashboard> {
    guarded(&state, &headers, "dashboard.faculty", move |conn, _, caller| {
        dashboards::faculty_dashboard(
            conn,
            require_caller(caller)?,
            q.subject.as_deref(),
            q.date.as_deref(),
        )
    })
    .await
}

async fn faculty_mark(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<FacultyQuery>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> HttpResult<ledger::MarkOutcome> {
    let (form_subject, form_date, marks) = marks_from_form(&pairs);
    let subject = form_subject.or(q.subject).unwrap_or_default();
    let date = form_date
        .or(q.date)
        .unwrap_or_else(|| crate::service::format_date(crate::service::today()));
    guarded(&state, &headers, "attendance.mark", move |conn, _, caller| {
        ledger::mark_attendance(conn, require_caller(caller)?, &subject, &date, &marks)
    })
    .await
}

async fn student_dashboard(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<StudentQuery>,
) -> HttpResult<dashboards::StudentDashboard> {
    guarded(&state, &headers, "dashboard.student", move |conn, cfg, caller| {
        dashboards::student_dashboard(
            conn,
            cfg,
            require_caller(caller)?,
            q.student_id.as_deref(),
            q.academic_year.as_deref(),
            q.semester.as_deref(),
        )
    })
    .await
}

async fn daywise(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<DaywiseQuery>,
) -> HttpResult<Vec<ledger::DaywiseEntry>> {
    guarded(&state, &headers, "attendance.daywise", move |conn, _, _| {
        ledger::daywise(conn, &q.date, q.subject.as_deref())
    })
    .await
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register/student", post(register_student))
        .route("/register/faculty", post(register_faculty))
        .route("/register/subject", post(register_subject))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/dashboard/admin", get(admin_dashboard))
        .route(
            "/dashboard/faculty",
            get(faculty_dashboard).post(faculty_mark),
        )
        .route("/dashboard/student", get(student_dashboard))
        .route("/attendance/daywise", get(daywise))
        .with_state(state)
}

pub fn shared_state(conn: Connection, cfg: Cfg) -> Shared {
    Arc::new(HttpState {
        conn: Mutex::new(conn),
        cfg,
    })
}

pub async fn serve(cfg: Cfg) -> anyhow::Result<()> {
    let conn = crate::db::open_db(&cfg.db_path)?;
    accounts::ensure_default_admin(&conn, &cfg)?;
    let addr = cfg.addr;
    let app = router(shared_state(conn, cfg));

    log::info!("Listening on {}", &addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
