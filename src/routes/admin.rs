use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::Query;
use serde::Deserialize;
use std::sync::Arc;

use super::{base_context, certificate_response, issue_failure, render_template, Notice};
use crate::certificate::{self, DocumentType, IssueRequest};
use crate::db::{self, categories, DocumentRecord, RecordFilter};
use crate::error::CertError;
use crate::session::{clear_cookie, set_cookie, Session};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordForm {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub category: String,
}

impl RecordForm {
    fn into_record(self) -> DocumentRecord {
        DocumentRecord {
            document_id: self.document_id.trim().to_string(),
            name: self.name,
            quality: self.quality,
            category: self.category,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteForm {
    #[serde(default)]
    pub document_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonalizedForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub quality: String,
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Session, Response> {
    let session = Session::from_headers(&state.sessions, headers);
    if session.authenticated {
        Ok(session)
    } else {
        Err(Redirect::to("/admin").into_response())
    }
}

async fn dashboard(
    state: &AppState,
    session: &Session,
    filter: &RecordFilter,
    status: StatusCode,
    notice: Option<Notice>,
) -> Response {
    let records = match db::list_all(state.pool.as_ref()).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to list records: {}", e);
            let mut ctx = base_context(state, session);
            ctx.insert("records", &Vec::<DocumentRecord>::new());
            ctx.insert("categories", &Vec::<String>::new());
            ctx.insert("total", &0);
            ctx.insert("notice", &Notice::error("Error de base de datos."));
            return render_template(state, StatusCode::INTERNAL_SERVER_ERROR, "admin.html", ctx);
        }
    };

    let total = records.len();
    let all_categories = categories(&records);
    let shown = filter.apply(records);

    let mut ctx = base_context(state, session);
    ctx.insert("records", &shown);
    ctx.insert("categories", &all_categories);
    ctx.insert("total", &total);
    ctx.insert("q", &filter.q.clone().unwrap_or_default());
    ctx.insert("selected_categories", &filter.category);
    if let Some(notice) = notice {
        ctx.insert("notice", &notice);
    }
    render_template(state, status, "admin.html", ctx)
}

pub async fn admin_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<RecordFilter>,
) -> Response {
    let session = Session::from_headers(&state.sessions, &headers);
    if !session.authenticated {
        return render_template(&state, StatusCode::OK, "login.html", base_context(&state, &session));
    }
    dashboard(&state, &session, &filter, StatusCode::OK, None).await
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.config.check_credentials(&form.username, &form.password) {
        tracing::warn!(username = %form.username, "rejected admin login");
        let session = Session::from_headers(&state.sessions, &headers);
        let mut ctx = base_context(&state, &session);
        ctx.insert("notice", &Notice::error("Credenciales incorrectas ❌"));
        ctx.insert("username", &form.username);
        return render_template(&state, StatusCode::UNAUTHORIZED, "login.html", ctx);
    }

    let token = state.sessions.open();
    tracing::info!(username = %form.username, "admin logged in");
    (
        [(header::SET_COOKIE, set_cookie(&token, state.config.secure_cookies))],
        Redirect::to("/admin"),
    )
        .into_response()
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = Session::from_headers(&state.sessions, &headers);
    if let Some(token) = &session.token {
        state.sessions.close(token);
    }
    (
        [(header::SET_COOKIE, clear_cookie(state.config.secure_cookies))],
        Redirect::to("/admin"),
    )
        .into_response()
}

pub async fn add_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<RecordForm>,
) -> Response {
    let session = match require_admin(&state, &headers) {
        Ok(s) => s,
        Err(redirect) => return redirect,
    };
    let record = form.into_record();
    let filter = RecordFilter::default();

    if record.document_id.is_empty() {
        let notice = Notice::error("El número de documento es obligatorio. ⚠️");
        return dashboard(&state, &session, &filter, StatusCode::BAD_REQUEST, Some(notice)).await;
    }

    let (status, notice) = match db::insert(state.pool.as_ref(), &record).await {
        Ok(()) => {
            tracing::info!(document_id = %record.document_id, "record added");
            (StatusCode::OK, Notice::success("Documento agregado exitosamente 🎉"))
        }
        Err(CertError::DuplicateKey(id)) => (
            StatusCode::CONFLICT,
            Notice::error(format!("El documento {} ya existe.", id)),
        ),
        Err(e) => {
            tracing::error!("Failed to add record: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Notice::error("Error de base de datos."))
        }
    };
    dashboard(&state, &session, &filter, status, Some(notice)).await
}

pub async fn update_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<RecordForm>,
) -> Response {
    let session = match require_admin(&state, &headers) {
        Ok(s) => s,
        Err(redirect) => return redirect,
    };
    let record = form.into_record();

    let (status, notice) = match db::update(state.pool.as_ref(), &record).await {
        Ok(()) => {
            tracing::info!(document_id = %record.document_id, "record updated");
            (StatusCode::OK, Notice::success("Documento modificado exitosamente ✔️"))
        }
        Err(CertError::NotFound(id)) => (
            StatusCode::NOT_FOUND,
            Notice::error(format!("El documento {} no existe.", id)),
        ),
        Err(e) => {
            tracing::error!("Failed to update record: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Notice::error("Error de base de datos."))
        }
    };
    dashboard(&state, &session, &RecordFilter::default(), status, Some(notice)).await
}

pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<DeleteForm>,
) -> Response {
    let session = match require_admin(&state, &headers) {
        Ok(s) => s,
        Err(redirect) => return redirect,
    };
    let document_id = form.document_id.trim();

    let (status, notice) = match db::delete(state.pool.as_ref(), document_id).await {
        Ok(()) => {
            tracing::info!(document_id = %document_id, "record deleted");
            (StatusCode::OK, Notice::success("Documento eliminado exitosamente ✔️"))
        }
        Err(CertError::NotFound(id)) => (
            StatusCode::NOT_FOUND,
            Notice::error(format!("El documento {} no existe.", id)),
        ),
        Err(e) => {
            tracing::error!("Failed to delete record: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Notice::error("Error de base de datos."))
        }
    };
    dashboard(&state, &session, &RecordFilter::default(), status, Some(notice)).await
}

pub async fn personalized_certificate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<PersonalizedForm>,
) -> Response {
    let session = match require_admin(&state, &headers) {
        Ok(s) => s,
        Err(redirect) => return redirect,
    };
    let filter = RecordFilter::default();

    let document_id = form.document_id.trim();
    let missing = [form.name.as_str(), form.quality.as_str(), document_id]
        .iter()
        .any(|v| v.trim().is_empty());
    let document_type = match form.document_type.parse::<DocumentType>() {
        Ok(t) if !missing => t,
        _ => {
            let notice = Notice::error("Por favor, complete todos los campos necesarios. ⚠️");
            return dashboard(&state, &session, &filter, StatusCode::BAD_REQUEST, Some(notice))
                .await;
        }
    };

    let request = IssueRequest::Personalized {
        name: form.name.clone(),
        document_type,
        document_id: document_id.to_string(),
        quality: form.quality.clone(),
    };
    match certificate::issue(state.pool.as_ref(), &state.template, state.clock.as_ref(), request)
        .await
    {
        Ok(issued) => certificate_response(issued),
        Err(e) => {
            let notice = Notice::error(issue_failure(&e));
            dashboard(&state, &session, &filter, StatusCode::INTERNAL_SERVER_ERROR, Some(notice))
                .await
        }
    }
}
