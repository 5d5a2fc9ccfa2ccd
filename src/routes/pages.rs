use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{base_context, certificate_response, render_template, Notice};
use crate::certificate::{self, DocumentType, IssueRequest};
use crate::config::Config;
use crate::error::CertError;
use crate::session::Session;
use crate::state::AppState;

const MISSING_DOCUMENT: &str = "Por favor, ingrese un número de documento. ⚠️";
const INVALID_DOCUMENT_TYPE: &str = "Seleccione un tipo de documento válido. ⚠️";
const COMMITTEE_NOT_FOUND: &str =
    "No encontramos tu documento en la base de datos del comité organizador. 📧 Contacta con soporte.";

pub fn participant_not_found(config: &Config) -> String {
    format!(
        "No encontramos tu documento en nuestra base de datos. 📧 Envía un correo a {} \
         con Asunto: Solicitud Certificado de Participación e incluye tu nombre completo, \
         número de documento y categorías en las que participaste.",
        config.support_email
    )
}

/// Message for failures other than a lookup miss. Infrastructure errors are
/// logged and hidden; template errors are shown as they are.
pub fn issue_failure(e: &CertError) -> String {
    match e {
        CertError::Template(msg) => format!("No fue posible generar el certificado: {}", msg),
        other => {
            tracing::error!("Certificate issuance failed: {}", other);
            "Ocurrió un error inesperado. Intenta de nuevo más tarde.".to_string()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CertificateForm {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub document_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitteeForm {
    #[serde(default)]
    pub document_id: String,
}

pub async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let session = Session::from_headers(&state.sessions, &headers);
    render_template(&state, StatusCode::OK, "index.html", base_context(&state, &session))
}

fn index_with_notice(
    state: &AppState,
    session: &Session,
    status: StatusCode,
    section: &str,
    document_id: &str,
    notice: Notice,
) -> Response {
    let mut ctx = base_context(state, session);
    ctx.insert("section", section);
    ctx.insert("document_id", document_id);
    ctx.insert("notice", &notice);
    render_template(state, status, "index.html", ctx)
}

pub async fn participant_certificate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CertificateForm>,
) -> Response {
    let session = Session::from_headers(&state.sessions, &headers);
    let document_id = form.document_id.trim();
    let fail = |status, text: String| {
        index_with_notice(&state, &session, status, "participant", document_id, Notice::error(text))
    };

    if document_id.is_empty() {
        return fail(StatusCode::BAD_REQUEST, MISSING_DOCUMENT.to_string());
    }
    let document_type = match form.document_type.parse::<DocumentType>() {
        Ok(t) => t,
        Err(_) => return fail(StatusCode::BAD_REQUEST, INVALID_DOCUMENT_TYPE.to_string()),
    };

    let request = IssueRequest::Participant {
        document_id: document_id.to_string(),
        document_type,
    };
    match certificate::issue(state.pool.as_ref(), &state.template, state.clock.as_ref(), request)
        .await
    {
        Ok(issued) => certificate_response(issued),
        Err(CertError::NotFound(_)) => {
            tracing::info!(document_id = %document_id, "participant not found");
            fail(StatusCode::NOT_FOUND, participant_not_found(&state.config))
        }
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, issue_failure(&e)),
    }
}

pub async fn committee_certificate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CommitteeForm>,
) -> Response {
    let session = Session::from_headers(&state.sessions, &headers);
    let document_id = form.document_id.trim();
    let fail = |status, text: String| {
        index_with_notice(&state, &session, status, "committee", document_id, Notice::error(text))
    };

    if document_id.is_empty() {
        return fail(StatusCode::BAD_REQUEST, MISSING_DOCUMENT.to_string());
    }

    let request = IssueRequest::Committee {
        document_id: document_id.to_string(),
    };
    match certificate::issue(state.pool.as_ref(), &state.template, state.clock.as_ref(), request)
        .await
    {
        Ok(issued) => certificate_response(issued),
        Err(CertError::NotFound(_)) => {
            fail(StatusCode::NOT_FOUND, COMMITTEE_NOT_FOUND.to_string())
        }
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, issue_failure(&e)),
    }
}
