mod admin;
mod api;
mod pages;

pub use admin::*;
pub use api::*;
pub use pages::*;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tera::Context;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::certificate::DocumentType;
use crate::session::Session;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/", get(index))
        .route("/certificate", post(participant_certificate))
        .route("/certificate/committee", post(committee_certificate))
        .route("/admin", get(admin_page))
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .route("/admin/records", post(add_record))
        .route("/admin/records/update", post(update_record))
        .route("/admin/records/delete", post(delete_record))
        .route("/admin/certificate", post(personalized_certificate))
        .route("/api/health", get(health))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub kind: &'static str,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: "success",
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: "error",
            text: text.into(),
        }
    }
}

#[derive(Serialize)]
struct DocumentTypeOption {
    key: &'static str,
    label: &'static str,
}

fn base_context(state: &AppState, session: &Session) -> Context {
    let document_types: Vec<DocumentTypeOption> = DocumentType::ALL
        .into_iter()
        .map(|t| DocumentTypeOption {
            key: t.key(),
            label: t.label(),
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("event_title", &state.config.event_title);
    ctx.insert("support_email", &state.config.support_email);
    ctx.insert("authenticated", &session.authenticated);
    ctx.insert("document_types", &document_types);
    ctx
}

fn render_template(state: &AppState, status: StatusCode, name: &str, ctx: Context) -> Response {
    match state.tera.render(name, &ctx) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render {}: {:?}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Template error: {}", name)),
            )
                .into_response()
        }
    }
}
