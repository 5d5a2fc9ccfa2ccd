use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::certificate::IssuedCertificate;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match crate::db::count(state.pool.as_ref()).await {
        Ok(records) => Json(serde_json::json!({
            "status": "ok",
            "records": records,
            "template_present": state.template.path().exists(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "error",
                    "message": "Database error."
                })),
            )
                .into_response()
        }
    }
}

/// Attachment response for a rendered certificate.
pub fn certificate_response(issued: IssuedCertificate) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&issued.file_name),
            ),
        ],
        issued.pdf,
    )
        .into_response()
}

/// `attachment` disposition with an ASCII fallback name plus the UTF-8 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    let encoded = urlencoding::encode(file_name);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_ascii_name() {
        assert_eq!(
            content_disposition("ANA PEREZ_Certificado.pdf"),
            "attachment; filename=\"ANA PEREZ_Certificado.pdf\"; filename*=UTF-8''ANA%20PEREZ_Certificado.pdf"
        );
    }

    #[test]
    fn disposition_non_ascii_name() {
        let value = content_disposition("MARÍA_Certificado.pdf");
        assert!(value.starts_with("attachment; filename=\"MAR_A_Certificado.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''MAR%C3%8DA_Certificado.pdf"));
        assert!(value.is_ascii());
    }
}
