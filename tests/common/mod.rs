#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use certifica::certificate::FixedClock;
use certifica::config::Config;
use certifica::db::{self, DbPool};
use certifica::pdf::{CertificateTemplate, FIELD_DATE, FIELD_DOCUMENT, FIELD_NAME, FIELD_ROLE};
use certifica::session::SessionStore;
use certifica::state::AppState;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_USER: &str = "organizer";
pub const ADMIN_PASSWORD: &str = "s3cret";

pub struct TestApp {
    pub dir: TempDir,
    pub pool: DbPool,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let pool = db::create_pool(&url).await.unwrap();
        db::run_migrations(pool.as_ref()).await.unwrap();

        let template_pdf = dir.path().join("template.pdf");
        std::fs::write(&template_pdf, certificate_pdf()).unwrap();

        let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
        let config = Config {
            database_url: url,
            template_pdf: template_pdf.clone(),
            templates_dir: manifest.join("templates"),
            static_dir: manifest.join("static"),
            admin_user: Some(ADMIN_USER.to_string()),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            support_email: "soporte@example.org".to_string(),
            event_title: "Certificados de prueba".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            secure_cookies: false,
        };
        let tera = certifica::templates::load(&config.templates_dir).unwrap();

        let state = Arc::new(AppState {
            pool: pool.clone(),
            config: Arc::new(config),
            template: Arc::new(CertificateTemplate::new(template_pdf)),
            tera: Arc::new(tera),
            sessions: Arc::new(SessionStore::new()),
            clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 11, 7).unwrap())),
        });

        Self { dir, pool, state }
    }

    pub fn template_path(&self) -> PathBuf {
        self.dir.path().join("template.pdf")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        certifica::routes::router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    /// Log in and return the session cookie pair.
    pub async fn login(&self) -> String {
        let response = self
            .send(form_post(
                "/admin/login",
                &format!("username={}&password={}", ADMIN_USER, ADMIN_PASSWORD),
                None,
            ))
            .await;
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("login sets a cookie")
            .to_str()
            .unwrap()
            .to_string();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

pub fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// One-page form with the four certificate text fields.
pub fn certificate_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let mut fields = Vec::new();
    for (i, name) in [FIELD_NAME, FIELD_DOCUMENT, FIELD_ROLE, FIELD_DATE]
        .iter()
        .enumerate()
    {
        let y = 600 - 60 * i as i64;
        let id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(*name),
            "Rect" => vec![Object::Integer(50), Object::Integer(y), Object::Integer(560), Object::Integer(y + 30)],
            "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
        });
        fields.push(Object::Reference(id));
    }

    let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 0 RG".to_vec()));
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Contents" => content_id,
            "Annots" => fields.clone(),
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let acroform_id = doc.add_object(dictionary! { "Fields" => fields });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
