use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://certificados.db";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub template_pdf: PathBuf,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    /// Admin credentials. Login is refused while either is unset.
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub support_email: String,
    pub event_title: String,
    pub host: String,
    pub port: u16,
    /// Mark the session cookie `Secure`; set when served over TLS.
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let template_pdf = base_dir.join(
            std::env::var("TEMPLATE_PDF").unwrap_or_else(|_| "CICI_Certificado.pdf".to_string()),
        );

        let templates_dir = base_dir.join(
            std::env::var("TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string()),
        );
        let static_dir = base_dir
            .join(std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()));

        let admin_user = std::env::var("ADMIN_USER").ok().filter(|v| !v.is_empty());
        let admin_password = std::env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty());
        if admin_user.is_none() || admin_password.is_none() {
            tracing::warn!("ADMIN_USER or ADMIN_PASSWORD not set; admin area is locked");
        }

        let support_email = std::env::var("SUPPORT_EMAIL")
            .unwrap_or_else(|_| "ginvestigacioneysi@unillanos.edu.co".to_string());
        let event_title = std::env::var("EVENT_TITLE")
            .unwrap_or_else(|_| "Plataforma de Certificados METAROBOTS 2024".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5001".to_string())
            .parse()
            .unwrap_or(5001);
        let secure_cookies = std::env::var("SECURE_COOKIES")
            .map(|v| env_flag(&v))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            template_pdf,
            templates_dir,
            static_dir,
            admin_user,
            admin_password,
            support_email,
            event_title,
            host,
            port,
            secure_cookies,
        })
    }

    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        match (&self.admin_user, &self.admin_password) {
            (Some(user), Some(pass)) => username == user && password == pass,
            _ => false,
        }
    }
}

fn env_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
