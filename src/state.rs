use crate::certificate::Clock;
use crate::config::Config;
use crate::db::DbPool;
use crate::pdf::CertificateTemplate;
use crate::session::SessionStore;
use std::sync::Arc;
use tera::Tera;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub template: Arc<CertificateTemplate>,
    pub tera: Arc<Tera>,
    pub sessions: Arc<SessionStore>,
    pub clock: Arc<dyn Clock>,
}
