use certifica::{certificate, config, db, pdf, routes, session, state, templates};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certifica=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let template = pdf::CertificateTemplate::new(&config.template_pdf);
    if !template.path().exists() {
        tracing::warn!(
            "Certificate template {} not found; certificates will fail until it is provided",
            template.path().display()
        );
    }

    let tera = templates::load(&config.templates_dir)?;

    let state = Arc::new(state::AppState {
        pool,
        config: config.clone(),
        template: Arc::new(template),
        tera: Arc::new(tera),
        sessions: Arc::new(session::SessionStore::new()),
        clock: Arc::new(certificate::SystemClock),
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Certifica listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
