use region_items_admin::api::create_router;
use region_items_admin::config::Config;
use region_items_admin::AdminApp;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting region items admin");
    tracing::info!("Credentials: {:?}", config.credentials_path);

    let app = AdminApp::from_config(&config).await?;
    tracing::info!("Project: {}", app.project_id());
    if !config.check_revoked {
        tracing::warn!("Revocation checks are disabled (ADMIN_CHECK_REVOKED=false)");
    }

    let router = create_router(app.state(&config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
